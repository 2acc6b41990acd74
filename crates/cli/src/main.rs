//! BeMember CLI - Scan business cards and mint identity records.
//!
//! # Usage
//!
//! ```bash
//! # Scan a business card photo (mock OCR) and print the contact
//! bemember scan card.jpg
//!
//! # Upload a record and register it for the connected wallet
//! bemember mint --name "Ada Lovelace" --tagline "Engineer at Acme"
//!
//! # Mint from a scanned card, with a profile image
//! bemember mint --from-scan card.jpg --image avatar.png
//!
//! # Read records back
//! bemember lookup 0x52908400098527886e0f7030069857d2e4169ee7
//! bemember mine
//! bemember vcard bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi
//! ```
//!
//! # Commands
//!
//! - `scan` - Extract a contact from a card photo
//! - `mint` - Store a record and register its content id on-chain
//! - `lookup` - Read the record registered for an address
//! - `mine` - Read the record registered for the connected account
//! - `vcard` - Export a stored record as a contact card
//! - `links` - Print share and explorer links
//! - `watch` - Print wallet account and chain changes

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use bemember_client::ClientConfig;
use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "bemember")]
#[command(author, version, about = "BeMember identity cards on IPFS and Monad")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a contact from a business card photo
    Scan {
        /// Path to the card image
        image: PathBuf,
    },
    /// Store an identity record and register it on-chain
    Mint(MintArgs),
    /// Read the record registered for an address
    Lookup {
        /// Wallet address (0x-prefixed)
        address: String,
    },
    /// Read the record registered for the connected account
    Mine,
    /// Export a stored record as a contact card
    Vcard {
        /// Content id of the record
        cid: String,

        /// Output file (defaults to `<name>.vcf`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print share and explorer links
    Links {
        /// Wallet address (0x-prefixed)
        address: String,

        /// Transaction hash to link on the explorer
        #[arg(long)]
        tx: Option<String>,
    },
    /// Print wallet account and chain changes until interrupted
    Watch,
}

#[derive(Args)]
pub struct MintArgs {
    /// Start from the contact scanned from this card image
    #[arg(long)]
    pub from_scan: Option<PathBuf>,

    /// Profile image to upload alongside the record
    #[arg(long)]
    pub image: Option<PathBuf>,

    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub tagline: Option<String>,
    #[arg(long)]
    pub role: Option<String>,
    #[arg(long)]
    pub organization: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub website: Option<String>,
    #[arg(long)]
    pub ens: Option<String>,
    #[arg(long)]
    pub farcaster: Option<String>,
    #[arg(long)]
    pub twitter: Option<String>,
    #[arg(long)]
    pub github: Option<String>,

    /// Mark the card as transferable
    #[arg(long)]
    pub transferable: bool,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Route ERROR/WARN to Sentry as events and INFO/DEBUG as breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bemember_client=info,bemember_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Scan { image } => commands::scan::run(&image).await?,
        Commands::Links { address, tx } => {
            commands::lookup::links(&config, &address, tx.as_deref())?;
        }
        command => {
            let ctx = context::AppContext::new(config)?;
            match command {
                Commands::Mint(args) => commands::mint::run(&ctx, args).await?,
                Commands::Lookup { address } => commands::lookup::lookup(&ctx, &address).await?,
                Commands::Mine => commands::lookup::mine(&ctx).await?,
                Commands::Vcard { cid, output } => {
                    commands::lookup::vcard(&ctx, &cid, output).await?;
                }
                Commands::Watch => commands::watch::run(&ctx).await?,
                Commands::Scan { .. } | Commands::Links { .. } => {}
            }
        }
    }
    Ok(())
}
