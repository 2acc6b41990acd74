//! Read registered records back.

use std::path::PathBuf;

use bemember_client::{ClientConfig, ContentStore, StoreError};
use bemember_core::{Address, ContentId, IdentityRecord, TxHash};
use tracing::{info, warn};

use crate::context::AppContext;

/// Print the record registered for `address`.
///
/// # Errors
///
/// Returns an error if the address is malformed, the wallet is unavailable,
/// or the registry call fails.
pub async fn lookup(ctx: &AppContext, address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let address = Address::parse(address)?;
    let registry = ctx.registry()?;
    let connection = ctx.ledger().connect().await?;

    match registry.read_for(&connection, &address).await? {
        Some(cid) => print_entry(ctx, &address, &cid).await,
        None => {
            println!("No card registered for {address}");
            Ok(())
        }
    }
}

/// Print the record registered for the connected account.
///
/// # Errors
///
/// Returns an error if the wallet is unavailable or the registry call fails.
pub async fn mine(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ctx.registry()?;
    let connection = ctx.ledger().connect().await?;
    let address = connection.current_address().await?;

    match registry.read_own(&connection).await? {
        Some(cid) => print_entry(ctx, &address, &cid).await,
        None => {
            println!("No card registered for {address} yet. Create one with: bemember mint");
            Ok(())
        }
    }
}

/// Write the stored record under `cid` as a `.vcf` file.
///
/// # Errors
///
/// Returns an error if the record cannot be retrieved or the file cannot be written.
pub async fn vcard(
    ctx: &AppContext,
    cid: &str,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cid = ContentId::parse(cid)?;
    let record = ctx.ipfs().retrieve(&cid).await?;

    let path = output.unwrap_or_else(|| PathBuf::from(record.contact_card_file_name()));
    tokio::fs::write(&path, record.to_contact_card()).await?;

    info!(path = %path.display(), "Contact card written");
    println!("Wrote {}", path.display());
    Ok(())
}

/// Print the share link for `address` and, optionally, the explorer link for `tx`.
///
/// # Errors
///
/// Returns an error if the address or transaction hash is malformed.
pub fn links(
    config: &ClientConfig,
    address: &str,
    tx: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let address = Address::parse(address)?;
    println!("Share:     {}", config.share_url(&address));
    if let Some(tx) = tx {
        let tx = TxHash::parse(tx)?;
        println!("Explorer:  {}", config.chain.explorer_tx_url(&tx));
    }
    println!("Owner:     {}", address.short());
    Ok(())
}

async fn print_entry(
    ctx: &AppContext,
    address: &Address,
    cid: &ContentId,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Owner:       {address}");
    println!("Content id:  {cid}");
    println!("Share:       {}", ctx.config().share_url(address));

    let record = match ctx.ipfs().retrieve(cid).await {
        Ok(record) => record,
        Err(StoreError::Placeholder(_)) => {
            println!("This card was registered with a local placeholder id; no record was stored.");
            return Ok(());
        }
        Err(e @ StoreError::NotFound { .. }) => {
            warn!(error = %e, "Registered content is missing from the store");
            println!("The registered content could not be found on IPFS.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Gateway:     {}", ctx.ipfs().gateway_url(cid));
    println!();
    print_record(&record)?;
    Ok(())
}

fn print_record(record: &IdentityRecord) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(&record.to_storable_form())?);
    Ok(())
}
