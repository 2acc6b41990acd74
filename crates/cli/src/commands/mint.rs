//! Store an identity record and register it on-chain.

use bemember_client::{ImageBlob, Submission, SubmitError, UploadState};
use bemember_core::IdentityRecord;
use tracing::info;

use crate::MintArgs;
use crate::commands::scan::scan_file;
use crate::context::AppContext;

/// Build the record, run the upload, and print the receipt and links.
///
/// # Errors
///
/// Returns an error if validation, storage or the ledger step fails.
pub async fn run(ctx: &AppContext, args: MintArgs) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = ctx.orchestrator()?;

    let mut record = match &args.from_scan {
        Some(path) => IdentityRecord::from_scanned_contact(scan_file(path).await?),
        None => IdentityRecord::empty(),
    };
    apply_overrides(&mut record, &args);

    let image = match &args.image {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            let file_name = path
                .file_name()
                .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().into_owned());
            Some(ImageBlob::new(file_name, bytes))
        }
        None => None,
    };

    let submission = Submission::new(record);
    let mut states = submission.watch();
    let progress = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let line = match &*states.borrow_and_update() {
                UploadState::Validating => Some("Validating record...".to_string()),
                UploadState::ObtainingContentId => Some("Uploading to IPFS...".to_string()),
                UploadState::SubmittingToLedger { content_id } => Some(format!(
                    "Stored as {content_id}. Waiting for wallet signature and confirmation..."
                )),
                _ => None,
            };
            if let Some(line) = line {
                println!("{line}");
            }
        }
    });

    let result = orchestrator.submit(&submission, image).await;
    progress.abort();

    let receipt = match result {
        Ok(receipt) => receipt,
        Err(SubmitError::ValidationFailed { missing }) => {
            for field in &missing {
                println!("Missing required field: --{field}");
            }
            return Err(SubmitError::ValidationFailed { missing }.into());
        }
        Err(e) => {
            info!(kind = %e.kind(), "Mint failed");
            return Err(e.into());
        }
    };

    let chain = ctx.ledger().chain();
    println!();
    println!("Card minted");
    println!("  Content id:   {}", receipt.content_id);
    println!("  Owner:        {}", receipt.owner_address);
    println!("  Transaction:  {}", receipt.confirmation_ref);
    if let Some(block) = receipt.block_number {
        println!("  Block:        {block}");
    }
    println!(
        "  Explorer:     {}",
        chain.explorer_tx_url(&receipt.confirmation_ref)
    );
    println!(
        "  Share:        {}",
        ctx.config().share_url(&receipt.owner_address)
    );
    if receipt.is_placeholder() {
        println!();
        println!("Note: IPFS was unavailable, so a local placeholder id was registered.");
        println!("The record itself was not stored and cannot be retrieved.");
    } else {
        println!("  Gateway:      {}", ctx.ipfs().gateway_url(&receipt.content_id));
    }

    Ok(())
}

/// Overlay explicitly given fields onto the record.
fn apply_overrides(record: &mut IdentityRecord, args: &MintArgs) {
    fn set(target: &mut Option<String>, value: Option<&String>) {
        if let Some(value) = value {
            *target = Some(value.clone()).filter(|v| !v.is_empty());
        }
    }

    if let Some(name) = &args.name {
        record.name.clone_from(name);
    }
    set(&mut record.tagline, args.tagline.as_ref());
    set(&mut record.role, args.role.as_ref());
    set(&mut record.organization, args.organization.as_ref());
    set(&mut record.email, args.email.as_ref());
    set(&mut record.phone, args.phone.as_ref());
    set(&mut record.website, args.website.as_ref());
    set(&mut record.ens, args.ens.as_ref());
    set(&mut record.farcaster, args.farcaster.as_ref());
    set(&mut record.twitter, args.twitter.as_ref());
    set(&mut record.github, args.github.as_ref());
    if args.transferable {
        record.transferable = true;
    }
}
