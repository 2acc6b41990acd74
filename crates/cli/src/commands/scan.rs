//! Scan a business card photo.

use std::path::Path;

use bemember_client::MockCardScanner;
use bemember_core::{IdentityRecord, ScannedContact};
use tracing::info;

/// Scan `image` and print the extracted contact and its contact card.
///
/// # Errors
///
/// Returns an error if the image cannot be read or is empty.
pub async fn run(image: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let contact = scan_file(image).await?;

    println!("{}", serde_json::to_string_pretty(&contact)?);
    println!();
    println!("{}", contact.to_contact_card());
    println!();
    println!(
        "Mint it with: bemember mint --from-scan {}",
        image.display()
    );
    Ok(())
}

/// Read an image file and scan it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the scanner rejects it.
pub async fn scan_file(image: &Path) -> Result<ScannedContact, Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(image)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", image.display()))?;

    info!(path = %image.display(), size = bytes.len(), "Scanning card");
    let contact = MockCardScanner::new().scan(&bytes).await?;

    let preview = IdentityRecord::from_scanned_contact(contact.clone());
    info!(
        name = %preview.name,
        tagline = preview.tagline.as_deref().unwrap_or_default(),
        "Card scanned"
    );
    Ok(contact)
}
