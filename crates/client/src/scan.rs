//! Business card scanning.
//!
//! There is no OCR: [`MockCardScanner`] simulates processing time and returns
//! a fixed contact for any non-empty image.

use std::time::Duration;

use bemember_core::ScannedContact;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("no image data to scan")]
    EmptyImage,
}

impl ScanError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyImage => ErrorKind::InvalidData,
        }
    }
}

/// Scanner that returns the same demo contact for every image.
#[derive(Debug, Clone, Default)]
pub struct MockCardScanner {
    delay: Duration,
}

impl MockCardScanner {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    /// Simulate processing time before answering.
    #[must_use]
    pub const fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    /// Extract a contact from an image.
    ///
    /// # Errors
    ///
    /// Returns `EmptyImage` if `image` has no bytes.
    #[instrument(skip_all, fields(size = image.len()))]
    pub async fn scan(&self, image: &[u8]) -> Result<ScannedContact, ScanError> {
        if image.is_empty() {
            return Err(ScanError::EmptyImage);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        debug!("Returning demo contact");
        Ok(demo_contact())
    }
}

fn demo_contact() -> ScannedContact {
    ScannedContact {
        name: Some("John Doe".to_string()),
        title: Some("Software Engineer".to_string()),
        company: Some("Tech Company Inc.".to_string()),
        email: Some("john.doe@example.com".to_string()),
        phone: Some("+1 (555) 123-4567".to_string()),
        website: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bemember_core::IdentityRecord;

    use super::*;

    #[tokio::test]
    async fn test_scan_returns_demo_contact() {
        let contact = MockCardScanner::new().scan(b"\xff\xd8\xff").await.unwrap();
        assert_eq!(contact.name.as_deref(), Some("John Doe"));

        let record = IdentityRecord::from_scanned_contact(contact);
        assert_eq!(
            record.tagline.as_deref(),
            Some("Software Engineer at Tech Company Inc.")
        );
    }

    #[tokio::test]
    async fn test_scan_rejects_empty_image() {
        let err = MockCardScanner::new().scan(&[]).await.unwrap_err();
        assert_eq!(err, ScanError::EmptyImage);
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_waits_for_delay() {
        let scanner = MockCardScanner::with_delay(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        scanner.scan(b"img").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
