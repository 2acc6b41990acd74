//! Content store adapter.
//!
//! # Architecture
//!
//! - [`ContentStore`] is the seam: `store(record, image?) -> ContentId` and
//!   `retrieve(cid) -> IdentityRecord`
//! - [`IpfsContentStore`] writes through the IPFS HTTP API (authenticated) and
//!   reads through a public gateway (never authenticated), caching reads via
//!   `moka` since content ids are immutable
//! - [`FallbackContentStore`] wraps any store and degrades writes to a locally
//!   synthesized, `local-`-prefixed placeholder id when the primary fails
//!
//! Reads fail fast. No retries happen at this layer.

mod fallback;
mod ipfs;

pub use fallback::{FallbackContentStore, placeholder_for};
pub use ipfs::{ALTERNATE_GATEWAYS, IpfsContentStore};

use async_trait::async_trait;
use bemember_core::{ContentId, IdentityRecord};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur when interacting with a content store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("content store {store} unavailable: {reason}")]
    Unavailable {
        /// Which store failed.
        store: &'static str,
        /// Transport-level reason.
        reason: String,
    },

    /// The store answered but refused the request.
    #[error("content store {store} rejected the request: HTTP {status} - {message}")]
    Rejected {
        /// Which store failed.
        store: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// No write credentials are configured.
    #[error("content store {store} has no write credentials configured")]
    Unauthenticated {
        /// Which store failed.
        store: &'static str,
    },

    /// Nothing is stored under this identifier.
    #[error("content {cid} not found in {store}")]
    NotFound {
        /// Which store was queried.
        store: &'static str,
        /// The identifier queried.
        cid: ContentId,
    },

    /// The identifier was synthesized locally and was never uploaded.
    #[error("content {0} is a local placeholder and cannot be retrieved")]
    Placeholder(ContentId),

    /// The stored bytes are not an identity record.
    #[error("content {cid} is not a valid identity record: {reason}")]
    Decode {
        /// The identifier queried.
        cid: ContentId,
        /// Decoder message.
        reason: String,
    },
}

impl StoreError {
    /// Coarse classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } | Self::Rejected { .. } | Self::Unauthenticated { .. } => {
                ErrorKind::StoreUnavailable
            }
            Self::NotFound { .. } | Self::Placeholder(_) => ErrorKind::NotFound,
            Self::Decode { .. } => ErrorKind::InvalidData,
        }
    }
}

/// An image to upload alongside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    /// Wrap image bytes, guessing the content type from the file extension.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let content_type = match extension.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "heic" => "image/heic",
            _ => "application/octet-stream",
        };

        Self {
            file_name,
            content_type: content_type.to_string(),
            bytes,
        }
    }
}

/// A content-addressed store for identity records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short store name, carried in errors and logs.
    fn name(&self) -> &'static str;

    /// Persist the record's storable form (and optional image) and return its id.
    async fn store(
        &self,
        record: &IdentityRecord,
        image: Option<ImageBlob>,
    ) -> Result<ContentId, StoreError>;

    /// Read a record back by id.
    async fn retrieve(&self, cid: &ContentId) -> Result<IdentityRecord, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_content_type() {
        assert_eq!(ImageBlob::new("card.JPG", vec![]).content_type, "image/jpeg");
        assert_eq!(ImageBlob::new("card.png", vec![]).content_type, "image/png");
        assert_eq!(
            ImageBlob::new("card", vec![]).content_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn test_error_kinds() {
        let cid = ContentId::placeholder("card", 1, "abcdefgh");
        assert_eq!(StoreError::Placeholder(cid.clone()).kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::Unauthenticated { store: "ipfs" }.kind(),
            ErrorKind::StoreUnavailable
        );
        assert_eq!(
            StoreError::Decode {
                cid,
                reason: "eof".to_string()
            }
            .kind(),
            ErrorKind::InvalidData
        );
    }

    #[test]
    fn test_error_display_names_store() {
        let err = StoreError::Rejected {
            store: "ipfs",
            status: 401,
            message: "invalid project id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "content store ipfs rejected the request: HTTP 401 - invalid project id"
        );
    }
}
