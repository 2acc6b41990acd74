use async_trait::async_trait;
use bemember_core::{ContentId, IdentityRecord};
use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{instrument, warn};

use super::{ContentStore, ImageBlob, StoreError};

const MAX_FRAGMENT_LEN: usize = 32;
const SUFFIX_LEN: usize = 8;

/// Wraps a primary store and degrades failed writes to a placeholder id.
///
/// Writes never fail through this wrapper. Reads pass through unchanged, and
/// placeholder ids are refused since their content was never uploaded.
pub struct FallbackContentStore<S> {
    primary: S,
}

impl<S: ContentStore> FallbackContentStore<S> {
    pub const fn new(primary: S) -> Self {
        Self { primary }
    }

    pub const fn primary(&self) -> &S {
        &self.primary
    }
}

#[async_trait]
impl<S: ContentStore> ContentStore for FallbackContentStore<S> {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    #[instrument(skip_all, fields(store = self.primary.name()))]
    async fn store(
        &self,
        record: &IdentityRecord,
        image: Option<ImageBlob>,
    ) -> Result<ContentId, StoreError> {
        match self.primary.store(record, image).await {
            Ok(cid) => Ok(cid),
            Err(e) => {
                let placeholder = placeholder_for(record);
                warn!(
                    error = %e,
                    placeholder = %placeholder,
                    "Content store write failed, falling back to local placeholder id"
                );
                Ok(placeholder)
            }
        }
    }

    async fn retrieve(&self, cid: &ContentId) -> Result<IdentityRecord, StoreError> {
        if cid.is_placeholder() {
            return Err(StoreError::Placeholder(cid.clone()));
        }
        self.primary.retrieve(cid).await
    }
}

/// Synthesize a `local-<name>-<millis>-<suffix>` id for a record.
#[must_use]
pub fn placeholder_for(record: &IdentityRecord) -> ContentId {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    ContentId::placeholder(
        &name_fragment(&record.name),
        Utc::now().timestamp_millis(),
        &suffix,
    )
}

/// Lowercase the name and collapse non-alphanumeric runs into `-`.
fn name_fragment(name: &str) -> String {
    let mut fragment = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            fragment.push(c.to_ascii_lowercase());
        } else if !fragment.is_empty() && !fragment.ends_with('-') {
            fragment.push('-');
        }
    }

    let fragment: String = fragment.chars().take(MAX_FRAGMENT_LEN).collect();
    let fragment = fragment.trim_matches('-');
    if fragment.is_empty() {
        "card".to_string()
    } else {
        fragment.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FailingStore;

    #[async_trait]
    impl ContentStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn store(
            &self,
            _record: &IdentityRecord,
            _image: Option<ImageBlob>,
        ) -> Result<ContentId, StoreError> {
            Err(StoreError::Unavailable {
                store: "failing",
                reason: "connection refused".to_string(),
            })
        }

        async fn retrieve(&self, cid: &ContentId) -> Result<IdentityRecord, StoreError> {
            Err(StoreError::NotFound {
                store: "failing",
                cid: cid.clone(),
            })
        }
    }

    fn record(name: &str) -> IdentityRecord {
        let mut record = IdentityRecord::empty();
        record.name = name.to_string();
        record.tagline = Some("Engineer".to_string());
        record
    }

    #[test]
    fn test_name_fragment() {
        assert_eq!(name_fragment("Ada Lovelace"), "ada-lovelace");
        assert_eq!(name_fragment("  Dr. J. Doe!  "), "dr-j-doe");
        assert_eq!(name_fragment("日本"), "card");
        assert_eq!(name_fragment(""), "card");
        assert!(name_fragment(&"x".repeat(100)).len() <= MAX_FRAGMENT_LEN);
    }

    #[test]
    fn test_placeholder_shape() {
        let cid = placeholder_for(&record("Ada Lovelace"));
        assert!(cid.is_placeholder());

        let rest = cid.as_str().strip_prefix("local-ada-lovelace-").unwrap();
        let (millis, suffix) = rest.rsplit_once('-').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[tokio::test]
    async fn test_store_falls_back_on_failure() {
        let store = FallbackContentStore::new(FailingStore);
        let cid = store.store(&record("Ada"), None).await.unwrap();
        assert!(cid.as_str().starts_with("local-ada-"));
    }

    #[tokio::test]
    async fn test_retrieve_refuses_placeholder() {
        let store = FallbackContentStore::new(FailingStore);
        let cid = placeholder_for(&record("Ada"));
        let err = store.retrieve(&cid).await.unwrap_err();
        assert!(matches!(err, StoreError::Placeholder(_)));

        let real = ContentId::parse("cid123").unwrap();
        let err = store.retrieve(&real).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
