//! IPFS content store over the HTTP API.
//!
//! Uses `reqwest` multipart uploads for writes and plain gateway GETs for reads.
//! Reads are cached using `moka` (10-minute TTL).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bemember_core::{ContentId, IdentityRecord, StoredCard};
use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{ContentStore, ImageBlob, StoreError};
use crate::config::IpfsConfig;

const STORE_NAME: &str = "ipfs";

/// Public gateways that serve any pinned content.
pub const ALTERNATE_GATEWAYS: &[&str] = &[
    "https://ipfs.io/ipfs",
    "https://gateway.pinata.cloud/ipfs",
    "https://cloudflare-ipfs.com/ipfs",
];

/// Response from `POST /api/v0/add`.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

// =============================================================================
// IpfsContentStore
// =============================================================================

/// Content store backed by an IPFS HTTP API and gateway.
#[derive(Clone)]
pub struct IpfsContentStore {
    inner: Arc<IpfsContentStoreInner>,
}

struct IpfsContentStoreInner {
    client: reqwest::Client,
    config: IpfsConfig,
    cache: Cache<ContentId, IdentityRecord>,
}

impl IpfsContentStore {
    /// Create a new IPFS store client.
    ///
    /// `request_timeout` caps each individual HTTP request.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &IpfsConfig, request_timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Unavailable {
                store: STORE_NAME,
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(600)) // 10 minutes
            .build();

        Ok(Self {
            inner: Arc::new(IpfsContentStoreInner {
                client,
                config: config.clone(),
                cache,
            }),
        })
    }

    /// Browser-accessible URL for a content id on the configured gateway.
    #[must_use]
    pub fn gateway_url(&self, cid: &ContentId) -> String {
        format!(
            "{}/{cid}",
            self.inner.config.gateway_url.as_str().trim_end_matches('/')
        )
    }

    /// Upload one file and return the id the store assigned to it.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn add(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ContentId, StoreError> {
        let (project_id, secret) = self
            .inner
            .config
            .basic_auth()
            .ok_or(StoreError::Unauthenticated { store: STORE_NAME })?;

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| StoreError::Unavailable {
                store: STORE_NAME,
                reason: format!("invalid content type: {e}"),
            })?;
        let form = Form::new().part("file", part);

        let url = format!(
            "{}/add?pin=true",
            self.inner.config.api_url.as_str().trim_end_matches('/')
        );

        let response = self
            .inner
            .client
            .post(&url)
            .basic_auth(project_id, Some(secret))
            .multipart(form)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                store: STORE_NAME,
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let added: AddResponse = response.json().await.map_err(unavailable)?;
        let cid = ContentId::parse(&added.hash).map_err(|e| StoreError::Unavailable {
            store: STORE_NAME,
            reason: format!("store returned an invalid content id: {e}"),
        })?;

        debug!(%cid, "Added to IPFS");
        Ok(cid)
    }
}

#[async_trait]
impl ContentStore for IpfsContentStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    #[instrument(skip(self, record, image), fields(has_image = image.is_some()))]
    async fn store(
        &self,
        record: &IdentityRecord,
        image: Option<ImageBlob>,
    ) -> Result<ContentId, StoreError> {
        let mut stored = record.to_storable_form();

        if let Some(image) = image {
            let image_cid = self
                .add(&image.file_name, &image.content_type, image.bytes)
                .await?;
            stored.profile_image = Some(format!("ipfs://{image_cid}"));
        }

        let json = stored.to_json_pretty().map_err(|e| StoreError::Unavailable {
            store: STORE_NAME,
            reason: format!("failed to encode record: {e}"),
        })?;

        self.add("card.json", "application/json", json.into_bytes())
            .await
    }

    #[instrument(skip(self), fields(cid = %cid))]
    async fn retrieve(&self, cid: &ContentId) -> Result<IdentityRecord, StoreError> {
        if cid.is_placeholder() {
            return Err(StoreError::Placeholder(cid.clone()));
        }

        if let Some(cached) = self.inner.cache.get(cid).await {
            debug!("Cache hit");
            return Ok(cached);
        }

        let response = self
            .inner
            .client
            .get(self.gateway_url(cid))
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Err(StoreError::NotFound {
                store: STORE_NAME,
                cid: cid.clone(),
            });
        }
        if !status.is_success() {
            return Err(StoreError::Unavailable {
                store: STORE_NAME,
                reason: format!("gateway returned HTTP {status}"),
            });
        }

        let bytes = response.bytes().await.map_err(unavailable)?;
        let record = decode_record(cid, &bytes)?;

        self.inner.cache.insert(cid.clone(), record.clone()).await;
        Ok(record)
    }
}

/// Decode gateway bytes into a record.
fn decode_record(cid: &ContentId, bytes: &[u8]) -> Result<IdentityRecord, StoreError> {
    StoredCard::from_json_slice(bytes)
        .map(IdentityRecord::from_stored_data)
        .map_err(|e| StoreError::Decode {
            cid: cid.clone(),
            reason: e.to_string(),
        })
}

#[allow(clippy::needless_pass_by_value)]
fn unavailable(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable {
        store: STORE_NAME,
        reason: e.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::extract::{Multipart, Path, State};
    use axum::http::{HeaderMap, StatusCode as HttpStatus};
    use axum::routing::{get, post};
    use secrecy::SecretString;
    use url::Url;

    use super::*;
    use crate::config::{IpfsCredentials, Timeouts};
    use crate::error::ErrorKind;

    fn config(credentials: Option<IpfsCredentials>) -> IpfsConfig {
        IpfsConfig {
            api_url: Url::parse("http://127.0.0.1:1/api/v0").unwrap(),
            gateway_url: Url::parse("https://ipfs.io/ipfs/").unwrap(),
            credentials,
        }
    }

    fn store(credentials: Option<IpfsCredentials>) -> IpfsContentStore {
        IpfsContentStore::new(&config(credentials), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_gateway_url_trims_slash() {
        let cid = ContentId::parse("bafyexample").unwrap();
        assert_eq!(store(None).gateway_url(&cid), "https://ipfs.io/ipfs/bafyexample");
    }

    #[test]
    fn test_add_response_deserialization() {
        let json = r#"{"Name":"card.json","Hash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","Size":"42"}"#;
        let added: AddResponse = serde_json::from_str(json).unwrap();
        assert_eq!(added.hash, "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
    }

    #[test]
    fn test_decode_record() {
        let cid = ContentId::parse("cid123").unwrap();
        let record = decode_record(&cid, br#"{"name":"Ada","tagline":"Engineer"}"#).unwrap();
        assert_eq!(record.name, "Ada");
        assert!(record.validate());

        let err = decode_record(&cid, b"not json").unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_store_without_credentials_is_unauthenticated() {
        let record = IdentityRecord::empty();
        let err = store(None).store(&record, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthenticated { store: "ipfs" }));
    }

    #[tokio::test]
    async fn test_retrieve_placeholder_short_circuits() {
        let cid = ContentId::placeholder("card", 1, "abcdefgh");
        let err = store(None).retrieve(&cid).await.unwrap_err();
        assert!(matches!(err, StoreError::Placeholder(_)));
    }

    #[tokio::test]
    async fn test_store_unreachable_api_is_unavailable() {
        let err = store(Some(credentials()))
            .store(&ada(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { store: "ipfs", .. }));
    }

    // =========================================================================
    // Against a local IPFS stub
    // =========================================================================

    fn credentials() -> IpfsCredentials {
        IpfsCredentials {
            project_id: "project".to_string(),
            project_secret: SecretString::from("9f3b2c71e0ad4d8c8b5a6e1f0c2d7a94"),
        }
    }

    fn ada() -> IdentityRecord {
        let mut record = IdentityRecord::empty();
        record.name = "Ada Lovelace".to_string();
        record.tagline = Some("Engineer at Acme".to_string());
        record
    }

    #[derive(Clone, Default)]
    struct StubIpfs {
        reject_uploads: bool,
        gets: Arc<AtomicUsize>,
        uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    async fn gateway(State(stub): State<StubIpfs>, Path(cid): Path<String>) -> (HttpStatus, String) {
        stub.gets.fetch_add(1, Ordering::SeqCst);
        match cid.as_str() {
            "missing" => (HttpStatus::NOT_FOUND, "not found".to_string()),
            "unpinned" => (HttpStatus::GONE, String::new()),
            "overloaded" => (HttpStatus::BAD_GATEWAY, "upstream timeout".to_string()),
            "garbled" => (HttpStatus::OK, "<html>not a card</html>".to_string()),
            _ => (
                HttpStatus::OK,
                r#"{"name":"Ada Lovelace","tagline":"Engineer at Acme"}"#.to_string(),
            ),
        }
    }

    async fn add(
        State(stub): State<StubIpfs>,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> (HttpStatus, String) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Basic "));
        if !authorized {
            return (HttpStatus::UNAUTHORIZED, "missing credentials".to_string());
        }

        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            stub.uploads.lock().unwrap().push((name, bytes.to_vec()));
        }
        if stub.reject_uploads {
            return (HttpStatus::FORBIDDEN, "invalid project id".to_string());
        }

        let n = stub.uploads.lock().unwrap().len();
        (
            HttpStatus::OK,
            format!(r#"{{"Name":"file","Hash":"QmStub{n}","Size":"42"}}"#),
        )
    }

    async fn serve(stub: StubIpfs) -> IpfsContentStore {
        let app = Router::new()
            .route("/ipfs/{cid}", get(gateway))
            .route("/api/v0/add", post(add))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = IpfsConfig {
            api_url: Url::parse(&format!("http://{addr}/api/v0")).unwrap(),
            gateway_url: Url::parse(&format!("http://{addr}/ipfs")).unwrap(),
            credentials: Some(credentials()),
        };
        IpfsContentStore::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_store_uploads_image_then_card() {
        let stub = StubIpfs::default();
        let store = serve(stub.clone()).await;
        let image = ImageBlob::new("avatar.png", vec![0x89, 0x50, 0x4e, 0x47]);

        let cid = store.store(&ada(), Some(image)).await.unwrap();

        assert_eq!(cid.as_str(), "QmStub2");
        let uploads = stub.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].0, "avatar.png");
        assert_eq!(uploads[0].1, vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(uploads[1].0, "card.json");

        let card = StoredCard::from_json_slice(&uploads[1].1).unwrap();
        assert_eq!(card.name, "Ada Lovelace");
        assert_eq!(card.profile_image.as_deref(), Some("ipfs://QmStub1"));
    }

    #[tokio::test]
    async fn test_store_rejected_upload() {
        let stub = StubIpfs {
            reject_uploads: true,
            ..StubIpfs::default()
        };
        let store = serve(stub).await;

        let err = store.store(&ada(), None).await.unwrap_err();

        assert_eq!(
            err,
            StoreError::Rejected {
                store: "ipfs",
                status: 403,
                message: "invalid project id".to_string(),
            }
        );
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_retrieve_decodes_record() {
        let store = serve(StubIpfs::default()).await;
        let cid = ContentId::parse("QmCard").unwrap();

        let record = store.retrieve(&cid).await.unwrap();

        assert_eq!(record.name, "Ada Lovelace");
        assert_eq!(record.tagline.as_deref(), Some("Engineer at Acme"));
    }

    #[tokio::test]
    async fn test_retrieve_missing_and_unpinned_are_not_found() {
        let store = serve(StubIpfs::default()).await;

        for id in ["missing", "unpinned"] {
            let cid = ContentId::parse(id).unwrap();
            let err = store.retrieve(&cid).await.unwrap_err();
            assert_eq!(err, StoreError::NotFound { store: "ipfs", cid });
        }
    }

    #[tokio::test]
    async fn test_retrieve_gateway_error_is_unavailable() {
        let store = serve(StubIpfs::default()).await;
        let cid = ContentId::parse("overloaded").unwrap();

        let err = store.retrieve(&cid).await.unwrap_err();

        assert!(matches!(err, StoreError::Unavailable { store: "ipfs", .. }));
        assert!(err.kind().is_transient());
    }

    #[tokio::test]
    async fn test_retrieve_undecodable_body_is_invalid_data() {
        let store = serve(StubIpfs::default()).await;
        let cid = ContentId::parse("garbled").unwrap();

        let err = store.retrieve(&cid).await.unwrap_err();

        assert!(matches!(err, StoreError::Decode { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_retrieve_is_cached() {
        let stub = StubIpfs::default();
        let store = serve(stub.clone()).await;
        let cid = ContentId::parse("QmCard").unwrap();

        let first = store.retrieve(&cid).await.unwrap();
        let second = store.retrieve(&cid).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(stub.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_retrieve_is_not_cached() {
        let stub = StubIpfs::default();
        let store = serve(stub.clone()).await;
        let cid = ContentId::parse("missing").unwrap();

        store.retrieve(&cid).await.unwrap_err();
        store.retrieve(&cid).await.unwrap_err();

        assert_eq!(stub.gets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hanging_api_fails_within_store_cap() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeouts = Timeouts {
            store: Duration::from_millis(600),
            ..Timeouts::default()
        };
        let config = IpfsConfig {
            api_url: Url::parse(&format!("http://{addr}/api/v0")).unwrap(),
            gateway_url: Url::parse(&format!("http://{addr}/ipfs")).unwrap(),
            credentials: Some(credentials()),
        };
        let store = IpfsContentStore::new(&config, timeouts.store_request()).unwrap();
        let image = ImageBlob::new("avatar.png", vec![1, 2, 3]);

        let result = tokio::time::timeout(timeouts.store, store.store(&ada(), Some(image))).await;

        let err = result.expect("store call outlived its cap").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { store: "ipfs", .. }));
    }
}
