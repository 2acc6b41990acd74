//! Upload orchestrator.
//!
//! Drives one submission through
//! `Draft -> Validating -> ObtainingContentId -> SubmittingToLedger -> Confirmed`,
//! with `Failed` reachable from either network step and invalid records
//! returned to `Draft` carrying the missing fields.
//!
//! # Architecture
//!
//! - [`Submission`] owns the record and its observable [`UploadState`]; the
//!   record is editable only while no attempt is in flight
//! - [`UploadOrchestrator`] composes the content store, connection manager
//!   and registry client, and runs attempts against a submission
//!
//! An attempt is refused immediately (`InFlight`) while another attempt on the
//! same submission is running. No step is retried automatically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bemember_core::{Address, Attestation, ContentId, IdentityRecord, RequiredField, TxHash};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::content_store::{ContentStore, ImageBlob, StoreError};
use crate::error::ErrorKind;
use crate::ledger::{ConnectionManager, LedgerError};
use crate::registry::RegistryClient;

// =============================================================================
// States
// =============================================================================

/// Where a submission currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Editable. `missing` lists the fields the last validation rejected.
    Draft { missing: Vec<RequiredField> },
    Validating,
    ObtainingContentId,
    SubmittingToLedger { content_id: ContentId },
    Confirmed(Receipt),
    Failed(SubmitError),
}

/// Payload-free view of [`UploadState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadPhase {
    Draft,
    Validating,
    ObtainingContentId,
    SubmittingToLedger,
    Confirmed,
    Failed,
}

impl UploadPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validating => "validating",
            Self::ObtainingContentId => "obtaining_content_id",
            Self::SubmittingToLedger => "submitting_to_ledger",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UploadState {
    #[must_use]
    pub const fn phase(&self) -> UploadPhase {
        match self {
            Self::Draft { .. } => UploadPhase::Draft,
            Self::Validating => UploadPhase::Validating,
            Self::ObtainingContentId => UploadPhase::ObtainingContentId,
            Self::SubmittingToLedger { .. } => UploadPhase::SubmittingToLedger,
            Self::Confirmed(_) => UploadPhase::Confirmed,
            Self::Failed(_) => UploadPhase::Failed,
        }
    }

    /// Whether a network step is underway and a progress indicator should show.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Validating | Self::ObtainingContentId | Self::SubmittingToLedger { .. }
        )
    }
}

/// Outcome of a confirmed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub content_id: ContentId,
    pub owner_address: Address,
    pub confirmation_ref: TxHash,
    pub block_number: Option<u64>,
}

impl Receipt {
    /// Whether the registered id is a local placeholder rather than stored content.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.content_id.is_placeholder()
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("missing required fields: {}", join_fields(.missing))]
    ValidationFailed { missing: Vec<RequiredField> },

    #[error("a submission attempt is already in flight")]
    InFlight,

    #[error("submission already confirmed; start a new submission to overwrite")]
    AlreadyConfirmed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{stage} timed out after {after:?}")]
    Timeout {
        stage: &'static str,
        after: Duration,
    },
}

impl SubmitError {
    /// Coarse classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::InFlight | Self::AlreadyConfirmed => ErrorKind::Conflict,
            Self::Store(e) => e.kind(),
            Self::Ledger(e) => e.kind(),
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(RequiredField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Submission
// =============================================================================

/// One identity record and the state of its upload.
pub struct Submission {
    id: Uuid,
    record: Mutex<IdentityRecord>,
    state: watch::Sender<UploadState>,
    in_flight: AtomicBool,
}

impl Submission {
    #[must_use]
    pub fn new(record: IdentityRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            record: Mutex::new(record),
            state: watch::Sender::new(UploadState::Draft {
                missing: Vec::new(),
            }),
            in_flight: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the record.
    #[must_use]
    pub fn record(&self) -> IdentityRecord {
        self.lock_record().clone()
    }

    /// Mutate the record.
    ///
    /// Leaves `Failed` for `Draft`, since the edited record is a fresh draft.
    ///
    /// # Errors
    ///
    /// Returns `InFlight` while an attempt runs, or `AlreadyConfirmed` once confirmed.
    pub fn edit(&self, f: impl FnOnce(&mut IdentityRecord)) -> Result<(), SubmitError> {
        let mut record = self.lock_record();
        if self.in_flight.load(Ordering::Acquire) {
            return Err(SubmitError::InFlight);
        }
        if matches!(*self.state.borrow(), UploadState::Confirmed(_)) {
            return Err(SubmitError::AlreadyConfirmed);
        }

        f(&mut record);
        if matches!(*self.state.borrow(), UploadState::Failed(_)) {
            self.set_state(UploadState::Draft {
                missing: Vec::new(),
            });
        }
        Ok(())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> UploadState {
        self.state.borrow().clone()
    }

    /// Observe state transitions.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    fn lock_record(&self) -> std::sync::MutexGuard<'_, IdentityRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: UploadState) {
        info!(submission = %self.id, phase = %state.phase(), "Submission state changed");
        self.state.send_replace(state);
    }

    /// Claim the single in-flight slot.
    fn begin(&self) -> Result<InFlightGuard<'_>, SubmitError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::InFlight);
        }
        let guard = InFlightGuard {
            flag: &self.in_flight,
        };

        if matches!(*self.state.borrow(), UploadState::Confirmed(_)) {
            return Err(SubmitError::AlreadyConfirmed);
        }
        Ok(guard)
    }

    fn fail(&self, error: SubmitError) -> SubmitError {
        warn!(submission = %self.id, kind = %error.kind(), error = %error, "Submission failed");
        self.set_state(UploadState::Failed(error.clone()));
        error
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// =============================================================================
// UploadOrchestrator
// =============================================================================

/// Runs submissions through the content store and the registry.
#[derive(Clone)]
pub struct UploadOrchestrator {
    store: Arc<dyn ContentStore>,
    ledger: ConnectionManager,
    registry: RegistryClient,
    store_timeout: Duration,
}

impl UploadOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        ledger: ConnectionManager,
        registry: RegistryClient,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            registry,
            store_timeout,
        }
    }

    /// Run one attempt for `submission`.
    ///
    /// On success the submission's record carries its attestation and the
    /// state is `Confirmed`. Once the ledger step has started it cannot be
    /// rolled back.
    ///
    /// # Errors
    ///
    /// - `InFlight` / `AlreadyConfirmed` without touching the state
    /// - `ValidationFailed` with the state back at `Draft`
    /// - any store, ledger or timeout error with the state at `Failed`
    #[instrument(skip_all, fields(submission = %submission.id()))]
    pub async fn submit(
        &self,
        submission: &Submission,
        image: Option<ImageBlob>,
    ) -> Result<Receipt, SubmitError> {
        let _guard = submission.begin()?;

        submission.set_state(UploadState::Validating);
        let record = submission.record();
        let missing = record.missing_fields();
        if !missing.is_empty() {
            submission.set_state(UploadState::Draft {
                missing: missing.clone(),
            });
            return Err(SubmitError::ValidationFailed { missing });
        }

        submission.set_state(UploadState::ObtainingContentId);
        let content_id = match tokio::time::timeout(
            self.store_timeout,
            self.store.store(&record, image),
        )
        .await
        {
            Ok(Ok(cid)) => cid,
            Ok(Err(e)) => return Err(submission.fail(e.into())),
            Err(_) => {
                return Err(submission.fail(SubmitError::Timeout {
                    stage: "content_store",
                    after: self.store_timeout,
                }));
            }
        };
        if content_id.is_placeholder() {
            warn!(%content_id, "Submitting a local placeholder id; content was not stored");
        }

        submission.set_state(UploadState::SubmittingToLedger {
            content_id: content_id.clone(),
        });
        let confirmation = match self.submit_to_ledger(&content_id).await {
            Ok(confirmation) => confirmation,
            Err(e) => return Err(submission.fail(e.into())),
        };

        let receipt = Receipt {
            content_id,
            owner_address: confirmation.from,
            confirmation_ref: confirmation.tx_hash,
            block_number: confirmation.block_number,
        };
        submission.lock_record().attest(Attestation {
            content_id: receipt.content_id.clone(),
            owner_address: receipt.owner_address.clone(),
            confirmation_ref: receipt.confirmation_ref.clone(),
        });
        submission.set_state(UploadState::Confirmed(receipt.clone()));

        info!(
            content_id = %receipt.content_id,
            owner = %receipt.owner_address,
            tx = %receipt.confirmation_ref,
            "Identity record confirmed"
        );
        Ok(receipt)
    }

    async fn submit_to_ledger(
        &self,
        content_id: &ContentId,
    ) -> Result<crate::registry::Confirmation, LedgerError> {
        let connection = self.ledger.connect().await?;
        self.registry.submit(&connection, content_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_record() -> IdentityRecord {
        let mut record = IdentityRecord::empty();
        record.name = "Ada Lovelace".to_string();
        record.tagline = Some("Engineer at Acme".to_string());
        record
    }

    #[test]
    fn test_new_submission_is_draft() {
        let submission = Submission::new(valid_record());
        assert_eq!(
            submission.state(),
            UploadState::Draft {
                missing: Vec::new()
            }
        );
        assert!(!submission.state().is_in_flight());
    }

    #[test]
    fn test_begin_is_exclusive() {
        let submission = Submission::new(valid_record());
        let guard = submission.begin().unwrap();
        assert!(matches!(submission.begin(), Err(SubmitError::InFlight)));
        assert!(matches!(
            submission.edit(|r| r.name.clear()),
            Err(SubmitError::InFlight)
        ));
        drop(guard);
        assert!(submission.begin().is_ok());
    }

    #[test]
    fn test_edit_after_failure_returns_to_draft() {
        let submission = Submission::new(valid_record());
        submission.fail(SubmitError::Timeout {
            stage: "content_store",
            after: Duration::from_secs(1),
        });
        assert_eq!(submission.state().phase(), UploadPhase::Failed);

        submission
            .edit(|r| r.tagline = Some("Engineer".to_string()))
            .unwrap();
        assert_eq!(submission.state().phase(), UploadPhase::Draft);
        assert_eq!(submission.record().tagline.as_deref(), Some("Engineer"));
    }

    #[test]
    fn test_confirmed_is_final() {
        let submission = Submission::new(valid_record());
        submission.set_state(UploadState::Confirmed(Receipt {
            content_id: ContentId::parse("cid123").unwrap(),
            owner_address: Address::parse("0x52908400098527886e0f7030069857d2e4169ee7").unwrap(),
            confirmation_ref: TxHash::parse(
                "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            )
            .unwrap(),
            block_number: None,
        }));

        assert!(matches!(
            submission.begin(),
            Err(SubmitError::AlreadyConfirmed)
        ));
        assert!(matches!(
            submission.edit(|_| {}),
            Err(SubmitError::AlreadyConfirmed)
        ));
        // The refused attempt released the slot.
        assert!(!submission.in_flight.load(Ordering::Acquire));
    }

    #[test]
    fn test_validation_error_message() {
        let err = SubmitError::ValidationFailed {
            missing: vec![RequiredField::Name, RequiredField::Tagline],
        };
        assert_eq!(err.to_string(), "missing required fields: name, tagline");
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(SubmitError::InFlight.kind(), ErrorKind::Conflict);
    }
}
