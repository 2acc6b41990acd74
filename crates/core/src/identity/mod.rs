//! Identity record model.
//!
//! A record is built from one of three sources (an empty or user-entered
//! form, a scanned business card, or data read back from the content store)
//! and projected to the stored wire form and to a vCard for export.

pub mod contact;
pub mod record;
pub mod stored;
pub mod vcard;

pub use contact::ScannedContact;
pub use record::{Attestation, DraftForm, IdentityRecord, RequiredField};
pub use stored::StoredCard;
