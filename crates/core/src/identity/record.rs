//! The identity record and its constructors.

use core::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::contact::ScannedContact;
use super::stored::StoredCard;
use super::vcard::{self, ContactCard};
use crate::types::{Address, ContentId, TxHash};

/// A required field of an [`IdentityRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    Name,
    Tagline,
}

impl RequiredField {
    /// The field name as shown to users.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Tagline => "tagline",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger-side attributes attached after a confirmed registry submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Identifier returned by the content store.
    pub content_id: ContentId,
    /// Wallet address that submitted the identifier.
    pub owner_address: Address,
    /// Ledger transaction that recorded it.
    pub confirmation_ref: TxHash,
}

/// Fields of the editable profile form.
///
/// Every text field is a plain string; empty means "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftForm {
    pub name: String,
    pub tagline: String,
    pub role: String,
    pub organization: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub ens: String,
    pub farcaster: String,
    pub twitter: String,
    pub github: String,
    pub transferable: bool,
}

/// A user's profile.
///
/// Constructors never fail; validity is reported by [`IdentityRecord::validate`]
/// and [`IdentityRecord::missing_fields`]. Fields are freely mutable while the
/// record is a draft. Once submitted, only the [`Attestation`] is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub name: String,
    pub tagline: Option<String>,
    pub role: Option<String>,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub ens: Option<String>,
    pub farcaster: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub profile_image: Option<String>,
    pub transferable: bool,
    pub created_at: DateTime<Utc>,
    attestation: Option<Attestation>,
}

impl IdentityRecord {
    /// An empty draft created now.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            tagline: None,
            role: None,
            organization: None,
            email: None,
            phone: None,
            website: None,
            ens: None,
            farcaster: None,
            twitter: None,
            github: None,
            profile_image: None,
            transferable: false,
            created_at: Utc::now(),
            attestation: None,
        }
    }

    /// Build a record from user-entered form fields. No validation is performed.
    #[must_use]
    pub fn from_draft_form(form: DraftForm) -> Self {
        Self {
            name: form.name,
            tagline: non_empty(form.tagline),
            role: non_empty(form.role),
            organization: non_empty(form.organization),
            email: non_empty(form.email),
            phone: non_empty(form.phone),
            website: non_empty(form.website),
            ens: non_empty(form.ens),
            farcaster: non_empty(form.farcaster),
            twitter: non_empty(form.twitter),
            github: non_empty(form.github),
            transferable: form.transferable,
            ..Self::empty()
        }
    }

    /// Build a pre-filled draft from a scanned business card.
    ///
    /// The tagline is derived as `"<title> at <company>"`, or just `"<title>"`
    /// when no company was scanned, and left absent without a title.
    #[must_use]
    pub fn from_scanned_contact(contact: ScannedContact) -> Self {
        let title = contact.title.and_then(non_empty);
        let company = contact.company.and_then(non_empty);

        let tagline = title.as_ref().map(|title| match &company {
            Some(company) => format!("{title} at {company}"),
            None => title.clone(),
        });

        Self {
            name: contact.name.unwrap_or_default(),
            tagline,
            role: title,
            organization: company,
            email: contact.email.and_then(non_empty),
            phone: contact.phone.and_then(non_empty),
            website: contact.website.and_then(non_empty),
            ..Self::empty()
        }
    }

    /// Rebuild a record from data read back from the content store.
    ///
    /// A missing or unparseable `createdAt` is replaced with the current time.
    #[must_use]
    pub fn from_stored_data(data: StoredCard) -> Self {
        let created_at = data
            .created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));

        Self {
            name: data.name,
            tagline: data.tagline,
            role: data.role.or(data.title),
            organization: data.organization.or(data.company),
            email: data.email,
            phone: data.phone,
            website: data.website,
            ens: data.ens,
            farcaster: data.farcaster,
            twitter: data.twitter,
            github: data.github,
            profile_image: data.profile_image,
            transferable: data.is_transferable,
            created_at,
            attestation: None,
        }
    }

    /// Whether both `name` and `tagline` are non-empty.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Required fields that are absent or empty, in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<RequiredField> {
        let mut missing = Vec::new();
        if self.name.is_empty() {
            missing.push(RequiredField::Name);
        }
        if self.tagline.as_deref().is_none_or(str::is_empty) {
            missing.push(RequiredField::Tagline);
        }
        missing
    }

    /// Project to exactly the fields persisted to the content store.
    #[must_use]
    pub fn to_storable_form(&self) -> StoredCard {
        StoredCard {
            name: self.name.clone(),
            tagline: self.tagline.clone(),
            role: self.role.clone(),
            organization: self.organization.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            website: self.website.clone(),
            ens: self.ens.clone(),
            farcaster: self.farcaster.clone(),
            twitter: self.twitter.clone(),
            github: self.github.clone(),
            profile_image: self.profile_image.clone(),
            is_transferable: self.transferable,
            created_at: Some(
                self.created_at
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            title: None,
            company: None,
        }
    }

    /// Project back to the editable form fields.
    #[must_use]
    pub fn to_draft_form(&self) -> DraftForm {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        DraftForm {
            name: self.name.clone(),
            tagline: text(&self.tagline),
            role: text(&self.role),
            organization: text(&self.organization),
            email: text(&self.email),
            phone: text(&self.phone),
            website: text(&self.website),
            ens: text(&self.ens),
            farcaster: text(&self.farcaster),
            twitter: text(&self.twitter),
            github: text(&self.github),
            transferable: self.transferable,
        }
    }

    /// Render as a vCard 3.0 document for export.
    #[must_use]
    pub fn to_contact_card(&self) -> String {
        ContactCard {
            full_name: &self.name,
            email: self.email.as_deref(),
            phone: self.phone.as_deref(),
            title: self.role.as_deref(),
            organization: self.organization.as_deref(),
            url: self.website.as_deref(),
        }
        .render()
    }

    /// File name for the exported vCard.
    #[must_use]
    pub fn contact_card_file_name(&self) -> String {
        vcard::file_name(&self.name)
    }

    /// Ledger attributes, present once the record has been confirmed.
    #[must_use]
    pub const fn attestation(&self) -> Option<&Attestation> {
        self.attestation.as_ref()
    }

    /// Whether the record has been confirmed on the ledger.
    #[must_use]
    pub const fn is_attested(&self) -> bool {
        self.attestation.is_some()
    }

    /// Attach the ledger attributes after a confirmed submission.
    pub fn attest(&mut self, attestation: Attestation) {
        self.attestation = Some(attestation);
    }
}

impl Default for IdentityRecord {
    fn default() -> Self {
        Self::empty()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
