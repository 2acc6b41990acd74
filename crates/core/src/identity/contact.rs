//! Contact data extracted from a scanned business card.

use serde::{Deserialize, Serialize};

use super::vcard::{self, ContactCard};

/// Fields extracted from a business card photo.
///
/// Every field is optional: a scan may recover any subset of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl ScannedContact {
    /// Render as a vCard for export from a collection.
    #[must_use]
    pub fn to_contact_card(&self) -> String {
        ContactCard {
            full_name: self.name.as_deref().unwrap_or_default(),
            email: self.email.as_deref(),
            phone: self.phone.as_deref(),
            title: self.title.as_deref(),
            organization: self.company.as_deref(),
            url: self.website.as_deref(),
        }
        .render()
    }

    /// File name for the exported vCard.
    #[must_use]
    pub fn contact_card_file_name(&self) -> String {
        vcard::file_name(self.name.as_deref().unwrap_or_default())
    }

    /// Case-insensitive match of `query` against name, email, company and title.
    ///
    /// An empty query matches every contact.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        [&self.name, &self.email, &self.company, &self.title]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&query))
            || query.is_empty()
    }
}
