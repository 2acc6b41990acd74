//! A user's collection of scanned contacts.

use serde::{Deserialize, Serialize};

use crate::identity::ScannedContact;

/// Ordered collection of scanned contacts, newest last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactCollection {
    contacts: Vec<ScannedContact>,
}

impl ContactCollection {
    /// An empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            contacts: Vec::new(),
        }
    }

    /// Append a contact.
    pub fn add(&mut self, contact: ScannedContact) {
        self.contacts.push(contact);
    }

    /// Remove and return the contact at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<ScannedContact> {
        (index < self.contacts.len()).then(|| self.contacts.remove(index))
    }

    /// Number of contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// All contacts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ScannedContact> {
        self.contacts.iter()
    }

    /// Contacts matching `query` (see [`ScannedContact::matches`]).
    pub fn search<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a ScannedContact> {
        self.contacts.iter().filter(move |c| c.matches(query))
    }
}
