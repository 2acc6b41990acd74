//! BeMember Core - Shared identity types.
//!
//! This crate provides the types used across all BeMember components:
//! - `client` - Content store, wallet, registry and upload orchestration
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure transformations - no I/O, no
//! HTTP clients, no wallet access. This keeps it lightweight and allows it to
//! be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for addresses, chain ids, content ids and hashes
//! - [`identity`] - The identity record, its constructors and projections
//! - [`collection`] - Scanned contact collection with search

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod collection;
pub mod identity;
pub mod types;

pub use collection::ContactCollection;
pub use identity::*;
pub use types::*;
