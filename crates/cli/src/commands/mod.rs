//! Command implementations.

pub mod lookup;
pub mod mint;
pub mod scan;
pub mod watch;
