//! Tier document storage
//!
//! [`ScopeStore`] is the contract the engine depends on: one JSON document
//! per tier, loaded fresh on every operation. [`FsScopeStore`] is the
//! filesystem implementation, with write-to-temp-then-rename durability.

mod fs;
mod scope;

pub use fs::FsScopeStore;
pub use scope::ScopeStore;
