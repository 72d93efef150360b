//! Core types shared across the engine
//!
//! Defines the error taxonomy, the authority tiers, and the document
//! representation used by every other module.

pub mod error;
pub mod types;

pub use error::{SettingsError, SettingsResult};
pub use types::{ConfigDocument, ProjectContext, Tier};
