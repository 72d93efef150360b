//! Authority tiers and request context
//!
//! A [`Tier`] is one independently editable settings document. The engine
//! always enforces the fixed precedence `managed > local > project > user`;
//! any other ordering is a display concern, not an enforcement one.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::{SettingsError, SettingsResult};

/// One configuration document per tier, an arbitrarily nested JSON mapping
pub type ConfigDocument = serde_json::Map<String, serde_json::Value>;

/// An authority tier contributing to the effective configuration
///
/// Variant order matches enforcement precedence (highest authority first),
/// so the derived `Ord` sorts tiers from most to least authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Enterprise-managed settings, read-only from this engine
    Managed,
    /// Machine-local override (`settings.local.json` in the project)
    Local,
    /// Project-shared settings
    Project,
    /// User-global settings
    User,
}

impl Tier {
    /// All tiers in enforcement precedence order, highest authority first
    pub const PRECEDENCE: [Tier; 4] = [Tier::Managed, Tier::Local, Tier::Project, Tier::User];

    /// The canonical name used in persisted documents and API payloads
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Managed => "managed",
            Tier::Local => "local",
            Tier::Project => "project",
            Tier::User => "user",
        }
    }

    /// Parse a tier name, rejecting anything outside the fixed set
    pub fn parse(s: &str) -> SettingsResult<Tier> {
        match s {
            "managed" => Ok(Tier::Managed),
            "local" => Ok(Tier::Local),
            "project" => Ok(Tier::Project),
            "user" => Ok(Tier::User),
            other => Err(SettingsError::validation(format!(
                "Unknown tier: {other}. Must be one of: managed, local, project, user"
            ))),
        }
    }

    /// Whether the tier rejects writes (only `managed` does)
    pub fn is_readonly(self) -> bool {
        matches!(self, Tier::Managed)
    }

    /// Whether this tier's document lives under the project directory
    pub fn is_project_scoped(self) -> bool {
        matches!(self, Tier::Project | Tier::Local)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request context identifying the project a caller is operating in
///
/// Project-scoped tiers resolve to empty documents when no project directory
/// is set; writes to them fail validation instead.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    /// Root directory of the active project, if any
    pub project_dir: Option<PathBuf>,
}

impl ProjectContext {
    /// Context with no active project
    pub fn none() -> Self {
        Self::default()
    }

    /// Context rooted at a project directory
    pub fn for_project(dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: Some(dir.into()),
        }
    }
}
