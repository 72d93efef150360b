//! Filesystem scope store

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::{ConfigDocument, ProjectContext, SettingsError, SettingsResult, Tier};

use super::scope::ScopeStore;

/// Settings file name inside the user directory and the project subdirectory
const SETTINGS_FILE: &str = "settings.json";

/// Machine-local override file name inside the project subdirectory
const LOCAL_SETTINGS_FILE: &str = "settings.local.json";

/// Subdirectory of the project root holding project-scoped documents
const PROJECT_SUBDIR: &str = ".agent";

/// Scope store backed by JSON files
///
/// The user tier lives under a configurable directory, project-scoped tiers
/// live under `<project>/.agent/`, and the managed tier is an optional
/// explicit path (absent by default). Where each directory sits on a given
/// OS is the caller's concern.
#[derive(Debug, Clone)]
pub struct FsScopeStore {
    user_dir: PathBuf,
    managed_file: Option<PathBuf>,
}

impl FsScopeStore {
    /// Create a store with the given user settings directory and no managed
    /// document
    pub fn new(user_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            managed_file: None,
        }
    }

    /// Set the path of the enterprise-managed document
    pub fn with_managed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.managed_file = Some(path.into());
        self
    }

    /// Get the user settings directory
    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    /// The file path backing a tier's document, if one can exist in this
    /// context
    pub fn document_path(&self, tier: Tier, ctx: &ProjectContext) -> Option<PathBuf> {
        match tier {
            Tier::Managed => self.managed_file.clone(),
            Tier::User => Some(self.user_dir.join(SETTINGS_FILE)),
            Tier::Project => ctx
                .project_dir
                .as_ref()
                .map(|dir| dir.join(PROJECT_SUBDIR).join(SETTINGS_FILE)),
            Tier::Local => ctx
                .project_dir
                .as_ref()
                .map(|dir| dir.join(PROJECT_SUBDIR).join(LOCAL_SETTINGS_FILE)),
        }
    }

    fn writable_path(&self, tier: Tier, ctx: &ProjectContext) -> SettingsResult<PathBuf> {
        if tier.is_readonly() {
            return Err(SettingsError::validation(
                "The managed tier is read-only and cannot be written",
            ));
        }
        self.document_path(tier, ctx).ok_or_else(|| {
            SettingsError::validation(format!("A project directory is required for the {tier} tier"))
        })
    }
}

#[async_trait]
impl ScopeStore for FsScopeStore {
    async fn load(&self, tier: Tier, ctx: &ProjectContext) -> SettingsResult<ConfigDocument> {
        let Some(path) = self.document_path(tier, ctx) else {
            return Ok(ConfigDocument::new());
        };
        if !path.exists() {
            return Ok(ConfigDocument::new());
        }

        let bytes = tokio::fs::read(&path).await?;
        let document: ConfigDocument = serde_json::from_slice(&bytes)?;
        debug!(tier = %tier, path = %path.display(), "loaded tier document");
        Ok(document)
    }

    async fn save(
        &self,
        tier: Tier,
        ctx: &ProjectContext,
        document: &ConfigDocument,
    ) -> SettingsResult<()> {
        let path = self.writable_path(tier, ctx)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a temp file in the same directory, then rename over the
        // target, so a crash mid-write never leaves a half-written document.
        let json = serde_json::to_vec_pretty(document)?;
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(&parent)?;
            tmp.write_all(&json)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        written?;

        debug!(tier = %tier, "saved tier document");
        Ok(())
    }

    async fn exists(&self, tier: Tier, ctx: &ProjectContext) -> bool {
        self.document_path(tier, ctx)
            .map(|path| path.exists())
            .unwrap_or(false)
    }
}
