//! Scope store contract

use async_trait::async_trait;

use crate::core::{ConfigDocument, ProjectContext, SettingsResult, Tier};

/// Storage for one configuration document per authority tier
///
/// Implementations must return an empty document for absent tiers, and must
/// make `save` atomic with respect to crashes — a failed write may lose the
/// update but must never leave a half-written document behind.
///
/// Concurrent writers are not serialized here: every engine operation is a
/// full read-modify-write cycle, so the later of two racing writes wins.
#[async_trait]
pub trait ScopeStore: Send + Sync {
    /// Load the document for a tier, empty if absent
    async fn load(&self, tier: Tier, ctx: &ProjectContext) -> SettingsResult<ConfigDocument>;

    /// Persist the full document for a tier
    ///
    /// Fails with a validation error for the read-only `managed` tier.
    async fn save(
        &self,
        tier: Tier,
        ctx: &ProjectContext,
        document: &ConfigDocument,
    ) -> SettingsResult<()>;

    /// Whether a document currently exists for the tier
    async fn exists(&self, tier: Tier, ctx: &ProjectContext) -> bool;
}
