//! Settings engine facade
//!
//! [`SettingsEngine`] exposes the transport-agnostic operations the
//! surrounding system calls: resolved-config reads, per-tier settings
//! reads/writes, side-effect-free validation, rule CRUD, and permission
//! evaluation. Every operation is a short-lived unit of work over the store;
//! nothing is cached between calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::{ConfigDocument, ProjectContext, SettingsError, SettingsResult, Tier};
use crate::evaluator::{Decision, PermissionEvaluator};
use crate::pattern;
use crate::resolver::{resolve_documents, MergeResolver, ResolvedKey};
use crate::rules::{
    NewRule, PermissionRule, PermissionSettings, PermissionSettingsPatch, RuleKind, RulePatch,
    RuleRepository,
};
use crate::sanitize::{self, MigratedPattern, RemovedPattern};
use crate::store::ScopeStore;

/// Status of one tier's document in a resolved-config response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStatus {
    pub settings: ConfigDocument,
    pub exists: bool,
    pub readonly: bool,
}

/// The effective configuration with per-key attribution and tier status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub resolved: BTreeMap<String, ResolvedKey>,
    pub tiers: BTreeMap<Tier, TierStatus>,
}

/// Result of a settings write: the stored document plus sanitization report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutOutcome {
    pub document: ConfigDocument,
    pub migrated_patterns: Vec<MigratedPattern>,
    pub removed_patterns: Vec<RemovedPattern>,
    pub message: String,
}

/// One problem found by a validation dry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub pattern: String,
    pub category: RuleKind,
    pub error: String,
    /// Migrated form, when the deprecated-syntax rewrite would fix it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Outcome of a side-effect-free settings validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// All rules plus the merged settings, as returned by rule listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleListing {
    pub rules: Vec<PermissionRule>,
    pub settings: PermissionSettings,
}

/// Facade over the store, resolver, rule repository, and evaluator
pub struct SettingsEngine<S: ScopeStore> {
    store: S,
}

impl<S: ScopeStore> SettingsEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    fn repository(&self) -> RuleRepository<'_, S> {
        RuleRepository::new(&self.store)
    }

    /// Effective configuration across all tiers with source attribution
    pub async fn get_resolved_config(&self, ctx: &ProjectContext) -> SettingsResult<ResolvedConfig> {
        let resolver = MergeResolver::new(&self.store);
        let documents = resolver.load_all(ctx).await?;
        let resolved = resolve_documents(&documents);

        let mut tiers = BTreeMap::new();
        for tier in Tier::PRECEDENCE {
            tiers.insert(
                tier,
                TierStatus {
                    settings: documents.get(&tier).cloned().unwrap_or_default(),
                    exists: self.store.exists(tier, ctx).await,
                    readonly: tier.is_readonly(),
                },
            );
        }

        Ok(ResolvedConfig { resolved, tiers })
    }

    /// The raw (unmerged) document of one tier
    pub async fn get_scoped_settings(
        &self,
        tier: Tier,
        ctx: &ProjectContext,
    ) -> SettingsResult<ConfigDocument> {
        self.store.load(tier, ctx).await
    }

    /// Merge a partial document onto a tier, sanitize, and persist
    ///
    /// The pipeline is deep-merge onto the stored document first, then
    /// sanitization over the full post-merge rule set, so stored state can
    /// never drift into an unparseable form.
    pub async fn put_scoped_settings(
        &self,
        tier: Tier,
        ctx: &ProjectContext,
        partial: ConfigDocument,
    ) -> SettingsResult<PutOutcome> {
        if tier.is_readonly() {
            return Err(SettingsError::validation(
                "The managed tier is read-only and cannot be written",
            ));
        }

        let existing = self.store.load(tier, ctx).await?;
        let merged = sanitize::deep_merge(&existing, &partial);
        let outcome = sanitize::sanitize(merged);
        self.store.save(tier, ctx, &outcome.document).await?;

        let mut message = String::from("Settings updated successfully");
        if !outcome.migrated.is_empty() {
            message.push_str(&format!(
                " ({} pattern(s) auto-migrated)",
                outcome.migrated.len()
            ));
        }
        if !outcome.removed.is_empty() {
            message.push_str(&format!(
                " ({} invalid pattern(s) removed)",
                outcome.removed.len()
            ));
        }

        Ok(PutOutcome {
            document: outcome.document,
            migrated_patterns: outcome.migrated,
            removed_patterns: outcome.removed,
            message,
        })
    }

    /// Dry-run the pattern grammar over a candidate document
    ///
    /// Never touches storage. Issues carry the classification error and,
    /// where the deprecated-syntax rewrite applies, the migrated form as a
    /// suggestion.
    pub fn validate_settings(&self, candidate: &ConfigDocument) -> ValidationReport {
        let mut issues = Vec::new();

        if let Some(Value::Object(permissions)) = candidate.get("permissions") {
            for kind in RuleKind::ALL {
                let Some(Value::Array(entries)) = permissions.get(kind.as_str()) else {
                    continue;
                };
                for entry in entries {
                    let Some(raw) = entry.as_str() else {
                        issues.push(ValidationIssue {
                            pattern: entry.to_string(),
                            category: kind,
                            error: "Pattern is not a string".to_string(),
                            suggestion: None,
                        });
                        continue;
                    };
                    if let Err(err) = pattern::classify(raw) {
                        let suggestion = pattern::migrate(raw)
                            .filter(|candidate| pattern::classify(candidate).is_ok());
                        issues.push(ValidationIssue {
                            pattern: raw.to_string(),
                            category: kind,
                            error: err.to_string(),
                            suggestion,
                        });
                    }
                }
            }
        }

        ValidationReport {
            valid: issues.is_empty(),
            issues,
        }
    }

    /// All permission rules with merged settings
    pub async fn list_rules(&self, ctx: &ProjectContext) -> SettingsResult<RuleListing> {
        let (rules, settings) = self.repository().list(ctx).await?;
        Ok(RuleListing { rules, settings })
    }

    /// Add a permission rule; the returned rule carries its derived id
    pub async fn add_rule(
        &self,
        new: NewRule,
        ctx: &ProjectContext,
    ) -> SettingsResult<PermissionRule> {
        self.repository().add(new, ctx).await
    }

    /// Patch a rule by id (tier immutable, id changes with the pattern)
    pub async fn update_rule(
        &self,
        id: Uuid,
        patch: RulePatch,
        ctx: &ProjectContext,
    ) -> SettingsResult<PermissionRule> {
        self.repository().update(id, patch, ctx).await
    }

    /// Remove a rule by id from a tier
    pub async fn remove_rule(
        &self,
        id: Uuid,
        tier: Tier,
        ctx: &ProjectContext,
    ) -> SettingsResult<()> {
        self.repository().remove(id, tier, ctx).await
    }

    /// Write the supplied permission settings fields on one tier
    pub async fn put_permission_settings(
        &self,
        patch: PermissionSettingsPatch,
        tier: Tier,
        ctx: &ProjectContext,
    ) -> SettingsResult<PermissionSettings> {
        self.repository().update_settings(patch, tier, ctx).await
    }

    /// Decide allow/ask/deny for a concrete tool invocation
    pub async fn evaluate(
        &self,
        tool: &str,
        argument: Option<&str>,
        ctx: &ProjectContext,
    ) -> SettingsResult<Decision> {
        PermissionEvaluator::new(&self.store)
            .evaluate(tool, argument, ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsScopeStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: serde_json::Value) -> ConfigDocument {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn test_engine() -> (SettingsEngine<FsScopeStore>, TempDir, TempDir) {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let engine = SettingsEngine::new(FsScopeStore::new(user.path()));
        (engine, user, project)
    }

    #[tokio::test]
    async fn test_put_then_resolve_with_attribution() {
        let (engine, _u, project) = test_engine();
        let ctx = ProjectContext::for_project(project.path());

        engine
            .put_scoped_settings(Tier::User, &ctx, doc(json!({"model": "fast"})))
            .await
            .unwrap();
        engine
            .put_scoped_settings(Tier::Project, &ctx, doc(json!({"model": "careful"})))
            .await
            .unwrap();

        let config = engine.get_resolved_config(&ctx).await.unwrap();
        let key = &config.resolved["model"];
        assert_eq!(key.effective_value, json!("careful"));
        assert_eq!(key.source_tier, Tier::Project);

        assert!(config.tiers[&Tier::User].exists);
        assert!(config.tiers[&Tier::Project].exists);
        assert!(!config.tiers[&Tier::Managed].exists);
        assert!(config.tiers[&Tier::Managed].readonly);
    }

    #[tokio::test]
    async fn test_put_reports_sanitization() {
        let (engine, _u, project) = test_engine();
        let ctx = ProjectContext::for_project(project.path());

        let outcome = engine
            .put_scoped_settings(
                Tier::User,
                &ctx,
                doc(json!({"permissions": {"allow": ["Bash(ls *)", "Bash(ls:*)", 42]}})),
            )
            .await
            .unwrap();

        assert_eq!(outcome.migrated_patterns.len(), 1);
        assert_eq!(outcome.removed_patterns.len(), 1);
        assert_eq!(
            outcome.message,
            "Settings updated successfully (1 pattern(s) auto-migrated) (1 invalid pattern(s) removed)"
        );
        assert_eq!(
            outcome.document["permissions"]["allow"],
            json!(["Bash(ls *)", "Bash(ls *)"])
        );

        // The sanitized form is what got persisted
        let stored = engine.get_scoped_settings(Tier::User, &ctx).await.unwrap();
        assert_eq!(stored, outcome.document);
    }

    #[tokio::test]
    async fn test_put_deep_merges_before_sanitizing() {
        let (engine, _u, project) = test_engine();
        let ctx = ProjectContext::for_project(project.path());

        engine
            .put_scoped_settings(
                Tier::User,
                &ctx,
                doc(json!({"permissions": {"allow": ["Read"], "defaultMode": "plan"}})),
            )
            .await
            .unwrap();

        // A new allow list replaces the old one; defaultMode survives
        let outcome = engine
            .put_scoped_settings(
                Tier::User,
                &ctx,
                doc(json!({"permissions": {"allow": ["Bash(ls *)"]}})),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.document["permissions"]["allow"],
            json!(["Bash(ls *)"])
        );
        assert_eq!(outcome.document["permissions"]["defaultMode"], json!("plan"));
    }

    #[tokio::test]
    async fn test_put_managed_rejected() {
        let (engine, _u, _p) = test_engine();
        let err = engine
            .put_scoped_settings(Tier::Managed, &ProjectContext::none(), ConfigDocument::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));
    }

    #[tokio::test]
    async fn test_validate_settings_is_side_effect_free() {
        let (engine, _u, _p) = test_engine();
        let ctx = ProjectContext::none();

        let report = engine.validate_settings(&doc(json!({
            "permissions": {
                "allow": ["Bash(ls *)", "Bash(npm run:*)"],
                "deny": [7]
            }
        })));

        assert!(!report.valid);
        assert_eq!(report.issues.len(), 2);

        let deprecated = &report.issues[0];
        assert_eq!(deprecated.pattern, "Bash(npm run:*)");
        assert_eq!(deprecated.category, RuleKind::Allow);
        assert_eq!(deprecated.suggestion.as_deref(), Some("Bash(npm run *)"));

        let non_string = &report.issues[1];
        assert_eq!(non_string.pattern, "7");
        assert_eq!(non_string.category, RuleKind::Deny);
        assert_eq!(non_string.suggestion, None);

        // Nothing was written
        assert!(!engine.store().exists(Tier::User, &ctx).await);

        let clean = engine.validate_settings(&doc(json!({
            "permissions": {"allow": ["Bash(ls *)"]}
        })));
        assert!(clean.valid);
        assert!(clean.issues.is_empty());
    }

    #[tokio::test]
    async fn test_rule_crud_through_engine() {
        let (engine, _u, project) = test_engine();
        let ctx = ProjectContext::for_project(project.path());

        let rule = engine
            .add_rule(
                NewRule {
                    kind: RuleKind::Allow,
                    pattern: "Bash(git status)".to_string(),
                    tier: Tier::User,
                },
                &ctx,
            )
            .await
            .unwrap();

        let listing = engine.list_rules(&ctx).await.unwrap();
        assert_eq!(listing.rules.len(), 1);

        let updated = engine
            .update_rule(
                rule.id,
                RulePatch {
                    kind: Some(RuleKind::Ask),
                    pattern: None,
                },
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(updated.kind, RuleKind::Ask);

        engine.remove_rule(updated.id, Tier::User, &ctx).await.unwrap();
        let listing = engine.list_rules(&ctx).await.unwrap();
        assert!(listing.rules.is_empty());
    }

    #[tokio::test]
    async fn test_permission_settings_roundtrip_and_evaluate() {
        let (engine, _u, project) = test_engine();
        let ctx = ProjectContext::for_project(project.path());

        let settings = engine
            .put_permission_settings(
                PermissionSettingsPatch {
                    default_mode: Some(crate::rules::DefaultMode::DontAsk),
                    ..Default::default()
                },
                Tier::User,
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(settings.default_mode, crate::rules::DefaultMode::DontAsk);

        let decision = engine.evaluate("WebSearch", None, &ctx).await.unwrap();
        assert_eq!(decision, Decision::Allow);

        engine
            .add_rule(
                NewRule {
                    kind: RuleKind::Deny,
                    pattern: "WebSearch".to_string(),
                    tier: Tier::Project,
                },
                &ctx,
            )
            .await
            .unwrap();
        let decision = engine.evaluate("WebSearch", None, &ctx).await.unwrap();
        assert_eq!(decision, Decision::Deny);
    }
}
