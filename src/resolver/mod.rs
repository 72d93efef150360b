//! Source-attributed configuration resolution
//!
//! Flattens every tier document into dot-separated leaf paths and resolves
//! each path against the fixed precedence `managed > local > project > user`.
//! The effective value of a path is the value from the highest-priority tier
//! that defines it — where "defines" includes an explicit `null`, which is
//! distinct from omitting the path entirely.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{ConfigDocument, ProjectContext, SettingsResult, Tier};
use crate::sanitize::deep_merge;
use crate::store::ScopeStore;

/// One resolved configuration key with its source attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedKey {
    /// Dot-separated leaf path, e.g. `permissions.defaultMode`
    pub path: String,
    /// Value from the highest-priority tier defining the path
    pub effective_value: Value,
    /// Tier the effective value came from
    pub source_tier: Tier,
    /// Every tier's value for the path, keyed in precedence order
    pub values_by_tier: BTreeMap<Tier, Value>,
}

/// Resolves tier documents into an effective, source-attributed view
///
/// Stateless: every call re-reads the tier documents, trading I/O cost for
/// always-current results.
pub struct MergeResolver<'a, S: ScopeStore> {
    store: &'a S,
}

impl<'a, S: ScopeStore> MergeResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Load all tier documents for the given context
    pub async fn load_all(
        &self,
        ctx: &ProjectContext,
    ) -> SettingsResult<BTreeMap<Tier, ConfigDocument>> {
        let mut documents = BTreeMap::new();
        for tier in Tier::PRECEDENCE {
            documents.insert(tier, self.store.load(tier, ctx).await?);
        }
        Ok(documents)
    }

    /// Resolve every leaf path across all tiers
    pub async fn resolve(
        &self,
        ctx: &ProjectContext,
    ) -> SettingsResult<BTreeMap<String, ResolvedKey>> {
        let documents = self.load_all(ctx).await?;
        Ok(resolve_documents(&documents))
    }

    /// Flattened last-applied-wins overlay of the writable tiers
    ///
    /// Layers user, then project, then local, with later documents deep-merged
    /// over earlier ones. This inverts the enforcement precedence and exists
    /// only as a display projection; it must never feed permission decisions.
    pub async fn overlay_view(&self, ctx: &ProjectContext) -> SettingsResult<ConfigDocument> {
        let mut merged = ConfigDocument::new();
        for tier in [Tier::User, Tier::Project, Tier::Local] {
            let document = self.store.load(tier, ctx).await?;
            merged = deep_merge(&merged, &document);
        }
        Ok(merged)
    }
}

/// Resolve already-loaded tier documents
pub fn resolve_documents(
    documents: &BTreeMap<Tier, ConfigDocument>,
) -> BTreeMap<String, ResolvedKey> {
    let mut paths = BTreeSet::new();
    for document in documents.values() {
        collect_leaf_paths(document, "", &mut paths);
    }

    let mut resolved = BTreeMap::new();
    for path in paths {
        let mut values_by_tier = BTreeMap::new();
        let mut effective: Option<(Value, Tier)> = None;

        for tier in Tier::PRECEDENCE {
            let Some(document) = documents.get(&tier) else {
                continue;
            };
            if let Some(value) = lookup_path(document, &path) {
                values_by_tier.insert(tier, value.clone());
                if effective.is_none() {
                    effective = Some((value.clone(), tier));
                }
            }
        }

        if let Some((effective_value, source_tier)) = effective {
            resolved.insert(
                path.clone(),
                ResolvedKey {
                    path,
                    effective_value,
                    source_tier,
                    values_by_tier,
                },
            );
        }
    }
    resolved
}

/// Collect dot-separated leaf paths; empty mappings contribute no leaf
fn collect_leaf_paths(document: &ConfigDocument, prefix: &str, paths: &mut BTreeSet<String>) {
    for (key, value) in document {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => collect_leaf_paths(nested, &path, paths),
            _ => {
                paths.insert(path);
            }
        }
    }
}

/// Walk a dot-separated path; `Some(Null)` means "defined as null"
fn lookup_path<'a>(document: &'a ConfigDocument, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = document.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> ConfigDocument {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn documents(entries: Vec<(Tier, serde_json::Value)>) -> BTreeMap<Tier, ConfigDocument> {
        entries.into_iter().map(|(t, v)| (t, doc(v))).collect()
    }

    #[test]
    fn test_highest_priority_tier_wins() {
        let docs = documents(vec![
            (Tier::Managed, json!({"a": {"b": 1}})),
            (Tier::Local, json!({})),
            (Tier::Project, json!({"a": {"b": 2}})),
            (Tier::User, json!({"a": {"b": 3}})),
        ]);

        let resolved = resolve_documents(&docs);
        let key = &resolved["a.b"];
        assert_eq!(key.effective_value, json!(1));
        assert_eq!(key.source_tier, Tier::Managed);
        assert_eq!(
            key.values_by_tier,
            BTreeMap::from([
                (Tier::Managed, json!(1)),
                (Tier::Project, json!(2)),
                (Tier::User, json!(3)),
            ])
        );
    }

    #[test]
    fn test_explicit_null_is_a_definition() {
        let docs = documents(vec![
            (Tier::Project, json!({"model": null})),
            (Tier::User, json!({"model": "fast"})),
        ]);

        let resolved = resolve_documents(&docs);
        let key = &resolved["model"];
        assert_eq!(key.effective_value, Value::Null);
        assert_eq!(key.source_tier, Tier::Project);
        assert_eq!(key.values_by_tier[&Tier::User], json!("fast"));
    }

    #[test]
    fn test_empty_mapping_contributes_no_leaf() {
        let docs = documents(vec![(Tier::User, json!({"a": {}, "b": 1}))]);
        let resolved = resolve_documents(&docs);
        assert!(!resolved.contains_key("a"));
        assert!(resolved.contains_key("b"));
    }

    #[test]
    fn test_arrays_are_leaves() {
        let docs = documents(vec![(
            Tier::User,
            json!({"permissions": {"allow": ["Bash(ls *)"]}}),
        )]);
        let resolved = resolve_documents(&docs);
        assert_eq!(
            resolved["permissions.allow"].effective_value,
            json!(["Bash(ls *)"])
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let docs = documents(vec![
            (Tier::Managed, json!({"a": 1, "nested": {"x": true}})),
            (Tier::User, json!({"a": 2, "b": "two"})),
        ]);
        assert_eq!(resolve_documents(&docs), resolve_documents(&docs));
    }

    #[tokio::test]
    async fn test_overlay_view_is_last_wins() {
        use crate::store::FsScopeStore;
        use tempfile::TempDir;

        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let store = FsScopeStore::new(user.path());
        let ctx = ProjectContext::for_project(project.path());

        store
            .save(Tier::User, &ctx, &doc(json!({"model": "fast", "verbose": false})))
            .await
            .unwrap();
        store
            .save(Tier::Project, &ctx, &doc(json!({"model": "careful"})))
            .await
            .unwrap();
        store
            .save(Tier::Local, &ctx, &doc(json!({"verbose": true})))
            .await
            .unwrap();

        let resolver = MergeResolver::new(&store);
        let overlay = resolver.overlay_view(&ctx).await.unwrap();
        // Display ordering: local beats project beats user
        assert_eq!(overlay.get("model"), Some(&json!("careful")));
        assert_eq!(overlay.get("verbose"), Some(&json!(true)));

        // Enforcement ordering stays managed > local > project > user
        let resolved = resolver.resolve(&ctx).await.unwrap();
        assert_eq!(resolved["model"].source_tier, Tier::Project);
        assert_eq!(resolved["verbose"].source_tier, Tier::Local);
    }
}
