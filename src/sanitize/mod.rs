//! Write-time sanitization pipeline
//!
//! Every settings write deep-merges the incoming partial document onto the
//! stored one, then runs [`sanitize`] over the full post-merge rule set:
//! non-string entries are dropped, valid patterns are kept, and invalid
//! patterns are auto-migrated where the deprecated-syntax rewrite applies —
//! otherwise removed. Corrections are always reported, never hidden.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::core::ConfigDocument;
use crate::pattern;
use crate::rules::RuleKind;

/// A pattern rewritten by the deprecated-syntax migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedPattern {
    pub original: String,
    pub migrated: String,
    pub category: RuleKind,
}

/// A pattern dropped by sanitization, with the classification error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedPattern {
    pub pattern: String,
    pub category: RuleKind,
    pub reason: String,
}

/// The sanitized document plus a full report of what changed
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeOutcome {
    pub document: ConfigDocument,
    pub migrated: Vec<MigratedPattern>,
    pub removed: Vec<RemovedPattern>,
}

/// Deep-merge `incoming` onto `base`
///
/// Mapping-valued keys merge recursively; any other value type, arrays
/// included, is replaced wholesale by the incoming value.
pub fn deep_merge(base: &ConfigDocument, incoming: &ConfigDocument) -> ConfigDocument {
    let mut merged = base.clone();
    for (key, value) in incoming {
        let replacement = match (merged.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(update)) => {
                Value::Object(deep_merge(existing, update))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), replacement);
    }
    merged
}

/// Sanitize the permission pattern lists of a full document
///
/// Duplicates that migration collapses into the same spelling are preserved,
/// not deduplicated.
pub fn sanitize(document: ConfigDocument) -> SanitizeOutcome {
    let mut document = document;
    let mut migrated = Vec::new();
    let mut removed = Vec::new();

    let mut permissions = match document.remove("permissions") {
        Some(Value::Object(permissions)) => permissions,
        Some(other) => {
            // Not a mapping: leave it untouched
            document.insert("permissions".to_string(), other);
            return SanitizeOutcome {
                document,
                migrated,
                removed,
            };
        }
        None => {
            return SanitizeOutcome {
                document,
                migrated,
                removed,
            };
        }
    };

    for kind in RuleKind::ALL {
        let Some(Value::Array(entries)) = permissions.get(kind.as_str()) else {
            continue;
        };
        let entries = entries.clone();
        let mut clean = Vec::with_capacity(entries.len());

        for entry in entries {
            let Some(raw) = entry.as_str() else {
                warn!(
                    category = kind.as_str(),
                    entry = %entry,
                    "removed non-string permission pattern"
                );
                removed.push(RemovedPattern {
                    pattern: entry.to_string(),
                    category: kind,
                    reason: "Pattern is not a string".to_string(),
                });
                continue;
            };

            match pattern::classify(raw) {
                Ok(_) => clean.push(Value::String(raw.to_string())),
                Err(err) => {
                    let migrated_form = pattern::migrate(raw)
                        .filter(|candidate| pattern::classify(candidate).is_ok());
                    match migrated_form {
                        Some(candidate) => {
                            info!(
                                category = kind.as_str(),
                                original = raw,
                                migrated = %candidate,
                                "migrated deprecated permission pattern"
                            );
                            clean.push(Value::String(candidate.clone()));
                            migrated.push(MigratedPattern {
                                original: raw.to_string(),
                                migrated: candidate,
                                category: kind,
                            });
                        }
                        None => {
                            warn!(
                                category = kind.as_str(),
                                pattern = raw,
                                reason = %err,
                                "removed invalid permission pattern"
                            );
                            removed.push(RemovedPattern {
                                pattern: raw.to_string(),
                                category: kind,
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }
        }

        permissions.insert(kind.as_str().to_string(), Value::Array(clean));
    }

    document.insert("permissions".to_string(), Value::Object(permissions));
    SanitizeOutcome {
        document,
        migrated,
        removed,
    }
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

    #[test]
    fn test_deep_merge_nested_mappings() {
        let base = doc(json!({"permissions": {"defaultMode": "default", "allow": ["Read"]}}));
        let incoming = doc(json!({"permissions": {"defaultMode": "plan"}, "model": "fast"}));

        let merged = deep_merge(&base, &incoming);
        assert_eq!(
            Value::Object(merged),
            json!({
                "permissions": {"defaultMode": "plan", "allow": ["Read"]},
                "model": "fast"
            })
        );
    }

    #[test]
    fn test_deep_merge_replaces_arrays_wholesale() {
        let base = doc(json!({"permissions": {"allow": ["Read", "Write"]}}));
        let incoming = doc(json!({"permissions": {"allow": ["Bash(ls *)"]}}));

        let merged = deep_merge(&base, &incoming);
        assert_eq!(
            merged["permissions"]["allow"],
            json!(["Bash(ls *)"]),
            "incoming list replaces, never appends"
        );
    }

    #[test]
    fn test_deep_merge_scalar_replaces_mapping() {
        let base = doc(json!({"hooks": {"preToolUse": []}}));
        let incoming = doc(json!({"hooks": null}));
        let merged = deep_merge(&base, &incoming);
        assert_eq!(merged["hooks"], Value::Null);
    }

    #[test]
    fn test_sanitize_migrates_and_removes() {
        let document = doc(json!({
            "permissions": {"allow": ["Bash(ls *)", "Bash(ls:*)", 42]}
        }));

        let outcome = sanitize(document);
        assert_eq!(
            outcome.document["permissions"]["allow"],
            json!(["Bash(ls *)", "Bash(ls *)"])
        );
        assert_eq!(
            outcome.migrated,
            vec![MigratedPattern {
                original: "Bash(ls:*)".to_string(),
                migrated: "Bash(ls *)".to_string(),
                category: RuleKind::Allow,
            }]
        );
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].pattern, "42");
        assert_eq!(outcome.removed[0].reason, "Pattern is not a string");
    }

    #[test]
    fn test_sanitize_preserves_duplicates_after_migration() {
        let document = doc(json!({
            "permissions": {"deny": ["Bash(rm *)", "Bash(rm:*)"]}
        }));

        let outcome = sanitize(document);
        // Both spellings collapse to the same pattern and both are kept
        assert_eq!(
            outcome.document["permissions"]["deny"],
            json!(["Bash(rm *)", "Bash(rm *)"])
        );
    }

    #[test]
    fn test_sanitize_removes_unmigratable() {
        let document = doc(json!({
            "permissions": {"ask": ["Task:explore", "###"]}
        }));

        let outcome = sanitize(document);
        assert_eq!(outcome.document["permissions"]["ask"], json!([]));
        assert_eq!(outcome.removed.len(), 2);
        assert!(outcome.migrated.is_empty());
    }

    #[test]
    fn test_sanitize_ignores_missing_sections() {
        let document = doc(json!({"model": "fast"}));
        let outcome = sanitize(document.clone());
        assert_eq!(outcome.document, document);
        assert!(outcome.migrated.is_empty());
        assert!(outcome.removed.is_empty());

        // Non-array category values are left untouched
        let document = doc(json!({"permissions": {"allow": "Bash"}}));
        let outcome = sanitize(document.clone());
        assert_eq!(outcome.document, document);
    }

    #[test]
    fn test_sanitize_all_three_categories() {
        let document = doc(json!({
            "permissions": {
                "allow": ["Read"],
                "ask": ["Bash(git push:*)"],
                "deny": ["Bash(rm -rf *)"]
            }
        }));

        let outcome = sanitize(document);
        assert_eq!(outcome.document["permissions"]["allow"], json!(["Read"]));
        assert_eq!(
            outcome.document["permissions"]["ask"],
            json!(["Bash(git push *)"])
        );
        assert_eq!(
            outcome.document["permissions"]["deny"],
            json!(["Bash(rm -rf *)"])
        );
        assert_eq!(outcome.migrated.len(), 1);
        assert_eq!(outcome.migrated[0].category, RuleKind::Ask);
    }
}
