//! Permission rules and settings per tier
//!
//! [`RuleRepository`] manages the `permissions.allow/ask/deny` pattern lists
//! and the permission settings fields of the writable tiers. Rules have no
//! independent identity: the id is a stable hash of (tier, kind, pattern),
//! so renaming a pattern is modeled as remove + add and changes the id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::core::{ConfigDocument, ProjectContext, SettingsError, SettingsResult, Tier};
use crate::pattern;
use crate::sanitize;
use crate::store::ScopeStore;

/// Tiers that can hold permission rules, lowest priority first
pub const RULE_TIERS: [Tier; 2] = [Tier::User, Tier::Project];

/// What a matching rule does to an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Allow,
    Ask,
    Deny,
}

impl RuleKind {
    /// All kinds in the order sanitization and listing walk them
    pub const ALL: [RuleKind; 3] = [RuleKind::Allow, RuleKind::Ask, RuleKind::Deny];

    /// The category key used inside the `permissions` section
    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Allow => "allow",
            RuleKind::Ask => "ask",
            RuleKind::Deny => "deny",
        }
    }

    /// Parse a rule kind, rejecting anything outside the fixed set
    pub fn parse(s: &str) -> SettingsResult<RuleKind> {
        match s {
            "allow" => Ok(RuleKind::Allow),
            "ask" => Ok(RuleKind::Ask),
            "deny" => Ok(RuleKind::Deny),
            other => Err(SettingsError::validation(format!(
                "Invalid rule kind: {other}. Must be 'allow', 'ask', or 'deny'"
            ))),
        }
    }
}

/// Default behavior when no rule matches an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultMode {
    #[default]
    Default,
    AcceptEdits,
    DontAsk,
    Plan,
}

impl DefaultMode {
    /// Parse a mode name, rejecting anything outside the fixed enumeration
    pub fn parse(s: &str) -> SettingsResult<DefaultMode> {
        match s {
            "default" => Ok(DefaultMode::Default),
            "acceptEdits" => Ok(DefaultMode::AcceptEdits),
            "dontAsk" => Ok(DefaultMode::DontAsk),
            "plan" => Ok(DefaultMode::Plan),
            other => Err(SettingsError::validation(format!(
                "Invalid permission mode: {other}. \
                 Must be one of: default, acceptEdits, dontAsk, plan"
            ))),
        }
    }
}

/// One permission rule with its derived identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRule {
    pub id: Uuid,
    pub kind: RuleKind,
    pub pattern: String,
    pub tier: Tier,
}

impl PermissionRule {
    /// Build a rule, deriving its id from the (tier, kind, pattern) triple
    pub fn new(kind: RuleKind, pattern: impl Into<String>, tier: Tier) -> Self {
        let pattern = pattern.into();
        let id = Self::derive_id(tier, kind, &pattern);
        Self {
            id,
            kind,
            pattern,
            tier,
        }
    }

    /// Stable, content-derived rule identity
    ///
    /// Two processes computing the id for the same triple always agree.
    /// Renaming a pattern therefore produces a new id; callers must not
    /// persist ids across a rename.
    pub fn derive_id(tier: Tier, kind: RuleKind, pattern: &str) -> Uuid {
        let name = format!("{}-{}-{}", tier.as_str(), kind.as_str(), pattern);
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
    }
}

/// Request payload for adding a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    pub kind: RuleKind,
    pub pattern: String,
    pub tier: Tier,
}

/// Partial update for an existing rule; the tier is immutable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulePatch {
    pub kind: Option<RuleKind>,
    pub pattern: Option<String>,
}

/// Permission settings merged across the rule tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionSettings {
    pub default_mode: DefaultMode,
    pub additional_directories: Vec<String>,
    pub disable_bypass_permissions_mode: bool,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            default_mode: DefaultMode::Default,
            additional_directories: Vec::new(),
            disable_bypass_permissions_mode: false,
        }
    }
}

/// Partial update for permission settings; only supplied fields are written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionSettingsPatch {
    pub default_mode: Option<DefaultMode>,
    pub additional_directories: Option<Vec<String>>,
    pub disable_bypass_permissions_mode: Option<bool>,
}

/// Manages the permission rule lists of the writable tiers
///
/// Stateless over a borrowed store: documents are read fresh on every call
/// and rewritten in full on every mutation, with sanitization running
/// unconditionally before each save.
pub struct RuleRepository<'a, S: ScopeStore> {
    store: &'a S,
}

impl<'a, S: ScopeStore> RuleRepository<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// List all rules from the user and project tiers with merged settings
    ///
    /// Directories union across tiers; the other settings fields take the
    /// highest-priority present value (project over user).
    pub async fn list(
        &self,
        ctx: &ProjectContext,
    ) -> SettingsResult<(Vec<PermissionRule>, PermissionSettings)> {
        let mut rules = Vec::new();
        let mut settings = PermissionSettings::default();

        // Low priority first so later tiers override the scalar fields
        for tier in RULE_TIERS {
            let document = self.store.load(tier, ctx).await?;
            let Some(permissions) = section(&document) else {
                continue;
            };

            if let Some(mode) = permissions.get("defaultMode").and_then(Value::as_str) {
                match DefaultMode::parse(mode) {
                    Ok(mode) => settings.default_mode = mode,
                    Err(_) => warn!(tier = %tier, mode, "ignoring unknown defaultMode"),
                }
            }
            if let Some(dirs) = permissions
                .get("additionalDirectories")
                .and_then(Value::as_array)
            {
                for dir in dirs.iter().filter_map(Value::as_str) {
                    if !settings.additional_directories.iter().any(|d| d == dir) {
                        settings.additional_directories.push(dir.to_string());
                    }
                }
            }
            if let Some(disable) = permissions
                .get("disableBypassPermissionsMode")
                .and_then(Value::as_bool)
            {
                settings.disable_bypass_permissions_mode = disable;
            }

            for kind in RuleKind::ALL {
                let Some(patterns) = permissions.get(kind.as_str()).and_then(Value::as_array)
                else {
                    continue;
                };
                for pattern in patterns.iter().filter_map(Value::as_str) {
                    rules.push(PermissionRule::new(kind, pattern, tier));
                }
            }
        }

        Ok((rules, settings))
    }

    /// Add a rule, rejecting duplicates within the same (tier, kind) list
    pub async fn add(&self, new: NewRule, ctx: &ProjectContext) -> SettingsResult<PermissionRule> {
        require_rule_tier(new.tier)?;
        pattern::classify(&new.pattern)?;

        let mut document = self.store.load(new.tier, ctx).await?;
        let list = category_mut(&mut document, new.kind);
        let exists = list
            .iter()
            .any(|entry| entry.as_str() == Some(new.pattern.as_str()));
        if exists {
            return Err(SettingsError::conflict(format!(
                "Pattern already exists in {} list: {}",
                new.kind.as_str(),
                new.pattern
            )));
        }
        list.push(Value::String(new.pattern.clone()));

        self.persist(new.tier, ctx, document).await?;
        Ok(PermissionRule::new(new.kind, new.pattern, new.tier))
    }

    /// Update a rule by id: remove the old triple, add the patched one
    ///
    /// The rule keeps its tier; the returned rule carries a new id whenever
    /// the pattern changed.
    pub async fn update(
        &self,
        id: Uuid,
        patch: RulePatch,
        ctx: &ProjectContext,
    ) -> SettingsResult<PermissionRule> {
        let (rules, _) = self.list(ctx).await?;
        let existing = rules
            .into_iter()
            .find(|rule| rule.id == id)
            .ok_or_else(|| SettingsError::not_found(format!("Permission rule: {id}")))?;

        self.remove(id, existing.tier, ctx).await?;
        self.add(
            NewRule {
                kind: patch.kind.unwrap_or(existing.kind),
                pattern: patch.pattern.unwrap_or(existing.pattern),
                tier: existing.tier,
            },
            ctx,
        )
        .await
    }

    /// Remove a rule by id from the given tier
    pub async fn remove(&self, id: Uuid, tier: Tier, ctx: &ProjectContext) -> SettingsResult<()> {
        require_rule_tier(tier)?;

        let mut document = self.store.load(tier, ctx).await?;
        let Some(permissions) = section(&document).cloned() else {
            return Err(SettingsError::not_found(format!("Permission rule: {id}")));
        };

        for kind in RuleKind::ALL {
            let Some(patterns) = permissions.get(kind.as_str()).and_then(Value::as_array) else {
                continue;
            };
            let position = patterns.iter().position(|entry| {
                entry
                    .as_str()
                    .is_some_and(|p| PermissionRule::derive_id(tier, kind, p) == id)
            });
            if let Some(index) = position {
                category_mut(&mut document, kind).remove(index);
                return self.persist(tier, ctx, document).await;
            }
        }

        Err(SettingsError::not_found(format!("Permission rule: {id}")))
    }

    /// Write only the supplied settings fields, leaving others untouched
    pub async fn update_settings(
        &self,
        patch: PermissionSettingsPatch,
        tier: Tier,
        ctx: &ProjectContext,
    ) -> SettingsResult<PermissionSettings> {
        require_rule_tier(tier)?;

        let mut document = self.store.load(tier, ctx).await?;
        let permissions = section_mut(&mut document);
        if let Some(mode) = patch.default_mode {
            permissions.insert("defaultMode".to_string(), serde_json::to_value(mode)?);
        }
        if let Some(dirs) = patch.additional_directories {
            permissions.insert(
                "additionalDirectories".to_string(),
                serde_json::to_value(dirs)?,
            );
        }
        if let Some(disable) = patch.disable_bypass_permissions_mode {
            permissions.insert(
                "disableBypassPermissionsMode".to_string(),
                Value::Bool(disable),
            );
        }

        self.persist(tier, ctx, document).await?;
        let (_, settings) = self.list(ctx).await?;
        Ok(settings)
    }

    /// Sanitize the full document, then save
    async fn persist(
        &self,
        tier: Tier,
        ctx: &ProjectContext,
        document: ConfigDocument,
    ) -> SettingsResult<()> {
        let outcome = sanitize::sanitize(document);
        self.store.save(tier, ctx, &outcome.document).await
    }
}

fn require_rule_tier(tier: Tier) -> SettingsResult<()> {
    if RULE_TIERS.contains(&tier) {
        Ok(())
    } else {
        Err(SettingsError::validation(format!(
            "Permission rules may only target the user or project tiers, not {tier}"
        )))
    }
}

fn section(document: &ConfigDocument) -> Option<&ConfigDocument> {
    document.get("permissions").and_then(Value::as_object)
}

/// The `permissions` object of a document, created if missing
fn section_mut(document: &mut ConfigDocument) -> &mut ConfigDocument {
    let entry = document
        .entry("permissions".to_string())
        .or_insert_with(|| Value::Object(ConfigDocument::new()));
    if !entry.is_object() {
        *entry = Value::Object(ConfigDocument::new());
    }
    entry.as_object_mut().expect("just ensured an object")
}

/// A category list under `permissions`, created if missing
fn category_mut(document: &mut ConfigDocument, kind: RuleKind) -> &mut Vec<Value> {
    let permissions = section_mut(document);
    let entry = permissions
        .entry(kind.as_str().to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    entry.as_array_mut().expect("just ensured an array")
}
