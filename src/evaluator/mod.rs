//! Permission decisions for concrete tool invocations
//!
//! Deny rules are scanned first and cannot be overridden, then ask, then
//! allow. When nothing matches, the merged settings decide: `dontAsk`
//! allows, everything else asks (safe by default). Evaluation never fails
//! for "no rule matched".

use std::sync::OnceLock;

use glob::Pattern as GlobPattern;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{ProjectContext, SettingsResult};
use crate::pattern::split_tool_argument;
use crate::rules::{DefaultMode, RuleKind, RuleRepository};
use crate::store::ScopeStore;

/// The outcome of evaluating a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Ask,
    Deny,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Ask => "ask",
            Decision::Deny => "deny",
        }
    }
}

/// Decides allow/ask/deny for tool invocations against the stored rules
pub struct PermissionEvaluator<'a, S: ScopeStore> {
    repository: RuleRepository<'a, S>,
}

impl<'a, S: ScopeStore> PermissionEvaluator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            repository: RuleRepository::new(store),
        }
    }

    /// Evaluate a tool invocation: deny first, then ask, then allow, then
    /// the settings default
    pub async fn evaluate(
        &self,
        tool: &str,
        argument: Option<&str>,
        ctx: &ProjectContext,
    ) -> SettingsResult<Decision> {
        let (rules, settings) = self.repository.list(ctx).await?;

        for (kind, decision) in [
            (RuleKind::Deny, Decision::Deny),
            (RuleKind::Ask, Decision::Ask),
            (RuleKind::Allow, Decision::Allow),
        ] {
            let matched = rules
                .iter()
                .filter(|rule| rule.kind == kind)
                .any(|rule| matches_rule(&rule.pattern, tool, argument));
            if matched {
                return Ok(decision);
            }
        }

        Ok(if settings.default_mode == DefaultMode::DontAsk {
            Decision::Allow
        } else {
            Decision::Ask
        })
    }
}

fn subcommand_rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):([A-Za-z0-9_\-*]+)$").expect("valid regex")
    })
}

/// Whether a rule pattern matches a tool invocation
///
/// Matching is case-sensitive with no normalization beyond literal glob
/// semantics (`*`, `?`). The matcher accepts a slightly wider shape than the
/// persisted grammar: `Tool:subcommand` rules match on the argument's first
/// whitespace-or-colon-delimited token even though only `Tool:*` survives
/// classification.
pub fn matches_rule(rule_pattern: &str, tool: &str, argument: Option<&str>) -> bool {
    // Tool(argument) shape, including the universal wildcard *(...)
    if let Some((rule_tool, rule_arg)) = split_tool_argument(rule_pattern) {
        if rule_tool != tool && rule_tool != "*" {
            return false;
        }
        return match argument {
            None => rule_arg == "*",
            Some(argument) => glob_match(rule_arg, argument),
        };
    }

    // Tool:subcommand shape
    if let Some(caps) = subcommand_rule_re().captures(rule_pattern) {
        if &caps[1] != tool {
            return false;
        }
        let subcommand = &caps[2];
        return match argument {
            None => subcommand == "*",
            Some(argument) => glob_match(subcommand, leading_token(argument)),
        };
    }

    // Bare tool name
    rule_pattern == tool || rule_pattern == "*"
}

/// The argument up to its first whitespace or colon
fn leading_token(argument: &str) -> &str {
    argument
        .split(|c: char| c.is_whitespace() || c == ':')
        .next()
        .unwrap_or("")
}

fn glob_match(pattern: &str, value: &str) -> bool {
    match GlobPattern::new(pattern) {
        Ok(compiled) => compiled.matches(value),
        // An unparseable glob falls back to literal comparison
        Err(_) => pattern == value,
    }
}
