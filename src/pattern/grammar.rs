//! Pattern classification and migration

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::core::SettingsError;

/// Maximum length for a permission pattern
pub const MAX_PATTERN_LENGTH: usize = 500;

/// Tool name whose `server:*` argument syntax is still valid
const MCP_TOOL: &str = "MCP";

fn tool_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

fn tool_argument_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\((.+)\)$").expect("valid regex"))
}

fn subcommand_wildcard_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):\*$").expect("valid regex"))
}

/// The grammar shape of a valid permission pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    /// Bare tool name, e.g. `Bash` or `mcp__server__tool`
    ToolName(String),
    /// Tool with an argument pattern, e.g. `Bash(npm run *)`
    ToolArgument { tool: String, arg: String },
    /// Whole-pattern subcommand wildcard, e.g. `Bash:*`
    SubcommandWildcard(String),
}

/// Why a pattern failed classification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Pattern must not be empty")]
    Empty,

    #[error("Pattern must not contain newline characters")]
    ContainsNewline,

    #[error("Pattern exceeds maximum length of {MAX_PATTERN_LENGTH} characters")]
    TooLong,

    /// Deprecated `:*` inside `Tool(...)`; `MCP(server:*)` is exempt
    #[error(
        "The :* pattern inside Tool(...) is deprecated. \
         Use a space wildcard instead: e.g., Bash(command *) not Bash(command:*)"
    )]
    DeprecatedColonStar,

    #[error("Invalid pattern format: {0}")]
    Malformed(String),
}

impl From<PatternError> for SettingsError {
    fn from(err: PatternError) -> Self {
        SettingsError::Validation(err.to_string())
    }
}

/// Classify a pattern into exactly one grammar shape
///
/// Rejects empty/whitespace-only input, embedded newlines, over-length
/// patterns, and the deprecated `:*` suffix inside non-MCP `Tool(...)`
/// arguments.
pub fn classify(pattern: &str) -> Result<PatternKind, PatternError> {
    if pattern.trim().is_empty() {
        return Err(PatternError::Empty);
    }
    if pattern.contains('\n') || pattern.contains('\r') {
        return Err(PatternError::ContainsNewline);
    }
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(PatternError::TooLong);
    }

    if let Some(caps) = tool_argument_re().captures(pattern) {
        let tool = &caps[1];
        let arg = &caps[2];
        // MCP is exempt: server:* there means "all tools of a server"
        if tool != MCP_TOOL && arg.ends_with(":*") {
            return Err(PatternError::DeprecatedColonStar);
        }
        return Ok(PatternKind::ToolArgument {
            tool: tool.to_string(),
            arg: arg.to_string(),
        });
    }

    if let Some(caps) = subcommand_wildcard_re().captures(pattern) {
        return Ok(PatternKind::SubcommandWildcard(caps[1].to_string()));
    }

    if tool_name_re().is_match(pattern) {
        return Ok(PatternKind::ToolName(pattern.to_string()));
    }

    Err(PatternError::Malformed(pattern.to_string()))
}

/// Migrate a deprecated `Tool(arg:*)` pattern to `Tool(arg *)`
///
/// Returns `None` for every other shape, and for patterns already excluded
/// for length or newline reasons. This is a narrow historical rewrite, not
/// a general normalizer.
pub fn migrate(pattern: &str) -> Option<String> {
    if pattern.contains('\n') || pattern.contains('\r') {
        return None;
    }
    if pattern.len() > MAX_PATTERN_LENGTH {
        return None;
    }

    let caps = tool_argument_re().captures(pattern)?;
    let tool = &caps[1];
    let arg = &caps[2];
    if tool == MCP_TOOL || !arg.ends_with(":*") {
        return None;
    }

    let stem = &arg[..arg.len() - 2];
    Some(format!("{tool}({stem} *)"))
}

/// Split a `Tool(argument)` string into its tool and argument parts
///
/// Unlike [`classify`], the tool part may be any non-empty string including
/// the universal wildcard `*` — the rule matcher accepts a wider shape than
/// the grammar persists.
pub fn split_tool_argument(pattern: &str) -> Option<(&str, &str)> {
    let open = pattern.find('(')?;
    if !pattern.ends_with(')') || open == 0 {
        return None;
    }
    let arg = &pattern[open + 1..pattern.len() - 1];
    if arg.is_empty() {
        return None;
    }
    Some((&pattern[..open], arg))
}
