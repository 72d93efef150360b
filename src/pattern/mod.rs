//! Permission pattern grammar
//!
//! Classifies permission pattern strings into their fixed grammar shapes and
//! migrates the deprecated `Tool(arg:*)` spelling to `Tool(arg *)`.
//!
//! ## Shapes
//!
//! - `Tool` — bare tool name, covers composite names like `mcp__server__tool`
//! - `Tool(argument)` — tool with an argument pattern
//! - `Tool:*` — all subcommands of a tool
//!
//! ## Example
//!
//! ```
//! use agent_settings::pattern::{classify, migrate};
//!
//! assert!(classify("Bash(npm run *)").is_ok());
//! assert!(classify("Bash(npm run:*)").is_err());
//! assert_eq!(migrate("Bash(npm run:*)").as_deref(), Some("Bash(npm run *)"));
//! ```

mod grammar;

pub use grammar::{classify, migrate, split_tool_argument, PatternError, PatternKind, MAX_PATTERN_LENGTH};
