//! Agent execution core
//!
//! This module provides:
//! - The JSON action protocol spoken by the model
//! - The safety validator gating commands and paths
//! - Tool executors for commands, patches and new files
//! - The step memory rendered into each prompt

pub mod memory;
pub mod protocol;
pub mod safety;
pub mod tools;

pub use memory::{AgentMemory, ContextEntry};
pub use protocol::{Action, ProtocolError, ToolResult, format_result, parse_action};
pub use safety::{
    SafetyConfig, SafetyError, SafetyPolicy, SafetyValidator, SensitivePattern, normalize_lexically, truncate_output,
};
pub use tools::{
    HunkHeader, LocalToolExecutor, ToolError, ToolExecutor, apply_patch, apply_unified_diff, create_file,
    creates_new_file, edit_file, parse_hunk_header, run_command,
};
