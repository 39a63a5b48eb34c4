//! Tool executors for agent actions
//!
//! Each tool validates its input through the [`SafetyValidator`] before
//! touching the OS and reports every failure as a [`ToolResult`], so the
//! model always gets a message it can react to.
//!
//! [`SafetyValidator`]: crate::agent::SafetyValidator
//! [`ToolResult`]: crate::agent::ToolResult

mod create_file;
mod edit_file;
mod executor;
mod patch;
mod run_command;

pub use create_file::create_file;
pub use edit_file::{apply_patch, edit_file};
pub use executor::{LocalToolExecutor, ToolError, ToolExecutor};
pub use patch::{HunkHeader, apply_unified_diff, creates_new_file, parse_hunk_header};
pub use run_command::run_command;
