//! edit_file tool - Apply a unified diff to an existing file

use std::path::Path;

use log::{debug, info, warn};

use super::patch::{apply_unified_diff, creates_new_file};
use super::{ToolError, create_file};
use crate::agent::protocol::ToolResult;
use crate::agent::safety::SafetyValidator;

/// Patch `file` (relative to `working_dir`) in place.
///
/// The file is rewritten only when every hunk applied; on any failure it is
/// left untouched.
pub async fn apply_patch(file: &str, patch: &str, validator: &SafetyValidator, working_dir: &Path) -> ToolResult {
    match try_apply_patch(file, patch, validator, working_dir).await {
        Ok(message) => {
            info!("{}", message);
            ToolResult::success(message)
        }
        Err(e) => {
            warn!("Edit of '{}' failed: {}", file, e);
            ToolResult::failure(e.to_string())
        }
    }
}

/// Handle an `edit` action. The path is validated before anything touches
/// the filesystem; a `--- /dev/null` patch against a missing file creates it
/// with the patch applied to empty content, every other edit is patched.
pub async fn edit_file(file: &str, patch: &str, validator: &SafetyValidator, working_dir: &Path) -> ToolResult {
    if let Err(e) = validator.validate_file_path(file, working_dir) {
        warn!("Edit of '{}' blocked: {}", file, e);
        return ToolResult::failure(e.to_string());
    }

    let exists = tokio::fs::try_exists(working_dir.join(file)).await.unwrap_or(false);
    if !exists && creates_new_file(patch) {
        debug!("Edit of missing file {} declares /dev/null, creating it", file);
        return match apply_unified_diff("", patch) {
            Some(content) => create_file(file, &content, validator, working_dir).await,
            None => ToolResult::failure(ToolError::PatchFailed.to_string()),
        };
    }

    apply_patch(file, patch, validator, working_dir).await
}

async fn try_apply_patch(
    file: &str,
    patch: &str,
    validator: &SafetyValidator,
    working_dir: &Path,
) -> Result<String, ToolError> {
    validator.validate_file_path(file, working_dir)?;

    let full_path = working_dir.join(file);
    if !tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
        return Err(ToolError::FileNotFound { path: file.to_string() });
    }

    let content = tokio::fs::read_to_string(&full_path)
        .await
        .map_err(|source| ToolError::IoError {
            operation: format!("read {}", file),
            source,
        })?;

    let patched = apply_unified_diff(&content, patch).ok_or(ToolError::PatchFailed)?;

    tokio::fs::write(&full_path, patched)
        .await
        .map_err(|source| ToolError::IoError {
            operation: format!("write {}", file),
            source,
        })?;

    Ok(format!("Successfully edited {}", file))
}
