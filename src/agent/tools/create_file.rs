//! create_file tool - Create a new file, never overwriting

use std::path::Path;

use log::{info, warn};
use tokio::io::AsyncWriteExt;

use super::ToolError;
use crate::agent::protocol::ToolResult;
use crate::agent::safety::SafetyValidator;

/// Create `file` under `working_dir` with `content`, making parent
/// directories as needed. Fails if the file already exists.
pub async fn create_file(file: &str, content: &str, validator: &SafetyValidator, working_dir: &Path) -> ToolResult {
    match try_create_file(file, content, validator, working_dir).await {
        Ok(message) => {
            info!("{}", message);
            ToolResult::success(message)
        }
        Err(e) => {
            warn!("Create of '{}' failed: {}", file, e);
            ToolResult::failure(e.to_string())
        }
    }
}

async fn try_create_file(
    file: &str,
    content: &str,
    validator: &SafetyValidator,
    working_dir: &Path,
) -> Result<String, ToolError> {
    validator.validate_file_path(file, working_dir)?;

    let full_path = working_dir.join(file);
    if tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
        return Err(ToolError::FileExists { path: file.to_string() });
    }

    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ToolError::IoError {
                operation: format!("create parent directories for {}", file),
                source,
            })?;
    }

    let mut handle = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&full_path)
        .await
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::AlreadyExists => ToolError::FileExists { path: file.to_string() },
            _ => ToolError::IoError {
                operation: format!("create {}", file),
                source,
            },
        })?;

    handle
        .write_all(content.as_bytes())
        .await
        .map_err(|source| ToolError::IoError {
            operation: format!("write {}", file),
            source,
        })?;
    handle.flush().await.map_err(|source| ToolError::IoError {
        operation: format!("flush {}", file),
        source,
    })?;

    Ok(format!("Created file: {}", file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_file_basic() {
        let dir = tempdir().unwrap();
        let result = create_file("notes.md", "# Notes\n", &SafetyValidator::default(), dir.path()).await;

        assert!(result.success);
        assert_eq!(result.output, "Created file: notes.md");
        assert_eq!(std::fs::read_to_string(dir.path().join("notes.md")).unwrap(), "# Notes\n");
    }

    #[tokio::test]
    async fn test_create_file_makes_parent_dirs() {
        let dir = tempdir().unwrap();
        let result = create_file("src/nested/mod.rs", "pub fn f() {}\n", &SafetyValidator::default(), dir.path()).await;

        assert!(result.success);
        assert!(dir.path().join("src/nested/mod.rs").exists());
    }

    #[tokio::test]
    async fn test_create_file_never_overwrites() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("existing.txt"), "original").unwrap();

        let result = create_file("existing.txt", "replacement", &SafetyValidator::default(), dir.path()).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("File already exists: existing.txt"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("existing.txt")).unwrap(),
            "original"
        );
    }

    #[tokio::test]
    async fn test_create_file_rejects_sensitive_path() {
        let dir = tempdir().unwrap();
        let result = create_file("keys/server.pem", "---", &SafetyValidator::default(), dir.path()).await;

        assert!(!result.success);
        assert!(!dir.path().join("keys").exists());
    }
}
