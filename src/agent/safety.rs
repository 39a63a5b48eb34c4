//! Safety gate for agent commands and file paths
//!
//! Every command and every edited path passes through [`SafetyValidator`]
//! before a tool touches the OS. This is static inspection of command text
//! and paths, not OS-level isolation.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-run safety settings, supplied by config and CLI flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Only commands from the policy allowlist may run
    pub allowlist_mode: bool,
    /// Restrict paths to the working directory
    pub sandbox_mode: bool,
    pub max_output_bytes: usize,
    pub timeout_seconds: u64,
    pub enable_network: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            allowlist_mode: false,
            sandbox_mode: true,
            max_output_bytes: 10_000,
            timeout_seconds: 30,
            enable_network: false,
        }
    }
}

/// A raw-path pattern marking a file as too sensitive to edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensitivePattern {
    Contains(String),
    ContainsIgnoreCase(String),
    EndsWith(String),
}

impl SensitivePattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            SensitivePattern::Contains(needle) => path.contains(needle.as_str()),
            SensitivePattern::ContainsIgnoreCase(needle) => path.to_lowercase().contains(&needle.to_lowercase()),
            SensitivePattern::EndsWith(suffix) => path.ends_with(suffix.as_str()),
        }
    }
}

/// Token lists consulted by the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyPolicy {
    /// Always-on destructive patterns
    pub denylist: Vec<String>,
    /// Tools blocked unless network access is enabled
    pub network_commands: Vec<String>,
    /// Privilege and device-write patterns
    pub agent_denylist: Vec<String>,
    /// Command names accepted in allowlist mode
    pub allowlist: Vec<String>,
    pub sensitive_patterns: Vec<SensitivePattern>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            denylist: owned(&[
                "rm -rf /",
                "rm -rf/*",
                "rm -rf /.",
                "shutdown",
                "reboot",
                ":(){ :|:& };:",
                "mkfs",
                "dd if=",
            ]),
            network_commands: owned(&["curl", "wget", "ssh", "scp", "nc", "netcat", "telnet", "ftp", "rsync"]),
            agent_denylist: owned(&["> /dev/", "chmod 777", "chown", "useradd", "userdel"]),
            allowlist: owned(&[
                "ls", "pwd", "cat", "grep", "find", "head", "tail", "wc", "echo", "which", "git", "npm", "node",
                "python", "python3", "pip", "pip3", "tsc", "npx", "mkdir", "touch", "cp", "mv", "diff", "test",
                "mocha", "jest", "cargo", "rustc", "rustfmt",
            ]),
            sensitive_patterns: vec![
                SensitivePattern::Contains(".ssh".into()),
                SensitivePattern::Contains(".aws".into()),
                SensitivePattern::Contains(".env".into()),
                SensitivePattern::ContainsIgnoreCase("password".into()),
                SensitivePattern::ContainsIgnoreCase("secret".into()),
                SensitivePattern::EndsWith(".key".into()),
                SensitivePattern::EndsWith(".pem".into()),
            ],
        }
    }
}

/// A proposed action violates policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyError {
    #[error("Command blocked by guardrails: {0}")]
    Denylisted(String),

    #[error("Network command '{0}' is blocked. Enable network with --enable-network flag.")]
    NetworkBlocked(String),

    #[error("Command blocked by safety policy: contains '{0}'")]
    PolicyBlocked(String),

    #[error("Command '{command}' is not in allowlist. Allowed commands: {}", .allowlist.join(", "))]
    NotAllowlisted { command: String, allowlist: Vec<String> },

    #[error("Path traversal detected (..). Commands must stay within working directory in sandbox mode.")]
    PathTraversal,

    #[error("Path '{path}' is outside working directory. Operations restricted to {}.", .working_dir.display())]
    OutsideSandbox { path: String, working_dir: PathBuf },

    #[error("Cannot edit potentially sensitive file: {0}")]
    SensitivePath(String),

    #[error("Working directory '{}' cannot be resolved to an absolute path", .0.display())]
    InvalidWorkingDir(PathBuf),
}

/// Decides whether commands and paths may proceed
#[derive(Debug, Clone, Default)]
pub struct SafetyValidator {
    policy: SafetyPolicy,
}

impl SafetyValidator {
    pub fn new(policy: SafetyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Check a shell command against the policy.
    ///
    /// Checks run cheapest first and the first violation wins: denylist,
    /// network tools, agent denylist, allowlist, then sandbox path checks.
    pub fn validate_command(&self, cmd: &str, config: &SafetyConfig, working_dir: &Path) -> Result<(), SafetyError> {
        let lower = cmd.to_lowercase();

        if let Some(token) = first_contained(&lower, &self.policy.denylist) {
            return Err(SafetyError::Denylisted(token.to_string()));
        }

        if !config.enable_network {
            if let Some(tool) = first_contained(&lower, &self.policy.network_commands) {
                return Err(SafetyError::NetworkBlocked(tool.to_string()));
            }
        }

        if let Some(token) = first_contained(&lower, &self.policy.agent_denylist) {
            return Err(SafetyError::PolicyBlocked(token.to_string()));
        }

        if config.allowlist_mode {
            let first = cmd.split_whitespace().next().unwrap_or("");
            let allowed = self
                .policy
                .allowlist
                .iter()
                .any(|name| first == name.as_str() || first.ends_with(&format!("/{}", name)));
            if !allowed {
                return Err(SafetyError::NotAllowlisted {
                    command: first.to_string(),
                    allowlist: self.policy.allowlist.clone(),
                });
            }
        }

        if config.sandbox_mode {
            // git revision syntax (HEAD..main) legitimately uses ".."
            if cmd.contains("..") && !cmd.contains("git") {
                return Err(SafetyError::PathTraversal);
            }

            let root = sandbox_root(working_dir)?;
            for token in cmd.split_whitespace().filter(|t| t.starts_with('/')) {
                if token.starts_with("/dev/") {
                    continue;
                }
                if !normalize_lexically(Path::new(token)).starts_with(&root) {
                    return Err(SafetyError::OutsideSandbox {
                        path: token.to_string(),
                        working_dir: working_dir.to_path_buf(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Check a file path for editing or creation.
    ///
    /// Location is checked first, then the raw path text is matched against
    /// the sensitive patterns even when it sits inside the working directory.
    pub fn validate_file_path(&self, path: &str, working_dir: &Path) -> Result<(), SafetyError> {
        let root = sandbox_root(working_dir)?;
        let resolved = normalize_lexically(&root.join(path));
        if !resolved.starts_with(&root) {
            return Err(SafetyError::OutsideSandbox {
                path: path.to_string(),
                working_dir: working_dir.to_path_buf(),
            });
        }

        if self.policy.sensitive_patterns.iter().any(|p| p.matches(path)) {
            return Err(SafetyError::SensitivePath(path.to_string()));
        }

        Ok(())
    }
}

/// Absolute, normalized form of `working_dir`. A relative root would make
/// every normalized path look contained.
fn sandbox_root(working_dir: &Path) -> Result<PathBuf, SafetyError> {
    std::path::absolute(working_dir)
        .map(|abs| normalize_lexically(&abs))
        .map_err(|_| SafetyError::InvalidWorkingDir(working_dir.to_path_buf()))
}

fn first_contained<'a>(haystack_lower: &str, tokens: &'a [String]) -> Option<&'a str> {
    tokens
        .iter()
        .find(|token| haystack_lower.contains(&token.to_lowercase()))
        .map(String::as_str)
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` never climbs above the root of an absolute path; on a relative path
/// leading `..` components are kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Cut `text` to at most `max_bytes` bytes, appending a marker with the
/// number of hidden bytes. Text that already ends in such a marker with a
/// kept prefix within the limit is returned as-is.
pub fn truncate_output(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes || is_truncated(text, max_bytes) {
        return text.to_string();
    }

    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}{}{} bytes hidden]",
        &text[..end],
        TRUNCATION_MARKER,
        text.len() - end
    )
}

const TRUNCATION_MARKER: &str = "\n\n... [output truncated, ";

fn is_truncated(text: &str, max_bytes: usize) -> bool {
    let Some(idx) = text.rfind(TRUNCATION_MARKER) else {
        return false;
    };
    let tail = &text[idx + TRUNCATION_MARKER.len()..];
    let Some(count) = tail.strip_suffix(" bytes hidden]") else {
        return false;
    };
    idx <= max_bytes && !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit())
}
