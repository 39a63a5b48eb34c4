//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - agent: drive a goal to completion with guarded shell commands and edits
//! - ask: one-shot completion

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use loz::agent::SafetyConfig;

/// Loz - an autonomous shell agent backed by a local or hosted LLM
#[derive(Parser, Debug)]
#[command(name = "loz")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Work towards a goal by running commands and editing files
    Agent {
        /// Natural-language goal
        goal: String,

        #[command(flatten)]
        options: AgentOptions,
    },

    /// Send a single prompt and print the answer
    Ask {
        /// Prompt text
        prompt: String,
    },
}

/// Flags that override the agent and safety config for one run
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AgentOptions {
    /// Maximum number of steps
    #[arg(short, long)]
    pub max_steps: Option<u32>,

    /// Allow network tools such as curl and ssh
    #[arg(long)]
    pub enable_network: bool,

    /// Only allow commands from the built-in allowlist
    #[arg(long)]
    pub allowlist: bool,

    /// Do not confine paths to the working directory
    #[arg(long)]
    pub no_sandbox: bool,

    /// Per-command timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Output ceiling per command in bytes
    #[arg(long)]
    pub max_output: Option<usize>,

    /// Working directory (defaults to the current directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,
}

impl AgentOptions {
    /// Layer the flags over configured safety settings
    pub fn apply_safety(&self, mut safety: SafetyConfig) -> SafetyConfig {
        if self.enable_network {
            safety.enable_network = true;
        }
        if self.allowlist {
            safety.allowlist_mode = true;
        }
        if self.no_sandbox {
            safety.sandbox_mode = false;
        }
        if let Some(timeout) = self.timeout {
            safety.timeout_seconds = timeout;
        }
        if let Some(max_output) = self.max_output {
            safety.max_output_bytes = max_output;
        }
        safety
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["loz"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["loz", "-v", "ask", "hi"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["loz", "ask", "hi", "-c", "/path/to/loz.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/loz.yml")));
    }

    #[test]
    fn test_cli_ask() {
        let cli = Cli::try_parse_from(["loz", "ask", "what is rust"]).unwrap();
        match cli.command {
            Commands::Ask { prompt } => assert_eq!(prompt, "what is rust"),
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_cli_agent_defaults() {
        let cli = Cli::try_parse_from(["loz", "agent", "fix the tests"]).unwrap();
        match cli.command {
            Commands::Agent { goal, options } => {
                assert_eq!(goal, "fix the tests");
                assert!(options.max_steps.is_none());
                assert!(!options.enable_network);
                assert!(options.workdir.is_none());
            }
            _ => panic!("Expected Agent command"),
        }
    }

    #[test]
    fn test_cli_agent_flags() {
        let cli = Cli::try_parse_from([
            "loz",
            "agent",
            "build it",
            "--max-steps",
            "5",
            "--enable-network",
            "--allowlist",
            "--no-sandbox",
            "--timeout",
            "60",
            "--max-output",
            "2048",
            "--workdir",
            "/tmp/project",
        ])
        .unwrap();
        let Commands::Agent { options, .. } = cli.command else {
            panic!("Expected Agent command");
        };
        assert_eq!(options.max_steps, Some(5));
        assert_eq!(options.workdir, Some(PathBuf::from("/tmp/project")));

        let safety = options.apply_safety(SafetyConfig::default());
        assert!(safety.enable_network);
        assert!(safety.allowlist_mode);
        assert!(!safety.sandbox_mode);
        assert_eq!(safety.timeout_seconds, 60);
        assert_eq!(safety.max_output_bytes, 2048);
    }

    #[test]
    fn test_apply_safety_without_flags_keeps_config() {
        let configured = SafetyConfig {
            enable_network: true,
            timeout_seconds: 90,
            ..Default::default()
        };
        let safety = AgentOptions::default().apply_safety(configured.clone());
        assert_eq!(safety, configured);
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
