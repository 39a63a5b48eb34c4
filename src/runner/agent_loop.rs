//! Agent loop implementation - goal in, guarded actions out.
//!
//! Each step renders the bounded context into a fresh prompt, asks the model
//! for exactly one action, gates and executes it, and records the outcome for
//! the next step. The loop ends on `done`, a protocol violation, a stall, the
//! step budget, or the caller's stop signal.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::agent::{Action, AgentMemory, SafetyConfig, ToolExecutor, ToolResult, format_result, parse_action};
use crate::history::PromptAndAnswer;
use crate::llm::{LlmClient, LlmError};

/// Instructions placed at the top of every prompt
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are an autonomous coding agent working inside a project directory. Complete the given goal by:
1. Analyzing the situation
2. Deciding on the next action
3. Running commands or editing files
4. Verifying the results
5. Iterating until the goal is achieved

RULES:
- Respond ONLY with one valid JSON object
- No markdown fences, explanations or commentary outside the JSON
- Use exactly one of these three actions:

Run a command:
{"action": "run", "cmd": "ls -la", "reasoning": "Need to see the files"}

Edit a file with a unified diff:
{"action": "edit", "file": "src/main.rs", "patch": "--- a/src/main.rs\n+++ b/src/main.rs\n@@ -1,1 +1,1 @@\n-old line\n+new line", "reasoning": "Fix the bug"}

Mark the goal as complete:
{"action": "done", "summary": "Completed the task. All tests pass."}

GUIDELINES:
- Think step by step and verify changes by running tests
- Always include a "reasoning" field for run and edit
- New files can be created with an edit whose patch starts with "--- /dev/null"
- If an action keeps failing, try a different approach
- When the goal is achieved, use "done" with a summary"#;

const NEXT_ACTION_PROMPT: &str = "What is your next action? Respond with JSON only:";

/// Mode tag recorded with every transcript entry
const TRANSCRIPT_MODE: &str = "agent";

/// Upper bound on a provider-requested rate-limit wait
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Configuration for the AgentLoop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Step budget per run
    pub max_steps: u32,
    /// Identical actions tolerated before the loop is considered stalled
    pub max_repeated_attempts: u32,
    /// Extra attempts for a retryable LLM failure within one step
    pub llm_retries: u32,
    /// First retry delay, doubled on each further attempt
    pub retry_backoff: Duration,
    pub safety: SafetyConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_repeated_attempts: 3,
            llm_retries: 2,
            retry_backoff: Duration::from_secs(1),
            safety: SafetyConfig::default(),
        }
    }
}

/// Loop state. Everything except `Running` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    Running { step: u32 },
    Done { summary: String },
    StalledOnFailure,
    StoppedAtMaxSteps,
    StoppedOnProtocolError { error: String },
    Cancelled,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AgentState::Running { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            AgentState::Running { .. } => "running",
            AgentState::Done { .. } => "completed",
            AgentState::StalledOnFailure => "stalled",
            AgentState::StoppedAtMaxSteps => "step limit reached",
            AgentState::StoppedOnProtocolError { .. } => "protocol error",
            AgentState::Cancelled => "cancelled",
        }
    }
}

/// Final report of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRunSummary {
    pub state: AgentState,
    pub steps: u32,
    pub completed: bool,
    pub summary: String,
}

impl fmt::Display for AgentRunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total steps: {}", self.steps)?;
        writeln!(f, "Status: {}", self.state.label())?;
        write!(f, "Summary: {}", self.summary)
    }
}

/// Progress notifications for a live display
#[derive(Debug, Clone)]
pub enum AgentEvent {
    StepStarted { step: u32, max_steps: u32 },
    ActionChosen { step: u32, action: Action },
    ToolFinished { step: u32, result: ToolResult },
    StepError { step: u32, message: String },
    Finished(AgentRunSummary),
}

/// Checked between steps; a set signal cancels the run.
pub trait StopSignal: Send + Sync {
    fn should_stop(&self) -> bool;
}

/// Stop signal that never fires.
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

impl StopSignal for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

/// AgentLoop drives one goal to a terminal state.
///
/// The model is stateless from the loop's point of view: every call gets a
/// freshly rendered prompt built from the memory log, never a conversation.
pub struct AgentLoop<L, T>
where
    L: LlmClient + ?Sized,
    T: ToolExecutor + ?Sized,
{
    llm: Arc<L>,
    executor: Arc<T>,
    config: AgentConfig,
    memory: AgentMemory,
    failure_history: HashMap<String, u32>,
    transcript: Vec<PromptAndAnswer>,
    stop: Arc<dyn StopSignal>,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl<L, T> AgentLoop<L, T>
where
    L: LlmClient + ?Sized,
    T: ToolExecutor + ?Sized,
{
    /// Create a new AgentLoop with default configuration.
    pub fn new(llm: Arc<L>, executor: Arc<T>) -> Self {
        Self::with_config(llm, executor, AgentConfig::default())
    }

    pub fn with_config(llm: Arc<L>, executor: Arc<T>, config: AgentConfig) -> Self {
        Self {
            llm,
            executor,
            config,
            memory: AgentMemory::new(),
            failure_history: HashMap::new(),
            transcript: Vec::new(),
            stop: Arc::new(NeverStop),
            events: None,
        }
    }

    pub fn with_stop_signal(mut self, stop: Arc<dyn StopSignal>) -> Self {
        self.stop = stop;
        self
    }

    /// Publish progress to `sender`. A dropped receiver is ignored.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Swap the safety settings used for subsequent commands
    pub fn reconfigure_safety(&mut self, safety: SafetyConfig) {
        info!("Safety reconfigured: {:?}", safety);
        self.config.safety = safety;
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    /// Every prompt/answer pair exchanged so far
    pub fn transcript(&self) -> &[PromptAndAnswer] {
        &self.transcript
    }

    pub fn take_transcript(&mut self) -> Vec<PromptAndAnswer> {
        std::mem::take(&mut self.transcript)
    }

    /// Run until a terminal state. Never fails; every ending is reported in
    /// the returned summary.
    pub async fn run(&mut self, goal: &str) -> AgentRunSummary {
        self.memory.clear();
        self.failure_history.clear();
        self.memory.add_user_goal(goal);
        info!("Agent starting: goal={:?} max_steps={}", goal, self.config.max_steps);

        let mut step = 0;
        let mut state = AgentState::Running { step };

        while step < self.config.max_steps {
            if self.stop.should_stop() {
                info!("Stop requested after {} steps", step);
                state = AgentState::Cancelled;
                break;
            }

            step += 1;
            state = self.step(step).await;
            if state.is_terminal() {
                break;
            }
        }

        if !state.is_terminal() {
            warn!("Step budget of {} exhausted", self.config.max_steps);
            state = AgentState::StoppedAtMaxSteps;
        }

        let summary = self.summarize(state, step);
        info!("Agent finished: {} after {} steps", summary.state.label(), summary.steps);
        self.emit(AgentEvent::Finished(summary.clone()));
        summary
    }

    /// Execute one step and return the resulting state
    async fn step(&mut self, step: u32) -> AgentState {
        let running = AgentState::Running { step };
        self.emit(AgentEvent::StepStarted {
            step,
            max_steps: self.config.max_steps,
        });

        let prompt = format!(
            "{}\n\n{}\n\n{}",
            AGENT_SYSTEM_PROMPT,
            self.memory.build_context(),
            NEXT_ACTION_PROMPT
        );
        debug!("Step {} prompt:\n{}", step, prompt);

        let answer = match self.complete_with_retry(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                self.record_error(step, e.to_string());
                return running;
            }
        };
        debug!("Step {} response: {}", step, answer);
        self.transcript.push(PromptAndAnswer::new(
            TRANSCRIPT_MODE,
            self.llm.model(),
            prompt,
            answer.as_str(),
        ));

        let action = match parse_action(&answer) {
            Ok(action) => action,
            Err(e) => {
                warn!("Step {}: {}", step, e);
                self.memory.add_result(format!("Error: {}", e), step);
                self.emit(AgentEvent::StepError {
                    step,
                    message: e.to_string(),
                });
                return AgentState::StoppedOnProtocolError { error: e.to_string() };
            }
        };

        let canonical = action.canonical();
        info!("Step {}: {}", step, canonical);
        self.memory.add_action(canonical.as_str(), step);
        self.emit(AgentEvent::ActionChosen {
            step,
            action: action.clone(),
        });

        let result = match &action {
            Action::Done { summary } => {
                return AgentState::Done {
                    summary: summary.clone(),
                };
            }
            Action::RunCommand { cmd, .. } => self.executor.run_command(cmd, &self.config.safety).await,
            Action::EditFile { file, patch, .. } => self.executor.edit_file(file, patch).await,
        };

        match result {
            Ok(result) => {
                if result.success {
                    info!("Step {} succeeded", step);
                } else {
                    warn!("Step {} failed: {}", step, result.error.as_deref().unwrap_or("Unknown error"));
                }
                self.memory.add_result(format_result(&result), step);
                self.emit(AgentEvent::ToolFinished { step, result });
            }
            Err(e) => self.record_error(step, e.to_string()),
        }

        if self.is_stalled(&canonical) {
            warn!("Step {}: action repeated {} times without progress", step, self.config.max_repeated_attempts);
            return AgentState::StalledOnFailure;
        }

        running
    }

    /// Call the model, retrying retryable failures up to `llm_retries` times.
    /// Rate limits wait for the provider's `retry_after`, capped.
    async fn complete_with_retry(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.llm.complete(prompt).await {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_retryable() && attempt < self.config.llm_retries => {
                    let delay = match &e {
                        LlmError::RateLimited { retry_after } => (*retry_after).min(MAX_RATE_LIMIT_WAIT),
                        _ => self
                            .config
                            .retry_backoff
                            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX)),
                    };
                    attempt += 1;
                    warn!(
                        "LLM call failed ({}), retry {}/{} in {:?}",
                        e, attempt, self.config.llm_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Count this action and report whether it has now been repeated too often
    fn is_stalled(&mut self, canonical: &str) -> bool {
        let count = self.failure_history.entry(canonical.to_string()).or_insert(0);
        let previous = *count;
        *count += 1;
        previous >= self.config.max_repeated_attempts.saturating_sub(1)
    }

    fn record_error(&mut self, step: u32, message: String) {
        warn!("Step {} error: {}", step, message);
        self.memory.add_result(format!("Error: {}", message), step);
        self.emit(AgentEvent::StepError { step, message });
    }

    fn summarize(&self, state: AgentState, steps: u32) -> AgentRunSummary {
        let summary = match &state {
            AgentState::Done { summary } => summary.clone(),
            AgentState::StalledOnFailure => "Agent stopped due to repeated failures without progress.".to_string(),
            AgentState::StoppedAtMaxSteps => format!(
                "Agent stopped after {} steps without completing the goal.",
                self.config.max_steps
            ),
            AgentState::StoppedOnProtocolError { error } => {
                format!("Agent stopped due to LLM protocol error: {}", error)
            }
            AgentState::Cancelled => format!("Agent cancelled after {} steps.", steps),
            AgentState::Running { .. } => String::new(),
        };

        AgentRunSummary {
            completed: matches!(state, AgentState::Done { .. }),
            state,
            steps,
            summary,
        }
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{LocalToolExecutor, ToolError};
    use crate::llm::MockLlmClient;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn agent(mock: MockLlmClient, dir: &Path) -> AgentLoop<MockLlmClient, LocalToolExecutor> {
        AgentLoop::new(Arc::new(mock), Arc::new(LocalToolExecutor::new(dir)))
    }

    /// Executor whose every call is an executor fault
    struct BrokenExecutor {
        dir: PathBuf,
    }

    fn offline() -> ToolError {
        ToolError::IoError {
            operation: "reach sandbox".to_string(),
            source: std::io::Error::other("sandbox offline"),
        }
    }

    #[async_trait]
    impl ToolExecutor for BrokenExecutor {
        fn working_dir(&self) -> &Path {
            &self.dir
        }

        async fn run_command(&self, _cmd: &str, _config: &SafetyConfig) -> Result<ToolResult, ToolError> {
            Err(offline())
        }

        async fn apply_patch(&self, _file: &str, _patch: &str) -> Result<ToolResult, ToolError> {
            Err(offline())
        }

        async fn create_file(&self, _file: &str, _content: &str) -> Result<ToolResult, ToolError> {
            Err(offline())
        }

        async fn edit_file(&self, _file: &str, _patch: &str) -> Result<ToolResult, ToolError> {
            Err(offline())
        }
    }

    #[tokio::test]
    async fn test_ls_then_done_in_two_steps() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let mock = MockLlmClient::with_responses([
            r#"{"action":"run","cmd":"ls","reasoning":"look around"}"#,
            r#"{"action":"done","summary":"Listed files"}"#,
        ]);
        let mut agent = agent(mock, dir.path());

        let summary = agent.run("list the files").await;

        assert!(summary.completed);
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.summary, "Listed files");
        assert_eq!(summary.state, AgentState::Done { summary: "Listed files".to_string() });
        assert_eq!(agent.transcript().len(), 2);
        assert_eq!(agent.transcript()[0].mode, "agent");
        assert_eq!(agent.transcript()[0].model, "mock-model");
    }

    #[tokio::test]
    async fn test_second_prompt_carries_first_result() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let mock = Arc::new(MockLlmClient::with_responses([
            r#"{"action":"run","cmd":"ls"}"#,
            r#"{"action":"done","summary":"ok"}"#,
        ]));
        let mut agent = AgentLoop::new(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path())));

        agent.run("find the marker").await;

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].starts_with(AGENT_SYSTEM_PROMPT));
        assert!(prompts[0].contains("# Task\nfind the marker"));
        assert!(prompts[0].ends_with(NEXT_ACTION_PROMPT));
        assert!(prompts[1].contains("## Step 1"));
        assert!(prompts[1].contains("Exit Code: 0"));
        assert!(prompts[1].contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_blocked_command_reported_verbatim() {
        let dir = tempdir().unwrap();
        let mock = Arc::new(MockLlmClient::with_responses([
            r#"{"action":"run","cmd":"rm -rf /"}"#,
            r#"{"action":"done","summary":"gave up"}"#,
        ]));
        let mut agent = AgentLoop::new(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path())));

        let summary = agent.run("clean up").await;

        assert!(summary.completed);
        let prompts = mock.prompts();
        assert!(prompts[1].contains("Error: Command blocked by guardrails: rm -rf /"));
    }

    #[tokio::test]
    async fn test_stall_on_third_identical_action() {
        let dir = tempdir().unwrap();
        let repeated = r#"{"action":"run","cmd":"cat missing.txt"}"#;
        let mock = MockLlmClient::with_responses([repeated, repeated, repeated, repeated]);
        let mut agent = agent(mock, dir.path());

        let summary = agent.run("read the file").await;

        assert_eq!(summary.state, AgentState::StalledOnFailure);
        assert_eq!(summary.steps, 3);
        assert!(!summary.completed);
        assert_eq!(summary.summary, "Agent stopped due to repeated failures without progress.");
    }

    #[tokio::test]
    async fn test_two_repeats_do_not_stall() {
        let dir = tempdir().unwrap();
        let repeated = r#"{"action":"run","cmd":"pwd"}"#;
        let mock = MockLlmClient::with_responses([repeated, repeated, r#"{"action":"done","summary":"ok"}"#]);
        let mut agent = agent(mock, dir.path());

        let summary = agent.run("where am i").await;

        assert!(summary.completed);
        assert_eq!(summary.steps, 3);
    }

    #[tokio::test]
    async fn test_different_reasoning_is_a_different_action() {
        let dir = tempdir().unwrap();
        let mock = MockLlmClient::with_responses([
            r#"{"action":"run","cmd":"pwd","reasoning":"a"}"#,
            r#"{"action":"run","cmd":"pwd","reasoning":"b"}"#,
            r#"{"action":"run","cmd":"pwd","reasoning":"c"}"#,
            r#"{"action":"done","summary":"ok"}"#,
        ]);
        let mut agent = agent(mock, dir.path());

        assert!(agent.run("where am i").await.completed);
    }

    #[tokio::test]
    async fn test_max_steps() {
        let dir = tempdir().unwrap();
        let mock = MockLlmClient::with_responses([
            r#"{"action":"run","cmd":"echo 1"}"#,
            r#"{"action":"run","cmd":"echo 2"}"#,
            r#"{"action":"run","cmd":"echo 3"}"#,
        ]);
        let config = AgentConfig {
            max_steps: 2,
            ..Default::default()
        };
        let mut agent = AgentLoop::with_config(Arc::new(mock), Arc::new(LocalToolExecutor::new(dir.path())), config);

        let summary = agent.run("count").await;

        assert_eq!(summary.state, AgentState::StoppedAtMaxSteps);
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.summary, "Agent stopped after 2 steps without completing the goal.");
    }

    #[tokio::test]
    async fn test_protocol_error_stops_run() {
        let dir = tempdir().unwrap();
        let mock = MockLlmClient::with_responses(["I think we should list files first."]);
        let mut agent = agent(mock, dir.path());

        let summary = agent.run("anything").await;

        assert!(matches!(summary.state, AgentState::StoppedOnProtocolError { .. }));
        assert_eq!(summary.steps, 1);
        assert!(
            summary
                .summary
                .starts_with("Agent stopped due to LLM protocol error: Invalid JSON response from LLM:")
        );
        assert!(agent.memory().build_context().contains("Result: Error: Invalid JSON"));
    }

    #[tokio::test]
    async fn test_llm_error_is_absorbed() {
        let dir = tempdir().unwrap();
        let mock = Arc::new(
            MockLlmClient::new()
                .fail("connection reset")
                .respond(r#"{"action":"done","summary":"recovered"}"#),
        );
        let config = AgentConfig {
            llm_retries: 0,
            ..Default::default()
        };
        let mut agent =
            AgentLoop::with_config(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path())), config);

        let summary = agent.run("keep going").await;

        assert!(summary.completed);
        assert_eq!(summary.steps, 2);
        assert!(mock.prompts()[1].contains("Error: API error 500: connection reset"));
        assert_eq!(agent.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_retryable_llm_error_retried_within_step() {
        let dir = tempdir().unwrap();
        let mock = Arc::new(
            MockLlmClient::new()
                .fail_with(LlmError::RateLimited {
                    retry_after: Duration::ZERO,
                })
                .fail("overloaded")
                .respond(r#"{"action":"done","summary":"got through"}"#),
        );
        let config = AgentConfig {
            retry_backoff: Duration::ZERO,
            ..Default::default()
        };
        let mut agent =
            AgentLoop::with_config(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path())), config);

        let summary = agent.run("be patient").await;

        assert!(summary.completed);
        assert_eq!(summary.steps, 1);
        assert_eq!(mock.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_llm_error_not_retried() {
        let dir = tempdir().unwrap();
        let mock = Arc::new(
            MockLlmClient::new()
                .fail_with(LlmError::MissingApiKey {
                    env_var: "OPENAI_API_KEY".to_string(),
                })
                .respond(r#"{"action":"done","summary":"ok"}"#),
        );
        let config = AgentConfig {
            retry_backoff: Duration::ZERO,
            ..Default::default()
        };
        let mut agent =
            AgentLoop::with_config(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path())), config);

        let summary = agent.run("anything").await;

        assert_eq!(summary.steps, 2);
        assert!(mock.prompts()[1].contains("Error: Missing API key"));
    }

    #[tokio::test]
    async fn test_retries_exhausted_consume_one_step() {
        let dir = tempdir().unwrap();
        let mock = Arc::new(
            MockLlmClient::new()
                .fail("down")
                .fail("down")
                .respond(r#"{"action":"done","summary":"back"}"#),
        );
        let config = AgentConfig {
            llm_retries: 1,
            retry_backoff: Duration::ZERO,
            ..Default::default()
        };
        let mut agent =
            AgentLoop::with_config(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path())), config);

        let summary = agent.run("anything").await;

        assert!(summary.completed);
        assert_eq!(summary.steps, 2);
        assert_eq!(mock.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_hostile_hunk_header_fails_edit_and_run_completes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a\nb\nc").unwrap();
        let edit = serde_json::json!({
            "action": "edit",
            "file": "a.txt",
            "patch": format!("@@ -2,{} +2,1 @@\n+x", usize::MAX),
        });
        let mock = Arc::new(MockLlmClient::with_responses([
            edit.to_string(),
            r#"{"action":"done","summary":"gave up"}"#.to_string(),
        ]));
        let mut agent = AgentLoop::new(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path())));

        let summary = agent.run("edit a.txt").await;

        assert!(summary.completed);
        assert_eq!(summary.steps, 2);
        assert!(mock.prompts()[1].contains("Error: Failed to apply patch"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "a\nb\nc");
    }

    #[tokio::test]
    async fn test_executor_fault_is_absorbed() {
        let dir = tempdir().unwrap();
        let mock = Arc::new(MockLlmClient::with_responses([
            r#"{"action":"run","cmd":"ls"}"#,
            r#"{"action":"done","summary":"done anyway"}"#,
        ]));
        let executor = Arc::new(BrokenExecutor {
            dir: dir.path().to_path_buf(),
        });
        let mut agent = AgentLoop::new(mock.clone(), executor);

        let summary = agent.run("list").await;

        assert!(summary.completed);
        assert!(mock.prompts()[1].contains("Error: IO error during reach sandbox: sandbox offline"));
    }

    #[tokio::test]
    async fn test_cancel_before_first_step() {
        let dir = tempdir().unwrap();
        let mock = Arc::new(MockLlmClient::with_responses([r#"{"action":"done","summary":"x"}"#]));
        let stop = Arc::new(AtomicBool::new(true));
        let mut agent =
            AgentLoop::new(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path()))).with_stop_signal(stop);

        let summary = agent.run("anything").await;

        assert_eq!(summary.state, AgentState::Cancelled);
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.summary, "Agent cancelled after 0 steps.");
        assert!(mock.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_edit_and_create_through_loop() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("greeting.txt"), "hello\nworld\n").unwrap();
        let edit = serde_json::json!({
            "action": "edit",
            "file": "greeting.txt",
            "patch": "--- a/greeting.txt\n+++ b/greeting.txt\n@@ -2,1 +2,1 @@\n-world\n+rust"
        });
        let create = serde_json::json!({
            "action": "edit",
            "file": "notes/todo.md",
            "patch": "--- /dev/null\n+++ b/notes/todo.md\n@@ -0,0 +1,2 @@\n+# Todo\n+- ship it"
        });
        let mock = MockLlmClient::with_responses([
            edit.to_string(),
            create.to_string(),
            r#"{"action":"done","summary":"edited"}"#.to_string(),
        ]);
        let mut agent = agent(mock, dir.path());

        let summary = agent.run("update files").await;

        assert!(summary.completed);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("greeting.txt")).unwrap(),
            "hello\nrust\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/todo.md")).unwrap(),
            "# Todo\n- ship it\n"
        );
    }

    #[tokio::test]
    async fn test_events_published() {
        let dir = tempdir().unwrap();
        let mock = MockLlmClient::with_responses([
            r#"{"action":"run","cmd":"pwd"}"#,
            r#"{"action":"done","summary":"ok"}"#,
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut agent = agent(mock, dir.path()).with_events(tx);

        agent.run("where").await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], AgentEvent::StepStarted { step: 1, max_steps: 20 }));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolFinished { step: 1, .. })));
        assert!(matches!(events.last(), Some(AgentEvent::Finished(s)) if s.completed));
    }

    #[tokio::test]
    async fn test_reconfigure_safety() {
        let dir = tempdir().unwrap();
        let mock = Arc::new(MockLlmClient::with_responses([
            r#"{"action":"run","cmd":"ls"}"#,
            r#"{"action":"done","summary":"ok"}"#,
        ]));
        let mut agent = AgentLoop::new(mock.clone(), Arc::new(LocalToolExecutor::new(dir.path())));
        agent.reconfigure_safety(SafetyConfig {
            allowlist_mode: true,
            ..Default::default()
        });
        assert!(agent.config().safety.allowlist_mode);

        agent.run("list").await;
        assert!(mock.prompts()[1].contains("Exit Code: 0"));
    }

    #[test]
    fn test_summary_display() {
        let summary = AgentRunSummary {
            state: AgentState::StoppedAtMaxSteps,
            steps: 20,
            completed: false,
            summary: "Agent stopped after 20 steps without completing the goal.".to_string(),
        };
        let text = summary.to_string();
        assert!(text.contains("Total steps: 20"));
        assert!(text.contains("Status: step limit reached"));
    }
}
