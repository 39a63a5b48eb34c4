//! Agent memory - append-only step log rendered into a bounded context
//!
//! The log grows without limit; [`AgentMemory::build_context`] keeps what the
//! model sees bounded by showing the first and most recent steps only.

use std::collections::BTreeMap;

/// Above this many steps the middle of the history is elided
const MAX_VISIBLE_STEPS: usize = 10;
const KEEP_INITIAL_STEPS: usize = 2;
const KEEP_RECENT_STEPS: usize = 6;

/// Results longer than this (in characters) are cut when rendered
const RESULT_PREVIEW_CHARS: usize = 500;

/// One event in the agent's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEntry {
    UserGoal(String),
    Action { text: String, step: u32 },
    Result { text: String, step: u32 },
}

#[derive(Debug, Default)]
struct StepRecord<'a> {
    action: &'a str,
    result: Option<&'a str>,
}

/// Append-only log of goal, action and result entries
#[derive(Debug, Clone, Default)]
pub struct AgentMemory {
    entries: Vec<ContextEntry>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user_goal(&mut self, goal: impl Into<String>) {
        self.entries.push(ContextEntry::UserGoal(goal.into()));
    }

    pub fn add_action(&mut self, action: impl Into<String>, step: u32) {
        self.entries.push(ContextEntry::Action {
            text: action.into(),
            step,
        });
    }

    pub fn add_result(&mut self, result: impl Into<String>, step: u32) {
        self.entries.push(ContextEntry::Result {
            text: result.into(),
            step,
        });
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render the log as the context block of the next prompt.
    ///
    /// Deterministic for a given log: the goal, then every step in order, or
    /// only the first 2 and last 6 steps once there are more than 10.
    pub fn build_context(&self) -> String {
        let mut out = String::new();

        let goal = self.entries.iter().rev().find_map(|entry| match entry {
            ContextEntry::UserGoal(goal) => Some(goal.as_str()),
            _ => None,
        });
        if let Some(goal) = goal {
            out.push_str(&format!("# Task\n{}\n\n", goal));
        }

        let mut steps: BTreeMap<u32, StepRecord<'_>> = BTreeMap::new();
        for entry in &self.entries {
            match entry {
                ContextEntry::Action { text, step } => steps.entry(*step).or_default().action = text.as_str(),
                ContextEntry::Result { text, step } => steps.entry(*step).or_default().result = Some(text.as_str()),
                ContextEntry::UserGoal(_) => {}
            }
        }

        if steps.is_empty() {
            return out;
        }

        out.push_str("# Previous Steps\n\n");

        let total = steps.len();
        let visible: Vec<(&u32, &StepRecord<'_>)> = if total > MAX_VISIBLE_STEPS {
            out.push_str(&format!(
                "[Showing first {} and last {} of {} steps; {} steps omitted]\n\n",
                KEEP_INITIAL_STEPS,
                KEEP_RECENT_STEPS,
                total,
                total - KEEP_INITIAL_STEPS - KEEP_RECENT_STEPS
            ));
            steps
                .iter()
                .take(KEEP_INITIAL_STEPS)
                .chain(steps.iter().skip(total - KEEP_RECENT_STEPS))
                .collect()
        } else {
            steps.iter().collect()
        };

        for (step, record) in visible {
            out.push_str(&format!("## Step {}\n", step));
            out.push_str(&format!("Action: {}\n", record.action));
            if let Some(result) = record.result.filter(|r| !r.is_empty()) {
                out.push_str(&format!("Result: {}\n", preview(result, RESULT_PREVIEW_CHARS)));
            }
            out.push('\n');
        }

        out
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{}...[truncated {} chars]", kept, total - max_chars)
}
