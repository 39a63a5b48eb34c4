//! Chat history - prompt/answer transcripts saved as JSON files

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{LozError, Result};

/// One LLM exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAndAnswer {
    pub mode: String,
    pub model: String,
    pub prompt: String,
    pub answer: String,
}

impl PromptAndAnswer {
    pub fn new(
        mode: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            mode: mode.into(),
            model: model.into(),
            prompt: prompt.into(),
            answer: answer.into(),
        }
    }
}

/// Serialized shape of a saved session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub date: DateTime<Local>,
    pub dialogue: Vec<PromptAndAnswer>,
}

#[derive(Debug)]
pub struct ChatHistoryManager {
    dir: PathBuf,
    started: DateTime<Local>,
    dialogue: Vec<PromptAndAnswer>,
}

impl ChatHistoryManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            started: Local::now(),
            dialogue: Vec::new(),
        }
    }

    pub fn add(&mut self, entry: PromptAndAnswer) {
        self.dialogue.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = PromptAndAnswer>) {
        self.dialogue.extend(entries);
    }

    pub fn dialogue(&self) -> &[PromptAndAnswer] {
        &self.dialogue
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the session to `<dir>/<Y-M-D-H-M-S>.json`. Nothing is written
    /// for an empty session.
    pub fn save(&self) -> Result<Option<PathBuf>> {
        if self.dialogue.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| LozError::History(format!("Failed to create {}: {}", self.dir.display(), e)))?;

        let history = ChatHistory {
            date: self.started,
            dialogue: self.dialogue.clone(),
        };
        let path = self.dir.join(file_name(&self.started));
        let json = serde_json::to_string_pretty(&history)?;
        std::fs::write(&path, json)
            .map_err(|e| LozError::History(format!("Failed to write {}: {}", path.display(), e)))?;

        log::info!("Saved chat history to {}", path.display());
        Ok(Some(path))
    }
}

/// Unpadded date/time components joined with dashes
fn file_name(date: &DateTime<Local>) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}.json",
        date.year(),
        date.month(),
        date.day(),
        date.hour(),
        date.minute(),
        date.second()
    )
}
