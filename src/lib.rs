//! Loz - an autonomous shell agent
//!
//! Loz turns a natural-language goal into a sequence of shell commands and
//! file edits proposed by an LLM, gating each one through a safety validator
//! before it touches the filesystem, until the model declares the goal done
//! or the loop gives up.

pub mod agent;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod runner;

pub use error::{LozError, Result};
