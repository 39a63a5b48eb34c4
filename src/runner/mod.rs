//! Agent runner module - drives a goal through the agent core.
//!
//! This module provides:
//! - AgentLoop, the step state machine
//! - AgentRunSummary and AgentEvent for reporting progress
//! - StopSignal for cooperative cancellation

mod agent_loop;

pub use agent_loop::{
    AGENT_SYSTEM_PROMPT, AgentConfig, AgentEvent, AgentLoop, AgentRunSummary, AgentState, NeverStop, StopSignal,
};
