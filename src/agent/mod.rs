//! Agent module for Lore
//!
//! This module contains the research turn logic: the orchestrator that
//! drives the model and tools, the post-batch findings pass, and the
//! session-level chat service built on top of them.

pub mod findings;
pub mod orchestrator;
pub mod prompts;
pub mod service;

pub use orchestrator::{Orchestrator, TurnOutcome};
pub use service::{ChatReply, ChatService, TurnRequest};
