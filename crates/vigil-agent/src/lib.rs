//! vigil-agent — the reasoning loop over the tool library.
//!
//! A query runs through a finite state machine: plan (LLM) → dispatch
//! (validated tool execution) → observe (LLM sufficiency verdict) → loop or
//! narrate. The dispatcher gates every tool call behind a closed allow-list
//! and shapes results for the observer; the evidence pack threads resolved
//! entities, claims, paths and provenance ids across iterations so the final
//! narrative cites only observed data.

pub mod dispatcher;
pub mod evidence;
pub mod orchestrator;
pub mod prompts;
pub mod schemas;

pub use dispatcher::ToolDispatcher;
pub use evidence::EvidencePack;
pub use orchestrator::{CancelToken, ReactOrchestrator};
pub use schemas::{
    CompletionReason, InformationGap, QueryResponse, SufficiencyStatus, SufficiencyVerdict,
    ToolCallRequest, ToolName, ToolPlan, ToolResult,
};
