//! Shared fixtures for the end-to-end scenarios: a scripted LLM backend and
//! orchestrator wiring over the in-memory graph store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vigil_agent::orchestrator::ReactOrchestrator;
use vigil_common::config::AgentConfig;
use vigil_graph::MemoryGraph;
use vigil_kg::ScoringPolicy;
use vigil_llm::backend::{LlmBackend, LlmError, LlmRequest, LlmResponse};
use vigil_llm::{ChatClient, LlmRole};

/// Backend that replays a fixed sequence of responses and counts calls.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<u32>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
        *self.calls.lock().unwrap() += 1;
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "(script exhausted)".to_string());
        Ok(LlmResponse {
            content,
            model: "scripted".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }

    fn is_local(&self) -> bool {
        true
    }
}

pub struct Scripts {
    pub planner: Arc<ScriptedBackend>,
    pub observer: Arc<ScriptedBackend>,
    pub narrator: Arc<ScriptedBackend>,
}

/// Orchestrator over a seeded graph with scripted role backends.
pub fn orchestrator(
    graph: MemoryGraph,
    planner_responses: Vec<&str>,
    observer_responses: Vec<&str>,
    narrator_responses: Vec<&str>,
) -> (ReactOrchestrator, Scripts) {
    let _ = tracing_subscriber::fmt::try_init();
    let planner = ScriptedBackend::new(planner_responses);
    let observer = ScriptedBackend::new(observer_responses);
    let narrator = ScriptedBackend::new(narrator_responses);

    let agent = AgentConfig {
        max_iterations: 3,
        tool_timeout_secs: 30,
        truncation_cap: 30,
    };

    let orchestrator = ReactOrchestrator::new(
        Arc::new(graph),
        ChatClient::new(planner.clone(), LlmRole::Planner, 0.1, 4096),
        ChatClient::new(observer.clone(), LlmRole::Observer, 0.1, 1024),
        ChatClient::new(narrator.clone(), LlmRole::Narrator, 0.3, 8192),
        ScoringPolicy::default(),
        &agent,
    );

    (orchestrator, Scripts { planner, observer, narrator })
}

pub const OBSERVER_SUFFICIENT: &str = r#"{
    "status": "sufficient",
    "confidence": 0.9,
    "reasoning": "the query is fully answered by the gathered evidence",
    "gaps": [],
    "can_answer": true
}"#;

pub const OBSERVER_INSUFFICIENT: &str = r#"{
    "status": "insufficient",
    "confidence": 0.3,
    "reasoning": "mechanistic context is still missing",
    "gaps": [
        {"category": "mechanism", "description": "need drug targets", "priority": 1, "suggested_tool": "get_drug_targets"}
    ],
    "can_answer": false
}"#;
