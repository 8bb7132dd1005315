//! ReAct orchestrator: the per-query finite state machine.
//!
//! States: init -> plan -> dispatch -> observe -> {plan | narrate | abort}.
//! The loop carries a rolling trace digest instead of raw payloads, folds the
//! observer's gaps into the next planner prompt, and checks cancellation at
//! every transition. Errors from the LLM are repaired or reported back into
//! the loop; infrastructure faults end the query with `error`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use vigil_common::config::{AgentConfig, Config};
use vigil_graph::GraphStore;
use vigil_kg::ScoringPolicy;
use vigil_llm::{client_for_role, ChatClient, LlmError, LlmRole};

use crate::dispatcher::ToolDispatcher;
use crate::evidence::EvidencePack;
use crate::prompts;
use crate::schemas::{
    CompletionReason, IterationLog, PathView, QueryResponse, SufficiencyStatus,
    SufficiencyVerdict, ToolCallLog, ToolPlan, VerdictSummary,
};

/// Cooperative cancellation flag, checked at state transitions and before
/// each tool call; never mid-tool.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

fn cancelled(cancel: Option<&CancelToken>) -> bool {
    cancel.map(CancelToken::is_cancelled).unwrap_or(false)
}

pub struct ReactOrchestrator {
    store: Arc<dyn GraphStore>,
    planner: ChatClient,
    observer: ChatClient,
    narrator: ChatClient,
    policy: ScoringPolicy,
    max_iterations: u32,
    tool_timeout: Duration,
    truncation_cap: usize,
}

impl ReactOrchestrator {
    pub fn new(
        store: Arc<dyn GraphStore>,
        planner: ChatClient,
        observer: ChatClient,
        narrator: ChatClient,
        policy: ScoringPolicy,
        agent: &AgentConfig,
    ) -> Self {
        Self {
            store,
            planner,
            observer,
            narrator,
            policy,
            max_iterations: AgentConfig::clamp_iterations(agent.max_iterations),
            tool_timeout: Duration::from_secs(agent.tool_timeout_secs),
            truncation_cap: agent.truncation_cap,
        }
    }

    /// Wire up the three role clients and the scoring policy from config.
    pub fn from_config(config: &Config, store: Arc<dyn GraphStore>) -> Self {
        Self::new(
            store,
            client_for_role(&config.llm, LlmRole::Planner),
            client_for_role(&config.llm, LlmRole::Observer),
            client_for_role(&config.llm, LlmRole::Narrator),
            ScoringPolicy::from_config(&config.scoring),
            &config.agent,
        )
    }

    /// Run one query to completion. Every outcome carries the trace log and
    /// the evidence gathered so far.
    pub async fn run_query(
        &self,
        query: &str,
        max_iterations: Option<u32>,
        cancel: Option<&CancelToken>,
    ) -> QueryResponse {
        let ceiling =
            AgentConfig::clamp_iterations(max_iterations.unwrap_or(self.max_iterations));
        let mut pack = EvidencePack::new(query);
        let mut trace: Vec<IterationLog> = Vec::new();

        tracing::info!(%query, max_iterations = ceiling, "query accepted");

        if let Err(err) = self.store.ping().await {
            tracing::error!(category = err.category(), error = %err, "graph store unreachable");
            return self.error_response(err.category(), &pack, trace);
        }

        let dispatcher = ToolDispatcher::new(
            &*self.store,
            &self.policy,
            self.truncation_cap,
            self.tool_timeout,
        );

        let mut digest = String::new();
        let mut observations: Vec<String> = Vec::new();
        let mut gap_hints = String::new();
        let mut completion = CompletionReason::MaxIterations;

        for iteration in 1..=ceiling {
            if cancelled(cancel) {
                return self.cancelled_response(&pack, trace);
            }

            // plan
            let messages = prompts::planner_messages(
                query,
                iteration,
                &digest,
                &pack.resolved_context(),
                &gap_hints,
            );
            let plan: ToolPlan = match self.planner.complete_structured(messages).await {
                Ok(plan) => plan,
                Err(err) => {
                    tracing::error!(category = err.category(), error = %err, "planner failed");
                    return self.error_response(err.category(), &pack, trace);
                }
            };

            if let Some(signal) = plan.stop_signal() {
                tracing::info!(iteration, signal, "planner raised a stop signal");
                trace.push(IterationLog {
                    iteration,
                    thought: plan.thought.clone(),
                    calls: vec![],
                    verdict: None,
                });
                completion = CompletionReason::PlannerStop;
                break;
            }

            if cancelled(cancel) {
                return self.cancelled_response(&pack, trace);
            }

            // dispatch
            tracing::debug!(iteration, calls = plan.calls.len(), "dispatching plan");
            let results = dispatcher.dispatch(&plan, &mut pack, cancel).await;
            let calls_log: Vec<ToolCallLog> = results
                .iter()
                .map(|r| ToolCallLog {
                    tool: r.tool.clone(),
                    args: r.args.clone(),
                    ok: r.ok,
                    summary: r.summary.clone(),
                })
                .collect();

            if cancelled(cancel) {
                trace.push(IterationLog {
                    iteration,
                    thought: plan.thought.clone(),
                    calls: calls_log,
                    verdict: None,
                });
                return self.cancelled_response(&pack, trace);
            }

            // observe
            let results_text = prompts::format_tool_results(&results);
            let observer_messages =
                prompts::observer_messages(query, iteration, &results_text, &digest);
            let verdict: SufficiencyVerdict =
                match self.observer.complete_structured(observer_messages).await {
                    Ok(verdict) => verdict,
                    Err(LlmError::Malformed { .. }) => {
                        tracing::warn!(
                            iteration,
                            "observer verdict malformed after repair retry; treating as insufficient"
                        );
                        SufficiencyVerdict {
                            status: SufficiencyStatus::Insufficient,
                            confidence: 0.0,
                            reasoning: "observer output was malformed".to_string(),
                            gaps: vec![],
                            can_answer: false,
                        }
                    }
                    Err(err) => {
                        tracing::error!(category = err.category(), error = %err, "observer failed");
                        return self.error_response(err.category(), &pack, trace);
                    }
                };

            tracing::info!(
                iteration,
                status = verdict.status.as_str(),
                confidence = verdict.confidence,
                can_answer = verdict.can_answer,
                gaps = verdict.gaps.len(),
                "observation"
            );

            trace.push(IterationLog {
                iteration,
                thought: plan.thought.clone(),
                calls: calls_log,
                verdict: Some(VerdictSummary {
                    status: verdict.status,
                    confidence: verdict.confidence,
                    can_answer: verdict.can_answer,
                    gap_categories: verdict.gaps.iter().map(|g| g.category.clone()).collect(),
                }),
            });

            // fold this iteration into the rolling digest
            let gap_categories = if verdict.gaps.is_empty() {
                "none".to_string()
            } else {
                verdict
                    .gaps
                    .iter()
                    .map(|g| g.category.clone())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            observations.push(format!(
                "Iteration {iteration}: {} (confidence {:.2}); gaps: {gap_categories}",
                verdict.status.as_str(),
                verdict.confidence
            ));
            digest = format!(
                "{}\n\nObservations:\n{}",
                pack.summarize_for_prompt(),
                observations.join("\n")
            );

            if verdict.ready_to_narrate() {
                completion = CompletionReason::Sufficient;
                break;
            }
            gap_hints = prompts::format_gap_hints(&verdict.gaps);
        }

        if cancelled(cancel) {
            return self.cancelled_response(&pack, trace);
        }

        // narrate — also reached on planner stop and on an exhausted budget,
        // where the narrator works best-effort from whatever evidence exists.
        let narrator_messages = prompts::narrator_messages(query, &pack.narrator_context());
        match self.narrator.complete_text(narrator_messages).await {
            Ok(summary) => self.build_response(summary, completion, &pack, trace, None),
            Err(err) => {
                tracing::error!(category = err.category(), error = %err, "narrator failed");
                self.error_response(err.category(), &pack, trace)
            }
        }
    }

    fn build_response(
        &self,
        summary: String,
        completion: CompletionReason,
        pack: &EvidencePack,
        trace: Vec<IterationLog>,
        error: Option<String>,
    ) -> QueryResponse {
        let paths: Vec<PathView> =
            pack.ranked_paths().into_iter().map(PathView::from_path).collect();
        QueryResponse {
            summary,
            subgraph: (!pack.subgraph.is_empty())
                .then(|| serde_json::to_value(&pack.subgraph).unwrap_or(Value::Null)),
            paths: if paths.is_empty() { None } else { Some(paths) },
            evidence: pack.evidence_summary(),
            trace,
            completion_reason: completion,
            error,
        }
    }

    fn error_response(
        &self,
        category: &str,
        pack: &EvidencePack,
        trace: Vec<IterationLog>,
    ) -> QueryResponse {
        self.build_response(
            format!("The query could not be completed ({category})."),
            CompletionReason::Error,
            pack,
            trace,
            Some(category.to_string()),
        )
    }

    fn cancelled_response(&self, pack: &EvidencePack, trace: Vec<IterationLog>) -> QueryResponse {
        tracing::info!("query cancelled; returning accumulated evidence");
        self.build_response(
            "The query was cancelled before completion; partial evidence is attached."
                .to_string(),
            CompletionReason::Cancelled,
            pack,
            trace,
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
