//! End-to-end scenarios: scripted LLM roles over a seeded in-memory graph.

mod support;

use support::{orchestrator, OBSERVER_INSUFFICIENT, OBSERVER_SUFFICIENT};
use vigil_agent::schemas::CompletionReason;
use vigil_graph::MemoryGraph;

/// Single-drug AE lookup: resolve then list, one iteration, no paths, every
/// adverse event label lands in the evidence maps.
#[tokio::test]
async fn test_single_drug_ae_lookup() {
    let mut graph = MemoryGraph::new();
    graph.add_drug(14042, "Cardozil");
    for i in 0..84 {
        let ae_key = 2000 + i;
        graph.add_adverse_event(ae_key, &format!("adverse event {i}"));
        let frequency = 0.003 + (i as f64) * (0.12 - 0.003) / 83.0;
        graph.add_ae_claim(14042, ae_key, Some(frequency), "sider");
    }

    let plan = r#"{
        "thought": "Resolve the drug, then list its known adverse events.",
        "calls": [
            {"tool": "resolve_drugs", "args": {"names": ["cardozil"]}, "reason": "name to key"},
            {"tool": "get_drug_adverse_events", "args": {"drug_key": "cardozil", "limit": 100}, "reason": "list AEs"}
        ],
        "stop_conditions": {"no_relevant_tools": false, "sufficient_information": false}
    }"#;

    let (engine, scripts) = orchestrator(
        graph,
        vec![plan],
        vec![OBSERVER_SUFFICIENT],
        vec!["Cardozil is associated with 84 label-listed adverse events."],
    );

    let response = engine
        .run_query("What adverse events does cardozil cause?", None, None)
        .await;

    assert_eq!(response.completion_reason, CompletionReason::Sufficient);
    assert!(response.paths.is_none());
    assert_eq!(response.evidence.drugs.get("cardozil"), Some(&14042));
    assert_eq!(response.evidence.adverse_events.len(), 84);
    assert_eq!(response.trace.len(), 1);
    assert_eq!(response.trace[0].calls.len(), 2);
    assert!(response.trace[0].calls.iter().all(|c| c.ok));
    assert_eq!(scripts.planner.call_count(), 1);
    assert_eq!(scripts.narrator.call_count(), 1);
}

/// Drug–AE mechanism: the mechanistic path outranks the weak direct path and
/// both arrive in the final response with clamped scores.
#[tokio::test]
async fn test_drug_ae_mechanism_ranking() {
    let mut graph = MemoryGraph::new();
    graph.add_drug(1, "Cardozil");
    graph.add_gene(10, "KCNH2");
    graph.add_pathway(20, "Cardiac conduction");
    graph.add_adverse_event(30, "qt prolongation");
    let target_claim = graph.add_target_claim(1, 10, Some(0.8), "drugcentral");
    graph.add_evidence_to_claim(target_claim, "chembl");
    graph.add_pathway_claim(10, 20, "reactome");
    graph.add_ae_claim(1, 30, Some(0.05), "sider");

    let plan = r#"{
        "thought": "Resolve both entities, then search for mechanistic paths.",
        "calls": [
            {"tool": "resolve_drugs", "args": {"names": ["cardozil"]}, "reason": "key"},
            {"tool": "resolve_adverse_events", "args": {"terms": ["qt prolongation"]}, "reason": "key"},
            {"tool": "find_drug_to_ae_paths", "args": {"drug_key": "cardozil", "ae_key": "qt prolongation", "max_paths": 10}, "reason": "mechanism"}
        ],
        "stop_conditions": {"no_relevant_tools": false, "sufficient_information": false}
    }"#;

    let (engine, _scripts) = orchestrator(
        graph,
        vec![plan],
        vec![OBSERVER_SUFFICIENT],
        vec!["The association is mechanistically supported via KCNH2."],
    );

    let response = engine
        .run_query("Why might cardozil cause QT prolongation?", None, None)
        .await;

    assert_eq!(response.completion_reason, CompletionReason::Sufficient);
    let paths = response.paths.expect("paths present");
    assert!(paths.len() >= 2);

    let top = &paths[0];
    assert_eq!(top.steps.len(), 3);
    assert!((top.score - 0.8 * 0.95 * 0.95 * 1.2).abs() < 1e-9);

    let direct = paths.iter().find(|p| p.steps.len() == 2).expect("direct path");
    assert!((direct.score - 0.05 * 0.95).abs() < 1e-9);

    // Provenance round-trip: every path claim is in the evidence summary.
    for path in &paths {
        for claim_key in &path.claim_keys {
            assert!(response.evidence.claim_ids.contains(claim_key));
        }
    }
}

/// Shared targets across three drugs: the common gene is accumulated; a
/// partial verdict that can still answer is an acceptable terminal state.
#[tokio::test]
async fn test_shared_targets_across_drugs() {
    let mut graph = MemoryGraph::new();
    graph.add_drug(1, "alphadol");
    graph.add_drug(2, "betadol");
    graph.add_drug(3, "gammadol");
    graph.add_gene(77, "ABCB1");
    graph.add_gene(10, "CYP3A4");
    graph.add_gene(11, "SLC6A4");
    for (drug, other) in [(1, 10), (2, 11), (3, 10)] {
        graph.add_target_claim(drug, 77, Some(0.7), "drugcentral");
        graph.add_target_claim(drug, other, Some(0.5), "chembl");
    }

    let plan_resolve = r#"{
        "thought": "Resolve all three drug names first.",
        "calls": [
            {"tool": "resolve_drugs", "args": {"names": ["alphadol", "betadol", "gammadol"]}, "reason": "keys"}
        ],
        "stop_conditions": {"no_relevant_tools": false, "sufficient_information": false}
    }"#;
    let plan_targets = r#"{
        "thought": "Fetch target sets for each resolved drug to compare them.",
        "calls": [
            {"tool": "get_drug_targets", "args": {"drug_key": "alphadol"}, "reason": "targets"},
            {"tool": "get_drug_targets", "args": {"drug_key": "betadol"}, "reason": "targets"},
            {"tool": "get_drug_targets", "args": {"drug_key": "gammadol"}, "reason": "targets"}
        ],
        "stop_conditions": {"no_relevant_tools": false, "sufficient_information": false}
    }"#;
    let observer_partial = r#"{
        "status": "partially_sufficient",
        "confidence": 0.6,
        "reasoning": "per-drug target sets are known; no dedicated intersection tool exists",
        "gaps": [
            {"category": "intersection", "description": "no tool computes the shared-target set directly", "priority": 2}
        ],
        "can_answer": true
    }"#;

    let (engine, scripts) = orchestrator(
        graph,
        vec![plan_resolve, plan_targets],
        vec![OBSERVER_INSUFFICIENT, observer_partial],
        vec!["All three drugs share the transporter ABCB1."],
    );

    let response = engine
        .run_query(
            "Which gene do alphadol, betadol and gammadol all target?",
            None,
            None,
        )
        .await;

    assert_eq!(response.completion_reason, CompletionReason::Sufficient);
    assert!(response.trace.len() <= 3);
    assert_eq!(response.evidence.genes.get("ABCB1"), Some(&77));
    assert_eq!(scripts.planner.call_count(), 2);
}

/// Unknown entity: resolution returns null, nothing is fabricated, and the
/// narrator states the absence of evidence explicitly.
#[tokio::test]
async fn test_unknown_entity_yields_no_fabricated_keys() {
    let mut graph = MemoryGraph::new();
    graph.add_drug(1, "cardozil");

    let plan = r#"{
        "thought": "Resolve the named drug before anything else.",
        "calls": [
            {"tool": "resolve_drugs", "args": {"names": ["zanithrax"]}, "reason": "key"}
        ],
        "stop_conditions": {"no_relevant_tools": false, "sufficient_information": false}
    }"#;
    let observer = r#"{
        "status": "partially_sufficient",
        "confidence": 0.8,
        "reasoning": "the drug does not exist in the graph; that is itself the answer",
        "gaps": [],
        "can_answer": true
    }"#;

    let (engine, _scripts) = orchestrator(
        graph,
        vec![plan],
        vec![observer],
        vec!["No evidence for a drug named zanithrax exists in the knowledge graph."],
    );

    let response = engine
        .run_query("Does zanithrax target protein W?", None, None)
        .await;

    assert_eq!(response.completion_reason, CompletionReason::Sufficient);
    assert!(response.evidence.drugs.is_empty());
    assert!(response.summary.to_lowercase().contains("no evidence"));
}

/// Malformed plan repair: the first planner response is not JSON, the repair
/// retry succeeds, and the loop proceeds normally.
#[tokio::test]
async fn test_malformed_plan_is_repaired_once() {
    let mut graph = MemoryGraph::new();
    graph.add_drug(1, "cardozil");
    graph.add_adverse_event(30, "nausea");
    graph.add_ae_claim(1, 30, Some(0.1), "sider");

    let valid_plan = r#"{
        "thought": "Resolve, then list adverse events.",
        "calls": [
            {"tool": "resolve_drugs", "args": {"names": ["cardozil"]}, "reason": "key"},
            {"tool": "get_drug_adverse_events", "args": {"drug_key": "cardozil"}, "reason": "AEs"}
        ],
        "stop_conditions": {"no_relevant_tools": false, "sufficient_information": false}
    }"#;

    let (engine, scripts) = orchestrator(
        graph,
        vec!["Sure! I will start by resolving the drug.", valid_plan],
        vec![OBSERVER_SUFFICIENT],
        vec!["Cardozil lists nausea on its label."],
    );

    let response = engine
        .run_query("What adverse events does cardozil cause?", None, None)
        .await;

    assert_eq!(response.completion_reason, CompletionReason::Sufficient);
    assert_eq!(scripts.planner.call_count(), 2);
    assert_eq!(response.trace.len(), 1);
}

/// A planner that stays malformed ends the query with `error`.
#[tokio::test]
async fn test_unrepairable_plan_ends_with_error() {
    let mut graph = MemoryGraph::new();
    graph.add_drug(1, "cardozil");

    let (engine, scripts) = orchestrator(
        graph,
        vec!["not json", "still not json"],
        vec![],
        vec![],
    );

    let response = engine.run_query("anything", None, None).await;

    assert_eq!(response.completion_reason, CompletionReason::Error);
    assert_eq!(response.error.as_deref(), Some("llm.malformed_plan"));
    assert_eq!(scripts.planner.call_count(), 2);
    assert_eq!(scripts.narrator.call_count(), 0);
}

/// Iteration budget exhausted: exactly max_iterations plans run, then the
/// narrator is forced on whatever evidence exists.
#[tokio::test]
async fn test_iteration_budget_exhausted() {
    let mut graph = MemoryGraph::new();
    graph.add_drug(1, "cardozil");

    let plan = r#"{
        "thought": "Keep looking for more context.",
        "calls": [
            {"tool": "resolve_drugs", "args": {"names": ["cardozil"]}, "reason": "key"}
        ],
        "stop_conditions": {"no_relevant_tools": false, "sufficient_information": false}
    }"#;

    let (engine, scripts) = orchestrator(
        graph,
        vec![plan, plan, plan],
        vec![OBSERVER_INSUFFICIENT, OBSERVER_INSUFFICIENT, OBSERVER_INSUFFICIENT],
        vec!["Only the drug identity could be established."],
    );

    let response = engine.run_query("unanswerable question", Some(3), None).await;

    assert_eq!(response.completion_reason, CompletionReason::MaxIterations);
    assert_eq!(response.trace.len(), 3);
    assert_eq!(scripts.planner.call_count(), 3);
    assert_eq!(scripts.narrator.call_count(), 1);
    // Accumulated evidence survives into the best-effort response.
    assert_eq!(response.evidence.drugs.get("cardozil"), Some(&1));
}

/// An explicit planner stop signal short-cuts to the narrator.
#[tokio::test]
async fn test_planner_stop_signal() {
    let graph = MemoryGraph::new();
    let stop_plan = r#"{
        "thought": "No tool in the catalog can answer a dosing question.",
        "calls": [],
        "stop_conditions": {"no_relevant_tools": true, "sufficient_information": false}
    }"#;

    let (engine, scripts) = orchestrator(
        graph,
        vec![stop_plan],
        vec![],
        vec!["The knowledge graph holds no dosing guidance."],
    );

    let response = engine.run_query("What is the right dose?", None, None).await;

    assert_eq!(response.completion_reason, CompletionReason::PlannerStop);
    assert_eq!(scripts.observer.call_count(), 0);
    assert_eq!(scripts.narrator.call_count(), 1);
    assert_eq!(response.trace.len(), 1);
}

/// Cancellation before the first transition produces a partial result and
/// never reaches the LLM.
#[tokio::test]
async fn test_cancellation_before_first_plan() {
    let graph = MemoryGraph::new();
    let (engine, scripts) = orchestrator(graph, vec![], vec![], vec![]);

    let token = vigil_agent::CancelToken::new();
    token.cancel();

    let response = engine.run_query("anything", None, Some(&token)).await;

    assert_eq!(response.completion_reason, CompletionReason::Cancelled);
    assert_eq!(scripts.planner.call_count(), 0);
    assert_eq!(scripts.narrator.call_count(), 0);
}
