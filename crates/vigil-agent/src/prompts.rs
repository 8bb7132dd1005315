//! Prompt catalog: system prompts, the tool catalog text, and message
//! formatters for the three LLM roles.

use vigil_llm::Message;

use crate::schemas::{InformationGap, ToolResult};

/// Tool catalog embedded in the planner and observer prompts. Signatures
/// must stay in step with the dispatcher's argument structs.
pub const TOOL_CATALOG: &str = "\
### Entity Resolution (ALWAYS call first for user-provided names)
- resolve_drugs(names: [string]) -> {name: {name, key, confidence} | null}
- resolve_genes(symbols: [string]) -> {symbol: {name, key, confidence} | null}
- resolve_diseases(terms: [string]) -> {term: {name, key, confidence} | null}
- resolve_adverse_events(terms: [string]) -> {term: {name, key, confidence} | null}

### Mechanism
- get_drug_targets(drug_key: int) -> [{gene_symbol, gene_key, relation, claim_key}]
- get_gene_pathways(gene_key: int) -> [{pathway_label, pathway_key, reactome_id, claim_key}]
- get_gene_diseases(gene_key: int, min_score: float=0.0) -> [{disease_label, disease_key, score, claim_key}]
- get_disease_genes(disease_key: int, sources: [string]?, min_score: float=0.0, limit: int=50) -> [{gene_symbol, gene_key, score, claim_key}]
- get_gene_interactors(gene_key: int, min_score: float=0.4, limit: int=50) -> [{partner_symbol, partner_key, score, claim_key}]
- expand_mechanism(drug_key: int) -> {targets: [...], pathways: [...]}
- expand_gene_context(gene_keys: [int], min_disease_score: float=0.3) -> [{gene_key, pathways, diseases}]

### Adverse Events
- get_drug_adverse_events(drug_key: int, min_frequency: float?, limit: int=100) -> [{ae_label, ae_key, frequency, claim_key}] sorted by frequency
- get_drug_profile(drug_key: int) -> {drug, targets, adverse_events}
- get_drug_label_sections(drug_key: int, sections: [string]?) -> [{section_name, content, claim_key}]
- get_drug_faers_signals(drug_key: int, top_k: int=200, min_count: int=1, min_prr: float?) -> [{ae_label, ae_key, prr, ror, chi2, count, claim_key}]

### Provenance
- get_claim_evidence(claim_key: int) -> {claim_type, strength_score, evidence: [...]}
- get_entity_claims(entity_kind: string, entity_key: int, claim_types: [string]?, limit: int=100) -> [claims with evidence]

### Paths
- find_drug_to_ae_paths(drug_key: int, ae_key: int?, max_paths: int=10) -> ranked mechanistic paths
- explain_paths(drug_key: int, ae_key: int?, condition_keys: [int]?, top_k: int=5) -> paths boosted by patient conditions

### Subgraph
- build_subgraph(drug_keys: [int], include_targets/pathways/diseases/aes: bool, max_aes_per_drug: int=10) -> {nodes, edges}
- score_edges(weights: {edge_kind: float}?) -> re-weights the subgraph built so far
";

const PLANNER_SYSTEM: &str = "\
You are the planner for a pharmacovigilance knowledge graph engine.

You operate in a loop: Plan -> Execute -> Observe -> (repeat or finish).
Output a JSON plan with your reasoning and the tool calls for this iteration.

## Available Tools
{tool_catalog}

## Rules

1. In \"thought\", state WHAT information is needed and WHY these tools provide it
2. First iteration: start with resolve_* calls for every entity name in the query
3. Later iterations: use the resolved keys provided in context; call NEW tools
4. Do NOT repeat tool calls already executed (check the context)
5. MAXIMUM 5 tool calls per iteration - be selective
6. For *_key arguments you may pass a resolved entity name as a string; the
   executor substitutes the key

## Output Format

{
  \"thought\": \"...\",
  \"calls\": [
    {\"tool\": \"tool_name\", \"args\": {\"arg\": \"value\"}, \"reason\": \"why\"}
  ],
  \"stop_conditions\": {\"no_relevant_tools\": false, \"sufficient_information\": false}
}

If prior context already answers the query, set \"sufficient_information\": true and leave \"calls\" empty.
If no tool can help, set \"no_relevant_tools\": true and leave \"calls\" empty.
Respond with ONLY the JSON object.";

const OBSERVER_SYSTEM: &str = "\
You are the observation step of a pharmacovigilance knowledge graph engine.
Analyze the tool outputs and judge whether the original query can be answered.

## Evaluation Criteria

sufficient: the query can be fully answered with evidence-backed conclusions
insufficient: critical data is missing and tools exist to fill the gaps
partially_sufficient: a basic answer is possible but lacks depth

## Available Tools for Later Iterations
{tool_catalog}

## Output Format

Return ONLY valid JSON:

{
  \"status\": \"sufficient|insufficient|partially_sufficient\",
  \"confidence\": 0.0-1.0,
  \"reasoning\": \"what was learned, what is missing\",
  \"gaps\": [
    {\"category\": \"mechanism\", \"description\": \"...\", \"priority\": 1, \"suggested_tool\": \"get_drug_targets\"}
  ],
  \"can_answer\": true|false
}

Only mark sufficient if a healthcare professional could act on the answer.
For each gap, name the tool that would fill it.";

const NARRATOR_SYSTEM: &str = "\
You are a medical writer summarizing pharmacovigilance findings from a
knowledge graph.

## Critical Constraints

You may ONLY use the evidence provided below. You CANNOT:
- invent relationships not present in the evidence
- cite sources not listed in the evidence
- make causal claims without graph support

If evidence is missing for part of the query, say so explicitly and name the
data that would be needed. Cite claims and data sources using the provided
identifiers. Structure the summary as: Key Findings, Mechanistic Pathways,
Supporting Evidence, Limitations. Write for pharmacovigilance specialists.";

pub fn planner_system() -> String {
    PLANNER_SYSTEM.replace("{tool_catalog}", TOOL_CATALOG)
}

pub fn observer_system() -> String {
    OBSERVER_SYSTEM.replace("{tool_catalog}", TOOL_CATALOG)
}

/// Messages for one planner iteration. The trace digest replaces raw tool
/// payloads; the resolved-entity map is carried verbatim.
pub fn planner_messages(
    query: &str,
    iteration: u32,
    digest: &str,
    resolved: &str,
    gap_hints: &str,
) -> Vec<Message> {
    let user = if iteration == 1 {
        format!(
            "Query: {query}\n\nThis is iteration 1. Start by resolving the drug/gene/disease/adverse-event names in the query.\nRespond with ONLY JSON."
        )
    } else {
        let hints = if gap_hints.is_empty() {
            String::new()
        } else {
            format!("\n## Gaps To Address\n{gap_hints}\n")
        };
        format!(
            "Query: {query}\n\n## Iteration {iteration}\n\n## Progress So Far\n{digest}\n\n## Resolved Entities\n{resolved}\n{hints}\nPlan the NEXT tool calls to close the gaps. Do not repeat executed calls.\nRespond with ONLY JSON."
        )
    };
    vec![Message::system(planner_system()), Message::user(user)]
}

/// Messages for the observer's sufficiency judgement.
pub fn observer_messages(
    query: &str,
    iteration: u32,
    tool_results: &str,
    digest: &str,
) -> Vec<Message> {
    let prior = if digest.is_empty() {
        String::new()
    } else {
        format!("\n## Context From Previous Iterations\n{digest}\n")
    };
    let user = format!(
        "## Original Query\n{query}\n\n## Current Iteration\n{iteration}\n\n## Tool Results From This Iteration\n{tool_results}\n{prior}\nJudge whether the information above answers the original query.\nReturn ONLY valid JSON."
    );
    vec![Message::system(observer_system()), Message::user(user)]
}

/// Messages for the final narrative.
pub fn narrator_messages(query: &str, evidence_context: &str) -> Vec<Message> {
    let user = format!(
        "## Original Query\n{query}\n\n## Evidence From Knowledge Graph\n\n{evidence_context}\n\n---\n\nBased ONLY on the evidence above, write a summary addressing the original query.\nIf the evidence is insufficient, state explicitly what is missing."
    );
    vec![Message::system(NARRATOR_SYSTEM.to_string()), Message::user(user)]
}

/// Render executed tool results for the observer.
pub fn format_tool_results(results: &[ToolResult]) -> String {
    let mut lines = Vec::new();
    for result in results {
        let status = if result.ok { "[OK]" } else { "[FAIL]" };
        lines.push(format!("{status} {}({})", result.tool, result.args));
        if result.ok {
            if result.truncated {
                if let Some(total) = result.original_count {
                    lines.push(format!("  (truncated: showing a subset of {total} items)"));
                }
            }
            lines.push(format!("  Summary: {}", result.summary));
            lines.push(format!("  Result: {}", result.shaped));
        } else {
            let category = result.error_category.as_deref().unwrap_or("error");
            let detail = result.error.as_deref().unwrap_or("unknown failure");
            lines.push(format!("  Error [{category}]: {detail}"));
        }
    }
    if lines.is_empty() {
        "(no tool calls executed)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Render observer gaps as planner hints for the next iteration.
pub fn format_gap_hints(gaps: &[InformationGap]) -> String {
    let mut sorted: Vec<&InformationGap> = gaps.iter().collect();
    sorted.sort_by_key(|g| g.priority);
    sorted
        .iter()
        .map(|gap| {
            let tool = gap
                .suggested_tool
                .as_deref()
                .map(|t| format!(" (try {t})"))
                .unwrap_or_default();
            format!("- [P{}] {}: {}{tool}", gap.priority, gap.category, gap.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_covers_every_tool() {
        for tool in crate::schemas::ToolName::ALL {
            assert!(
                TOOL_CATALOG.contains(tool.as_str()),
                "catalog is missing {}",
                tool.as_str()
            );
        }
    }

    #[test]
    fn test_first_iteration_prompt_asks_for_resolution() {
        let messages = planner_messages("What AEs does metformin cause?", 1, "", "", "");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("iteration 1"));
        assert!(messages[1].content.contains("resolving"));
    }

    #[test]
    fn test_later_iterations_carry_digest_and_gaps() {
        let messages = planner_messages(
            "query",
            2,
            "Iteration 1: resolved metformin",
            "Drugs:\n  metformin -> drug_key=1",
            "- [P1] mechanism: need targets (try get_drug_targets)",
        );
        let user = &messages[1].content;
        assert!(user.contains("Iteration 2"));
        assert!(user.contains("drug_key=1"));
        assert!(user.contains("Gaps To Address"));
        assert!(user.contains("get_drug_targets"));
    }

    #[test]
    fn test_tool_result_rendering_marks_failures() {
        let ok = ToolResult {
            tool: "get_drug_targets".into(),
            args: json!({"drug_key": 1}),
            ok: true,
            error: None,
            error_category: None,
            shaped: json!([{"gene_symbol": "PRKAB1"}]),
            summary: "1 items".into(),
            truncated: false,
            original_count: Some(1),
        };
        let failed = ToolResult {
            tool: "get_gene_pathways".into(),
            args: json!({"gene_key": 10}),
            ok: false,
            error: Some("graph query failed".into()),
            error_category: Some("tool.upstream".into()),
            shaped: serde_json::Value::Null,
            summary: "failed".into(),
            truncated: false,
            original_count: None,
        };
        let text = format_tool_results(&[ok, failed]);
        assert!(text.contains("[OK] get_drug_targets"));
        assert!(text.contains("[FAIL] get_gene_pathways"));
        assert!(text.contains("tool.upstream"));
    }

    #[test]
    fn test_gap_hints_sorted_by_priority() {
        let gaps = vec![
            InformationGap {
                category: "pathway".into(),
                description: "need pathway context".into(),
                priority: 2,
                suggested_tool: None,
            },
            InformationGap {
                category: "mechanism".into(),
                description: "need targets".into(),
                priority: 1,
                suggested_tool: Some("get_drug_targets".into()),
            },
        ];
        let hints = format_gap_hints(&gaps);
        let mechanism_pos = hints.find("mechanism").unwrap();
        let pathway_pos = hints.find("pathway").unwrap();
        assert!(mechanism_pos < pathway_pos);
    }
}
