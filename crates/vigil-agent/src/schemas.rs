//! Declared records for everything that crosses the LLM boundary.
//!
//! The planner and observer produce JSON parsed into these structs; the tool
//! enum is closed, so a call the model invents cannot reach the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vigil_kg::paths::{MechanisticPath, PathStep};

// ── Tool allow-list ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ResolveDrugs,
    ResolveGenes,
    ResolveDiseases,
    ResolveAdverseEvents,
    GetDrugTargets,
    GetGenePathways,
    GetGeneDiseases,
    GetDiseaseGenes,
    GetGeneInteractors,
    ExpandMechanism,
    ExpandGeneContext,
    GetDrugAdverseEvents,
    GetDrugProfile,
    GetDrugLabelSections,
    GetDrugFaersSignals,
    GetClaimEvidence,
    GetEntityClaims,
    FindDrugToAePaths,
    ExplainPaths,
    BuildSubgraph,
    ScoreEdges,
}

impl ToolName {
    pub const ALL: [ToolName; 21] = [
        ToolName::ResolveDrugs,
        ToolName::ResolveGenes,
        ToolName::ResolveDiseases,
        ToolName::ResolveAdverseEvents,
        ToolName::GetDrugTargets,
        ToolName::GetGenePathways,
        ToolName::GetGeneDiseases,
        ToolName::GetDiseaseGenes,
        ToolName::GetGeneInteractors,
        ToolName::ExpandMechanism,
        ToolName::ExpandGeneContext,
        ToolName::GetDrugAdverseEvents,
        ToolName::GetDrugProfile,
        ToolName::GetDrugLabelSections,
        ToolName::GetDrugFaersSignals,
        ToolName::GetClaimEvidence,
        ToolName::GetEntityClaims,
        ToolName::FindDrugToAePaths,
        ToolName::ExplainPaths,
        ToolName::BuildSubgraph,
        ToolName::ScoreEdges,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ResolveDrugs => "resolve_drugs",
            ToolName::ResolveGenes => "resolve_genes",
            ToolName::ResolveDiseases => "resolve_diseases",
            ToolName::ResolveAdverseEvents => "resolve_adverse_events",
            ToolName::GetDrugTargets => "get_drug_targets",
            ToolName::GetGenePathways => "get_gene_pathways",
            ToolName::GetGeneDiseases => "get_gene_diseases",
            ToolName::GetDiseaseGenes => "get_disease_genes",
            ToolName::GetGeneInteractors => "get_gene_interactors",
            ToolName::ExpandMechanism => "expand_mechanism",
            ToolName::ExpandGeneContext => "expand_gene_context",
            ToolName::GetDrugAdverseEvents => "get_drug_adverse_events",
            ToolName::GetDrugProfile => "get_drug_profile",
            ToolName::GetDrugLabelSections => "get_drug_label_sections",
            ToolName::GetDrugFaersSignals => "get_drug_faers_signals",
            ToolName::GetClaimEvidence => "get_claim_evidence",
            ToolName::GetEntityClaims => "get_entity_claims",
            ToolName::FindDrugToAePaths => "find_drug_to_ae_paths",
            ToolName::ExplainPaths => "explain_paths",
            ToolName::BuildSubgraph => "build_subgraph",
            ToolName::ScoreEdges => "score_edges",
        }
    }

    /// Membership check against the closed allow-list.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().find(|t| t.as_str() == raw).copied()
    }

    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            ToolName::ResolveDrugs
                | ToolName::ResolveGenes
                | ToolName::ResolveDiseases
                | ToolName::ResolveAdverseEvents
        )
    }
}

// ── Planner output ───────────────────────────────────────────────────────────

/// A single tool call as produced by the planner. The tool name stays a raw
/// string here; the dispatcher validates it against the allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopConditions {
    #[serde(default)]
    pub no_relevant_tools: bool,
    #[serde(default)]
    pub sufficient_information: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPlan {
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub calls: Vec<ToolCallRequest>,
    #[serde(default)]
    pub stop_conditions: StopConditions,
}

impl ToolPlan {
    /// Explicit stop signal, if the planner raised one.
    pub fn stop_signal(&self) -> Option<&'static str> {
        if self.stop_conditions.sufficient_information {
            Some("sufficient_information")
        } else if self.stop_conditions.no_relevant_tools {
            Some("no_relevant_tools")
        } else {
            None
        }
    }
}

// ── Observer output ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SufficiencyStatus {
    Sufficient,
    Insufficient,
    PartiallySufficient,
}

impl SufficiencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SufficiencyStatus::Sufficient => "sufficient",
            SufficiencyStatus::Insufficient => "insufficient",
            SufficiencyStatus::PartiallySufficient => "partially_sufficient",
        }
    }
}

fn default_priority() -> u8 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InformationGap {
    pub category: String,
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub suggested_tool: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SufficiencyVerdict {
    pub status: SufficiencyStatus,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, alias = "information_gaps")]
    pub gaps: Vec<InformationGap>,
    #[serde(alias = "can_answer_with_current_data")]
    pub can_answer: bool,
}

impl SufficiencyVerdict {
    /// True when the loop may hand over to the narrator.
    pub fn ready_to_narrate(&self) -> bool {
        match self.status {
            SufficiencyStatus::Sufficient => true,
            SufficiencyStatus::PartiallySufficient => self.can_answer,
            SufficiencyStatus::Insufficient => false,
        }
    }
}

// ── Dispatcher output ────────────────────────────────────────────────────────

/// One executed (or rejected) tool call. `shaped` is the view the observer
/// sees; the full payload lives in the evidence pack.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub tool: String,
    pub args: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
    pub shaped: Value,
    pub summary: String,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_count: Option<usize>,
}

// ── Trace and final response ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallLog {
    pub tool: String,
    pub args: Value,
    pub ok: bool,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerdictSummary {
    pub status: SufficiencyStatus,
    pub confidence: f64,
    pub can_answer: bool,
    pub gap_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationLog {
    pub iteration: u32,
    pub thought: String,
    pub calls: Vec<ToolCallLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<VerdictSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Sufficient,
    MaxIterations,
    PlannerStop,
    Cancelled,
    Error,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceSummary {
    pub drugs: BTreeMap<String, i64>,
    pub genes: BTreeMap<String, i64>,
    pub diseases: BTreeMap<String, i64>,
    pub adverse_events: BTreeMap<String, i64>,
    pub claim_ids: Vec<i64>,
    pub evidence_ids: Vec<i64>,
    pub dataset_ids: Vec<String>,
}

/// A ranked path as serialized in the final response; the score is clamped
/// to [0,1] here, at the boundary.
#[derive(Debug, Clone, Serialize)]
pub struct PathView {
    pub steps: Vec<PathStep>,
    pub score: f64,
    pub evidence_count: usize,
    pub claim_keys: Vec<i64>,
}

impl PathView {
    pub fn from_path(path: &MechanisticPath) -> Self {
        Self {
            steps: path.steps.clone(),
            score: path.score.clamp(0.0, 1.0),
            evidence_count: path.evidence_count,
            claim_keys: path.claim_keys(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub summary: String,
    pub subgraph: Option<Value>,
    pub paths: Option<Vec<PathView>>,
    pub evidence: EvidenceSummary,
    pub trace: Vec<IterationLog>,
    pub completion_reason: CompletionReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("drop_table"), None);
        assert_eq!(ToolName::parse(""), None);
    }

    #[test]
    fn test_plan_parses_from_planner_json() {
        let raw = r#"{
            "thought": "resolve the drug first",
            "calls": [
                {"tool": "resolve_drugs", "args": {"names": ["metformin"]}, "reason": "names to keys"}
            ],
            "stop_conditions": {"no_relevant_tools": false, "sufficient_information": false}
        }"#;
        let plan: ToolPlan = serde_json::from_str(raw).unwrap();
        assert_eq!(plan.calls.len(), 1);
        assert_eq!(plan.calls[0].tool, "resolve_drugs");
        assert!(plan.stop_signal().is_none());
    }

    #[test]
    fn test_plan_defaults_tolerate_missing_fields() {
        let plan: ToolPlan = serde_json::from_str(r#"{"thought": "done"}"#).unwrap();
        assert!(plan.calls.is_empty());
        assert!(plan.stop_signal().is_none());

        let stopping: ToolPlan = serde_json::from_str(
            r#"{"thought": "enough", "calls": [], "stop_conditions": {"sufficient_information": true}}"#,
        )
        .unwrap();
        assert_eq!(stopping.stop_signal(), Some("sufficient_information"));
    }

    #[test]
    fn test_verdict_accepts_long_field_aliases() {
        let raw = r#"{
            "status": "partially_sufficient",
            "confidence": 0.6,
            "reasoning": "have AEs, missing mechanism",
            "information_gaps": [
                {"category": "mechanism", "description": "need targets", "suggested_tool": "get_drug_targets"}
            ],
            "can_answer_with_current_data": true
        }"#;
        let verdict: SufficiencyVerdict = serde_json::from_str(raw).unwrap();
        assert_eq!(verdict.status, SufficiencyStatus::PartiallySufficient);
        assert!(verdict.can_answer);
        assert!(verdict.ready_to_narrate());
        assert_eq!(verdict.gaps[0].priority, 1);
    }

    #[test]
    fn test_insufficient_never_narrates() {
        let verdict = SufficiencyVerdict {
            status: SufficiencyStatus::Insufficient,
            confidence: 0.9,
            reasoning: String::new(),
            gaps: vec![],
            can_answer: true,
        };
        assert!(!verdict.ready_to_narrate());
    }
}
