//! Tool dispatcher: allow-list check, key substitution, typed argument
//! coercion, timed execution, accumulation, and shaping for the observer.
//!
//! Per call, in strict order: the tool name must be a member of the closed
//! enum (unknown names produce a synthetic error result and never touch the
//! store); string arguments in `*_key` positions are substituted from the
//! resolved-entity maps; arguments are coerced into the tool's declared
//! parameter struct; the tool runs under a watchdog timeout; the raw return
//! is routed into the evidence pack; and a truncated, label-first view is
//! built for the observer. Calls within one plan execute sequentially.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use vigil_graph::{EntityKind, GraphStore};
use vigil_kg::adverse_events::{
    get_drug_adverse_events, get_drug_faers_signals, get_drug_label_sections, get_drug_profile,
    DrugAdverseEvent, DrugLabelSection, DrugProfile, FaersSignal,
};
use vigil_kg::evidence::{get_claim_evidence, get_entity_claims, ClaimDetail};
use vigil_kg::mechanism::{
    expand_gene_context, expand_mechanism, get_disease_genes, get_drug_targets,
    get_gene_diseases, get_gene_interactors, get_gene_pathways, DiseaseGene, DrugTarget,
    GeneContextEntry, GeneDisease, GeneInteractor, GenePathway, MechanismExpansion,
};
use vigil_kg::paths::{explain_paths, find_drug_to_ae_paths, MechanisticPath};
use vigil_kg::resolve::{
    resolve_adverse_events, resolve_diseases, resolve_drugs, resolve_genes, Resolution,
    ResolvedEntity,
};
use vigil_kg::subgraph::{build_subgraph, score_edges, Subgraph, SubgraphSpec};
use vigil_kg::{ScoringPolicy, ToolError};

use crate::evidence::EvidencePack;
use crate::orchestrator::CancelToken;
use crate::schemas::{ToolCallRequest, ToolName, ToolPlan, ToolResult};

/// Size cap applied to shaped label-section bodies (the 10 KiB tool-level
/// text stays in the evidence pack).
const SHAPED_LABEL_CHARS: usize = 1_000;

/// Raw, typed return of one tool execution. Routed into the evidence pack
/// before the shaped view is built.
pub enum ToolOutput {
    Resolution { kind: EntityKind, map: Resolution },
    Targets(Vec<DrugTarget>),
    Pathways(Vec<GenePathway>),
    GeneDiseases(Vec<GeneDisease>),
    DiseaseGenes(Vec<DiseaseGene>),
    Interactors(Vec<GeneInteractor>),
    Mechanism(MechanismExpansion),
    GeneContext(Vec<GeneContextEntry>),
    AdverseEvents(Vec<DrugAdverseEvent>),
    Profile(Option<DrugProfile>),
    LabelSections(Vec<DrugLabelSection>),
    FaersSignals(Vec<FaersSignal>),
    ClaimDetail(Option<ClaimDetail>),
    EntityClaims(Vec<ClaimDetail>),
    Paths(Vec<MechanisticPath>),
    SubgraphBuilt(Subgraph),
    EdgesScored(Subgraph),
}

// ── Declared parameter types ─────────────────────────────────────────────────

fn default_limit_50() -> i64 { 50 }
fn default_limit_100() -> i64 { 100 }
fn default_top_k_200() -> i64 { 200 }
fn default_max_paths() -> i64 { 10 }
fn default_top_k_5() -> i64 { 5 }
fn default_one() -> i64 { 1 }
fn default_interaction_score() -> f64 { 0.4 }
fn default_disease_score() -> f64 { 0.3 }

#[derive(Deserialize)]
struct NamesArgs {
    names: Vec<String>,
}

#[derive(Deserialize)]
struct SymbolsArgs {
    symbols: Vec<String>,
}

#[derive(Deserialize)]
struct TermsArgs {
    terms: Vec<String>,
}

#[derive(Deserialize)]
struct DrugKeyArgs {
    drug_key: i64,
}

#[derive(Deserialize)]
struct GeneKeyArgs {
    gene_key: i64,
}

#[derive(Deserialize)]
struct GeneDiseasesArgs {
    gene_key: i64,
    #[serde(default)]
    min_score: f64,
}

#[derive(Deserialize)]
struct DiseaseGenesArgs {
    disease_key: i64,
    #[serde(default)]
    sources: Option<Vec<String>>,
    #[serde(default)]
    min_score: f64,
    #[serde(default = "default_limit_50")]
    limit: i64,
}

#[derive(Deserialize)]
struct GeneInteractorsArgs {
    gene_key: i64,
    #[serde(default = "default_interaction_score")]
    min_score: f64,
    #[serde(default = "default_limit_50")]
    limit: i64,
}

#[derive(Deserialize)]
struct GeneContextArgs {
    gene_keys: Vec<i64>,
    #[serde(default = "default_disease_score")]
    min_disease_score: f64,
}

#[derive(Deserialize)]
struct DrugAesArgs {
    drug_key: i64,
    #[serde(default)]
    min_frequency: Option<f64>,
    #[serde(default = "default_limit_100")]
    limit: i64,
}

#[derive(Deserialize)]
struct LabelArgs {
    drug_key: i64,
    #[serde(default)]
    sections: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct FaersArgs {
    drug_key: i64,
    #[serde(default = "default_top_k_200")]
    top_k: i64,
    #[serde(default = "default_one")]
    min_count: i64,
    #[serde(default)]
    min_prr: Option<f64>,
}

#[derive(Deserialize)]
struct ClaimArgs {
    claim_key: i64,
}

#[derive(Deserialize)]
struct EntityClaimsArgs {
    #[serde(alias = "entity_type")]
    entity_kind: String,
    entity_key: i64,
    #[serde(default)]
    claim_types: Option<Vec<String>>,
    #[serde(default = "default_limit_100")]
    limit: i64,
}

#[derive(Deserialize)]
struct PathsArgs {
    drug_key: i64,
    #[serde(default)]
    ae_key: Option<i64>,
    #[serde(default = "default_max_paths")]
    max_paths: i64,
}

#[derive(Deserialize)]
struct ExplainArgs {
    drug_key: i64,
    #[serde(default)]
    ae_key: Option<i64>,
    #[serde(default)]
    condition_keys: Option<Vec<i64>>,
    #[serde(default = "default_top_k_5")]
    top_k: i64,
}

#[derive(Deserialize)]
struct ScoreEdgesArgs {
    #[serde(default)]
    weights: Option<HashMap<String, f64>>,
}

fn coerce<T: DeserializeOwned>(args: &Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ToolError::InvalidArgs(e.to_string()))
}

// ── Key substitution ─────────────────────────────────────────────────────────

fn kind_for_field(field: &str) -> Option<EntityKind> {
    match field {
        "drug_key" | "drug_keys" => Some(EntityKind::Drug),
        "gene_key" | "gene_keys" => Some(EntityKind::Gene),
        "disease_key" | "condition_keys" => Some(EntityKind::Disease),
        "ae_key" => Some(EntityKind::AdverseEvent),
        _ => None,
    }
}

fn lookup_key(pack: &EvidencePack, kind: EntityKind, name: &str) -> Option<i64> {
    match kind {
        EntityKind::Drug => pack.drug_key(name),
        EntityKind::Gene => pack.gene_key(name),
        EntityKind::Disease => pack.disease_key(name),
        EntityKind::AdverseEvent => pack.ae_key(name),
        EntityKind::Pathway => None,
    }
}

/// Replace entity names in key positions with their resolved keys.
fn substitute_args(
    args: &Map<String, Value>,
    pack: &EvidencePack,
) -> Result<Map<String, Value>, String> {
    let mut out = Map::new();
    for (field, value) in args {
        let substituted = match (kind_for_field(field), value) {
            (Some(kind), Value::String(name)) => {
                let key = lookup_key(pack, kind, name).ok_or_else(|| {
                    format!("unresolved {kind} name {name:?} in argument {field}")
                })?;
                Value::from(key)
            }
            (Some(kind), Value::Array(items)) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(name) => {
                            let key = lookup_key(pack, kind, name).ok_or_else(|| {
                                format!("unresolved {kind} name {name:?} in argument {field}")
                            })?;
                            keys.push(Value::from(key));
                        }
                        other => keys.push(other.clone()),
                    }
                }
                Value::Array(keys)
            }
            _ => value.clone(),
        };
        out.insert(field.clone(), substituted);
    }
    Ok(out)
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

pub struct ToolDispatcher<'a> {
    store: &'a dyn GraphStore,
    policy: &'a ScoringPolicy,
    cap: usize,
    timeout: Duration,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(
        store: &'a dyn GraphStore,
        policy: &'a ScoringPolicy,
        cap: usize,
        timeout: Duration,
    ) -> Self {
        Self { store, policy, cap, timeout }
    }

    /// Execute a plan's calls sequentially, in plan order. A failed call
    /// produces a synthetic error result and the plan continues; the
    /// observer needs to see the failure.
    pub async fn dispatch(
        &self,
        plan: &ToolPlan,
        pack: &mut EvidencePack,
        cancel: Option<&CancelToken>,
    ) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(plan.calls.len());
        for call in &plan.calls {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    break;
                }
            }
            results.push(self.dispatch_one(call, pack).await);
        }
        results
    }

    async fn dispatch_one(&self, call: &ToolCallRequest, pack: &mut EvidencePack) -> ToolResult {
        let raw_args = Value::Object(call.args.clone());

        // 1. Allow-list membership.
        let Some(tool) = ToolName::parse(&call.tool) else {
            tracing::warn!(tool = %call.tool, "rejected call to unknown tool");
            pack.record_call(&call.tool, raw_args.clone(), false, "unknown tool");
            pack.log_error(&format!("dispatch.unknown_tool: {}", call.tool));
            return error_result(
                &call.tool,
                raw_args,
                "dispatch.unknown_tool",
                &format!("unknown tool: {}", call.tool),
            );
        };

        // 2. Key substitution from the resolved-entity maps.
        let args = match substitute_args(&call.args, pack) {
            Ok(args) => args,
            Err(detail) => {
                pack.record_call(tool.as_str(), raw_args.clone(), false, "invalid args");
                pack.log_error(&format!("tool.invalid_args: {detail}"));
                return error_result(tool.as_str(), raw_args, "tool.invalid_args", &detail);
            }
        };
        let args_value = Value::Object(args.clone());

        // 3. Timed execution. Argument coercion happens inside `execute`,
        //    before any store access.
        let outcome = match tokio::time::timeout(self.timeout, self.execute(tool, &args, pack))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(output) => {
                // 4. Accumulation, then 5. shaping.
                accumulate(pack, &output);
                let (shaped, truncated, original_count) = self.shape(&output);
                let summary = summarize(&output);
                tracing::debug!(tool = tool.as_str(), %summary, truncated, "tool executed");
                pack.record_call(tool.as_str(), args_value.clone(), true, &summary);
                ToolResult {
                    tool: tool.as_str().to_string(),
                    args: args_value,
                    ok: true,
                    error: None,
                    error_category: None,
                    shaped,
                    summary,
                    truncated,
                    original_count,
                }
            }
            Err(err) => {
                let category = err.category();
                tracing::warn!(tool = tool.as_str(), category, error = %err, "tool failed");
                pack.record_call(tool.as_str(), args_value.clone(), false, category);
                pack.log_error(&format!("{category}: {err}"));
                error_result(tool.as_str(), args_value, category, &err.to_string())
            }
        }
    }

    async fn execute(
        &self,
        tool: ToolName,
        args: &Map<String, Value>,
        pack: &EvidencePack,
    ) -> Result<ToolOutput, ToolError> {
        match tool {
            ToolName::ResolveDrugs => {
                let parsed: NamesArgs = coerce(args)?;
                self.resolve_cached(EntityKind::Drug, &parsed.names, pack).await
            }
            ToolName::ResolveGenes => {
                let parsed: SymbolsArgs = coerce(args)?;
                self.resolve_cached(EntityKind::Gene, &parsed.symbols, pack).await
            }
            ToolName::ResolveDiseases => {
                let parsed: TermsArgs = coerce(args)?;
                self.resolve_cached(EntityKind::Disease, &parsed.terms, pack).await
            }
            ToolName::ResolveAdverseEvents => {
                let parsed: TermsArgs = coerce(args)?;
                self.resolve_cached(EntityKind::AdverseEvent, &parsed.terms, pack).await
            }
            ToolName::GetDrugTargets => {
                let parsed: DrugKeyArgs = coerce(args)?;
                Ok(ToolOutput::Targets(get_drug_targets(self.store, parsed.drug_key).await?))
            }
            ToolName::GetGenePathways => {
                let parsed: GeneKeyArgs = coerce(args)?;
                Ok(ToolOutput::Pathways(get_gene_pathways(self.store, parsed.gene_key).await?))
            }
            ToolName::GetGeneDiseases => {
                let parsed: GeneDiseasesArgs = coerce(args)?;
                Ok(ToolOutput::GeneDiseases(
                    get_gene_diseases(self.store, parsed.gene_key, parsed.min_score).await?,
                ))
            }
            ToolName::GetDiseaseGenes => {
                let parsed: DiseaseGenesArgs = coerce(args)?;
                Ok(ToolOutput::DiseaseGenes(
                    get_disease_genes(
                        self.store,
                        parsed.disease_key,
                        parsed.sources.as_deref(),
                        parsed.min_score,
                        parsed.limit,
                    )
                    .await?,
                ))
            }
            ToolName::GetGeneInteractors => {
                let parsed: GeneInteractorsArgs = coerce(args)?;
                Ok(ToolOutput::Interactors(
                    get_gene_interactors(self.store, parsed.gene_key, parsed.min_score, parsed.limit)
                        .await?,
                ))
            }
            ToolName::ExpandMechanism => {
                let parsed: DrugKeyArgs = coerce(args)?;
                Ok(ToolOutput::Mechanism(expand_mechanism(self.store, parsed.drug_key).await?))
            }
            ToolName::ExpandGeneContext => {
                let parsed: GeneContextArgs = coerce(args)?;
                Ok(ToolOutput::GeneContext(
                    expand_gene_context(self.store, &parsed.gene_keys, parsed.min_disease_score)
                        .await?,
                ))
            }
            ToolName::GetDrugAdverseEvents => {
                let parsed: DrugAesArgs = coerce(args)?;
                Ok(ToolOutput::AdverseEvents(
                    get_drug_adverse_events(
                        self.store,
                        parsed.drug_key,
                        parsed.min_frequency,
                        parsed.limit,
                    )
                    .await?,
                ))
            }
            ToolName::GetDrugProfile => {
                let parsed: DrugKeyArgs = coerce(args)?;
                Ok(ToolOutput::Profile(get_drug_profile(self.store, parsed.drug_key).await?))
            }
            ToolName::GetDrugLabelSections => {
                let parsed: LabelArgs = coerce(args)?;
                Ok(ToolOutput::LabelSections(
                    get_drug_label_sections(self.store, parsed.drug_key, parsed.sections.as_deref())
                        .await?,
                ))
            }
            ToolName::GetDrugFaersSignals => {
                let parsed: FaersArgs = coerce(args)?;
                Ok(ToolOutput::FaersSignals(
                    get_drug_faers_signals(
                        self.store,
                        parsed.drug_key,
                        parsed.top_k,
                        parsed.min_count,
                        parsed.min_prr,
                    )
                    .await?,
                ))
            }
            ToolName::GetClaimEvidence => {
                let parsed: ClaimArgs = coerce(args)?;
                Ok(ToolOutput::ClaimDetail(
                    get_claim_evidence(self.store, parsed.claim_key).await?,
                ))
            }
            ToolName::GetEntityClaims => {
                let parsed: EntityClaimsArgs = coerce(args)?;
                Ok(ToolOutput::EntityClaims(
                    get_entity_claims(
                        self.store,
                        &parsed.entity_kind,
                        parsed.entity_key,
                        parsed.claim_types.as_deref(),
                        parsed.limit,
                    )
                    .await?,
                ))
            }
            ToolName::FindDrugToAePaths => {
                let parsed: PathsArgs = coerce(args)?;
                Ok(ToolOutput::Paths(
                    find_drug_to_ae_paths(
                        self.store,
                        self.policy,
                        parsed.drug_key,
                        parsed.ae_key,
                        parsed.max_paths,
                    )
                    .await?,
                ))
            }
            ToolName::ExplainPaths => {
                let parsed: ExplainArgs = coerce(args)?;
                Ok(ToolOutput::Paths(
                    explain_paths(
                        self.store,
                        self.policy,
                        parsed.drug_key,
                        parsed.ae_key,
                        parsed.condition_keys.as_deref(),
                        parsed.top_k,
                    )
                    .await?,
                ))
            }
            ToolName::BuildSubgraph => {
                let spec: SubgraphSpec = coerce(args)?;
                Ok(ToolOutput::SubgraphBuilt(build_subgraph(self.store, &spec).await?))
            }
            ToolName::ScoreEdges => {
                let parsed: ScoreEdgesArgs = coerce(args)?;
                if pack.subgraph.is_empty() {
                    return Err(ToolError::InvalidArgs(
                        "no subgraph accumulated; call build_subgraph first".to_string(),
                    ));
                }
                let mut scored = pack.subgraph.clone();
                score_edges(&mut scored, parsed.weights.as_ref());
                Ok(ToolOutput::EdgesScored(scored))
            }
        }
    }

    /// Resolution with the idempotence guarantee: names already resolved in
    /// this query are answered from the pack and never reach the store.
    async fn resolve_cached(
        &self,
        kind: EntityKind,
        names: &[String],
        pack: &EvidencePack,
    ) -> Result<ToolOutput, ToolError> {
        let mut map = Resolution::new();
        let mut unresolved = Vec::new();
        for name in names {
            match lookup_key(pack, kind, name) {
                Some(key) => {
                    map.insert(
                        name.clone(),
                        Some(ResolvedEntity {
                            key,
                            name: name.clone(),
                            source: "cached".to_string(),
                            confidence: 1.0,
                        }),
                    );
                }
                None => unresolved.push(name.clone()),
            }
        }

        if !unresolved.is_empty() {
            let fresh = match kind {
                EntityKind::Drug => resolve_drugs(self.store, &unresolved).await?,
                EntityKind::Gene => resolve_genes(self.store, &unresolved).await?,
                EntityKind::Disease => resolve_diseases(self.store, &unresolved).await?,
                EntityKind::AdverseEvent => {
                    resolve_adverse_events(self.store, &unresolved).await?
                }
                EntityKind::Pathway => Resolution::new(),
            };
            map.extend(fresh);
        }

        Ok(ToolOutput::Resolution { kind, map })
    }

    // ── Shaping ─────────────────────────────────────────────────────────────

    fn shape(&self, output: &ToolOutput) -> (Value, bool, Option<usize>) {
        match output {
            ToolOutput::Resolution { map, .. } => {
                let mut shaped = Map::new();
                for (name, entity) in map {
                    let value = match entity {
                        Some(e) => json!({
                            "name": e.name,
                            "key": e.key,
                            "source": e.source,
                            "confidence": e.confidence,
                        }),
                        None => Value::Null,
                    };
                    shaped.insert(name.clone(), value);
                }
                (Value::Object(shaped), false, None)
            }
            ToolOutput::Targets(items) => self.shape_list(items),
            ToolOutput::Pathways(items) => self.shape_list(items),
            ToolOutput::GeneDiseases(items) => self.shape_list(items),
            ToolOutput::DiseaseGenes(items) => self.shape_list(items),
            ToolOutput::Interactors(items) => self.shape_list(items),
            ToolOutput::Mechanism(expansion) => {
                let truncated = expansion.targets.len() > self.cap
                    || expansion.pathways.len() > self.cap;
                let shaped = json!({
                    "targets": to_values(&expansion.targets, self.cap),
                    "targets_total": expansion.targets.len(),
                    "pathways": to_values(&expansion.pathways, self.cap),
                    "pathways_total": expansion.pathways.len(),
                    "truncated": truncated,
                });
                (shaped, truncated, None)
            }
            ToolOutput::GeneContext(entries) => {
                let total = entries.len();
                let truncated = total > self.cap;
                let shown: Vec<Value> = entries
                    .iter()
                    .take(self.cap)
                    .map(|entry| {
                        json!({
                            "gene_key": entry.gene_key,
                            "pathways": to_values(&entry.pathways, self.cap),
                            "pathways_total": entry.pathways.len(),
                            "diseases": to_values(&entry.diseases, self.cap),
                            "diseases_total": entry.diseases.len(),
                        })
                    })
                    .collect();
                (
                    json!({"items": shown, "total": total, "truncated": truncated}),
                    truncated,
                    Some(total),
                )
            }
            ToolOutput::AdverseEvents(items) => self.shape_list(items),
            ToolOutput::Profile(None) => (Value::Null, false, None),
            ToolOutput::Profile(Some(profile)) => {
                let shaped = json!({
                    "drug": serde_json::to_value(&profile.drug).unwrap_or(Value::Null),
                    "targets": to_values(&profile.targets, self.cap),
                    "adverse_events": to_values(&profile.adverse_events, self.cap),
                });
                (shaped, false, None)
            }
            ToolOutput::LabelSections(sections) => {
                let total = sections.len();
                let truncated = total > self.cap;
                let shown: Vec<Value> = sections
                    .iter()
                    .take(self.cap)
                    .map(|s| {
                        json!({
                            "section_name": s.section_name,
                            "content": clip(&s.content, SHAPED_LABEL_CHARS),
                            "effective_date": s.effective_date,
                            "brand_name": s.brand_name,
                            "claim_key": s.claim_key,
                        })
                    })
                    .collect();
                (
                    json!({"items": shown, "total": total, "truncated": truncated}),
                    truncated,
                    Some(total),
                )
            }
            ToolOutput::FaersSignals(items) => self.shape_list(items),
            ToolOutput::ClaimDetail(None) => (Value::Null, false, None),
            ToolOutput::ClaimDetail(Some(detail)) => (shape_claim(detail), false, None),
            ToolOutput::EntityClaims(details) => {
                let total = details.len();
                let truncated = total > self.cap;
                let shown: Vec<Value> =
                    details.iter().take(self.cap).map(shape_claim).collect();
                (
                    json!({"items": shown, "total": total, "truncated": truncated}),
                    truncated,
                    Some(total),
                )
            }
            ToolOutput::Paths(paths) => {
                let total = paths.len();
                let truncated = total > self.cap;
                let shown: Vec<Value> = paths
                    .iter()
                    .take(self.cap)
                    .map(|p| {
                        json!({
                            "path": p.steps.iter().map(|s| json!({
                                "kind": s.node_kind.as_str(),
                                "label": s.node_label,
                                "key": s.node_key,
                                "edge": s.edge_kind,
                            })).collect::<Vec<Value>>(),
                            "score": p.score.clamp(0.0, 1.0),
                            "evidence_count": p.evidence_count,
                            "claim_keys": p.claim_keys(),
                        })
                    })
                    .collect();
                (
                    json!({"items": shown, "total": total, "truncated": truncated}),
                    truncated,
                    Some(total),
                )
            }
            ToolOutput::SubgraphBuilt(sub) | ToolOutput::EdgesScored(sub) => {
                let truncated = sub.nodes.len() > self.cap || sub.edges.len() > self.cap;
                let nodes: Vec<Value> = sub
                    .nodes
                    .iter()
                    .take(self.cap)
                    .map(|n| json!({"label": n.label, "id": n.id, "kind": n.kind.as_str()}))
                    .collect();
                let edges: Vec<Value> = sub
                    .edges
                    .iter()
                    .take(self.cap)
                    .map(|e| {
                        json!({
                            "source": e.source,
                            "target": e.target,
                            "kind": e.kind,
                            "weight": e.weight,
                        })
                    })
                    .collect();
                let shaped = json!({
                    "node_count": sub.nodes.len(),
                    "edge_count": sub.edges.len(),
                    "nodes": nodes,
                    "edges": edges,
                    "truncated": truncated,
                });
                (shaped, truncated, None)
            }
        }
    }

    fn shape_list<T: serde::Serialize>(&self, items: &[T]) -> (Value, bool, Option<usize>) {
        let total = items.len();
        let truncated = total > self.cap;
        (
            json!({
                "items": to_values(items, self.cap),
                "total": total,
                "truncated": truncated,
            }),
            truncated,
            Some(total),
        )
    }
}

fn to_values<T: serde::Serialize>(items: &[T], cap: usize) -> Vec<Value> {
    items
        .iter()
        .take(cap)
        .map(|item| serde_json::to_value(item).unwrap_or(Value::Null))
        .collect()
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut cut = max_chars;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &text[..cut])
}

/// Shaped claim view: evidence payload bodies are dropped, only a flag
/// remains; every evidence id stays visible.
fn shape_claim(detail: &ClaimDetail) -> Value {
    json!({
        "claim_type": detail.claim_type,
        "claim_key": detail.claim_key,
        "strength_score": detail.strength_score,
        "polarity": detail.polarity,
        "dataset_key": detail.dataset_key,
        "evidence": detail.evidence.iter().map(|e| json!({
            "evidence_key": e.evidence_key,
            "evidence_type": e.evidence_type,
            "source_record_id": e.source_record_id,
            "source_url": e.source_url,
            "support_strength": e.support_strength,
            "dataset_key": e.dataset_key,
            "has_payload": e.payload.is_some(),
        })).collect::<Vec<Value>>(),
    })
}

fn error_result(tool: &str, args: Value, category: &str, detail: &str) -> ToolResult {
    ToolResult {
        tool: tool.to_string(),
        args,
        ok: false,
        error: Some(detail.to_string()),
        error_category: Some(category.to_string()),
        shaped: Value::Null,
        summary: category.to_string(),
        truncated: false,
        original_count: None,
    }
}

// ── Accumulation ─────────────────────────────────────────────────────────────

fn accumulate(pack: &mut EvidencePack, output: &ToolOutput) {
    match output {
        ToolOutput::Resolution { kind, map } => {
            for (name, entity) in map {
                if let Some(entity) = entity {
                    match kind {
                        EntityKind::Drug => pack.add_drug(name, entity.key),
                        EntityKind::Gene => pack.add_gene(name, entity.key),
                        EntityKind::Disease => pack.add_disease(name, entity.key),
                        EntityKind::AdverseEvent => pack.add_ae(name, entity.key),
                        EntityKind::Pathway => {}
                    }
                }
            }
        }
        ToolOutput::Targets(items) => {
            for t in items {
                pack.add_gene(&t.gene_symbol, t.gene_key);
                pack.note_claim(t.claim_key, t.dataset_key.as_deref());
            }
        }
        ToolOutput::Pathways(items) => {
            for p in items {
                pack.note_claim(p.claim_key, p.dataset_key.as_deref());
            }
        }
        ToolOutput::GeneDiseases(items) => {
            for d in items {
                pack.add_disease(&d.disease_label, d.disease_key);
                pack.note_claim(d.claim_key, d.dataset_key.as_deref());
            }
        }
        ToolOutput::DiseaseGenes(items) => {
            for g in items {
                pack.add_gene(&g.gene_symbol, g.gene_key);
                pack.note_claim(g.claim_key, g.dataset_key.as_deref());
            }
        }
        ToolOutput::Interactors(items) => {
            for i in items {
                pack.add_gene(&i.partner_symbol, i.partner_key);
                pack.note_claim(i.claim_key, i.dataset_key.as_deref());
            }
        }
        ToolOutput::Mechanism(expansion) => {
            for t in &expansion.targets {
                pack.add_gene(&t.gene_symbol, t.gene_key);
                pack.note_claim(t.claim_key, t.dataset_key.as_deref());
            }
            for p in &expansion.pathways {
                pack.note_claim(p.claim_key, p.dataset_key.as_deref());
            }
        }
        ToolOutput::GeneContext(entries) => {
            for entry in entries {
                for p in &entry.pathways {
                    pack.note_claim(p.claim_key, p.dataset_key.as_deref());
                }
                for d in &entry.diseases {
                    pack.add_disease(&d.disease_label, d.disease_key);
                    pack.note_claim(d.claim_key, d.dataset_key.as_deref());
                }
            }
        }
        ToolOutput::AdverseEvents(items) => {
            for ae in items {
                pack.add_ae(&ae.ae_label, ae.ae_key);
                if let Some(freq) = ae.frequency {
                    pack.ae_frequencies.insert(ae.ae_key, freq);
                }
                pack.note_claim(ae.claim_key, ae.dataset_key.as_deref());
            }
        }
        ToolOutput::Profile(None) => {}
        ToolOutput::Profile(Some(profile)) => {
            pack.add_drug(&profile.drug.preferred_name, profile.drug.drug_key);
            for t in &profile.targets {
                pack.add_gene(&t.gene_symbol, t.gene_key);
                pack.note_claim(t.claim_key, t.dataset_key.as_deref());
            }
            for ae in &profile.adverse_events {
                pack.add_ae(&ae.ae_label, ae.ae_key);
                pack.note_claim(ae.claim_key, ae.dataset_key.as_deref());
            }
        }
        ToolOutput::LabelSections(sections) => {
            for section in sections {
                pack.note_claim(section.claim_key, Some("openfda"));
            }
            pack.label_sections.extend(sections.iter().cloned());
        }
        ToolOutput::FaersSignals(signals) => {
            for signal in signals {
                pack.add_ae(&signal.ae_label, signal.ae_key);
                pack.note_claim(signal.claim_key, Some("faers"));
            }
            pack.faers_signals.extend(signals.iter().cloned());
        }
        ToolOutput::ClaimDetail(None) => {}
        ToolOutput::ClaimDetail(Some(detail)) => {
            note_claim_detail(pack, detail);
        }
        ToolOutput::EntityClaims(details) => {
            for detail in details {
                note_claim_detail(pack, detail);
            }
        }
        ToolOutput::Paths(paths) => {
            for path in paths {
                pack.add_path(path.clone());
            }
        }
        ToolOutput::SubgraphBuilt(sub) => {
            pack.merge_subgraph(sub.clone());
        }
        ToolOutput::EdgesScored(sub) => {
            pack.subgraph = sub.clone();
        }
    }
}

fn note_claim_detail(pack: &mut EvidencePack, detail: &ClaimDetail) {
    pack.note_claim(detail.claim_key, detail.dataset_key.as_deref());
    for evidence in &detail.evidence {
        pack.note_evidence(evidence.evidence_key);
        if let Some(dataset) = &evidence.dataset_key {
            pack.dataset_ids.insert(dataset.clone());
        }
    }
}

fn summarize(output: &ToolOutput) -> String {
    match output {
        ToolOutput::Resolution { map, .. } => {
            let hits = map.values().filter(|v| v.is_some()).count();
            format!("resolved {hits}/{} names", map.len())
        }
        ToolOutput::Targets(v) => format!("{} targets", v.len()),
        ToolOutput::Pathways(v) => format!("{} pathways", v.len()),
        ToolOutput::GeneDiseases(v) => format!("{} disease associations", v.len()),
        ToolOutput::DiseaseGenes(v) => format!("{} associated genes", v.len()),
        ToolOutput::Interactors(v) => format!("{} interaction partners", v.len()),
        ToolOutput::Mechanism(m) => {
            format!("{} targets, {} pathways", m.targets.len(), m.pathways.len())
        }
        ToolOutput::GeneContext(v) => format!("context for {} genes", v.len()),
        ToolOutput::AdverseEvents(v) => format!("{} adverse events", v.len()),
        ToolOutput::Profile(Some(p)) => format!("profile for {}", p.drug.preferred_name),
        ToolOutput::Profile(None) => "drug not found".to_string(),
        ToolOutput::LabelSections(v) => format!("{} label sections", v.len()),
        ToolOutput::FaersSignals(v) => format!("{} FAERS signals", v.len()),
        ToolOutput::ClaimDetail(Some(d)) => {
            format!("claim {} with {} evidence records", d.claim_key, d.evidence.len())
        }
        ToolOutput::ClaimDetail(None) => "claim not found".to_string(),
        ToolOutput::EntityClaims(v) => format!("{} claims", v.len()),
        ToolOutput::Paths(v) => format!("{} paths", v.len()),
        ToolOutput::SubgraphBuilt(s) => {
            format!("{} nodes, {} edges", s.nodes.len(), s.edges.len())
        }
        ToolOutput::EdgesScored(s) => format!("re-weighted {} edges", s.edges.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_graph::MemoryGraph;

    fn call(tool: &str, args: Value) -> ToolCallRequest {
        let Value::Object(map) = args else { panic!("args must be an object") };
        ToolCallRequest { tool: tool.to_string(), args: map, reason: None }
    }

    fn plan(calls: Vec<ToolCallRequest>) -> ToolPlan {
        ToolPlan { thought: "test".to_string(), calls, stop_conditions: Default::default() }
    }

    fn seeded() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph.add_drug(14042, "metformin");
        graph.add_gene(10, "PRKAB1");
        graph.add_adverse_event(30, "nausea");
        graph.add_target_claim(14042, 10, Some(0.8), "drugcentral");
        graph.add_ae_claim(14042, 30, Some(0.12), "sider");
        graph
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected_without_store_access() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(&plan(vec![call("drop_all_tables", json!({}))]), &mut pack, None)
            .await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].ok);
        assert_eq!(results[0].error_category.as_deref(), Some("dispatch.unknown_tool"));
        assert_eq!(graph.queries_issued(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort_the_plan() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(
                &plan(vec![
                    call("bogus_tool", json!({})),
                    call("resolve_drugs", json!({"names": ["metformin"]})),
                ]),
                &mut pack,
                None,
            )
            .await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].ok);
        assert!(results[1].ok);
        assert_eq!(pack.drug_key("metformin"), Some(14042));
    }

    #[tokio::test]
    async fn test_wrong_argument_type_is_rejected_without_store_access() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(
                &plan(vec![call("get_drug_targets", json!({"drug_key": [1, 2]}))]),
                &mut pack,
                None,
            )
            .await;

        assert!(!results[0].ok);
        assert_eq!(results[0].error_category.as_deref(), Some("tool.invalid_args"));
        assert_eq!(graph.queries_issued(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_argument_is_rejected_without_store_access() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(
                &plan(vec![call(
                    "get_gene_diseases",
                    json!({"gene_key": 10, "min_score": 3.0}),
                )]),
                &mut pack,
                None,
            )
            .await;

        assert!(!results[0].ok);
        assert_eq!(results[0].error_category.as_deref(), Some("tool.invalid_args"));
        assert_eq!(graph.queries_issued(), 0);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent_across_iterations() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let first = dispatcher
            .dispatch(
                &plan(vec![call("resolve_drugs", json!({"names": ["metformin"]}))]),
                &mut pack,
                None,
            )
            .await;
        assert!(first[0].ok);
        let queries_after_first = graph.queries_issued();
        assert!(queries_after_first > 0);

        let second = dispatcher
            .dispatch(
                &plan(vec![call("resolve_drugs", json!({"names": ["metformin"]}))]),
                &mut pack,
                None,
            )
            .await;
        assert!(second[0].ok);
        assert_eq!(graph.queries_issued(), queries_after_first);
        assert_eq!(second[0].shaped["metformin"]["key"], json!(14042));
    }

    #[tokio::test]
    async fn test_string_key_arguments_are_substituted() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");
        pack.add_drug("metformin", 14042);

        let results = dispatcher
            .dispatch(
                &plan(vec![call("get_drug_targets", json!({"drug_key": "metformin"}))]),
                &mut pack,
                None,
            )
            .await;

        assert!(results[0].ok);
        assert_eq!(results[0].args["drug_key"], json!(14042));
        assert_eq!(results[0].summary, "1 targets");
    }

    #[tokio::test]
    async fn test_unresolved_name_in_key_position_fails_fast() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(
                &plan(vec![call("get_drug_targets", json!({"drug_key": "warfarin"}))]),
                &mut pack,
                None,
            )
            .await;

        assert!(!results[0].ok);
        assert_eq!(results[0].error_category.as_deref(), Some("tool.invalid_args"));
        assert_eq!(graph.queries_issued(), 0);
    }

    #[tokio::test]
    async fn test_list_results_truncate_at_cap_with_marker() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "polypharmic");
        for i in 0..45 {
            let ae_key = 1000 + i;
            graph.add_adverse_event(ae_key, &format!("ae {i}"));
            graph.add_ae_claim(1, ae_key, Some(0.5 - i as f64 * 0.01), "sider");
        }
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(
                &plan(vec![call(
                    "get_drug_adverse_events",
                    json!({"drug_key": 1, "limit": 100}),
                )]),
                &mut pack,
                None,
            )
            .await;

        let result = &results[0];
        assert!(result.ok);
        assert!(result.truncated);
        assert_eq!(result.original_count, Some(45));
        assert_eq!(result.shaped["items"].as_array().unwrap().len(), 30);
        assert_eq!(result.shaped["truncated"], json!(true));
        // The full set still reached the accumulator.
        assert_eq!(pack.ae_keys.len(), 45);
    }

    #[tokio::test]
    async fn test_shaped_adverse_event_puts_label_before_key() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(
                &plan(vec![call("get_drug_adverse_events", json!({"drug_key": 14042}))]),
                &mut pack,
                None,
            )
            .await;

        let item = &results[0].shaped["items"][0];
        let keys: Vec<&String> = item.as_object().unwrap().keys().collect();
        let label_pos = keys.iter().position(|k| *k == "ae_label").unwrap();
        let key_pos = keys.iter().position(|k| *k == "ae_key").unwrap();
        assert!(label_pos < key_pos);
    }

    #[tokio::test]
    async fn test_score_edges_requires_a_built_subgraph() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(&plan(vec![call("score_edges", json!({}))]), &mut pack, None)
            .await;
        assert!(!results[0].ok);
        assert_eq!(results[0].error_category.as_deref(), Some("tool.invalid_args"));

        let results = dispatcher
            .dispatch(
                &plan(vec![
                    call("build_subgraph", json!({"drug_keys": [14042]})),
                    call("score_edges", json!({})),
                ]),
                &mut pack,
                None,
            )
            .await;
        assert!(results[0].ok);
        assert!(results[1].ok);
        assert!(!pack.subgraph.is_empty());
    }

    #[tokio::test]
    async fn test_evidence_drilldown_accumulates_evidence_ids() {
        let graph = seeded();
        let policy = ScoringPolicy::default();
        let dispatcher = ToolDispatcher::new(&graph, &policy, 30, Duration::from_secs(30));
        let mut pack = EvidencePack::new("q");

        let results = dispatcher
            .dispatch(
                &plan(vec![call(
                    "get_entity_claims",
                    json!({"entity_kind": "Drug", "entity_key": 14042}),
                )]),
                &mut pack,
                None,
            )
            .await;

        assert!(results[0].ok);
        assert!(!pack.evidence_ids.is_empty());
        assert!(pack.dataset_ids.contains("drugcentral"));
        // Shaped claims drop payload bodies but keep evidence ids.
        let first_claim = &results[0].shaped["items"][0];
        assert!(first_claim["evidence"][0]["evidence_key"].is_i64());
        assert!(first_claim["evidence"][0].get("payload").is_none());
    }
}
