//! Subgraph assembly for visualization.
//!
//! Builds a bounded subgraph centered on a set of drugs. Per-category caps
//! keep the result O(drugs x cap); every relationship edge carries its claim
//! key so provenance survives into the evidence summary.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use vigil_graph::{EntityKind, GraphStore};

use crate::adverse_events::get_drug_adverse_events;
use crate::error::{check_positive, check_unit_range, ToolError};
use crate::mechanism::{get_drug_targets, get_gene_diseases, get_gene_pathways};

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: EntityKind,
    pub label: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: String,
    pub weight: f64,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Subgraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Claim keys stamped on the edges, for provenance accumulation.
    pub fn claim_keys(&self) -> Vec<i64> {
        self.edges
            .iter()
            .filter_map(|e| e.properties.get("claim_key").and_then(Value::as_i64))
            .collect()
    }

    /// Merge another subgraph in, deduplicating nodes by id and edges by
    /// (source, target, kind).
    pub fn merge(&mut self, other: Subgraph) {
        let mut node_ids: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let mut edge_keys: HashSet<(String, String, String)> = self
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone(), e.kind.clone()))
            .collect();

        for node in other.nodes {
            if node_ids.insert(node.id.clone()) {
                self.nodes.push(node);
            }
        }
        for edge in other.edges {
            if edge_keys.insert((edge.source.clone(), edge.target.clone(), edge.kind.clone())) {
                self.edges.push(edge);
            }
        }
    }

    /// Cytoscape.js `elements` form.
    pub fn to_cytoscape(&self) -> Value {
        let mut elements = Vec::new();
        for n in &self.nodes {
            let mut data = Map::new();
            data.insert("id".to_string(), json!(n.id));
            data.insert("label".to_string(), json!(n.label));
            data.insert("kind".to_string(), json!(n.kind.as_str()));
            for (k, v) in &n.properties {
                data.insert(k.clone(), v.clone());
            }
            elements.push(json!({"data": Value::Object(data), "group": "nodes"}));
        }
        for e in &self.edges {
            let mut data = Map::new();
            data.insert("source".to_string(), json!(e.source));
            data.insert("target".to_string(), json!(e.target));
            data.insert("kind".to_string(), json!(e.kind));
            data.insert("weight".to_string(), json!(e.weight));
            for (k, v) in &e.properties {
                data.insert(k.clone(), v.clone());
            }
            elements.push(json!({"data": Value::Object(data), "group": "edges"}));
        }
        json!({ "elements": elements })
    }
}

/// Caller-selected edge categories and caps for `build_subgraph`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphSpec {
    pub drug_keys: Vec<i64>,
    #[serde(default = "yes")]
    pub include_targets: bool,
    #[serde(default = "yes")]
    pub include_pathways: bool,
    #[serde(default = "yes")]
    pub include_diseases: bool,
    #[serde(default = "yes")]
    pub include_aes: bool,
    #[serde(default = "default_per_gene")]
    pub max_pathways_per_gene: i64,
    #[serde(default = "default_per_gene")]
    pub max_diseases_per_gene: i64,
    #[serde(default = "default_aes_per_drug")]
    pub max_aes_per_drug: i64,
    #[serde(default = "default_min_disease_score")]
    pub min_disease_score: f64,
}

fn yes() -> bool { true }
fn default_per_gene() -> i64 { 5 }
fn default_aes_per_drug() -> i64 { 10 }
fn default_min_disease_score() -> f64 { 0.3 }

struct Builder {
    graph: Subgraph,
    seen_nodes: HashSet<String>,
    seen_edges: HashSet<(String, String, String)>,
}

impl Builder {
    fn new() -> Self {
        Self { graph: Subgraph::default(), seen_nodes: HashSet::new(), seen_edges: HashSet::new() }
    }

    fn add_node(&mut self, id: &str, kind: EntityKind, label: &str, properties: Map<String, Value>) {
        if self.seen_nodes.insert(id.to_string()) {
            self.graph.nodes.push(Node {
                id: id.to_string(),
                kind,
                label: label.to_string(),
                properties,
            });
        }
    }

    fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        kind: &str,
        weight: f64,
        properties: Map<String, Value>,
    ) {
        let key = (source.to_string(), target.to_string(), kind.to_string());
        if self.seen_edges.insert(key) {
            self.graph.edges.push(Edge {
                source: source.to_string(),
                target: target.to_string(),
                kind: kind.to_string(),
                weight,
                properties,
            });
        }
    }
}

fn props(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Build a bounded subgraph centered on the given drugs.
pub async fn build_subgraph(
    store: &dyn GraphStore,
    spec: &SubgraphSpec,
) -> Result<Subgraph, ToolError> {
    check_unit_range("min_disease_score", spec.min_disease_score)?;
    check_positive("max_pathways_per_gene", spec.max_pathways_per_gene)?;
    check_positive("max_diseases_per_gene", spec.max_diseases_per_gene)?;
    check_positive("max_aes_per_drug", spec.max_aes_per_drug)?;

    let mut builder = Builder::new();
    let mut gene_keys: Vec<i64> = Vec::new();

    for &drug_key in &spec.drug_keys {
        let Some(drug) = store.drug(drug_key).await? else { continue };
        let drug_id = format!("drug:{drug_key}");
        builder.add_node(&drug_id, EntityKind::Drug, &drug.preferred_name, Map::new());

        if spec.include_targets {
            for target in get_drug_targets(store, drug_key).await? {
                let gene_id = format!("gene:{}", target.gene_key);
                builder.add_node(&gene_id, EntityKind::Gene, &target.gene_symbol, Map::new());
                builder.add_edge(
                    &drug_id,
                    &gene_id,
                    "TARGETS",
                    1.0,
                    props(&[
                        ("claim_key", json!(target.claim_key)),
                        ("relation", json!(target.relation)),
                        ("effect", json!(target.effect)),
                    ]),
                );
                if !gene_keys.contains(&target.gene_key) {
                    gene_keys.push(target.gene_key);
                }
            }
        }

        if spec.include_aes {
            let aes =
                get_drug_adverse_events(store, drug_key, None, spec.max_aes_per_drug).await?;
            for ae in aes {
                let ae_id = format!("ae:{}", ae.ae_key);
                builder.add_node(&ae_id, EntityKind::AdverseEvent, &ae.ae_label, Map::new());
                builder.add_edge(
                    &drug_id,
                    &ae_id,
                    "CAUSES",
                    ae.frequency.unwrap_or(0.01),
                    props(&[
                        ("claim_key", json!(ae.claim_key)),
                        ("frequency", json!(ae.frequency)),
                    ]),
                );
            }
        }
    }

    if spec.include_pathways {
        for &gene_key in &gene_keys {
            let gene_id = format!("gene:{gene_key}");
            let mut pathways = get_gene_pathways(store, gene_key).await?;
            pathways.truncate(spec.max_pathways_per_gene as usize);
            for pathway in pathways {
                let pw_id = format!("pathway:{}", pathway.pathway_key);
                builder.add_node(
                    &pw_id,
                    EntityKind::Pathway,
                    &pathway.pathway_label,
                    props(&[("reactome_id", json!(pathway.reactome_id))]),
                );
                builder.add_edge(
                    &gene_id,
                    &pw_id,
                    "IN_PATHWAY",
                    1.0,
                    props(&[("claim_key", json!(pathway.claim_key))]),
                );
            }
        }
    }

    if spec.include_diseases {
        for &gene_key in &gene_keys {
            let gene_id = format!("gene:{gene_key}");
            let mut diseases =
                get_gene_diseases(store, gene_key, spec.min_disease_score).await?;
            diseases.truncate(spec.max_diseases_per_gene as usize);
            for disease in diseases {
                let dis_id = format!("disease:{}", disease.disease_key);
                builder.add_node(
                    &dis_id,
                    EntityKind::Disease,
                    &disease.disease_label,
                    props(&[("ontology_id", json!(disease.ontology_id))]),
                );
                builder.add_edge(
                    &gene_id,
                    &dis_id,
                    "ASSOCIATED_WITH",
                    disease.score.unwrap_or(0.5),
                    props(&[
                        ("claim_key", json!(disease.claim_key)),
                        ("score", json!(disease.score)),
                    ]),
                );
            }
        }
    }

    tracing::debug!(
        nodes = builder.graph.nodes.len(),
        edges = builder.graph.edges.len(),
        drugs = spec.drug_keys.len(),
        "subgraph assembled"
    );
    Ok(builder.graph)
}

/// Default edge-category weights: curated interactions over label-listed AEs.
fn default_edge_weights() -> HashMap<String, f64> {
    [
        ("TARGETS", 1.0),
        ("IN_PATHWAY", 0.9),
        ("ASSOCIATED_WITH", 0.8),
        ("CAUSES", 0.7),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

const OTHER_EDGE_WEIGHT: f64 = 0.5;

/// Annotate edges with category weights; an existing numeric weight
/// (frequency, association score) is scaled by the category weight.
pub fn score_edges(graph: &mut Subgraph, weights: Option<&HashMap<String, f64>>) {
    let defaults = default_edge_weights();
    let table = weights.unwrap_or(&defaults);

    for edge in &mut graph.edges {
        let base = table.get(&edge.kind).copied().unwrap_or(OTHER_EDGE_WEIGHT);
        edge.weight = if edge.weight > 0.0 { base * edge.weight } else { base };
    }
}
