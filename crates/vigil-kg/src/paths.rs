//! Path finding and explanation tools.
//!
//! Enumerates candidate mechanistic paths of three shapes — direct
//! Drug→AE, Drug→Gene→Pathway(→AE), Drug→Gene→Disease(→AE) — bounded at four
//! nodes, deduplicated by node sequence, and ranked by the scoring policy.

use std::collections::{HashSet, BTreeSet};

use serde::Serialize;

use vigil_graph::{EntityKind, GraphStore};

use crate::error::{check_positive, ToolError};
use crate::scoring::ScoringPolicy;

#[derive(Debug, Clone, Serialize)]
pub struct PathStep {
    pub node_kind: EntityKind,
    pub node_key: i64,
    pub node_label: String,
    /// Edge kind leading into this node; None on the first step.
    pub edge_kind: Option<String>,
}

/// One claim along a path, with everything the scoring policy needs.
#[derive(Debug, Clone, Serialize)]
pub struct PathClaim {
    pub claim_key: i64,
    pub strength: Option<f64>,
    pub dataset_key: Option<String>,
    pub evidence_keys: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MechanisticPath {
    pub steps: Vec<PathStep>,
    pub claims: Vec<PathClaim>,
    pub score: f64,
    pub evidence_count: usize,
}

impl MechanisticPath {
    pub fn hop_count(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Node-sequence key used for deduplication and stable accumulation.
    pub fn signature(&self) -> String {
        self.steps
            .iter()
            .map(|s| format!("{}:{}", s.node_kind, s.node_key))
            .collect::<Vec<_>>()
            .join("->")
    }

    pub fn distinct_evidence(&self) -> usize {
        self.claims
            .iter()
            .flat_map(|c| c.evidence_keys.iter().copied())
            .collect::<HashSet<i64>>()
            .len()
    }

    pub fn distinct_datasets(&self) -> usize {
        self.claims
            .iter()
            .filter_map(|c| c.dataset_key.as_deref())
            .collect::<BTreeSet<&str>>()
            .len()
    }

    pub fn claim_keys(&self) -> Vec<i64> {
        self.claims.iter().map(|c| c.claim_key).collect()
    }
}

impl std::fmt::Display for MechanisticPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                if let Some(edge) = &step.edge_kind {
                    write!(f, " --[{edge}]--> ")?;
                }
            }
            write!(f, "{}:{}", step.node_kind, step.node_label)?;
        }
        Ok(())
    }
}

fn finish(policy: &ScoringPolicy, steps: Vec<PathStep>, claims: Vec<PathClaim>) -> MechanisticPath {
    let hop_count = steps.len().saturating_sub(1);
    let mut path = MechanisticPath { steps, claims, score: 0.0, evidence_count: 0 };
    path.score = policy.score_path(&path.claims, hop_count);
    path.evidence_count = path.distinct_evidence();
    path
}

/// Find mechanistic paths from a drug toward adverse events.
pub async fn find_drug_to_ae_paths(
    store: &dyn GraphStore,
    policy: &ScoringPolicy,
    drug_key: i64,
    ae_key: Option<i64>,
    max_paths: i64,
) -> Result<Vec<MechanisticPath>, ToolError> {
    check_positive("max_paths", max_paths)?;

    let mut candidates: Vec<MechanisticPath> = Vec::new();

    // Shape 1: direct Drug -> AE.
    for hop in store.drug_ae_hops(drug_key, ae_key).await? {
        let steps = vec![
            PathStep {
                node_kind: EntityKind::Drug,
                node_key: drug_key,
                node_label: hop.drug_name.clone(),
                edge_kind: None,
            },
            PathStep {
                node_kind: EntityKind::AdverseEvent,
                node_key: hop.ae_key,
                node_label: hop.ae_label.clone(),
                edge_kind: Some("CAUSES".to_string()),
            },
        ];
        let claims = vec![PathClaim {
            claim_key: hop.claim_key,
            strength: hop.strength_score.or(hop.frequency),
            dataset_key: hop.dataset_key.clone(),
            evidence_keys: hop.evidence_keys.clone(),
        }];
        candidates.push(finish(policy, steps, claims));
    }

    // Shape 2: Drug -> Gene -> Pathway, optionally extended to the AE.
    for hop in store.drug_gene_pathway_hops(drug_key, max_paths).await? {
        let base_steps = vec![
            PathStep {
                node_kind: EntityKind::Drug,
                node_key: drug_key,
                node_label: hop.drug_name.clone(),
                edge_kind: None,
            },
            PathStep {
                node_kind: EntityKind::Gene,
                node_key: hop.gene_key,
                node_label: hop.gene_symbol.clone(),
                edge_kind: Some("TARGETS".to_string()),
            },
            PathStep {
                node_kind: EntityKind::Pathway,
                node_key: hop.pathway_key,
                node_label: hop.pathway_label.clone(),
                edge_kind: Some("IN_PATHWAY".to_string()),
            },
        ];
        let base_claims = vec![
            PathClaim {
                claim_key: hop.target_claim_key,
                strength: hop.target_strength,
                dataset_key: hop.target_dataset.clone(),
                evidence_keys: hop.target_evidence_keys.clone(),
            },
            PathClaim {
                claim_key: hop.pathway_claim_key,
                strength: hop.pathway_strength,
                dataset_key: hop.pathway_dataset.clone(),
                evidence_keys: hop.pathway_evidence_keys.clone(),
            },
        ];
        candidates.push(finish(policy, base_steps.clone(), base_claims.clone()));

        if let Some(target_ae) = ae_key {
            for link in store.pathway_ae_links(hop.pathway_key, target_ae).await? {
                let mut steps = base_steps.clone();
                steps.push(PathStep {
                    node_kind: EntityKind::AdverseEvent,
                    node_key: link.ae_key,
                    node_label: link.ae_label.clone(),
                    edge_kind: Some("ASSOCIATED_WITH".to_string()),
                });
                let mut claims = base_claims.clone();
                claims.push(PathClaim {
                    claim_key: link.claim_key,
                    strength: link.strength_score,
                    dataset_key: link.dataset_key.clone(),
                    evidence_keys: link.evidence_keys.clone(),
                });
                candidates.push(finish(policy, steps, claims));
            }
        }
    }

    // Shape 3: Drug -> Gene -> Disease, optionally extended to the AE.
    for hop in store.drug_gene_disease_hops(drug_key, max_paths).await? {
        let base_steps = vec![
            PathStep {
                node_kind: EntityKind::Drug,
                node_key: drug_key,
                node_label: hop.drug_name.clone(),
                edge_kind: None,
            },
            PathStep {
                node_kind: EntityKind::Gene,
                node_key: hop.gene_key,
                node_label: hop.gene_symbol.clone(),
                edge_kind: Some("TARGETS".to_string()),
            },
            PathStep {
                node_kind: EntityKind::Disease,
                node_key: hop.disease_key,
                node_label: hop.disease_label.clone(),
                edge_kind: Some("ASSOCIATED_WITH".to_string()),
            },
        ];
        let base_claims = vec![
            PathClaim {
                claim_key: hop.target_claim_key,
                strength: hop.target_strength,
                dataset_key: hop.target_dataset.clone(),
                evidence_keys: hop.target_evidence_keys.clone(),
            },
            PathClaim {
                claim_key: hop.disease_claim_key,
                strength: hop.disease_strength,
                dataset_key: hop.disease_dataset.clone(),
                evidence_keys: hop.disease_evidence_keys.clone(),
            },
        ];
        candidates.push(finish(policy, base_steps.clone(), base_claims.clone()));

        if let Some(target_ae) = ae_key {
            for link in store.disease_ae_links(hop.disease_key, target_ae).await? {
                let mut steps = base_steps.clone();
                steps.push(PathStep {
                    node_kind: EntityKind::AdverseEvent,
                    node_key: link.ae_key,
                    node_label: link.ae_label.clone(),
                    edge_kind: Some("ASSOCIATED_WITH".to_string()),
                });
                let mut claims = base_claims.clone();
                claims.push(PathClaim {
                    claim_key: link.claim_key,
                    strength: link.strength_score,
                    dataset_key: link.dataset_key.clone(),
                    evidence_keys: link.evidence_keys.clone(),
                });
                candidates.push(finish(policy, steps, claims));
            }
        }
    }

    // Deduplicate by node sequence, keep first occurrence.
    let mut seen = HashSet::new();
    let mut paths: Vec<MechanisticPath> = candidates
        .into_iter()
        .filter(|p| seen.insert(p.signature()))
        .collect();

    paths.sort_by(ScoringPolicy::rank);
    paths.truncate(max_paths as usize);
    Ok(paths)
}

/// Path finding with patient-condition context boosting.
pub async fn explain_paths(
    store: &dyn GraphStore,
    policy: &ScoringPolicy,
    drug_key: i64,
    ae_key: Option<i64>,
    condition_keys: Option<&[i64]>,
    top_k: i64,
) -> Result<Vec<MechanisticPath>, ToolError> {
    check_positive("top_k", top_k)?;

    let mut paths =
        find_drug_to_ae_paths(store, policy, drug_key, ae_key, top_k * 2).await?;

    if let Some(conditions) = condition_keys {
        let condition_set: HashSet<i64> = conditions.iter().copied().collect();
        for path in &mut paths {
            path.score *= policy.condition_boost(path, &condition_set);
        }
        paths.sort_by(ScoringPolicy::rank);
    }

    paths.truncate(top_k as usize);
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_graph::MemoryGraph;

    /// Seed from the drug–AE mechanism scenario: X targets G (0.8, two
    /// evidence records), G sits in pathway P, and X lists AE Y at 0.05.
    fn mechanism_graph() -> (MemoryGraph, i64) {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "drug x");
        graph.add_gene(10, "G1");
        graph.add_pathway(20, "P1");
        graph.add_adverse_event(30, "ae y");
        let target_claim = graph.add_target_claim(1, 10, Some(0.8), "drugcentral");
        graph.add_evidence_to_claim(target_claim, "chembl");
        graph.add_pathway_claim(10, 20, "reactome");
        graph.add_ae_claim(1, 30, Some(0.05), "sider");
        (graph, 30)
    }

    #[tokio::test]
    async fn test_mechanistic_path_outranks_weak_direct_path() {
        let (graph, ae_key) = mechanism_graph();
        let policy = ScoringPolicy::default();

        let paths = find_drug_to_ae_paths(&graph, &policy, 1, Some(ae_key), 10)
            .await
            .unwrap();
        assert!(paths.len() >= 2);

        // Drug -> Gene -> Pathway: 0.8 * 0.95^2 * 1.2
        let top = &paths[0];
        assert_eq!(top.steps.len(), 3);
        assert_eq!(top.steps[2].node_kind, EntityKind::Pathway);
        assert!((top.score - 0.8 * 0.95 * 0.95 * 1.2).abs() < 1e-9);

        // Direct Drug -> AE: 0.05 * 0.95
        let direct = paths
            .iter()
            .find(|p| p.steps.len() == 2)
            .expect("direct path present");
        assert!((direct.score - 0.05 * 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_paths_deduplicated_by_node_sequence() {
        let (graph, ae_key) = mechanism_graph();
        let policy = ScoringPolicy::default();
        let paths = find_drug_to_ae_paths(&graph, &policy, 1, Some(ae_key), 10)
            .await
            .unwrap();

        let mut signatures: Vec<String> = paths.iter().map(|p| p.signature()).collect();
        signatures.sort();
        signatures.dedup();
        assert_eq!(signatures.len(), paths.len());
    }

    #[tokio::test]
    async fn test_disease_extension_reaches_ae() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "drug x");
        graph.add_gene(10, "G1");
        graph.add_disease(40, "cardiomyopathy");
        graph.add_adverse_event(30, "heart failure");
        graph.add_target_claim(1, 10, Some(0.7), "drugcentral");
        graph.add_gene_disease_claim(10, 40, Some(0.6), "opentargets");
        graph.add_disease_ae_claim(40, 30, Some(0.5), "hpo");

        let policy = ScoringPolicy::default();
        let paths = find_drug_to_ae_paths(&graph, &policy, 1, Some(30), 10)
            .await
            .unwrap();

        let extended = paths
            .iter()
            .find(|p| p.steps.len() == 4)
            .expect("four-node path present");
        assert_eq!(extended.steps[3].node_kind, EntityKind::AdverseEvent);
        assert_eq!(extended.hop_count(), 3);
        assert_eq!(extended.claims.len(), 3);
    }

    #[tokio::test]
    async fn test_condition_boost_reorders_paths() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "drug x");
        graph.add_gene(10, "G1");
        graph.add_gene(11, "G2");
        graph.add_pathway(20, "P1");
        graph.add_disease(40, "renal failure");
        graph.add_target_claim(1, 10, Some(0.9), "drugcentral");
        graph.add_target_claim(1, 11, Some(0.7), "drugcentral");
        graph.add_pathway_claim(10, 20, "reactome");
        graph.add_gene_disease_claim(11, 40, Some(0.6), "opentargets");

        let policy = ScoringPolicy::default();
        let plain = explain_paths(&graph, &policy, 1, None, None, 5).await.unwrap();
        assert_eq!(plain[0].steps[2].node_kind, EntityKind::Pathway);

        let boosted = explain_paths(&graph, &policy, 1, None, Some(&[40]), 5)
            .await
            .unwrap();
        assert_eq!(boosted[0].steps[2].node_kind, EntityKind::Disease);
    }

    #[tokio::test]
    async fn test_invalid_max_paths_rejected_before_store_access() {
        let (graph, _) = mechanism_graph();
        let policy = ScoringPolicy::default();
        let issued_before = graph.queries_issued();
        let err = find_drug_to_ae_paths(&graph, &policy, 1, None, 0).await.unwrap_err();
        assert_eq!(err.category(), "tool.invalid_args");
        assert_eq!(graph.queries_issued(), issued_before);
    }

    #[tokio::test]
    async fn test_display_renders_edge_kinds() {
        let (graph, _) = mechanism_graph();
        let policy = ScoringPolicy::default();
        let paths = find_drug_to_ae_paths(&graph, &policy, 1, None, 10).await.unwrap();
        let rendered = paths[0].to_string();
        assert!(rendered.contains("--[TARGETS]-->"));
        assert!(rendered.starts_with("Drug:"));
    }
}
