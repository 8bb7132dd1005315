//! Entity resolution tools.
//!
//! Resolve user-provided drug names, gene symbols, disease and adverse-event
//! terms to surrogate keys. Matching runs in fixed attempt order (exact name,
//! external id, fragment) with a confidence per attempt; ties break on richer
//! cross-reference sets, then the lower surrogate key.

use std::collections::BTreeMap;

use serde::Serialize;

use vigil_graph::rows::{AdverseEventRow, DiseaseRow, DrugRow, GeneRow};
use vigil_graph::GraphStore;

use crate::error::ToolError;

/// A resolved entity with the match source and its confidence.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEntity {
    pub key: i64,
    pub name: String,
    pub source: String,
    pub confidence: f64,
}

pub type Resolution = BTreeMap<String, Option<ResolvedEntity>>;

const CONF_EXACT: f64 = 1.0;
const CONF_XREF: f64 = 0.9;
const CONF_DRUG_FRAGMENT: f64 = 0.8;
const CONF_FRAGMENT: f64 = 0.7;

fn pick_drug(mut rows: Vec<DrugRow>) -> Option<DrugRow> {
    rows.sort_by(|a, b| {
        b.xref_count()
            .cmp(&a.xref_count())
            .then_with(|| a.drug_key.cmp(&b.drug_key))
    });
    rows.into_iter().next()
}

fn pick_gene(mut rows: Vec<GeneRow>) -> Option<GeneRow> {
    rows.sort_by(|a, b| {
        b.xref_count()
            .cmp(&a.xref_count())
            .then_with(|| a.gene_key.cmp(&b.gene_key))
    });
    rows.into_iter().next()
}

fn pick_disease(mut rows: Vec<DiseaseRow>) -> Option<DiseaseRow> {
    rows.sort_by(|a, b| {
        (b.ontology_id.is_some() as u8)
            .cmp(&(a.ontology_id.is_some() as u8))
            .then_with(|| a.disease_key.cmp(&b.disease_key))
    });
    rows.into_iter().next()
}

fn pick_ae(mut rows: Vec<AdverseEventRow>) -> Option<AdverseEventRow> {
    rows.sort_by(|a, b| {
        (b.meddra_code.is_some() as u8)
            .cmp(&(a.meddra_code.is_some() as u8))
            .then_with(|| a.ae_key.cmp(&b.ae_key))
    });
    rows.into_iter().next()
}

/// Resolve drug names to drug keys.
pub async fn resolve_drugs(
    store: &dyn GraphStore,
    names: &[String],
) -> Result<Resolution, ToolError> {
    let mut results = Resolution::new();
    for name in names {
        let lowered = name.trim().to_lowercase();
        if lowered.is_empty() {
            results.insert(name.clone(), None);
            continue;
        }

        if let Some(row) = pick_drug(store.drugs_by_name(&lowered).await?) {
            results.insert(
                name.clone(),
                Some(ResolvedEntity {
                    key: row.drug_key,
                    name: row.preferred_name,
                    source: "preferred_name".to_string(),
                    confidence: CONF_EXACT,
                }),
            );
            continue;
        }

        if let Some(row) = pick_drug(store.drugs_by_xref(name.trim()).await?) {
            results.insert(
                name.clone(),
                Some(ResolvedEntity {
                    key: row.drug_key,
                    name: row.preferred_name,
                    source: "external_id".to_string(),
                    confidence: CONF_XREF,
                }),
            );
            continue;
        }

        if let Some(row) = pick_drug(store.drugs_by_name_fragment(&lowered).await?) {
            results.insert(
                name.clone(),
                Some(ResolvedEntity {
                    key: row.drug_key,
                    name: row.preferred_name,
                    source: "preferred_name_partial".to_string(),
                    confidence: CONF_DRUG_FRAGMENT,
                }),
            );
            continue;
        }

        results.insert(name.clone(), None);
    }
    Ok(results)
}

/// Resolve gene symbols to gene keys.
pub async fn resolve_genes(
    store: &dyn GraphStore,
    symbols: &[String],
) -> Result<Resolution, ToolError> {
    let mut results = Resolution::new();
    for symbol in symbols {
        let upper = symbol.trim().to_uppercase();
        if upper.is_empty() {
            results.insert(symbol.clone(), None);
            continue;
        }

        if let Some(row) = pick_gene(store.genes_by_symbol(&upper).await?) {
            results.insert(
                symbol.clone(),
                Some(ResolvedEntity {
                    key: row.gene_key,
                    name: row.symbol,
                    source: "symbol".to_string(),
                    confidence: CONF_EXACT,
                }),
            );
            continue;
        }

        if let Some(row) = pick_gene(store.genes_by_hgnc(symbol.trim()).await?) {
            results.insert(
                symbol.clone(),
                Some(ResolvedEntity {
                    key: row.gene_key,
                    name: row.symbol,
                    source: "hgnc_id".to_string(),
                    confidence: CONF_XREF,
                }),
            );
            continue;
        }

        results.insert(symbol.clone(), None);
    }
    Ok(results)
}

/// Resolve disease terms to disease keys.
pub async fn resolve_diseases(
    store: &dyn GraphStore,
    terms: &[String],
) -> Result<Resolution, ToolError> {
    let mut results = Resolution::new();
    for term in terms {
        let lowered = term.trim().to_lowercase();
        if lowered.is_empty() {
            results.insert(term.clone(), None);
            continue;
        }

        if let Some(row) = pick_disease(store.diseases_by_label(&lowered).await?) {
            results.insert(
                term.clone(),
                Some(ResolvedEntity {
                    key: row.disease_key,
                    name: row.label,
                    source: "label".to_string(),
                    confidence: CONF_EXACT,
                }),
            );
            continue;
        }

        if let Some(row) = pick_disease(store.diseases_by_ontology_id(term.trim()).await?) {
            results.insert(
                term.clone(),
                Some(ResolvedEntity {
                    key: row.disease_key,
                    name: row.label,
                    source: "ontology_id".to_string(),
                    confidence: CONF_XREF,
                }),
            );
            continue;
        }

        if let Some(row) = pick_disease(store.diseases_by_label_fragment(&lowered).await?) {
            results.insert(
                term.clone(),
                Some(ResolvedEntity {
                    key: row.disease_key,
                    name: row.label,
                    source: "label_partial".to_string(),
                    confidence: CONF_FRAGMENT,
                }),
            );
            continue;
        }

        results.insert(term.clone(), None);
    }
    Ok(results)
}

/// Resolve adverse-event terms to AE keys.
pub async fn resolve_adverse_events(
    store: &dyn GraphStore,
    terms: &[String],
) -> Result<Resolution, ToolError> {
    let mut results = Resolution::new();
    for term in terms {
        let lowered = term.trim().to_lowercase();
        if lowered.is_empty() {
            results.insert(term.clone(), None);
            continue;
        }

        if let Some(row) = pick_ae(store.adverse_events_by_label(&lowered).await?) {
            results.insert(
                term.clone(),
                Some(ResolvedEntity {
                    key: row.ae_key,
                    name: row.ae_label,
                    source: "label".to_string(),
                    confidence: CONF_EXACT,
                }),
            );
            continue;
        }

        if let Some(row) = pick_ae(store.adverse_events_by_code(term.trim()).await?) {
            results.insert(
                term.clone(),
                Some(ResolvedEntity {
                    key: row.ae_key,
                    name: row.ae_label,
                    source: "code".to_string(),
                    confidence: CONF_XREF,
                }),
            );
            continue;
        }

        if let Some(row) = pick_ae(store.adverse_events_by_label_fragment(&lowered).await?) {
            results.insert(
                term.clone(),
                Some(ResolvedEntity {
                    key: row.ae_key,
                    name: row.ae_label,
                    source: "label_partial".to_string(),
                    confidence: CONF_FRAGMENT,
                }),
            );
            continue;
        }

        results.insert(term.clone(), None);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_graph::MemoryGraph;

    fn drug_row(key: i64, name: &str, drugcentral: Option<&str>) -> DrugRow {
        DrugRow {
            drug_key: key,
            preferred_name: name.to_string(),
            drugcentral_id: drugcentral.map(str::to_string),
            chembl_id: None,
            pubchem_cid: None,
            inchi_key: None,
        }
    }

    #[tokio::test]
    async fn test_exact_match_wins_with_full_confidence() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(14042, "Metformin");

        let resolved = resolve_drugs(&graph, &["metformin".to_string()]).await.unwrap();
        let entity = resolved["metformin"].as_ref().unwrap();
        assert_eq!(entity.key, 14042);
        assert_eq!(entity.confidence, 1.0);
        assert_eq!(entity.source, "preferred_name");
    }

    #[tokio::test]
    async fn test_tie_breaks_on_richer_xrefs_then_lower_key() {
        let mut graph = MemoryGraph::new();
        graph.add_drug_row(drug_row(7, "aspirin", None));
        graph.add_drug_row(drug_row(9, "aspirin", Some("DC123")));

        let resolved = resolve_drugs(&graph, &["aspirin".to_string()]).await.unwrap();
        assert_eq!(resolved["aspirin"].as_ref().unwrap().key, 9);

        let mut graph = MemoryGraph::new();
        graph.add_drug_row(drug_row(7, "ibuprofen", None));
        graph.add_drug_row(drug_row(3, "ibuprofen", None));
        let resolved = resolve_drugs(&graph, &["ibuprofen".to_string()]).await.unwrap();
        assert_eq!(resolved["ibuprofen"].as_ref().unwrap().key, 3);
    }

    #[tokio::test]
    async fn test_fragment_fallback_has_partial_confidence() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(5, "metformin hydrochloride");

        let resolved = resolve_drugs(&graph, &["metformin".to_string()]).await.unwrap();
        let entity = resolved["metformin"].as_ref().unwrap();
        assert_eq!(entity.key, 5);
        assert_eq!(entity.confidence, 0.8);
        assert_eq!(entity.source, "preferred_name_partial");
    }

    #[tokio::test]
    async fn test_unknown_name_resolves_to_none() {
        let graph = MemoryGraph::new();
        let resolved = resolve_drugs(&graph, &["zanithrax".to_string()]).await.unwrap();
        assert!(resolved["zanithrax"].is_none());
    }

    #[tokio::test]
    async fn test_gene_symbols_match_case_insensitively() {
        let mut graph = MemoryGraph::new();
        graph.add_gene(10, "PRKAB1");

        let resolved = resolve_genes(&graph, &["prkab1".to_string()]).await.unwrap();
        let entity = resolved["prkab1"].as_ref().unwrap();
        assert_eq!(entity.key, 10);
        assert_eq!(entity.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_disease_fragment_confidence() {
        let mut graph = MemoryGraph::new();
        graph.add_disease(40, "chronic kidney disease");

        let resolved = resolve_diseases(&graph, &["kidney disease".to_string()]).await.unwrap();
        let entity = resolved["kidney disease"].as_ref().unwrap();
        assert_eq!(entity.key, 40);
        assert_eq!(entity.confidence, 0.7);
    }
}
