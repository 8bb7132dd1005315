//! Mechanism traversal tools.
//!
//! Expand drugs to targets, genes to pathways, diseases and interaction
//! partners. Every record keeps its claim key for provenance drill-down.

use std::collections::BTreeSet;

use serde::Serialize;

use vigil_graph::GraphStore;

use crate::error::{check_positive, check_unit_range, ToolError};

#[derive(Debug, Clone, Serialize)]
pub struct DrugTarget {
    pub gene_symbol: String,
    pub gene_key: i64,
    pub relation: Option<String>,
    pub effect: Option<String>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenePathway {
    pub pathway_label: String,
    pub pathway_key: i64,
    pub reactome_id: Option<String>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneDisease {
    pub disease_label: String,
    pub disease_key: i64,
    pub ontology_id: Option<String>,
    pub score: Option<f64>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiseaseGene {
    pub gene_symbol: String,
    pub gene_key: i64,
    pub score: Option<f64>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneInteractor {
    pub partner_symbol: String,
    pub partner_key: i64,
    pub score: Option<f64>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

/// Targets plus their pathways, pathways deduplicated across targets.
#[derive(Debug, Clone, Serialize)]
pub struct MechanismExpansion {
    pub targets: Vec<DrugTarget>,
    pub pathways: Vec<GenePathway>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneContextEntry {
    pub gene_key: i64,
    pub pathways: Vec<GenePathway>,
    pub diseases: Vec<GeneDisease>,
}

pub async fn get_drug_targets(
    store: &dyn GraphStore,
    drug_key: i64,
) -> Result<Vec<DrugTarget>, ToolError> {
    let rows = store.drug_targets(drug_key).await?;
    Ok(rows
        .into_iter()
        .map(|r| DrugTarget {
            gene_symbol: r.gene_symbol,
            gene_key: r.gene_key,
            relation: r.relation,
            effect: r.effect,
            claim_key: r.claim_key,
            dataset_key: r.dataset_key,
        })
        .collect())
}

pub async fn get_gene_pathways(
    store: &dyn GraphStore,
    gene_key: i64,
) -> Result<Vec<GenePathway>, ToolError> {
    let rows = store.gene_pathways(gene_key).await?;
    Ok(rows
        .into_iter()
        .map(|r| GenePathway {
            pathway_label: r.pathway_label,
            pathway_key: r.pathway_key,
            reactome_id: r.reactome_id,
            claim_key: r.claim_key,
            dataset_key: r.dataset_key,
        })
        .collect())
}

pub async fn get_gene_diseases(
    store: &dyn GraphStore,
    gene_key: i64,
    min_score: f64,
) -> Result<Vec<GeneDisease>, ToolError> {
    check_unit_range("min_score", min_score)?;
    let rows = store.gene_diseases(gene_key, min_score).await?;
    Ok(rows
        .into_iter()
        .map(|r| GeneDisease {
            disease_label: r.disease_label,
            disease_key: r.disease_key,
            ontology_id: r.ontology_id,
            score: r.score,
            claim_key: r.claim_key,
            dataset_key: r.dataset_key,
        })
        .collect())
}

pub async fn get_disease_genes(
    store: &dyn GraphStore,
    disease_key: i64,
    sources: Option<&[String]>,
    min_score: f64,
    limit: i64,
) -> Result<Vec<DiseaseGene>, ToolError> {
    check_unit_range("min_score", min_score)?;
    check_positive("limit", limit)?;
    let rows = store.disease_genes(disease_key, sources, min_score, limit).await?;
    Ok(rows
        .into_iter()
        .map(|r| DiseaseGene {
            gene_symbol: r.gene_symbol,
            gene_key: r.gene_key,
            score: r.score,
            claim_key: r.claim_key,
            dataset_key: r.dataset_key,
        })
        .collect())
}

pub async fn get_gene_interactors(
    store: &dyn GraphStore,
    gene_key: i64,
    min_score: f64,
    limit: i64,
) -> Result<Vec<GeneInteractor>, ToolError> {
    check_unit_range("min_score", min_score)?;
    check_positive("limit", limit)?;
    let rows = store.gene_interactors(gene_key, min_score, limit).await?;
    Ok(rows
        .into_iter()
        .map(|r| GeneInteractor {
            partner_symbol: r.partner_symbol,
            partner_key: r.partner_key,
            score: r.score,
            claim_key: r.claim_key,
            dataset_key: r.dataset_key,
        })
        .collect())
}

/// Full mechanism for a drug: targets plus the union of their pathways.
pub async fn expand_mechanism(
    store: &dyn GraphStore,
    drug_key: i64,
) -> Result<MechanismExpansion, ToolError> {
    let targets = get_drug_targets(store, drug_key).await?;

    let mut seen = BTreeSet::new();
    let mut pathways = Vec::new();
    for target in &targets {
        for pathway in get_gene_pathways(store, target.gene_key).await? {
            if seen.insert(pathway.pathway_key) {
                pathways.push(pathway);
            }
        }
    }

    Ok(MechanismExpansion { targets, pathways })
}

/// Per-gene pathways and disease associations for a set of genes.
pub async fn expand_gene_context(
    store: &dyn GraphStore,
    gene_keys: &[i64],
    min_disease_score: f64,
) -> Result<Vec<GeneContextEntry>, ToolError> {
    check_unit_range("min_disease_score", min_disease_score)?;
    let mut entries = Vec::with_capacity(gene_keys.len());
    for &gene_key in gene_keys {
        entries.push(GeneContextEntry {
            gene_key,
            pathways: get_gene_pathways(store, gene_key).await?,
            diseases: get_gene_diseases(store, gene_key, min_disease_score).await?,
        });
    }
    Ok(entries)
}
