//! The read-only store contract every tool query goes through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::rows::*;

/// Entity kinds present in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Drug,
    Gene,
    Disease,
    Pathway,
    AdverseEvent,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Drug => "Drug",
            EntityKind::Gene => "Gene",
            EntityKind::Disease => "Disease",
            EntityKind::Pathway => "Pathway",
            EntityKind::AdverseEvent => "AdverseEvent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Drug" | "drug" => Some(EntityKind::Drug),
            "Gene" | "gene" => Some(EntityKind::Gene),
            "Disease" | "disease" => Some(EntityKind::Disease),
            "Pathway" | "pathway" => Some(EntityKind::Pathway),
            "AdverseEvent" | "adverse_event" => Some(EntityKind::AdverseEvent),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only queries against the knowledge graph. Every method maps to one
/// fixed parameterised query; implementations must not expose writes.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Cheap liveness check, run before a query enters the ReAct loop.
    async fn ping(&self) -> Result<(), GraphError>;

    // ── Resolution ──────────────────────────────────────────────────────────

    async fn drugs_by_name(&self, name_lower: &str) -> Result<Vec<DrugRow>, GraphError>;
    async fn drugs_by_xref(&self, external_id: &str) -> Result<Vec<DrugRow>, GraphError>;
    async fn drugs_by_name_fragment(&self, fragment_lower: &str) -> Result<Vec<DrugRow>, GraphError>;

    async fn genes_by_symbol(&self, symbol_upper: &str) -> Result<Vec<GeneRow>, GraphError>;
    async fn genes_by_hgnc(&self, hgnc_id: &str) -> Result<Vec<GeneRow>, GraphError>;

    async fn diseases_by_label(&self, label_lower: &str) -> Result<Vec<DiseaseRow>, GraphError>;
    async fn diseases_by_ontology_id(&self, ontology_id: &str) -> Result<Vec<DiseaseRow>, GraphError>;
    async fn diseases_by_label_fragment(
        &self,
        fragment_lower: &str,
    ) -> Result<Vec<DiseaseRow>, GraphError>;

    async fn adverse_events_by_label(
        &self,
        label_lower: &str,
    ) -> Result<Vec<AdverseEventRow>, GraphError>;
    async fn adverse_events_by_code(&self, code: &str) -> Result<Vec<AdverseEventRow>, GraphError>;
    async fn adverse_events_by_label_fragment(
        &self,
        fragment_lower: &str,
    ) -> Result<Vec<AdverseEventRow>, GraphError>;

    // ── Entity lookup ───────────────────────────────────────────────────────

    async fn drug(&self, drug_key: i64) -> Result<Option<DrugRow>, GraphError>;

    // ── Mechanism traversal ─────────────────────────────────────────────────

    async fn drug_targets(&self, drug_key: i64) -> Result<Vec<TargetRow>, GraphError>;
    async fn gene_pathways(&self, gene_key: i64) -> Result<Vec<GenePathwayRow>, GraphError>;
    async fn gene_diseases(
        &self,
        gene_key: i64,
        min_score: f64,
    ) -> Result<Vec<GeneDiseaseRow>, GraphError>;
    async fn disease_genes(
        &self,
        disease_key: i64,
        sources: Option<&[String]>,
        min_score: f64,
        limit: i64,
    ) -> Result<Vec<DiseaseGeneRow>, GraphError>;
    async fn gene_interactors(
        &self,
        gene_key: i64,
        min_score: f64,
        limit: i64,
    ) -> Result<Vec<InteractorRow>, GraphError>;

    // ── Adverse events ──────────────────────────────────────────────────────

    async fn drug_adverse_events(
        &self,
        drug_key: i64,
        min_frequency: Option<f64>,
        limit: i64,
    ) -> Result<Vec<DrugAeRow>, GraphError>;
    async fn drug_label_claims(&self, drug_key: i64) -> Result<Vec<LabelClaimRow>, GraphError>;
    async fn drug_faers_claims(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<FaersClaimRow>, GraphError>;

    // ── Provenance ──────────────────────────────────────────────────────────

    async fn claim(&self, claim_key: i64) -> Result<Option<ClaimRow>, GraphError>;
    async fn claim_evidence(&self, claim_key: i64) -> Result<Vec<EvidenceRow>, GraphError>;
    async fn entity_claims(
        &self,
        kind: EntityKind,
        entity_key: i64,
        claim_types: Option<&[String]>,
        limit: i64,
    ) -> Result<Vec<ClaimRow>, GraphError>;

    // ── Path hops ───────────────────────────────────────────────────────────

    async fn drug_ae_hops(
        &self,
        drug_key: i64,
        ae_key: Option<i64>,
    ) -> Result<Vec<DrugAeHopRow>, GraphError>;
    async fn drug_gene_pathway_hops(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<GenePathwayHopRow>, GraphError>;
    async fn drug_gene_disease_hops(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<GeneDiseaseHopRow>, GraphError>;
    async fn pathway_ae_links(
        &self,
        pathway_key: i64,
        ae_key: i64,
    ) -> Result<Vec<AeLinkRow>, GraphError>;
    async fn disease_ae_links(
        &self,
        disease_key: i64,
        ae_key: i64,
    ) -> Result<Vec<AeLinkRow>, GraphError>;
}
