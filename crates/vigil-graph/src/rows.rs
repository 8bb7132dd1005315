//! Row records returned by the graph store.
//! Plain data carriers: the tool library maps these into its domain structs.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DrugRow {
    pub drug_key: i64,
    pub preferred_name: String,
    pub drugcentral_id: Option<String>,
    pub chembl_id: Option<String>,
    pub pubchem_cid: Option<String>,
    pub inchi_key: Option<String>,
}

impl DrugRow {
    /// Number of populated external cross-references; resolution tie-break.
    pub fn xref_count(&self) -> usize {
        [
            self.drugcentral_id.is_some(),
            self.chembl_id.is_some(),
            self.pubchem_cid.is_some(),
            self.inchi_key.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GeneRow {
    pub gene_key: i64,
    pub symbol: String,
    pub hgnc_id: Option<String>,
    pub ensembl_id: Option<String>,
    pub uniprot_id: Option<String>,
}

impl GeneRow {
    pub fn xref_count(&self) -> usize {
        [
            self.hgnc_id.is_some(),
            self.ensembl_id.is_some(),
            self.uniprot_id.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiseaseRow {
    pub disease_key: i64,
    pub label: String,
    pub ontology_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdverseEventRow {
    pub ae_key: i64,
    pub ae_label: String,
    pub meddra_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TargetRow {
    pub gene_key: i64,
    pub gene_symbol: String,
    pub relation: Option<String>,
    pub effect: Option<String>,
    pub claim_key: i64,
    pub strength_score: Option<f64>,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GenePathwayRow {
    pub pathway_key: i64,
    pub pathway_label: String,
    pub reactome_id: Option<String>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GeneDiseaseRow {
    pub disease_key: i64,
    pub disease_label: String,
    pub ontology_id: Option<String>,
    pub score: Option<f64>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiseaseGeneRow {
    pub gene_key: i64,
    pub gene_symbol: String,
    pub score: Option<f64>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InteractorRow {
    pub partner_key: i64,
    pub partner_symbol: String,
    pub score: Option<f64>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DrugAeRow {
    pub ae_key: i64,
    pub ae_label: String,
    pub frequency: Option<f64>,
    pub relation: Option<String>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LabelClaimRow {
    pub claim_key: i64,
    pub statement: Option<Value>,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FaersClaimRow {
    pub ae_key: i64,
    pub ae_label: String,
    pub claim_key: i64,
    pub strength_score: Option<f64>,
    pub statement: Option<Value>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClaimRow {
    pub claim_key: i64,
    pub claim_type: String,
    pub polarity: Option<i16>,
    pub strength_score: Option<f64>,
    pub dataset_key: Option<String>,
    pub source_record_id: Option<String>,
    pub statement: Option<Value>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EvidenceRow {
    pub evidence_key: i64,
    pub evidence_type: String,
    pub source_record_id: Option<String>,
    pub source_url: Option<String>,
    pub payload: Option<Value>,
    pub dataset_key: Option<String>,
    pub support_strength: Option<f64>,
}

// ── Path-hop rows ────────────────────────────────────────────────────────────
// Each carries the claim key, strength, dataset, and distinct evidence keys
// for every hop so the scoring policy can rank without further queries.

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DrugAeHopRow {
    pub drug_name: String,
    pub ae_key: i64,
    pub ae_label: String,
    pub frequency: Option<f64>,
    pub claim_key: i64,
    pub strength_score: Option<f64>,
    pub dataset_key: Option<String>,
    pub evidence_keys: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GenePathwayHopRow {
    pub drug_name: String,
    pub gene_key: i64,
    pub gene_symbol: String,
    pub pathway_key: i64,
    pub pathway_label: String,
    pub target_claim_key: i64,
    pub target_strength: Option<f64>,
    pub target_dataset: Option<String>,
    pub target_evidence_keys: Vec<i64>,
    pub pathway_claim_key: i64,
    pub pathway_strength: Option<f64>,
    pub pathway_dataset: Option<String>,
    pub pathway_evidence_keys: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GeneDiseaseHopRow {
    pub drug_name: String,
    pub gene_key: i64,
    pub gene_symbol: String,
    pub disease_key: i64,
    pub disease_label: String,
    pub target_claim_key: i64,
    pub target_strength: Option<f64>,
    pub target_dataset: Option<String>,
    pub target_evidence_keys: Vec<i64>,
    pub disease_claim_key: i64,
    pub disease_strength: Option<f64>,
    pub disease_dataset: Option<String>,
    pub disease_evidence_keys: Vec<i64>,
}

/// Claim linking a pathway or disease node to an adverse event.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AeLinkRow {
    pub ae_key: i64,
    pub ae_label: String,
    pub claim_key: i64,
    pub strength_score: Option<f64>,
    pub dataset_key: Option<String>,
    pub evidence_keys: Vec<i64>,
}
