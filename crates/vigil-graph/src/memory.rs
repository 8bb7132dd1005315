//! In-memory `GraphStore` used by the test suites.
//!
//! Seed builders mirror the ingest model: every relationship is a claim owned
//! by an entity, linked to its other entities and to at least one evidence
//! record. A query counter lets tests assert that a code path issued zero
//! store queries.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GraphError;
use crate::rows::*;
use crate::store::{EntityKind, GraphStore};

#[derive(Debug, Clone)]
struct MemClaim {
    claim_key: i64,
    claim_type: String,
    polarity: Option<i16>,
    strength: Option<f64>,
    dataset: Option<String>,
    statement: Option<Value>,
    source_record_id: Option<String>,
    evidence: Vec<EvidenceRow>,
}

#[derive(Debug, Clone)]
struct PathwayRec {
    pathway_key: i64,
    label: String,
    reactome_id: Option<String>,
}

#[derive(Default)]
pub struct MemoryGraph {
    drugs: Vec<DrugRow>,
    genes: Vec<GeneRow>,
    diseases: Vec<DiseaseRow>,
    pathways: Vec<PathwayRec>,
    aes: Vec<AdverseEventRow>,

    claims: Vec<MemClaim>,
    owners: Vec<(EntityKind, i64, i64)>,
    claim_genes: Vec<(i64, i64, Option<String>, Option<String>)>,
    claim_diseases: Vec<(i64, i64)>,
    claim_pathways: Vec<(i64, i64)>,
    claim_aes: Vec<(i64, i64, Option<f64>, Option<String>)>,

    next_claim: i64,
    next_evidence: i64,
    query_count: AtomicU64,
}

fn desc_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self { next_claim: 1000, next_evidence: 9000, ..Self::default() }
    }

    /// Queries issued through the `GraphStore` trait so far.
    pub fn queries_issued(&self) -> u64 {
        self.query_count.load(AtomicOrdering::SeqCst)
    }

    fn bump(&self) {
        self.query_count.fetch_add(1, AtomicOrdering::SeqCst);
    }

    // ── Seeding ─────────────────────────────────────────────────────────────

    pub fn add_drug(&mut self, drug_key: i64, name: &str) {
        self.drugs.push(DrugRow {
            drug_key,
            preferred_name: name.to_string(),
            drugcentral_id: None,
            chembl_id: None,
            pubchem_cid: None,
            inchi_key: None,
        });
    }

    pub fn add_drug_row(&mut self, row: DrugRow) {
        self.drugs.push(row);
    }

    pub fn add_gene(&mut self, gene_key: i64, symbol: &str) {
        self.genes.push(GeneRow {
            gene_key,
            symbol: symbol.to_string(),
            hgnc_id: None,
            ensembl_id: None,
            uniprot_id: None,
        });
    }

    pub fn add_gene_row(&mut self, row: GeneRow) {
        self.genes.push(row);
    }

    pub fn add_disease(&mut self, disease_key: i64, label: &str) {
        self.diseases.push(DiseaseRow {
            disease_key,
            label: label.to_string(),
            ontology_id: None,
        });
    }

    pub fn add_disease_row(&mut self, row: DiseaseRow) {
        self.diseases.push(row);
    }

    pub fn add_pathway(&mut self, pathway_key: i64, label: &str) {
        self.pathways.push(PathwayRec {
            pathway_key,
            label: label.to_string(),
            reactome_id: None,
        });
    }

    pub fn add_adverse_event(&mut self, ae_key: i64, label: &str) {
        self.aes.push(AdverseEventRow {
            ae_key,
            ae_label: label.to_string(),
            meddra_code: None,
        });
    }

    pub fn add_adverse_event_row(&mut self, row: AdverseEventRow) {
        self.aes.push(row);
    }

    fn new_claim(
        &mut self,
        claim_type: &str,
        strength: Option<f64>,
        dataset: &str,
        statement: Option<Value>,
    ) -> i64 {
        self.next_claim += 1;
        let claim_key = self.next_claim;
        self.next_evidence += 1;
        let evidence = EvidenceRow {
            evidence_key: self.next_evidence,
            evidence_type: "source_record".to_string(),
            source_record_id: Some(format!("{dataset}:{claim_key}")),
            source_url: None,
            payload: None,
            dataset_key: Some(dataset.to_string()),
            support_strength: strength,
        };
        self.claims.push(MemClaim {
            claim_key,
            claim_type: claim_type.to_string(),
            polarity: Some(1),
            strength,
            dataset: Some(dataset.to_string()),
            statement,
            source_record_id: Some(format!("{dataset}:{claim_key}")),
            evidence: vec![evidence],
        });
        claim_key
    }

    /// Attach one more distinct evidence record to an existing claim.
    pub fn add_evidence_to_claim(&mut self, claim_key: i64, dataset: &str) -> i64 {
        self.next_evidence += 1;
        let evidence_key = self.next_evidence;
        if let Some(claim) = self.claims.iter_mut().find(|c| c.claim_key == claim_key) {
            claim.evidence.push(EvidenceRow {
                evidence_key,
                evidence_type: "source_record".to_string(),
                source_record_id: Some(format!("{dataset}:{evidence_key}")),
                source_url: None,
                payload: None,
                dataset_key: Some(dataset.to_string()),
                support_strength: None,
            });
        }
        evidence_key
    }

    pub fn add_target_claim(
        &mut self,
        drug_key: i64,
        gene_key: i64,
        strength: Option<f64>,
        dataset: &str,
    ) -> i64 {
        let claim_key = self.new_claim("DRUG_TARGET", strength, dataset, None);
        self.owners.push((EntityKind::Drug, drug_key, claim_key));
        self.claim_genes
            .push((claim_key, gene_key, Some("binds".to_string()), None));
        claim_key
    }

    pub fn add_pathway_claim(&mut self, gene_key: i64, pathway_key: i64, dataset: &str) -> i64 {
        let claim_key = self.new_claim("GENE_PATHWAY", None, dataset, None);
        self.owners.push((EntityKind::Gene, gene_key, claim_key));
        self.claim_pathways.push((claim_key, pathway_key));
        claim_key
    }

    pub fn add_gene_disease_claim(
        &mut self,
        gene_key: i64,
        disease_key: i64,
        score: Option<f64>,
        dataset: &str,
    ) -> i64 {
        let claim_key = self.new_claim("GENE_DISEASE", score, dataset, None);
        self.owners.push((EntityKind::Gene, gene_key, claim_key));
        self.claim_diseases.push((claim_key, disease_key));
        claim_key
    }

    pub fn add_ae_claim(
        &mut self,
        drug_key: i64,
        ae_key: i64,
        frequency: Option<f64>,
        dataset: &str,
    ) -> i64 {
        let claim_key = self.new_claim("DRUG_AE_LABEL", frequency, dataset, None);
        self.owners.push((EntityKind::Drug, drug_key, claim_key));
        self.claim_aes
            .push((claim_key, ae_key, frequency, Some("listed".to_string())));
        claim_key
    }

    pub fn add_faers_claim(
        &mut self,
        drug_key: i64,
        ae_key: i64,
        statement: Value,
        strength: Option<f64>,
    ) -> i64 {
        let claim_key = self.new_claim("DRUG_AE_FAERS", strength, "faers", Some(statement));
        self.owners.push((EntityKind::Drug, drug_key, claim_key));
        self.claim_aes.push((claim_key, ae_key, None, None));
        claim_key
    }

    pub fn add_label_claim(&mut self, drug_key: i64, statement: Value, payload: Value) -> i64 {
        let claim_key = self.new_claim("DRUG_LABEL", None, "openfda", Some(statement));
        self.owners.push((EntityKind::Drug, drug_key, claim_key));
        if let Some(claim) = self.claims.iter_mut().find(|c| c.claim_key == claim_key) {
            if let Some(first) = claim.evidence.first_mut() {
                first.payload = Some(payload);
            }
        }
        claim_key
    }

    pub fn add_interaction_claim(
        &mut self,
        gene_a: i64,
        gene_b: i64,
        score: Option<f64>,
        dataset: &str,
    ) -> i64 {
        let claim_key = self.new_claim("GENE_GENE_STRING", score, dataset, None);
        self.owners.push((EntityKind::Gene, gene_a, claim_key));
        self.claim_genes.push((claim_key, gene_a, None, None));
        self.claim_genes.push((claim_key, gene_b, None, None));
        claim_key
    }

    pub fn add_disease_ae_claim(
        &mut self,
        disease_key: i64,
        ae_key: i64,
        strength: Option<f64>,
        dataset: &str,
    ) -> i64 {
        let claim_key = self.new_claim("DISEASE_AE", strength, dataset, None);
        self.owners.push((EntityKind::Disease, disease_key, claim_key));
        self.claim_diseases.push((claim_key, disease_key));
        self.claim_aes.push((claim_key, ae_key, None, None));
        claim_key
    }

    pub fn add_pathway_ae_claim(
        &mut self,
        pathway_key: i64,
        ae_key: i64,
        strength: Option<f64>,
        dataset: &str,
    ) -> i64 {
        let claim_key = self.new_claim("PATHWAY_AE", strength, dataset, None);
        self.owners.push((EntityKind::Pathway, pathway_key, claim_key));
        self.claim_pathways.push((claim_key, pathway_key));
        self.claim_aes.push((claim_key, ae_key, None, None));
        claim_key
    }

    // ── Internal lookups ────────────────────────────────────────────────────

    fn claim_by_key(&self, claim_key: i64) -> Option<&MemClaim> {
        self.claims.iter().find(|c| c.claim_key == claim_key)
    }

    fn ae_label(&self, ae_key: i64) -> String {
        self.aes
            .iter()
            .find(|a| a.ae_key == ae_key)
            .map(|a| a.ae_label.clone())
            .unwrap_or_default()
    }

    fn gene_symbol(&self, gene_key: i64) -> String {
        self.genes
            .iter()
            .find(|g| g.gene_key == gene_key)
            .map(|g| g.symbol.clone())
            .unwrap_or_default()
    }

    fn owned_claims(&self, kind: EntityKind, entity_key: i64) -> Vec<&MemClaim> {
        self.owners
            .iter()
            .filter(|(k, key, _)| *k == kind && *key == entity_key)
            .filter_map(|(_, _, claim_key)| self.claim_by_key(*claim_key))
            .collect()
    }

    fn evidence_keys(&self, claim: &MemClaim) -> Vec<i64> {
        claim.evidence.iter().map(|e| e.evidence_key).collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ping(&self) -> Result<(), GraphError> {
        Ok(())
    }

    async fn drugs_by_name(&self, name_lower: &str) -> Result<Vec<DrugRow>, GraphError> {
        self.bump();
        Ok(self
            .drugs
            .iter()
            .filter(|d| d.preferred_name.to_lowercase() == name_lower)
            .cloned()
            .collect())
    }

    async fn drugs_by_xref(&self, external_id: &str) -> Result<Vec<DrugRow>, GraphError> {
        self.bump();
        Ok(self
            .drugs
            .iter()
            .filter(|d| {
                [&d.drugcentral_id, &d.chembl_id, &d.pubchem_cid, &d.inchi_key]
                    .iter()
                    .any(|x| x.as_deref() == Some(external_id))
            })
            .cloned()
            .collect())
    }

    async fn drugs_by_name_fragment(
        &self,
        fragment_lower: &str,
    ) -> Result<Vec<DrugRow>, GraphError> {
        self.bump();
        let mut rows: Vec<DrugRow> = self
            .drugs
            .iter()
            .filter(|d| d.preferred_name.to_lowercase().contains(fragment_lower))
            .cloned()
            .collect();
        rows.sort_by_key(|d| (d.preferred_name.len(), d.drug_key));
        rows.truncate(25);
        Ok(rows)
    }

    async fn genes_by_symbol(&self, symbol_upper: &str) -> Result<Vec<GeneRow>, GraphError> {
        self.bump();
        Ok(self
            .genes
            .iter()
            .filter(|g| g.symbol.to_uppercase() == symbol_upper)
            .cloned()
            .collect())
    }

    async fn genes_by_hgnc(&self, hgnc_id: &str) -> Result<Vec<GeneRow>, GraphError> {
        self.bump();
        Ok(self
            .genes
            .iter()
            .filter(|g| g.hgnc_id.as_deref() == Some(hgnc_id))
            .cloned()
            .collect())
    }

    async fn diseases_by_label(&self, label_lower: &str) -> Result<Vec<DiseaseRow>, GraphError> {
        self.bump();
        Ok(self
            .diseases
            .iter()
            .filter(|d| d.label.to_lowercase() == label_lower)
            .cloned()
            .collect())
    }

    async fn diseases_by_ontology_id(
        &self,
        ontology_id: &str,
    ) -> Result<Vec<DiseaseRow>, GraphError> {
        self.bump();
        Ok(self
            .diseases
            .iter()
            .filter(|d| d.ontology_id.as_deref() == Some(ontology_id))
            .cloned()
            .collect())
    }

    async fn diseases_by_label_fragment(
        &self,
        fragment_lower: &str,
    ) -> Result<Vec<DiseaseRow>, GraphError> {
        self.bump();
        let mut rows: Vec<DiseaseRow> = self
            .diseases
            .iter()
            .filter(|d| d.label.to_lowercase().contains(fragment_lower))
            .cloned()
            .collect();
        rows.sort_by_key(|d| (d.label.len(), d.disease_key));
        rows.truncate(25);
        Ok(rows)
    }

    async fn adverse_events_by_label(
        &self,
        label_lower: &str,
    ) -> Result<Vec<AdverseEventRow>, GraphError> {
        self.bump();
        Ok(self
            .aes
            .iter()
            .filter(|a| a.ae_label.to_lowercase() == label_lower)
            .cloned()
            .collect())
    }

    async fn adverse_events_by_code(&self, code: &str) -> Result<Vec<AdverseEventRow>, GraphError> {
        self.bump();
        Ok(self
            .aes
            .iter()
            .filter(|a| a.meddra_code.as_deref() == Some(code))
            .cloned()
            .collect())
    }

    async fn adverse_events_by_label_fragment(
        &self,
        fragment_lower: &str,
    ) -> Result<Vec<AdverseEventRow>, GraphError> {
        self.bump();
        let mut rows: Vec<AdverseEventRow> = self
            .aes
            .iter()
            .filter(|a| a.ae_label.to_lowercase().contains(fragment_lower))
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.ae_label.len(), a.ae_key));
        rows.truncate(25);
        Ok(rows)
    }

    async fn drug(&self, drug_key: i64) -> Result<Option<DrugRow>, GraphError> {
        self.bump();
        Ok(self.drugs.iter().find(|d| d.drug_key == drug_key).cloned())
    }

    async fn drug_targets(&self, drug_key: i64) -> Result<Vec<TargetRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for claim in self.owned_claims(EntityKind::Drug, drug_key) {
            if claim.claim_type != "DRUG_TARGET" {
                continue;
            }
            for (_, gene_key, relation, effect) in
                self.claim_genes.iter().filter(|(c, _, _, _)| *c == claim.claim_key)
            {
                rows.push(TargetRow {
                    gene_key: *gene_key,
                    gene_symbol: self.gene_symbol(*gene_key),
                    relation: relation.clone(),
                    effect: effect.clone(),
                    claim_key: claim.claim_key,
                    strength_score: claim.strength,
                    dataset_key: claim.dataset.clone(),
                });
            }
        }
        Ok(rows)
    }

    async fn gene_pathways(&self, gene_key: i64) -> Result<Vec<GenePathwayRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for claim in self.owned_claims(EntityKind::Gene, gene_key) {
            if claim.claim_type != "GENE_PATHWAY" {
                continue;
            }
            for (_, pathway_key) in
                self.claim_pathways.iter().filter(|(c, _)| *c == claim.claim_key)
            {
                if let Some(p) = self.pathways.iter().find(|p| p.pathway_key == *pathway_key) {
                    rows.push(GenePathwayRow {
                        pathway_key: p.pathway_key,
                        pathway_label: p.label.clone(),
                        reactome_id: p.reactome_id.clone(),
                        claim_key: claim.claim_key,
                        dataset_key: claim.dataset.clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn gene_diseases(
        &self,
        gene_key: i64,
        min_score: f64,
    ) -> Result<Vec<GeneDiseaseRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for claim in self.owned_claims(EntityKind::Gene, gene_key) {
            if claim.claim_type != "GENE_DISEASE" {
                continue;
            }
            if let Some(score) = claim.strength {
                if score < min_score {
                    continue;
                }
            }
            for (_, disease_key) in
                self.claim_diseases.iter().filter(|(c, _)| *c == claim.claim_key)
            {
                if let Some(d) = self.diseases.iter().find(|d| d.disease_key == *disease_key) {
                    rows.push(GeneDiseaseRow {
                        disease_key: d.disease_key,
                        disease_label: d.label.clone(),
                        ontology_id: d.ontology_id.clone(),
                        score: claim.strength,
                        claim_key: claim.claim_key,
                        dataset_key: claim.dataset.clone(),
                    });
                }
            }
        }
        rows.sort_by(|a, b| desc_nulls_last(a.score, b.score));
        Ok(rows)
    }

    async fn disease_genes(
        &self,
        disease_key: i64,
        sources: Option<&[String]>,
        min_score: f64,
        limit: i64,
    ) -> Result<Vec<DiseaseGeneRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for (claim_key, _) in self.claim_diseases.iter().filter(|(_, d)| *d == disease_key) {
            let Some(claim) = self.claim_by_key(*claim_key) else { continue };
            if claim.claim_type != "GENE_DISEASE" {
                continue;
            }
            if let Some(score) = claim.strength {
                if score < min_score {
                    continue;
                }
            }
            if let Some(allowed) = sources {
                let dataset = claim.dataset.clone().unwrap_or_default();
                if !allowed.contains(&dataset) {
                    continue;
                }
            }
            for (_, gene_key, _) in self
                .owners
                .iter()
                .filter(|(kind, _, c)| *kind == EntityKind::Gene && c == claim_key)
            {
                rows.push(DiseaseGeneRow {
                    gene_key: *gene_key,
                    gene_symbol: self.gene_symbol(*gene_key),
                    score: claim.strength,
                    claim_key: claim.claim_key,
                    dataset_key: claim.dataset.clone(),
                });
            }
        }
        rows.sort_by(|a, b| desc_nulls_last(a.score, b.score));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn gene_interactors(
        &self,
        gene_key: i64,
        min_score: f64,
        limit: i64,
    ) -> Result<Vec<InteractorRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for (claim_key, member, _, _) in
            self.claim_genes.iter().filter(|(_, g, _, _)| *g == gene_key)
        {
            let Some(claim) = self.claim_by_key(*claim_key) else { continue };
            if claim.claim_type != "GENE_GENE_STRING" {
                continue;
            }
            if let Some(score) = claim.strength {
                if score < min_score {
                    continue;
                }
            }
            for (_, partner, _, _) in self
                .claim_genes
                .iter()
                .filter(|(c, g, _, _)| c == claim_key && g != member)
            {
                rows.push(InteractorRow {
                    partner_key: *partner,
                    partner_symbol: self.gene_symbol(*partner),
                    score: claim.strength,
                    claim_key: claim.claim_key,
                    dataset_key: claim.dataset.clone(),
                });
            }
        }
        rows.sort_by(|a, b| desc_nulls_last(a.score, b.score));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn drug_adverse_events(
        &self,
        drug_key: i64,
        min_frequency: Option<f64>,
        limit: i64,
    ) -> Result<Vec<DrugAeRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for claim in self.owned_claims(EntityKind::Drug, drug_key) {
            if claim.claim_type != "DRUG_AE_LABEL" {
                continue;
            }
            for (_, ae_key, frequency, relation) in
                self.claim_aes.iter().filter(|(c, _, _, _)| *c == claim.claim_key)
            {
                if let (Some(min), Some(freq)) = (min_frequency, *frequency) {
                    if freq < min {
                        continue;
                    }
                }
                rows.push(DrugAeRow {
                    ae_key: *ae_key,
                    ae_label: self.ae_label(*ae_key),
                    frequency: *frequency,
                    relation: relation.clone(),
                    claim_key: claim.claim_key,
                    dataset_key: claim.dataset.clone(),
                });
            }
        }
        rows.sort_by(|a, b| desc_nulls_last(a.frequency, b.frequency));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn drug_label_claims(&self, drug_key: i64) -> Result<Vec<LabelClaimRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for claim in self.owned_claims(EntityKind::Drug, drug_key) {
            if claim.claim_type != "DRUG_LABEL" {
                continue;
            }
            for evidence in &claim.evidence {
                if evidence.payload.is_some() {
                    rows.push(LabelClaimRow {
                        claim_key: claim.claim_key,
                        statement: claim.statement.clone(),
                        payload: evidence.payload.clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn drug_faers_claims(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<FaersClaimRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for claim in self.owned_claims(EntityKind::Drug, drug_key) {
            if claim.claim_type != "DRUG_AE_FAERS" {
                continue;
            }
            for (_, ae_key, _, _) in
                self.claim_aes.iter().filter(|(c, _, _, _)| *c == claim.claim_key)
            {
                rows.push(FaersClaimRow {
                    ae_key: *ae_key,
                    ae_label: self.ae_label(*ae_key),
                    claim_key: claim.claim_key,
                    strength_score: claim.strength,
                    statement: claim.statement.clone(),
                });
            }
        }
        rows.sort_by(|a, b| desc_nulls_last(a.strength_score, b.strength_score));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn claim(&self, claim_key: i64) -> Result<Option<ClaimRow>, GraphError> {
        self.bump();
        Ok(self.claim_by_key(claim_key).map(|c| ClaimRow {
            claim_key: c.claim_key,
            claim_type: c.claim_type.clone(),
            polarity: c.polarity,
            strength_score: c.strength,
            dataset_key: c.dataset.clone(),
            source_record_id: c.source_record_id.clone(),
            statement: c.statement.clone(),
        }))
    }

    async fn claim_evidence(&self, claim_key: i64) -> Result<Vec<EvidenceRow>, GraphError> {
        self.bump();
        Ok(self
            .claim_by_key(claim_key)
            .map(|c| c.evidence.clone())
            .unwrap_or_default())
    }

    async fn entity_claims(
        &self,
        kind: EntityKind,
        entity_key: i64,
        claim_types: Option<&[String]>,
        limit: i64,
    ) -> Result<Vec<ClaimRow>, GraphError> {
        self.bump();
        let mut rows: Vec<ClaimRow> = self
            .owned_claims(kind, entity_key)
            .into_iter()
            .filter(|c| {
                claim_types
                    .map(|types| types.iter().any(|t| *t == c.claim_type))
                    .unwrap_or(true)
            })
            .map(|c| ClaimRow {
                claim_key: c.claim_key,
                claim_type: c.claim_type.clone(),
                polarity: c.polarity,
                strength_score: c.strength,
                dataset_key: c.dataset.clone(),
                source_record_id: c.source_record_id.clone(),
                statement: c.statement.clone(),
            })
            .collect();
        rows.sort_by(|a, b| desc_nulls_last(a.strength_score, b.strength_score));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn drug_ae_hops(
        &self,
        drug_key: i64,
        ae_key: Option<i64>,
    ) -> Result<Vec<DrugAeHopRow>, GraphError> {
        self.bump();
        let drug_name = self
            .drugs
            .iter()
            .find(|d| d.drug_key == drug_key)
            .map(|d| d.preferred_name.clone())
            .unwrap_or_default();
        let mut rows = Vec::new();
        for claim in self.owned_claims(EntityKind::Drug, drug_key) {
            for (_, hop_ae, frequency, _) in
                self.claim_aes.iter().filter(|(c, _, _, _)| *c == claim.claim_key)
            {
                if let Some(wanted) = ae_key {
                    if *hop_ae != wanted {
                        continue;
                    }
                }
                rows.push(DrugAeHopRow {
                    drug_name: drug_name.clone(),
                    ae_key: *hop_ae,
                    ae_label: self.ae_label(*hop_ae),
                    frequency: *frequency,
                    claim_key: claim.claim_key,
                    strength_score: claim.strength,
                    dataset_key: claim.dataset.clone(),
                    evidence_keys: self.evidence_keys(claim),
                });
            }
        }
        Ok(rows)
    }

    async fn drug_gene_pathway_hops(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<GenePathwayHopRow>, GraphError> {
        self.bump();
        let drug_name = self
            .drugs
            .iter()
            .find(|d| d.drug_key == drug_key)
            .map(|d| d.preferred_name.clone())
            .unwrap_or_default();
        let mut rows = Vec::new();
        for target in self.owned_claims(EntityKind::Drug, drug_key) {
            if target.claim_type != "DRUG_TARGET" {
                continue;
            }
            for (_, gene_key, _, _) in
                self.claim_genes.iter().filter(|(c, _, _, _)| *c == target.claim_key)
            {
                for pathway_claim in self.owned_claims(EntityKind::Gene, *gene_key) {
                    if pathway_claim.claim_type != "GENE_PATHWAY" {
                        continue;
                    }
                    for (_, pathway_key) in self
                        .claim_pathways
                        .iter()
                        .filter(|(c, _)| *c == pathway_claim.claim_key)
                    {
                        let Some(p) =
                            self.pathways.iter().find(|p| p.pathway_key == *pathway_key)
                        else {
                            continue;
                        };
                        rows.push(GenePathwayHopRow {
                            drug_name: drug_name.clone(),
                            gene_key: *gene_key,
                            gene_symbol: self.gene_symbol(*gene_key),
                            pathway_key: p.pathway_key,
                            pathway_label: p.label.clone(),
                            target_claim_key: target.claim_key,
                            target_strength: target.strength,
                            target_dataset: target.dataset.clone(),
                            target_evidence_keys: self.evidence_keys(target),
                            pathway_claim_key: pathway_claim.claim_key,
                            pathway_strength: pathway_claim.strength,
                            pathway_dataset: pathway_claim.dataset.clone(),
                            pathway_evidence_keys: self.evidence_keys(pathway_claim),
                        });
                    }
                }
            }
        }
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn drug_gene_disease_hops(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<GeneDiseaseHopRow>, GraphError> {
        self.bump();
        let drug_name = self
            .drugs
            .iter()
            .find(|d| d.drug_key == drug_key)
            .map(|d| d.preferred_name.clone())
            .unwrap_or_default();
        let mut rows = Vec::new();
        for target in self.owned_claims(EntityKind::Drug, drug_key) {
            if target.claim_type != "DRUG_TARGET" {
                continue;
            }
            for (_, gene_key, _, _) in
                self.claim_genes.iter().filter(|(c, _, _, _)| *c == target.claim_key)
            {
                for disease_claim in self.owned_claims(EntityKind::Gene, *gene_key) {
                    if disease_claim.claim_type != "GENE_DISEASE" {
                        continue;
                    }
                    for (_, disease_key) in self
                        .claim_diseases
                        .iter()
                        .filter(|(c, _)| *c == disease_claim.claim_key)
                    {
                        let Some(d) =
                            self.diseases.iter().find(|d| d.disease_key == *disease_key)
                        else {
                            continue;
                        };
                        rows.push(GeneDiseaseHopRow {
                            drug_name: drug_name.clone(),
                            gene_key: *gene_key,
                            gene_symbol: self.gene_symbol(*gene_key),
                            disease_key: d.disease_key,
                            disease_label: d.label.clone(),
                            target_claim_key: target.claim_key,
                            target_strength: target.strength,
                            target_dataset: target.dataset.clone(),
                            target_evidence_keys: self.evidence_keys(target),
                            disease_claim_key: disease_claim.claim_key,
                            disease_strength: disease_claim.strength,
                            disease_dataset: disease_claim.dataset.clone(),
                            disease_evidence_keys: self.evidence_keys(disease_claim),
                        });
                    }
                }
            }
        }
        rows.sort_by(|a, b| desc_nulls_last(a.disease_strength, b.disease_strength));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn pathway_ae_links(
        &self,
        pathway_key: i64,
        ae_key: i64,
    ) -> Result<Vec<AeLinkRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for (claim_key, _) in self.claim_pathways.iter().filter(|(_, p)| *p == pathway_key) {
            let Some(claim) = self.claim_by_key(*claim_key) else { continue };
            for (_, linked_ae, _, _) in self
                .claim_aes
                .iter()
                .filter(|(c, a, _, _)| c == claim_key && *a == ae_key)
            {
                rows.push(AeLinkRow {
                    ae_key: *linked_ae,
                    ae_label: self.ae_label(*linked_ae),
                    claim_key: claim.claim_key,
                    strength_score: claim.strength,
                    dataset_key: claim.dataset.clone(),
                    evidence_keys: self.evidence_keys(claim),
                });
            }
        }
        Ok(rows)
    }

    async fn disease_ae_links(
        &self,
        disease_key: i64,
        ae_key: i64,
    ) -> Result<Vec<AeLinkRow>, GraphError> {
        self.bump();
        let mut rows = Vec::new();
        for (claim_key, _) in self.claim_diseases.iter().filter(|(_, d)| *d == disease_key) {
            let Some(claim) = self.claim_by_key(*claim_key) else { continue };
            for (_, linked_ae, _, _) in self
                .claim_aes
                .iter()
                .filter(|(c, a, _, _)| c == claim_key && *a == ae_key)
            {
                rows.push(AeLinkRow {
                    ae_key: *linked_ae,
                    ae_label: self.ae_label(*linked_ae),
                    claim_key: claim.claim_key,
                    strength_score: claim.strength,
                    dataset_key: claim.dataset.clone(),
                    evidence_keys: self.evidence_keys(claim),
                });
            }
        }
        Ok(rows)
    }
}
