//! PostgreSQL implementation of `GraphStore`.
//!
//! Every method is a fixed parameterised query against the `kg` schema.
//! The original SQL Server graph `MATCH` traversals are expressed here as
//! joins over the edge tables (`has_claim`, `claim_*`, `supported_by`).

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use vigil_common::config::DatabaseConfig;

use crate::error::GraphError;
use crate::rows::*;
use crate::store::{EntityKind, GraphStore};

/// Tables the startup probe requires in the `kg` schema.
const REQUIRED_TABLES: &[&str] = &[
    "drug",
    "gene",
    "disease",
    "pathway",
    "adverse_event",
    "claim",
    "evidence",
    "dataset",
    "has_claim",
    "claim_gene",
    "claim_disease",
    "claim_pathway",
    "claim_adverse_event",
    "supported_by",
];

/// Postgres-backed knowledge-graph gateway. Read-only by construction: this
/// crate contains no INSERT/UPDATE/DELETE statement.
#[derive(Clone)]
pub struct PgGraphStore {
    pool: PgPool,
}

impl PgGraphStore {
    /// Connect a pool and run the one-shot schema probe.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, GraphError> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.url())
            .await?;
        let store = Self { pool };
        store.probe_schema().await?;
        tracing::info!(
            host = %cfg.host,
            database = %cfg.name,
            pool_size = cfg.max_connections,
            "graph store connected"
        );
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One-shot probe: every required table must exist, or startup fails
    /// with `graph.schema_mismatch`.
    pub async fn probe_schema(&self) -> Result<(), GraphError> {
        let present: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'kg'",
        )
        .fetch_all(&self.pool)
        .await?;

        let missing: Vec<&str> = REQUIRED_TABLES
            .iter()
            .copied()
            .filter(|t| !present.iter().any(|p| p == t))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GraphError::SchemaMismatch(format!("kg.{}", missing.join(", kg."))))
        }
    }
}

#[async_trait]
impl GraphStore for PgGraphStore {
    async fn ping(&self) -> Result<(), GraphError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    // ── Resolution ──────────────────────────────────────────────────────────

    async fn drugs_by_name(&self, name_lower: &str) -> Result<Vec<DrugRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT drug_key, preferred_name, drugcentral_id, chembl_id, pubchem_cid, inchi_key \
             FROM kg.drug WHERE LOWER(preferred_name) = $1",
        )
        .bind(name_lower)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn drugs_by_xref(&self, external_id: &str) -> Result<Vec<DrugRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT drug_key, preferred_name, drugcentral_id, chembl_id, pubchem_cid, inchi_key \
             FROM kg.drug \
             WHERE drugcentral_id = $1 OR chembl_id = $1 OR pubchem_cid = $1 OR inchi_key = $1",
        )
        .bind(external_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn drugs_by_name_fragment(
        &self,
        fragment_lower: &str,
    ) -> Result<Vec<DrugRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT drug_key, preferred_name, drugcentral_id, chembl_id, pubchem_cid, inchi_key \
             FROM kg.drug WHERE LOWER(preferred_name) LIKE $1 \
             ORDER BY LENGTH(preferred_name), drug_key LIMIT 25",
        )
        .bind(format!("%{fragment_lower}%"))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn genes_by_symbol(&self, symbol_upper: &str) -> Result<Vec<GeneRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT gene_key, symbol, hgnc_id, ensembl_id, uniprot_id \
             FROM kg.gene WHERE UPPER(symbol) = $1",
        )
        .bind(symbol_upper)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn genes_by_hgnc(&self, hgnc_id: &str) -> Result<Vec<GeneRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT gene_key, symbol, hgnc_id, ensembl_id, uniprot_id \
             FROM kg.gene WHERE hgnc_id = $1",
        )
        .bind(hgnc_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn diseases_by_label(&self, label_lower: &str) -> Result<Vec<DiseaseRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT disease_key, label, ontology_id FROM kg.disease WHERE LOWER(label) = $1",
        )
        .bind(label_lower)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn diseases_by_ontology_id(
        &self,
        ontology_id: &str,
    ) -> Result<Vec<DiseaseRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT disease_key, label, ontology_id FROM kg.disease WHERE ontology_id = $1",
        )
        .bind(ontology_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn diseases_by_label_fragment(
        &self,
        fragment_lower: &str,
    ) -> Result<Vec<DiseaseRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT disease_key, label, ontology_id FROM kg.disease \
             WHERE LOWER(label) LIKE $1 ORDER BY LENGTH(label), disease_key LIMIT 25",
        )
        .bind(format!("%{fragment_lower}%"))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn adverse_events_by_label(
        &self,
        label_lower: &str,
    ) -> Result<Vec<AdverseEventRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT ae_key, ae_label, meddra_code FROM kg.adverse_event \
             WHERE LOWER(ae_label) = $1",
        )
        .bind(label_lower)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn adverse_events_by_code(
        &self,
        code: &str,
    ) -> Result<Vec<AdverseEventRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT ae_key, ae_label, meddra_code FROM kg.adverse_event WHERE meddra_code = $1",
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn adverse_events_by_label_fragment(
        &self,
        fragment_lower: &str,
    ) -> Result<Vec<AdverseEventRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT ae_key, ae_label, meddra_code FROM kg.adverse_event \
             WHERE LOWER(ae_label) LIKE $1 ORDER BY LENGTH(ae_label), ae_key LIMIT 25",
        )
        .bind(format!("%{fragment_lower}%"))
        .fetch_all(&self.pool)
        .await?)
    }

    // ── Entity lookup ───────────────────────────────────────────────────────

    async fn drug(&self, drug_key: i64) -> Result<Option<DrugRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT drug_key, preferred_name, drugcentral_id, chembl_id, pubchem_cid, inchi_key \
             FROM kg.drug WHERE drug_key = $1",
        )
        .bind(drug_key)
        .fetch_optional(&self.pool)
        .await?)
    }

    // ── Mechanism traversal ─────────────────────────────────────────────────

    async fn drug_targets(&self, drug_key: i64) -> Result<Vec<TargetRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT g.gene_key, g.symbol AS gene_symbol, cg.relation, cg.effect, \
                    c.claim_key, c.strength_score, d.dataset_key \
             FROM kg.has_claim hc \
             JOIN kg.claim c ON c.claim_key = hc.claim_key \
             JOIN kg.claim_gene cg ON cg.claim_key = c.claim_key \
             JOIN kg.gene g ON g.gene_key = cg.gene_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE hc.entity_kind = 'Drug' AND hc.entity_key = $1 \
               AND c.claim_type = 'DRUG_TARGET'",
        )
        .bind(drug_key)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn gene_pathways(&self, gene_key: i64) -> Result<Vec<GenePathwayRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT p.pathway_key, p.label AS pathway_label, p.reactome_id, \
                    c.claim_key, d.dataset_key \
             FROM kg.has_claim hc \
             JOIN kg.claim c ON c.claim_key = hc.claim_key \
             JOIN kg.claim_pathway cp ON cp.claim_key = c.claim_key \
             JOIN kg.pathway p ON p.pathway_key = cp.pathway_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE hc.entity_kind = 'Gene' AND hc.entity_key = $1",
        )
        .bind(gene_key)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn gene_diseases(
        &self,
        gene_key: i64,
        min_score: f64,
    ) -> Result<Vec<GeneDiseaseRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT dis.disease_key, dis.label AS disease_label, dis.ontology_id, \
                    c.strength_score AS score, c.claim_key, d.dataset_key \
             FROM kg.has_claim hc \
             JOIN kg.claim c ON c.claim_key = hc.claim_key \
             JOIN kg.claim_disease cd ON cd.claim_key = c.claim_key \
             JOIN kg.disease dis ON dis.disease_key = cd.disease_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE hc.entity_kind = 'Gene' AND hc.entity_key = $1 \
               AND c.claim_type = 'GENE_DISEASE' \
               AND (c.strength_score IS NULL OR c.strength_score >= $2) \
             ORDER BY c.strength_score DESC NULLS LAST",
        )
        .bind(gene_key)
        .bind(min_score)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn disease_genes(
        &self,
        disease_key: i64,
        sources: Option<&[String]>,
        min_score: f64,
        limit: i64,
    ) -> Result<Vec<DiseaseGeneRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT g.gene_key, g.symbol AS gene_symbol, \
                    c.strength_score AS score, c.claim_key, d.dataset_key \
             FROM kg.claim_disease cd \
             JOIN kg.claim c ON c.claim_key = cd.claim_key \
             JOIN kg.has_claim hc ON hc.claim_key = c.claim_key AND hc.entity_kind = 'Gene' \
             JOIN kg.gene g ON g.gene_key = hc.entity_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE cd.disease_key = $1 \
               AND c.claim_type = 'GENE_DISEASE' \
               AND ($2::text[] IS NULL OR d.dataset_key = ANY($2)) \
               AND (c.strength_score IS NULL OR c.strength_score >= $3) \
             ORDER BY c.strength_score DESC NULLS LAST \
             LIMIT $4",
        )
        .bind(disease_key)
        .bind(sources.map(<[String]>::to_vec))
        .bind(min_score)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn gene_interactors(
        &self,
        gene_key: i64,
        min_score: f64,
        limit: i64,
    ) -> Result<Vec<InteractorRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT g2.gene_key AS partner_key, g2.symbol AS partner_symbol, \
                    c.strength_score AS score, c.claim_key, d.dataset_key \
             FROM kg.claim_gene cg1 \
             JOIN kg.claim c ON c.claim_key = cg1.claim_key \
             JOIN kg.claim_gene cg2 \
               ON cg2.claim_key = c.claim_key AND cg2.gene_key <> cg1.gene_key \
             JOIN kg.gene g2 ON g2.gene_key = cg2.gene_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE cg1.gene_key = $1 \
               AND c.claim_type = 'GENE_GENE_STRING' \
               AND (c.strength_score IS NULL OR c.strength_score >= $2) \
             ORDER BY c.strength_score DESC NULLS LAST \
             LIMIT $3",
        )
        .bind(gene_key)
        .bind(min_score)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    // ── Adverse events ──────────────────────────────────────────────────────

    async fn drug_adverse_events(
        &self,
        drug_key: i64,
        min_frequency: Option<f64>,
        limit: i64,
    ) -> Result<Vec<DrugAeRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT ae.ae_key, ae.ae_label, cae.frequency, cae.relation, \
                    c.claim_key, d.dataset_key \
             FROM kg.has_claim hc \
             JOIN kg.claim c ON c.claim_key = hc.claim_key \
             JOIN kg.claim_adverse_event cae ON cae.claim_key = c.claim_key \
             JOIN kg.adverse_event ae ON ae.ae_key = cae.ae_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE hc.entity_kind = 'Drug' AND hc.entity_key = $1 \
               AND c.claim_type = 'DRUG_AE_LABEL' \
               AND ($2::float8 IS NULL OR cae.frequency IS NULL OR cae.frequency >= $2) \
             ORDER BY cae.frequency DESC NULLS LAST \
             LIMIT $3",
        )
        .bind(drug_key)
        .bind(min_frequency)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn drug_label_claims(&self, drug_key: i64) -> Result<Vec<LabelClaimRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT c.claim_key, c.statement, e.payload \
             FROM kg.has_claim hc \
             JOIN kg.claim c ON c.claim_key = hc.claim_key \
             JOIN kg.supported_by sb ON sb.claim_key = c.claim_key \
             JOIN kg.evidence e ON e.evidence_key = sb.evidence_key \
             WHERE hc.entity_kind = 'Drug' AND hc.entity_key = $1 \
               AND c.claim_type = 'DRUG_LABEL' AND e.payload IS NOT NULL",
        )
        .bind(drug_key)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn drug_faers_claims(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<FaersClaimRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT ae.ae_key, ae.ae_label, c.claim_key, c.strength_score, c.statement \
             FROM kg.has_claim hc \
             JOIN kg.claim c ON c.claim_key = hc.claim_key \
             JOIN kg.claim_adverse_event cae ON cae.claim_key = c.claim_key \
             JOIN kg.adverse_event ae ON ae.ae_key = cae.ae_key \
             WHERE hc.entity_kind = 'Drug' AND hc.entity_key = $1 \
               AND c.claim_type = 'DRUG_AE_FAERS' \
             ORDER BY c.strength_score DESC NULLS LAST \
             LIMIT $2",
        )
        .bind(drug_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    // ── Provenance ──────────────────────────────────────────────────────────

    async fn claim(&self, claim_key: i64) -> Result<Option<ClaimRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT c.claim_key, c.claim_type, c.polarity, c.strength_score, \
                    d.dataset_key, c.source_record_id, c.statement \
             FROM kg.claim c \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE c.claim_key = $1",
        )
        .bind(claim_key)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn claim_evidence(&self, claim_key: i64) -> Result<Vec<EvidenceRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT e.evidence_key, e.evidence_type, e.source_record_id, e.source_url, \
                    e.payload, d.dataset_key, sb.support_strength \
             FROM kg.supported_by sb \
             JOIN kg.evidence e ON e.evidence_key = sb.evidence_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = e.dataset_id \
             WHERE sb.claim_key = $1",
        )
        .bind(claim_key)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn entity_claims(
        &self,
        kind: EntityKind,
        entity_key: i64,
        claim_types: Option<&[String]>,
        limit: i64,
    ) -> Result<Vec<ClaimRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT c.claim_key, c.claim_type, c.polarity, c.strength_score, \
                    d.dataset_key, c.source_record_id, c.statement \
             FROM kg.has_claim hc \
             JOIN kg.claim c ON c.claim_key = hc.claim_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE hc.entity_kind = $1 AND hc.entity_key = $2 \
               AND ($3::text[] IS NULL OR c.claim_type = ANY($3)) \
             ORDER BY c.strength_score DESC NULLS LAST \
             LIMIT $4",
        )
        .bind(kind.as_str())
        .bind(entity_key)
        .bind(claim_types.map(<[String]>::to_vec))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    // ── Path hops ───────────────────────────────────────────────────────────

    async fn drug_ae_hops(
        &self,
        drug_key: i64,
        ae_key: Option<i64>,
    ) -> Result<Vec<DrugAeHopRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT dr.preferred_name AS drug_name, ae.ae_key, ae.ae_label, cae.frequency, \
                    c.claim_key, c.strength_score, d.dataset_key, \
                    COALESCE((SELECT array_agg(sb.evidence_key) FROM kg.supported_by sb \
                              WHERE sb.claim_key = c.claim_key), '{}'::bigint[]) AS evidence_keys \
             FROM kg.drug dr \
             JOIN kg.has_claim hc ON hc.entity_kind = 'Drug' AND hc.entity_key = dr.drug_key \
             JOIN kg.claim c ON c.claim_key = hc.claim_key \
             JOIN kg.claim_adverse_event cae ON cae.claim_key = c.claim_key \
             JOIN kg.adverse_event ae ON ae.ae_key = cae.ae_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE dr.drug_key = $1 AND ($2::bigint IS NULL OR ae.ae_key = $2)",
        )
        .bind(drug_key)
        .bind(ae_key)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn drug_gene_pathway_hops(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<GenePathwayHopRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT dr.preferred_name AS drug_name, \
                    g.gene_key, g.symbol AS gene_symbol, \
                    p.pathway_key, p.label AS pathway_label, \
                    tc.claim_key AS target_claim_key, tc.strength_score AS target_strength, \
                    td.dataset_key AS target_dataset, \
                    COALESCE((SELECT array_agg(sb.evidence_key) FROM kg.supported_by sb \
                              WHERE sb.claim_key = tc.claim_key), '{}'::bigint[]) AS target_evidence_keys, \
                    pc.claim_key AS pathway_claim_key, pc.strength_score AS pathway_strength, \
                    pd.dataset_key AS pathway_dataset, \
                    COALESCE((SELECT array_agg(sb.evidence_key) FROM kg.supported_by sb \
                              WHERE sb.claim_key = pc.claim_key), '{}'::bigint[]) AS pathway_evidence_keys \
             FROM kg.drug dr \
             JOIN kg.has_claim hc1 ON hc1.entity_kind = 'Drug' AND hc1.entity_key = dr.drug_key \
             JOIN kg.claim tc ON tc.claim_key = hc1.claim_key AND tc.claim_type = 'DRUG_TARGET' \
             JOIN kg.claim_gene cg ON cg.claim_key = tc.claim_key \
             JOIN kg.gene g ON g.gene_key = cg.gene_key \
             JOIN kg.has_claim hc2 ON hc2.entity_kind = 'Gene' AND hc2.entity_key = g.gene_key \
             JOIN kg.claim pc ON pc.claim_key = hc2.claim_key AND pc.claim_type = 'GENE_PATHWAY' \
             JOIN kg.claim_pathway cp ON cp.claim_key = pc.claim_key \
             JOIN kg.pathway p ON p.pathway_key = cp.pathway_key \
             LEFT JOIN kg.dataset td ON td.dataset_id = tc.dataset_id \
             LEFT JOIN kg.dataset pd ON pd.dataset_id = pc.dataset_id \
             WHERE dr.drug_key = $1 \
             LIMIT $2",
        )
        .bind(drug_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn drug_gene_disease_hops(
        &self,
        drug_key: i64,
        limit: i64,
    ) -> Result<Vec<GeneDiseaseHopRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT dr.preferred_name AS drug_name, \
                    g.gene_key, g.symbol AS gene_symbol, \
                    dis.disease_key, dis.label AS disease_label, \
                    tc.claim_key AS target_claim_key, tc.strength_score AS target_strength, \
                    td.dataset_key AS target_dataset, \
                    COALESCE((SELECT array_agg(sb.evidence_key) FROM kg.supported_by sb \
                              WHERE sb.claim_key = tc.claim_key), '{}'::bigint[]) AS target_evidence_keys, \
                    dc.claim_key AS disease_claim_key, dc.strength_score AS disease_strength, \
                    dd.dataset_key AS disease_dataset, \
                    COALESCE((SELECT array_agg(sb.evidence_key) FROM kg.supported_by sb \
                              WHERE sb.claim_key = dc.claim_key), '{}'::bigint[]) AS disease_evidence_keys \
             FROM kg.drug dr \
             JOIN kg.has_claim hc1 ON hc1.entity_kind = 'Drug' AND hc1.entity_key = dr.drug_key \
             JOIN kg.claim tc ON tc.claim_key = hc1.claim_key AND tc.claim_type = 'DRUG_TARGET' \
             JOIN kg.claim_gene cg ON cg.claim_key = tc.claim_key \
             JOIN kg.gene g ON g.gene_key = cg.gene_key \
             JOIN kg.has_claim hc2 ON hc2.entity_kind = 'Gene' AND hc2.entity_key = g.gene_key \
             JOIN kg.claim dc ON dc.claim_key = hc2.claim_key AND dc.claim_type = 'GENE_DISEASE' \
             JOIN kg.claim_disease cd ON cd.claim_key = dc.claim_key \
             JOIN kg.disease dis ON dis.disease_key = cd.disease_key \
             LEFT JOIN kg.dataset td ON td.dataset_id = tc.dataset_id \
             LEFT JOIN kg.dataset dd ON dd.dataset_id = dc.dataset_id \
             WHERE dr.drug_key = $1 \
             ORDER BY dc.strength_score DESC NULLS LAST \
             LIMIT $2",
        )
        .bind(drug_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn pathway_ae_links(
        &self,
        pathway_key: i64,
        ae_key: i64,
    ) -> Result<Vec<AeLinkRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT ae.ae_key, ae.ae_label, c.claim_key, c.strength_score, d.dataset_key, \
                    COALESCE((SELECT array_agg(sb.evidence_key) FROM kg.supported_by sb \
                              WHERE sb.claim_key = c.claim_key), '{}'::bigint[]) AS evidence_keys \
             FROM kg.claim_pathway cp \
             JOIN kg.claim c ON c.claim_key = cp.claim_key \
             JOIN kg.claim_adverse_event cae ON cae.claim_key = c.claim_key \
             JOIN kg.adverse_event ae ON ae.ae_key = cae.ae_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE cp.pathway_key = $1 AND cae.ae_key = $2",
        )
        .bind(pathway_key)
        .bind(ae_key)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn disease_ae_links(
        &self,
        disease_key: i64,
        ae_key: i64,
    ) -> Result<Vec<AeLinkRow>, GraphError> {
        Ok(sqlx::query_as(
            "SELECT ae.ae_key, ae.ae_label, c.claim_key, c.strength_score, d.dataset_key, \
                    COALESCE((SELECT array_agg(sb.evidence_key) FROM kg.supported_by sb \
                              WHERE sb.claim_key = c.claim_key), '{}'::bigint[]) AS evidence_keys \
             FROM kg.claim_disease cd \
             JOIN kg.claim c ON c.claim_key = cd.claim_key \
             JOIN kg.claim_adverse_event cae ON cae.claim_key = c.claim_key \
             JOIN kg.adverse_event ae ON ae.ae_key = cae.ae_key \
             LEFT JOIN kg.dataset d ON d.dataset_id = c.dataset_id \
             WHERE cd.disease_key = $1 AND cae.ae_key = $2",
        )
        .bind(disease_key)
        .bind(ae_key)
        .fetch_all(&self.pool)
        .await?)
    }
}
