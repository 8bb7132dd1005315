//! Provenance tools — the audit backbone.
//!
//! Every other tool returns claim keys; these two let a caller drill from a
//! claim key down to the evidence records and datasets that support it.

use serde::Serialize;
use serde_json::Value;

use vigil_graph::{EntityKind, GraphStore};

use crate::error::{check_positive, ToolError};

#[derive(Debug, Clone, Serialize)]
pub struct ClaimEvidence {
    pub evidence_key: i64,
    pub evidence_type: String,
    pub source_record_id: Option<String>,
    pub source_url: Option<String>,
    pub payload: Option<Value>,
    pub support_strength: Option<f64>,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimDetail {
    pub claim_key: i64,
    pub claim_type: String,
    pub strength_score: Option<f64>,
    pub polarity: Option<i16>,
    pub statement: Option<Value>,
    pub dataset_key: Option<String>,
    pub evidence: Vec<ClaimEvidence>,
}

/// Full evidence trail for one claim, or None for an unknown key.
pub async fn get_claim_evidence(
    store: &dyn GraphStore,
    claim_key: i64,
) -> Result<Option<ClaimDetail>, ToolError> {
    let Some(claim) = store.claim(claim_key).await? else {
        return Ok(None);
    };

    let evidence = store
        .claim_evidence(claim_key)
        .await?
        .into_iter()
        .map(|e| ClaimEvidence {
            evidence_key: e.evidence_key,
            evidence_type: e.evidence_type,
            source_record_id: e.source_record_id,
            source_url: e.source_url,
            payload: e.payload,
            support_strength: e.support_strength,
            dataset_key: e.dataset_key,
        })
        .collect();

    Ok(Some(ClaimDetail {
        claim_key: claim.claim_key,
        claim_type: claim.claim_type,
        strength_score: claim.strength_score,
        polarity: claim.polarity,
        statement: claim.statement,
        dataset_key: claim.dataset_key,
        evidence,
    }))
}

/// All claims attached to an entity, each with its evidence trail.
pub async fn get_entity_claims(
    store: &dyn GraphStore,
    entity_kind: &str,
    entity_key: i64,
    claim_types: Option<&[String]>,
    limit: i64,
) -> Result<Vec<ClaimDetail>, ToolError> {
    let kind = EntityKind::parse(entity_kind).ok_or_else(|| {
        ToolError::InvalidArgs(format!(
            "entity_kind must be one of Drug, Gene, Disease, Pathway, AdverseEvent; got {entity_kind:?}"
        ))
    })?;
    check_positive("limit", limit)?;

    let claims = store.entity_claims(kind, entity_key, claim_types, limit).await?;

    let mut details = Vec::with_capacity(claims.len());
    for claim in claims {
        if let Some(detail) = get_claim_evidence(store, claim.claim_key).await? {
            details.push(detail);
        }
    }
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_graph::MemoryGraph;

    #[tokio::test]
    async fn test_claim_detail_carries_evidence() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "metformin");
        graph.add_gene(10, "PRKAB1");
        let claim_key = graph.add_target_claim(1, 10, Some(0.8), "drugcentral");
        graph.add_evidence_to_claim(claim_key, "chembl");

        let detail = get_claim_evidence(&graph, claim_key).await.unwrap().unwrap();
        assert_eq!(detail.claim_type, "DRUG_TARGET");
        assert_eq!(detail.evidence.len(), 2);
        assert_eq!(detail.strength_score, Some(0.8));
    }

    #[tokio::test]
    async fn test_unknown_claim_is_none() {
        let graph = MemoryGraph::new();
        assert!(get_claim_evidence(&graph, 404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entity_claims_filters_by_type() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "metformin");
        graph.add_gene(10, "PRKAB1");
        graph.add_adverse_event(30, "nausea");
        graph.add_target_claim(1, 10, Some(0.8), "drugcentral");
        graph.add_ae_claim(1, 30, Some(0.1), "sider");

        let all = get_entity_claims(&graph, "Drug", 1, None, 50).await.unwrap();
        assert_eq!(all.len(), 2);

        let types = vec!["DRUG_AE_LABEL".to_string()];
        let only_ae = get_entity_claims(&graph, "Drug", 1, Some(&types), 50).await.unwrap();
        assert_eq!(only_ae.len(), 1);
        assert_eq!(only_ae[0].claim_type, "DRUG_AE_LABEL");
    }

    #[tokio::test]
    async fn test_bad_entity_kind_is_rejected_before_store_access() {
        let graph = MemoryGraph::new();
        let err = get_entity_claims(&graph, "Protein", 1, None, 50).await.unwrap_err();
        assert_eq!(err.category(), "tool.invalid_args");
        assert_eq!(graph.queries_issued(), 0);
    }
}
