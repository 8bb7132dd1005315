//! Adverse-event tools: label-listed AEs, FDA label sections, FAERS
//! disproportionality signals, and the composite drug profile.

use serde::Serialize;
use serde_json::Value;

use vigil_graph::GraphStore;

use crate::error::{check_positive, check_unit_range, ToolError};
use crate::mechanism::{get_drug_targets, DrugTarget};

/// Per-section size cap for label text.
pub const LABEL_SECTION_MAX_BYTES: usize = 10 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct DrugAdverseEvent {
    pub ae_label: String,
    pub ae_key: i64,
    pub frequency: Option<f64>,
    pub relation: Option<String>,
    pub claim_key: i64,
    pub dataset_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrugLabelSection {
    pub section_name: String,
    pub content: String,
    pub effective_date: Option<String>,
    pub brand_name: Option<String>,
    pub claim_key: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaersSignal {
    pub ae_label: String,
    pub ae_key: i64,
    pub prr: Option<f64>,
    pub ror: Option<f64>,
    pub chi2: Option<f64>,
    pub count: i64,
    pub claim_key: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrugInfo {
    pub preferred_name: String,
    pub drug_key: i64,
    pub drugcentral_id: Option<String>,
    pub chembl_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrugProfile {
    pub drug: DrugInfo,
    pub targets: Vec<DrugTarget>,
    pub adverse_events: Vec<DrugAdverseEvent>,
}

/// Cut a string to `max_bytes` on a char boundary.
fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Known adverse events for a drug, one entry per AE, highest frequency
/// first. A later claim for an AE already listed is dropped (the store
/// returns claims sorted by frequency, so the kept claim is the strongest).
pub async fn get_drug_adverse_events(
    store: &dyn GraphStore,
    drug_key: i64,
    min_frequency: Option<f64>,
    limit: i64,
) -> Result<Vec<DrugAdverseEvent>, ToolError> {
    if let Some(min) = min_frequency {
        check_unit_range("min_frequency", min)?;
    }
    check_positive("limit", limit)?;

    let rows = store.drug_adverse_events(drug_key, min_frequency, limit).await?;
    let mut seen = std::collections::BTreeSet::new();
    Ok(rows
        .into_iter()
        .filter(|r| seen.insert(r.ae_key))
        .map(|r| DrugAdverseEvent {
            ae_label: r.ae_label,
            ae_key: r.ae_key,
            frequency: r.frequency,
            relation: r.relation,
            claim_key: r.claim_key,
            dataset_key: r.dataset_key,
        })
        .collect())
}

/// FDA label sections for a drug. Sections live in the evidence payload of
/// `DRUG_LABEL` claims; the claim statement carries effective date and brand.
pub async fn get_drug_label_sections(
    store: &dyn GraphStore,
    drug_key: i64,
    sections: Option<&[String]>,
) -> Result<Vec<DrugLabelSection>, ToolError> {
    let rows = store.drug_label_claims(drug_key).await?;

    let mut results = Vec::new();
    for row in rows {
        let statement = row.statement.unwrap_or(Value::Null);
        let effective_date = statement
            .get("effective_date")
            .and_then(Value::as_str)
            .map(str::to_string);
        let brand_name = statement
            .get("brand_name")
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(Value::Object(payload)) = row.payload else { continue };
        for (section_name, content) in payload {
            if let Some(wanted) = sections {
                if !wanted.contains(&section_name) {
                    continue;
                }
            }
            let Some(text) = content.as_str() else { continue };
            results.push(DrugLabelSection {
                section_name,
                content: truncate_utf8(text, LABEL_SECTION_MAX_BYTES).to_string(),
                effective_date: effective_date.clone(),
                brand_name: brand_name.clone(),
                claim_key: row.claim_key,
            });
        }
    }
    Ok(results)
}

/// FAERS disproportionality signals for a drug, PRR descending.
pub async fn get_drug_faers_signals(
    store: &dyn GraphStore,
    drug_key: i64,
    top_k: i64,
    min_count: i64,
    min_prr: Option<f64>,
) -> Result<Vec<FaersSignal>, ToolError> {
    check_positive("top_k", top_k)?;
    if min_count < 0 {
        return Err(ToolError::InvalidArgs(format!(
            "min_count must be >= 0, got {min_count}"
        )));
    }

    let rows = store.drug_faers_claims(drug_key, top_k).await?;
    let mut signals = Vec::new();
    for row in rows {
        let statement = row.statement.unwrap_or(Value::Null);
        let prr = statement.get("prr").and_then(Value::as_f64);
        let ror = statement.get("ror").and_then(Value::as_f64);
        let chi2 = statement.get("chi2").and_then(Value::as_f64);
        let count = statement.get("count").and_then(Value::as_i64).unwrap_or(0);

        if count < min_count {
            continue;
        }
        if let Some(threshold) = min_prr {
            if prr.map(|p| p < threshold).unwrap_or(true) {
                continue;
            }
        }

        signals.push(FaersSignal {
            ae_label: row.ae_label,
            ae_key: row.ae_key,
            prr,
            ror,
            chi2,
            count,
            claim_key: row.claim_key,
        });
    }

    signals.sort_by(|a, b| {
        b.prr
            .unwrap_or(0.0)
            .partial_cmp(&a.prr.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    signals.truncate(top_k as usize);
    Ok(signals)
}

/// Basic info, targets, and the top-20 adverse events for a drug.
pub async fn get_drug_profile(
    store: &dyn GraphStore,
    drug_key: i64,
) -> Result<Option<DrugProfile>, ToolError> {
    let Some(row) = store.drug(drug_key).await? else {
        return Ok(None);
    };

    let targets = get_drug_targets(store, drug_key).await?;
    let adverse_events = get_drug_adverse_events(store, drug_key, None, 20).await?;

    Ok(Some(DrugProfile {
        drug: DrugInfo {
            preferred_name: row.preferred_name,
            drug_key: row.drug_key,
            drugcentral_id: row.drugcentral_id,
            chembl_id: row.chembl_id,
        },
        targets,
        adverse_events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_graph::MemoryGraph;

    #[tokio::test]
    async fn test_adverse_events_sorted_by_frequency() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "metformin");
        graph.add_adverse_event(30, "nausea");
        graph.add_adverse_event(31, "lactic acidosis");
        graph.add_ae_claim(1, 30, Some(0.12), "sider");
        graph.add_ae_claim(1, 31, Some(0.003), "sider");

        let aes = get_drug_adverse_events(&graph, 1, None, 100).await.unwrap();
        assert_eq!(aes.len(), 2);
        assert_eq!(aes[0].ae_label, "nausea");
        assert_eq!(aes[1].ae_label, "lactic acidosis");
    }

    #[tokio::test]
    async fn test_min_frequency_filters() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "metformin");
        graph.add_adverse_event(30, "nausea");
        graph.add_adverse_event(31, "lactic acidosis");
        graph.add_ae_claim(1, 30, Some(0.12), "sider");
        graph.add_ae_claim(1, 31, Some(0.003), "sider");

        let aes = get_drug_adverse_events(&graph, 1, Some(0.01), 100).await.unwrap();
        assert_eq!(aes.len(), 1);
        assert_eq!(aes[0].ae_label, "nausea");
    }

    #[tokio::test]
    async fn test_label_sections_filter_and_metadata() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "metformin");
        graph.add_label_claim(
            1,
            json!({"effective_date": "2024-01-10", "brand_name": "Glucophage"}),
            json!({
                "adverse_reactions": "Nausea, vomiting, lactic acidosis.",
                "warnings": "Risk of lactic acidosis in renal impairment."
            }),
        );

        let all = get_drug_label_sections(&graph, 1, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let wanted = vec!["warnings".to_string()];
        let filtered = get_drug_label_sections(&graph, 1, Some(&wanted)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].section_name, "warnings");
        assert_eq!(filtered[0].brand_name.as_deref(), Some("Glucophage"));
    }

    #[tokio::test]
    async fn test_label_section_truncated_to_cap() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "metformin");
        let long = "x".repeat(LABEL_SECTION_MAX_BYTES + 500);
        graph.add_label_claim(1, json!({}), json!({ "adverse_reactions": long }));

        let sections = get_drug_label_sections(&graph, 1, None).await.unwrap();
        assert_eq!(sections[0].content.len(), LABEL_SECTION_MAX_BYTES);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "αβγδ";
        let cut = truncate_utf8(text, 3);
        assert_eq!(cut, "α");
    }

    #[tokio::test]
    async fn test_faers_signals_filtered_and_sorted() {
        let mut graph = MemoryGraph::new();
        graph.add_drug(1, "metformin");
        graph.add_adverse_event(30, "nausea");
        graph.add_adverse_event(31, "lactic acidosis");
        graph.add_adverse_event(32, "rash");
        graph.add_faers_claim(1, 30, json!({"prr": 2.1, "ror": 2.0, "chi2": 40.0, "count": 120}), Some(0.4));
        graph.add_faers_claim(1, 31, json!({"prr": 8.4, "ror": 9.1, "chi2": 210.0, "count": 55}), Some(0.9));
        graph.add_faers_claim(1, 32, json!({"prr": 1.1, "ror": 1.0, "chi2": 2.0, "count": 2}), Some(0.1));

        let signals = get_drug_faers_signals(&graph, 1, 10, 10, Some(2.0)).await.unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].ae_label, "lactic acidosis");
        assert_eq!(signals[1].ae_label, "nausea");
    }

    #[tokio::test]
    async fn test_profile_for_missing_drug_is_none() {
        let graph = MemoryGraph::new();
        let profile = get_drug_profile(&graph, 404).await.unwrap();
        assert!(profile.is_none());
    }
}
