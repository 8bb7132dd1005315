//! The per-query evidence accumulator.
//!
//! Collects resolved entities, subgraph fragments, paths, provenance ids and
//! a compact tool log across iterations. This pack is the ONLY source the
//! narrator may draw on, and its digest is what the next planner prompt sees
//! instead of raw tool payloads.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use vigil_kg::adverse_events::{DrugLabelSection, FaersSignal};
use vigil_kg::paths::MechanisticPath;
use vigil_kg::subgraph::Subgraph;

use crate::schemas::{EvidenceSummary, ToolCallLog};

/// Upper bound on the prompt digest, in characters.
const DIGEST_MAX_CHARS: usize = 4_000;

#[derive(Default)]
pub struct EvidencePack {
    pub query: String,

    // Resolved entities, display name -> key. Once a name is here it is
    // never re-resolved within the query.
    pub drug_keys: BTreeMap<String, i64>,
    pub gene_keys: BTreeMap<String, i64>,
    pub disease_keys: BTreeMap<String, i64>,
    pub ae_keys: BTreeMap<String, i64>,

    // Accumulated graph data.
    pub subgraph: Subgraph,
    pub paths: BTreeMap<String, MechanisticPath>,

    // Provenance identifiers touched by any tool.
    pub claim_ids: BTreeSet<i64>,
    pub evidence_ids: BTreeSet<i64>,
    pub dataset_ids: BTreeSet<String>,

    // Per-tool numeric summaries.
    pub faers_signals: Vec<FaersSignal>,
    pub ae_frequencies: BTreeMap<i64, f64>,
    pub label_sections: Vec<DrugLabelSection>,

    // Compact log of every call across all iterations.
    pub tool_log: Vec<ToolCallLog>,
    pub errors: Vec<String>,
}

impl EvidencePack {
    pub fn new(query: &str) -> Self {
        Self { query: query.to_string(), ..Self::default() }
    }

    // ── Entity maps ─────────────────────────────────────────────────────────

    pub fn add_drug(&mut self, name: &str, key: i64) {
        self.drug_keys.entry(name.to_lowercase()).or_insert(key);
    }

    pub fn add_gene(&mut self, symbol: &str, key: i64) {
        self.gene_keys.entry(symbol.to_uppercase()).or_insert(key);
    }

    pub fn add_disease(&mut self, term: &str, key: i64) {
        self.disease_keys.entry(term.to_lowercase()).or_insert(key);
    }

    pub fn add_ae(&mut self, term: &str, key: i64) {
        self.ae_keys.entry(term.to_lowercase()).or_insert(key);
    }

    pub fn drug_key(&self, name: &str) -> Option<i64> {
        self.drug_keys.get(&name.to_lowercase()).copied()
    }

    pub fn gene_key(&self, symbol: &str) -> Option<i64> {
        self.gene_keys.get(&symbol.to_uppercase()).copied()
    }

    pub fn disease_key(&self, term: &str) -> Option<i64> {
        self.disease_keys.get(&term.to_lowercase()).copied()
    }

    pub fn ae_key(&self, term: &str) -> Option<i64> {
        self.ae_keys.get(&term.to_lowercase()).copied()
    }

    // ── Provenance ──────────────────────────────────────────────────────────

    pub fn note_claim(&mut self, claim_key: i64, dataset_key: Option<&str>) {
        self.claim_ids.insert(claim_key);
        if let Some(dataset) = dataset_key {
            if !dataset.is_empty() {
                self.dataset_ids.insert(dataset.to_string());
            }
        }
    }

    pub fn note_evidence(&mut self, evidence_key: i64) {
        self.evidence_ids.insert(evidence_key);
    }

    // ── Graph data ──────────────────────────────────────────────────────────

    pub fn add_path(&mut self, path: MechanisticPath) {
        for claim in &path.claims {
            self.claim_ids.insert(claim.claim_key);
            if let Some(dataset) = &claim.dataset_key {
                self.dataset_ids.insert(dataset.clone());
            }
            for &evidence_key in &claim.evidence_keys {
                self.evidence_ids.insert(evidence_key);
            }
        }
        // Entity keys on a path must be resolvable from the final response.
        for step in &path.steps {
            self.add_entity(step.node_kind, &step.node_label, step.node_key);
        }
        self.paths.entry(path.signature()).or_insert(path);
    }

    pub fn merge_subgraph(&mut self, fragment: Subgraph) {
        for claim_key in fragment.claim_keys() {
            self.claim_ids.insert(claim_key);
        }
        for node in &fragment.nodes {
            if let Some(key) = node.id.split(':').next_back().and_then(|k| k.parse().ok()) {
                self.add_entity(node.kind, &node.label, key);
            }
        }
        self.subgraph.merge(fragment);
    }

    fn add_entity(&mut self, kind: vigil_graph::EntityKind, label: &str, key: i64) {
        if label.is_empty() {
            return;
        }
        match kind {
            vigil_graph::EntityKind::Drug => self.add_drug(label, key),
            vigil_graph::EntityKind::Gene => self.add_gene(label, key),
            vigil_graph::EntityKind::Disease => self.add_disease(label, key),
            vigil_graph::EntityKind::AdverseEvent => self.add_ae(label, key),
            vigil_graph::EntityKind::Pathway => {}
        }
    }

    /// Ranked view of the accumulated paths, best first.
    pub fn ranked_paths(&self) -> Vec<&MechanisticPath> {
        let mut paths: Vec<&MechanisticPath> = self.paths.values().collect();
        paths.sort_by(|a, b| vigil_kg::ScoringPolicy::rank(a, b));
        paths
    }

    // ── Logging ─────────────────────────────────────────────────────────────

    pub fn record_call(&mut self, tool: &str, args: Value, ok: bool, summary: &str) {
        self.tool_log.push(ToolCallLog {
            tool: tool.to_string(),
            args,
            ok,
            summary: summary.to_string(),
        });
    }

    pub fn log_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }

    // ── Prompt formatting ───────────────────────────────────────────────────

    /// Resolved-entity maps, carried verbatim into every planner prompt.
    pub fn resolved_context(&self) -> String {
        let mut lines = Vec::new();
        if !self.drug_keys.is_empty() {
            lines.push("Drugs:".to_string());
            for (name, key) in &self.drug_keys {
                lines.push(format!("  {name} -> drug_key={key}"));
            }
        }
        if !self.gene_keys.is_empty() {
            lines.push("Genes:".to_string());
            for (symbol, key) in &self.gene_keys {
                lines.push(format!("  {symbol} -> gene_key={key}"));
            }
        }
        if !self.disease_keys.is_empty() {
            lines.push("Diseases:".to_string());
            for (term, key) in &self.disease_keys {
                lines.push(format!("  {term} -> disease_key={key}"));
            }
        }
        if !self.ae_keys.is_empty() {
            lines.push("Adverse Events:".to_string());
            for (term, key) in &self.ae_keys {
                lines.push(format!("  {term} -> ae_key={key}"));
            }
        }
        if lines.is_empty() {
            "(no entities resolved yet)".to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Bounded digest of everything gathered so far, for the next iteration's
    /// prompt. Full tool payloads are never resent.
    pub fn summarize_for_prompt(&self) -> String {
        let mut sections = vec![self.resolved_context()];

        if !self.tool_log.is_empty() {
            let mut lines = vec!["Tool calls so far:".to_string()];
            for entry in &self.tool_log {
                let status = if entry.ok { "ok" } else { "FAILED" };
                lines.push(format!("  [{status}] {} -> {}", entry.tool, entry.summary));
            }
            sections.push(lines.join("\n"));
        }

        sections.push(format!(
            "Gathered: {} paths, {} claims, {} evidence records, datasets: {}",
            self.paths.len(),
            self.claim_ids.len(),
            self.evidence_ids.len(),
            if self.dataset_ids.is_empty() {
                "none".to_string()
            } else {
                self.dataset_ids.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        ));

        let mut digest = sections.join("\n\n");
        if digest.len() > DIGEST_MAX_CHARS {
            let mut cut = DIGEST_MAX_CHARS;
            while !digest.is_char_boundary(cut) {
                cut -= 1;
            }
            digest.truncate(cut);
            digest.push_str("\n(... digest truncated)");
        }
        digest
    }

    /// The structured text the narrator is allowed to draw on.
    pub fn narrator_context(&self) -> String {
        let mut sections = Vec::new();

        if !self.drug_keys.is_empty() {
            let drugs: Vec<String> =
                self.drug_keys.iter().map(|(n, k)| format!("- {n}: key={k}")).collect();
            sections.push(format!("## Drugs\n{}", drugs.join("\n")));
        }
        if !self.gene_keys.is_empty() {
            let genes: Vec<String> =
                self.gene_keys.iter().map(|(s, k)| format!("- {s}: key={k}")).collect();
            sections.push(format!("## Genes\n{}", genes.join("\n")));
        }
        if !self.disease_keys.is_empty() {
            let diseases: Vec<String> =
                self.disease_keys.iter().map(|(t, k)| format!("- {t}: key={k}")).collect();
            sections.push(format!("## Diseases\n{}", diseases.join("\n")));
        }
        if !self.ae_keys.is_empty() {
            let mut lines = Vec::new();
            for (term, key) in &self.ae_keys {
                match self.ae_frequencies.get(key) {
                    Some(freq) => lines.push(format!("- {term}: key={key}, frequency={freq}")),
                    None => lines.push(format!("- {term}: key={key}")),
                }
            }
            sections.push(format!("## Adverse Events\n{}", lines.join("\n")));
        }

        let ranked = self.ranked_paths();
        if !ranked.is_empty() {
            let mut lines = Vec::new();
            for (i, path) in ranked.iter().take(10).enumerate() {
                lines.push(format!(
                    "{}. {} (score={:.3}, evidence={})",
                    i + 1,
                    path,
                    path.score.clamp(0.0, 1.0),
                    path.evidence_count
                ));
            }
            sections.push(format!("## Mechanistic Paths\n{}", lines.join("\n")));
        }

        if !self.faers_signals.is_empty() {
            let mut lines = Vec::new();
            for signal in self.faers_signals.iter().take(20) {
                lines.push(format!(
                    "- {}: PRR={}, count={}",
                    signal.ae_label,
                    signal.prr.map(|p| format!("{p:.2}")).unwrap_or_else(|| "n/a".to_string()),
                    signal.count
                ));
            }
            sections.push(format!("## FAERS Signals\n{}", lines.join("\n")));
        }

        for section in self.label_sections.iter().take(5) {
            let mut content = section.content.clone();
            if content.len() > 1000 {
                let mut cut = 1000;
                while !content.is_char_boundary(cut) {
                    cut -= 1;
                }
                content.truncate(cut);
            }
            sections.push(format!("## Label: {}\n{}", section.section_name, content));
        }

        sections.push(format!(
            "## Evidence Summary\n- Claims: {}\n- Evidence records: {}\n- Data sources: {}",
            self.claim_ids.len(),
            self.evidence_ids.len(),
            if self.dataset_ids.is_empty() {
                "none".to_string()
            } else {
                self.dataset_ids.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        ));

        if !self.errors.is_empty() {
            let errors: Vec<String> = self.errors.iter().map(|e| format!("- {e}")).collect();
            sections.push(format!("## Errors\n{}", errors.join("\n")));
        }

        sections.join("\n\n")
    }

    pub fn evidence_summary(&self) -> EvidenceSummary {
        EvidenceSummary {
            drugs: self.drug_keys.clone(),
            genes: self.gene_keys.clone(),
            diseases: self.disease_keys.clone(),
            adverse_events: self.ae_keys.clone(),
            claim_ids: self.claim_ids.iter().copied().collect(),
            evidence_ids: self.evidence_ids.iter().copied().collect(),
            dataset_ids: self.dataset_ids.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_graph::EntityKind;
    use vigil_kg::paths::{PathClaim, PathStep};

    fn sample_path(score: f64) -> MechanisticPath {
        MechanisticPath {
            steps: vec![
                PathStep {
                    node_kind: EntityKind::Drug,
                    node_key: 1,
                    node_label: "metformin".into(),
                    edge_kind: None,
                },
                PathStep {
                    node_kind: EntityKind::AdverseEvent,
                    node_key: 30,
                    node_label: "nausea".into(),
                    edge_kind: Some("CAUSES".into()),
                },
            ],
            claims: vec![PathClaim {
                claim_key: 77,
                strength: Some(0.1),
                dataset_key: Some("sider".into()),
                evidence_keys: vec![501, 502],
            }],
            score,
            evidence_count: 2,
        }
    }

    #[test]
    fn test_entity_names_are_normalized() {
        let mut pack = EvidencePack::new("q");
        pack.add_drug("Metformin", 1);
        pack.add_gene("prkab1", 10);
        assert_eq!(pack.drug_key("METFORMIN"), Some(1));
        assert_eq!(pack.gene_key("PRKAB1"), Some(10));
    }

    #[test]
    fn test_first_resolution_wins() {
        let mut pack = EvidencePack::new("q");
        pack.add_drug("metformin", 1);
        pack.add_drug("metformin", 999);
        assert_eq!(pack.drug_key("metformin"), Some(1));
    }

    #[test]
    fn test_paths_dedupe_by_signature_and_feed_provenance() {
        let mut pack = EvidencePack::new("q");
        pack.add_path(sample_path(0.1));
        pack.add_path(sample_path(0.9));
        assert_eq!(pack.paths.len(), 1);
        assert!(pack.claim_ids.contains(&77));
        assert!(pack.evidence_ids.contains(&501));
        assert!(pack.evidence_ids.contains(&502));
        assert!(pack.dataset_ids.contains("sider"));
    }

    #[test]
    fn test_digest_is_bounded() {
        let mut pack = EvidencePack::new("q");
        for i in 0..500 {
            pack.record_call(
                "get_drug_adverse_events",
                serde_json::json!({"drug_key": i}),
                true,
                "30 items",
            );
        }
        let digest = pack.summarize_for_prompt();
        assert!(digest.len() <= DIGEST_MAX_CHARS + 40);
        assert!(digest.contains("digest truncated"));
    }

    #[test]
    fn test_narrator_context_lists_sections() {
        let mut pack = EvidencePack::new("q");
        pack.add_drug("metformin", 1);
        pack.add_ae("nausea", 30);
        pack.ae_frequencies.insert(30, 0.12);
        pack.add_path(sample_path(0.5));
        let context = pack.narrator_context();
        assert!(context.contains("## Drugs"));
        assert!(context.contains("## Adverse Events"));
        assert!(context.contains("frequency=0.12"));
        assert!(context.contains("## Mechanistic Paths"));
        assert!(context.contains("## Evidence Summary"));
    }
}
