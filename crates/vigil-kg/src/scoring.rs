//! Path scoring policy.
//!
//! A path's score composes the primary claim strength, a per-hop length
//! penalty, a multi-source corroboration bonus, and (optionally) the mean
//! per-dataset trust weight:
//!
//! ```text
//! S(p) = sigma_base(c*) * lambda^k * mu(p) [* mean_source_weight]
//! ```
//!
//! Scores are clamped to [0,1] only at serialization boundaries; ranking uses
//! the raw value with a stable tie-break chain.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use vigil_common::config::ScoringConfig;
use vigil_graph::EntityKind;

use crate::paths::{MechanisticPath, PathClaim};

#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    /// Strength substituted when a claim's source provides no confidence.
    pub null_strength: f64,
    /// Multiplicative penalty per hop (lambda).
    pub length_penalty: f64,
    /// Bonus when the path's claims cite more than one distinct evidence record (mu).
    pub multi_source_bonus: f64,
    /// Boost per distinct patient-condition disease on the path (beta).
    pub context_boost: f64,
    /// Multiply by the mean per-dataset weight when several claims contribute.
    pub use_source_weights: bool,
    pub source_weights: HashMap<String, f64>,
    /// Weight for datasets absent from the table.
    pub default_source_weight: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

impl ScoringPolicy {
    pub fn from_config(cfg: &ScoringConfig) -> Self {
        Self {
            null_strength: cfg.null_strength,
            length_penalty: 0.95,
            multi_source_bonus: 1.2,
            context_boost: 1.5,
            use_source_weights: cfg.use_source_weights,
            source_weights: cfg.source_weights.clone(),
            default_source_weight: cfg.default_source_weight,
        }
    }

    pub fn base_strength(&self, strength: Option<f64>) -> f64 {
        strength.unwrap_or(self.null_strength)
    }

    pub fn source_weight(&self, dataset_key: &str) -> f64 {
        self.source_weights
            .get(dataset_key)
            .copied()
            .unwrap_or(self.default_source_weight)
    }

    /// Score a path from its claim chain. The primary claim is the first on
    /// the path (the claim anchoring the drug's outgoing hop).
    pub fn score_path(&self, claims: &[PathClaim], hop_count: usize) -> f64 {
        let sigma = self.base_strength(claims.first().and_then(|c| c.strength));
        let mut score = sigma * self.length_penalty.powi(hop_count as i32);

        let distinct_evidence: HashSet<i64> = claims
            .iter()
            .flat_map(|c| c.evidence_keys.iter().copied())
            .collect();
        if distinct_evidence.len() > 1 {
            score *= self.multi_source_bonus;
        }

        if self.use_source_weights && claims.len() > 1 {
            let sum: f64 = claims
                .iter()
                .map(|c| self.source_weight(c.dataset_key.as_deref().unwrap_or("")))
                .sum();
            score *= sum / claims.len() as f64;
        }

        score
    }

    /// Multiplier for paths traversing patient-condition diseases, applied
    /// once per distinct matching disease on the path.
    pub fn condition_boost(&self, path: &MechanisticPath, conditions: &HashSet<i64>) -> f64 {
        let matches: HashSet<i64> = path
            .steps
            .iter()
            .filter(|s| s.node_kind == EntityKind::Disease && conditions.contains(&s.node_key))
            .map(|s| s.node_key)
            .collect();
        self.context_boost.powi(matches.len() as i32)
    }

    /// Clamp for serialization boundaries (shaped payloads, final response).
    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(0.0, 1.0)
    }

    /// Stable ranking: score descending, then shorter paths, then fewer
    /// distinct datasets, then deterministic on node keys.
    pub fn rank(a: &MechanisticPath, b: &MechanisticPath) -> Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.hop_count().cmp(&b.hop_count()))
            .then_with(|| a.distinct_datasets().cmp(&b.distinct_datasets()))
            .then_with(|| {
                let a_keys: Vec<i64> = a.steps.iter().map(|s| s.node_key).collect();
                let b_keys: Vec<i64> = b.steps.iter().map(|s| s.node_key).collect();
                a_keys.cmp(&b_keys)
            })
    }
}
