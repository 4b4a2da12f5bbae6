//! Diagnostic scorer.
//!
//! Turns a set of selected symptoms into a per-disease weighted score and an evidence-relative
//! probability:
//!
//! `probability = raw_score * 100 / (|evidence| * MAX_CATEGORY_WEIGHT)`
//!
//! The divisor counts every selected id, so probabilities are only comparable between sessions
//! with the same evidence size. Fractions are truncated to a whole percent.

use crate::catalog::EvidenceCatalog;
use crate::error::{CdssError, CdssResult};
use cdss_reference::MAX_CATEGORY_WEIGHT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Symptom ids selected for one diagnostic session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceSet(BTreeSet<u32>);

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the id was already selected.
    pub fn insert(&mut self, symptom_id: u32) -> bool {
        self.0.insert(symptom_id)
    }

    /// Returns `false` if the id was not selected.
    pub fn remove(&mut self, symptom_id: u32) -> bool {
        self.0.remove(&symptom_id)
    }

    pub fn contains(&self, symptom_id: u32) -> bool {
        self.0.contains(&symptom_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for EvidenceSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseScore {
    pub disease: String,
    pub raw_score: u32,
    pub probability_percent: u32,
    /// Selected symptom names that belong to this disease, in evidence order.
    pub matched_symptoms: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// One entry per catalog disease, in catalog order.
    pub per_disease: Vec<DiseaseScore>,
    pub has_very_strong_signal: bool,
    pub evidence_count: usize,
    /// Selected ids the catalog does not know. They count towards the divisor only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_ids: Vec<u32>,
}

impl ScoreResult {
    pub fn get(&self, disease: &str) -> Option<&DiseaseScore> {
        self.per_disease
            .iter()
            .find(|s| s.disease.eq_ignore_ascii_case(disease.trim()))
    }

    /// Probability for `disease`; diseases absent from the result score zero.
    pub fn probability(&self, disease: &str) -> u32 {
        self.get(disease).map_or(0, |s| s.probability_percent)
    }

    pub fn raw_score(&self, disease: &str) -> u32 {
        self.get(disease).map_or(0, |s| s.raw_score)
    }
}

/// Score an evidence set against the catalog.
///
/// # Errors
///
/// Returns [`CdssError::EmptyEvidence`] if no symptom is selected.
pub fn score(evidence: &EvidenceSet, catalog: &EvidenceCatalog) -> CdssResult<ScoreResult> {
    if evidence.is_empty() {
        return Err(CdssError::EmptyEvidence);
    }

    let mut per_disease: Vec<DiseaseScore> = catalog
        .disease_names()
        .into_iter()
        .map(|disease| DiseaseScore {
            disease: disease.to_owned(),
            raw_score: 0,
            probability_percent: 0,
            matched_symptoms: Vec::new(),
        })
        .collect();

    let mut has_very_strong_signal = false;
    let mut unresolved_ids = Vec::new();

    for id in evidence.ids() {
        let Some(symptom) = catalog.symptom(id) else {
            tracing::warn!(symptom_id = id, "ignoring symptom id missing from catalog");
            unresolved_ids.push(id);
            continue;
        };

        has_very_strong_signal |= symptom.category.is_very_strong();

        for disease in catalog.diseases_with(symptom) {
            if let Some(entry) = per_disease.iter_mut().find(|s| s.disease == disease) {
                entry.raw_score += symptom.weight();
                entry.matched_symptoms.push(symptom.name.as_str().to_owned());
            }
        }
    }

    let max_score = evidence.len() as u32 * MAX_CATEGORY_WEIGHT;
    for entry in &mut per_disease {
        entry.probability_percent = entry.raw_score * 100 / max_score;
    }

    tracing::debug!(
        evidence = evidence.len(),
        very_strong = has_very_strong_signal,
        "scored evidence set"
    );

    Ok(ScoreResult {
        per_disease,
        has_very_strong_signal,
        evidence_count: evidence.len(),
        unresolved_ids,
    })
}
