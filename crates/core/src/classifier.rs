//! Diagnosis classifier.
//!
//! A pure threshold policy over a [`ScoreResult`]. The first two disease names passed in form
//! the primary pair the label rules are written for; every disease in the score is eligible for
//! the differential list.

use crate::constants::{
    CO_INFECTION_KEY_SEPARATOR, CO_INFECTION_THRESHOLD, DIFFERENTIAL_DISPLAY_THRESHOLD,
    HIGH_CONFIDENCE_THRESHOLD, SINGLE_DIAGNOSIS_THRESHOLD, SUSPECTED_THRESHOLD,
};
use crate::error::{CdssError, CdssResult};
use crate::scoring::ScoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        })
    }
}

/// Classification cut-offs, in whole percent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    pub co_infection: u32,
    pub single: u32,
    pub high_confidence: u32,
    pub suspected: u32,
    pub differential_display: u32,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            co_infection: CO_INFECTION_THRESHOLD,
            single: SINGLE_DIAGNOSIS_THRESHOLD,
            high_confidence: HIGH_CONFIDENCE_THRESHOLD,
            suspected: SUSPECTED_THRESHOLD,
            differential_display: DIFFERENTIAL_DISPLAY_THRESHOLD,
        }
    }
}

impl ClassificationThresholds {
    /// Every threshold must be a percentage and `suspected <= single <= high_confidence`.
    pub fn validate(&self) -> CdssResult<()> {
        let all = [
            self.co_infection,
            self.single,
            self.high_confidence,
            self.suspected,
            self.differential_display,
        ];
        if all.iter().any(|&t| t > 100) {
            return Err(CdssError::InvalidInput(
                "classification thresholds must be between 0 and 100".into(),
            ));
        }
        if !(self.suspected <= self.single && self.single <= self.high_confidence) {
            return Err(CdssError::InvalidInput(
                "classification thresholds must satisfy suspected <= single <= high_confidence"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Confidence for one disease taken on its own.
    pub fn tier_for(&self, probability: u32) -> ConfidenceTier {
        if probability >= self.high_confidence {
            ConfidenceTier::High
        } else if probability >= self.single {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// The classifier's headline conclusion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosisLabel {
    CoInfection { first: String, second: String },
    Single { disease: String },
    Suspected { first: String, second: Option<String> },
    NoClearDiagnosis,
}

impl fmt::Display for DiagnosisLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosisLabel::CoInfection { first, second } => {
                write!(f, "co-infection of {first} and {second}")
            }
            DiagnosisLabel::Single { disease } => f.write_str(disease),
            DiagnosisLabel::Suspected {
                first,
                second: Some(second),
            } => write!(f, "suspected infection ({first} or {second})"),
            DiagnosisLabel::Suspected {
                first,
                second: None,
            } => write!(f, "suspected infection ({first})"),
            DiagnosisLabel::NoClearDiagnosis => f.write_str("no clear diagnosis"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Differential {
    pub disease: String,
    pub probability_percent: u32,
    pub confidence: ConfidenceTier,
    pub supporting_symptoms: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisVerdict {
    pub label: DiagnosisLabel,
    pub confidence: ConfidenceTier,
    pub requires_imaging: bool,
    /// Highest probability first.
    pub differentials: Vec<Differential>,
}

impl DiagnosisVerdict {
    /// Diagnoses a clinician can pick from: the co-infection (when that is the label) followed
    /// by each differential. The first entry is the suggestion, never an automatic choice.
    pub fn candidates(&self) -> Vec<Diagnosis> {
        let mut out = Vec::new();
        if let DiagnosisLabel::CoInfection { first, second } = &self.label {
            out.push(Diagnosis::CoInfection {
                first: first.clone(),
                second: second.clone(),
            });
        }
        out.extend(self.differentials.iter().map(|d| Diagnosis::Single {
            disease: d.disease.clone(),
        }));
        out
    }
}

/// The clinician's final diagnosis for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnosis {
    Single { disease: String },
    CoInfection { first: String, second: String },
}

impl Diagnosis {
    pub fn single(disease: impl Into<String>) -> Self {
        Diagnosis::Single {
            disease: disease.into(),
        }
    }

    pub fn co_infection(first: impl Into<String>, second: impl Into<String>) -> Self {
        Diagnosis::CoInfection {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Key into the guideline table, e.g. `Malaria` or `Malaria & Typhoid`.
    pub fn guideline_key(&self) -> String {
        match self {
            Diagnosis::Single { disease } => disease.clone(),
            Diagnosis::CoInfection { first, second } => {
                format!("{first}{CO_INFECTION_KEY_SEPARATOR}{second}")
            }
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.guideline_key())
    }
}

/// Classify a score.
///
/// `disease_names[0]` and `disease_names[1]` are the primary pair; with fewer than two names the
/// co-infection rule cannot fire. `requires_imaging` mirrors the very-strong signal and is
/// independent of every threshold.
pub fn classify(
    score: &ScoreResult,
    disease_names: &[&str],
    thresholds: &ClassificationThresholds,
) -> DiagnosisVerdict {
    let primary: Vec<(&str, u32)> = disease_names
        .iter()
        .take(2)
        .map(|&name| (name, score.probability(name)))
        .collect();

    let (label, confidence) = label_for(&primary, thresholds);

    let mut differentials: Vec<Differential> = score
        .per_disease
        .iter()
        .filter(|s| s.probability_percent >= thresholds.differential_display)
        .map(|s| Differential {
            disease: s.disease.clone(),
            probability_percent: s.probability_percent,
            confidence: thresholds.tier_for(s.probability_percent),
            supporting_symptoms: s.matched_symptoms.clone(),
        })
        .collect();
    differentials.sort_by(|a, b| {
        b.probability_percent
            .cmp(&a.probability_percent)
            .then_with(|| a.disease.cmp(&b.disease))
    });

    tracing::debug!(%label, %confidence, "classified score");

    DiagnosisVerdict {
        label,
        confidence,
        requires_imaging: score.has_very_strong_signal,
        differentials,
    }
}

fn label_for(
    primary: &[(&str, u32)],
    t: &ClassificationThresholds,
) -> (DiagnosisLabel, ConfidenceTier) {
    if let [(a, pa), (b, pb)] = primary {
        if *pa >= t.co_infection && *pb >= t.co_infection {
            return (
                DiagnosisLabel::CoInfection {
                    first: (*a).to_owned(),
                    second: (*b).to_owned(),
                },
                ConfidenceTier::High,
            );
        }
    }

    for &(disease, p) in primary {
        if p >= t.single {
            let confidence = if p >= t.high_confidence {
                ConfidenceTier::High
            } else {
                ConfidenceTier::Medium
            };
            return (
                DiagnosisLabel::Single {
                    disease: disease.to_owned(),
                },
                confidence,
            );
        }
    }

    if primary.iter().any(|&(_, p)| p >= t.suspected) {
        let mut names = primary.iter().map(|&(n, _)| n.to_owned());
        if let Some(first) = names.next() {
            return (
                DiagnosisLabel::Suspected {
                    first,
                    second: names.next(),
                },
                ConfidenceTier::Medium,
            );
        }
    }

    (DiagnosisLabel::NoClearDiagnosis, ConfidenceTier::Low)
}
