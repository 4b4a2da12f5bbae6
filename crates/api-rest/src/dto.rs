//! JSON request and response bodies.
//!
//! These mirror the core types but stay flat and string-typed so the OpenAPI schema is usable
//! from any client.

use cdss_core::{DiagnosisVerdict, Differential, DiseaseScore, SafetyWarning, ScoreResult};
use cdss_reference::{Symptom, TherapyLine, TreatmentGuideline};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SymptomDto {
    pub id: u32,
    pub name: String,
    /// `very-strong`, `strong`, `weak` or `very-weak`.
    pub category: String,
    pub weight: u32,
}

impl From<&Symptom> for SymptomDto {
    fn from(s: &Symptom) -> Self {
        Self {
            id: s.id,
            name: s.name.as_str().to_owned(),
            category: s.category_name().to_owned(),
            weight: s.weight(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SymptomsRes {
    pub symptoms: Vec<SymptomDto>,
    pub diseases: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScoreReq {
    pub symptom_ids: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiseaseScoreDto {
    pub disease: String,
    pub raw_score: u32,
    pub probability_percent: u32,
    pub matched_symptoms: Vec<String>,
}

impl From<&DiseaseScore> for DiseaseScoreDto {
    fn from(s: &DiseaseScore) -> Self {
        Self {
            disease: s.disease.clone(),
            raw_score: s.raw_score,
            probability_percent: s.probability_percent,
            matched_symptoms: s.matched_symptoms.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScoreRes {
    pub per_disease: Vec<DiseaseScoreDto>,
    pub has_very_strong_signal: bool,
    pub unresolved_ids: Vec<u32>,
}

impl From<&ScoreResult> for ScoreRes {
    fn from(r: &ScoreResult) -> Self {
        Self {
            per_disease: r.per_disease.iter().map(DiseaseScoreDto::from).collect(),
            has_very_strong_signal: r.has_very_strong_signal,
            unresolved_ids: r.unresolved_ids.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DifferentialDto {
    pub disease: String,
    pub probability_percent: u32,
    pub confidence: String,
    pub supporting_symptoms: Vec<String>,
}

impl From<&Differential> for DifferentialDto {
    fn from(d: &Differential) -> Self {
        Self {
            disease: d.disease.clone(),
            probability_percent: d.probability_percent,
            confidence: d.confidence.to_string(),
            supporting_symptoms: d.supporting_symptoms.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiagnoseRes {
    pub label: String,
    pub confidence: String,
    pub requires_imaging: bool,
    pub differentials: Vec<DifferentialDto>,
    /// Guideline key of the top candidate, if any. A suggestion only.
    pub suggested_diagnosis: Option<String>,
    pub scores: ScoreRes,
}

impl DiagnoseRes {
    pub fn new(score: &ScoreResult, verdict: &DiagnosisVerdict) -> Self {
        Self {
            label: verdict.label.to_string(),
            confidence: verdict.confidence.to_string(),
            requires_imaging: verdict.requires_imaging,
            differentials: verdict
                .differentials
                .iter()
                .map(DifferentialDto::from)
                .collect(),
            suggested_diagnosis: verdict
                .candidates()
                .first()
                .map(|d| d.guideline_key()),
            scores: ScoreRes::from(score),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GuidelineQuery {
    /// Exact diagnosis label, e.g. `Malaria` or `Malaria & Typhoid`.
    pub diagnosis: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TherapyLineDto {
    pub drug: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
}

impl From<&TherapyLine> for TherapyLineDto {
    fn from(l: &TherapyLine) -> Self {
        Self {
            drug: l.drug.as_str().to_owned(),
            dosage: l.dosage.as_str().to_owned(),
            frequency: l.frequency.as_str().to_owned(),
            duration_days: l.duration_days,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GuidelineRes {
    pub disease: String,
    pub lines: Vec<TherapyLineDto>,
    pub notes: Option<String>,
}

impl From<&TreatmentGuideline> for GuidelineRes {
    fn from(g: &TreatmentGuideline) -> Self {
        Self {
            disease: g.disease.as_str().to_owned(),
            lines: g.lines.iter().map(TherapyLineDto::from).collect(),
            notes: g.notes.clone(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DosageQuery {
    pub drug: String,
    pub weight_kg: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DosageRes {
    pub drug: String,
    pub weight_kg: f64,
    pub dosage: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SafetyReq {
    pub drugs: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SafetyWarningDto {
    /// `interaction` or `allergy`.
    pub kind: String,
    pub message: String,
    /// `major` or `contraindicated`.
    pub severity: String,
    pub drugs: Vec<String>,
    pub allergy: Option<String>,
}

impl From<&SafetyWarning> for SafetyWarningDto {
    fn from(w: &SafetyWarning) -> Self {
        let kind = match w.kind {
            cdss_core::WarningKind::Interaction => "interaction",
            cdss_core::WarningKind::Allergy => "allergy",
        };
        let severity = match w.severity {
            cdss_core::ImpliedSeverity::Major => "major",
            cdss_core::ImpliedSeverity::Contraindicated => "contraindicated",
        };
        Self {
            kind: kind.to_owned(),
            message: w.message.clone(),
            severity: severity.to_owned(),
            drugs: w.drugs.clone(),
            allergy: w.allergy.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SafetyRes {
    pub warnings: Vec<SafetyWarningDto>,
}
