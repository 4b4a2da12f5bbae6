//! The record produced when a diagnosis session is saved.

use crate::classifier::{ConfidenceTier, Diagnosis};
use crate::clinical::ClinicalFindings;
use crate::prescription::PrescriptionItem;
use crate::safety::SafetyWarning;
use crate::uuid::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One saved diagnosis and treatment decision. Handed to a
/// [`RecordSink`](crate::sources::RecordSink) as an opaque write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub session_id: SessionId,
    pub patient_id: String,
    pub clinician_id: String,
    pub selected_symptom_ids: Vec<u32>,
    /// Label the classifier produced, e.g. `co-infection of Malaria and Typhoid`.
    pub diagnosis_label: String,
    pub final_diagnosis: Diagnosis,
    pub confidence: ConfidenceTier,
    pub requires_imaging: bool,
    #[serde(default)]
    pub clinical_findings: ClinicalFindings,
    pub prescription: Vec<PrescriptionItem>,
    /// Warnings on screen when the clinician saved.
    pub safety_warnings: Vec<SafetyWarning>,
    pub recorded_at: DateTime<Utc>,
}

impl DiagnosisRecord {
    pub fn to_json_pretty(&self) -> crate::CdssResult<String> {
        serde_json::to_string_pretty(self).map_err(crate::CdssError::Serialization)
    }
}
