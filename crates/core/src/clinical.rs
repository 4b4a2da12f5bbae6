//! Patient context and clinical findings captured during a session.

use crate::validation::{
    validate_notes, validate_pulse_bpm, validate_respiratory_rate, validate_temperature_c,
    validate_weight_kg,
};
use crate::{CdssError, CdssResult};
use cdss_reference::{NonEmptyText, PatientAllergy};
use serde::{Deserialize, Serialize};

/// The patient a session is about, bound before any evidence is reviewed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    pub patient_id: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub allergies: Vec<PatientAllergy>,
}

impl PatientContext {
    pub fn new(patient_id: &str) -> CdssResult<Self> {
        let patient_id = NonEmptyText::new(patient_id)
            .map_err(|_| CdssError::InvalidInput("patient id cannot be empty".into()))?;
        Ok(Self {
            patient_id,
            weight_kg: None,
            allergies: Vec::new(),
        })
    }

    pub fn with_weight(mut self, weight_kg: f64) -> CdssResult<Self> {
        validate_weight_kg(weight_kg)?;
        self.weight_kg = Some(weight_kg);
        Ok(self)
    }

    pub fn with_allergies(mut self, allergies: Vec<PatientAllergy>) -> Self {
        self.allergies = allergies;
        self
    }
}

/// Vitals and notes recorded at the clinical findings step. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClinicalFindings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_bpm: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<u32>,
    /// Free text, e.g. `120/80`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ClinicalFindings {
    pub fn validate(&self) -> CdssResult<()> {
        if let Some(t) = self.temperature_c {
            validate_temperature_c(t)?;
        }
        if let Some(p) = self.pulse_bpm {
            validate_pulse_bpm(p)?;
        }
        if let Some(r) = self.respiratory_rate {
            validate_respiratory_rate(r)?;
        }
        if let Some(w) = self.weight_kg {
            validate_weight_kg(w)?;
        }
        if let Some(notes) = &self.notes {
            validate_notes(notes)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_requires_an_id() {
        assert!(PatientContext::new("P-0001").is_ok());
        let err = PatientContext::new("   ").expect_err("blank id");
        assert!(matches!(err, CdssError::InvalidInput(msg) if msg.contains("patient id")));
    }

    #[test]
    fn patient_weight_is_range_checked() {
        let patient = PatientContext::new("P-0001").expect("patient");
        assert!(patient.clone().with_weight(-5.0).is_err());
        let patient = patient.with_weight(18.0).expect("weight");
        assert_eq!(patient.weight_kg, Some(18.0));
    }

    #[test]
    fn findings_validation() {
        let findings = ClinicalFindings {
            temperature_c: Some(39.4),
            pulse_bpm: Some(112),
            weight_kg: Some(64.0),
            ..Default::default()
        };
        assert!(findings.validate().is_ok());
        assert!(!findings.is_empty());
        assert!(ClinicalFindings::default().is_empty());

        let bad = ClinicalFindings {
            temperature_c: Some(93.0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn findings_reject_unknown_fields() {
        let parsed: Result<ClinicalFindings, _> =
            serde_json::from_str(r#"{"temperature_c": 38.5, "spo2": 97}"#);
        assert!(parsed.is_err());
    }
}
