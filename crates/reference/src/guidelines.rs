//! Treatment guideline table.
//!
//! Guidelines are keyed by the exact diagnosis label they treat. Compound diagnoses carry their
//! own explicit entry (for example `Malaria & Typhoid`); labels are never concatenated at runtime.

use crate::{non_empty, parse_wire, render_wire, NonEmptyText, ReferenceError, ReferenceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One line of therapy within a guideline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TherapyLine {
    pub drug: NonEmptyText,
    pub dosage: NonEmptyText,
    pub frequency: NonEmptyText,
    pub duration_days: u32,
}

/// A reference regimen for one diagnosis label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreatmentGuideline {
    pub disease: NonEmptyText,
    pub lines: Vec<TherapyLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Guideline table operations.
pub struct Guidelines;

impl Guidelines {
    /// Parse the guideline table from YAML text (a sequence of guidelines).
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] if the YAML does not match the schema, a disease label appears
    /// twice, a guideline has no lines, or a line has a zero-day duration.
    pub fn parse(yaml_text: &str) -> ReferenceResult<Vec<TreatmentGuideline>> {
        let guidelines: Vec<TreatmentGuideline> = parse_wire(yaml_text, "Guideline table")?;
        Self::validate(&guidelines)?;
        Ok(guidelines)
    }

    pub fn render(guidelines: &[TreatmentGuideline]) -> ReferenceResult<String> {
        render_wire(&guidelines, "guideline table")
    }

    /// Check the invariants a guideline table must hold.
    pub fn validate(guidelines: &[TreatmentGuideline]) -> ReferenceResult<()> {
        let mut seen = HashSet::new();
        for guideline in guidelines {
            if !seen.insert(guideline.disease.as_str()) {
                return Err(ReferenceError::InvalidInput(format!(
                    "duplicate guideline for {}",
                    guideline.disease
                )));
            }
            if guideline.lines.is_empty() {
                return Err(ReferenceError::InvalidInput(format!(
                    "guideline for {} has no lines of therapy",
                    guideline.disease
                )));
            }
            if let Some(line) = guideline.lines.iter().find(|l| l.duration_days == 0) {
                return Err(ReferenceError::InvalidInput(format!(
                    "guideline for {}: {} has a zero-day duration",
                    guideline.disease, line.drug
                )));
            }
        }
        Ok(())
    }
}

impl TherapyLine {
    pub fn new(
        drug: &str,
        dosage: &str,
        frequency: &str,
        duration_days: u32,
    ) -> ReferenceResult<Self> {
        Ok(Self {
            drug: non_empty(drug, "drug")?,
            dosage: non_empty(dosage, "dosage")?,
            frequency: non_empty(frequency, "frequency")?,
            duration_days,
        })
    }
}
