//! Reference data boundary for the clinical decision support pipeline.
//!
//! This crate provides **domain-level reference types** and **YAML wire helpers** for the
//! read-only tables the pipeline consumes at session start:
//! - the evidence catalog (symptoms and disease symptom-set profiles)
//! - treatment guidelines keyed by diagnosis label
//! - weight-banded dosage schedules
//! - the drug interaction graph
//! - per-patient allergy lists
//!
//! Every table follows the same shape: a strict wire model (`deny_unknown_fields`) parsed with
//! `serde_path_to_error`, translated into domain types that enforce the table's invariants.
//! Nothing here scores, classifies or checks; that lives in `cdss-core`.

pub mod allergies;
pub mod builtin;
pub mod catalog;
pub mod category;
pub mod dosage;
pub mod guidelines;
pub mod interactions;

// Re-export facades
pub use allergies::Allergies;
pub use catalog::Catalog;
pub use dosage::Dosage;
pub use guidelines::Guidelines;
pub use interactions::Interactions;

// Re-export public domain-level types
pub use allergies::{AllergySeverity, PatientAllergy, PatientAllergyTable};
pub use catalog::{CatalogData, DiseaseProfile, Symptom};
pub use category::{SymptomCategory, MAX_CATEGORY_WEIGHT};
pub use dosage::{DosageBand, DosageSchedule};
pub use guidelines::{TherapyLine, TreatmentGuideline};
pub use interactions::InteractionGraph;

pub use cdss_types::NonEmptyText;

use serde::de::DeserializeOwned;

/// Errors returned by the reference data boundary.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`ReferenceError`].
pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Deserialize a wire model, reporting the path of the first field that does not match.
pub(crate) fn parse_wire<T: DeserializeOwned>(yaml_text: &str, what: &str) -> ReferenceResult<T> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    match serde_path_to_error::deserialize::<_, T>(deserializer) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(ReferenceError::Translation(format!(
                "{what} schema mismatch at {path}: {source}"
            )))
        }
    }
}

/// Serialize a wire model to YAML text.
pub(crate) fn render_wire<T: serde::Serialize>(wire: &T, what: &str) -> ReferenceResult<String> {
    serde_yaml::to_string(wire)
        .map_err(|e| ReferenceError::Translation(format!("Failed to serialize {what}: {e}")))
}

/// Build a [`NonEmptyText`] or report which field was blank.
pub(crate) fn non_empty(value: &str, field: &str) -> ReferenceResult<NonEmptyText> {
    NonEmptyText::new(value)
        .map_err(|_| ReferenceError::InvalidInput(format!("{field} cannot be empty")))
}
