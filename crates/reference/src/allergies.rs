//! Patient allergy lists.
//!
//! The allergy file maps patient identifiers to the allergies recorded for them:
//!
//! ```yaml
//! patients:
//!   P-001:
//!     - name: Azithromycin
//!       severity: severe
//!       reaction: Hives and facial swelling
//! ```

use crate::{non_empty, parse_wire, render_wire, NonEmptyText, ReferenceResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Recorded severity of a patient's reaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllergySeverity {
    Mild,
    Moderate,
    Severe,
    #[default]
    Unknown,
}

impl fmt::Display for AllergySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AllergySeverity::Mild => "mild",
            AllergySeverity::Moderate => "moderate",
            AllergySeverity::Severe => "severe",
            AllergySeverity::Unknown => "unknown severity",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientAllergy {
    pub name: NonEmptyText,
    #[serde(default)]
    pub severity: AllergySeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<String>,
}

impl PatientAllergy {
    pub fn new(name: &str, severity: AllergySeverity) -> ReferenceResult<Self> {
        Ok(Self {
            name: non_empty(name, "allergy name")?,
            severity,
            reaction: None,
        })
    }

    pub fn with_reaction(mut self, reaction: impl Into<String>) -> Self {
        self.reaction = Some(reaction.into());
        self
    }
}

/// Allergy lists keyed by patient identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatientAllergyTable {
    patients: BTreeMap<String, Vec<PatientAllergy>>,
}

impl PatientAllergyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, patient_id: &NonEmptyText, allergies: Vec<PatientAllergy>) {
        self.patients
            .insert(patient_id.as_str().to_owned(), allergies);
    }

    /// Allergies recorded for a patient. A patient with no entry has no known allergies.
    pub fn for_patient(&self, patient_id: &str) -> &[PatientAllergy] {
        self.patients
            .get(patient_id.trim())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct AllergyFileWire {
    #[serde(default)]
    patients: BTreeMap<String, Vec<PatientAllergy>>,
}

/// Allergy file operations.
pub struct Allergies;

impl Allergies {
    pub fn parse(yaml_text: &str) -> ReferenceResult<PatientAllergyTable> {
        let wire: AllergyFileWire = parse_wire(yaml_text, "Allergy list")?;
        let mut table = PatientAllergyTable::new();
        for (patient_id, allergies) in wire.patients {
            table.insert(&non_empty(&patient_id, "patient id")?, allergies);
        }
        Ok(table)
    }

    pub fn render(table: &PatientAllergyTable) -> ReferenceResult<String> {
        render_wire(
            &AllergyFileWire {
                patients: table.patients.clone(),
            },
            "allergy list",
        )
    }
}
