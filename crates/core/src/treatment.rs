//! Treatment guideline resolution and weight-banded dosing.

use crate::constants::AS_PRESCRIBED;
use crate::error::CdssResult;
use cdss_reference::{DosageSchedule, Dosage, Guidelines, TreatmentGuideline};
use std::collections::HashMap;

/// Guidelines keyed by exact diagnosis label.
#[derive(Clone, Debug, Default)]
pub struct GuidelineTable {
    guidelines: Vec<TreatmentGuideline>,
}

impl GuidelineTable {
    pub fn new(guidelines: Vec<TreatmentGuideline>) -> CdssResult<Self> {
        Guidelines::validate(&guidelines)?;
        Ok(Self { guidelines })
    }

    pub fn builtin() -> CdssResult<Self> {
        Self::new(cdss_reference::builtin::guidelines()?)
    }

    /// Look up the guideline for `label`.
    ///
    /// Matching is exact: `malaria` does not find `Malaria`, and a co-infection resolves only
    /// through its own `A & B` entry. `None` means the clinician builds the prescription by hand.
    pub fn resolve(&self, label: &str) -> Option<&TreatmentGuideline> {
        let found = self.guidelines.iter().find(|g| g.disease.as_str() == label);
        if found.is_none() {
            tracing::warn!(label, "no treatment guideline for diagnosis");
        }
        found
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.guidelines.iter().map(|g| g.disease.as_str())
    }
}

/// Per-drug weight-band step functions.
#[derive(Clone, Debug, Default)]
pub struct DosageCalculator {
    schedules: HashMap<String, DosageSchedule>,
}

impl DosageCalculator {
    pub fn new(schedules: Vec<DosageSchedule>) -> CdssResult<Self> {
        Dosage::validate(&schedules)?;
        Ok(Self {
            schedules: schedules
                .into_iter()
                .map(|s| (s.drug.match_key(), s))
                .collect(),
        })
    }

    pub fn builtin() -> CdssResult<Self> {
        Self::new(cdss_reference::builtin::dosage_schedules()?)
    }

    /// Dosage text for `drug_name` at `weight_kg`.
    ///
    /// Approximate decision support only. Never empty: drugs without bands, weights past a
    /// closed last band, and weights that are not a positive finite number all yield
    /// [`AS_PRESCRIBED`].
    pub fn dosage_for(&self, drug_name: &str, weight_kg: f64) -> String {
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return AS_PRESCRIBED.to_owned();
        }
        self.schedules
            .get(&drug_name.trim().to_lowercase())
            .and_then(|schedule| schedule.band_for(weight_kg))
            .map(|dosage| dosage.as_str().to_owned())
            .unwrap_or_else(|| AS_PRESCRIBED.to_owned())
    }

    pub fn has_schedule(&self, drug_name: &str) -> bool {
        self.schedules
            .contains_key(&drug_name.trim().to_lowercase())
    }
}
