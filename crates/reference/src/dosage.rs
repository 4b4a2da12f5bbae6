//! Weight-banded dosage schedules.
//!
//! Each schedule is a step function over body weight: bands are ordered by their exclusive
//! upper bound and the last band may be open-ended.
//!
//! ```yaml
//! - drug: Artemether-Lumefantrine
//!   bands:
//!     - below_kg: 15
//!       dosage: 1 tablet
//!     - dosage: 4 tablets
//! ```

use crate::{parse_wire, render_wire, NonEmptyText, ReferenceError, ReferenceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One step of a schedule. `below_kg: None` covers every remaining weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DosageBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below_kg: Option<f64>,
    pub dosage: NonEmptyText,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DosageSchedule {
    pub drug: NonEmptyText,
    pub bands: Vec<DosageBand>,
}

impl DosageSchedule {
    /// The dosage for `weight_kg`, or `None` when the weight falls past a closed last band.
    pub fn band_for(&self, weight_kg: f64) -> Option<&NonEmptyText> {
        self.bands
            .iter()
            .find(|band| band.below_kg.map_or(true, |limit| weight_kg < limit))
            .map(|band| &band.dosage)
    }
}

/// Dosage table operations.
pub struct Dosage;

impl Dosage {
    /// Parse dosage schedules from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] if the YAML does not match the schema or any schedule breaks
    /// the band ordering rules (see [`Dosage::validate`]).
    pub fn parse(yaml_text: &str) -> ReferenceResult<Vec<DosageSchedule>> {
        let schedules: Vec<DosageSchedule> = parse_wire(yaml_text, "Dosage table")?;
        Self::validate(&schedules)?;
        Ok(schedules)
    }

    pub fn render(schedules: &[DosageSchedule]) -> ReferenceResult<String> {
        render_wire(&schedules, "dosage table")
    }

    /// Bands must be non-empty, strictly increasing, finite and positive, with only the last
    /// band allowed to be open-ended. Drugs may not repeat (case-insensitive).
    pub fn validate(schedules: &[DosageSchedule]) -> ReferenceResult<()> {
        let mut seen = HashSet::new();
        for schedule in schedules {
            let drug = &schedule.drug;
            if !seen.insert(drug.match_key()) {
                return Err(ReferenceError::InvalidInput(format!(
                    "duplicate dosage schedule for {drug}"
                )));
            }
            if schedule.bands.is_empty() {
                return Err(ReferenceError::InvalidInput(format!(
                    "dosage schedule for {drug} has no bands"
                )));
            }

            let last = schedule.bands.len() - 1;
            let mut previous: Option<f64> = None;
            for (i, band) in schedule.bands.iter().enumerate() {
                match band.below_kg {
                    None if i != last => {
                        return Err(ReferenceError::InvalidInput(format!(
                            "dosage schedule for {drug}: only the last band may be open-ended"
                        )));
                    }
                    None => {}
                    Some(limit) => {
                        if !limit.is_finite() || limit <= 0.0 {
                            return Err(ReferenceError::InvalidInput(format!(
                                "dosage schedule for {drug}: band limit must be a positive weight"
                            )));
                        }
                        if previous.is_some_and(|p| limit <= p) {
                            return Err(ReferenceError::InvalidInput(format!(
                                "dosage schedule for {drug}: bands must increase"
                            )));
                        }
                        previous = Some(limit);
                    }
                }
            }
        }
        Ok(())
    }
}
