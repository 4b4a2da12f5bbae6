//! Prescription draft owned by a diagnosis session.

use crate::error::{CdssError, CdssResult};
use cdss_reference::{NonEmptyText, TherapyLine};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub drug: NonEmptyText,
    pub dosage: String,
    /// Frequency and administration notes, e.g. `Twice daily`.
    pub instructions: String,
    pub duration_days: u32,
    /// Dispensed doses for the whole course.
    pub quantity: u32,
}

impl PrescriptionItem {
    pub fn new(
        drug: &str,
        dosage: impl Into<String>,
        instructions: impl Into<String>,
        duration_days: u32,
    ) -> CdssResult<Self> {
        let drug = NonEmptyText::new(drug)
            .map_err(|_| CdssError::InvalidInput("drug name cannot be empty".into()))?;
        let instructions = instructions.into();
        let quantity = doses_per_day(&instructions).saturating_mul(duration_days);
        Ok(Self {
            drug,
            dosage: dosage.into(),
            instructions,
            duration_days,
            quantity,
        })
    }

    /// Seed an item from a guideline line. `dosage` replaces the line's own dosage text, which
    /// is how weight-banded doses reach the draft.
    pub fn from_line(line: &TherapyLine, dosage: Option<String>) -> Self {
        let instructions = line.frequency.as_str().to_owned();
        Self {
            drug: line.drug.clone(),
            dosage: dosage.unwrap_or_else(|| line.dosage.as_str().to_owned()),
            quantity: doses_per_day(&instructions).saturating_mul(line.duration_days),
            instructions,
            duration_days: line.duration_days,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Rough doses-per-day reading of a frequency text.
///
/// Understands `once/twice/three times/four times daily` and `every N hours`; anything else
/// counts as one dose a day.
pub fn doses_per_day(frequency: &str) -> u32 {
    let text = frequency.to_lowercase();
    let words: Vec<&str> = text.split_whitespace().collect();

    if let Some(pos) = words.iter().position(|w| *w == "every") {
        if let Some(hours) = words.get(pos + 1).and_then(|w| w.parse::<u32>().ok()) {
            if hours > 0 && words.get(pos + 2).is_some_and(|w| w.starts_with("hour")) {
                return (24 / hours).max(1);
            }
        }
    }

    if text.contains("four times") {
        4
    } else if text.contains("three times") || text.contains("thrice") {
        3
    } else if text.contains("twice") || text.contains("two times") {
        2
    } else {
        1
    }
}

/// Ordered drug lines being prescribed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrescriptionDraft {
    items: Vec<PrescriptionItem>,
}

impl PrescriptionDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[PrescriptionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: PrescriptionItem) {
        self.items.push(item);
    }

    pub fn remove(&mut self, index: usize) -> CdssResult<PrescriptionItem> {
        self.check_index(index)?;
        Ok(self.items.remove(index))
    }

    pub fn replace(&mut self, index: usize, item: PrescriptionItem) -> CdssResult<PrescriptionItem> {
        self.check_index(index)?;
        Ok(std::mem::replace(&mut self.items[index], item))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drug names in draft order, as handed to the safety checker.
    pub fn drug_names(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.drug.as_str()).collect()
    }

    fn check_index(&self, index: usize) -> CdssResult<()> {
        if index >= self.items.len() {
            return Err(CdssError::InvalidInput(format!(
                "no prescription line at position {index} (draft has {})",
                self.items.len()
            )));
        }
        Ok(())
    }
}

impl FromIterator<PrescriptionItem> for PrescriptionDraft {
    fn from_iter<I: IntoIterator<Item = PrescriptionItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
