//! Constants used throughout the decision support core.
//!
//! Classification thresholds are percentages. They are the defaults for
//! [`ClassificationThresholds`](crate::ClassificationThresholds) and must not drift: verdicts are
//! compared across sessions and releases.

/// Both primary diseases at or above this ⇒ co-infection.
pub const CO_INFECTION_THRESHOLD: u32 = 60;

/// A single disease at or above this ⇒ that disease is the label.
pub const SINGLE_DIAGNOSIS_THRESHOLD: u32 = 70;

/// A single-disease label at or above this is high confidence (medium otherwise).
pub const HIGH_CONFIDENCE_THRESHOLD: u32 = 85;

/// Either primary disease at or above this ⇒ suspected infection.
pub const SUSPECTED_THRESHOLD: u32 = 50;

/// Diseases at or above this appear in the differential list.
pub const DIFFERENTIAL_DISPLAY_THRESHOLD: u32 = 60;

/// Dosage text used when a drug has no weight bands.
pub const AS_PRESCRIBED: &str = "as prescribed";

/// Separator between the two diseases of a co-infection guideline key.
pub const CO_INFECTION_KEY_SEPARATOR: &str = " & ";

/// Default directory for saved diagnosis records when none is configured.
pub const DEFAULT_RECORDS_DIR: &str = "diagnosis_records";

/// Reference-data filenames inside a reference directory.
pub const CATALOG_FILENAME: &str = "catalog.yaml";
pub const GUIDELINES_FILENAME: &str = "guidelines.yaml";
pub const DOSAGE_FILENAME: &str = "dosage.yaml";
pub const INTERACTIONS_FILENAME: &str = "interactions.yaml";
pub const ALLERGIES_FILENAME: &str = "allergies.yaml";
