//! Input validation utilities.
//!
//! Range checks for clinician-entered values before they reach the session. The ranges are
//! plausibility bounds to catch typing errors, not clinical reference ranges.

use crate::{CdssError, CdssResult};

const TEMPERATURE_RANGE_C: (f64, f64) = (25.0, 45.0);
const WEIGHT_RANGE_KG: (f64, f64) = (0.2, 400.0);
const PULSE_RANGE_BPM: (u32, u32) = (20, 300);
const RESPIRATORY_RANGE: (u32, u32) = (4, 80);
const MAX_NOTES_LEN: usize = 4_000;

fn check_f64(value: f64, (min, max): (f64, f64), what: &str, unit: &str) -> CdssResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(CdssError::InvalidInput(format!(
            "{what} must be between {min} and {max} {unit}"
        )));
    }
    Ok(())
}

fn check_u32(value: u32, (min, max): (u32, u32), what: &str, unit: &str) -> CdssResult<()> {
    if value < min || value > max {
        return Err(CdssError::InvalidInput(format!(
            "{what} must be between {min} and {max} {unit}"
        )));
    }
    Ok(())
}

/// Validates a body weight in kilograms.
///
/// # Errors
///
/// Returns `CdssError::InvalidInput` for non-finite values or weights outside 0.2–400 kg.
pub fn validate_weight_kg(weight_kg: f64) -> CdssResult<()> {
    check_f64(weight_kg, WEIGHT_RANGE_KG, "weight", "kg")
}

pub fn validate_temperature_c(temperature_c: f64) -> CdssResult<()> {
    check_f64(temperature_c, TEMPERATURE_RANGE_C, "temperature", "°C")
}

pub fn validate_pulse_bpm(pulse_bpm: u32) -> CdssResult<()> {
    check_u32(pulse_bpm, PULSE_RANGE_BPM, "pulse", "bpm")
}

pub fn validate_respiratory_rate(rate: u32) -> CdssResult<()> {
    check_u32(rate, RESPIRATORY_RANGE, "respiratory rate", "breaths/min")
}

pub fn validate_notes(notes: &str) -> CdssResult<()> {
    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(CdssError::InvalidInput(format!(
            "notes exceed maximum length of {MAX_NOTES_LEN} characters"
        )));
    }
    Ok(())
}
