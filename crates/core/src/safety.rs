//! Prescription safety checker.
//!
//! Stateless: every call re-derives the full warning list from the current drug list, so a
//! caller that runs it after each draft edit can never show a stale warning. Warnings are
//! advisory and never block saving.

use cdss_reference::{InteractionGraph, PatientAllergy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Interaction,
    Allergy,
}

/// Severity implied by the kind of finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpliedSeverity {
    Major,
    /// Hard contraindication.
    Contraindicated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyWarning {
    pub kind: WarningKind,
    pub message: String,
    pub severity: ImpliedSeverity,
    /// Drugs the warning is about, in draft order.
    pub drugs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergy: Option<String>,
}

impl SafetyWarning {
    pub fn is_hard_contraindication(&self) -> bool {
        self.severity == ImpliedSeverity::Contraindicated
    }
}

/// Decides whether a drug is covered by a recorded allergy.
pub trait AllergyMatcher: Send + Sync {
    fn matches(&self, drug_name: &str, allergy_name: &str) -> bool;
}

/// Case-insensitive substring match: the drug name contains the allergy name.
///
/// Known to over-match (an allergy recorded as `sulfa` flags any drug whose name contains
/// those letters); swap the matcher on [`SafetyChecker`] to change it.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubstringAllergyMatcher;

impl AllergyMatcher for SubstringAllergyMatcher {
    fn matches(&self, drug_name: &str, allergy_name: &str) -> bool {
        let allergy = allergy_name.trim().to_lowercase();
        !allergy.is_empty() && drug_name.to_lowercase().contains(&allergy)
    }
}

#[derive(Clone)]
pub struct SafetyChecker {
    matcher: Arc<dyn AllergyMatcher>,
}

impl Default for SafetyChecker {
    fn default() -> Self {
        Self::new(Arc::new(SubstringAllergyMatcher))
    }
}

impl std::fmt::Debug for SafetyChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyChecker").finish_non_exhaustive()
    }
}

impl SafetyChecker {
    pub fn new(matcher: Arc<dyn AllergyMatcher>) -> Self {
        Self { matcher }
    }

    /// Check a drug list against the interaction graph and the patient's allergies.
    ///
    /// Interaction warnings come first, one per interacting pair (draft order of the first
    /// drug, then the second), followed by allergy warnings per drug and allergy.
    pub fn check(
        &self,
        drugs: &[&str],
        graph: &InteractionGraph,
        allergies: &[PatientAllergy],
    ) -> Vec<SafetyWarning> {
        let mut warnings = Vec::new();

        for (i, first) in drugs.iter().enumerate() {
            for second in &drugs[i + 1..] {
                if graph.interacts(first, second) {
                    warnings.push(SafetyWarning {
                        kind: WarningKind::Interaction,
                        message: format!("{first} interacts with {second}"),
                        severity: ImpliedSeverity::Major,
                        drugs: vec![(*first).to_owned(), (*second).to_owned()],
                        allergy: None,
                    });
                }
            }
        }

        for drug in drugs {
            for allergy in allergies {
                if !self.matcher.matches(drug, allergy.name.as_str()) {
                    continue;
                }
                let reaction = allergy
                    .reaction
                    .as_deref()
                    .map(|r| format!(", reaction: {r}"))
                    .unwrap_or_default();
                warnings.push(SafetyWarning {
                    kind: WarningKind::Allergy,
                    message: format!(
                        "{drug} is contraindicated: patient allergy to {} ({}{reaction})",
                        allergy.name, allergy.severity
                    ),
                    severity: ImpliedSeverity::Contraindicated,
                    drugs: vec![(*drug).to_owned()],
                    allergy: Some(allergy.name.as_str().to_owned()),
                });
            }
        }

        if !warnings.is_empty() {
            tracing::debug!(count = warnings.len(), "prescription safety warnings");
        }
        warnings
    }
}

/// [`SafetyChecker::check`] with the default substring allergy matcher.
pub fn check_safety(
    drugs: &[&str],
    graph: &InteractionGraph,
    allergies: &[PatientAllergy],
) -> Vec<SafetyWarning> {
    SafetyChecker::default().check(drugs, graph, allergies)
}
