//! Evidence strength categories.
//!
//! Category names arrive as strings in reference data; they are parsed into a closed enum at the
//! boundary so an unknown category is a parse error rather than a silent low weight.

use crate::ReferenceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weight of the strongest category. Used as the per-symptom normalisation ceiling.
pub const MAX_CATEGORY_WEIGHT: u32 = 4;

/// How strongly a symptom implies disease presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymptomCategory {
    VeryStrong,
    Strong,
    Weak,
    VeryWeak,
}

impl SymptomCategory {
    /// All categories, strongest first.
    pub const ALL: [SymptomCategory; 4] = [
        SymptomCategory::VeryStrong,
        SymptomCategory::Strong,
        SymptomCategory::Weak,
        SymptomCategory::VeryWeak,
    ];

    pub fn weight(self) -> u32 {
        match self {
            SymptomCategory::VeryStrong => 4,
            SymptomCategory::Strong => 3,
            SymptomCategory::Weak => 2,
            SymptomCategory::VeryWeak => 1,
        }
    }

    pub fn from_weight(weight: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.weight() == weight)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymptomCategory::VeryStrong => "very-strong",
            SymptomCategory::Strong => "strong",
            SymptomCategory::Weak => "weak",
            SymptomCategory::VeryWeak => "very-weak",
        }
    }

    /// Whether this category alone warrants imaging follow-up.
    pub fn is_very_strong(self) -> bool {
        self.weight() == MAX_CATEGORY_WEIGHT
    }
}

impl fmt::Display for SymptomCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymptomCategory {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalised)
            .ok_or_else(|| ReferenceError::InvalidInput(format!("unknown symptom category: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_follow_category_strength() {
        let weights: Vec<u32> = SymptomCategory::ALL.iter().map(|c| c.weight()).collect();
        assert_eq!(weights, vec![4, 3, 2, 1]);
        assert_eq!(SymptomCategory::from_weight(3), Some(SymptomCategory::Strong));
        assert_eq!(SymptomCategory::from_weight(0), None);
        assert_eq!(SymptomCategory::from_weight(5), None);
    }

    #[test]
    fn parses_common_spellings() {
        assert_eq!(
            "Very Strong".parse::<SymptomCategory>().expect("parse"),
            SymptomCategory::VeryStrong
        );
        assert_eq!(
            "very_weak".parse::<SymptomCategory>().expect("parse"),
            SymptomCategory::VeryWeak
        );
    }

    #[test]
    fn rejects_unknown_category() {
        let err = "moderate".parse::<SymptomCategory>().expect_err("unknown");
        assert!(matches!(err, ReferenceError::InvalidInput(msg) if msg.contains("moderate")));
    }

    #[test]
    fn only_the_top_category_is_very_strong() {
        assert!(SymptomCategory::VeryStrong.is_very_strong());
        assert!(!SymptomCategory::Strong.is_very_strong());
    }
}
