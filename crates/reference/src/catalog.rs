//! Evidence catalog wire model and translation helpers.
//!
//! The catalog file carries two tables:
//! - `symptoms`: every selectable symptom with its id and category
//! - `diseases`: for each modelled disease, the symptom names it is associated with, grouped by
//!   category
//!
//! Structural checks (unique ids, unique names, no duplicate membership) happen here. Cross-table
//! checks (every profile name resolves to a catalog symptom) happen when `cdss-core` indexes the
//! data, because catalogs can also be assembled in code.

use crate::category::SymptomCategory;
use crate::{non_empty, parse_wire, render_wire, NonEmptyText, ReferenceError, ReferenceResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// Public domain-level types
// ============================================================================

/// A selectable symptom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: u32,
    pub name: NonEmptyText,
    pub category: SymptomCategory,
}

impl Symptom {
    pub fn new(id: u32, name: &str, category: SymptomCategory) -> ReferenceResult<Self> {
        Ok(Self {
            id,
            name: non_empty(name, "symptom name")?,
            category,
        })
    }

    pub fn weight(&self) -> u32 {
        self.category.weight()
    }

    pub fn category_name(&self) -> &'static str {
        self.category.as_str()
    }
}

/// The symptom names associated with one disease, grouped by category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseProfile {
    pub name: NonEmptyText,
    pub symptom_sets: BTreeMap<SymptomCategory, Vec<NonEmptyText>>,
}

impl DiseaseProfile {
    /// Every symptom name in the profile, strongest category first.
    pub fn symptom_names(&self) -> impl Iterator<Item = &NonEmptyText> {
        self.symptom_sets.values().flatten()
    }

    /// The category this profile files `symptom_name` under, if any.
    pub fn category_of(&self, symptom_name: &str) -> Option<SymptomCategory> {
        self.symptom_sets
            .iter()
            .find(|(_, names)| names.iter().any(|n| n.eq_ignore_case(symptom_name)))
            .map(|(category, _)| *category)
    }
}

/// Domain-level carrier for a whole catalog file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogData {
    pub symptoms: Vec<Symptom>,
    pub diseases: Vec<DiseaseProfile>,
}

// ============================================================================
// Public Catalog operations
// ============================================================================

/// Catalog operations.
///
/// Zero-sized namespace for parsing and rendering the catalog file.
pub struct Catalog;

impl Catalog {
    /// Parse a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] if:
    /// - the YAML does not match the wire schema (unknown keys, unknown category names),
    /// - a symptom id or symptom name appears twice,
    /// - a disease name appears twice, or a profile lists the same symptom twice,
    /// - any name is blank.
    pub fn parse(yaml_text: &str) -> ReferenceResult<CatalogData> {
        let wire: CatalogWire = parse_wire(yaml_text, "Catalog")?;
        wire_to_domain(wire)
    }

    /// Render a catalog as YAML text.
    pub fn render(data: &CatalogData) -> ReferenceResult<String> {
        render_wire(&domain_to_wire(data), "catalog")
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct CatalogWire {
    symptoms: Vec<SymptomWire>,
    #[serde(default)]
    diseases: Vec<DiseaseWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct SymptomWire {
    id: u32,
    name: String,
    category: SymptomCategory,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct DiseaseWire {
    name: String,
    symptoms: SymptomSetsWire,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct SymptomSetsWire {
    #[serde(rename = "very-strong", default, skip_serializing_if = "Vec::is_empty")]
    very_strong: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    strong: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    weak: Vec<String>,
    #[serde(rename = "very-weak", default, skip_serializing_if = "Vec::is_empty")]
    very_weak: Vec<String>,
}

impl SymptomSetsWire {
    fn by_category(self) -> [(SymptomCategory, Vec<String>); 4] {
        [
            (SymptomCategory::VeryStrong, self.very_strong),
            (SymptomCategory::Strong, self.strong),
            (SymptomCategory::Weak, self.weak),
            (SymptomCategory::VeryWeak, self.very_weak),
        ]
    }
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: CatalogWire) -> ReferenceResult<CatalogData> {
    let mut seen_ids = HashSet::new();
    let mut seen_names = HashSet::new();
    let mut symptoms = Vec::with_capacity(wire.symptoms.len());

    for s in wire.symptoms {
        let symptom = Symptom::new(s.id, &s.name, s.category)?;
        if !seen_ids.insert(symptom.id) {
            return Err(ReferenceError::InvalidInput(format!(
                "duplicate symptom id: {}",
                symptom.id
            )));
        }
        if !seen_names.insert(symptom.name.match_key()) {
            return Err(ReferenceError::InvalidInput(format!(
                "duplicate symptom name: {}",
                symptom.name
            )));
        }
        symptoms.push(symptom);
    }

    let mut seen_diseases = HashSet::new();
    let mut diseases = Vec::with_capacity(wire.diseases.len());

    for d in wire.diseases {
        let name = non_empty(&d.name, "disease name")?;
        if !seen_diseases.insert(name.match_key()) {
            return Err(ReferenceError::InvalidInput(format!(
                "duplicate disease: {name}"
            )));
        }

        let mut members = HashSet::new();
        let mut symptom_sets = BTreeMap::new();
        for (category, names) in d.symptoms.by_category() {
            if names.is_empty() {
                continue;
            }
            let mut set = Vec::with_capacity(names.len());
            for raw in names {
                let symptom_name = non_empty(&raw, "profile symptom name")?;
                if !members.insert(symptom_name.match_key()) {
                    return Err(ReferenceError::InvalidInput(format!(
                        "disease {name} lists symptom {symptom_name} more than once"
                    )));
                }
                set.push(symptom_name);
            }
            symptom_sets.insert(category, set);
        }

        diseases.push(DiseaseProfile { name, symptom_sets });
    }

    Ok(CatalogData { symptoms, diseases })
}

fn domain_to_wire(data: &CatalogData) -> CatalogWire {
    let names = |profile: &DiseaseProfile, category: SymptomCategory| -> Vec<String> {
        profile
            .symptom_sets
            .get(&category)
            .map(|set| set.iter().map(|n| n.as_str().to_owned()).collect())
            .unwrap_or_default()
    };

    CatalogWire {
        symptoms: data
            .symptoms
            .iter()
            .map(|s| SymptomWire {
                id: s.id,
                name: s.name.as_str().to_owned(),
                category: s.category,
            })
            .collect(),
        diseases: data
            .diseases
            .iter()
            .map(|d| DiseaseWire {
                name: d.name.as_str().to_owned(),
                symptoms: SymptomSetsWire {
                    very_strong: names(d, SymptomCategory::VeryStrong),
                    strong: names(d, SymptomCategory::Strong),
                    weak: names(d, SymptomCategory::Weak),
                    very_weak: names(d, SymptomCategory::VeryWeak),
                },
            })
            .collect(),
    }
}
