//! Built-in reference tables.
//!
//! These ship with the crate so the pipeline runs without an external reference-data
//! directory. They go through the same parsers as any externally supplied file.

use crate::{
    Allergies, Catalog, CatalogData, Dosage, DosageSchedule, Guidelines, InteractionGraph,
    Interactions, PatientAllergyTable, ReferenceResult, TreatmentGuideline,
};

pub const CATALOG_YAML: &str = include_str!("../data/catalog.yaml");
pub const GUIDELINES_YAML: &str = include_str!("../data/guidelines.yaml");
pub const DOSAGE_YAML: &str = include_str!("../data/dosage.yaml");
pub const INTERACTIONS_YAML: &str = include_str!("../data/interactions.yaml");
pub const ALLERGIES_YAML: &str = include_str!("../data/allergies.yaml");

pub fn catalog() -> ReferenceResult<CatalogData> {
    Catalog::parse(CATALOG_YAML)
}

pub fn guidelines() -> ReferenceResult<Vec<TreatmentGuideline>> {
    Guidelines::parse(GUIDELINES_YAML)
}

pub fn dosage_schedules() -> ReferenceResult<Vec<DosageSchedule>> {
    Dosage::parse(DOSAGE_YAML)
}

pub fn interactions() -> ReferenceResult<InteractionGraph> {
    Interactions::parse(INTERACTIONS_YAML)
}

/// Demo allergy lists for the sample patients used by the CLI.
pub fn allergies() -> ReferenceResult<PatientAllergyTable> {
    Allergies::parse(ALLERGIES_YAML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SymptomCategory;

    #[test]
    fn builtin_tables_parse() {
        let catalog = catalog().expect("catalog");
        assert_eq!(catalog.symptoms.len(), 14);
        assert_eq!(catalog.diseases.len(), 2);
        assert_eq!(guidelines().expect("guidelines").len(), 3);
        assert_eq!(dosage_schedules().expect("dosage").len(), 3);
        assert!(!interactions().expect("interactions").is_empty());
        assert_eq!(allergies().expect("allergies").for_patient("P-0002").len(), 2);
    }

    #[test]
    fn builtin_profiles_only_reference_catalog_symptoms() {
        let catalog = catalog().expect("catalog");
        for profile in &catalog.diseases {
            for name in profile.symptom_names() {
                let symptom = catalog
                    .symptoms
                    .iter()
                    .find(|s| s.name.eq_ignore_case(name.as_str()))
                    .unwrap_or_else(|| panic!("{name} missing from catalog"));
                assert_eq!(profile.category_of(name.as_str()), Some(symptom.category));
            }
        }
    }

    #[test]
    fn builtin_co_infection_guideline_has_explicit_key() {
        let table = guidelines().expect("guidelines");
        assert!(table
            .iter()
            .any(|g| g.disease.as_str() == "Malaria & Typhoid"));
    }

    #[test]
    fn diarrhea_is_a_very_weak_malaria_only_symptom() {
        let catalog = catalog().expect("catalog");
        let names: Vec<Option<SymptomCategory>> = catalog
            .diseases
            .iter()
            .map(|d| d.category_of("Diarrhea"))
            .collect();
        assert_eq!(names, vec![Some(SymptomCategory::VeryWeak), None]);
    }
}
