//! Indexed evidence catalog.
//!
//! Wraps the parsed catalog tables with the lookups the scorer needs: symptom by id, and for
//! every disease a precomputed set of lowercase symptom names. Matching is exact and
//! case-insensitive against that set; substring matching is never used.

use crate::error::{CdssError, CdssResult};
use cdss_reference::{CatalogData, DiseaseProfile, NonEmptyText, Symptom};
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug)]
pub struct EvidenceCatalog {
    symptoms: Vec<Symptom>,
    by_id: BTreeMap<u32, usize>,
    diseases: Vec<IndexedProfile>,
}

#[derive(Clone, Debug)]
struct IndexedProfile {
    profile: DiseaseProfile,
    members: HashSet<String>,
}

impl EvidenceCatalog {
    /// Index catalog tables, checking that they agree with each other.
    ///
    /// # Errors
    ///
    /// Returns [`CdssError::InvalidInput`] if:
    /// - no disease profiles are present,
    /// - a symptom id is duplicated,
    /// - a profile names a symptom the catalog does not contain,
    /// - a profile files a symptom under a different category than the catalog gives it.
    pub fn new(data: CatalogData) -> CdssResult<Self> {
        if data.diseases.is_empty() {
            return Err(CdssError::InvalidInput(
                "catalog must model at least one disease".into(),
            ));
        }

        let mut by_id = BTreeMap::new();
        let mut by_name = BTreeMap::new();
        for (i, symptom) in data.symptoms.iter().enumerate() {
            if by_id.insert(symptom.id, i).is_some() {
                return Err(CdssError::InvalidInput(format!(
                    "duplicate symptom id {}",
                    symptom.id
                )));
            }
            by_name.insert(symptom.name.match_key(), i);
        }

        let mut diseases = Vec::with_capacity(data.diseases.len());
        for profile in data.diseases {
            let mut members = HashSet::new();
            for (category, names) in &profile.symptom_sets {
                for name in names {
                    let symptom = by_name
                        .get(&name.match_key())
                        .map(|&i| &data.symptoms[i])
                        .ok_or_else(|| {
                            CdssError::InvalidInput(format!(
                                "{} lists unknown symptom {name}",
                                profile.name
                            ))
                        })?;
                    if symptom.category != *category {
                        return Err(CdssError::InvalidInput(format!(
                            "{} files {name} as {category} but the catalog says {}",
                            profile.name, symptom.category
                        )));
                    }
                    members.insert(name.match_key());
                }
            }
            diseases.push(IndexedProfile { profile, members });
        }

        Ok(Self {
            symptoms: data.symptoms,
            by_id,
            diseases,
        })
    }

    /// The catalog shipped with `cdss-reference`.
    pub fn builtin() -> CdssResult<Self> {
        Self::new(cdss_reference::builtin::catalog()?)
    }

    pub fn symptom(&self, id: u32) -> Option<&Symptom> {
        self.by_id.get(&id).map(|&i| &self.symptoms[i])
    }

    /// Symptoms in catalog order.
    pub fn symptoms(&self) -> &[Symptom] {
        &self.symptoms
    }

    pub fn diseases(&self) -> impl Iterator<Item = &DiseaseProfile> {
        self.diseases.iter().map(|d| &d.profile)
    }

    /// Disease names in catalog order. The first two are the primary pair for classification.
    pub fn disease_names(&self) -> Vec<&str> {
        self.diseases
            .iter()
            .map(|d| d.profile.name.as_str())
            .collect()
    }

    /// Resolve a disease name case-insensitively to its catalog spelling.
    pub fn disease(&self, name: &str) -> Option<&NonEmptyText> {
        self.diseases
            .iter()
            .map(|d| &d.profile.name)
            .find(|n| n.eq_ignore_case(name))
    }

    /// Whether `disease` lists `symptom_name` in any of its symptom sets.
    pub fn disease_has_symptom(&self, disease: &str, symptom_name: &str) -> bool {
        let key = symptom_name.trim().to_lowercase();
        self.diseases
            .iter()
            .find(|d| d.profile.name.eq_ignore_case(disease))
            .is_some_and(|d| d.members.contains(&key))
    }

    /// Diseases whose symptom sets contain `symptom`, in catalog order.
    pub(crate) fn diseases_with(&self, symptom: &Symptom) -> impl Iterator<Item = &str> {
        let key = symptom.name.match_key();
        self.diseases
            .iter()
            .filter(move |d| d.members.contains(&key))
            .map(|d| d.profile.name.as_str())
    }
}
