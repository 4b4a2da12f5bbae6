//! # CDSS Core
//!
//! Core decision logic for the clinical decision support pipeline.
//!
//! This crate contains the rule engine and the wizard that drives it:
//! - Evidence catalog indexing and the weighted diagnostic scorer
//! - The threshold classifier (label, confidence tier, imaging flag, differentials)
//! - Treatment guideline resolution and weight-banded dosing
//! - The prescription safety checker (interactions and allergy contraindications)
//! - The diagnosis workflow state machine and the record it saves
//!
//! The pipeline is synchronous and pure. The only `async` seams are the collaborators a
//! session fetches reference data from and hands its record to ([`ReferenceSource`],
//! [`RecordSink`]).
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `cdss-api-rest` and
//! `cdss-cli`.

pub mod catalog;
pub mod classifier;
pub mod clinical;
pub mod config;
pub mod constants;
pub mod error;
pub mod prescription;
pub mod record;
pub mod safety;
pub mod scoring;
pub mod sources;
pub mod treatment;
pub mod uuid;
pub mod validation;
pub mod workflow;

pub use catalog::EvidenceCatalog;
pub use classifier::{
    classify, ClassificationThresholds, ConfidenceTier, Diagnosis, DiagnosisLabel,
    DiagnosisVerdict, Differential,
};
pub use clinical::{ClinicalFindings, PatientContext};
pub use config::{records_dir_from_env_value, reference_dir_from_env_value, CoreConfig};
pub use error::{CdssError, CdssResult};
pub use prescription::{PrescriptionDraft, PrescriptionItem};
pub use record::DiagnosisRecord;
pub use safety::{
    check_safety, AllergyMatcher, ImpliedSeverity, SafetyChecker, SafetyWarning,
    SubstringAllergyMatcher, WarningKind,
};
pub use scoring::{score, DiseaseScore, EvidenceSet, ScoreResult};
pub use sources::{
    InMemoryRecordSink, JsonDirRecordSink, RecordSink, ReferenceData, ReferenceSource,
    StaticReferenceSource, YamlDirReferenceSource,
};
pub use treatment::{DosageCalculator, GuidelineTable};
pub use uuid::SessionId;
pub use workflow::{DiagnosisSession, WorkflowStep};
