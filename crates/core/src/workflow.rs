//! Diagnosis workflow.
//!
//! A [`DiagnosisSession`] walks one patient through the wizard:
//!
//! `PatientSelected → EvidenceReviewed → ClinicalFindingsRecorded → VerdictComputed →
//! TreatmentPlanned → Saved`
//!
//! Every forward transition has a guard; a failed guard returns a validation error and leaves
//! the session exactly where it was. [`DiagnosisSession::back_to`] returns to any earlier step
//! without discarding what was entered. Nothing leaves `Saved`.
//!
//! Evidence can be edited only before the verdict is computed, and editing it drops any verdict
//! computed earlier. The prescription draft can be edited only in `TreatmentPlanned`, and every
//! edit re-runs the safety checker.

use crate::classifier::{classify, ClassificationThresholds, Diagnosis, DiagnosisVerdict};
use crate::clinical::{ClinicalFindings, PatientContext};
use crate::constants::AS_PRESCRIBED;
use crate::error::{CdssError, CdssResult};
use crate::prescription::{PrescriptionDraft, PrescriptionItem};
use crate::record::DiagnosisRecord;
use crate::safety::{SafetyChecker, SafetyWarning};
use crate::scoring::{score, EvidenceSet, ScoreResult};
use crate::sources::{RecordSink, ReferenceData, ReferenceSource};
use crate::uuid::SessionId;
use cdss_reference::{NonEmptyText, TreatmentGuideline};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    PatientSelected,
    EvidenceReviewed,
    ClinicalFindingsRecorded,
    VerdictComputed,
    TreatmentPlanned,
    Saved,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 6] = [
        WorkflowStep::PatientSelected,
        WorkflowStep::EvidenceReviewed,
        WorkflowStep::ClinicalFindingsRecorded,
        WorkflowStep::VerdictComputed,
        WorkflowStep::TreatmentPlanned,
        WorkflowStep::Saved,
    ];

    pub fn next(self) -> Option<WorkflowStep> {
        match self {
            WorkflowStep::PatientSelected => Some(WorkflowStep::EvidenceReviewed),
            WorkflowStep::EvidenceReviewed => Some(WorkflowStep::ClinicalFindingsRecorded),
            WorkflowStep::ClinicalFindingsRecorded => Some(WorkflowStep::VerdictComputed),
            WorkflowStep::VerdictComputed => Some(WorkflowStep::TreatmentPlanned),
            WorkflowStep::TreatmentPlanned => Some(WorkflowStep::Saved),
            WorkflowStep::Saved => None,
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowStep::PatientSelected => "patient selected",
            WorkflowStep::EvidenceReviewed => "evidence reviewed",
            WorkflowStep::ClinicalFindingsRecorded => "clinical findings recorded",
            WorkflowStep::VerdictComputed => "verdict computed",
            WorkflowStep::TreatmentPlanned => "treatment planned",
            WorkflowStep::Saved => "saved",
        })
    }
}

/// State of one diagnosis session. Owned by a single caller; never shared.
#[derive(Debug)]
pub struct DiagnosisSession {
    id: SessionId,
    clinician_id: NonEmptyText,
    reference: Arc<ReferenceData>,
    thresholds: ClassificationThresholds,
    safety: SafetyChecker,
    step: WorkflowStep,
    patient: Option<PatientContext>,
    evidence: EvidenceSet,
    findings: ClinicalFindings,
    score: Option<ScoreResult>,
    verdict: Option<DiagnosisVerdict>,
    final_diagnosis: Option<Diagnosis>,
    guideline: Option<TreatmentGuideline>,
    draft: PrescriptionDraft,
    /// Diagnosis whose guideline last seeded `draft`.
    seeded_for: Option<Diagnosis>,
    /// Set by any clinician edit to the draft; cleared on reseed.
    draft_edited: bool,
    warnings: Vec<SafetyWarning>,
    empty_plan_confirmed: bool,
}

impl DiagnosisSession {
    pub fn new(
        reference: Arc<ReferenceData>,
        clinician_id: &str,
        thresholds: ClassificationThresholds,
    ) -> CdssResult<Self> {
        thresholds.validate()?;
        let clinician_id = NonEmptyText::new(clinician_id)
            .map_err(|_| CdssError::InvalidInput("clinician id cannot be empty".into()))?;

        Ok(Self {
            id: SessionId::new(),
            clinician_id,
            reference,
            thresholds,
            safety: SafetyChecker::default(),
            step: WorkflowStep::PatientSelected,
            patient: None,
            evidence: EvidenceSet::new(),
            findings: ClinicalFindings::default(),
            score: None,
            verdict: None,
            final_diagnosis: None,
            guideline: None,
            draft: PrescriptionDraft::new(),
            seeded_for: None,
            draft_edited: false,
            warnings: Vec::new(),
            empty_plan_confirmed: false,
        })
    }

    /// Start a session with reference data fetched from `source`.
    pub async fn open(
        source: &dyn ReferenceSource,
        clinician_id: &str,
        thresholds: ClassificationThresholds,
    ) -> CdssResult<Self> {
        let reference = source.reference_data().await?;
        let session = Self::new(reference, clinician_id, thresholds)?;
        tracing::info!(session_id = %session.id, "opened diagnosis session");
        Ok(session)
    }

    pub fn with_safety_checker(mut self, safety: SafetyChecker) -> Self {
        self.safety = safety;
        self
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn clinician_id(&self) -> &str {
        self.clinician_id.as_str()
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn thresholds(&self) -> &ClassificationThresholds {
        &self.thresholds
    }

    pub fn patient(&self) -> Option<&PatientContext> {
        self.patient.as_ref()
    }

    pub fn evidence(&self) -> &EvidenceSet {
        &self.evidence
    }

    pub fn findings(&self) -> &ClinicalFindings {
        &self.findings
    }

    pub fn score(&self) -> Option<&ScoreResult> {
        self.score.as_ref()
    }

    pub fn verdict(&self) -> Option<&DiagnosisVerdict> {
        self.verdict.as_ref()
    }

    /// The classifier's top candidate. Only a suggestion; see [`Self::select_diagnosis`].
    pub fn suggested_diagnosis(&self) -> Option<Diagnosis> {
        self.verdict
            .as_ref()
            .and_then(|v| v.candidates().into_iter().next())
    }

    pub fn final_diagnosis(&self) -> Option<&Diagnosis> {
        self.final_diagnosis.as_ref()
    }

    /// Guideline resolved on entering `TreatmentPlanned`; `None` means manual prescription.
    pub fn guideline(&self) -> Option<&TreatmentGuideline> {
        self.guideline.as_ref()
    }

    pub fn draft(&self) -> &PrescriptionDraft {
        &self.draft
    }

    /// Diagnosis the draft was last seeded for. Differs from [`Self::final_diagnosis`] when the
    /// diagnosis changed after the clinician edited the draft.
    pub fn draft_seeded_for(&self) -> Option<&Diagnosis> {
        self.seeded_for.as_ref()
    }

    pub fn warnings(&self) -> &[SafetyWarning] {
        &self.warnings
    }

    /// Weight used for dosing: the recorded finding wins over the patient context.
    pub fn weight_kg(&self) -> Option<f64> {
        self.findings
            .weight_kg
            .or_else(|| self.patient.as_ref().and_then(|p| p.weight_kg))
    }

    /// Weight-banded dosage for `drug_name`, or "as prescribed" without a known weight.
    pub fn dosage_for(&self, drug_name: &str) -> String {
        match self.weight_kg() {
            Some(w) => self.reference.dosage.dosage_for(drug_name, w),
            None => AS_PRESCRIBED.to_owned(),
        }
    }

    // ------------------------------------------------------------------
    // Patient and evidence
    // ------------------------------------------------------------------

    pub fn bind_patient(&mut self, patient: PatientContext) -> CdssResult<()> {
        self.require_step("binding a patient", WorkflowStep::PatientSelected)?;
        tracing::debug!(session_id = %self.id, patient_id = %patient.patient_id, "bound patient");
        self.patient = Some(patient);
        Ok(())
    }

    /// Bind `patient_id`, loading the patient's allergies from `source`.
    pub async fn bind_patient_from(
        &mut self,
        source: &dyn ReferenceSource,
        patient_id: &str,
        weight_kg: Option<f64>,
    ) -> CdssResult<()> {
        self.require_step("binding a patient", WorkflowStep::PatientSelected)?;
        let mut patient = PatientContext::new(patient_id)?;
        if let Some(w) = weight_kg {
            patient = patient.with_weight(w)?;
        }
        let allergies = source.patient_allergies(patient.patient_id.as_str()).await?;
        self.bind_patient(patient.with_allergies(allergies))
    }

    pub fn select_symptom(&mut self, symptom_id: u32) -> CdssResult<bool> {
        self.require_evidence_editable()?;
        let added = self.evidence.insert(symptom_id);
        if added {
            self.drop_verdict();
        }
        Ok(added)
    }

    pub fn deselect_symptom(&mut self, symptom_id: u32) -> CdssResult<bool> {
        self.require_evidence_editable()?;
        let removed = self.evidence.remove(symptom_id);
        if removed {
            self.drop_verdict();
        }
        Ok(removed)
    }

    pub fn set_evidence(&mut self, evidence: EvidenceSet) -> CdssResult<()> {
        self.require_evidence_editable()?;
        if evidence != self.evidence {
            self.evidence = evidence;
            self.drop_verdict();
        }
        Ok(())
    }

    /// Record vitals. Accepted from `EvidenceReviewed` through `VerdictComputed`.
    pub fn record_findings(&mut self, findings: ClinicalFindings) -> CdssResult<()> {
        if !(WorkflowStep::EvidenceReviewed..=WorkflowStep::VerdictComputed).contains(&self.step) {
            return Err(CdssError::StepNotAllowed {
                action: "recording clinical findings",
                step: self.step,
            });
        }
        findings.validate()?;
        self.findings = findings;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Move to the next step if its guard holds.
    ///
    /// Saving is not an `advance`: it needs a sink, see [`Self::save`].
    pub fn advance(&mut self) -> CdssResult<WorkflowStep> {
        let from = self.step;
        match from {
            WorkflowStep::PatientSelected => {
                if self.patient.is_none() {
                    return Err(CdssError::MissingPatient);
                }
            }
            WorkflowStep::EvidenceReviewed => {}
            WorkflowStep::ClinicalFindingsRecorded => {
                let result = score(&self.evidence, &self.reference.catalog)?;
                let verdict = classify(
                    &result,
                    &self.reference.catalog.disease_names(),
                    &self.thresholds,
                );
                self.score = Some(result);
                self.verdict = Some(verdict);
            }
            WorkflowStep::VerdictComputed => {
                let Some(diagnosis) = self.final_diagnosis.clone() else {
                    return Err(CdssError::MissingDiagnosis);
                };
                let key = diagnosis.guideline_key();
                self.guideline = self.reference.guidelines.resolve(&key).cloned();
                self.plan_draft(diagnosis);
                self.refresh_warnings();
            }
            WorkflowStep::TreatmentPlanned | WorkflowStep::Saved => {
                return Err(CdssError::InvalidTransition {
                    from,
                    to: WorkflowStep::Saved,
                });
            }
        }

        let to = from.next().ok_or(CdssError::InvalidTransition { from, to: from })?;
        self.step = to;
        tracing::info!(session_id = %self.id, %from, %to, "workflow advanced");
        Ok(to)
    }

    /// Return to an earlier step, keeping everything entered so far.
    pub fn back_to(&mut self, step: WorkflowStep) -> CdssResult<()> {
        if self.step == WorkflowStep::Saved || step >= self.step {
            return Err(CdssError::InvalidTransition {
                from: self.step,
                to: step,
            });
        }
        tracing::info!(session_id = %self.id, from = %self.step, to = %step, "workflow went back");
        self.step = step;
        Ok(())
    }

    /// Choose the final diagnosis.
    ///
    /// Any modeled disease may be chosen, not only the suggestion: the clinician can override
    /// the classifier. A co-infection must name two different modeled diseases and is stored in
    /// catalog order so it resolves to the `A & B` guideline entry.
    pub fn select_diagnosis(&mut self, diagnosis: Diagnosis) -> CdssResult<()> {
        self.require_step("choosing a diagnosis", WorkflowStep::VerdictComputed)?;
        let catalog = &self.reference.catalog;
        let resolve = |name: &str| {
            catalog
                .disease(name)
                .map(|n| n.as_str().to_owned())
                .ok_or_else(|| CdssError::UnknownDiagnosis(name.to_owned()))
        };

        let canonical = match diagnosis {
            Diagnosis::Single { disease } => Diagnosis::single(resolve(&disease)?),
            Diagnosis::CoInfection { first, second } => {
                let first = resolve(&first)?;
                let second = resolve(&second)?;
                if first == second {
                    return Err(CdssError::UnknownDiagnosis(format!(
                        "co-infection of {first} with itself"
                    )));
                }
                let names = catalog.disease_names();
                let rank = |d: &str| names.iter().position(|n| *n == d);
                if rank(second.as_str()) < rank(first.as_str()) {
                    Diagnosis::co_infection(second, first)
                } else {
                    Diagnosis::co_infection(first, second)
                }
            }
        };

        tracing::debug!(session_id = %self.id, diagnosis = %canonical, "selected final diagnosis");
        self.final_diagnosis = Some(canonical);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Prescription draft
    // ------------------------------------------------------------------

    pub fn add_item(&mut self, item: PrescriptionItem) -> CdssResult<()> {
        self.require_step("editing the prescription", WorkflowStep::TreatmentPlanned)?;
        self.draft.push(item);
        self.draft_edited = true;
        self.refresh_warnings();
        Ok(())
    }

    /// Add a drug line with its weight-banded dosage.
    pub fn add_drug(
        &mut self,
        drug_name: &str,
        instructions: &str,
        duration_days: u32,
    ) -> CdssResult<()> {
        let item =
            PrescriptionItem::new(drug_name, self.dosage_for(drug_name), instructions, duration_days)?;
        self.add_item(item)
    }

    pub fn remove_item(&mut self, index: usize) -> CdssResult<PrescriptionItem> {
        self.require_step("editing the prescription", WorkflowStep::TreatmentPlanned)?;
        let removed = self.draft.remove(index)?;
        self.draft_edited = true;
        self.refresh_warnings();
        Ok(removed)
    }

    pub fn replace_item(
        &mut self,
        index: usize,
        item: PrescriptionItem,
    ) -> CdssResult<PrescriptionItem> {
        self.require_step("editing the prescription", WorkflowStep::TreatmentPlanned)?;
        let previous = self.draft.replace(index, item)?;
        self.draft_edited = true;
        self.refresh_warnings();
        Ok(previous)
    }

    pub fn clear_draft(&mut self) -> CdssResult<()> {
        self.require_step("editing the prescription", WorkflowStep::TreatmentPlanned)?;
        self.draft.clear();
        self.draft_edited = true;
        self.refresh_warnings();
        Ok(())
    }

    /// Accept saving with no drug lines.
    pub fn confirm_empty_plan(&mut self) -> CdssResult<()> {
        self.require_step("confirming an empty plan", WorkflowStep::TreatmentPlanned)?;
        self.empty_plan_confirmed = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------

    /// Hand the record to `sink` and move to `Saved`.
    ///
    /// Safety warnings are advisory and never block the save. If the sink fails the session
    /// stays in `TreatmentPlanned` and the call can be retried.
    pub async fn save(&mut self, sink: &dyn RecordSink) -> CdssResult<DiagnosisRecord> {
        self.require_step("saving", WorkflowStep::TreatmentPlanned)?;
        if self.draft.is_empty() && !self.empty_plan_confirmed {
            return Err(CdssError::EmptyPlanNotConfirmed);
        }

        self.refresh_warnings();
        let record = self.build_record()?;
        sink.submit(&record).await?;

        self.step = WorkflowStep::Saved;
        tracing::info!(
            session_id = %self.id,
            diagnosis = %record.final_diagnosis,
            warnings = record.safety_warnings.len(),
            "saved diagnosis session"
        );
        Ok(record)
    }

    fn build_record(&self) -> CdssResult<DiagnosisRecord> {
        let patient = self.patient.as_ref().ok_or(CdssError::MissingPatient)?;
        let final_diagnosis = self
            .final_diagnosis
            .clone()
            .ok_or(CdssError::MissingDiagnosis)?;
        let verdict = self.verdict.as_ref().ok_or(CdssError::StepNotAllowed {
            action: "saving without a verdict",
            step: self.step,
        })?;

        Ok(DiagnosisRecord {
            session_id: self.id,
            patient_id: patient.patient_id.as_str().to_owned(),
            clinician_id: self.clinician_id.as_str().to_owned(),
            selected_symptom_ids: self.evidence.ids().collect(),
            diagnosis_label: verdict.label.to_string(),
            final_diagnosis,
            confidence: verdict.confidence,
            requires_imaging: verdict.requires_imaging,
            clinical_findings: self.findings.clone(),
            prescription: self.draft.items().to_vec(),
            safety_warnings: self.warnings.clone(),
            recorded_at: chrono::Utc::now(),
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_step(&self, action: &'static str, step: WorkflowStep) -> CdssResult<()> {
        if self.step != step {
            return Err(CdssError::StepNotAllowed {
                action,
                step: self.step,
            });
        }
        Ok(())
    }

    fn require_evidence_editable(&self) -> CdssResult<()> {
        if self.step >= WorkflowStep::VerdictComputed {
            return Err(CdssError::StepNotAllowed {
                action: "editing evidence",
                step: self.step,
            });
        }
        Ok(())
    }

    fn drop_verdict(&mut self) {
        if self.verdict.is_some() {
            tracing::debug!(session_id = %self.id, "evidence changed; verdict dropped");
        }
        self.score = None;
        self.verdict = None;
        self.final_diagnosis = None;
    }

    /// Seed the draft for `diagnosis` unless it holds clinician edits.
    ///
    /// An untouched seed for a different diagnosis is replaced. An edited draft is kept as is.
    fn plan_draft(&mut self, diagnosis: Diagnosis) {
        let stale = self.seeded_for.as_ref() != Some(&diagnosis);
        if self.draft.is_empty() || (stale && !self.draft_edited) {
            self.draft.clear();
            self.seed_draft();
            self.draft_edited = false;
            self.seeded_for = Some(diagnosis);
        } else if stale {
            tracing::warn!(
                session_id = %self.id,
                diagnosis = %diagnosis,
                "diagnosis changed; keeping edited prescription draft"
            );
        }
    }

    fn seed_draft(&mut self) {
        let Some(guideline) = &self.guideline else {
            return;
        };
        let weight = self.weight_kg();
        let items: Vec<PrescriptionItem> = guideline
            .lines
            .iter()
            .map(|line| {
                let banded = weight
                    .map(|w| self.reference.dosage.dosage_for(line.drug.as_str(), w))
                    .filter(|d| d != AS_PRESCRIBED);
                PrescriptionItem::from_line(line, banded)
            })
            .collect();
        for item in items {
            self.draft.push(item);
        }
    }

    fn refresh_warnings(&mut self) {
        let allergies = self
            .patient
            .as_ref()
            .map(|p| p.allergies.as_slice())
            .unwrap_or(&[]);
        self.warnings = self.safety.check(
            &self.draft.drug_names(),
            &self.reference.interactions,
            allergies,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ConfidenceTier, DiagnosisLabel};
    use crate::safety::WarningKind;
    use crate::sources::{InMemoryRecordSink, StaticReferenceSource};
    use crate::treatment::GuidelineTable;
    use async_trait::async_trait;

    const ABDOMINAL_PAIN: u32 = 1;
    const HEADACHE: u32 = 4;
    const DIARRHEA: u32 = 13;

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        async fn submit(&self, _record: &DiagnosisRecord) -> CdssResult<()> {
            Err(CdssError::RecordSubmit("store unavailable".into()))
        }
    }

    fn reference() -> Arc<ReferenceData> {
        Arc::new(ReferenceData::builtin().expect("builtin reference data"))
    }

    fn session() -> DiagnosisSession {
        DiagnosisSession::new(reference(), "dr-okafor", ClassificationThresholds::default())
            .expect("session")
    }

    /// A session at `VerdictComputed` for the given evidence.
    fn session_with_verdict(ids: &[u32], patient: PatientContext) -> DiagnosisSession {
        let mut s = session();
        s.bind_patient(patient).expect("bind");
        s.advance().expect("to evidence");
        for &id in ids {
            s.select_symptom(id).expect("select");
        }
        s.advance().expect("to findings");
        s.advance().expect("to verdict");
        s
    }

    fn patient() -> PatientContext {
        PatientContext::new("P-0001").expect("patient")
    }

    #[test]
    fn step_display_is_lowercase_words() {
        assert_eq!(WorkflowStep::EvidenceReviewed.to_string(), "evidence reviewed");
        assert_eq!(WorkflowStep::Saved.next(), None);
        let mut sorted = WorkflowStep::ALL;
        sorted.sort();
        assert_eq!(sorted, WorkflowStep::ALL);
    }

    #[test]
    fn patient_is_required_to_leave_first_step() {
        let mut s = session();
        let err = s.advance().expect_err("no patient");
        assert!(matches!(err, CdssError::MissingPatient));
        assert_eq!(s.step(), WorkflowStep::PatientSelected);

        s.bind_patient(patient()).expect("bind");
        assert_eq!(s.advance().expect("advance"), WorkflowStep::EvidenceReviewed);
    }

    #[test]
    fn empty_evidence_blocks_the_verdict() {
        let mut s = session();
        s.bind_patient(patient()).expect("bind");
        s.advance().expect("to evidence");
        s.advance().expect("to findings");

        let err = s.advance().expect_err("empty evidence");
        assert!(matches!(err, CdssError::EmptyEvidence));
        assert!(err.is_validation());
        assert_eq!(s.step(), WorkflowStep::ClinicalFindingsRecorded);
        assert!(s.verdict().is_none());
    }

    #[test]
    fn verdict_for_shared_symptoms_is_a_co_infection() {
        let s = session_with_verdict(&[ABDOMINAL_PAIN, HEADACHE], patient());
        let verdict = s.verdict().expect("verdict");
        assert!(matches!(verdict.label, DiagnosisLabel::CoInfection { .. }));
        assert_eq!(verdict.confidence, ConfidenceTier::High);
        assert!(verdict.requires_imaging);
        assert_eq!(
            s.suggested_diagnosis(),
            Some(Diagnosis::co_infection("Malaria", "Typhoid"))
        );
        // The suggestion is never applied on its own.
        assert!(s.final_diagnosis().is_none());
    }

    #[test]
    fn diagnosis_is_required_to_plan_treatment() {
        let mut s = session_with_verdict(&[DIARRHEA], patient());
        let err = s.advance().expect_err("no diagnosis");
        assert!(matches!(err, CdssError::MissingDiagnosis));
        assert_eq!(s.step(), WorkflowStep::VerdictComputed);
    }

    #[test]
    fn clinician_may_override_the_classifier() {
        let mut s = session_with_verdict(&[DIARRHEA], patient());
        assert_eq!(
            s.verdict().map(|v| v.label.clone()),
            Some(DiagnosisLabel::NoClearDiagnosis)
        );

        s.select_diagnosis(Diagnosis::single("typhoid")).expect("override");
        assert_eq!(s.final_diagnosis(), Some(&Diagnosis::single("Typhoid")));

        let err = s
            .select_diagnosis(Diagnosis::single("Dengue"))
            .expect_err("unknown disease");
        assert!(matches!(err, CdssError::UnknownDiagnosis(name) if name == "Dengue"));

        let err = s
            .select_diagnosis(Diagnosis::co_infection("Malaria", "malaria"))
            .expect_err("same disease twice");
        assert!(matches!(err, CdssError::UnknownDiagnosis(_)));

        s.select_diagnosis(Diagnosis::co_infection("Typhoid", "Malaria"))
            .expect("co-infection");
        assert_eq!(
            s.final_diagnosis().map(|d| d.guideline_key()),
            Some("Malaria & Typhoid".to_owned())
        );
    }

    #[test]
    fn treatment_is_seeded_from_guideline_with_weight_bands() {
        let patient = patient().with_weight(30.0).expect("weight");
        let mut s = session_with_verdict(&[ABDOMINAL_PAIN, HEADACHE], patient);
        s.select_diagnosis(Diagnosis::co_infection("Malaria", "Typhoid"))
            .expect("select");
        assert_eq!(s.advance().expect("plan"), WorkflowStep::TreatmentPlanned);

        assert!(s.guideline().is_some());
        let items = s.draft().items();
        assert_eq!(s.draft().drug_names(), vec!["Artemether-Lumefantrine", "Ciprofloxacin", "Paracetamol"]);
        assert_eq!(items[0].dosage, "3 tablets (60/360 mg)");
        assert_eq!(items[1].dosage, "375 mg");
        assert_eq!(items[1].quantity, 14);
    }

    #[test]
    fn findings_weight_wins_over_patient_weight() {
        let patient = patient().with_weight(30.0).expect("weight");
        let mut s = session();
        s.bind_patient(patient).expect("bind");
        s.advance().expect("to evidence");
        s.select_symptom(HEADACHE).expect("select");
        s.record_findings(ClinicalFindings {
            weight_kg: Some(70.0),
            ..Default::default()
        })
        .expect("findings");
        assert_eq!(s.weight_kg(), Some(70.0));
        assert_eq!(s.dosage_for("Ciprofloxacin"), "500 mg");

        let err = s
            .record_findings(ClinicalFindings {
                pulse_bpm: Some(900),
                ..Default::default()
            })
            .expect_err("implausible pulse");
        assert!(err.is_validation());
        assert_eq!(s.findings().weight_kg, Some(70.0));
    }

    #[test]
    fn findings_need_a_bound_patient_and_lock_at_treatment() {
        let mut s = session();
        let err = s
            .record_findings(ClinicalFindings::default())
            .expect_err("no patient yet");
        assert!(matches!(err, CdssError::StepNotAllowed { step: WorkflowStep::PatientSelected, .. }));

        s.bind_patient(patient()).expect("bind");
        s.advance().expect("to evidence");
        s.select_symptom(HEADACHE).expect("select");
        s.advance().expect("to findings");
        s.advance().expect("to verdict");
        s.record_findings(ClinicalFindings {
            temperature_c: Some(38.5),
            ..Default::default()
        })
        .expect("still open at verdict");

        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");
        s.advance().expect("plan");
        let err = s
            .record_findings(ClinicalFindings::default())
            .expect_err("locked in treatment");
        assert!(matches!(err, CdssError::StepNotAllowed { step: WorkflowStep::TreatmentPlanned, .. }));
        assert_eq!(s.findings().temperature_c, Some(38.5));
    }

    #[test]
    fn changing_diagnosis_reseeds_an_untouched_draft() {
        let mut s = session_with_verdict(&[ABDOMINAL_PAIN, HEADACHE], patient());
        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");
        s.advance().expect("plan");
        assert_eq!(s.draft().drug_names(), vec!["Artemether-Lumefantrine", "Paracetamol"]);

        s.back_to(WorkflowStep::VerdictComputed).expect("back");
        s.select_diagnosis(Diagnosis::single("Typhoid")).expect("reselect");
        s.advance().expect("plan again");

        assert_eq!(s.guideline().map(|g| g.disease.as_str()), Some("Typhoid"));
        assert_eq!(s.draft().drug_names(), vec!["Ciprofloxacin", "Paracetamol"]);
        assert_eq!(s.draft_seeded_for(), Some(&Diagnosis::single("Typhoid")));
    }

    #[test]
    fn changing_diagnosis_keeps_an_edited_draft() {
        let mut s = session_with_verdict(&[ABDOMINAL_PAIN, HEADACHE], patient());
        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");
        s.advance().expect("plan");
        s.add_drug("Azithromycin", "Once daily", 3).expect("edit");

        s.back_to(WorkflowStep::VerdictComputed).expect("back");
        s.select_diagnosis(Diagnosis::single("Typhoid")).expect("reselect");
        s.advance().expect("plan again");

        assert_eq!(
            s.draft().drug_names(),
            vec!["Artemether-Lumefantrine", "Paracetamol", "Azithromycin"]
        );
        assert_eq!(s.draft_seeded_for(), Some(&Diagnosis::single("Malaria")));
        assert_eq!(s.final_diagnosis(), Some(&Diagnosis::single("Typhoid")));
    }

    #[test]
    fn same_diagnosis_after_going_back_keeps_the_draft() {
        let mut s = session_with_verdict(&[HEADACHE], patient());
        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");
        s.advance().expect("plan");
        s.remove_item(1).expect("drop paracetamol");

        s.back_to(WorkflowStep::VerdictComputed).expect("back");
        s.advance().expect("plan again");
        assert_eq!(s.draft().drug_names(), vec!["Artemether-Lumefantrine"]);
    }

    #[test]
    fn no_guideline_leaves_an_empty_draft() {
        let mut data = ReferenceData::builtin().expect("builtin");
        data.guidelines = GuidelineTable::default();
        let mut s = DiagnosisSession::new(Arc::new(data), "dr-okafor", Default::default())
            .expect("session");
        s.bind_patient(patient()).expect("bind");
        s.advance().expect("to evidence");
        s.select_symptom(DIARRHEA).expect("select");
        s.advance().expect("to findings");
        s.advance().expect("to verdict");
        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");
        s.advance().expect("plan");

        assert!(s.guideline().is_none());
        assert!(s.draft().is_empty());
    }

    #[test]
    fn going_back_keeps_state_and_evidence_edits_drop_the_verdict() {
        let mut s = session_with_verdict(&[ABDOMINAL_PAIN, HEADACHE], patient());
        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");

        let err = s.select_symptom(DIARRHEA).expect_err("evidence is locked");
        assert!(matches!(err, CdssError::StepNotAllowed { step: WorkflowStep::VerdictComputed, .. }));

        s.back_to(WorkflowStep::EvidenceReviewed).expect("back");
        assert_eq!(s.evidence().len(), 2);
        assert!(s.verdict().is_some());

        // Re-selecting an existing id is not an edit.
        assert!(!s.select_symptom(HEADACHE).expect("noop"));
        assert!(s.verdict().is_some());

        assert!(s.deselect_symptom(HEADACHE).expect("deselect"));
        assert!(s.verdict().is_none());
        assert!(s.final_diagnosis().is_none());

        let err = s.back_to(WorkflowStep::VerdictComputed).expect_err("forward via back");
        assert!(matches!(err, CdssError::InvalidTransition { .. }));
    }

    #[test]
    fn draft_edits_only_in_treatment_and_refresh_warnings() {
        let mut s = session_with_verdict(&[ABDOMINAL_PAIN, HEADACHE], patient());
        let err = s.add_drug("Warfarin", "Once daily", 5).expect_err("not yet");
        assert!(matches!(err, CdssError::StepNotAllowed { .. }));

        s.select_diagnosis(Diagnosis::single("Typhoid")).expect("select");
        s.advance().expect("plan");
        assert!(s.warnings().is_empty());

        s.add_drug("Warfarin", "Once daily", 5).expect("add");
        assert_eq!(s.warnings().len(), 1);
        assert_eq!(s.warnings()[0].kind, WarningKind::Interaction);

        let index = s.draft().drug_names().iter().position(|d| *d == "Warfarin").expect("index");
        s.remove_item(index).expect("remove");
        assert!(s.warnings().is_empty());
    }

    #[tokio::test]
    async fn allergies_from_source_raise_contraindications() {
        let source = StaticReferenceSource::builtin().expect("source");
        let mut s = DiagnosisSession::open(&source, "dr-okafor", Default::default())
            .await
            .expect("open");
        s.bind_patient_from(&source, "P-0001", None).await.expect("bind");
        s.advance().expect("to evidence");
        s.select_symptom(HEADACHE).expect("select");
        s.advance().expect("to findings");
        s.advance().expect("to verdict");
        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");
        s.advance().expect("plan");

        s.add_drug("Azithromycin", "Once daily", 3).expect("add");
        let allergy = s
            .warnings()
            .iter()
            .find(|w| w.kind == WarningKind::Allergy)
            .expect("allergy warning");
        assert!(allergy.is_hard_contraindication());
    }

    #[tokio::test]
    async fn empty_plan_needs_confirmation() {
        let mut s = session_with_verdict(&[HEADACHE], patient());
        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");
        s.advance().expect("plan");
        s.clear_draft().expect("clear");

        let sink = InMemoryRecordSink::new();
        let err = s.save(&sink).await.expect_err("unconfirmed");
        assert!(matches!(err, CdssError::EmptyPlanNotConfirmed));
        assert_eq!(s.step(), WorkflowStep::TreatmentPlanned);

        s.confirm_empty_plan().expect("confirm");
        let record = s.save(&sink).await.expect("save");
        assert!(record.prescription.is_empty());
        assert_eq!(s.step(), WorkflowStep::Saved);
    }

    #[tokio::test]
    async fn failed_submit_is_retryable() {
        let mut s = session_with_verdict(&[ABDOMINAL_PAIN, HEADACHE], patient());
        s.select_diagnosis(Diagnosis::co_infection("Malaria", "Typhoid"))
            .expect("select");
        s.advance().expect("plan");

        let err = s.save(&FailingSink).await.expect_err("sink down");
        assert!(err.is_retryable());
        assert_eq!(s.step(), WorkflowStep::TreatmentPlanned);

        let sink = InMemoryRecordSink::new();
        let record = s.save(&sink).await.expect("retry");
        assert_eq!(record.session_id, s.id());
        assert_eq!(record.selected_symptom_ids, vec![ABDOMINAL_PAIN, HEADACHE]);
        assert_eq!(record.diagnosis_label, "co-infection of Malaria and Typhoid");
        assert!(record.requires_imaging);
        assert_eq!(record.prescription.len(), 3);
        assert_eq!(sink.records().expect("records").len(), 1);
    }

    #[tokio::test]
    async fn nothing_leaves_saved() {
        let mut s = session_with_verdict(&[HEADACHE], patient());
        s.select_diagnosis(Diagnosis::single("Malaria")).expect("select");
        s.advance().expect("plan");
        s.save(&InMemoryRecordSink::new()).await.expect("save");

        assert!(matches!(s.advance(), Err(CdssError::InvalidTransition { .. })));
        assert!(matches!(
            s.back_to(WorkflowStep::TreatmentPlanned),
            Err(CdssError::InvalidTransition { .. })
        ));
        assert!(s.add_drug("Paracetamol", "Once daily", 1).is_err());
        assert!(s.save(&InMemoryRecordSink::new()).await.is_err());
    }
}
