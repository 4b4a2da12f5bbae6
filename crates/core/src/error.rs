use crate::workflow::WorkflowStep;

#[derive(Debug, thiserror::Error)]
pub enum CdssError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("evidence set is empty: select at least one symptom")]
    EmptyEvidence,
    #[error("no patient is bound to the session")]
    MissingPatient,
    #[error("no final diagnosis has been selected")]
    MissingDiagnosis,
    #[error("prescription is empty: add a drug or confirm an empty plan")]
    EmptyPlanNotConfirmed,
    #[error("unknown diagnosis: {0}")]
    UnknownDiagnosis(String),
    #[error("{action} is not allowed while the session is at {step}")]
    StepNotAllowed {
        action: &'static str,
        step: WorkflowStep,
    },
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: WorkflowStep, to: WorkflowStep },

    #[error("invalid reference data: {0}")]
    Reference(#[from] cdss_reference::ReferenceError),
    #[error("failed to fetch reference data: {0}")]
    ReferenceFetch(String),
    #[error("failed to submit diagnosis record: {0}")]
    RecordSubmit(String),
    #[error("failed to serialize diagnosis record: {0}")]
    Serialization(serde_json::Error),
}

impl CdssError {
    /// Failures the user can fix by correcting input; the session stays where it was.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CdssError::InvalidInput(_)
                | CdssError::EmptyEvidence
                | CdssError::MissingPatient
                | CdssError::MissingDiagnosis
                | CdssError::EmptyPlanNotConfirmed
                | CdssError::UnknownDiagnosis(_)
                | CdssError::StepNotAllowed { .. }
                | CdssError::InvalidTransition { .. }
        )
    }

    /// External I/O failures. The core never retries; callers may.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CdssError::ReferenceFetch(_) | CdssError::RecordSubmit(_)
        )
    }
}

pub type CdssResult<T> = std::result::Result<T, CdssError>;
