//! Replay a diagnosis session from a YAML script.
//!
//! ```yaml
//! clinician: dr-okafor
//! patient: P-0001
//! weight_kg: 30
//! symptoms: [1, 4]
//! findings:
//!   temperature_c: 39.1
//! diagnosis: Malaria & Typhoid   # defaults to the classifier's suggestion
//! add:
//!   - drug: Warfarin
//!     instructions: Once daily
//!     duration_days: 5
//! remove: [Paracetamol]
//! confirm_empty_plan: false
//! ```

use anyhow::{bail, Context};
use cdss_core::{
    ClassificationThresholds, ClinicalFindings, CoreConfig, Diagnosis, DiagnosisRecord,
    DiagnosisSession, EvidenceSet, RecordSink, ReferenceSource,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionScript {
    pub clinician: String,
    pub patient: String,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    pub symptoms: Vec<u32>,
    #[serde(default)]
    pub findings: Option<ClinicalFindings>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub add: Vec<ScriptDrug>,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub confirm_empty_plan: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptDrug {
    pub drug: String,
    pub instructions: String,
    pub duration_days: u32,
}

impl SessionScript {
    pub fn parse(yaml: &str) -> anyhow::Result<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml);
        serde_path_to_error::deserialize(deserializer).map_err(|e| {
            let path = e.path().to_string();
            anyhow::anyhow!("session script invalid at {path}: {}", e.into_inner())
        })
    }
}

/// Parse a diagnosis as written in a script: `A & B` is a co-infection.
pub fn parse_diagnosis(text: &str) -> Diagnosis {
    match text.split_once('&') {
        Some((first, second)) => Diagnosis::co_infection(first.trim(), second.trim()),
        None => Diagnosis::single(text.trim()),
    }
}

/// Run the script to completion and save the record to `sink`.
pub async fn run(
    script: &SessionScript,
    source: &dyn ReferenceSource,
    sink: &dyn RecordSink,
    thresholds: ClassificationThresholds,
) -> anyhow::Result<DiagnosisRecord> {
    let mut session = DiagnosisSession::open(source, &script.clinician, thresholds).await?;

    session
        .bind_patient_from(source, &script.patient, script.weight_kg)
        .await?;
    session.advance()?;

    session.set_evidence(script.symptoms.iter().copied().collect::<EvidenceSet>())?;
    session.advance()?;

    if let Some(findings) = &script.findings {
        session.record_findings(findings.clone())?;
    }
    session.advance()?;

    let diagnosis = match &script.diagnosis {
        Some(text) => parse_diagnosis(text),
        None => match session.suggested_diagnosis() {
            Some(suggested) => suggested,
            None => bail!(
                "no diagnosis suggested ({}); set `diagnosis` in the script",
                session
                    .verdict()
                    .map(|v| v.label.to_string())
                    .unwrap_or_default()
            ),
        },
    };
    session.select_diagnosis(diagnosis)?;
    session.advance()?;

    for drug in &script.remove {
        let index = session
            .draft()
            .drug_names()
            .iter()
            .position(|d| d.eq_ignore_ascii_case(drug.trim()))
            .with_context(|| format!("{drug} is not in the prescription draft"))?;
        session.remove_item(index)?;
    }
    for line in &script.add {
        session.add_drug(&line.drug, &line.instructions, line.duration_days)?;
    }
    if script.confirm_empty_plan {
        session.confirm_empty_plan()?;
    }

    Ok(session.save(sink).await?)
}

/// [`run`] against the collaborators `cfg` selects.
pub async fn run_with_config(
    script: &SessionScript,
    cfg: &CoreConfig,
    sink: &dyn RecordSink,
) -> anyhow::Result<DiagnosisRecord> {
    let source = cfg.reference_source()?;
    run(script, source.as_ref(), sink, *cfg.thresholds()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdss_core::{InMemoryRecordSink, StaticReferenceSource, WarningKind};

    const SCRIPT: &str = r#"
clinician: dr-okafor
patient: P-0001
weight_kg: 30
symptoms: [1, 4]
findings:
  temperature_c: 39.1
add:
  - drug: Azithromycin
    instructions: Once daily
    duration_days: 3
remove: [Paracetamol]
"#;

    #[test]
    fn parses_diagnosis_text() {
        assert_eq!(parse_diagnosis("Malaria"), Diagnosis::single("Malaria"));
        assert_eq!(
            parse_diagnosis("Malaria & Typhoid"),
            Diagnosis::co_infection("Malaria", "Typhoid")
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = SessionScript::parse("clinician: a\npatient: b\nsymptoms: [1]\nsave: yes\n")
            .expect_err("unknown key");
        assert!(err.to_string().contains("session script invalid"));
    }

    #[tokio::test]
    async fn replays_a_full_session() {
        let script = SessionScript::parse(SCRIPT).expect("script");
        let source = StaticReferenceSource::builtin().expect("source");
        let sink = InMemoryRecordSink::new();

        let record = run(&script, &source, &sink, Default::default())
            .await
            .expect("run");

        assert_eq!(record.final_diagnosis, Diagnosis::co_infection("Malaria", "Typhoid"));
        let drugs: Vec<&str> = record.prescription.iter().map(|i| i.drug.as_str()).collect();
        assert_eq!(drugs, vec!["Artemether-Lumefantrine", "Ciprofloxacin", "Azithromycin"]);
        assert!(record
            .safety_warnings
            .iter()
            .any(|w| w.kind == WarningKind::Allergy));
        assert_eq!(record.clinical_findings.temperature_c, Some(39.1));
        assert_eq!(sink.records().expect("records").len(), 1);
    }

    #[tokio::test]
    async fn no_suggestion_needs_an_explicit_diagnosis() {
        let script = SessionScript::parse("clinician: a\npatient: P-0002\nsymptoms: [13]\n")
            .expect("script");
        let source = StaticReferenceSource::builtin().expect("source");
        let err = run(&script, &source, &InMemoryRecordSink::new(), Default::default())
            .await
            .expect_err("no suggestion");
        assert!(err.to_string().contains("no clear diagnosis"));
    }
}
