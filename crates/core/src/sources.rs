//! Collaborator boundaries: where reference data comes from and where saved records go.
//!
//! Both are `async` traits so a session can be driven from any executor. The pipeline itself
//! never awaits; only opening a session and saving it cross these seams. Retry and timeout
//! policy belongs to the implementations' callers.

use crate::catalog::EvidenceCatalog;
use crate::constants::{
    ALLERGIES_FILENAME, CATALOG_FILENAME, DOSAGE_FILENAME, GUIDELINES_FILENAME,
    INTERACTIONS_FILENAME,
};
use crate::error::{CdssError, CdssResult};
use crate::record::DiagnosisRecord;
use crate::treatment::{DosageCalculator, GuidelineTable};
use async_trait::async_trait;
use cdss_reference::{
    Allergies, Catalog, Dosage, Guidelines, InteractionGraph, Interactions, PatientAllergy,
    PatientAllergyTable,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

/// Read-only tables a session consumes.
#[derive(Clone, Debug)]
pub struct ReferenceData {
    pub catalog: EvidenceCatalog,
    pub guidelines: GuidelineTable,
    pub dosage: DosageCalculator,
    pub interactions: InteractionGraph,
}

impl ReferenceData {
    /// Tables embedded in `cdss-reference`.
    pub fn builtin() -> CdssResult<Self> {
        Ok(Self {
            catalog: EvidenceCatalog::builtin()?,
            guidelines: GuidelineTable::builtin()?,
            dosage: DosageCalculator::builtin()?,
            interactions: cdss_reference::builtin::interactions()?,
        })
    }
}

#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn reference_data(&self) -> CdssResult<Arc<ReferenceData>>;

    /// Allergies recorded for `patient_id`; an unknown patient has none.
    async fn patient_allergies(&self, patient_id: &str) -> CdssResult<Vec<PatientAllergy>>;
}

#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn submit(&self, record: &DiagnosisRecord) -> CdssResult<()>;
}

// ============================================================================
// Reference sources
// ============================================================================

/// Reference tables held in memory.
#[derive(Clone, Debug)]
pub struct StaticReferenceSource {
    data: Arc<ReferenceData>,
    allergies: PatientAllergyTable,
}

impl StaticReferenceSource {
    pub fn new(data: ReferenceData, allergies: PatientAllergyTable) -> Self {
        Self {
            data: Arc::new(data),
            allergies,
        }
    }

    pub fn builtin() -> CdssResult<Self> {
        Ok(Self::new(
            ReferenceData::builtin()?,
            cdss_reference::builtin::allergies()?,
        ))
    }

    pub fn data(&self) -> &ReferenceData {
        &self.data
    }
}

#[async_trait]
impl ReferenceSource for StaticReferenceSource {
    async fn reference_data(&self) -> CdssResult<Arc<ReferenceData>> {
        Ok(Arc::clone(&self.data))
    }

    async fn patient_allergies(&self, patient_id: &str) -> CdssResult<Vec<PatientAllergy>> {
        Ok(self.allergies.for_patient(patient_id).to_vec())
    }
}

/// Reads reference tables from YAML files in a directory on every fetch.
///
/// `catalog.yaml`, `guidelines.yaml` and `interactions.yaml` are required. Without
/// `dosage.yaml` every dose is "as prescribed"; without `allergies.yaml` no patient has
/// recorded allergies.
#[derive(Clone, Debug)]
pub struct YamlDirReferenceSource {
    dir: PathBuf,
}

impl YamlDirReferenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read(&self, filename: &str) -> CdssResult<String> {
        let path = self.dir.join(filename);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CdssError::ReferenceFetch(format!("{}: {e}", path.display())))
    }

    async fn read_optional(&self, filename: &str) -> CdssResult<Option<String>> {
        let path = self.dir.join(filename);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CdssError::ReferenceFetch(format!("{}: {e}", path.display()))),
        }
    }
}

#[async_trait]
impl ReferenceSource for YamlDirReferenceSource {
    async fn reference_data(&self) -> CdssResult<Arc<ReferenceData>> {
        let catalog = EvidenceCatalog::new(Catalog::parse(&self.read(CATALOG_FILENAME).await?)?)?;
        let guidelines =
            GuidelineTable::new(Guidelines::parse(&self.read(GUIDELINES_FILENAME).await?)?)?;
        let interactions = Interactions::parse(&self.read(INTERACTIONS_FILENAME).await?)?;
        let dosage = match self.read_optional(DOSAGE_FILENAME).await? {
            Some(text) => DosageCalculator::new(Dosage::parse(&text)?)?,
            None => DosageCalculator::default(),
        };

        tracing::debug!(dir = %self.dir.display(), "loaded reference data");
        Ok(Arc::new(ReferenceData {
            catalog,
            guidelines,
            dosage,
            interactions,
        }))
    }

    async fn patient_allergies(&self, patient_id: &str) -> CdssResult<Vec<PatientAllergy>> {
        let Some(text) = self.read_optional(ALLERGIES_FILENAME).await? else {
            return Ok(Vec::new());
        };
        Ok(Allergies::parse(&text)?.for_patient(patient_id).to_vec())
    }
}

// ============================================================================
// Record sinks
// ============================================================================

/// Keeps submitted records in memory.
#[derive(Debug, Default)]
pub struct InMemoryRecordSink {
    records: Mutex<Vec<DiagnosisRecord>>,
}

impl InMemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> CdssResult<Vec<DiagnosisRecord>> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|_| CdssError::RecordSubmit("record store lock poisoned".into()))
    }
}

#[async_trait]
impl RecordSink for InMemoryRecordSink {
    async fn submit(&self, record: &DiagnosisRecord) -> CdssResult<()> {
        self.records
            .lock()
            .map_err(|_| CdssError::RecordSubmit("record store lock poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}

/// Writes each record as pretty JSON to `<dir>/<s1>/<s2>/<session-id>.json`.
///
/// A record is written once: submitting the same session id twice fails rather than
/// overwriting the first record. The JSON goes to a temporary file in the shard directory and
/// is linked into place only when complete, so a failed write never leaves a partial record.
#[derive(Clone, Debug)]
pub struct JsonDirRecordSink {
    dir: PathBuf,
}

impl JsonDirRecordSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, record: &DiagnosisRecord) -> PathBuf {
        record.session_id.sharded_path(&self.dir, "json")
    }
}

#[async_trait]
impl RecordSink for JsonDirRecordSink {
    async fn submit(&self, record: &DiagnosisRecord) -> CdssResult<()> {
        let json = record.to_json_pretty()?;
        let path = self.record_path(record);
        let submit_err = |e: std::io::Error| CdssError::RecordSubmit(format!("{}: {e}", path.display()));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(submit_err)?;
        }

        let staging = path.with_extension("json.tmp");
        let published = match write_staging(&staging, &json).await {
            Ok(()) => publish(&staging, &path).await,
            Err(e) => Err(e),
        };
        // Gone already after a rename; any other leftover is ours to drop.
        let _ = tokio::fs::remove_file(&staging).await;
        published.map_err(submit_err)?;

        tracing::info!(session_id = %record.session_id, path = %path.display(), "wrote diagnosis record");
        Ok(())
    }
}

async fn write_staging(staging: &Path, json: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(staging)
        .await?;
    file.write_all(json.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;
    file.sync_all().await
}

/// Link `staging` to `path` without replacing a complete record already there.
///
/// A file at `path` that does not parse as a record is the remains of an interrupted write and
/// is replaced.
async fn publish(staging: &Path, path: &Path) -> std::io::Result<()> {
    match tokio::fs::hard_link(staging, path).await {
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            if holds_complete_record(path).await {
                return Err(e);
            }
            tracing::warn!(path = %path.display(), "replacing incomplete diagnosis record");
            tokio::fs::rename(staging, path).await
        }
        other => other,
    }
}

async fn holds_complete_record(path: &Path) -> bool {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice::<DiagnosisRecord>(&bytes).is_ok(),
        // Unreadable: leave it alone.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ConfidenceTier, Diagnosis};
    use crate::uuid::SessionId;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record() -> DiagnosisRecord {
        DiagnosisRecord {
            session_id: SessionId::new(),
            patient_id: "P-0001".into(),
            clinician_id: "dr-okafor".into(),
            selected_symptom_ids: vec![1, 4],
            diagnosis_label: "co-infection of Malaria and Typhoid".into(),
            final_diagnosis: Diagnosis::co_infection("Malaria", "Typhoid"),
            confidence: ConfidenceTier::High,
            requires_imaging: true,
            clinical_findings: Default::default(),
            prescription: Vec::new(),
            safety_warnings: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    fn write_reference_dir(dir: &Path, with_optional: bool) {
        std::fs::write(dir.join(CATALOG_FILENAME), cdss_reference::builtin::CATALOG_YAML)
            .expect("write catalog");
        std::fs::write(
            dir.join(GUIDELINES_FILENAME),
            cdss_reference::builtin::GUIDELINES_YAML,
        )
        .expect("write guidelines");
        std::fs::write(
            dir.join(INTERACTIONS_FILENAME),
            cdss_reference::builtin::INTERACTIONS_YAML,
        )
        .expect("write interactions");
        if with_optional {
            std::fs::write(dir.join(DOSAGE_FILENAME), cdss_reference::builtin::DOSAGE_YAML)
                .expect("write dosage");
            std::fs::write(
                dir.join(ALLERGIES_FILENAME),
                cdss_reference::builtin::ALLERGIES_YAML,
            )
            .expect("write allergies");
        }
    }

    #[tokio::test]
    async fn static_source_serves_builtin_tables() {
        let source = StaticReferenceSource::builtin().expect("builtin");
        let data = source.reference_data().await.expect("data");
        assert_eq!(data.catalog.disease_names(), vec!["Malaria", "Typhoid"]);
        let allergies = source.patient_allergies("P-0001").await.expect("allergies");
        assert!(!allergies.is_empty());
        assert!(source
            .patient_allergies("nobody")
            .await
            .expect("allergies")
            .is_empty());
    }

    #[tokio::test]
    async fn yaml_dir_source_reads_all_tables() {
        let tmp = TempDir::new().expect("tempdir");
        write_reference_dir(tmp.path(), true);

        let source = YamlDirReferenceSource::new(tmp.path());
        let data = source.reference_data().await.expect("data");
        assert!(data.guidelines.resolve("Malaria & Typhoid").is_some());
        assert_eq!(data.dosage.dosage_for("Ciprofloxacin", 70.0), "500 mg");
        assert!(data.interactions.interacts("Warfarin", "Ciprofloxacin"));
        assert!(!source
            .patient_allergies("P-0001")
            .await
            .expect("allergies")
            .is_empty());
    }

    #[tokio::test]
    async fn yaml_dir_source_tolerates_missing_optional_files() {
        let tmp = TempDir::new().expect("tempdir");
        write_reference_dir(tmp.path(), false);

        let source = YamlDirReferenceSource::new(tmp.path());
        let data = source.reference_data().await.expect("data");
        assert_eq!(
            data.dosage.dosage_for("Ciprofloxacin", 70.0),
            crate::constants::AS_PRESCRIBED
        );
        assert!(source
            .patient_allergies("P-0001")
            .await
            .expect("allergies")
            .is_empty());
    }

    #[tokio::test]
    async fn missing_required_file_is_a_fetch_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = YamlDirReferenceSource::new(tmp.path())
            .reference_data()
            .await
            .expect_err("no catalog");
        assert!(matches!(&err, CdssError::ReferenceFetch(msg) if msg.contains(CATALOG_FILENAME)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_file_is_a_reference_error() {
        let tmp = TempDir::new().expect("tempdir");
        write_reference_dir(tmp.path(), false);
        std::fs::write(
            tmp.path().join(CATALOG_FILENAME),
            "symptoms:\n  - id: 1\n    name: Headache\n    category: mild\n",
        )
        .expect("overwrite catalog");

        let err = YamlDirReferenceSource::new(tmp.path())
            .reference_data()
            .await
            .expect_err("bad category");
        assert!(matches!(err, CdssError::Reference(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn in_memory_sink_keeps_records() {
        let sink = InMemoryRecordSink::new();
        let record = record();
        sink.submit(&record).await.expect("submit");
        assert_eq!(sink.records().expect("records"), vec![record]);
    }

    #[tokio::test]
    async fn json_sink_writes_sharded_file_once() {
        let tmp = TempDir::new().expect("tempdir");
        let sink = JsonDirRecordSink::new(tmp.path());
        let record = record();

        sink.submit(&record).await.expect("submit");
        let path = sink.record_path(&record);
        let canonical = record.session_id.to_string();
        assert!(path.starts_with(tmp.path().join(&canonical[0..2]).join(&canonical[2..4])));

        let written = std::fs::read_to_string(&path).expect("read record");
        let back: DiagnosisRecord = serde_json::from_str(&written).expect("parse record");
        assert_eq!(back, record);

        let err = sink.submit(&record).await.expect_err("second write");
        assert!(matches!(err, CdssError::RecordSubmit(_)));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn json_sink_retry_replaces_a_truncated_record() {
        let tmp = TempDir::new().expect("tempdir");
        let sink = JsonDirRecordSink::new(tmp.path());
        let record = record();

        let path = sink.record_path(&record);
        std::fs::create_dir_all(path.parent().expect("shard dir")).expect("mkdir");
        let full = record.to_json_pretty().expect("json");
        std::fs::write(&path, &full.as_bytes()[..full.len() / 2]).expect("write partial");

        sink.submit(&record).await.expect("retry after partial write");
        let written = std::fs::read_to_string(&path).expect("read record");
        let back: DiagnosisRecord = serde_json::from_str(&written).expect("parse record");
        assert_eq!(back, record);
        assert!(!path.with_extension("json.tmp").exists());

        let err = sink.submit(&record).await.expect_err("complete record is kept");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn json_sink_failure_leaves_no_partial_file() {
        let tmp = TempDir::new().expect("tempdir");
        // A file where the shard directory should be makes every write fail.
        let blocker = tmp.path().join("records");
        std::fs::write(&blocker, "").expect("blocker");
        let sink = JsonDirRecordSink::new(&blocker);
        let record = record();

        let err = sink.submit(&record).await.expect_err("cannot create shard");
        assert!(matches!(err, CdssError::RecordSubmit(_)));
        assert!(!sink.record_path(&record).exists());
    }
}
