mod script;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cdss_core::{
    classify, records_dir_from_env_value, reference_dir_from_env_value, score, CoreConfig,
    EvidenceSet, InMemoryRecordSink, RecordSink, SafetyChecker,
};
use cdss_reference::{AllergySeverity, PatientAllergy};

#[derive(Parser)]
#[command(name = "cdss")]
#[command(about = "Clinical decision support pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the evidence catalog
    Symptoms,
    /// Score and classify selected symptoms
    Diagnose {
        /// Symptom id (repeatable)
        #[arg(long = "symptom", required = true)]
        symptoms: Vec<u32>,
    },
    /// Show the treatment guideline for an exact diagnosis label
    Guideline {
        /// e.g. "Malaria" or "Malaria & Typhoid"
        label: String,
    },
    /// Weight-banded dosage for a drug
    Dosage {
        drug: String,
        weight_kg: f64,
    },
    /// Check a drug list for interactions and allergy contraindications
    Check {
        /// Drug name (repeatable)
        #[arg(long = "drug", required = true)]
        drugs: Vec<String>,
        /// Allergy name (repeatable)
        #[arg(long = "allergy")]
        allergies: Vec<String>,
        /// Also include allergies recorded for this patient
        #[arg(long)]
        patient: Option<String>,
    },
    /// Replay a diagnosis session from a YAML script and save the record
    Session {
        script: PathBuf,
        /// Keep the record in memory instead of writing it to the records directory
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("cdss=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = CoreConfig::new(
        reference_dir_from_env_value(std::env::var("CDSS_REFERENCE_DIR").ok())?,
        records_dir_from_env_value(std::env::var("CDSS_RECORDS_DIR").ok()),
        Default::default(),
    )?;
    let source = cfg.reference_source()?;

    match cli.command {
        Some(Commands::Symptoms) => {
            let data = source.reference_data().await?;
            for symptom in data.catalog.symptoms() {
                println!(
                    "{:>3}  {:<28} {} ({})",
                    symptom.id,
                    symptom.name,
                    symptom.category_name(),
                    symptom.weight()
                );
            }
            println!("Diseases: {}", data.catalog.disease_names().join(", "));
        }
        Some(Commands::Diagnose { symptoms }) => {
            let data = source.reference_data().await?;
            let evidence: EvidenceSet = symptoms.into_iter().collect();
            let result = score(&evidence, &data.catalog)?;
            let verdict = classify(&result, &data.catalog.disease_names(), cfg.thresholds());

            for entry in &result.per_disease {
                println!(
                    "{}: {}% (raw {})",
                    entry.disease, entry.probability_percent, entry.raw_score
                );
            }
            println!("Diagnosis: {} [{} confidence]", verdict.label, verdict.confidence);
            if verdict.requires_imaging {
                println!("Imaging required");
            }
            for d in &verdict.differentials {
                println!(
                    "  - {} {}% [{}]: {}",
                    d.disease,
                    d.probability_percent,
                    d.confidence,
                    d.supporting_symptoms.join(", ")
                );
            }
            if !result.unresolved_ids.is_empty() {
                println!("Ignored unknown symptom ids: {:?}", result.unresolved_ids);
            }
        }
        Some(Commands::Guideline { label }) => {
            let data = source.reference_data().await?;
            match data.guidelines.resolve(&label) {
                Some(g) => {
                    println!("{}", g.disease);
                    for line in &g.lines {
                        println!(
                            "  - {}: {}, {}, {} days",
                            line.drug, line.dosage, line.frequency, line.duration_days
                        );
                    }
                    if let Some(notes) = &g.notes {
                        println!("Notes: {notes}");
                    }
                }
                None => println!("No guideline for {label}; prescribe manually."),
            }
        }
        Some(Commands::Dosage { drug, weight_kg }) => {
            let data = source.reference_data().await?;
            println!("{}", data.dosage.dosage_for(&drug, weight_kg));
        }
        Some(Commands::Check {
            drugs,
            allergies,
            patient,
        }) => {
            let data = source.reference_data().await?;
            let mut all: Vec<PatientAllergy> = allergies
                .iter()
                .filter_map(|a| PatientAllergy::new(a, AllergySeverity::Unknown).ok())
                .collect();
            if let Some(patient_id) = patient {
                all.extend(source.patient_allergies(&patient_id).await?);
            }
            let names: Vec<&str> = drugs.iter().map(String::as_str).collect();
            let warnings = SafetyChecker::default().check(&names, &data.interactions, &all);
            if warnings.is_empty() {
                println!("No warnings.");
            }
            for w in warnings {
                println!("[{:?}] {}", w.severity, w.message);
            }
        }
        Some(Commands::Session {
            script: path,
            dry_run,
        }) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let parsed = script::SessionScript::parse(&text)?;
            tracing::info!(script = %path.display(), dry_run, "replaying session script");

            let json_sink = cfg.record_sink();
            let memory_sink = InMemoryRecordSink::new();
            let sink: &dyn RecordSink = if dry_run { &memory_sink } else { &json_sink };

            let record = script::run_with_config(&parsed, &cfg, sink).await?;
            println!("{}", record.to_json_pretty()?);
            if !dry_run {
                println!(
                    "Saved to {}",
                    record.session_id.sharded_path(cfg.records_dir(), "json").display()
                );
            }
        }
        None => {
            println!("Use 'cdss --help' for commands");
        }
    }

    Ok(())
}
