use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cdss_api_rest::{AppState, router};
use cdss_core::{CoreConfig, records_dir_from_env_value, reference_dir_from_env_value};

/// Main entry point for the CDSS service
///
/// Loads reference data once and serves the REST API (with Swagger UI at `/swagger-ui`).
///
/// # Environment Variables
/// - `CDSS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CDSS_REFERENCE_DIR`: Directory of reference YAML tables (default: built-in tables)
/// - `CDSS_RECORDS_DIR`: Directory for saved diagnosis records (default: "diagnosis_records")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration or reference data is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("cdss=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CDSS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = CoreConfig::new(
        reference_dir_from_env_value(std::env::var("CDSS_REFERENCE_DIR").ok())?,
        records_dir_from_env_value(std::env::var("CDSS_RECORDS_DIR").ok()),
        Default::default(),
    )?;

    let reference = cfg.reference_source()?.reference_data().await?;
    tracing::info!(
        symptoms = reference.catalog.symptoms().len(),
        diseases = reference.catalog.disease_names().len(),
        "loaded reference data"
    );

    let app = router(AppState::new(reference, *cfg.thresholds()));

    tracing::info!("++ Starting CDSS REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
