//! # CDSS REST API
//!
//! Stateless REST adapter over the decision support pipeline.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! Every request is answered from the reference data loaded at startup; there are no sessions
//! over HTTP. The full wizard lives in `cdss_core::DiagnosisSession`.

#![warn(rust_2018_idioms)]

pub mod dto;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use cdss_core::{
    classify, score, CdssError, ClassificationThresholds, EvidenceSet, ReferenceData,
    SafetyChecker,
};
use cdss_reference::{AllergySeverity, PatientAllergy};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dto::{
    DiagnoseRes, DifferentialDto, DiseaseScoreDto, DosageQuery, DosageRes, GuidelineQuery,
    GuidelineRes, HealthRes, SafetyReq, SafetyRes, SafetyWarningDto, ScoreReq, ScoreRes,
    SymptomDto, SymptomsRes, TherapyLineDto,
};

type ApiError = (StatusCode, String);

/// Application state shared across REST handlers.
#[derive(Clone)]
pub struct AppState {
    reference: Arc<ReferenceData>,
    thresholds: ClassificationThresholds,
    safety: SafetyChecker,
}

impl AppState {
    pub fn new(reference: Arc<ReferenceData>, thresholds: ClassificationThresholds) -> Self {
        Self {
            reference,
            thresholds,
            safety: SafetyChecker::default(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, list_symptoms, score_evidence, diagnose, guideline, dosage, safety),
    components(schemas(
        HealthRes,
        SymptomDto,
        SymptomsRes,
        ScoreReq,
        ScoreRes,
        DiseaseScoreDto,
        DiagnoseRes,
        DifferentialDto,
        GuidelineRes,
        TherapyLineDto,
        DosageRes,
        SafetyReq,
        SafetyRes,
        SafetyWarningDto,
    ))
)]
pub struct ApiDoc;

/// Build the REST router, including Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/symptoms", get(list_symptoms))
        .route("/score", post(score_evidence))
        .route("/diagnose", post(diagnose))
        .route("/guidelines", get(guideline))
        .route("/dosage", get(dosage))
        .route("/safety", post(safety))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map a core error to a status code. Validation failures are the caller's to fix.
fn api_error(err: CdssError) -> ApiError {
    if err.is_validation() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else {
        tracing::error!("request failed: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
    }
}

fn evidence_from(ids: &[u32]) -> EvidenceSet {
    ids.iter().copied().collect()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "CDSS REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/symptoms",
    responses(
        (status = 200, description = "Evidence catalog", body = SymptomsRes)
    )
)]
/// List the symptoms a clinician can select, and the modeled diseases.
#[axum::debug_handler]
async fn list_symptoms(State(state): State<AppState>) -> Json<SymptomsRes> {
    let catalog = &state.reference.catalog;
    Json(SymptomsRes {
        symptoms: catalog.symptoms().iter().map(SymptomDto::from).collect(),
        diseases: catalog
            .disease_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    })
}

#[utoipa::path(
    post,
    path = "/score",
    request_body = ScoreReq,
    responses(
        (status = 200, description = "Per-disease scores", body = ScoreRes),
        (status = 400, description = "Empty evidence set")
    )
)]
/// Score a set of selected symptom ids.
#[axum::debug_handler]
async fn score_evidence(
    State(state): State<AppState>,
    Json(req): Json<ScoreReq>,
) -> Result<Json<ScoreRes>, ApiError> {
    let result = score(&evidence_from(&req.symptom_ids), &state.reference.catalog)
        .map_err(api_error)?;
    Ok(Json(ScoreRes::from(&result)))
}

#[utoipa::path(
    post,
    path = "/diagnose",
    request_body = ScoreReq,
    responses(
        (status = 200, description = "Diagnosis verdict", body = DiagnoseRes),
        (status = 400, description = "Empty evidence set")
    )
)]
/// Score and classify a set of selected symptom ids.
///
/// The suggested diagnosis is advisory; the clinician makes the final choice.
#[axum::debug_handler]
async fn diagnose(
    State(state): State<AppState>,
    Json(req): Json<ScoreReq>,
) -> Result<Json<DiagnoseRes>, ApiError> {
    let catalog = &state.reference.catalog;
    let result = score(&evidence_from(&req.symptom_ids), catalog).map_err(api_error)?;
    let verdict = classify(&result, &catalog.disease_names(), &state.thresholds);
    Ok(Json(DiagnoseRes::new(&result, &verdict)))
}

#[utoipa::path(
    get,
    path = "/guidelines",
    params(GuidelineQuery),
    responses(
        (status = 200, description = "Treatment guideline", body = GuidelineRes),
        (status = 404, description = "No guideline for this label; prescribe manually")
    )
)]
/// Resolve the treatment guideline for an exact diagnosis label.
#[axum::debug_handler]
async fn guideline(
    State(state): State<AppState>,
    Query(query): Query<GuidelineQuery>,
) -> Result<Json<GuidelineRes>, ApiError> {
    match state.reference.guidelines.resolve(&query.diagnosis) {
        Some(g) => Ok(Json(GuidelineRes::from(g))),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("no treatment guideline for {}", query.diagnosis),
        )),
    }
}

#[utoipa::path(
    get,
    path = "/dosage",
    params(DosageQuery),
    responses(
        (status = 200, description = "Weight-banded dosage, or \"as prescribed\"", body = DosageRes)
    )
)]
/// Weight-banded dosage for a drug.
#[axum::debug_handler]
async fn dosage(
    State(state): State<AppState>,
    Query(query): Query<DosageQuery>,
) -> Json<DosageRes> {
    let dosage = state
        .reference
        .dosage
        .dosage_for(&query.drug, query.weight_kg);
    Json(DosageRes {
        drug: query.drug,
        weight_kg: query.weight_kg,
        dosage,
    })
}

#[utoipa::path(
    post,
    path = "/safety",
    request_body = SafetyReq,
    responses(
        (status = 200, description = "Advisory safety warnings", body = SafetyRes)
    )
)]
/// Check a drug list for interactions and allergy contraindications.
///
/// Blank allergy names are ignored.
#[axum::debug_handler]
async fn safety(State(state): State<AppState>, Json(req): Json<SafetyReq>) -> Json<SafetyRes> {
    let allergies: Vec<PatientAllergy> = req
        .allergies
        .iter()
        .filter_map(|name| PatientAllergy::new(name, AllergySeverity::Unknown).ok())
        .collect();
    let drugs: Vec<&str> = req
        .drugs
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();

    let warnings = state
        .safety
        .check(&drugs, &state.reference.interactions, &allergies);
    Json(SafetyRes {
        warnings: warnings.iter().map(SafetyWarningDto::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn app() -> Router {
        let reference = Arc::new(ReferenceData::builtin().expect("builtin reference data"));
        router(AppState::new(reference, ClassificationThresholds::default()))
    }

    async fn send(req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = app().oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, bytes.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(uri: &str) -> (StatusCode, Option<T>) {
        let req = Request::builder().uri(uri).body(Body::empty()).expect("request");
        let (status, bytes) = send(req).await;
        (status, serde_json::from_slice(&bytes).ok())
    }

    async fn post_json<T: DeserializeOwned>(
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Option<T>) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let (status, bytes) = send(req).await;
        (status, serde_json::from_slice(&bytes).ok())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = get_json::<HealthRes>("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.expect("body").ok);
    }

    #[tokio::test]
    async fn lists_catalog() {
        let (status, body) = get_json::<SymptomsRes>("/symptoms").await;
        assert_eq!(status, StatusCode::OK);
        let body = body.expect("body");
        assert_eq!(body.diseases, vec!["Malaria", "Typhoid"]);
        let first = &body.symptoms[0];
        assert_eq!((first.id, first.weight), (1, 4));
        assert_eq!(first.category, "very-strong");
    }

    #[tokio::test]
    async fn diagnose_worked_example() {
        let (status, body) =
            post_json::<DiagnoseRes>("/diagnose", serde_json::json!({ "symptom_ids": [1, 4] }))
                .await;
        assert_eq!(status, StatusCode::OK);
        let body = body.expect("body");
        assert_eq!(body.label, "co-infection of Malaria and Typhoid");
        assert_eq!(body.confidence, "high");
        assert!(body.requires_imaging);
        assert_eq!(body.suggested_diagnosis.as_deref(), Some("Malaria & Typhoid"));
        assert!(body
            .scores
            .per_disease
            .iter()
            .all(|s| s.probability_percent == 87));
    }

    #[tokio::test]
    async fn empty_evidence_is_a_bad_request() {
        let (status, _) =
            post_json::<ScoreRes>("/score", serde_json::json!({ "symptom_ids": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn score_reports_unresolved_ids() {
        let (status, body) =
            post_json::<ScoreRes>("/score", serde_json::json!({ "symptom_ids": [13, 999] }))
                .await;
        assert_eq!(status, StatusCode::OK);
        let body = body.expect("body");
        assert_eq!(body.unresolved_ids, vec![999]);
        assert!(!body.has_very_strong_signal);
    }

    #[tokio::test]
    async fn guideline_lookup_is_exact() {
        let (status, body) =
            get_json::<GuidelineRes>("/guidelines?diagnosis=Malaria%20%26%20Typhoid").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.expect("body").lines.len(), 3);

        let (status, _) = get_json::<GuidelineRes>("/guidelines?diagnosis=malaria").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dosage_uses_weight_bands() {
        let (status, body) =
            get_json::<DosageRes>("/dosage?drug=Ciprofloxacin&weight_kg=20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.expect("body").dosage, "250 mg");

        let (_, body) = get_json::<DosageRes>("/dosage?drug=Azithromycin&weight_kg=20").await;
        assert_eq!(body.expect("body").dosage, "as prescribed");

        let (status, _) = get_json::<DosageRes>("/dosage?drug=Ciprofloxacin&weight_kg=heavy").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn safety_reports_allergy_and_interaction() {
        let (status, body) = post_json::<SafetyRes>(
            "/safety",
            serde_json::json!({
                "drugs": ["Warfarin", "Ciprofloxacin", "Azithromycin"],
                "allergies": ["azithro", "  "]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let kinds: Vec<String> = body
            .expect("body")
            .warnings
            .into_iter()
            .map(|w| w.kind)
            .collect();
        assert_eq!(kinds, vec!["interaction", "interaction", "allergy"]);
    }
}
