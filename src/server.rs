use std::sync::Arc;

use axum::extract::State;
use axum::{Json, Router, routing::get, routing::post};
use log::{info, trace, warn};
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::conflicts::{detect_conflicts, detect_schedule_conflicts};
use crate::data::{
    GenerationRequest, Schedule, SingleGenerationRequest, TIME_SLOTS, ValidateRequest,
    ValidationResult, Weekday, timetable_template,
};
use crate::error::AppError;
use crate::provider::{ScheduleProvider, TokenUsage, parse_candidates};
use crate::validator::{Rejection, validate_with};

pub struct AppState<P> {
    pub provider: P,
    pub config: Config,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub class_requests_processed: usize,
    pub timetables_generated: usize,
    pub timetables_accepted: usize,
    pub validation_passed: bool,
    pub conflicts_found: usize,
    pub ai_tokens_used: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationData {
    pub request_id: String,
    pub processed_at: Option<String>,
    pub model: String,
    pub timetables: Vec<Schedule>,
    pub validation: ValidationResult,
    pub ai_usage: TokenUsage,
    pub summary: GenerationSummary,
}

/// The generated timetable of a single class, if the provider produced an
/// acceptable one.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleGenerationData {
    pub request_id: String,
    pub processed_at: Option<String>,
    pub model: String,
    pub timetable: Option<Schedule>,
    pub validation: ValidationResult,
    pub ai_usage: TokenUsage,
    pub summary: GenerationSummary,
}

impl From<GenerationData> for SingleGenerationData {
    fn from(data: GenerationData) -> Self {
        Self {
            request_id: data.request_id,
            processed_at: data.processed_at,
            model: data.model,
            timetable: data.timetables.into_iter().next(),
            validation: data.validation,
            ai_usage: data.ai_usage,
            summary: data.summary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse<D> {
    pub success: bool,
    pub message: String,
    pub data: D,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedTimetable {
    pub index: usize,
    pub reason: String,
}

impl From<&Rejection> for RejectedTimetable {
    fn from(rejection: &Rejection) -> Self {
        Self {
            index: rejection.index,
            reason: rejection.violation.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub timetables_received: usize,
    pub timetables_accepted: usize,
    pub validation_passed: bool,
    pub conflicts_found: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckData {
    pub timetables: Vec<Schedule>,
    pub rejected: Vec<RejectedTimetable>,
    pub validation: ValidationResult,
    pub summary: CheckSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub success: bool,
    pub data: CheckData,
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Server is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn template_handler() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "template": timetable_template(),
            "timeSlots": TIME_SLOTS,
            "days": Weekday::ALL,
        },
    }))
}

async fn run_generation<P: ScheduleProvider>(
    state: &AppState<P>,
    request: GenerationRequest,
) -> Result<GenerationData, AppError> {
    request.check()?;
    info!(
        "Generation request: {} classes, {} existing timetables, {} courses, {} teachers, {} rooms",
        request.class_requests.len(),
        request.existing_timetables.len(),
        request.courses.len(),
        request.teachers.len(),
        request.rooms.len()
    );

    let completion = state.provider.generate(&request).await.inspect_err(|e| {
        warn!("AI generation failed: {}", e);
    })?;
    trace!("Raw AI response: {}", completion.text);

    let candidates = parse_candidates(&completion.text).inspect_err(|e| {
        warn!("Could not read AI response: {}", e);
    })?;
    let validated = validate_with(
        &candidates,
        &request.class_requests,
        &state.config.validation_options(),
    )?;
    let validation = detect_schedule_conflicts(&validated.accepted, &state.config.detection_days);

    let summary = GenerationSummary {
        class_requests_processed: request.class_requests.len(),
        timetables_generated: candidates.len(),
        timetables_accepted: validated.accepted.len(),
        validation_passed: validation.valid,
        conflicts_found: validation.conflicts.len(),
        ai_tokens_used: completion.usage.total_tokens,
    };
    info!(
        "Sending {} of {} generated timetables ({} conflicts)",
        summary.timetables_accepted, summary.timetables_generated, summary.conflicts_found
    );

    Ok(GenerationData {
        request_id: request
            .settings
            .request_id
            .unwrap_or_else(|| "unknown".to_string()),
        processed_at: request.settings.generated_at,
        model: completion.model,
        timetables: validated.accepted,
        validation,
        ai_usage: completion.usage,
        summary,
    })
}

async fn generate_handler<P: ScheduleProvider>(
    State(state): State<Arc<AppState<P>>>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationResponse<GenerationData>>, AppError> {
    let data = run_generation(&state, request).await?;
    Ok(Json(GenerationResponse {
        success: true,
        message: "AI timetable generation completed successfully".to_string(),
        data,
    }))
}

async fn generate_single_handler<P: ScheduleProvider>(
    State(state): State<Arc<AppState<P>>>,
    Json(request): Json<SingleGenerationRequest>,
) -> Result<Json<GenerationResponse<SingleGenerationData>>, AppError> {
    let request = GenerationRequest::try_from(request)?;
    let data = run_generation(&state, request).await?;
    Ok(Json(GenerationResponse {
        success: true,
        message: "Single timetable generation completed".to_string(),
        data: data.into(),
    }))
}

async fn validate_handler<P: ScheduleProvider>(
    State(state): State<Arc<AppState<P>>>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let candidates = request
        .timetables
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();
    let validated = validate_with(
        candidates,
        &request.class_requests,
        &state.config.validation_options(),
    )?;
    let validation = detect_conflicts(&request.timetables, &state.config.detection_days);

    let summary = CheckSummary {
        timetables_received: candidates.len(),
        timetables_accepted: validated.accepted.len(),
        validation_passed: validation.valid,
        conflicts_found: validation.conflicts.len(),
    };
    Ok(Json(CheckResponse {
        success: true,
        data: CheckData {
            rejected: validated.rejected.iter().map(RejectedTimetable::from).collect(),
            timetables: validated.accepted,
            validation,
            summary,
        },
    }))
}

pub fn router<P>(state: AppState<P>) -> Router
where
    P: ScheduleProvider + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/timetables/template", get(template_handler))
        .route("/v1/timetables/generate", post(generate_handler::<P>))
        .route(
            "/v1/timetables/generate-single",
            post(generate_single_handler::<P>),
        )
        .route("/v1/timetables/validate", post(validate_handler::<P>))
        .with_state(Arc::new(state))
}

pub async fn run_server<P>(state: AppState<P>) -> std::io::Result<()>
where
    P: ScheduleProvider + Send + Sync + 'static,
{
    let listener = tokio::net::TcpListener::bind(&state.config.bind_address).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
