use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::data::Weekday;

/// The first structural defect found in a candidate timetable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralViolation {
    #[error("candidate is not an object")]
    NotAnObject,
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("missing day {0}")]
    MissingDay(Weekday),
    #[error("missing slot {0} {1}")]
    MissingSlot(Weekday, &'static str),
    #[error("missing key {field} in {day} {slot}")]
    MissingAssignmentField {
        day: Weekday,
        slot: &'static str,
        field: &'static str,
    },
}

/// Raised only when validation runs in strict mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("timetable {index} rejected: {violation}")]
    Rejected {
        index: usize,
        violation: StructuralViolation,
    },
}

/// Caller input rejected before the provider is asked for anything.
/// Positions are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("No class requests provided")]
    NoClassRequests,
    #[error("Class data is required")]
    MissingClass,
    #[error("Class {0} must have batch, branch, and semester fields")]
    IncompleteClass(usize),
    #[error("Course {0} must have name and code fields")]
    IncompleteCourse(usize),
    #[error("Teacher {0} must have name field")]
    UnnamedTeacher(usize),
    #[error("Room {0} must have name field")]
    UnnamedRoom(usize),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response had no content")]
    EmptyResponse,
    #[error("AI response was not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("AI response is not a list of timetables")]
    NotAList,
}

/// Errors surfaced to HTTP callers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Input(#[from] InputError),
    #[error("AI generation failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Schema(#[from] SchemaError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Input(_) => StatusCode::BAD_REQUEST,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
