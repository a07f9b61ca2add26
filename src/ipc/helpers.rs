use std::path::Path;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::calc::ClassifyError;
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::roster::RosterError;
use crate::snapshot::SnapshotError;
use crate::tracker::TrackerError;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr::new("bad_params", message)
}

/// Deserializes `params` into a typed request. Absent params read as `{}`.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    let value = if params.is_null() {
        json!({})
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|e| bad_params(e.to_string()))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_params(format!("missing {}", key)))
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_workspace(state: &AppState) -> Result<&Path, HandlerErr> {
    state
        .workspace
        .as_deref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn storage_unavailable(context: &str, cause: &dyn std::fmt::Display) -> HandlerErr {
    tracing::error!(%cause, "{context} failed");
    HandlerErr::new("storage_unavailable", "storage unavailable")
        .with_details(json!({ "cause": cause.to_string() }))
}

impl From<RosterError> for HandlerErr {
    fn from(e: RosterError) -> Self {
        match e {
            RosterError::Validation(errors) => {
                HandlerErr::new("validation_failed", errors.join(" | "))
                    .with_details(json!({ "errors": errors }))
            }
            RosterError::Duplicate(matricule) => HandlerErr::new(
                "duplicate_matricule",
                format!("a student with matricule {} already exists", matricule),
            ),
            RosterError::NotFound => HandlerErr::new("not_found", "student not found"),
            RosterError::Storage(cause) => storage_unavailable("roster query", &cause),
        }
    }
}

impl From<SnapshotError> for HandlerErr {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::AlreadyTaken(_) => HandlerErr::new("already_taken", e.to_string()),
            SnapshotError::NotFound(_) => HandlerErr::new("not_found", e.to_string()),
            SnapshotError::Serde(cause) => storage_unavailable("snapshot serde", &cause),
            SnapshotError::Io(cause) => storage_unavailable("snapshot io", &cause),
        }
    }
}

impl From<TrackerError> for HandlerErr {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::Validation(errors) => {
                let message = errors
                    .iter()
                    .map(|f| f.message)
                    .collect::<Vec<_>>()
                    .join(" | ");
                HandlerErr::new("validation_failed", message)
                    .with_details(json!({ "errors": errors }))
            }
            TrackerError::Duplicate(_) => HandlerErr::new("duplicate_student", e.to_string()),
            TrackerError::NotFound(_) => HandlerErr::new("not_found", e.to_string()),
            TrackerError::SessionOutOfRange { .. } => bad_params(e.to_string()),
        }
    }
}

impl From<ClassifyError> for HandlerErr {
    fn from(e: ClassifyError) -> Self {
        match e {
            ClassifyError::InvalidInput { expected, actual } => {
                HandlerErr::new("invalid_input", e.to_string())
                    .with_details(json!({ "expected": expected, "actual": actual }))
            }
        }
    }
}
