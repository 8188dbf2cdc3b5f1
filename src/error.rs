//! Dashboard error taxonomy and store error classification

use crate::store::{StoreError, StoreErrorCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the dashboard engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    /// Bad user input, caught before any store call
    #[error("VALIDATION: {0}")]
    Validation(String),
    /// Referenced entity missing
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    /// Unique-constraint violation
    #[error("CONFLICT: {0}")]
    Conflict(String),
    /// Caller lacks rights on the target row
    #[error("PERMISSION: {0}")]
    Permission(String),
    /// Subscription or fetch could not be established
    #[error("CONNECTIVITY: {0}")]
    Connectivity(String),
    /// Unclassified store failure; the raw message is kept for diagnostics
    #[error("STORE: {0}")]
    UnknownStore(String),
}

/// Machine-readable error category for conditional UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Permission,
    Connectivity,
    UnknownStore,
}

impl DashboardError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DashboardError::Validation(_) => ErrorCategory::Validation,
            DashboardError::NotFound(_) => ErrorCategory::NotFound,
            DashboardError::Conflict(_) => ErrorCategory::Conflict,
            DashboardError::Permission(_) => ErrorCategory::Permission,
            DashboardError::Connectivity(_) => ErrorCategory::Connectivity,
            DashboardError::UnknownStore(_) => ErrorCategory::UnknownStore,
        }
    }

    /// The raw message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            DashboardError::Validation(m)
            | DashboardError::NotFound(m)
            | DashboardError::Conflict(m)
            | DashboardError::Permission(m)
            | DashboardError::Connectivity(m)
            | DashboardError::UnknownStore(m) => m,
        }
    }

    /// Fixed human-readable message for the category
    pub fn user_message(&self) -> &'static str {
        self.category().user_message()
    }
}

impl ErrorCategory {
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "Invalid data format. Please check your input.",
            ErrorCategory::NotFound => {
                "The record no longer exists or you may not have permission to change it."
            }
            ErrorCategory::Conflict => {
                "Email already exists. Please use a different email address."
            }
            ErrorCategory::Permission => {
                "Permission denied. You can only change records owned by your account."
            }
            ErrorCategory::Connectivity => {
                "Unable to reach the data service. Please check your connection and try again."
            }
            ErrorCategory::UnknownStore => "Something went wrong. Please try again.",
        }
    }
}

impl From<StoreError> for DashboardError {
    fn from(err: StoreError) -> Self {
        classify_store_error(&err)
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;

const CONFLICT_MARKERS: &[&str] = &["duplicate key", "unique constraint"];
const PERMISSION_MARKERS: &[&str] = &["permission denied", "row-level security", "jwt"];
const VALIDATION_MARKERS: &[&str] = &["violates check constraint", "invalid input syntax"];
const CONNECTIVITY_MARKERS: &[&str] = &[
    "connection",
    "timed out",
    "timeout",
    "network",
    "failed to fetch",
    "unreachable",
];

/// Classify a store failure into the dashboard taxonomy.
///
/// The structured code wins when present. Otherwise the message is matched
/// case-insensitively against known markers, checked in order: conflict,
/// permission, validation, connectivity. Anything else becomes
/// `UnknownStore` with the raw message preserved.
pub fn classify_store_error(err: &StoreError) -> DashboardError {
    let message = err.message.clone();

    if let Some(code) = err.code {
        return match code {
            StoreErrorCode::UniqueViolation => DashboardError::Conflict(message),
            StoreErrorCode::CheckViolation => DashboardError::Validation(message),
            StoreErrorCode::InsufficientPrivilege | StoreErrorCode::AuthenticationFailed => {
                DashboardError::Permission(message)
            }
            StoreErrorCode::Unavailable => DashboardError::Connectivity(message),
        };
    }

    let lowered = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

    if contains_any(CONFLICT_MARKERS) {
        DashboardError::Conflict(message)
    } else if contains_any(PERMISSION_MARKERS) {
        DashboardError::Permission(message)
    } else if contains_any(VALIDATION_MARKERS) {
        DashboardError::Validation(message)
    } else if contains_any(CONNECTIVITY_MARKERS) {
        DashboardError::Connectivity(message)
    } else {
        DashboardError::UnknownStore(message)
    }
}
