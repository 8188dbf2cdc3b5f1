//! Errors raised at the store boundary

use thiserror::Error;

/// Structured failure code reported by the store, when it provides one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorCode {
    /// Unique constraint violated (e.g. duplicate e-mail)
    UniqueViolation,
    /// Check constraint violated (malformed column value)
    CheckViolation,
    /// Caller lacks rights on the row (RLS / grant)
    InsufficientPrivilege,
    /// Session token rejected or expired
    AuthenticationFailed,
    /// Transport-level failure reaching the store
    Unavailable,
}

impl StoreErrorCode {
    /// Map a Postgres SQLSTATE or gateway code to a structured code
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            "23505" => Some(StoreErrorCode::UniqueViolation),
            "23514" => Some(StoreErrorCode::CheckViolation),
            "42501" => Some(StoreErrorCode::InsufficientPrivilege),
            "PGRST301" | "PGRST302" => Some(StoreErrorCode::AuthenticationFailed),
            "08000" | "08001" | "08003" | "08006" => Some(StoreErrorCode::Unavailable),
            _ => None,
        }
    }
}

/// A failure reported by the entity store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub code: Option<StoreErrorCode>,
    pub message: String,
}

impl StoreError {
    /// An error carrying only text
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// An error with a structured code
    pub fn with_code(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_mapping() {
        assert_eq!(
            StoreErrorCode::from_sqlstate("23505"),
            Some(StoreErrorCode::UniqueViolation)
        );
        assert_eq!(
            StoreErrorCode::from_sqlstate("42501"),
            Some(StoreErrorCode::InsufficientPrivilege)
        );
        assert_eq!(StoreErrorCode::from_sqlstate("99999"), None);
    }

    #[test]
    fn test_display_is_raw_message() {
        let err = StoreError::new("connection reset by peer");
        assert_eq!(err.to_string(), "connection reset by peer");
    }
}
