//! Error types for the library server

use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Field name -> list of messages, the shape validation failures are reported in
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Outcome class of an error; the HTTP status is looked up from the class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A CRUD resource addressed by the URL does not exist
    ResourceNotFound,
    /// A record referenced by a domain action could not be resolved
    LookupFailed,
    /// A loan lifecycle rule refused the action
    Precondition,
    /// Request input failed validation
    Validation,
    /// Uniqueness constraint violated
    Conflict,
    Internal,
}

impl ErrorKind {
    /// Status code table for every error class.
    ///
    /// Domain lookups deliberately answer 400, like the other domain outcomes.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorKind::LookupFailed => StatusCode::BAD_REQUEST,
            ErrorKind::Precondition => StatusCode::BAD_REQUEST,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Loan lifecycle failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoanError {
    #[error("Book does not exist.")]
    BookNotFound(i32),

    #[error("No available copies.")]
    NoAvailableCopies,

    #[error("Member does not exist.")]
    MemberNotFound(i32),

    #[error("Active loan does not exist.")]
    ActiveLoanNotFound,

    #[error("Loan does not exist.")]
    LoanNotFound(i32),

    #[error("Loan has already been returned.")]
    LoanAlreadyReturned,

    #[error("Active loans must be returned before deletion.")]
    LoanStillActive,
}

impl LoanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoanError::BookNotFound(_)
            | LoanError::MemberNotFound(_)
            | LoanError::ActiveLoanNotFound
            | LoanError::LoanNotFound(_) => ErrorKind::LookupFailed,
            LoanError::NoAvailableCopies
            | LoanError::LoanAlreadyReturned
            | LoanError::LoanStillActive => ErrorKind::Precondition,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Loan(#[from] LoanError),

    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation failure on a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(fields)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::ResourceNotFound,
            AppError::Loan(e) => e.kind(),
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs.iter().map(describe).collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::Validation(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::field("body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::field("query", rejection.body_text())
    }
}

/// Message for one failed rule; range failures spell out their bounds
fn describe(error: &validator::ValidationError) -> String {
    if let Some(ref message) = error.message {
        return message.to_string();
    }
    match (&*error.code, error.params.get("min"), error.params.get("max")) {
        ("range", Some(min), Some(max)) => {
            format!("Ensure this value is between {} and {}.", min, max)
        }
        _ => format!("Invalid value ({}).", error.code),
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Per-field messages of a validation failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.kind().status();

        let body = match self {
            AppError::Validation(fields) => ErrorResponse {
                error: "Invalid input.".to_string(),
                fields: Some(fields),
            },
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ErrorResponse {
                    error: "Database error".to_string(),
                    fields: None,
                }
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    fields: None,
                }
            }
            AppError::NotFound(msg) | AppError::Conflict(msg) => {
                ErrorResponse {
                    error: msg,
                    fields: None,
                }
            }
            AppError::Loan(e) => ErrorResponse {
                error: e.to_string(),
                fields: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_outcomes_answer_bad_request() {
        for err in [
            LoanError::BookNotFound(1),
            LoanError::NoAvailableCopies,
            LoanError::MemberNotFound(2),
            LoanError::ActiveLoanNotFound,
            LoanError::LoanNotFound(3),
            LoanError::LoanAlreadyReturned,
        ] {
            assert_eq!(AppError::from(err).kind().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_lookup_and_precondition_stay_distinct() {
        assert_eq!(LoanError::MemberNotFound(1).kind(), ErrorKind::LookupFailed);
        assert_eq!(LoanError::NoAvailableCopies.kind(), ErrorKind::Precondition);
        assert_eq!(
            AppError::NotFound("Book 1 not found".into()).kind().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_loan_error_messages() {
        assert_eq!(LoanError::NoAvailableCopies.to_string(), "No available copies.");
        assert_eq!(LoanError::MemberNotFound(9).to_string(), "Member does not exist.");
        assert_eq!(
            LoanError::ActiveLoanNotFound.to_string(),
            "Active loan does not exist."
        );
    }

    #[test]
    fn test_field_error_shape() {
        match AppError::field("loan_number", "A valid integer is required.") {
            AppError::Validation(fields) => {
                assert_eq!(
                    fields.get("loan_number"),
                    Some(&vec!["A valid integer is required.".to_string()])
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
