//! Route management errors and their wire codes

use thiserror::Error;
use uuid::Uuid;

use crate::services::validation::ValidationIssue;
use crate::types::ErrorResponse;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Validation failed with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("Route {0} not found")]
    RouteNotFound(Uuid),

    #[error("Drop {0} not found")]
    DropNotFound(Uuid),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RouteError {
    fn from(err: sqlx::Error) -> Self {
        RouteError::Database(err.into())
    }
}

impl RouteError {
    pub fn code(&self) -> &'static str {
        match self {
            RouteError::Validation(_) => "VALIDATION_FAILED",
            RouteError::RouteNotFound(_) | RouteError::DropNotFound(_) => "NOT_FOUND",
            RouteError::InvalidRequest(_) => "INVALID_REQUEST",
            RouteError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn to_response(&self, request_id: Uuid) -> ErrorResponse {
        let response = ErrorResponse::new(request_id, self.code(), self.to_string());
        match self {
            RouteError::Validation(issues) => {
                response.with_details(serde_json::json!({ "issues": issues }))
            }
            _ => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::validation::check_drop_count;

    #[test]
    fn test_error_codes() {
        assert_eq!(RouteError::RouteNotFound(Uuid::nil()).code(), "NOT_FOUND");
        assert_eq!(RouteError::DropNotFound(Uuid::nil()).code(), "NOT_FOUND");
        assert_eq!(RouteError::InvalidRequest("x".into()).code(), "INVALID_REQUEST");
        assert_eq!(
            RouteError::Database(anyhow::anyhow!("connection reset")).code(),
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn test_validation_response_carries_issues() {
        let err = RouteError::Validation(vec![check_drop_count(1).unwrap()]);
        let response = err.to_response(Uuid::nil());

        assert_eq!(response.error.code, "VALIDATION_FAILED");
        assert_eq!(response.error.message, "Validation failed with 1 issue(s)");
        let details = response.error.details.unwrap();
        assert_eq!(details["issues"][0]["code"], "TOO_FEW_DROPS");
    }

    #[test]
    fn test_not_found_message_names_route() {
        let id = Uuid::new_v4();
        let response = RouteError::RouteNotFound(id).to_response(Uuid::nil());
        assert_eq!(response.error.message, format!("Route {} not found", id));
        assert!(response.error.details.is_none());
    }
}
