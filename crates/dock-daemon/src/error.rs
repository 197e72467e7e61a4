//! HTTP error mapping.
//!
//! Every failure leaves the daemon as `{"error": <kind>, "detail": <message>}`
//! with the status fixed by its kind. Internal failures are logged in full and
//! reported with a generic detail.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dock_db::DomainError;
use dock_import::ImportError;

use crate::api_types::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        ApiError::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Domain(DomainError::Forbidden(msg.into()))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Domain(DomainError::validation(msg))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Domain(e) => match e {
                DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                DomainError::InvalidState(_) => StatusCode::CONFLICT,
                DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
                DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
                DomainError::Db(_) | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Domain(e) => e.kind(),
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Domain(DomainError::Db(e))
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        ApiError::Domain(e.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::validation(r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::validation(r.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::validation(r.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::validation(format!("invalid multipart upload: {}", e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (
            status,
            Json(ErrorBody {
                error: self.kind().to_string(),
                detail,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_kinds_map_to_statuses() {
        let cases = [
            (DomainError::NotFound("Vessel"), StatusCode::NOT_FOUND),
            (DomainError::invalid_state("x"), StatusCode::CONFLICT),
            (DomainError::validation("x"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::PaymentRequired("x".into()), StatusCode::PAYMENT_REQUIRED),
            (DomainError::Forbidden("x".into()), StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::unauthenticated("no token").status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn not_found_detail_names_the_resource() {
        let e = ApiError::from(DomainError::NotFound("Check"));
        assert_eq!(e.kind(), "not_found");
        assert_eq!(e.to_string(), "Check not found");
    }
}
