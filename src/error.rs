use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Failures returned to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid credentials")]
    BadCredential,
    #[error("account suspended")]
    Suspended,
    #[error("access denied")]
    Forbidden,
    #[error("project limit of {0} reached")]
    QuotaExceeded(usize),
    #[error("not authenticated")]
    Unauthenticated,
    #[error("{0}")]
    Validation(String),
    #[error("too many requests")]
    RateLimited,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadCredential => "BAD_CREDENTIAL",
            Self::Suspended => "SUSPENDED",
            Self::Forbidden => "FORBIDDEN",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Validation(_) => "VALIDATION",
            Self::RateLimited => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadCredential | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Suspended | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::QuotaExceeded(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Client errors are already visible in the request trace.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
