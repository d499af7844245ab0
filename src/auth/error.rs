use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::users::StoreError;

pub(crate) const INVALID_CREDENTIALS: &str = "Invalid email or password.";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    /// Signin failure. Carries no cause on purpose: an unknown email and a
    /// wrong password must look the same to the caller.
    #[error("{}", INVALID_CREDENTIALS)]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("identity provider error: {0}")]
    Identity(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => AuthError::Conflict("Email is already registered.".into()),
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Identity(_) => StatusCode::BAD_GATEWAY,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            AuthError::Identity(e) => {
                error!(error = %e, "federated identity rejected");
                self.to_string()
            }
            _ => self.to_string(),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_maps_to_its_status() {
        let cases = [
            (AuthError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AuthError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AuthError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AuthError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AuthError::NotFound("who".into()), StatusCode::NOT_FOUND),
            (AuthError::Identity("email".into()), StatusCode::BAD_GATEWAY),
            (
                AuthError::Internal(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn store_conflict_becomes_conflict() {
        let err = AuthError::from(StoreError::Conflict("a@b.com".into()));
        assert!(matches!(err, AuthError::Conflict(_)));
        let err = AuthError::from(StoreError::Backend(anyhow::anyhow!("boom")));
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
