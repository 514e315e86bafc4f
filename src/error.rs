//! Error handler for sessionkeep.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::token::Scope;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors returned by authentication and authorization operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("account already exists")]
    Conflict,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email not confirmed")]
    EmailNotConfirmed,
    #[error("could not validate credentials")]
    Unauthorized,
    #[error("you are not allowed to access this resource")]
    Forbidden,
    #[error("verification error")]
    InvalidState,

    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("internal server error")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

/// Reasons a token is refused.
///
/// Never shown to callers: [`AuthService`](crate::AuthService) folds every
/// variant into [`AuthError::Unauthorized`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token scope is {found:?} while {expected:?} is expected")]
    ScopeMismatch { expected: Scope, found: Scope },
    #[error("token is malformed")]
    Malformed,
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Conflict,
    InvalidCredentials,
    EmailNotConfirmed,
    Unauthorized,
    Forbidden,
    InvalidState,
    Validation,
    Internal,
}

impl AuthError {
    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(err))
    }

    /// Category of the error, stable across message changes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Conflict => ErrorKind::Conflict,
            AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthError::EmailNotConfirmed => ErrorKind::EmailNotConfirmed,
            AuthError::Unauthorized => ErrorKind::Unauthorized,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::InvalidState => ErrorKind::InvalidState,
            AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::Configuration(_) | AuthError::Internal(_) => {
                ErrorKind::Internal
            },
        }
    }

    /// HTTP status the routing layer should answer with.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidCredentials
            | ErrorKind::EmailNotConfirmed
            | ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvalidState | ErrorKind::Validation => {
                StatusCode::BAD_REQUEST
            },
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub trait ToInternal<T> {
    fn catch(self) -> Result<T>;
}

impl<T, E> ToInternal<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn catch(self) -> Result<T> {
        self.map_err(AuthError::internal)
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    kind: ErrorKind,
    title: String,
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update `kind` and status code from an [`AuthError`].
    pub fn from_error(err: &AuthError) -> Self {
        Self {
            kind: err.kind(),
            status: err.status().as_u16(),
            ..Default::default()
        }
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            kind: ErrorKind::Internal,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let response = ResponseError::from_error(&self);

        let response = match &self {
            AuthError::Validation(validation_errors) => response
                .title("There were validation errors with your request.")
                .details(&self.to_string())
                .errors(validation_errors),

            AuthError::Internal(source) => {
                tracing::error!(err = %source, "server returned 500 status");
                response
            },

            AuthError::Configuration(details) => {
                tracing::error!(%details, "server returned 500 status");
                response
            },

            _ => response.title(&self.to_string()).details(&self.to_string()),
        };

        let mut response = (status, axum::Json(response)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use validator::ValidationError;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_response() {
        let response = AuthError::Unauthorized.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let body = body(response).await;
        assert_eq!(body["kind"], "unauthorized");
        assert_eq!(body["status"], 401);
    }

    #[tokio::test]
    async fn test_internal_does_not_leak() {
        let err = AuthError::internal(std::io::Error::other("db password"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body(response).await;
        assert_eq!(body["kind"], "internal");
        assert!(!body.to_string().contains("db password"));
    }

    #[tokio::test]
    async fn test_validation_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.add(
            "password",
            ValidationError::new("length")
                .with_message("Password must be 8 to 16 characters.".into()),
        );
        let response = AuthError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body(response).await;
        assert_eq!(body["kind"], "validation");
        assert_eq!(body["errors"][0]["field"], "password");
    }

    #[test]
    fn test_scope_mismatch_message() {
        let err = TokenError::ScopeMismatch {
            expected: Scope::Access,
            found: Scope::Refresh,
        };
        assert_eq!(
            err.to_string(),
            "token scope is Refresh while Access is expected"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::InvalidState.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::EmailNotConfirmed.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid email or password"
        );
    }
}
