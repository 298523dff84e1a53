use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::error;

use crate::auth::jwt::TokenError;
use crate::auth::password::PasswordError;
use crate::mailer::MailError;
use crate::screening::ScreenDecision;

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Error category reported to clients as `error.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    ConflictError,
    NotFoundError,
    AuthError,
    RateLimitError,
    DependencyError,
    InternalError,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Email not verified. Please verify your email to sign in.")]
    VerificationRequired { email: String },

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("No verification code found. Please request a new one.")]
    NoActiveCode,

    #[error("Verification code has expired. Please request a new one.")]
    CodeExpired,

    #[error("Invalid verification code")]
    InvalidCode { remaining_attempts: i32 },

    #[error("Too many failed attempts. Please request a new verification code.")]
    TooManyAttempts,

    #[error("Please wait before requesting a new code")]
    ResendCooldown { seconds_remaining: i64 },

    #[error("{}", .0.message())]
    Screened(ScreenDecision),

    #[error("Failed to send verification email")]
    Mail(#[from] MailError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Constraint behind the `UNIQUE` on `users.email` (see migrations).
pub const USERS_EMAIL_KEY: &str = "users_email_key";

fn unique_conflict(constraint: Option<&str>) -> Option<AppError> {
    match constraint {
        Some(USERS_EMAIL_KEY) => Some(AppError::Conflict("User with this email already exists".into())),
        _ => None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let conflict = match &err {
            sqlx::Error::RowNotFound => return AppError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => unique_conflict(db.constraint()),
            _ => None,
        };
        conflict.unwrap_or(AppError::Database(err))
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_)
            | AppError::AlreadyVerified
            | AppError::NoActiveCode
            | AppError::CodeExpired
            | AppError::InvalidCode { .. } => ErrorKind::ValidationError,
            AppError::Token(TokenError::Signing(_)) => ErrorKind::InternalError,
            AppError::Conflict(_) => ErrorKind::ConflictError,
            AppError::NotFound(_) => ErrorKind::NotFoundError,
            AppError::Unauthorized(_)
            | AppError::Forbidden(_)
            | AppError::VerificationRequired { .. }
            | AppError::Token(_) => ErrorKind::AuthError,
            AppError::TooManyAttempts
            | AppError::ResendCooldown { .. }
            | AppError::Screened(_) => ErrorKind::RateLimitError,
            AppError::Mail(_) => ErrorKind::DependencyError,
            AppError::Password(_) | AppError::Database(_) | AppError::Internal(_) => {
                ErrorKind::InternalError
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Forbidden(_) | AppError::VerificationRequired { .. } => StatusCode::FORBIDDEN,
            AppError::Screened(ScreenDecision::Bot | ScreenDecision::Denied) => {
                StatusCode::FORBIDDEN
            }
            _ => match self.kind() {
                ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
                ErrorKind::ConflictError => StatusCode::CONFLICT,
                ErrorKind::NotFoundError => StatusCode::NOT_FOUND,
                ErrorKind::AuthError => StatusCode::UNAUTHORIZED,
                ErrorKind::RateLimitError => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::DependencyError => StatusCode::BAD_GATEWAY,
                ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine-readable fields a client can drive retry UI from.
    fn hints(&self) -> Map<String, Value> {
        let mut hints = Map::new();
        match self {
            AppError::VerificationRequired { email } => {
                hints.insert("requiresVerification".into(), json!(true));
                hints.insert("email".into(), json!(email));
            }
            AppError::InvalidCode { remaining_attempts } => {
                hints.insert("remainingAttempts".into(), json!(remaining_attempts));
            }
            AppError::CodeExpired => {
                hints.insert("expired".into(), json!(true));
            }
            AppError::TooManyAttempts => {
                hints.insert("locked".into(), json!(true));
            }
            AppError::ResendCooldown { seconds_remaining } => {
                hints.insert("secondsRemaining".into(), json!(seconds_remaining));
            }
            _ => {}
        }
        hints
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Password(_)
            | AppError::Database(_)
            | AppError::Internal(_)
            | AppError::Token(TokenError::Signing(_)) => "Internal server error".into(),
            AppError::ResendCooldown { seconds_remaining } => format!(
                "Please wait {seconds_remaining} seconds before requesting a new code"
            ),
            AppError::InvalidCode { remaining_attempts } => format!(
                "Invalid verification code. {remaining_attempts} attempts remaining."
            ),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, kind = ?self.kind(), "request failed");
        }

        let mut body = Map::new();
        body.insert("kind".into(), json!(self.kind()));
        body.insert("message".into(), json!(self.public_message()));
        body.extend(self.hints());

        (
            status,
            Json(json!({
                "success": false,
                "error": Value::Object(body),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_envelope() {
        let (status, body) = body_json(AppError::Validation("All fields are required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "ValidationError");
        assert_eq!(body["error"]["message"], "All fields are required");
    }

    #[tokio::test]
    async fn invalid_code_reports_remaining_attempts() {
        let (status, body) = body_json(AppError::InvalidCode { remaining_attempts: 3 }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["remainingAttempts"], 3);
    }

    #[tokio::test]
    async fn lockout_and_cooldown_are_rate_limits() {
        let (status, body) = body_json(AppError::TooManyAttempts).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["locked"], true);

        let (status, body) = body_json(AppError::ResendCooldown { seconds_remaining: 42 }).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["kind"], "RateLimitError");
        assert_eq!(body["error"]["secondsRemaining"], 42);
    }

    #[tokio::test]
    async fn verification_required_carries_email() {
        let (status, body) =
            body_json(AppError::VerificationRequired { email: "a@b.com".into() }).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["kind"], "AuthError");
        assert_eq!(body["error"]["requiresVerification"], true);
        assert_eq!(body["error"]["email"], "a@b.com");
    }

    #[tokio::test]
    async fn expired_code_hint() {
        let (_, body) = body_json(AppError::CodeExpired).await;
        assert_eq!(body["error"]["expired"], true);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_json(AppError::Internal(anyhow::anyhow!("pool exploded"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[tokio::test]
    async fn mail_failure_is_dependency_error() {
        let (status, body) = body_json(AppError::Mail(MailError::Timeout)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["kind"], "DependencyError");
    }

    #[tokio::test]
    async fn screened_requests() {
        let (status, body) = body_json(AppError::Screened(ScreenDecision::RateLimited)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["message"], "Rate limit exceeded. Please try again later.");

        let (status, body) = body_json(AppError::Screened(ScreenDecision::Bot)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["kind"], "RateLimitError");
    }

    #[test]
    fn only_the_email_constraint_is_a_conflict() {
        assert!(matches!(unique_conflict(Some(USERS_EMAIL_KEY)), Some(AppError::Conflict(_))));
        assert!(unique_conflict(Some("users_uuid_key")).is_none());
        assert!(unique_conflict(None).is_none());
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), ErrorKind::NotFoundError);
    }
}
