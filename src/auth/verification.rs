//! Decision rules for the email verification flow.
//!
//! A user is either verified or holds `(attempts, code, expiry, last_sent)`.
//! Lockout is never stored: it is `attempts >= max_attempts`. The functions here
//! only decide; persisting the outcome is up to the caller's transaction.

use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use super::otp::{self, OtpPolicy};
use super::repo_types::User;
use crate::error::AppError;

/// What to do with a submitted code once the user row is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Match,
    Mismatch,
}

/// Trims and validates a verify request: missing fields first, then format.
pub fn validate_verify_input(
    email: Option<&str>,
    code: Option<&str>,
) -> Result<(String, String), AppError> {
    let email = email.map(normalize_email).filter(|e| !e.is_empty());
    let code = code.map(str::trim).filter(|c| !c.is_empty());
    let (Some(email), Some(code)) = (email, code) else {
        return Err(AppError::Validation("Email and OTP are required".into()));
    };
    if !otp::is_valid_format(code) {
        return Err(AppError::Validation("OTP must be a 6-digit number".into()));
    }
    Ok((email, code.to_string()))
}

/// Checks run after the user is found, in order: already verified, attempts
/// exhausted, no code, expired, then comparison. A locked user never has the
/// submitted code looked at.
pub fn check_code(
    user: &User,
    submitted: &str,
    now: OffsetDateTime,
    policy: &OtpPolicy,
) -> Result<CodeCheck, AppError> {
    if user.email_verified {
        return Err(AppError::AlreadyVerified);
    }
    if policy.is_locked(user.otp_attempts) {
        return Err(AppError::TooManyAttempts);
    }
    let Some(stored) = user.otp_code.as_deref() else {
        return Err(AppError::NoActiveCode);
    };
    if otp::is_expired(user.otp_code_expiry, now) {
        return Err(AppError::CodeExpired);
    }
    if bool::from(stored.as_bytes().ct_eq(submitted.as_bytes())) {
        Ok(CodeCheck::Match)
    } else {
        Ok(CodeCheck::Mismatch)
    }
}

/// Resend is refused for verified users and inside the cooldown window.
pub fn check_resend(user: &User, now: OffsetDateTime, policy: &OtpPolicy) -> Result<(), AppError> {
    if user.email_verified {
        return Err(AppError::AlreadyVerified);
    }
    if !policy.can_resend(user.last_otp_attempt, now) {
        return Err(AppError::ResendCooldown {
            seconds_remaining: policy.seconds_until_resend(user.last_otp_attempt, now),
        });
    }
    Ok(())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
