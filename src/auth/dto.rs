use serde::{Deserialize, Serialize};

use super::otp::RemainingTime;
use super::repo_types::PublicUser;

// Request fields are optional so a missing field becomes a ValidationError
// in the envelope instead of an extractor rejection.

#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirmation_password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResendOtpRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirmation_password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: String,
    pub user: PublicUser,
    pub requires_verification: bool,
    pub otp_sent: bool,
    pub otp_expires_in: RemainingTime,
}

/// Returned by sign-in and a successful OTP verification.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpResponse {
    pub message: String,
    pub email: String,
    pub otp_expires_in: RemainingTime,
}
