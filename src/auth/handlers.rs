use axum::{extract::State, routing::post, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, ResendOtpRequest, ResendOtpResponse,
            SigninRequest, SignupRequest, SignupResponse, VerifyOtpRequest,
        },
        jwt::{AuthUser, BearerClaims},
        services,
    },
    error::AppResult,
    extract::ApiJson,
    response::{ApiResponse, Message},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/signout", post(signout))
        .route("/auth/change-password", post(change_password))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> AppResult<ApiResponse<SignupResponse>> {
    let res = services::signup(&state, payload).await?;
    Ok(ApiResponse::created(res))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SigninRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    Ok(ApiResponse::ok(services::signin(&state, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifyOtpRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    Ok(ApiResponse::ok(services::verify_otp(&state, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn resend_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResendOtpRequest>,
) -> AppResult<ApiResponse<ResendOtpResponse>> {
    Ok(ApiResponse::ok(services::resend_otp(&state, payload).await?))
}

/// Stateless: a well-formed, unexpired token is all that is checked.
#[instrument(skip_all, fields(user_id = claims.id))]
pub async fn signout(BearerClaims(claims): BearerClaims) -> ApiResponse<Message> {
    tracing::info!("user signed out");
    ApiResponse::ok(Message::new("User signed out successfully"))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> AppResult<ApiResponse<Message>> {
    services::change_password(&state, &user, payload).await?;
    Ok(ApiResponse::ok(Message::new("Password changed successfully")))
}
