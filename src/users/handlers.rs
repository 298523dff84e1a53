use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{SignupRequest, SignupResponse},
        jwt::AuthUser,
        repo_types::PublicUser,
        services as auth_services,
    },
    error::AppResult,
    extract::{ApiJson, ApiPath, ApiQuery, Pagination},
    response::{ApiResponse, Message},
    state::AppState,
    users::{dto::UpdateUserRequest, services},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/create", post(create_user))
        .route(
            "/users/:uuid",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, _caller))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<ApiResponse<Vec<PublicUser>>> {
    Ok(ApiResponse::ok(services::list(&state, page).await?))
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiPath(uuid): ApiPath<Uuid>,
) -> AppResult<ApiResponse<PublicUser>> {
    Ok(ApiResponse::ok(services::get(&state, uuid).await?))
}

/// Same flow as public signup: the new account starts unverified.
#[instrument(skip_all, fields(caller_id = caller.id))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> AppResult<ApiResponse<SignupResponse>> {
    let res = auth_services::signup(&state, payload).await?;
    Ok(ApiResponse::created(res))
}

#[instrument(skip(state, caller, payload), fields(caller_id = caller.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(uuid): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> AppResult<ApiResponse<PublicUser>> {
    Ok(ApiResponse::ok(
        services::update(&state, &caller, uuid, payload).await?,
    ))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(uuid): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Message>> {
    services::delete(&state, &caller, uuid).await?;
    Ok(ApiResponse::ok(Message::new("User deleted successfully")))
}
