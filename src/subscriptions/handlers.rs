use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::AppResult,
    extract::{ApiJson, ApiPath, ApiQuery, Pagination},
    response::ApiResponse,
    state::AppState,
    subscriptions::{
        dto::{CreateSubscriptionRequest, SubscriptionCreated},
        repo_types::SubscriptionResource,
        services,
    },
};

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list_subscriptions))
        .route("/subscriptions/create", post(create_subscription))
        .route("/subscriptions/:id", get(get_subscription))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn create_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<CreateSubscriptionRequest>,
) -> AppResult<ApiResponse<SubscriptionCreated>> {
    let created = services::create(&state, &user, payload).await?;
    Ok(ApiResponse::created(created))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<ApiResponse<Vec<SubscriptionResource>>> {
    Ok(ApiResponse::ok(services::list(&state, &user, page).await?))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<ApiResponse<SubscriptionResource>> {
    Ok(ApiResponse::ok(services::get(&state, &user, id).await?))
}
