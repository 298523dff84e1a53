use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    repo,
    repo_types::{PublicUser, User},
};
use crate::db::in_transaction;
use crate::error::{AppError, AppResult};
use crate::extract::Pagination;
use crate::state::AppState;
use crate::users::dto::UpdateUserRequest;

pub const MAX_NAME_LEN: usize = 100;

/// Callers may only change their own record.
fn ensure_self(caller: &User, target: Uuid, action: &str) -> AppResult<()> {
    if caller.uuid != target {
        warn!(user_id = caller.id, %target, action, "attempt to modify another user");
        return Err(AppError::Forbidden(format!(
            "You are not allowed to {action} this user"
        )));
    }
    Ok(())
}

fn validate_name(req: UpdateUserRequest) -> AppResult<String> {
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("Name is required".into()))?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

pub async fn list(state: &AppState, page: Pagination) -> AppResult<Vec<PublicUser>> {
    let (limit, offset) = page.bounds();
    let mut conn = state.db.acquire().await?;
    let users = repo::list(&mut *conn, limit, offset).await?;
    Ok(users.into_iter().map(PublicUser::from).collect())
}

pub async fn get(state: &AppState, uuid: Uuid) -> AppResult<PublicUser> {
    let mut conn = state.db.acquire().await?;
    repo::find_by_uuid(&mut *conn, uuid)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn update(
    state: &AppState,
    caller: &User,
    target: Uuid,
    req: UpdateUserRequest,
) -> AppResult<PublicUser> {
    ensure_self(caller, target, "update")?;
    let name = validate_name(req)?;

    let user_id = caller.id;
    let user = in_transaction(&state.db, move |conn| {
        Box::pin(async move { Ok(repo::update_name(conn, user_id, &name).await?) })
    })
    .await?;

    info!(user_id, "user updated");
    Ok(PublicUser::from(user))
}

pub async fn delete(state: &AppState, caller: &User, target: Uuid) -> AppResult<()> {
    ensure_self(caller, target, "delete")?;

    let user_id = caller.id;
    let removed = in_transaction(&state.db, move |conn| {
        Box::pin(async move { Ok(repo::delete(conn, user_id).await?) })
    })
    .await?;
    if !removed {
        return Err(AppError::NotFound("User not found".into()));
    }

    info!(user_id, "user deleted");
    Ok(())
}
