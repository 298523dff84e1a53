use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id, uuid, email, name, password_hash, email_verified, otp_code, \
     otp_code_expiry, otp_attempts, last_otp_attempt, created_at, updated_at";

/// Find a user by email.
pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(conn)
        .await
}

/// Same as [`find_by_email`] but locks the row until the transaction ends.
pub async fn find_by_email_for_update(
    conn: &mut PgConnection,
    email: &str,
) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1 FOR UPDATE"
    ))
    .bind(email)
    .fetch_optional(conn)
    .await
}

pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Locks the row by id until the transaction ends.
pub async fn find_by_id_for_update(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_uuid(conn: &mut PgConnection, uuid: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = $1"))
        .bind(uuid)
        .fetch_optional(conn)
        .await
}

pub async fn list(conn: &mut PgConnection, limit: i64, offset: i64) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await
}

/// Insert an unverified user holding a freshly issued code.
pub async fn create(conn: &mut PgConnection, new: &NewUser) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (uuid, email, name, password_hash, email_verified,
                           otp_code, otp_code_expiry, otp_attempts, last_otp_attempt)
        VALUES ($1, $2, $3, $4, FALSE, $5, $6, 0, $7)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(new.uuid)
    .bind(&new.email)
    .bind(&new.name)
    .bind(&new.password_hash)
    .bind(&new.otp_code)
    .bind(new.otp_code_expiry)
    .bind(new.sent_at)
    .fetch_one(conn)
    .await
}

/// Replace the pending code and restart the attempt counter.
pub async fn store_new_code(
    conn: &mut PgConnection,
    id: i64,
    code: &str,
    expiry: OffsetDateTime,
    sent_at: OffsetDateTime,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
           SET otp_code = $2, otp_code_expiry = $3, otp_attempts = 0,
               last_otp_attempt = $4, updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(code)
    .bind(expiry)
    .bind(sent_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns the attempt count after the increment.
pub async fn record_failed_attempt(conn: &mut PgConnection, id: i64) -> sqlx::Result<i32> {
    let (attempts,) = sqlx::query_as::<_, (i32,)>(
        r#"
        UPDATE users
           SET otp_attempts = otp_attempts + 1, updated_at = now()
         WHERE id = $1
        RETURNING otp_attempts
        "#,
    )
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(attempts)
}

pub async fn mark_verified(conn: &mut PgConnection, id: i64) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
           SET email_verified = TRUE, otp_code = NULL, otp_code_expiry = NULL,
               otp_attempts = 0, updated_at = now()
         WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_one(conn)
    .await
}

pub async fn update_password(conn: &mut PgConnection, id: i64, password_hash: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn update_name(conn: &mut PgConnection, id: i64, name: &str) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .fetch_one(conn)
    .await
}

/// Returns whether a row was removed. Subscriptions cascade.
pub async fn delete(conn: &mut PgConnection, id: i64) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected() > 0)
}
