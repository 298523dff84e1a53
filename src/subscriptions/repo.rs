use sqlx::PgConnection;

use crate::subscriptions::repo_types::{NewSubscription, Subscription};

const SUBSCRIPTION_COLUMNS: &str = "s.id, s.user_id, u.uuid AS user_uuid, s.name, s.price, \
     s.currency, s.frequency, s.category, s.payment_method, s.status, s.start_date, \
     s.renewal_date, s.created_at";

pub async fn insert(conn: &mut PgConnection, new: &NewSubscription) -> sqlx::Result<Subscription> {
    sqlx::query_as::<_, Subscription>(&format!(
        r#"
        WITH s AS (
            INSERT INTO subscriptions
                (user_id, name, price, currency, frequency, category, payment_method,
                 status, start_date, renewal_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
        )
        SELECT {SUBSCRIPTION_COLUMNS}
        FROM s JOIN users u ON u.id = s.user_id
        "#
    ))
    .bind(new.user_id)
    .bind(&new.name)
    .bind(new.price)
    .bind(&new.currency)
    .bind(new.frequency)
    .bind(&new.category)
    .bind(&new.payment_method)
    .bind(new.status)
    .bind(new.start_date)
    .bind(new.renewal_date)
    .fetch_one(conn)
    .await
}

pub async fn list_by_user(
    conn: &mut PgConnection,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Subscription>> {
    sqlx::query_as::<_, Subscription>(&format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS}
        FROM subscriptions s JOIN users u ON u.id = s.user_id
        WHERE s.user_id = $1
        ORDER BY s.created_at DESC, s.id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await
}

/// Only returns the subscription when `user_id` owns it.
pub async fn find_for_user(
    conn: &mut PgConnection,
    user_id: i64,
    id: i64,
) -> sqlx::Result<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(&format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS}
        FROM subscriptions s JOIN users u ON u.id = s.user_id
        WHERE s.id = $1 AND s.user_id = $2
        "#
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}
