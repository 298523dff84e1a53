use std::{future::Future, pin::Pin};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};
use tracing::warn;

use crate::config::AppConfig;
use crate::error::AppError;

pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'c>>;

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

/// Pool that only dials the database on first use.
pub fn connect_lazy(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_lazy(&config.database_url)
        .context("build lazy pool")
}

/// Runs `work` as one unit of work: commit on `Ok`, roll back on `Err`.
///
/// The closure receives the transaction's connection and must return a boxed
/// future that only borrows that connection:
///
/// ```ignore
/// let user = in_transaction(&db, move |conn| Box::pin(async move {
///     users::find_by_email(conn, &email).await
/// })).await?;
/// ```
pub async fn in_transaction<T, F>(db: &PgPool, work: F) -> Result<T, AppError>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T> + Send,
{
    let mut tx = db.begin().await?;
    match work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
