use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};
use tracing::info;

use crate::auth::repo_types::User;
use crate::db::in_transaction;
use crate::error::{AppError, AppResult};
use crate::extract::Pagination;
use crate::state::AppState;
use crate::subscriptions::{
    dto::{CreateSubscriptionRequest, SubscriptionCreated},
    renewal::compute_renewal_date,
    repo,
    repo_types::{Frequency, NewSubscription, SubscriptionResource, SubscriptionStatus},
};

pub const DEFAULT_CURRENCY: &str = "USD";

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
fn parse_start_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

fn validate_create(
    req: CreateSubscriptionRequest,
    user_id: i64,
    now: OffsetDateTime,
) -> AppResult<NewSubscription> {
    let (Some(name), Some(price), Some(frequency), Some(category), Some(payment_method)) = (
        required(req.name),
        req.price,
        required(req.frequency),
        required(req.category),
        required(req.payment_method),
    ) else {
        return Err(AppError::Validation("Missing required fields".into()));
    };

    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::Validation("Price must be a positive number".into()));
    }

    let frequency: Frequency = frequency.parse().map_err(|_| {
        AppError::Validation(
            "Invalid frequency. Expected one of DAILY, WEEKLY, MONTHLY, QUARTERLY, YEARLY".into(),
        )
    })?;

    let status = match required(req.status) {
        Some(s) => s.parse::<SubscriptionStatus>().map_err(|_| {
            AppError::Validation("Invalid status. Expected one of ACTIVE, CANCELLED, EXPIRED".into())
        })?,
        None => SubscriptionStatus::default(),
    };

    let currency = match required(req.currency) {
        Some(c) if c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()) => {
            c.to_ascii_uppercase()
        }
        Some(_) => {
            return Err(AppError::Validation(
                "Currency must be a three-letter code".into(),
            ))
        }
        None => DEFAULT_CURRENCY.to_string(),
    };

    let start_date = match required(req.start_date) {
        Some(raw) => parse_start_date(&raw)
            .ok_or_else(|| AppError::Validation("Invalid start date".into()))?,
        None => now,
    };
    if start_date > now {
        return Err(AppError::Validation("Start date cannot be in the future".into()));
    }

    let renewal_date = compute_renewal_date(start_date, frequency)
        .ok_or_else(|| AppError::Validation("Start date is out of range".into()))?;

    Ok(NewSubscription {
        user_id,
        name,
        price,
        currency,
        frequency,
        category,
        payment_method,
        status,
        start_date,
        renewal_date,
    })
}

pub async fn create(
    state: &AppState,
    user: &User,
    req: CreateSubscriptionRequest,
) -> AppResult<SubscriptionCreated> {
    let new = validate_create(req, user.id, OffsetDateTime::now_utc())?;

    let subscription = in_transaction(&state.db, move |conn| {
        Box::pin(async move { Ok(repo::insert(conn, &new).await?) })
    })
    .await?;

    info!(
        user_id = user.id,
        subscription_id = subscription.id,
        frequency = ?subscription.frequency,
        "subscription created"
    );
    Ok(SubscriptionCreated {
        message: "Subscription created successfully".into(),
        subscription: subscription.into(),
    })
}

pub async fn list(
    state: &AppState,
    user: &User,
    page: Pagination,
) -> AppResult<Vec<SubscriptionResource>> {
    let (limit, offset) = page.bounds();
    let mut conn = state.db.acquire().await?;
    let rows = repo::list_by_user(&mut *conn, user.id, limit, offset).await?;
    Ok(rows.into_iter().map(SubscriptionResource::from).collect())
}

pub async fn get(state: &AppState, user: &User, id: i64) -> AppResult<SubscriptionResource> {
    let mut conn = state.db.acquire().await?;
    repo::find_for_user(&mut *conn, user.id, id)
        .await?
        .map(SubscriptionResource::from)
        .ok_or_else(|| AppError::NotFound("Subscription not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-20 12:00 UTC);

    fn request() -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            name: Some("Spotify".into()),
            price: Some(9.99),
            currency: None,
            frequency: Some("MONTHLY".into()),
            category: Some("music".into()),
            payment_method: Some("card".into()),
            start_date: Some("2024-01-31T09:00:00Z".into()),
            status: None,
        }
    }

    #[test]
    fn fills_defaults_and_derives_renewal() {
        let new = validate_create(request(), 3, NOW).unwrap();
        assert_eq!(new.user_id, 3);
        assert_eq!(new.currency, "USD");
        assert_eq!(new.status, SubscriptionStatus::Active);
        assert_eq!(new.frequency, Frequency::Monthly);
        assert_eq!(new.renewal_date, datetime!(2024-02-29 09:00 UTC));
    }

    #[test]
    fn start_date_defaults_to_now() {
        let mut req = request();
        req.start_date = None;
        req.frequency = Some("daily".into());
        let new = validate_create(req, 1, NOW).unwrap();
        assert_eq!(new.start_date, NOW);
        assert_eq!(new.renewal_date, datetime!(2024-05-21 12:00 UTC));
    }

    #[test]
    fn accepts_bare_dates() {
        let mut req = request();
        req.start_date = Some("2024-05-01".into());
        let new = validate_create(req, 1, NOW).unwrap();
        assert_eq!(new.start_date, datetime!(2024-05-01 00:00 UTC));
    }

    #[test]
    fn rejects_future_start() {
        let mut req = request();
        req.start_date = Some("2024-05-21T00:00:00Z".into());
        let err = validate_create(req, 1, NOW).unwrap_err();
        assert_eq!(err.to_string(), "Start date cannot be in the future");
    }

    #[test]
    fn requires_core_fields() {
        let mut req = request();
        req.payment_method = Some("  ".into());
        let err = validate_create(req, 1, NOW).unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");

        let mut req = request();
        req.price = None;
        assert!(matches!(validate_create(req, 1, NOW), Err(AppError::Validation(_))));
    }

    #[test]
    fn rejects_bad_values() {
        let mut req = request();
        req.price = Some(0.0);
        assert!(validate_create(req, 1, NOW).is_err());

        let mut req = request();
        req.price = Some(f64::NAN);
        assert!(validate_create(req, 1, NOW).is_err());

        let mut req = request();
        req.frequency = Some("BIWEEKLY".into());
        assert!(validate_create(req, 1, NOW).unwrap_err().to_string().contains("frequency"));

        let mut req = request();
        req.currency = Some("EURO".into());
        assert!(validate_create(req, 1, NOW).is_err());

        let mut req = request();
        req.status = Some("PAUSED".into());
        assert!(validate_create(req, 1, NOW).is_err());

        let mut req = request();
        req.start_date = Some("last tuesday".into());
        assert!(validate_create(req, 1, NOW).is_err());
    }

    #[test]
    fn currency_is_uppercased() {
        let mut req = request();
        req.currency = Some("eur".into());
        assert_eq!(validate_create(req, 1, NOW).unwrap().currency, "EUR");
    }
}
