use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "subscription_frequency", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl FromStr for Frequency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "QUARTERLY" => Ok(Frequency::Quarterly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "subscription_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Cancelled,
    Expired,
}

impl FromStr for SubscriptionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "CANCELLED" => Ok(SubscriptionStatus::Cancelled),
            "EXPIRED" => Ok(SubscriptionStatus::Expired),
            _ => Err(()),
        }
    }
}

/// A subscription row joined with its owner's public uuid.
#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub user_uuid: Uuid,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub frequency: Frequency,
    pub category: String,
    pub payment_method: String,
    pub status: SubscriptionStatus,
    pub start_date: OffsetDateTime,
    pub renewal_date: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: i64,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub frequency: Frequency,
    pub category: String,
    pub payment_method: String,
    pub status: SubscriptionStatus,
    pub start_date: OffsetDateTime,
    pub renewal_date: OffsetDateTime,
}

/// Client-facing shape of a subscription.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResource {
    pub id: i64,
    pub user_id: Uuid,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub frequency: Frequency,
    pub category: String,
    pub payment_method: String,
    pub status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub renewal_date: OffsetDateTime,
}

impl From<Subscription> for SubscriptionResource {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            user_id: s.user_uuid,
            name: s.name,
            price: s.price,
            currency: s.currency,
            frequency: s.frequency,
            category: s.category,
            payment_method: s.payment_method,
            status: s.status,
            start_date: s.start_date,
            renewal_date: s.renewal_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_enums_case_insensitively() {
        assert_eq!("monthly".parse::<Frequency>(), Ok(Frequency::Monthly));
        assert_eq!(" YEARLY ".parse::<Frequency>(), Ok(Frequency::Yearly));
        assert!("fortnightly".parse::<Frequency>().is_err());
        assert_eq!("cancelled".parse::<SubscriptionStatus>(), Ok(SubscriptionStatus::Cancelled));
        assert_eq!(SubscriptionStatus::default(), SubscriptionStatus::Active);
    }

    #[test]
    fn resource_shape() {
        let owner = Uuid::new_v4();
        let res = SubscriptionResource::from(Subscription {
            id: 7,
            user_id: 1,
            user_uuid: owner,
            name: "Netflix".into(),
            price: 15.99,
            currency: "USD".into(),
            frequency: Frequency::Monthly,
            category: "entertainment".into(),
            payment_method: "card".into(),
            status: SubscriptionStatus::Active,
            start_date: datetime!(2024-01-31 12:00 UTC),
            renewal_date: datetime!(2024-02-29 12:00 UTC),
            created_at: datetime!(2024-01-31 12:00 UTC),
        });
        let v = serde_json::to_value(res).unwrap();
        assert_eq!(v["id"], 7);
        assert_eq!(v["userId"], owner.to_string());
        assert_eq!(v["frequency"], "MONTHLY");
        assert_eq!(v["status"], "ACTIVE");
        assert_eq!(v["paymentMethod"], "card");
        assert_eq!(v["renewalDate"], "2024-02-29T12:00:00Z");
        assert!(v.get("createdAt").is_none());
    }
}
