use serde::{Deserialize, Serialize};

use crate::subscriptions::repo_types::SubscriptionResource;

/// Body of `POST /subscriptions/create`. Every field is optional at the
/// wire level so that missing fields surface as a ValidationError.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub frequency: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub start_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionCreated {
    pub message: String,
    pub subscription: SubscriptionResource,
}
