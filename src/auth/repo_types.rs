use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub otp_code: Option<String>,
    pub otp_code_expiry: Option<OffsetDateTime>,
    pub otp_attempts: i32,
    pub last_otp_attempt: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields written when a user signs up.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub uuid: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub otp_code: String,
    pub otp_code_expiry: OffsetDateTime,
    pub sent_at: OffsetDateTime,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.uuid,
            email: u.email.clone(),
            name: u.name.clone(),
            email_verified: u.email_verified,
            created_at: u.created_at,
        }
    }
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.uuid,
            email: u.email,
            name: u.name,
            email_verified: u.email_verified,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn public_user_hides_credentials() {
        let user = User {
            id: 7,
            uuid: Uuid::new_v4(),
            email: "test@example.com".into(),
            name: "Test".into(),
            password_hash: "$argon2id$secret".into(),
            email_verified: false,
            otp_code: Some("123456".into()),
            otp_code_expiry: None,
            otp_attempts: 0,
            last_otp_attempt: None,
            created_at: datetime!(2025-01-01 00:00:00 UTC),
            updated_at: datetime!(2025-01-01 00:00:00 UTC),
        };

        let json = serde_json::to_value(PublicUser::from(&user)).unwrap();
        assert_eq!(json["email"], "test@example.com");
        assert_eq!(json["emailVerified"], false);
        assert_eq!(json["createdAt"], "2025-01-01T00:00:00Z");
        let raw = json.to_string();
        assert!(!raw.contains("argon2"));
        assert!(!raw.contains("123456"));
    }
}
