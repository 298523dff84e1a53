pub mod test_helpers {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use lazy_static::lazy_static;
    use regex::Regex;
    use sqlx::{postgres::PgPoolOptions, PgPool};

    use crate::config::AppConfig;
    use crate::mailer::{MailError, Mailer, RenderedMail};
    use crate::state::AppState;

    /// A mail captured by [`MemoryMailer`].
    #[derive(Debug, Clone)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub code: Option<String>,
    }

    /// Records every message instead of delivering it.
    #[derive(Debug, Default, Clone)]
    pub struct MemoryMailer {
        sent: Arc<Mutex<Vec<SentMail>>>,
    }

    impl MemoryMailer {
        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }

        /// Code from the most recent mail to `to`.
        pub fn last_code_for(&self, to: &str) -> Option<String> {
            self.sent()
                .into_iter()
                .rev()
                .find(|m| m.to == to)
                .and_then(|m| m.code)
        }
    }

    fn extract_code(text: &str) -> Option<String> {
        lazy_static! {
            static ref CODE_RE: Regex = Regex::new(r"(?m)^\s*(\d{6})\s*$").unwrap();
        }
        CODE_RE.captures(text).map(|c| c[1].to_string())
    }

    #[async_trait]
    impl Mailer for MemoryMailer {
        async fn send(&self, to: &str, mail: RenderedMail) -> Result<(), MailError> {
            let entry = SentMail {
                to: to.to_string(),
                subject: mail.subject,
                code: extract_code(&mail.text),
            };
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(entry);
            }
            Ok(())
        }
    }

    /// Always fails, as an unreachable SMTP relay would.
    #[derive(Debug, Default, Clone)]
    pub struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _to: &str, _mail: RenderedMail) -> Result<(), MailError> {
            Err(MailError::SendFailed("connection refused".into()))
        }
    }

    /// Connects to `TEST_DATABASE_URL` and runs migrations; `None` when unset.
    pub async fn create_test_db() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .ok()?;
        sqlx::migrate!("./migrations").run(&pool).await.ok()?;
        Some(pool)
    }

    /// State backed by a real pool and the given mailer.
    pub fn state_with(db: PgPool, mailer: Arc<dyn Mailer>) -> AppState {
        AppState::from_parts(db, AppConfig::fake(), mailer)
    }

    /// Unique address per call so tests can share one database.
    pub fn unique_email(prefix: &str) -> String {
        format!("{prefix}-{}@example.com", uuid::Uuid::new_v4().simple())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::mailer::{render_otp_mail, OtpMailKind};

        #[tokio::test]
        async fn memory_mailer_captures_code() {
            let mailer = MemoryMailer::default();
            let mail = render_otp_mail(OtpMailKind::Verification, "Tracker", "Ann", "482913", 10);
            mailer.send("ann@example.com", mail).await.unwrap();
            assert_eq!(mailer.last_code_for("ann@example.com").as_deref(), Some("482913"));
            assert_eq!(mailer.sent().len(), 1);
        }
    }
}
