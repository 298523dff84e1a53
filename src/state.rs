use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::mailer::{self, LogMailer, Mailer};
use crate::screening::{LocalScreen, RequestScreen};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub mailer: Arc<dyn Mailer>,
    pub screen: Arc<dyn RequestScreen>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let db = crate::db::connect(&config).await?;
        let mailer = mailer::from_config(&config.email)?;
        Ok(Self::from_parts(db, config, mailer))
    }

    pub fn from_parts(db: PgPool, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        let screen = Arc::new(LocalScreen::new(&config.screening)) as Arc<dyn RequestScreen>;
        Self {
            db,
            config: Arc::new(config),
            keys,
            mailer,
            screen,
        }
    }

    /// State for tests that never reach the database: the pool connects lazily.
    pub fn fake() -> Self {
        Self::fake_with_mailer(Arc::new(LogMailer))
    }

    pub fn fake_with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        let config = AppConfig::fake();
        let db = crate::db::connect_lazy(&config).expect("lazy pool ok");
        Self::from_parts(db, config, mailer)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}
