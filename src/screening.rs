//! Request screening: per-client rate limiting and bot detection, applied to
//! every request ahead of the handlers.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::{config::ScreeningConfig, error::AppError, state::AppState};

pub const BYPASS_HEADER: &str = "x-screening-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenDecision {
    Allowed,
    RateLimited,
    Bot,
    Denied,
}

impl ScreenDecision {
    pub fn message(&self) -> &'static str {
        match self {
            ScreenDecision::Allowed => "Allowed",
            ScreenDecision::RateLimited => "Rate limit exceeded. Please try again later.",
            ScreenDecision::Bot => "Bot activity detected. Access denied.",
            ScreenDecision::Denied => "Access denied.",
        }
    }
}

/// What the screen gets to see about a request.
#[derive(Debug, Clone, Copy)]
pub struct ScreenInput<'a> {
    pub client: &'a str,
    pub user_agent: Option<&'a str>,
    pub presented_key: Option<&'a str>,
}

pub trait RequestScreen: Send + Sync {
    fn screen(&self, input: &ScreenInput<'_>, now: Instant) -> ScreenDecision;
}

struct Window {
    started: Instant,
    count: u32,
}

/// In-process fixed-window limiter plus a user-agent bot heuristic.
pub struct LocalScreen {
    config: ScreeningConfig,
    windows: Mutex<HashMap<String, Window>>,
}

const PRUNE_THRESHOLD: usize = 10_000;

impl LocalScreen {
    pub fn new(config: &ScreeningConfig) -> Self {
        Self {
            config: config.clone(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs.max(1))
    }

    fn take(&self, client: &str, now: Instant) -> bool {
        let window = self.window();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.config.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

impl RequestScreen for LocalScreen {
    fn screen(&self, input: &ScreenInput<'_>, now: Instant) -> ScreenDecision {
        if !self.config.enabled {
            return ScreenDecision::Allowed;
        }
        if let (Some(expected), Some(presented)) = (self.config.bypass_key.as_deref(), input.presented_key) {
            return if expected == presented {
                ScreenDecision::Allowed
            } else {
                ScreenDecision::Denied
            };
        }
        if self.config.block_bots && input.user_agent.is_some_and(looks_like_bot) {
            return ScreenDecision::Bot;
        }
        if !self.take(input.client, now) {
            return ScreenDecision::RateLimited;
        }
        ScreenDecision::Allowed
    }
}

pub fn looks_like_bot(user_agent: &str) -> bool {
    lazy_static! {
        static ref BOT_RE: Regex =
            Regex::new(r"(?i)(bot\b|crawler|spider|scrapy|slurp|headlesschrome|phantomjs)").unwrap();
    }
    BOT_RE.is_match(user_agent)
}

fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

pub async fn screen_request(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&req);
    let headers = req.headers();
    let input = ScreenInput {
        client: &client,
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok()),
        presented_key: headers.get(BYPASS_HEADER).and_then(|v| v.to_str().ok()),
    };

    match state.screen.screen(&input, Instant::now()) {
        ScreenDecision::Allowed => Ok(next.run(req).await),
        decision => {
            warn!(client = %client, ?decision, "request screened out");
            Err(AppError::Screened(decision))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32) -> ScreeningConfig {
        ScreeningConfig {
            enabled: true,
            bypass_key: Some("let-me-in".into()),
            max_requests,
            window_secs: 60,
            block_bots: true,
        }
    }

    fn input<'a>(client: &'a str, ua: Option<&'a str>, key: Option<&'a str>) -> ScreenInput<'a> {
        ScreenInput {
            client,
            user_agent: ua,
            presented_key: key,
        }
    }

    #[test]
    fn limits_per_client_within_window() {
        let screen = LocalScreen::new(&config(2));
        let now = Instant::now();
        assert_eq!(screen.screen(&input("1.1.1.1", None, None), now), ScreenDecision::Allowed);
        assert_eq!(screen.screen(&input("1.1.1.1", None, None), now), ScreenDecision::Allowed);
        assert_eq!(
            screen.screen(&input("1.1.1.1", None, None), now),
            ScreenDecision::RateLimited
        );
        assert_eq!(screen.screen(&input("2.2.2.2", None, None), now), ScreenDecision::Allowed);
        let later = now + Duration::from_secs(61);
        assert_eq!(screen.screen(&input("1.1.1.1", None, None), later), ScreenDecision::Allowed);
    }

    #[test]
    fn blocks_known_bots() {
        let screen = LocalScreen::new(&config(10));
        let now = Instant::now();
        assert_eq!(
            screen.screen(&input("1.1.1.1", Some("Googlebot/2.1"), None), now),
            ScreenDecision::Bot
        );
        assert_eq!(
            screen.screen(&input("1.1.1.1", Some("Mozilla/5.0 (X11; Linux x86_64)"), None), now),
            ScreenDecision::Allowed
        );
    }

    #[test]
    fn bypass_key_skips_or_denies() {
        let screen = LocalScreen::new(&config(0));
        let now = Instant::now();
        assert_eq!(
            screen.screen(&input("1.1.1.1", Some("Googlebot"), Some("let-me-in")), now),
            ScreenDecision::Allowed
        );
        assert_eq!(
            screen.screen(&input("1.1.1.1", None, Some("wrong")), now),
            ScreenDecision::Denied
        );
    }

    #[test]
    fn disabled_screen_allows_everything() {
        let mut cfg = config(0);
        cfg.enabled = false;
        let screen = LocalScreen::new(&cfg);
        assert_eq!(
            screen.screen(&input("1.1.1.1", Some("crawler"), None), Instant::now()),
            ScreenDecision::Allowed
        );
    }

    #[test]
    fn bot_heuristic() {
        assert!(looks_like_bot("Mozilla/5.0 (compatible; bingbot/2.0)"));
        assert!(looks_like_bot("Scrapy/2.11"));
        assert!(!looks_like_bot("curl/8.4.0"));
        assert!(!looks_like_bot("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"));
    }
}
