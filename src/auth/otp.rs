//! One-time passcode policy: generation, expiry and resend throttling.
//!
//! Everything here is pure with respect to time; callers pass `now` so the
//! verification flow and the tests share the same clock.

use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub const OTP_LENGTH: usize = 6;
pub const EXPIRY_MINUTES: i64 = 10;
pub const MAX_ATTEMPTS: i32 = 5;
pub const RESEND_DELAY_SECONDS: i64 = 60;
/// Declared for parity with the mail copy; not enforced by the flow.
pub const MAX_RESENDS_PER_HOUR: u32 = 3;
/// Declared for parity with the mail copy; lockout is derived from attempts.
pub const LOCKOUT_DURATION_MINUTES: i64 = 60;

/// Tunable OTP limits, loaded once with the rest of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OtpPolicy {
    pub expiry_minutes: i64,
    pub max_attempts: i32,
    pub resend_delay_seconds: i64,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            expiry_minutes: EXPIRY_MINUTES,
            max_attempts: MAX_ATTEMPTS,
            resend_delay_seconds: RESEND_DELAY_SECONDS,
        }
    }
}

impl OtpPolicy {
    pub fn expiry_from(&self, now: OffsetDateTime) -> OffsetDateTime {
        compute_expiry(now, self.expiry_minutes)
    }

    pub fn can_resend(&self, last_attempt: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
        can_resend(last_attempt, now, self.resend_delay_seconds)
    }

    /// Whole seconds left before another code may be sent, rounded up.
    pub fn seconds_until_resend(
        &self,
        last_attempt: Option<OffsetDateTime>,
        now: OffsetDateTime,
    ) -> i64 {
        let Some(last) = last_attempt else { return 0 };
        let ready_at = last + Duration::seconds(self.resend_delay_seconds);
        let left = ready_at - now;
        if left <= Duration::ZERO {
            return 0;
        }
        let whole = left.whole_seconds();
        if left > Duration::seconds(whole) {
            whole + 1
        } else {
            whole
        }
    }

    pub fn is_locked(&self, attempts: i32) -> bool {
        attempts >= self.max_attempts
    }

    pub fn remaining_attempts(&self, attempts: i32) -> i32 {
        (self.max_attempts - attempts).max(0)
    }
}

/// Uniform 6-digit code in `100000..=999999` drawn from the OS CSPRNG.
pub fn generate_code() -> String {
    OsRng.gen_range(100_000u32..=999_999).to_string()
}

pub fn compute_expiry(now: OffsetDateTime, minutes: i64) -> OffsetDateTime {
    now + Duration::minutes(minutes)
}

/// Absent expiry counts as expired; a code is dead from its expiry instant on.
pub fn is_expired(expiry: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    match expiry {
        Some(at) => at <= now,
        None => true,
    }
}

pub fn can_resend(last_attempt: Option<OffsetDateTime>, now: OffsetDateTime, delay_seconds: i64) -> bool {
    match last_attempt {
        Some(last) => now - last >= Duration::seconds(delay_seconds),
        None => true,
    }
}

pub fn is_valid_format(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// `johndoe@example.com` -> `jo***e@example.com`.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return "***".into();
    };
    let head: String = local.chars().take(2).collect();
    let tail = local.chars().last().map(String::from).unwrap_or_default();
    format!("{head}***{tail}@{domain}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemainingTime {
    pub minutes: i64,
    pub seconds: i64,
}

pub fn remaining_time(expiry: Option<OffsetDateTime>, now: OffsetDateTime) -> RemainingTime {
    let zero = RemainingTime { minutes: 0, seconds: 0 };
    let Some(at) = expiry else { return zero };
    let left = at - now;
    if left <= Duration::ZERO {
        return zero;
    }
    let secs = left.whole_seconds();
    RemainingTime {
        minutes: secs / 60,
        seconds: secs % 60,
    }
}
