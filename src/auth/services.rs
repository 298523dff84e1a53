use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{
        AuthResponse, ChangePasswordRequest, ResendOtpRequest, ResendOtpResponse, SigninRequest,
        SignupRequest, SignupResponse, VerifyOtpRequest,
    },
    otp::{self, mask_email},
    password,
    repo,
    repo_types::{NewUser, PublicUser, User},
    verification::{self, normalize_email, CodeCheck},
};
use crate::db::in_transaction;
use crate::error::{AppError, AppResult};
use crate::mailer::{render_otp_mail, send_with_timeout, OtpMailKind};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug)]
struct SignupInput {
    email: String,
    name: String,
    password: String,
}

fn validate_signup(req: SignupRequest) -> AppResult<SignupInput> {
    let (Some(email), Some(password), Some(confirmation), Some(name)) = (
        required(req.email),
        required(req.password),
        required(req.confirmation_password),
        required(req.name),
    ) else {
        return Err(AppError::Validation(
            "Email, password, confirmation_password and name are required".into(),
        ));
    };

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }
    password::validate_new_password(&password, &confirmation)?;

    Ok(SignupInput {
        email,
        name: name.trim().to_string(),
        password,
    })
}

/// Creates an unverified user holding a fresh code, then mails the code.
/// A failed send is logged and reported as `otp_sent: false`.
pub async fn signup(state: &AppState, req: SignupRequest) -> AppResult<SignupResponse> {
    let input = validate_signup(req)?;
    let policy = state.config.otp;
    let now = OffsetDateTime::now_utc();
    let code = otp::generate_code();
    let expiry = policy.expiry_from(now);

    let stored_code = code.clone();
    let user = in_transaction(&state.db, move |conn| {
        Box::pin(async move {
            if repo::find_by_email(conn, &input.email).await?.is_some() {
                warn!(email = %mask_email(&input.email), "email already registered");
                return Err(AppError::Conflict("User with this email already exists".into()));
            }

            let password_hash = password::hash_blocking(input.password).await?;
            let new_user = NewUser {
                uuid: Uuid::new_v4(),
                email: input.email,
                name: input.name,
                password_hash,
                otp_code: stored_code,
                otp_code_expiry: expiry,
                sent_at: now,
            };
            Ok(repo::create(conn, &new_user).await?)
        })
    })
    .await?;

    let mail = render_otp_mail(
        OtpMailKind::Verification,
        &state.config.email.from_name,
        &user.name,
        &code,
        policy.expiry_minutes,
    );
    let otp_sent = match send_with_timeout(
        state.mailer.as_ref(),
        state.config.email.send_timeout(),
        &user.email,
        mail,
    )
    .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, user_id = user.id, "verification email not sent");
            false
        }
    };

    info!(user_id = user.id, email = %mask_email(&user.email), otp_sent, "user signed up");
    Ok(SignupResponse {
        message: if otp_sent {
            "User created. Please check your email for the verification code.".into()
        } else {
            "User created, but the verification email could not be sent. Please request a new code."
                .into()
        },
        user: PublicUser::from(user),
        requires_verification: true,
        otp_sent,
        otp_expires_in: otp::remaining_time(Some(expiry), OffsetDateTime::now_utc()),
    })
}

enum VerifyOutcome {
    Verified(User),
    Rejected { remaining_attempts: i32 },
}

/// Verifies a submitted code. A wrong code still commits the incremented
/// attempt counter before the rejection is reported.
pub async fn verify_otp(state: &AppState, req: VerifyOtpRequest) -> AppResult<AuthResponse> {
    let (email, code) = verification::validate_verify_input(req.email.as_deref(), req.otp.as_deref())?;
    let policy = state.config.otp;

    let outcome = in_transaction(&state.db, move |conn| {
        Box::pin(async move {
            let user = repo::find_by_email_for_update(conn, &email)
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".into()))?;

            match verification::check_code(&user, &code, OffsetDateTime::now_utc(), &policy)? {
                CodeCheck::Match => Ok(VerifyOutcome::Verified(
                    repo::mark_verified(conn, user.id).await?,
                )),
                CodeCheck::Mismatch => {
                    let attempts = repo::record_failed_attempt(conn, user.id).await?;
                    warn!(user_id = user.id, attempts, "wrong verification code");
                    Ok(VerifyOutcome::Rejected {
                        remaining_attempts: policy.remaining_attempts(attempts),
                    })
                }
            }
        })
    })
    .await?;

    match outcome {
        VerifyOutcome::Verified(user) => {
            let token = state.keys.issue(user.id, &user.email)?;
            info!(user_id = user.id, "email verified");
            Ok(AuthResponse {
                message: "Email verified successfully".into(),
                token,
                user: PublicUser::from(user),
            })
        }
        VerifyOutcome::Rejected { remaining_attempts } => {
            Err(AppError::InvalidCode { remaining_attempts })
        }
    }
}

/// Issues a replacement code. The new code is only kept if the mail goes out.
pub async fn resend_otp(state: &AppState, req: ResendOtpRequest) -> AppResult<ResendOtpResponse> {
    let email = required(req.email)
        .map(|e| normalize_email(&e))
        .ok_or_else(|| AppError::Validation("Email is required".into()))?;
    let policy = state.config.otp;
    let mailer = state.mailer.clone();
    let send_timeout = state.config.email.send_timeout();
    let product = state.config.email.from_name.clone();

    let (user_id, masked, expiry) = in_transaction(&state.db, move |conn| {
        Box::pin(async move {
            let user = repo::find_by_email_for_update(conn, &email)
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".into()))?;

            let now = OffsetDateTime::now_utc();
            verification::check_resend(&user, now, &policy)?;

            let code = otp::generate_code();
            let expiry = policy.expiry_from(now);
            repo::store_new_code(conn, user.id, &code, expiry, now).await?;

            let mail = render_otp_mail(
                OtpMailKind::Resend,
                &product,
                &user.name,
                &code,
                policy.expiry_minutes,
            );
            send_with_timeout(mailer.as_ref(), send_timeout, &user.email, mail)
                .await
                .map_err(|e| {
                    warn!(error = %e, user_id = user.id, "resend email failed");
                    AppError::Mail(e)
                })?;

            Ok((user.id, mask_email(&user.email), expiry))
        })
    })
    .await?;

    info!(user_id, email = %masked, "verification code resent");
    Ok(ResendOtpResponse {
        message: "A new verification code has been sent".into(),
        email: masked,
        otp_expires_in: otp::remaining_time(Some(expiry), OffsetDateTime::now_utc()),
    })
}

pub async fn signin(state: &AppState, req: SigninRequest) -> AppResult<AuthResponse> {
    let (Some(email), Some(password)) = (required(req.email), required(req.password)) else {
        return Err(AppError::Validation("Email and password are required".into()));
    };
    let email = normalize_email(&email);

    let user = {
        let mut conn = state.db.acquire().await?;
        repo::find_by_email(&mut *conn, &email).await?
    }
    .ok_or_else(|| {
        warn!(email = %mask_email(&email), "signin unknown email");
        AppError::NotFound("User not found".into())
    })?;

    if !password::matches_blocking(password, user.password_hash.clone()).await? {
        warn!(user_id = user.id, "signin invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if !user.email_verified {
        info!(user_id = user.id, "signin blocked until email is verified");
        return Err(AppError::VerificationRequired { email: user.email });
    }

    let token = state.keys.issue(user.id, &user.email)?;
    info!(user_id = user.id, "user signed in");
    Ok(AuthResponse {
        message: "User signed in successfully".into(),
        token,
        user: PublicUser::from(user),
    })
}

/// Checks the current password against the locked row, then re-hashes.
/// OTP state is untouched.
pub async fn change_password(
    state: &AppState,
    user: &User,
    req: ChangePasswordRequest,
) -> AppResult<()> {
    let (Some(current), Some(new_password), Some(confirmation)) = (
        required(req.current_password),
        required(req.new_password),
        required(req.confirmation_password),
    ) else {
        return Err(AppError::Validation(
            "current_password, new_password and confirmation_password are required".into(),
        ));
    };

    password::validate_new_password(&new_password, &confirmation)?;

    let user_id = user.id;
    in_transaction(&state.db, move |conn| {
        Box::pin(async move {
            let locked = repo::find_by_id_for_update(conn, user_id)
                .await?
                .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

            if !password::matches_blocking(current, locked.password_hash).await? {
                warn!(user_id, "change password with wrong current password");
                return Err(AppError::Unauthorized("Current password is incorrect".into()));
            }

            let password_hash = password::hash_blocking(new_password).await?;
            repo::update_password(conn, user_id, &password_hash).await?;
            Ok(())
        })
    })
    .await?;

    info!(user_id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_req(email: &str, pw: &str, confirm: &str, name: &str) -> SignupRequest {
        SignupRequest {
            email: Some(email.into()),
            password: Some(pw.into()),
            confirmation_password: Some(confirm.into()),
            name: Some(name.into()),
        }
    }

    #[test]
    fn email_regex() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@b.com"));
    }

    #[test]
    fn signup_normalizes_email_and_name() {
        let input = validate_signup(signup_req(" A@B.com ", "Secret1!", "Secret1!", " A ")).unwrap();
        assert_eq!(input.email, "a@b.com");
        assert_eq!(input.name, "A");
    }

    #[test]
    fn signup_requires_every_field() {
        let mut req = signup_req("a@b.com", "Secret1!", "Secret1!", "A");
        req.name = None;
        assert!(matches!(validate_signup(req), Err(AppError::Validation(_))));

        let req = signup_req("a@b.com", "Secret1!", "   ", "A");
        assert!(matches!(validate_signup(req), Err(AppError::Validation(_))));
    }

    #[test]
    fn signup_rejects_mismatched_confirmation() {
        let err = validate_signup(signup_req("a@b.com", "Secret1!", "Secret2!", "A")).unwrap_err();
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn signup_rejects_short_password() {
        let err = validate_signup(signup_req("a@b.com", "short", "short", "A")).unwrap_err();
        assert!(err.to_string().contains("at least 8"));
    }

    #[tokio::test]
    async fn signin_requires_fields_before_touching_db() {
        let state = AppState::fake();
        let err = signin(&state, SigninRequest { email: Some("a@b.com".into()), password: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn resend_requires_email() {
        let state = AppState::fake();
        let err = resend_otp(&state, ResendOtpRequest { email: Some("  ".into()) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
