//! Verification mail copy. Each template renders a plain-text and an HTML part.

pub struct RenderedMail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpMailKind {
    /// First code, sent right after signup.
    Verification,
    /// Replacement code; the previous one no longer works.
    Resend,
}

pub fn render_otp_mail(
    kind: OtpMailKind,
    product: &str,
    name: &str,
    code: &str,
    expiry_minutes: i64,
) -> RenderedMail {
    let (subject, lead, notice) = match kind {
        OtpMailKind::Verification => (
            "Help us protect your account",
            "Before you finish creating your account, we need to verify your identity. \
             On the verification page, enter the following code.",
            "You must confirm your email within 3 days of signing up, otherwise the \
             account is removed and you will need to sign up again.",
        ),
        OtpMailKind::Resend => (
            "Your new verification code",
            "We've sent you a new verification code as requested. \
             Enter the following code on the verification page.",
            "Your previous code has been invalidated and will no longer work.",
        ),
    };
    let greeting = if name.trim().is_empty() { "there" } else { name.trim() };

    let text = format!(
        "Hi {greeting},\n\n{lead}\n\n{code}\n\n\
         Your verification code expires after {expiry_minutes} minutes.\n\n{notice}\n\n\
         This is an automated email from {product}.\n\
         If you didn't request this, you can ignore this email.\n"
    );

    let (product, greeting, code) = (escape_html(product), escape_html(greeting), escape_html(code));
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #24292e; max-width: 560px; margin: 0 auto; padding: 40px 20px; text-align: center;">
    <div style="font-size: 24px; font-weight: bold; color: #0366d6; margin-bottom: 40px;">{product}</div>
    <h1 style="font-size: 28px; font-weight: 600;">{subject}</h1>
    <p style="font-size: 16px; color: #586069;">Hi {greeting},</p>
    <p style="font-size: 16px; color: #586069;">{lead}</p>
    <div style="background-color: #f6f8fa; border-radius: 6px; padding: 24px 32px; display: inline-block; margin: 0 auto 32px;">
        <span style="font-size: 36px; font-weight: 600; letter-spacing: 8px; font-family: Monaco, 'Courier New', monospace;">{code}</span>
    </div>
    <p style="font-size: 14px; color: #586069;">Your verification code expires after {expiry_minutes} minutes.</p>
    <p style="font-size: 14px; color: #586069;">{notice}</p>
    <div style="margin-top: 48px; padding-top: 24px; border-top: 1px solid #e1e4e8; font-size: 12px; color: #959da5;">
        <p>This is an automated email from {product}.</p>
        <p>If you didn't request this, you can ignore this email.</p>
    </div>
</body>
</html>
"#
    );

    RenderedMail {
        subject: subject.to_string(),
        text,
        html,
    }
}

/// Escapes text for an HTML element body or quoted attribute.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}
