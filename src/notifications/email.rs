//! OTP delivery over SMTP.
//!
//! Delivery sits behind a trait so the auth handlers can be exercised with
//! a stub transport. Unlike courtesy mail, OTP mail is load-bearing: a
//! failed (or unconfigured) send is an error the caller must surface, never
//! a silent skip, or the account would be stuck waiting on a code that was
//! never sent.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

#[async_trait]
pub trait OtpDelivery: Send + Sync {
    /// Deliver a one-time passcode to the given address.
    async fn send_otp(&self, to_email: &str, code: &str) -> Result<()>;
}

/// SMTP-backed OTP mailer
pub struct SmtpOtpMailer {
    config: EmailConfig,
}

impl SmtpOtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(to = %to_email, "OTP email sent");

        Ok(())
    }
}

#[async_trait]
impl OtpDelivery for SmtpOtpMailer {
    async fn send_otp(&self, to_email: &str, code: &str) -> Result<()> {
        let html_body = render_otp_html(code);
        let text_body = render_otp_text(code);

        self.send_email(
            to_email,
            "Your OTP for Multi-Factor Authentication",
            &html_body,
            &text_body,
        )
        .await
    }
}

/// Render the HTML version of the OTP email
fn render_otp_html(code: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2 style="color: #007bff;">Your OTP Code</h2>
    <p>Hello,</p>
    <p>Your OTP for logging into the platform is:</p>
    <h1 style="color: #007bff; text-align: center;">{code}</h1>
    <p>Please use this code within the next 5 minutes. Do not share this code with anyone for security reasons.</p>
    <hr style="border: none; border-top: 1px solid #ddd;" />
    <p style="font-size: 12px; color: #777;">If you did not request this email, please ignore it or contact support immediately.</p>
    <p style="font-size: 12px; color: #777;">Thank you, <br>The Skillforge Team</p>
</div>"#,
        code = html_escape(code),
    )
}

/// Render the plain text version of the OTP email
fn render_otp_text(code: &str) -> String {
    format!(
        r#"Your OTP Code

Hello,

Your OTP for logging into the platform is:

    {code}

Please use this code within the next 5 minutes. Do not share this code
with anyone for security reasons.

If you did not request this email, please ignore it or contact support
immediately.

Thank you,
The Skillforge Team"#,
        code = code,
    )
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
