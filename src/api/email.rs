//! Mail delivery abstraction.
//!
//! Verification flows hand a [`MailMessage`] to a [`Mailer`]. The sender
//! decides how to deliver (SMTP, API, etc.) and returns `Ok`/`Err`; callers
//! treat a failure as non-fatal and report it without aborting their own
//! work, since the user can always request a resend.
//!
//! The default for local dev is [`LogMailer`], which logs and returns
//! `Ok(())`.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail delivery abstraction.
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error.
    fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Local dev mailer that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &MailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "mail send stub"
        );
        Ok(())
    }
}

pub const VERIFICATION_SUBJECT: &str = "Blogga - Account Activation";

/// Link the verification email points at.
#[must_use]
pub fn build_verify_url(frontend_base_url: &str, token: &str) -> String {
    format!(
        "{}/verify-email/{token}",
        frontend_base_url.trim_end_matches('/')
    )
}

/// Account-activation message. Plain text only.
#[must_use]
pub fn verification_message(to: &str, display_name: &str, verify_url: &str) -> MailMessage {
    let body = format!(
        "Hello {display_name},\n\n\
         In order to create and post on Blogga, you will need to verify your email.\n\
         Open the link below to activate your account:\n\n\
         {verify_url}\n\n\
         If you did not sign up for Blogga, you can ignore this message.\n"
    );
    MailMessage {
        to: to.to_string(),
        subject: VERIFICATION_SUBJECT.to_string(),
        body,
    }
}
