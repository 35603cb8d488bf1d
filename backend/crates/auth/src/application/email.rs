//! Outbound account email
//!
//! Delivery is a collaborator behind [`EmailSender`]. Flows treat every send
//! as best effort: failures are logged by the caller and never fail the flow.

use crate::domain::value_object::email::Email;
use crate::error::AuthResult;

#[trait_variant::make(EmailSender: Send)]
pub trait LocalEmailSender {
    async fn send_verification_email(&self, to: &Email, name: &str, token: &str) -> AuthResult<()>;

    async fn send_password_reset_email(&self, to: &Email, name: &str, token: &str)
    -> AuthResult<()>;

    async fn send_password_changed_email(&self, to: &Email, name: &str) -> AuthResult<()>;
}

/// Records each send as a log event. Only the recipient's domain is logged;
/// tokens never are.
#[derive(Debug, Clone, Default)]
pub struct TracingEmailSender;

impl EmailSender for TracingEmailSender {
    async fn send_verification_email(&self, to: &Email, _name: &str, _token: &str) -> AuthResult<()> {
        tracing::info!(email_domain = to.domain(), kind = "verification", "Email queued");
        Ok(())
    }

    async fn send_password_reset_email(&self, to: &Email, _name: &str, _token: &str) -> AuthResult<()> {
        tracing::info!(email_domain = to.domain(), kind = "password_reset", "Email queued");
        Ok(())
    }

    async fn send_password_changed_email(&self, to: &Email, _name: &str) -> AuthResult<()> {
        tracing::info!(email_domain = to.domain(), kind = "password_changed", "Email queued");
        Ok(())
    }
}
