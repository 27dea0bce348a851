//! SMTP dispatch backend built on lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::Transport;

use super::traits::{DispatchError, DispatchResult, MailBackend};

/// Backend that opens an SMTP session per dispatch.
///
/// Transports rotate per message, so there is no long-lived connection to
/// pool; each dispatch builds a mailer from the transport's settings.
#[derive(Debug, Default)]
pub struct LettreBackend;

impl LettreBackend {
    pub fn new() -> Self {
        Self
    }

    fn build_mailer(transport: &Transport) -> DispatchResult<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials =
            Credentials::new(transport.username.clone(), transport.password.clone());

        let builder = if transport.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&transport.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&transport.host)
        }
        .map_err(|e| DispatchError::Connection(format!("SMTP relay error: {e}")))?;

        Ok(builder.credentials(credentials).port(transport.port).build())
    }

    fn build_message(
        transport: &Transport,
        to: &str,
        subject: &str,
        body: &str,
    ) -> DispatchResult<Message> {
        let from: Mailbox = transport
            .from_header()
            .parse()
            .map_err(|e| DispatchError::InvalidMessage(format!("bad from address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| DispatchError::InvalidMessage(format!("bad to address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| DispatchError::InvalidMessage(e.to_string()))
    }
}

#[async_trait]
impl MailBackend for LettreBackend {
    async fn dispatch(
        &self,
        transport: &Transport,
        to: &str,
        subject: &str,
        body: &str,
    ) -> DispatchResult<String> {
        let message = Self::build_message(transport, to, subject, body)?;
        let mailer = Self::build_mailer(transport)?;

        let response = mailer
            .send(message)
            .await
            .map_err(|e| DispatchError::Rejected(e.to_string()))?;

        let first_line = response
            .message()
            .next()
            .map(str::to_string)
            .unwrap_or_default();
        Ok(first_line)
    }
}
