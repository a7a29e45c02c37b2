//! Outgoing patient email.
//!
//! [`Mailer`] is the seam the dispatcher talks to. [`SmtpMailer`] relays
//! through the configured SMTP server with `lettre`; [`DisabledMailer`]
//! stands in when no relay is configured and refuses every message.

use std::future::Future;

use lettre::{
  AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
  message::{Mailbox, header::ContentType},
  transport::smtp::authentication::Credentials,
};
use thiserror::Error;

use crate::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
  #[error("invalid email address: {0}")]
  Address(#[from] lettre::address::AddressError),

  #[error("could not build message: {0}")]
  Build(#[from] lettre::error::Error),

  #[error("smtp transport error: {0}")]
  Smtp(#[from] lettre::transport::smtp::Error),

  #[error("no mail transport configured")]
  Disabled,
}

impl MailError {
  /// Whether retrying the same message can ever succeed.
  pub fn is_permanent(&self) -> bool {
    match self {
      Self::Address(_) | Self::Build(_) | Self::Disabled => true,
      Self::Smtp(e) => e.is_permanent(),
    }
  }
}

/// A plain-text email to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
  pub to_name:    String,
  pub to_address: String,
  pub subject:    String,
  pub body:       String,
}

pub trait Mailer: Send + Sync {
  fn send(&self, mail: OutgoingMail) -> impl Future<Output = Result<(), MailError>> + Send + '_;
}

// ─── SMTP ────────────────────────────────────────────────────────────────────

pub struct SmtpMailer {
  transport: AsyncSmtpTransport<Tokio1Executor>,
  from:      Mailbox,
}

impl SmtpMailer {
  pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
    let builder = if config.starttls {
      AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
    } else {
      AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
    };
    let transport = builder
      .port(config.port)
      .credentials(Credentials::new(config.username.clone(), config.password.clone()))
      .build();
    let from = Mailbox::new(Some(config.from_name.clone()), config.from_address.parse()?);
    Ok(Self { transport, from })
  }
}

impl Mailer for SmtpMailer {
  async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
    let to = Mailbox::new(Some(mail.to_name), mail.to_address.parse()?);
    let message = Message::builder()
      .from(self.from.clone())
      .to(to)
      .subject(mail.subject)
      .header(ContentType::TEXT_PLAIN)
      .body(mail.body)?;
    self.transport.send(message).await?;
    Ok(())
  }
}

// ─── Disabled ────────────────────────────────────────────────────────────────

pub struct DisabledMailer;

impl Mailer for DisabledMailer {
  async fn send(&self, _mail: OutgoingMail) -> Result<(), MailError> { Err(MailError::Disabled) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(starttls: bool) -> SmtpConfig {
    SmtpConfig {
      host:         "smtp.example.org".into(),
      port:         2525,
      username:     "mailer".into(),
      password:     "pw".into(),
      from_name:    "General Hospital".into(),
      from_address: "noreply@example.org".into(),
      starttls,
    }
  }

  #[tokio::test]
  async fn builds_with_and_without_starttls() {
    assert!(SmtpMailer::new(&config(true)).is_ok());
    assert!(SmtpMailer::new(&config(false)).is_ok());
  }

  #[tokio::test]
  async fn bad_from_address_is_rejected() {
    let mut cfg = config(false);
    cfg.from_address = "not an address".into();
    assert!(matches!(SmtpMailer::new(&cfg), Err(MailError::Address(_))));
  }

  #[tokio::test]
  async fn bad_recipient_is_permanent() {
    let mailer = SmtpMailer::new(&config(false)).unwrap();
    let err = mailer
      .send(OutgoingMail {
        to_name:    "Claire".into(),
        to_address: "claire-at-nowhere".into(),
        subject:    "s".into(),
        body:       "b".into(),
      })
      .await
      .unwrap_err();
    assert!(err.is_permanent());
  }

  #[tokio::test]
  async fn disabled_mailer_refuses() {
    let err = DisabledMailer
      .send(OutgoingMail {
        to_name:    "Claire".into(),
        to_address: "claire@mail.test".into(),
        subject:    "s".into(),
        body:       "b".into(),
      })
      .await
      .unwrap_err();
    assert!(matches!(err, MailError::Disabled));
  }
}
