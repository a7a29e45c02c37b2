//! Background delivery of queued patient and staff notifications.
//!
//! Each poll takes a batch of pending outbox rows, oldest first:
//!
//! - staff recipients get an in-app message (inserted together with the
//!   delivered mark);
//! - patients get an email through the [`Mailer`];
//! - unknown recipients and patients without an address fail permanently.
//!
//! Transient failures stay pending until `max_attempts` is reached.
//!
//! Email delivery is at-least-once. When an email has been handed to the
//! relay but the store cannot record it, the row is reported as `unmarked`
//! without counting an attempt, and a later poll sends it again.

use std::{fmt, future::Future, sync::Arc};

use hospital_core::{
  message::Message,
  notification::OutboxEntry,
  store::{HospitalStore, Recipient},
};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::{
  OutboxConfig,
  mailer::{Mailer, OutgoingMail},
};

// ─── Outbox ──────────────────────────────────────────────────────────────────

/// The store operations the dispatcher needs. Every [`HospitalStore`] is one.
pub trait Outbox: Send + Sync {
  type Error: fmt::Display + Send;

  fn next_batch(
    &self,
    limit: usize,
    max_attempts: u32,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>, Self::Error>> + Send + '_;

  fn recipient(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Recipient>, Self::Error>> + Send + '_;

  fn deliver_internally(
    &self,
    entry: OutboxEntry,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  fn mark_delivered(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn mark_failed(
    &self,
    id: Uuid,
    reason: String,
    give_up: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

impl<S: HospitalStore> Outbox for S {
  type Error = S::Error;

  fn next_batch(
    &self,
    limit: usize,
    max_attempts: u32,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>, Self::Error>> + Send + '_ {
    self.pending_notifications(limit, max_attempts)
  }

  fn recipient(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Recipient>, Self::Error>> + Send + '_ {
    self.resolve_recipient(id)
  }

  fn deliver_internally(
    &self,
    entry: OutboxEntry,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_ {
    self.deliver_as_message(entry)
  }

  fn mark_delivered(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.mark_notification_delivered(id)
  }

  fn mark_failed(
    &self,
    id: Uuid,
    reason: String,
    give_up: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.mark_notification_failed(id, reason, give_up)
  }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
  pub delivered: usize,
  pub retried:   usize,
  pub failed:    usize,
  /// Sent, but the delivered mark could not be stored.
  pub unmarked:  usize,
}

impl DispatchReport {
  pub fn is_empty(&self) -> bool {
    self.delivered + self.retried + self.failed + self.unmarked == 0
  }
}

enum Delivery {
  Marked,
  Unmarked(String),
}

struct Failure {
  reason:    String,
  permanent: bool,
}

impl Failure {
  fn permanent(reason: &str) -> Self { Self { reason: reason.to_owned(), permanent: true } }

  fn transient(e: impl fmt::Display) -> Self { Self { reason: e.to_string(), permanent: false } }
}

pub struct Dispatcher<S, M> {
  store:  Arc<S>,
  mailer: Arc<M>,
  config: OutboxConfig,
}

impl<S, M> Dispatcher<S, M>
where
  S: Outbox,
  M: Mailer,
{
  pub fn new(store: Arc<S>, mailer: Arc<M>, config: OutboxConfig) -> Self {
    Self { store, mailer, config }
  }

  /// Process one batch. Only a failure to read or update the outbox itself
  /// is returned as an error.
  pub async fn run_once(&self) -> Result<DispatchReport, S::Error> {
    let batch = self
      .store
      .next_batch(self.config.batch_size, self.config.max_attempts)
      .await?;

    let mut report = DispatchReport::default();
    for entry in batch {
      let id = entry.notification_id;
      let attempt = entry.attempts + 1;

      match self.deliver(entry).await {
        Ok(Delivery::Marked) => report.delivered += 1,
        Ok(Delivery::Unmarked(reason)) => {
          tracing::error!(
            notification = %id,
            reason = %reason,
            "email sent but not marked delivered; it will be sent again"
          );
          report.unmarked += 1;
        }
        Err(failure) => {
          let give_up = failure.permanent || attempt >= self.config.max_attempts;
          tracing::warn!(
            notification = %id,
            attempt,
            give_up,
            reason = %failure.reason,
            "notification delivery failed"
          );
          self.store.mark_failed(id, failure.reason, give_up).await?;
          if give_up {
            report.failed += 1;
          } else {
            report.retried += 1;
          }
        }
      }
    }
    Ok(report)
  }

  async fn deliver(&self, entry: OutboxEntry) -> Result<Delivery, Failure> {
    let recipient = self
      .store
      .recipient(entry.recipient_id)
      .await
      .map_err(Failure::transient)?;

    match recipient {
      None => Err(Failure::permanent("unknown recipient")),
      Some(Recipient::User(_)) => {
        self
          .store
          .deliver_internally(entry)
          .await
          .map_err(Failure::transient)?;
        Ok(Delivery::Marked)
      }
      Some(Recipient::Patient(patient)) => {
        let Some(to_address) = patient.email.clone() else {
          return Err(Failure::permanent("patient has no email address"));
        };
        let id = entry.notification_id;
        let mail = OutgoingMail {
          to_name: patient.display_name(),
          to_address,
          subject: entry.subject,
          body: entry.body,
        };
        self.mailer.send(mail).await.map_err(|e| Failure {
          permanent: e.is_permanent(),
          reason:    e.to_string(),
        })?;
        match self.store.mark_delivered(id).await {
          Ok(()) => Ok(Delivery::Marked),
          Err(e) => Ok(Delivery::Unmarked(e.to_string())),
        }
      }
    }
  }

  /// Poll forever at the configured interval.
  pub async fn run(self) {
    let mut ticker = tokio::time::interval(self.config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match self.run_once().await {
        Ok(report) if report.is_empty() => {}
        Ok(report) => tracing::info!(
          delivered = report.delivered,
          retried = report.retried,
          failed = report.failed,
          unmarked = report.unmarked,
          "outbox dispatched"
        ),
        Err(e) => tracing::error!(error = %e, "outbox poll failed"),
      }
    }
  }
}
