//! Internal staff messages.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, access::Role};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
  #[default]
  General,
  Treatment,
  Appointment,
}

impl MessageCategory {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::General => "general",
      Self::Treatment => "treatment",
      Self::Appointment => "appointment",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "general" => Ok(Self::General),
      "treatment" => Ok(Self::Treatment),
      "appointment" => Ok(Self::Appointment),
      other => Err(Error::Validation(format!("unknown message category: {other:?}"))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub message_id:   Uuid,
  pub sender_id:    Uuid,
  pub recipient_id: Uuid,
  pub body:         String,
  pub category:     MessageCategory,
  pub read:         bool,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
  pub sender_id:    Uuid,
  pub recipient_id: Uuid,
  pub body:         String,
  pub category:     MessageCategory,
}

impl NewMessage {
  pub fn validate(&self) -> Result<()> {
    if self.body.trim().is_empty() {
      return Err(Error::Validation("message body is required".into()));
    }
    Ok(())
  }
}

/// A message joined with the names and roles of both parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
  #[serde(flatten)]
  pub message:        Message,
  pub sender_name:    Option<String>,
  pub sender_role:    Option<Role>,
  pub recipient_name: Option<String>,
  pub recipient_role: Option<Role>,
}

/// A user's received and sent messages, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct Mailbox {
  pub received: Vec<MessageView>,
  pub sent:     Vec<MessageView>,
  pub total:    usize,
  pub unread:   usize,
}

impl Mailbox {
  pub fn new(user_id: Uuid, views: Vec<MessageView>) -> Self {
    let (received, sent): (Vec<_>, Vec<_>) = views
      .into_iter()
      .partition(|v| v.message.recipient_id == user_id);
    let unread = received.iter().filter(|v| !v.message.read).count();
    Self { total: received.len() + sent.len(), received, sent, unread }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
  pub counterpart_id:   Uuid,
  pub counterpart_name: Option<String>,
  pub counterpart_role: Option<Role>,
  pub last_message_at:  DateTime<Utc>,
  pub unread:           usize,
}

/// Group `views` by the other party, most recent conversation first.
pub fn conversations(user_id: Uuid, views: &[MessageView]) -> Vec<Conversation> {
  let mut by_counterpart: HashMap<Uuid, Conversation> = HashMap::new();
  for view in views {
    let m = &view.message;
    let incoming = m.recipient_id == user_id;
    let (id, name, role) = if incoming {
      (m.sender_id, &view.sender_name, view.sender_role)
    } else {
      (m.recipient_id, &view.recipient_name, view.recipient_role)
    };
    let entry = by_counterpart.entry(id).or_insert_with(|| Conversation {
      counterpart_id:   id,
      counterpart_name: name.clone(),
      counterpart_role: role,
      last_message_at:  m.created_at,
      unread:           0,
    });
    entry.last_message_at = entry.last_message_at.max(m.created_at);
    if incoming && !m.read {
      entry.unread += 1;
    }
  }

  let mut list: Vec<_> = by_counterpart.into_values().collect();
  list.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
  list
}

#[cfg(test)]
mod tests {
  use chrono::TimeDelta;

  use super::*;

  fn view(sender: Uuid, recipient: Uuid, read: bool, age_min: i64) -> MessageView {
    MessageView {
      message:        Message {
        message_id:   Uuid::new_v4(),
        sender_id:    sender,
        recipient_id: recipient,
        body:         "hello".into(),
        category:     MessageCategory::General,
        read,
        created_at:   Utc::now() - TimeDelta::minutes(age_min),
      },
      sender_name:    None,
      sender_role:    None,
      recipient_name: None,
      recipient_role: None,
    }
  }

  #[test]
  fn mailbox_splits_and_counts_unread() {
    let me = Uuid::new_v4();
    let other = Uuid::new_v4();
    let mailbox = Mailbox::new(me, vec![
      view(other, me, false, 1),
      view(other, me, true, 2),
      view(me, other, false, 3),
    ]);
    assert_eq!(mailbox.received.len(), 2);
    assert_eq!(mailbox.sent.len(), 1);
    assert_eq!(mailbox.total, 3);
    assert_eq!(mailbox.unread, 1);
  }

  #[test]
  fn conversations_are_most_recent_first() {
    let me = Uuid::new_v4();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let list = conversations(me, &[
      view(a, me, false, 30),
      view(me, b, false, 5),
      view(a, me, false, 60),
    ]);
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].counterpart_id, b);
    assert_eq!(list[0].unread, 0);
    assert_eq!(list[1].counterpart_id, a);
    assert_eq!(list[1].unread, 2);
  }

  #[test]
  fn category_strings() {
    assert_eq!(MessageCategory::parse("treatment").unwrap(), MessageCategory::Treatment);
    assert!(MessageCategory::parse("urgent").is_err());
    assert!(NewMessage {
      sender_id:    Uuid::new_v4(),
      recipient_id: Uuid::new_v4(),
      body:         "  ".into(),
      category:     MessageCategory::General,
    }
    .validate()
    .is_err());
  }
}
