//! Staff accounts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, access::Role};

pub const MIN_PASSWORD_LEN: usize = 6;

/// A staff account as exposed to callers. The credential hash never leaves
/// the store except through [`UserCredentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:     Uuid,
  pub family_name: String,
  pub given_name:  String,
  pub email:       String,
  pub role:        Role,
  pub created_at:  DateTime<Utc>,
}

impl User {
  pub fn display_name(&self) -> String {
    format!("{} {}", self.given_name, self.family_name)
  }

  /// How the user is named in patient-facing notices.
  pub fn practitioner_title(&self) -> String {
    format!("Dr. {}", self.display_name())
  }
}

/// A user together with its stored password hash, used only for login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
  pub user:          User,
  pub password_hash: String,
}

/// Input to [`crate::store::HospitalStore::create_user`]; the password is
/// already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub family_name:   String,
  pub given_name:    String,
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
}

/// Partial update of an account. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
  pub family_name:   Option<String>,
  pub given_name:    Option<String>,
  pub email:         Option<String>,
  pub password_hash: Option<String>,
  pub role:          Option<Role>,
}

impl UserChanges {
  pub fn is_empty(&self) -> bool {
    self.family_name.is_none()
      && self.given_name.is_none()
      && self.email.is_none()
      && self.password_hash.is_none()
      && self.role.is_none()
  }
}

pub fn validate_password(password: &str) -> Result<()> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(Error::Validation(format!(
      "password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }
  Ok(())
}

/// Reject self-service role changes and self-deletion.
pub fn ensure_not_self(actor: Uuid, target: Uuid, what: &str) -> Result<()> {
  if actor == target {
    Err(Error::Forbidden(format!("you cannot {what} your own account")))
  } else {
    Ok(())
  }
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// Activity counters shown for doctors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerStats {
  pub patients:     u64,
  pub treatments:   u64,
  pub appointments: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
  #[serde(flatten)]
  pub user:       User,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub statistics: Option<PractitionerStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDirectory {
  pub users:   Vec<User>,
  pub by_role: BTreeMap<&'static str, Vec<User>>,
  pub total:   usize,
}

impl UserDirectory {
  pub fn new(users: Vec<User>) -> Self {
    let mut by_role: BTreeMap<&'static str, Vec<User>> =
      Role::ALL.iter().map(|r| (r.as_str(), Vec::new())).collect();
    for user in &users {
      by_role.entry(user.role.as_str()).or_default().push(user.clone());
    }
    Self { total: users.len(), users, by_role }
  }
}

/// Global counters for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
  pub doctors:          u64,
  pub hr_staff:         u64,
  pub nurses:           u64,
  pub admins:           u64,
  pub patients:         u64,
  pub treatments:       u64,
  pub appointments:     u64,
  pub messages:         u64,
  /// New patients per `YYYY-MM` month over the last six months, newest first.
  pub monthly_patients: Vec<MonthlyCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCount {
  pub month: String,
  pub count: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn password_length() {
    assert!(validate_password("12345").is_err());
    assert!(validate_password("123456").is_ok());
  }

  #[test]
  fn directory_groups_by_role() {
    let mk = |role| User {
      user_id: Uuid::new_v4(),
      family_name: "F".into(),
      given_name: "G".into(),
      email: format!("{}@example.org", Uuid::new_v4()),
      role,
      created_at: Utc::now(),
    };
    let dir = UserDirectory::new(vec![mk(Role::Doctor), mk(Role::Doctor), mk(Role::Hr)]);
    assert_eq!(dir.total, 3);
    assert_eq!(dir.by_role["medecin"].len(), 2);
    assert_eq!(dir.by_role["rh"].len(), 1);
    assert!(dir.by_role["infirmier"].is_empty());
  }
}
