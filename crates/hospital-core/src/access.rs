//! Roles, principals and the capability table.
//!
//! Every endpoint is gated by a single `(Resource, Action)` lookup into
//! [`allowed_roles`]. Roles are flat: an admin does not implicitly satisfy a
//! doctor-only capability, so each entry lists every permitted role.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// Staff role. The wire strings are exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
  #[serde(rename = "admin")]
  Admin,
  #[serde(rename = "medecin")]
  Doctor,
  #[serde(rename = "rh")]
  Hr,
  #[serde(rename = "infirmier")]
  Nurse,
}

impl Role {
  pub const ALL: [Role; 4] = [Role::Admin, Role::Doctor, Role::Hr, Role::Nurse];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Admin => "admin",
      Self::Doctor => "medecin",
      Self::Hr => "rh",
      Self::Nurse => "infirmier",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Role::ALL
      .into_iter()
      .find(|r| r.as_str() == s)
      .ok_or_else(|| Error::UnknownRole(s.to_owned()))
  }
}

// ─── Principal ───────────────────────────────────────────────────────────────

/// The authenticated caller attached to a request by the auth guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub id:    Uuid,
  pub email: String,
  pub role:  Role,
}

impl Principal {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

// ─── Capability table ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
  Patient,
  /// A practitioner's calendar: agenda, free slots, patient panel.
  Agenda,
  Appointment,
  Treatment,
  /// The shared list of prescribable medications.
  Catalog,
  User,
  Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Read,
  Create,
  Update,
  Delete,
}

const EVERYONE: &[Role] = &[Role::Admin, Role::Doctor, Role::Hr, Role::Nurse];
const DOCTORS: &[Role] = &[Role::Doctor];
const ADMINS: &[Role] = &[Role::Admin];

/// The roles permitted to perform `action` on `resource`.
pub fn allowed_roles(resource: Resource, action: Action) -> &'static [Role] {
  use Action::*;
  use Resource::*;

  match (resource, action) {
    (Patient, Read) => EVERYONE,
    (Patient, Create | Update) => &[Role::Hr, Role::Admin],
    (Patient, Delete) => ADMINS,

    (Agenda, Read) => &[Role::Doctor, Role::Admin],
    (Agenda, _) => &[],

    (Appointment, Read) => EVERYONE,
    (Appointment, Create | Update | Delete) => DOCTORS,

    (Treatment, Read) => EVERYONE,
    (Treatment, Create | Update | Delete) => DOCTORS,

    (Catalog, Read) => EVERYONE,
    (Catalog, _) => ADMINS,

    (User, _) => ADMINS,

    (Message, _) => EVERYONE,
  }
}

/// Reject the principal unless its role is listed for `(resource, action)`.
pub fn authorize(
  principal: &Principal,
  resource: Resource,
  action: Action,
) -> Result<()> {
  if allowed_roles(resource, action).contains(&principal.role) {
    Ok(())
  } else {
    Err(Error::Forbidden(format!(
      "access denied for role {:?}",
      principal.role.as_str()
    )))
  }
}

/// Self-scoped resources (own agenda, own mailbox): the owner or an admin.
pub fn ensure_self_or_admin(principal: &Principal, owner: Uuid) -> Result<()> {
  if principal.id == owner || principal.is_admin() {
    Ok(())
  } else {
    Err(Error::Forbidden("access denied".into()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn principal(role: Role) -> Principal {
    Principal { id: Uuid::new_v4(), email: "x@example.org".into(), role }
  }

  #[test]
  fn role_strings_are_exact() {
    assert_eq!("medecin".parse::<Role>().unwrap(), Role::Doctor);
    assert!("Medecin".parse::<Role>().is_err());
    assert!("doctor".parse::<Role>().is_err());
  }

  #[test]
  fn admin_does_not_inherit_doctor_capabilities() {
    let admin = principal(Role::Admin);
    assert!(authorize(&admin, Resource::Appointment, Action::Create).is_err());
    assert!(authorize(&admin, Resource::Agenda, Action::Read).is_ok());
  }

  #[test]
  fn patient_mutation_is_hr_or_admin() {
    assert!(authorize(&principal(Role::Hr), Resource::Patient, Action::Create).is_ok());
    assert!(authorize(&principal(Role::Nurse), Resource::Patient, Action::Update).is_err());
    assert!(authorize(&principal(Role::Hr), Resource::Patient, Action::Delete).is_err());
    assert!(authorize(&principal(Role::Nurse), Resource::Patient, Action::Read).is_ok());
  }

  #[test]
  fn catalog_is_readable_by_all_and_managed_by_admins() {
    for role in Role::ALL {
      assert!(authorize(&principal(role), Resource::Catalog, Action::Read).is_ok());
    }
    assert!(authorize(&principal(Role::Admin), Resource::Catalog, Action::Create).is_ok());
    assert!(authorize(&principal(Role::Doctor), Resource::Catalog, Action::Create).is_err());
  }

  #[test]
  fn self_scope() {
    let doctor = principal(Role::Doctor);
    assert!(ensure_self_or_admin(&doctor, doctor.id).is_ok());
    assert!(ensure_self_or_admin(&doctor, Uuid::new_v4()).is_err());
    assert!(ensure_self_or_admin(&principal(Role::Admin), Uuid::new_v4()).is_ok());
  }
}
