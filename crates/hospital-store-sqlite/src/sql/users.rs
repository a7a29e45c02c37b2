use chrono::{Datelike as _, Months, NaiveDate, Utc};
use hospital_core::{
  access::Role,
  user::{
    MonthlyCount, NewUser, PractitionerStats, Statistics, User, UserChanges,
    UserCredentials,
  },
};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{RawUser, USER_COLUMNS, encode_dt, encode_uuid},
  sql::{exists, immediate},
};

fn email_in_use(conn: &Connection, email: &str, except: Option<&str>) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND user_id IS NOT ?2)",
    params![email, except],
    |r| r.get(0),
  )
}

pub fn fetch(conn: &Connection, id: &str) -> Result<Option<User>> {
  let raw = conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1"),
      [id],
      RawUser::from_row,
    )
    .optional()?;
  raw.map(RawUser::into_user).transpose()
}

pub fn create(conn: &mut Connection, input: NewUser) -> Result<User> {
  let tx = immediate(conn)?;
  if email_in_use(&tx, &input.email, None)? {
    return Err(hospital_core::Error::EmailTaken(input.email).into());
  }

  let user = User {
    user_id:     Uuid::new_v4(),
    family_name: input.family_name,
    given_name:  input.given_name,
    email:       input.email,
    role:        input.role,
    created_at:  Utc::now(),
  };
  tx.execute(
    "INSERT INTO users (user_id, family_name, given_name, email, password_hash, role, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(user.user_id),
      user.family_name,
      user.given_name,
      user.email,
      input.password_hash,
      user.role.as_str(),
      encode_dt(user.created_at),
    ],
  )?;
  tx.commit()?;
  Ok(user)
}

pub fn find_credentials(conn: &Connection, email: &str) -> Result<Option<UserCredentials>> {
  let row = conn
    .query_row(
      &format!("SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.email = ?1"),
      [email],
      |row| Ok((RawUser::from_row(row)?, row.get::<_, String>(6)?)),
    )
    .optional()?;
  row
    .map(|(raw, password_hash)| {
      Ok(UserCredentials { user: raw.into_user()?, password_hash })
    })
    .transpose()
}

pub fn list(conn: &Connection, role: Option<Role>) -> Result<Vec<User>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {USER_COLUMNS} FROM users u
     WHERE ?1 IS NULL OR u.role = ?1
     ORDER BY u.created_at DESC, u.rowid DESC"
  ))?;
  let raws = stmt
    .query_map([role.map(Role::as_str)], RawUser::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawUser::into_user).collect()
}

pub fn update(conn: &mut Connection, id: Uuid, changes: UserChanges) -> Result<User> {
  let id_str = encode_uuid(id);
  let tx = immediate(conn)?;
  let Some(mut user) = fetch(&tx, &id_str)? else {
    return Err(hospital_core::Error::UserNotFound(id).into());
  };

  if let Some(email) = &changes.email
    && email_in_use(&tx, email, Some(&id_str))?
  {
    return Err(hospital_core::Error::EmailTaken(email.clone()).into());
  }

  if let Some(v) = changes.family_name {
    user.family_name = v;
  }
  if let Some(v) = changes.given_name {
    user.given_name = v;
  }
  if let Some(v) = changes.email {
    user.email = v;
  }
  if let Some(v) = changes.role {
    user.role = v;
  }

  tx.execute(
    "UPDATE users SET family_name = ?2, given_name = ?3, email = ?4, role = ?5,
       password_hash = COALESCE(?6, password_hash)
     WHERE user_id = ?1",
    params![
      id_str,
      user.family_name,
      user.given_name,
      user.email,
      user.role.as_str(),
      changes.password_hash,
    ],
  )?;
  tx.commit()?;
  Ok(user)
}

pub fn delete(conn: &mut Connection, id: Uuid) -> Result<()> {
  let id_str = encode_uuid(id);
  let tx = immediate(conn)?;
  if !exists(&tx, "users", "user_id", &id_str)? {
    return Err(hospital_core::Error::UserNotFound(id).into());
  }

  let owns_records: bool = tx.query_row(
    "SELECT EXISTS(SELECT 1 FROM treatments WHERE practitioner_id = ?1)
         OR EXISTS(SELECT 1 FROM appointments WHERE practitioner_id = ?1)",
    [&id_str],
    |r| r.get(0),
  )?;
  if owns_records {
    return Err(hospital_core::Error::PractitionerHasRecords(id).into());
  }

  tx.execute(
    "DELETE FROM messages WHERE sender_id = ?1 OR recipient_id = ?1",
    [&id_str],
  )?;
  tx.execute("DELETE FROM users WHERE user_id = ?1", [&id_str])?;
  tx.commit()?;
  Ok(())
}

pub fn practitioner_stats(conn: &Connection, id: Uuid) -> Result<PractitionerStats> {
  let id_str = encode_uuid(id);
  let stats = conn.query_row(
    "SELECT
       (SELECT COUNT(*) FROM (
          SELECT patient_id FROM treatments   WHERE practitioner_id = ?1
          UNION
          SELECT patient_id FROM appointments WHERE practitioner_id = ?1)),
       (SELECT COUNT(*) FROM treatments   WHERE practitioner_id = ?1),
       (SELECT COUNT(*) FROM appointments WHERE practitioner_id = ?1)",
    [&id_str],
    |r| {
      Ok(PractitionerStats {
        patients:     r.get(0)?,
        treatments:   r.get(1)?,
        appointments: r.get(2)?,
      })
    },
  )?;
  Ok(stats)
}

/// First day of each of the six months ending with `today`'s, newest first.
fn last_six_months(today: NaiveDate) -> Vec<NaiveDate> {
  let first = today.with_day(1).unwrap_or(today);
  (0..6)
    .filter_map(|i| first.checked_sub_months(Months::new(i)))
    .collect()
}

pub fn statistics(conn: &Connection, today: NaiveDate) -> Result<Statistics> {
  let mut stats = Statistics::default();

  let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role")?;
  let by_role = stmt
    .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, u64>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for (role, count) in by_role {
    match role.parse::<Role>() {
      Ok(Role::Doctor) => stats.doctors = count,
      Ok(Role::Hr) => stats.hr_staff = count,
      Ok(Role::Nurse) => stats.nurses = count,
      Ok(Role::Admin) => stats.admins = count,
      Err(_) => {}
    }
  }

  (stats.patients, stats.treatments, stats.appointments, stats.messages) = conn
    .query_row(
      "SELECT (SELECT COUNT(*) FROM patients),
              (SELECT COUNT(*) FROM treatments),
              (SELECT COUNT(*) FROM appointments),
              (SELECT COUNT(*) FROM messages)",
      [],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
    )?;

  let months = last_six_months(today);
  let since = months.last().map(|d| d.format("%Y-%m").to_string());
  let mut stmt = conn.prepare(
    "SELECT substr(created_at, 1, 7) AS month, COUNT(*)
     FROM patients WHERE substr(created_at, 1, 7) >= ?1
     GROUP BY month",
  )?;
  let counts = stmt
    .query_map([since], |r| Ok((r.get::<_, String>(0)?, r.get::<_, u64>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  stats.monthly_patients = months
    .into_iter()
    .map(|d| {
      let month = d.format("%Y-%m").to_string();
      let count = counts
        .iter()
        .find(|(m, _)| *m == month)
        .map_or(0, |(_, c)| *c);
      MonthlyCount { month, count }
    })
    .collect();

  Ok(stats)
}
