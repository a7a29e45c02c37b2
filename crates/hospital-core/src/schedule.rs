//! Booking rules: the conflict window, the daily slot grid, and the status
//! transitions an update may perform.
//!
//! The conflict rule compares the requested time against each existing
//! non-canceled appointment independently: two appointments for the same
//! practitioner conflict when their start times are less than
//! [`CONFLICT_WINDOW_MINUTES`] apart. Because every appointment occupies a
//! fixed-width window, this is the same as asking whether the two
//! `[start, start + window)` intervals overlap.

use chrono::{
  DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike as _,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  appointment::{Appointment, AppointmentStatus, AppointmentWrite},
};

pub const CONFLICT_WINDOW_MINUTES: i64 = 30;
pub const SLOT_MINUTES: i64 = 30;
/// First bookable mark of the day.
pub const DAY_OPENS: (u32, u32) = (8, 0);
/// The grid stops before this time; the last mark is 17:30.
pub const DAY_CLOSES: (u32, u32) = (18, 0);

// ─── Conflict window ─────────────────────────────────────────────────────────

/// Whether two start times fall within one conflict window of each other.
pub fn within_window(a: NaiveDateTime, b: NaiveDateTime) -> bool {
  (a - b).num_seconds().abs() < CONFLICT_WINDOW_MINUTES * 60
}

/// The first existing appointment that conflicts with `requested`.
///
/// `existing` must already be restricted to one practitioner's non-canceled
/// appointments, minus the appointment being rescheduled.
pub fn find_conflict<I>(existing: I, requested: NaiveDateTime) -> Option<Uuid>
where
  I: IntoIterator<Item = (Uuid, NaiveDateTime)>,
{
  existing
    .into_iter()
    .find(|(_, at)| within_window(*at, requested))
    .map(|(id, _)| id)
}

pub fn ensure_future(at: NaiveDateTime, now: NaiveDateTime) -> Result<()> {
  if at > now { Ok(()) } else { Err(Error::PastTimestamp(at)) }
}

// ─── Slot grid ───────────────────────────────────────────────────────────────

/// Every 30-minute mark between opening and closing time on `date`.
pub fn day_grid(date: NaiveDate) -> Vec<NaiveDateTime> {
  let opens = NaiveTime::from_hms_opt(DAY_OPENS.0, DAY_OPENS.1, 0)
    .unwrap_or(NaiveTime::MIN);
  let closes = NaiveTime::from_hms_opt(DAY_CLOSES.0, DAY_CLOSES.1, 0)
    .unwrap_or(NaiveTime::MIN);
  let step = TimeDelta::minutes(SLOT_MINUTES);

  let mut marks = Vec::new();
  let mut at = date.and_time(opens);
  let end = date.and_time(closes);
  while at < end {
    marks.push(at);
    at += step;
  }
  marks
}

/// Grid marks on `date` that could be booked without conflicting with any of
/// the `booked` start times.
pub fn available_slots(date: NaiveDate, booked: &[NaiveDateTime]) -> Vec<NaiveTime> {
  day_grid(date)
    .into_iter()
    .filter(|mark| !booked.iter().any(|b| within_window(*b, *mark)))
    .map(|mark| mark.time())
    .collect()
}

/// Render a slot the way clients display it (`HH:MM`).
pub fn format_slot(t: NaiveTime) -> String { t.format("%H:%M").to_string() }

// ─── Timestamps ──────────────────────────────────────────────────────────────

const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%d %H:%M",
];

/// Parse a client-supplied appointment time into practitioner-local wall
/// clock time, truncated to whole seconds.
///
/// RFC 3339 input keeps its wall-clock reading and drops the offset.
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
  let input = input.trim();
  let parsed = DateTime::parse_from_rfc3339(input)
    .map(|dt| dt.naive_local())
    .ok()
    .or_else(|| {
      NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(input, f).ok())
    })
    .ok_or_else(|| Error::Validation(format!("invalid date/time: {input:?}")))?;
  Ok(parsed.with_nanosecond(0).unwrap_or(parsed))
}

// ─── Updates ─────────────────────────────────────────────────────────────────

/// Fields a practitioner may change on an appointment. `None` keeps the
/// current value; `notes: Some(None)` clears the notes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentChanges {
  pub scheduled_at: Option<NaiveDateTime>,
  pub status:       Option<AppointmentStatus>,
  pub notes:        Option<Option<String>>,
}

/// The patient-visible consequence of an update; at most one per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
  Rescheduled(NaiveDateTime),
  Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
  pub write: AppointmentWrite,
  pub event: Option<AppointmentEvent>,
}

/// Validate `changes` against `current` and work out what to persist and
/// which notice to send.
///
/// A moving timestamp must lie in the future and is re-checked for
/// conflicts. A transition to canceled takes precedence over a simultaneous
/// reschedule for notification purposes.
pub fn plan_update(
  current: &Appointment,
  changes: AppointmentChanges,
  now: NaiveDateTime,
) -> Result<UpdatePlan> {
  let new_time = changes
    .scheduled_at
    .filter(|at| *at != current.scheduled_at);
  let status = changes.status.unwrap_or(current.status);

  if current.status.is_terminal() && (new_time.is_some() || status != current.status) {
    return Err(Error::InvalidTransition {
      from: current.status,
      to:   status,
    });
  }

  if let Some(at) = new_time {
    ensure_future(at, now)?;
  }

  let event = if status == AppointmentStatus::Canceled
    && current.status != AppointmentStatus::Canceled
  {
    Some(AppointmentEvent::Canceled)
  } else {
    new_time.map(AppointmentEvent::Rescheduled)
  };

  let write = AppointmentWrite {
    expected:        current.status,
    scheduled_at:    new_time.unwrap_or(current.scheduled_at),
    status,
    notes:           match changes.notes {
      Some(notes) => notes,
      None => current.notes.clone(),
    },
    check_conflicts: new_time.is_some() && status.blocks_calendar(),
  };

  Ok(UpdatePlan { write, event })
}

/// Soft-cancel: only a scheduled appointment can be canceled.
pub fn plan_cancel(current: &Appointment) -> Result<AppointmentWrite> {
  if current.status.is_terminal() {
    return Err(Error::InvalidTransition {
      from: current.status,
      to:   AppointmentStatus::Canceled,
    });
  }
  Ok(AppointmentWrite {
    expected:        current.status,
    scheduled_at:    current.scheduled_at,
    status:          AppointmentStatus::Canceled,
    notes:           current.notes.clone(),
    check_conflicts: false,
  })
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn at(s: &str) -> NaiveDateTime { parse_timestamp(s).unwrap() }

  fn appointment(when: &str, status: AppointmentStatus) -> Appointment {
    Appointment {
      appointment_id:  Uuid::new_v4(),
      patient_id:      Uuid::new_v4(),
      practitioner_id: Uuid::new_v4(),
      scheduled_at:    at(when),
      notes:           Some("first visit".into()),
      status,
      created_at:      Utc::now(),
    }
  }

  fn now() -> NaiveDateTime { at("2030-01-01T00:00") }

  #[test]
  fn window_is_strictly_less_than_thirty_minutes() {
    let base = at("2099-06-01T09:00");
    assert!(within_window(base, at("2099-06-01T09:20")));
    assert!(within_window(at("2099-06-01T08:31"), base));
    assert!(!within_window(base, at("2099-06-01T09:30")));
    assert!(!within_window(base, at("2099-06-01T09:35")));
    assert!(!within_window(base, at("2099-06-01T08:30")));
  }

  #[test]
  fn find_conflict_returns_the_clashing_row() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let existing = vec![(a, at("2099-06-01T09:00")), (b, at("2099-06-01T11:00"))];
    assert_eq!(find_conflict(existing.clone(), at("2099-06-01T10:45")), Some(b));
    assert_eq!(find_conflict(existing, at("2099-06-01T10:00")), None);
  }

  #[test]
  fn past_and_present_are_rejected() {
    assert!(ensure_future(now(), now()).is_err());
    assert!(ensure_future(now() - TimeDelta::minutes(1), now()).is_err());
    assert!(ensure_future(now() + TimeDelta::minutes(1), now()).is_ok());
  }

  #[test]
  fn grid_spans_eight_to_half_past_five() {
    let date = NaiveDate::from_ymd_opt(2099, 6, 1).unwrap();
    let grid = day_grid(date);
    assert_eq!(grid.len(), 20);
    assert_eq!(format_slot(grid[0].time()), "08:00");
    assert_eq!(format_slot(grid[19].time()), "17:30");
  }

  #[test]
  fn grid_aligned_booking_blocks_only_its_own_mark() {
    let date = NaiveDate::from_ymd_opt(2099, 6, 1).unwrap();
    let free = available_slots(date, &[at("2099-06-01T09:00")]);
    let free: Vec<_> = free.into_iter().map(format_slot).collect();
    assert_eq!(free.len(), 19);
    assert!(!free.contains(&"09:00".to_string()));
    assert!(free.contains(&"08:30".to_string()));
    assert!(free.contains(&"09:30".to_string()));
  }

  #[test]
  fn off_grid_booking_blocks_every_overlapped_mark() {
    let date = NaiveDate::from_ymd_opt(2099, 6, 1).unwrap();
    let free: Vec<_> = available_slots(date, &[at("2099-06-01T09:10")])
      .into_iter()
      .map(format_slot)
      .collect();
    assert!(!free.contains(&"09:00".to_string()));
    assert!(!free.contains(&"09:30".to_string()));
    assert!(free.contains(&"08:30".to_string()));
    assert!(free.contains(&"10:00".to_string()));
  }

  #[test]
  fn parses_common_timestamp_shapes() {
    let expected = NaiveDate::from_ymd_opt(2099, 6, 1)
      .unwrap()
      .and_hms_opt(9, 0, 0)
      .unwrap();
    assert_eq!(at("2099-06-01T09:00"), expected);
    assert_eq!(at("2099-06-01 09:00:00"), expected);
    assert_eq!(at("2099-06-01T09:00:00.250"), expected);
    assert_eq!(at("2099-06-01T09:00:00+02:00"), expected);
    assert!(parse_timestamp("tomorrow at nine").is_err());
  }

  #[test]
  fn reschedule_emits_reschedule_event() {
    let current = appointment("2099-06-01T09:00", AppointmentStatus::Scheduled);
    let changes = AppointmentChanges {
      scheduled_at: Some(at("2099-06-02T10:00")),
      ..Default::default()
    };
    let plan = plan_update(&current, changes, now()).unwrap();
    assert_eq!(plan.event, Some(AppointmentEvent::Rescheduled(at("2099-06-02T10:00"))));
    assert!(plan.write.check_conflicts);
    assert_eq!(plan.write.notes.as_deref(), Some("first visit"));
  }

  #[test]
  fn same_timestamp_is_not_a_reschedule() {
    let current = appointment("2099-06-01T09:00", AppointmentStatus::Scheduled);
    let changes = AppointmentChanges {
      scheduled_at: Some(current.scheduled_at),
      notes: Some(None),
      ..Default::default()
    };
    let plan = plan_update(&current, changes, now()).unwrap();
    assert_eq!(plan.event, None);
    assert!(!plan.write.check_conflicts);
    assert_eq!(plan.write.notes, None);
  }

  #[test]
  fn cancel_wins_over_simultaneous_reschedule() {
    let current = appointment("2099-06-01T09:00", AppointmentStatus::Scheduled);
    let changes = AppointmentChanges {
      scheduled_at: Some(at("2099-06-03T09:00")),
      status:       Some(AppointmentStatus::Canceled),
      notes:        None,
    };
    let plan = plan_update(&current, changes, now()).unwrap();
    assert_eq!(plan.event, Some(AppointmentEvent::Canceled));
    assert!(!plan.write.check_conflicts);
  }

  #[test]
  fn completing_sends_nothing() {
    let current = appointment("2099-06-01T09:00", AppointmentStatus::Scheduled);
    let changes = AppointmentChanges {
      status: Some(AppointmentStatus::Completed),
      ..Default::default()
    };
    let plan = plan_update(&current, changes, now()).unwrap();
    assert_eq!(plan.event, None);
    assert_eq!(plan.write.status, AppointmentStatus::Completed);
  }

  #[test]
  fn rescheduling_into_the_past_is_rejected() {
    let current = appointment("2099-06-01T09:00", AppointmentStatus::Scheduled);
    let changes = AppointmentChanges {
      scheduled_at: Some(at("2001-01-01T09:00")),
      ..Default::default()
    };
    assert!(matches!(
      plan_update(&current, changes, now()),
      Err(Error::PastTimestamp(_))
    ));
  }

  #[test]
  fn terminal_states_are_final() {
    for status in [AppointmentStatus::Completed, AppointmentStatus::Canceled] {
      let current = appointment("2099-06-01T09:00", status);
      let reopen = AppointmentChanges {
        status: Some(AppointmentStatus::Scheduled),
        ..Default::default()
      };
      assert!(matches!(
        plan_update(&current, reopen, now()),
        Err(Error::InvalidTransition { .. })
      ));
      assert!(plan_cancel(&current).is_err());

      let notes_only = AppointmentChanges {
        notes: Some(Some("follow-up done".into())),
        ..Default::default()
      };
      assert!(plan_update(&current, notes_only, now()).is_ok());
    }
  }
}
