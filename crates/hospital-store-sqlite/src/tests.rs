//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use hospital_core::{
  Error as CoreError,
  access::Role,
  appointment::{AgendaQuery, AppointmentStatus, AppointmentWrite, NewAppointment},
  message::{MessageCategory, NewMessage},
  notification::{NewNotification, OutboxStatus},
  patient::{NewPatient, PatientChanges},
  schedule::parse_timestamp,
  store::{HospitalStore, Recipient, StoreError as _},
  treatment::{Medication, MedicationEdit, MedicationList, NewCatalogMedication, NewTreatment},
  user::{NewUser, User, UserChanges},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(s: &str) -> NaiveDateTime { parse_timestamp(s).unwrap() }

async fn user(s: &SqliteStore, role: Role, given: &str) -> User {
  s.create_user(NewUser {
    family_name:   "Martin".into(),
    given_name:    given.into(),
    email:         format!("{given}.{}@hospital.test", Uuid::new_v4()),
    password_hash: "$argon2id$stub".into(),
    role,
  })
  .await
  .unwrap()
}

async fn patient(s: &SqliteStore, family: &str, given: &str) -> Uuid {
  s.create_patient(NewPatient {
    family_name:       family.into(),
    given_name:        given.into(),
    age:               42,
    weight_kg:         Some(70.0),
    height_cm:         Some(175.0),
    email:             Some(format!("{given}@mail.test")),
    current_treatment: None,
  })
  .await
  .unwrap()
  .patient_id
}

fn notice(sender: Uuid, recipient: Uuid) -> NewNotification {
  NewNotification {
    sender_id:    sender,
    recipient_id: recipient,
    subject:      "Your appointment".into(),
    body:         "New appointment".into(),
    category:     MessageCategory::Appointment,
  }
}

fn booking(patient_id: Uuid, practitioner_id: Uuid, when: &str) -> NewAppointment {
  NewAppointment {
    patient_id,
    practitioner_id,
    scheduled_at: at(when),
    notes: None,
  }
}

fn is_domain(err: &Error, pred: impl Fn(&CoreError) -> bool) -> bool {
  err.domain().is_some_and(pred)
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_find_credentials() {
  let s = store().await;
  let created = user(&s, Role::Doctor, "alice").await;

  let creds = s.find_credentials(created.email.clone()).await.unwrap().unwrap();
  assert_eq!(creds.user, created);
  assert_eq!(creds.password_hash, "$argon2id$stub");

  assert!(s.find_credentials("nobody@x.test".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let s = store().await;
  let first = user(&s, Role::Hr, "bob").await;
  let err = s
    .create_user(NewUser {
      family_name:   "Other".into(),
      given_name:    "Bob".into(),
      email:         first.email.clone(),
      password_hash: "x".into(),
      role:          Role::Nurse,
    })
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::EmailTaken(_))));

  let second = user(&s, Role::Hr, "carol").await;
  let err = s
    .update_user(second.user_id, UserChanges {
      email: Some(first.email.clone()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::EmailTaken(_))));

  // Re-saving one's own address is fine.
  let same = s
    .update_user(second.user_id, UserChanges {
      email: Some(second.email.clone()),
      given_name: Some("Caroline".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(same.given_name, "Caroline");
}

#[tokio::test]
async fn list_users_by_role_newest_first() {
  let s = store().await;
  let d1 = user(&s, Role::Doctor, "d1").await;
  user(&s, Role::Nurse, "n1").await;
  let d2 = user(&s, Role::Doctor, "d2").await;

  let doctors = s.list_users(Some(Role::Doctor)).await.unwrap();
  assert_eq!(doctors.iter().map(|u| u.user_id).collect::<Vec<_>>(), [
    d2.user_id, d1.user_id
  ]);
  assert_eq!(s.list_users(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn doctor_with_records_cannot_be_deleted() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "house").await;
  let p = patient(&s, "Durand", "Claire").await;
  s.book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, p))
    .await
    .unwrap();

  let err = s.delete_user(doctor.user_id).await.unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::PractitionerHasRecords(_))));
  assert!(s.get_user(doctor.user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_a_user_removes_their_messages() {
  let s = store().await;
  let a = user(&s, Role::Nurse, "a").await;
  let b = user(&s, Role::Hr, "b").await;
  let sent = s
    .send_message(NewMessage {
      sender_id:    a.user_id,
      recipient_id: b.user_id,
      body:         "hi".into(),
      category:     MessageCategory::General,
    })
    .await
    .unwrap();

  s.delete_user(a.user_id).await.unwrap();
  assert!(s.get_user(a.user_id).await.unwrap().is_none());
  assert!(s.get_message(sent.message_id).await.unwrap().is_none());

  let err = s.delete_user(a.user_id).await.unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::UserNotFound(_))));
}

#[tokio::test]
async fn statistics_count_everything() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  user(&s, Role::Admin, "root").await;
  let p = patient(&s, "Roux", "Anna").await;
  patient(&s, "Blanc", "Léo").await;
  s.book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, p))
    .await
    .unwrap();

  let today = Utc::now().date_naive();
  let stats = s.statistics(today).await.unwrap();
  assert_eq!(stats.doctors, 1);
  assert_eq!(stats.admins, 1);
  assert_eq!(stats.nurses, 0);
  assert_eq!(stats.patients, 2);
  assert_eq!(stats.appointments, 1);
  assert_eq!(stats.monthly_patients.len(), 6);
  assert_eq!(stats.monthly_patients[0].month, today.format("%Y-%m").to_string());
  assert_eq!(stats.monthly_patients[0].count, 2);

  let doc = s.practitioner_stats(doctor.user_id).await.unwrap();
  assert_eq!((doc.patients, doc.treatments, doc.appointments), (1, 0, 1));
}

// ─── Patients ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_patients_by_either_name() {
  let s = store().await;
  let durand = patient(&s, "Durand", "Claire").await;
  let petit = patient(&s, "Petit", "Paul").await;

  let all = s.list_patients(None).await.unwrap();
  assert_eq!(all.iter().map(|p| p.patient_id).collect::<Vec<_>>(), [petit, durand]);

  let hits = s.list_patients(Some("aul".into())).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].patient_id, petit);

  assert_eq!(s.list_patients(Some("   ".into())).await.unwrap().len(), 2);
}

#[tokio::test]
async fn update_patient_keeps_unset_fields() {
  let s = store().await;
  let id = patient(&s, "Durand", "Claire").await;
  let updated = s
    .update_patient(id, PatientChanges { age: Some(43), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(updated.age, 43);
  assert_eq!(updated.family_name, "Durand");
  assert_eq!(updated.weight_kg, Some(70.0));

  let err = s
    .update_patient(Uuid::new_v4(), PatientChanges::default())
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::PatientNotFound(_))));
}

#[tokio::test]
async fn practitioner_panel_is_sorted_union() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let other = user(&s, Role::Doctor, "o").await;
  let zola = patient(&s, "Zola", "Emile").await;
  let abel = patient(&s, "Abel", "Marc").await;
  let unrelated = patient(&s, "Moreau", "Ines").await;

  s.book_appointment(booking(zola, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, zola))
    .await
    .unwrap();
  let meds = MedicationList::new(vec![Medication::new("Aspirin", "100mg").unwrap()]).unwrap();
  s.record_treatment(
    NewTreatment {
      patient_id:      abel,
      practitioner_id: doctor.user_id,
      medications:     meds,
      notes:           None,
    },
    notice(doctor.user_id, abel),
  )
  .await
  .unwrap();
  s.book_appointment(
    booking(unrelated, other.user_id, "2099-06-01T09:00"),
    notice(other.user_id, unrelated),
  )
  .await
  .unwrap();

  let panel = s.list_practitioner_patients(doctor.user_id).await.unwrap();
  assert_eq!(panel.iter().map(|p| p.patient_id).collect::<Vec<_>>(), [abel, zola]);
}

#[tokio::test]
async fn deleting_a_patient_cascades() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  let appt = s
    .book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, p))
    .await
    .unwrap();

  s.delete_patient(p).await.unwrap();
  assert!(s.get_patient(p).await.unwrap().is_none());
  assert!(s.get_appointment(appt.appointment_id).await.unwrap().is_none());
  assert!(s.list_treatments(p).await.unwrap().is_empty());
}

// ─── Appointments ────────────────────────────────────────────────────────────

#[tokio::test]
async fn conflict_window_scenario() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  let n = || notice(doctor.user_id, p);

  let first = s
    .book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), n())
    .await
    .unwrap();
  assert_eq!(first.status, AppointmentStatus::Scheduled);

  let err = s
    .book_appointment(booking(p, doctor.user_id, "2099-06-01T09:20"), n())
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| {
    matches!(e, CoreError::SlotTaken(id) if *id == first.appointment_id)
  }));

  s.book_appointment(booking(p, doctor.user_id, "2099-06-01T09:35"), n())
    .await
    .unwrap();

  // Another practitioner's calendar is independent.
  let other = user(&s, Role::Doctor, "o").await;
  s.book_appointment(booking(p, other.user_id, "2099-06-01T09:10"), notice(other.user_id, p))
    .await
    .unwrap();

  // Rejected booking enqueued nothing.
  assert_eq!(s.pending_notifications(100, 5).await.unwrap().len(), 3);
}

#[tokio::test]
async fn canceled_appointments_free_their_slot() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  let first = s
    .book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, p))
    .await
    .unwrap();

  s.update_appointment(
    first.appointment_id,
    AppointmentWrite {
      expected:        AppointmentStatus::Scheduled,
      scheduled_at:    first.scheduled_at,
      status:          AppointmentStatus::Canceled,
      notes:           None,
      check_conflicts: false,
    },
    None,
  )
  .await
  .unwrap();

  s.book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, p))
    .await
    .unwrap();
}

#[tokio::test]
async fn stale_status_writes_are_refused() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  let booked = s
    .book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, p))
    .await
    .unwrap();

  let planned = |status| AppointmentWrite {
    expected:        AppointmentStatus::Scheduled,
    scheduled_at:    booked.scheduled_at,
    status,
    notes:           None,
    check_conflicts: false,
  };
  let cancel = planned(AppointmentStatus::Canceled);
  s.update_appointment(booked.appointment_id, planned(AppointmentStatus::Completed), None)
    .await
    .unwrap();

  let err = s
    .update_appointment(booked.appointment_id, cancel, Some(notice(doctor.user_id, p)))
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::InvalidTransition {
    from: AppointmentStatus::Completed,
    to:   AppointmentStatus::Canceled,
  })));

  let stored = s.get_appointment(booked.appointment_id).await.unwrap().unwrap();
  assert_eq!(stored.status, AppointmentStatus::Completed);
  assert_eq!(s.pending_notifications(100, 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn booking_requires_an_existing_patient() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let ghost = Uuid::new_v4();
  let err = s
    .book_appointment(booking(ghost, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, ghost))
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::PatientNotFound(_))));
}

#[tokio::test]
async fn reschedule_ignores_itself_but_not_neighbours() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  let nine = s
    .book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, p))
    .await
    .unwrap();
  s.book_appointment(booking(p, doctor.user_id, "2099-06-01T10:00"), notice(doctor.user_id, p))
    .await
    .unwrap();

  let write = |when: &str| AppointmentWrite {
    expected:        AppointmentStatus::Scheduled,
    scheduled_at:    at(when),
    status:          AppointmentStatus::Scheduled,
    notes:           Some("moved".into()),
    check_conflicts: true,
  };

  let moved = s
    .update_appointment(nine.appointment_id, write("2099-06-01T09:15"), Some(notice(doctor.user_id, p)))
    .await
    .unwrap();
  assert_eq!(moved.scheduled_at, at("2099-06-01T09:15"));
  assert_eq!(moved.notes.as_deref(), Some("moved"));

  let err = s
    .update_appointment(nine.appointment_id, write("2099-06-01T09:45"), None)
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::SlotTaken(_))));

  let stored = s.get_appointment(nine.appointment_id).await.unwrap().unwrap();
  assert_eq!(stored.scheduled_at, at("2099-06-01T09:15"));
  assert_eq!(s.pending_notifications(100, 5).await.unwrap().len(), 3);
}

#[tokio::test]
async fn concurrent_bookings_cannot_both_win() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;

  let tasks: Vec<_> = ["2099-06-01T09:00", "2099-06-01T09:10", "2099-06-01T09:20"]
    .into_iter()
    .map(|when| {
      let s = s.clone();
      let input = booking(p, doctor.user_id, when);
      let n = notice(doctor.user_id, p);
      tokio::spawn(async move { s.book_appointment(input, n).await })
    })
    .collect();

  let mut won = 0;
  for task in tasks {
    if task.await.unwrap().is_ok() {
      won += 1;
    }
  }
  assert_eq!(won, 1);
}

#[tokio::test]
async fn agenda_filters_and_orders() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  for when in ["2099-06-02T14:00", "2099-06-01T11:00", "2099-06-01T08:00"] {
    s.book_appointment(booking(p, doctor.user_id, when), notice(doctor.user_id, p))
      .await
      .unwrap();
  }

  let all = s.list_agenda(AgendaQuery::new(doctor.user_id)).await.unwrap();
  let times: Vec<_> = all.iter().map(|v| v.appointment.scheduled_at).collect();
  assert_eq!(times, [at("2099-06-01T08:00"), at("2099-06-01T11:00"), at("2099-06-02T14:00")]);
  assert_eq!(all[0].patient_name.as_deref(), Some("Claire Durand"));
  assert_eq!(all[0].practitioner_name.as_deref(), Some("d Martin"));

  let mut query = AgendaQuery::new(doctor.user_id);
  query.date = NaiveDate::from_ymd_opt(2099, 6, 1);
  assert_eq!(s.list_agenda(query.clone()).await.unwrap().len(), 2);
  query.status = Some(AppointmentStatus::Completed);
  assert!(s.list_agenda(query).await.unwrap().is_empty());

  let history = s.list_patient_appointments(p).await.unwrap();
  assert_eq!(history[0].appointment.scheduled_at, at("2099-06-02T14:00"));
}

#[tokio::test]
async fn booked_times_reach_across_midnight() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  for when in ["2099-05-31T23:45", "2099-06-01T09:00", "2099-06-02T09:00"] {
    s.book_appointment(booking(p, doctor.user_id, when), notice(doctor.user_id, p))
      .await
      .unwrap();
  }
  let date = NaiveDate::from_ymd_opt(2099, 6, 1).unwrap();
  let booked = s.booked_times(doctor.user_id, date).await.unwrap();
  assert_eq!(booked, [at("2099-05-31T23:45"), at("2099-06-01T09:00")]);
}

// ─── Treatments ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn treatments_are_snapshots_newest_first() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  assert!(s.current_treatment(p).await.unwrap().is_none());

  let first = MedicationList::new(vec![Medication::new("Aspirin", "100mg").unwrap()]).unwrap();
  let second = first
    .with_added(Medication::new("Zinc", "5mg").unwrap())
    .unwrap();
  for meds in [first, second.clone()] {
    s.record_treatment(
      NewTreatment {
        patient_id:      p,
        practitioner_id: doctor.user_id,
        medications:     meds,
        notes:           Some("with food".into()),
      },
      notice(doctor.user_id, p),
    )
    .await
    .unwrap();
  }

  let current = s.current_treatment(p).await.unwrap().unwrap();
  assert_eq!(current.medications, second);

  let history = s.list_treatments(p).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].treatment.medications.len(), 2);
  assert_eq!(history[0].practitioner_name.as_deref(), Some("d Martin"));
}

#[tokio::test]
async fn concurrent_medication_edits_all_land() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;

  let tasks: Vec<_> = [("Aspirin", "100mg"), ("Zinc", "5mg"), ("Iron", "20mg")]
    .into_iter()
    .map(|(name, dosage)| {
      let s = s.clone();
      let edit = MedicationEdit::Add(Medication::new(name, dosage).unwrap());
      let n = notice(doctor.user_id, p);
      tokio::spawn(async move { s.edit_medications(p, doctor.user_id, edit, n).await })
    })
    .collect();
  for task in tasks {
    task.await.unwrap().unwrap();
  }

  let current = s.current_treatment(p).await.unwrap().unwrap();
  assert_eq!(current.medications.len(), 3);
  for name in ["Aspirin", "Zinc", "Iron"] {
    assert!(current.medications.contains(name));
  }
  assert_eq!(s.list_treatments(p).await.unwrap().len(), 3);
}

#[tokio::test]
async fn medication_edits_check_the_latest_snapshot() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  let remove = |name: &str| MedicationEdit::Remove(name.into());

  let err = s
    .edit_medications(p, doctor.user_id, remove("Aspirin"), notice(doctor.user_id, p))
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::NoTreatment(_))));

  let ghost = Uuid::new_v4();
  let aspirin = MedicationEdit::Add(Medication::new("Aspirin", "100mg").unwrap());
  let err = s
    .edit_medications(ghost, doctor.user_id, aspirin.clone(), notice(doctor.user_id, ghost))
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::PatientNotFound(_))));

  s.edit_medications(p, doctor.user_id, aspirin.clone(), notice(doctor.user_id, p))
    .await
    .unwrap();
  let err = s
    .edit_medications(p, doctor.user_id, aspirin, notice(doctor.user_id, p))
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::DuplicateMedication(_))));

  let emptied = s
    .edit_medications(p, doctor.user_id, remove("aspirin"), notice(doctor.user_id, p))
    .await
    .unwrap();
  assert!(emptied.medications.is_empty());

  // Rejected edits queued nothing.
  assert_eq!(s.pending_notifications(100, 5).await.unwrap().len(), 2);
}

#[tokio::test]
async fn catalog_is_alphabetical_and_unique() {
  let s = store().await;
  assert!(s.list_catalog().await.unwrap().is_empty());

  let entry = |name: &str, dosage: Option<&str>| NewCatalogMedication {
    name:           name.into(),
    default_dosage: dosage.map(str::to_owned),
    description:    Some("  ".into()),
  };
  s.add_to_catalog(entry(" Zinc ", Some("5mg"))).await.unwrap();
  s.add_to_catalog(entry("aspirin", Some("100mg"))).await.unwrap();
  s.add_to_catalog(entry("Ibuprofen", None)).await.unwrap();

  let err = s.add_to_catalog(entry("ASPIRIN", None)).await.unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::CatalogDuplicate(_))));
  let err = s.add_to_catalog(entry("   ", None)).await.unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::Validation(_))));

  let catalog = s.list_catalog().await.unwrap();
  let names: Vec<&str> = catalog.iter().map(|m| m.name.as_str()).collect();
  assert_eq!(names, ["aspirin", "Ibuprofen", "Zinc"]);
  assert_eq!(catalog[2].default_dosage.as_deref(), Some("5mg"));
  assert!(catalog[2].description.is_none());
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mailbox_reads_and_marks() {
  let s = store().await;
  let a = user(&s, Role::Nurse, "a").await;
  let b = user(&s, Role::Doctor, "b").await;
  let send = |from: Uuid, to: Uuid| NewMessage {
    sender_id:    from,
    recipient_id: to,
    body:         "ping".into(),
    category:     MessageCategory::General,
  };
  let m1 = s.send_message(send(a.user_id, b.user_id)).await.unwrap();
  s.send_message(send(a.user_id, b.user_id)).await.unwrap();
  s.send_message(send(b.user_id, a.user_id)).await.unwrap();

  let views = s.messages_for(b.user_id).await.unwrap();
  assert_eq!(views.len(), 3);
  assert_eq!(views[0].message.sender_id, b.user_id);
  assert_eq!(views[1].sender_role, Some(Role::Nurse));

  assert_eq!(s.unread_for(b.user_id).await.unwrap().len(), 2);
  assert!(s.mark_read(m1.message_id).await.unwrap().read);
  assert_eq!(s.mark_all_read(b.user_id).await.unwrap(), 1);
  assert!(s.unread_for(b.user_id).await.unwrap().is_empty());

  s.delete_message(m1.message_id).await.unwrap();
  let err = s.delete_message(m1.message_id).await.unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::MessageNotFound(_))));
}

#[tokio::test]
async fn messages_go_to_users_only() {
  let s = store().await;
  let a = user(&s, Role::Nurse, "a").await;
  let p = patient(&s, "Durand", "Claire").await;
  let err = s
    .send_message(NewMessage {
      sender_id:    a.user_id,
      recipient_id: p,
      body:         "hello".into(),
      category:     MessageCategory::General,
    })
    .await
    .unwrap_err();
  assert!(is_domain(&err, |e| matches!(e, CoreError::UserNotFound(_))));
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn outbox_retries_then_gives_up() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let p = patient(&s, "Durand", "Claire").await;
  s.book_appointment(booking(p, doctor.user_id, "2099-06-01T09:00"), notice(doctor.user_id, p))
    .await
    .unwrap();

  let entry = s.pending_notifications(10, 2).await.unwrap().remove(0);
  assert_eq!(entry.status, OutboxStatus::Pending);
  assert_eq!(entry.recipient_id, p);
  assert!(matches!(
    s.resolve_recipient(entry.recipient_id).await.unwrap(),
    Some(Recipient::Patient(_))
  ));

  s.mark_notification_failed(entry.notification_id, "smtp down".into(), false)
    .await
    .unwrap();
  let retry = s.pending_notifications(10, 2).await.unwrap().remove(0);
  assert_eq!(retry.attempts, 1);
  assert_eq!(retry.last_error.as_deref(), Some("smtp down"));

  s.mark_notification_failed(entry.notification_id, "smtp down".into(), true)
    .await
    .unwrap();
  assert!(s.pending_notifications(10, 2).await.unwrap().is_empty());
}

#[tokio::test]
async fn outbox_delivers_to_staff_as_message() {
  let s = store().await;
  let doctor = user(&s, Role::Doctor, "d").await;
  let nurse = user(&s, Role::Nurse, "n").await;
  let p = patient(&s, "Durand", "Claire").await;

  // A notice addressed to a staff member instead of the patient.
  s.book_appointment(
    booking(p, doctor.user_id, "2099-06-01T09:00"),
    notice(doctor.user_id, nurse.user_id),
  )
  .await
  .unwrap();

  let entry = s.pending_notifications(10, 5).await.unwrap().remove(0);
  assert!(matches!(
    s.resolve_recipient(entry.recipient_id).await.unwrap(),
    Some(Recipient::User(u)) if u.user_id == nurse.user_id
  ));
  let message = s.deliver_as_message(entry).await.unwrap();
  assert_eq!(message.category, MessageCategory::Appointment);
  assert_eq!(message.sender_id, doctor.user_id);

  assert!(s.pending_notifications(10, 5).await.unwrap().is_empty());
  assert_eq!(s.unread_for(nurse.user_id).await.unwrap().len(), 1);
  assert!(s.resolve_recipient(Uuid::new_v4()).await.unwrap().is_none());
}
