//! SQL schema for the hospital SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    family_name   TEXT NOT NULL,
    given_name    TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,     -- argon2 PHC string
    role          TEXT NOT NULL
                  CHECK (role IN ('admin', 'medecin', 'rh', 'infirmier')),
    created_at    TEXT NOT NULL      -- RFC 3339 UTC, microseconds
);

CREATE TABLE IF NOT EXISTS patients (
    patient_id        TEXT PRIMARY KEY,
    family_name       TEXT NOT NULL,
    given_name        TEXT NOT NULL,
    age               INTEGER NOT NULL,
    weight_kg         REAL,
    height_cm         REAL,
    email             TEXT,
    current_treatment TEXT,
    created_at        TEXT NOT NULL
);

-- Appointments are never deleted by the booking workflow; cancellation is a
-- status change. scheduled_at is wall-clock 'YYYY-MM-DDTHH:MM:SS' so text
-- comparison equals time comparison.
CREATE TABLE IF NOT EXISTS appointments (
    appointment_id  TEXT PRIMARY KEY,
    patient_id      TEXT NOT NULL REFERENCES patients(patient_id),
    practitioner_id TEXT NOT NULL REFERENCES users(user_id),
    scheduled_at    TEXT NOT NULL,
    notes           TEXT,
    status          TEXT NOT NULL DEFAULT 'scheduled'
                    CHECK (status IN ('scheduled', 'completed', 'canceled')),
    created_at      TEXT NOT NULL
);

-- Treatment rows are snapshots: inserted, never updated.
CREATE TABLE IF NOT EXISTS treatments (
    treatment_id    TEXT PRIMARY KEY,
    patient_id      TEXT NOT NULL REFERENCES patients(patient_id),
    practitioner_id TEXT NOT NULL REFERENCES users(user_id),
    medications     TEXT NOT NULL,   -- JSON array of {name, dosage}
    notes           TEXT,
    created_at      TEXT NOT NULL
);

-- Prescribable medications. Treatments copy name and dosage, so the
-- catalog can change without touching existing snapshots.
CREATE TABLE IF NOT EXISTS medications (
    medication_id  TEXT PRIMARY KEY,
    name           TEXT NOT NULL UNIQUE COLLATE NOCASE,
    default_dosage TEXT,
    description    TEXT
);

CREATE TABLE IF NOT EXISTS messages (
    message_id   TEXT PRIMARY KEY,
    sender_id    TEXT NOT NULL REFERENCES users(user_id),
    recipient_id TEXT NOT NULL REFERENCES users(user_id),
    body         TEXT NOT NULL,
    category     TEXT NOT NULL DEFAULT 'general',
    read         INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

-- Outbox. recipient_id names either a patient or a user, so it carries no
-- foreign key; the dispatcher resolves it at delivery time.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    sender_id       TEXT NOT NULL,
    recipient_id    TEXT NOT NULL,
    subject         TEXT NOT NULL,
    body            TEXT NOT NULL,
    category        TEXT NOT NULL,
    attempts        INTEGER NOT NULL DEFAULT 0,
    status          TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'delivered', 'failed')),
    last_error      TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS appointments_practitioner_idx
    ON appointments(practitioner_id, scheduled_at);
CREATE INDEX IF NOT EXISTS appointments_patient_idx   ON appointments(patient_id);
CREATE INDEX IF NOT EXISTS treatments_patient_idx     ON treatments(patient_id, created_at);
CREATE INDEX IF NOT EXISTS treatments_practitioner_idx ON treatments(practitioner_id);
CREATE INDEX IF NOT EXISTS messages_recipient_idx     ON messages(recipient_id);
CREATE INDEX IF NOT EXISTS messages_sender_idx        ON messages(sender_id);
CREATE INDEX IF NOT EXISTS notifications_pending_idx  ON notifications(status, created_at);

PRAGMA user_version = 1;
";
