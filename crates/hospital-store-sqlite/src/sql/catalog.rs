use hospital_core::treatment::{CatalogMedication, NewCatalogMedication};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{decode_uuid, encode_uuid},
  sql::immediate,
};

/// Alphabetical, ignoring case.
pub fn list(conn: &Connection) -> Result<Vec<CatalogMedication>> {
  let mut stmt = conn.prepare(
    "SELECT medication_id, name, default_dosage, description
     FROM medications
     ORDER BY name COLLATE NOCASE",
  )?;
  let rows = stmt
    .query_map([], |r| {
      Ok((
        r.get::<_, String>(0)?,
        r.get::<_, String>(1)?,
        r.get::<_, Option<String>>(2)?,
        r.get::<_, Option<String>>(3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows
    .into_iter()
    .map(|(id, name, default_dosage, description)| {
      Ok(CatalogMedication {
        medication_id: decode_uuid(&id)?,
        name,
        default_dosage,
        description,
      })
    })
    .collect()
}

pub fn add(conn: &mut Connection, input: NewCatalogMedication) -> Result<CatalogMedication> {
  let tx = immediate(conn)?;
  let taken = tx
    .query_row(
      "SELECT 1 FROM medications WHERE name = ?1 COLLATE NOCASE",
      [&input.name],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if taken {
    return Err(hospital_core::Error::CatalogDuplicate(input.name).into());
  }

  let medication = CatalogMedication {
    medication_id:  Uuid::new_v4(),
    name:           input.name,
    default_dosage: input.default_dosage,
    description:    input.description,
  };
  tx.execute(
    "INSERT INTO medications (medication_id, name, default_dosage, description)
     VALUES (?1, ?2, ?3, ?4)",
    params![
      encode_uuid(medication.medication_id),
      medication.name,
      medication.default_dosage,
      medication.description,
    ],
  )?;
  tx.commit()?;
  Ok(medication)
}
