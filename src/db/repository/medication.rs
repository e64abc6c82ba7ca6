use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Medication, MedicationInput};

use super::{fmt_ts, parse_ts};

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications
         (id, name, description, category, manufacturer, price, stock_quantity,
          image_url, dosage_form, strength, prescription_required,
          active_ingredients, side_effects, warnings, is_available, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            med.id.to_string(),
            med.name,
            med.description,
            med.category,
            med.manufacturer,
            med.price,
            med.stock_quantity,
            med.image_url,
            med.dosage_form,
            med.strength,
            med.prescription_required,
            med.active_ingredients,
            med.side_effects,
            med.warnings,
            med.is_available,
            fmt_ts(med.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, description, category, manufacturer, price, stock_quantity,
                image_url, dosage_form, strength, prescription_required,
                active_ingredients, side_effects, warnings, is_available, created_at
         FROM medications WHERE id = ?1",
        params![id.to_string()],
        medication_row,
    );

    match result {
        Ok(row) => Ok(Some(medication_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Full overwrite of the editable columns. Concurrent admin edits are
/// last-write-wins; there is no row versioning.
pub fn update_medication(
    conn: &Connection,
    id: &Uuid,
    input: &MedicationInput,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE medications SET
            name = ?2, description = ?3, category = ?4, manufacturer = ?5,
            price = ?6, stock_quantity = ?7, image_url = ?8, dosage_form = ?9,
            strength = ?10, prescription_required = ?11, active_ingredients = ?12,
            side_effects = ?13, warnings = ?14, is_available = ?15
         WHERE id = ?1",
        params![
            id.to_string(),
            input.name,
            input.description,
            input.category,
            input.manufacturer,
            input.price,
            input.stock_quantity,
            input.image_url,
            input.dosage_form,
            input.strength,
            input.prescription_required,
            input.active_ingredients,
            input.side_effects,
            input.warnings,
            input.is_available,
        ],
    )?;
    Ok(affected)
}

/// Hard delete. Deleting an absent id is not an error; zero rows just means
/// the catalog already lacks it.
pub fn delete_medication(conn: &Connection, id: &Uuid) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM medications WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(affected)
}

/// Catalog search over name, manufacturer and active ingredients, with an
/// optional exact category filter. `available_only` narrows to rows the
/// storefront may sell (marked available and in stock).
pub fn search_medications(
    conn: &Connection,
    query: Option<&str>,
    category: Option<&str>,
    available_only: bool,
) -> Result<Vec<Medication>, DatabaseError> {
    let pattern = query.map(|q| format!("%{q}%"));
    let mut stmt = conn.prepare(
        "SELECT id, name, description, category, manufacturer, price, stock_quantity,
                image_url, dosage_form, strength, prescription_required,
                active_ingredients, side_effects, warnings, is_available, created_at
         FROM medications
         WHERE (?1 IS NULL
                OR LOWER(name) LIKE LOWER(?1)
                OR LOWER(COALESCE(manufacturer, '')) LIKE LOWER(?1)
                OR LOWER(COALESCE(active_ingredients, '')) LIKE LOWER(?1))
           AND (?2 IS NULL OR category = ?2)
           AND (?3 = 0 OR (is_available = 1 AND stock_quantity > 0))
         ORDER BY name ASC",
    )?;

    let rows = stmt.query_map(params![pattern, category, available_only], medication_row)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

pub fn count_medications(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM medications", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

struct MedicationRow {
    id: String,
    name: String,
    description: Option<String>,
    category: String,
    manufacturer: Option<String>,
    price: f64,
    stock_quantity: i64,
    image_url: Option<String>,
    dosage_form: Option<String>,
    strength: Option<String>,
    prescription_required: bool,
    active_ingredients: Option<String>,
    side_effects: Option<String>,
    warnings: Option<String>,
    is_available: bool,
    created_at: String,
}

fn medication_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MedicationRow> {
    Ok(MedicationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        manufacturer: row.get(4)?,
        price: row.get(5)?,
        stock_quantity: row.get(6)?,
        image_url: row.get(7)?,
        dosage_form: row.get(8)?,
        strength: row.get(9)?,
        prescription_required: row.get(10)?,
        active_ingredients: row.get(11)?,
        side_effects: row.get(12)?,
        warnings: row.get(13)?,
        is_available: row.get(14)?,
        created_at: row.get(15)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    Ok(Medication {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        name: row.name,
        description: row.description,
        category: row.category,
        manufacturer: row.manufacturer,
        price: row.price,
        stock_quantity: row.stock_quantity,
        image_url: row.image_url,
        dosage_form: row.dosage_form,
        strength: row.strength,
        prescription_required: row.prescription_required,
        active_ingredients: row.active_ingredients,
        side_effects: row.side_effects,
        warnings: row.warnings,
        is_available: row.is_available,
        created_at: parse_ts(&row.created_at),
    })
}
