//! SQLite schema definitions and versioning.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Tables in dependency order, children first. Deleting in this order never
/// trips a foreign key.
pub(crate) const WIPE_ORDER: &[&str] = &[
    "observations",
    "measurements",
    "studies",
    "reports",
    "patients",
    "professionals",
    "study_types",
    "organs",
    "units",
    "measure_types",
];

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StorageError::Backend(BackendError::MigrationError {
            message: format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ),
        }));
    }

    Ok(())
}

fn migration_error(step: &str, e: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::MigrationError {
        message: format!("{}: {}", step, e),
    })
}

/// Get the current schema version.
pub(crate) fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error("failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error("failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| migration_error("failed to set schema_version", e))?;
    Ok(())
}

/// Tables for the diagnostic aggregate and its reference entities.
///
/// Reference labels and professional names are unique, so get-or-create
/// never leaves two rows for one label.
fn create_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            guardian TEXT NOT NULL,
            age TEXT,
            breed TEXT
        );

        CREATE TABLE IF NOT EXISTS professionals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            license INTEGER,
            UNIQUE (first_name, last_name)
        );

        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            history TEXT,
            diagnosis TEXT NOT NULL,
            image_folder TEXT,
            report_date TEXT NOT NULL,
            patient_id INTEGER NOT NULL REFERENCES patients(id),
            professional_id INTEGER NOT NULL REFERENCES professionals(id)
        );

        CREATE TABLE IF NOT EXISTS study_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS organs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS measure_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS studies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
            study_type_id INTEGER NOT NULL REFERENCES study_types(id)
        );

        CREATE TABLE IF NOT EXISTS measurements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            study_id INTEGER NOT NULL REFERENCES studies(id) ON DELETE CASCADE,
            measure_type_id INTEGER NOT NULL REFERENCES measure_types(id),
            organ_id INTEGER NOT NULL REFERENCES organs(id),
            unit_id INTEGER REFERENCES units(id),
            value TEXT
        );

        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            study_id INTEGER NOT NULL REFERENCES studies(id) ON DELETE CASCADE,
            organ_id INTEGER NOT NULL REFERENCES organs(id),
            note TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reports_date ON reports(report_date, id);
        CREATE INDEX IF NOT EXISTS idx_reports_patient ON reports(patient_id);
        CREATE INDEX IF NOT EXISTS idx_studies_report ON studies(report_id);
        CREATE INDEX IF NOT EXISTS idx_measurements_study ON measurements(study_id);
        CREATE INDEX IF NOT EXISTS idx_observations_study ON observations(study_id);
        ",
    )
    .map_err(|e| migration_error("failed to create schema", e))?;

    Ok(())
}
