//! SQLite implementation of the relational backend.
//!
//! Every aggregate entity is a row with an integer primary key, exposed to
//! callers as a decimal string. Reference entities (study types, organs,
//! units, measure types) and professionals are unique by natural key, and the
//! whole aggregate is written inside one `BEGIN IMMEDIATE` transaction.
//!
//! # Example
//!
//! ```no_run
//! use diagnovet_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/diagnovet.db")?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! patients      (id, name, guardian, age, breed)
//! professionals (id, first_name, last_name, license)  -- UNIQUE (first_name, last_name)
//! reports       (id, history, diagnosis, image_folder, report_date, patient_id, professional_id)
//! studies       (id, report_id ON DELETE CASCADE, study_type_id)
//! measurements  (id, study_id ON DELETE CASCADE, measure_type_id, organ_id, unit_id, value)
//! observations  (id, study_id ON DELETE CASCADE, organ_id, note)
//! study_types | organs | units | measure_types (id, label UNIQUE)
//! ```

mod backend;
mod schema;
mod storage;

pub use backend::SqliteBackend;
pub use schema::SCHEMA_VERSION;
