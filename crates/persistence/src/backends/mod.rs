//! Storage backend implementations.
//!
//! | Backend | Feature | Storage model |
//! |---------|---------|---------------|
//! | SQLite | `sqlite` | Relational: normalized tables, foreign keys, one transaction per aggregate |
//! | Document | always (MongoDB client behind `mongodb`) | One document per entity, atomic batch per aggregate |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! use diagnovet_persistence::backends::sqlite::SqliteBackend;
//!
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//!
//! let backend = SqliteBackend::open("./data/diagnovet.db")?;
//! # Ok(())
//! # }
//! ```

pub mod document;

#[cfg(feature = "sqlite")]
pub mod sqlite;
