//! Repository configuration.
//!
//! A [`RepositoryConfig`] names the backend kind plus the connection
//! parameters of each backend. Only the parameters of the selected backend
//! are consulted.
//!
//! ```
//! use diagnovet_persistence::config::{DocumentStoreKind, RepositoryConfig};
//! use diagnovet_persistence::core::BackendKind;
//!
//! let config: RepositoryConfig = serde_json::from_str(r#"{
//!     "backend": "document",
//!     "document": { "store": "mongodb", "mongodb_uri": "mongodb://localhost:27017" }
//! }"#).unwrap();
//!
//! assert_eq!(config.backend, BackendKind::Document);
//! assert_eq!(config.document.store, DocumentStoreKind::MongoDb);
//! assert_eq!(config.document.mongodb_database, "diagnovet");
//! assert_eq!(config.sqlite.path, "diagnovet.db");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::BackendKind;

/// Top-level repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Which backend to construct.
    #[serde(default)]
    pub backend: BackendKind,

    /// Relational backend parameters.
    #[serde(default)]
    pub sqlite: SqliteConfig,

    /// Document backend parameters.
    #[serde(default)]
    pub document: DocumentConfig,
}

impl RepositoryConfig {
    /// Relational backend over the given SQLite path (`:memory:` allowed).
    pub fn relational(path: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Relational,
            sqlite: SqliteConfig {
                path: path.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Document backend over an in-process store.
    pub fn document_in_memory() -> Self {
        Self {
            backend: BackendKind::Document,
            document: DocumentConfig {
                store: DocumentStoreKind::Memory,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file path, or `:memory:`.
    #[serde(default = "default_sqlite_path")]
    pub path: String,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long an operation waits for a pooled connection, in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_sqlite_path() -> String {
    "diagnovet.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

/// Which document store client backs the document repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStoreKind {
    /// In-process store; contents live as long as the repository.
    #[default]
    Memory,
    /// MongoDB (requires the `mongodb` feature and a replica set).
    #[serde(rename = "mongodb")]
    MongoDb,
}

impl fmt::Display for DocumentStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStoreKind::Memory => write!(f, "memory"),
            DocumentStoreKind::MongoDb => write!(f, "mongodb"),
        }
    }
}

impl FromStr for DocumentStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(DocumentStoreKind::Memory),
            "mongodb" | "mongo" => Ok(DocumentStoreKind::MongoDb),
            other => Err(format!(
                "unsupported document store '{}': expected 'memory' or 'mongodb'",
                other
            )),
        }
    }
}

/// Configuration for the document backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Store client to use.
    #[serde(default)]
    pub store: DocumentStoreKind,

    /// MongoDB connection string; required when `store` is `mongodb`.
    #[serde(default)]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name.
    #[serde(default = "default_mongodb_database")]
    pub mongodb_database: String,
}

fn default_mongodb_database() -> String {
    "diagnovet".to_string()
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            store: DocumentStoreKind::Memory,
            mongodb_uri: None,
            mongodb_database: default_mongodb_database(),
        }
    }
}
