//! Process configuration for the `diagnovet` command line.
//!
//! Every flag falls back to an environment variable:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DIAGNOVET_BACKEND` | relational | `relational` or `document` |
//! | `DIAGNOVET_DATABASE_URL` | diagnovet.db | SQLite path, or `:memory:` |
//! | `DIAGNOVET_MAX_CONNECTIONS` | 10 | SQLite pool size |
//! | `DIAGNOVET_DOCUMENT_STORE` | memory | `memory` or `mongodb` |
//! | `DIAGNOVET_MONGODB_URI` | | MongoDB connection string |
//! | `DIAGNOVET_MONGODB_DATABASE` | diagnovet | MongoDB database name |
//! | `DIAGNOVET_LOG_LEVEL` | info | Log level |

use clap::Args;
use diagnovet_persistence::RepositoryConfig;
use diagnovet_persistence::config::{DocumentConfig, DocumentStoreKind, SqliteConfig};
use diagnovet_persistence::core::BackendKind;

/// Storage and logging settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// Storage backend (relational, document).
    #[arg(long, env = "DIAGNOVET_BACKEND", default_value = "relational", global = true)]
    pub backend: BackendKind,

    /// SQLite database path, or :memory:.
    #[arg(long, env = "DIAGNOVET_DATABASE_URL", default_value = "diagnovet.db", global = true)]
    pub database_url: String,

    /// Maximum pooled SQLite connections.
    #[arg(long, env = "DIAGNOVET_MAX_CONNECTIONS", default_value = "10", global = true)]
    pub max_connections: u32,

    /// Document store client (memory, mongodb).
    #[arg(long, env = "DIAGNOVET_DOCUMENT_STORE", default_value = "memory", global = true)]
    pub document_store: DocumentStoreKind,

    /// MongoDB connection string.
    #[arg(long, env = "DIAGNOVET_MONGODB_URI", global = true)]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name.
    #[arg(long, env = "DIAGNOVET_MONGODB_DATABASE", default_value = "diagnovet", global = true)]
    pub mongodb_database: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "DIAGNOVET_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Relational,
            database_url: "diagnovet.db".to_string(),
            max_connections: 10,
            document_store: DocumentStoreKind::Memory,
            mongodb_uri: None,
            mongodb_database: "diagnovet".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Validates the configuration and returns every problem found.
    ///
    /// A missing MongoDB URI is left to repository selection, which reports
    /// it as a not-configured backend.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.backend == BackendKind::Relational {
            if self.database_url.trim().is_empty() {
                errors.push("Database URL cannot be empty".to_string());
            }
            if self.max_connections == 0 {
                errors.push("Max connections cannot be 0".to_string());
            }
        }

        if self.backend == BackendKind::Document
            && self.document_store == DocumentStoreKind::MongoDb
            && self.mongodb_database.trim().is_empty()
        {
            errors.push("MongoDB database name cannot be empty".to_string());
        }

        if !matches!(
            self.log_level.to_ascii_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            errors.push(format!("Unknown log level '{}'", self.log_level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds the repository configuration for the selected backend.
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            backend: self.backend,
            sqlite: SqliteConfig {
                path: self.database_url.clone(),
                max_connections: self.max_connections,
                ..Default::default()
            },
            document: DocumentConfig {
                store: self.document_store,
                mongodb_uri: self.mongodb_uri.clone(),
                mongodb_database: self.mongodb_database.clone(),
            },
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "diagnovet={},diagnovet_persistence={}",
            level, level
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
