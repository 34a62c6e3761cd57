use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::schema::{DatabaseType, Schema, Table};

/// SQLite storage configuration
///
/// Everything except the schema can be loaded from a config file; the schema
/// refers to Rust types and is attached in code with [`SqliteConfig::with_schema`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    #[serde(default)]
    pub database_type: DatabaseType,
    /// Enforce `FOREIGN KEY` clauses on every connection
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
    /// How long a statement waits on a locked database file before failing
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    /// Tables created when the database is provisioned
    #[serde(skip)]
    pub schema: Schema,
}

fn default_foreign_keys() -> bool {
    true
}

impl SqliteConfig {
    /// Create a new SQLite config for the given path
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            database_type: DatabaseType::Sqlite,
            foreign_keys: default_foreign_keys(),
            busy_timeout_ms: None,
            schema: Schema::new(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.schema = self.schema.add_table(table);
        self
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_deserialized() {
        let config: SqliteConfig = serde_json::from_str(r#"{ "db_path": "data/app.db3" }"#).unwrap();
        assert_eq!(config, SqliteConfig::new("data/app.db3"));
        assert!(config.foreign_keys);
        assert_eq!(config.busy_timeout(), None);
    }

    #[test]
    fn explicit_values_when_deserialized() {
        let config: SqliteConfig = serde_json::from_str(
            r#"{ "db_path": "app.db", "database_type": "postgres", "foreign_keys": false, "busy_timeout_ms": 250 }"#,
        )
        .unwrap();
        assert_eq!(config.database_type, DatabaseType::Postgres);
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout(), Some(Duration::from_millis(250)));
    }
}
