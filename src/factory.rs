//! Creation of database files and tables, and connection setup.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::bridge::SqliteBridge;
use crate::config::SqliteConfig;
use crate::error::{Error, Result};
use crate::schema::{DatabaseType, Table};

fn ensure_supported(database_type: DatabaseType) -> Result<()> {
    match database_type {
        DatabaseType::Sqlite => Ok(()),
        other => Err(Error::NotSupported(format!(
            "database type '{other}' is not supported"
        ))),
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::InvalidOperation(format!(
            "database '{}' does not exist",
            path.display()
        )));
    }
    Ok(())
}

fn verify_new_database_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("path must not be empty".to_string()));
    }
    if path.file_name().is_none() || path.extension().is_none() {
        return Err(Error::InvalidArgument(format!(
            "invalid database file path '{}'",
            path.display()
        )));
    }
    if path.exists() {
        return Err(Error::AlreadyExists(format!(
            "database '{}' already exists",
            path.display()
        )));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // A missing directory is left for the file system to report.
    if let Ok(metadata) = fs::metadata(dir) {
        if metadata.permissions().readonly() {
            return Err(Error::InvalidOperation(format!(
                "directory '{}' is read-only",
                dir.display()
            )));
        }
    }
    Ok(())
}

/// Creates an empty database file at `path`.
///
/// The path must name a file with an extension that does not exist yet, in a
/// directory that is not read-only.
pub fn create_database(database_type: DatabaseType, path: impl AsRef<Path>) -> Result<()> {
    ensure_supported(database_type)?;
    let path = path.as_ref();
    verify_new_database_path(path)?;

    // An empty file is a valid SQLite database.
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| creation_error(path, err))?;

    info!(path = %path.display(), "database created");
    Ok(())
}

fn creation_error(path: &Path, err: io::Error) -> Error {
    match err.kind() {
        ErrorKind::AlreadyExists => {
            Error::AlreadyExists(format!("database '{}' already exists", path.display()))
        }
        // Directory writable by its owner, but not by this process.
        ErrorKind::PermissionDenied => Error::InvalidOperation(format!(
            "cannot create database '{}': {err}",
            path.display()
        )),
        _ => Error::Io(err),
    }
}

/// Creates `table` in the existing database at `path`.
pub fn create_table(
    database_type: DatabaseType,
    path: impl AsRef<Path>,
    table: &Table,
) -> Result<()> {
    ensure_supported(database_type)?;
    let path = path.as_ref();
    ensure_exists(path)?;

    let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    if table_exists(&connection, table.name())? {
        return Err(Error::AlreadyExists(format!(
            "table '{}' already exists",
            table.name()
        )));
    }
    execute_ddl(&connection, table)?;
    info!(path = %path.display(), table = table.name(), "table created");
    Ok(())
}

fn execute_ddl(connection: &Connection, table: &Table) -> Result<()> {
    let sql = table.to_sql();
    debug!(sql = %sql, "create table");
    connection.execute_batch(&sql)?;
    Ok(())
}

fn table_exists(connection: &Connection, name: &str) -> Result<bool> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Opens a plain connection to the existing database at `path`.
pub fn open_connection(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    ensure_exists(path)?;
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

/// Opens a bridge to the existing database at `path`.
pub fn connect(path: impl AsRef<Path>) -> Result<SqliteBridge> {
    let path = path.as_ref();
    let connection = open_connection(path)?;
    debug!(path = %path.display(), "sqlite bridge connected");
    Ok(SqliteBridge::new(connection))
}

/// Creates the configured database and any missing schema tables, then opens
/// a bridge with the configured connection settings.
pub fn provision(config: &SqliteConfig) -> Result<SqliteBridge> {
    ensure_supported(config.database_type)?;
    if !config.db_path.exists() {
        create_database(config.database_type, &config.db_path)?;
    }

    let connection = open_connection(&config.db_path)?;
    for table in &config.schema.tables {
        if table_exists(&connection, table.name())? {
            debug!(table = table.name(), "table already present");
            continue;
        }
        execute_ddl(&connection, table)?;
        info!(table = table.name(), "table created");
    }

    SqliteBridge::with_config(connection, config)
}
