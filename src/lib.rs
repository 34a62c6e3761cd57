//! Table mapping and CRUD utilities over SQLite.
//!
//! # Intention
//!
//! - Create database files and tables from declarative [`Table`] descriptions.
//! - Map plain structs onto tables through [`Record`] and run parameterized
//!   INSERT / SELECT / UPDATE / DELETE statements for them.
//! - Serialize all access to one connection behind a [`SqliteBridge`].
//!
//! # Architectural Boundaries
//!
//! - Only SQLite is implemented; other [`DatabaseType`]s are rejected.
//! - Storage, locking of the database file and durability belong to SQLite.
//! - Identifiers are written into SQL verbatim. Values are always bound as
//!   parameters.

pub mod bridge;
pub mod config;
pub mod ddl;
pub mod error;
pub mod factory;
pub mod mapping;
pub mod query;
pub mod repository;
pub mod schema;
pub mod statement;
pub mod value;

pub use bridge::{SqliteBridge, TransactionState};
pub use config::SqliteConfig;
pub use error::{Error, Result};
pub use factory::{connect, create_database, create_table, open_connection, provision};
pub use mapping::{describe, ColumnDescription, Mapping, Record};
pub use query::ConnectionExt;
pub use repository::{Repository, TableRepository};
pub use schema::{
    Column, ColumnConstraint, DatabaseType, ForeignKeyReference, HostType, Schema, SqlType, Table,
};
pub use statement::{ColumnToUpdate, OrderByClause, Paging, SqlOperator, SqlQuery, WhereClause};
pub use value::{Params, Value};
