//! Declarative table and column descriptions.
//!
//! These are plain values: a [`Table`] owns an ordered list of [`Column`]s and
//! nothing refers back to its owner. The column order is the order the
//! columns appear in the generated `CREATE TABLE` statement.

use std::any::{type_name, TypeId};
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

/// Database engines a database or table can be created for.
///
/// Only [`DatabaseType::Sqlite`] is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::Sqlite => f.write_str("SQLite"),
            DatabaseType::Postgres => f.write_str("Postgres"),
        }
    }
}

/// SQL column types emitted in DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Varchar,
    Real,
    Boolean,
    Text,
    Blob,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Varchar => "VARCHAR(255)",
            SqlType::Real => "REAL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The Rust type a column value has on the host side.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostType {
    id: TypeId,
    name: &'static str,
}

impl HostType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Looks up the SQL type for this host type. Types with no entry fall
    /// back to [`SqlType::Blob`].
    pub fn sql_type(&self) -> SqlType {
        macro_rules! lookup {
            ($($sql:expr => [$($ty:ty),* $(,)?]),* $(,)?) => {
                $(
                    $(
                        if self.id == TypeId::of::<$ty>() || self.id == TypeId::of::<Option<$ty>>() {
                            return $sql;
                        }
                    )*
                )*
            };
        }

        lookup! {
            SqlType::Integer => [i8, i16, i32, i64, isize, u8, u16, u32, u64, usize],
            SqlType::Varchar => [String, &'static str],
            SqlType::Real => [f32, f64],
            SqlType::Boolean => [bool],
            SqlType::Text => [DateTime<Utc>, DateTime<FixedOffset>, NaiveDateTime, NaiveDate, Uuid],
        }

        SqlType::Blob
    }
}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Constraints applied to a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnConstraint {
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub auto_increment: bool,
}

impl ColumnConstraint {
    pub const fn none() -> Self {
        Self {
            primary_key: false,
            not_null: false,
            unique: false,
            auto_increment: false,
        }
    }

    pub const fn primary_key() -> Self {
        Self::none().as_primary_key()
    }

    pub const fn primary_key_not_null() -> Self {
        Self::primary_key().as_not_null()
    }

    pub const fn primary_key_unique() -> Self {
        Self::primary_key().as_unique()
    }

    pub const fn primary_key_not_null_unique() -> Self {
        Self::primary_key().as_not_null().as_unique()
    }

    pub const fn as_primary_key(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }

    pub const fn as_not_null(self) -> Self {
        Self {
            not_null: true,
            ..self
        }
    }

    pub const fn as_unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }

    /// SQLite only accepts AUTOINCREMENT on an `INTEGER PRIMARY KEY`.
    pub const fn as_auto_increment(self) -> Self {
        Self {
            auto_increment: true,
            ..self
        }
    }
}

/// Target of a foreign key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyReference {
    pub table: String,
    pub column: String,
}

impl ForeignKeyReference {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// A column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    host_type: HostType,
    constraint: ColumnConstraint,
    foreign_key: Option<ForeignKeyReference>,
}

impl Column {
    /// A column of type `T` without constraints.
    pub fn new<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::with_constraint::<T>(name, ColumnConstraint::none())
    }

    pub fn with_constraint<T: ?Sized + 'static>(
        name: impl Into<String>,
        constraint: ColumnConstraint,
    ) -> Self {
        Self {
            name: name.into(),
            host_type: HostType::of::<T>(),
            constraint,
            foreign_key: None,
        }
    }

    pub fn with_foreign_key<T: ?Sized + 'static>(
        name: impl Into<String>,
        constraint: ColumnConstraint,
        reference: ForeignKeyReference,
    ) -> Self {
        Self {
            foreign_key: Some(reference),
            ..Self::with_constraint::<T>(name, constraint)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn sql_type(&self) -> SqlType {
        self.host_type.sql_type()
    }

    pub fn constraint(&self) -> ColumnConstraint {
        self.constraint
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyReference> {
        self.foreign_key.as_ref()
    }
}

/// A table of a relational database.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// Tables created together when a database is provisioned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Opaque;

    #[test]
    fn integer_family_maps_to_integer() {
        assert_eq!(HostType::of::<i32>().sql_type(), SqlType::Integer);
        assert_eq!(HostType::of::<u64>().sql_type(), SqlType::Integer);
        assert_eq!(HostType::of::<Option<i64>>().sql_type(), SqlType::Integer);
    }

    #[test]
    fn text_like_types() {
        assert_eq!(HostType::of::<String>().sql_type(), SqlType::Varchar);
        assert_eq!(HostType::of::<DateTime<Utc>>().sql_type(), SqlType::Text);
        assert_eq!(HostType::of::<Uuid>().sql_type(), SqlType::Text);
    }

    #[test]
    fn unknown_types_fall_back_to_blob() {
        assert_eq!(HostType::of::<Opaque>().sql_type(), SqlType::Blob);
        assert_eq!(HostType::of::<Vec<u8>>().sql_type(), SqlType::Blob);
        assert_eq!(HostType::of::<Vec<String>>().sql_type(), SqlType::Blob);
    }

    #[test]
    fn constraint_builders_keep_existing_flags() {
        let c = ColumnConstraint::primary_key_not_null().as_auto_increment();
        assert!(c.primary_key && c.not_null && c.auto_increment);
        assert!(!c.unique);
    }
}
