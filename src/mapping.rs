//! Struct to table mapping.
//!
//! A type opts into persistence by implementing [`Record`]: it names its
//! table and registers one getter per persisted field. Fields that are not
//! registered are never read or written. The resulting [`Mapping`] is built
//! once per type and shared through [`describe`].

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rusqlite::Row;

use crate::error::{Error, Result};
use crate::schema::HostType;
use crate::value::{Params, Value};

/// A type stored as rows of one table.
///
/// ```
/// use rust_storage::{Mapping, Record};
///
/// struct Person {
///     id: i64,
///     name: String,
/// }
///
/// impl Record for Person {
///     fn mapping() -> Mapping<Self> {
///         Mapping::table("Person")
///             .identity("Id", |p: &Person| &p.id)
///             .column("Name", |p: &Person| &p.name)
///     }
///
///     fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
///         Ok(Self {
///             id: row.get("Id")?,
///             name: row.get("Name")?,
///         })
///     }
/// }
/// ```
pub trait Record: Sized + 'static {
    /// Table name and persisted columns of this type.
    fn mapping() -> Mapping<Self>;

    /// Builds a value from a `SELECT *` result row.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Name and host type of one mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub host_type: HostType,
    /// Engine-assigned key; read back but never inserted.
    pub identity: bool,
}

type Getter<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;

struct MappedColumn<T> {
    description: ColumnDescription,
    get: Getter<T>,
}

/// Registration-time description of how `T` maps onto a table.
pub struct Mapping<T> {
    table: String,
    columns: Vec<MappedColumn<T>>,
}

impl<T: 'static> Mapping<T> {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            columns: Vec::new(),
        }
    }

    /// Registers a persisted column.
    pub fn column<V>(self, name: impl Into<String>, get: fn(&T) -> &V) -> Self
    where
        V: Clone + Into<Value> + 'static,
    {
        self.push(name.into(), get, false)
    }

    /// Registers the engine-assigned key column.
    pub fn identity<V>(self, name: impl Into<String>, get: fn(&T) -> &V) -> Self
    where
        V: Clone + Into<Value> + 'static,
    {
        self.push(name.into(), get, true)
    }

    fn push<V>(mut self, name: String, get: fn(&T) -> &V, identity: bool) -> Self
    where
        V: Clone + Into<Value> + 'static,
    {
        self.columns.push(MappedColumn {
            description: ColumnDescription {
                name,
                host_type: HostType::of::<V>(),
                identity,
            },
            get: Box::new(move |item: &T| -> Value { get(item).clone().into() }),
        });
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Every mapped column in registration order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDescription> {
        self.columns.iter().map(|column| &column.description)
    }

    /// Columns written by INSERT and full-record UPDATE.
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnDescription> {
        self.columns().filter(|column| !column.identity)
    }

    pub fn identity_column(&self) -> Option<&ColumnDescription> {
        self.columns().find(|column| column.identity)
    }

    /// Value of `column` on `item`, if the column is mapped.
    pub fn value_of(&self, item: &T, column: &str) -> Option<Value> {
        self.columns
            .iter()
            .find(|mapped| mapped.description.name == column)
            .map(|mapped| (mapped.get)(item))
    }

    /// The data columns of `item` keyed by column name.
    pub fn data_params(&self, item: &T) -> Result<Params> {
        let mut params = Params::new();
        for mapped in self.columns.iter().filter(|c| !c.description.identity) {
            params.bind(mapped.description.name.clone(), (mapped.get)(item))?;
        }
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "{} must declare a table name",
                type_name::<T>()
            )));
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Mapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("table", &self.table)
            .field(
                "columns",
                &self
                    .columns
                    .iter()
                    .map(|c| &c.description)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

type MappingCache = Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

fn cache() -> &'static MappingCache {
    static CACHE: OnceLock<MappingCache> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}

/// Returns the validated mapping of `T`, building it on first use.
pub fn describe<T: Record>() -> Result<Arc<Mapping<T>>> {
    let key = TypeId::of::<T>();

    let cached = cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .cloned();
    if let Some(mapping) = cached.and_then(|m| m.downcast::<Mapping<T>>().ok()) {
        return Ok(mapping);
    }

    let mapping = T::mapping();
    mapping.validate()?;
    let mapping = Arc::new(mapping);

    cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, mapping.clone() as Arc<dyn Any + Send + Sync>);
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person {
        id: i64,
        name: String,
        nickname: Option<String>,
        #[allow(dead_code)]
        count: i32,
    }

    impl Record for Person {
        fn mapping() -> Mapping<Self> {
            Mapping::table("Person")
                .identity("Id", |p: &Person| &p.id)
                .column("Name", |p: &Person| &p.name)
                .column("Nickname", |p: &Person| &p.nickname)
        }

        fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self {
                id: row.get("Id")?,
                name: row.get("Name")?,
                nickname: row.get("Nickname")?,
                count: 0,
            })
        }
    }

    struct Unnamed;

    impl Record for Unnamed {
        fn mapping() -> Mapping<Self> {
            Mapping::table("  ")
        }

        fn from_row(_: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Unnamed)
        }
    }

    #[test]
    fn columns_follow_registration_order() {
        let mapping = describe::<Person>().unwrap();
        let names: Vec<_> = mapping.columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Id", "Name", "Nickname"]);
        assert_eq!(mapping.identity_column().unwrap().name, "Id");
        assert_eq!(mapping.columns().nth(1).unwrap().host_type, HostType::of::<String>());
    }

    #[test]
    fn data_params_skip_identity() {
        let mapping = describe::<Person>().unwrap();
        let person = Person {
            id: 7,
            name: "Hugo".to_string(),
            nickname: None,
            count: 3,
        };
        let params = mapping.data_params(&person).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("Name"), Some(&Value::Text("Hugo".to_string())));
        assert_eq!(params.get("Nickname"), Some(&Value::Null));
        assert_eq!(mapping.value_of(&person, "Id"), Some(Value::Integer(7)));
    }

    #[test]
    fn describe_is_cached() {
        let first = describe::<Person>().unwrap();
        let second = describe::<Person>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_table_name_is_rejected() {
        assert!(matches!(
            describe::<Unnamed>(),
            Err(Error::InvalidArgument(_))
        ));
    }
}
