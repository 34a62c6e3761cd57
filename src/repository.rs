//! Id-keyed async repository over a [`SqliteBridge`].

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::bridge::SqliteBridge;
use crate::error::{Error, Result};
use crate::mapping::{describe, Record};
use crate::statement::WhereClause;
use crate::value::Value;

#[async_trait]
pub trait Repository<T, Id>: Send + Sync {
    async fn insert(&self, item: T) -> Result<()>;

    /// Overwrites the stored row carrying the same id as `item`.
    async fn update(&self, item: T) -> Result<()>;

    async fn delete(&self, id: Id) -> Result<()>;

    async fn get_by_id(&self, id: Id) -> Result<Option<T>>;
}

/// Repository keyed by the identity column of `T`'s mapping.
pub struct TableRepository<T, Id = i64> {
    bridge: SqliteBridge,
    _record: PhantomData<fn() -> (T, Id)>,
}

impl<T, Id> Clone for TableRepository<T, Id> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record, Id> TableRepository<T, Id> {
    pub fn new(bridge: SqliteBridge) -> Self {
        Self {
            bridge,
            _record: PhantomData,
        }
    }

    pub fn bridge(&self) -> &SqliteBridge {
        &self.bridge
    }

    fn identity_column() -> Result<String> {
        let mapping = describe::<T>()?;
        let column = mapping.identity_column().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "table '{}' has no identity column",
                mapping.table_name()
            ))
        })?;
        Ok(column.name.clone())
    }

    fn by_id(id: impl Into<Value>) -> Result<[WhereClause; 1]> {
        Ok([WhereClause::new(Self::identity_column()?, id)])
    }
}

#[async_trait]
impl<T, Id> Repository<T, Id> for TableRepository<T, Id>
where
    T: Record + Send + Sync,
    Id: Into<Value> + Send + 'static,
{
    async fn insert(&self, item: T) -> Result<()> {
        if !self.bridge.insert_async(&item).await? {
            return Err(Error::InvalidOperation("no row was inserted".to_string()));
        }
        Ok(())
    }

    async fn update(&self, item: T) -> Result<()> {
        let clauses = {
            let column = Self::identity_column()?;
            let id = describe::<T>()?
                .value_of(&item, &column)
                .unwrap_or(Value::Null);
            [WhereClause::new(column, id)]
        };
        if !self.bridge.update_record_async(&item, &clauses).await? {
            return Err(Error::NotFound(format!("no row matches {:?}", clauses[0].value)));
        }
        Ok(())
    }

    async fn delete(&self, id: Id) -> Result<()> {
        let clauses = Self::by_id(id)?;
        if !self.bridge.delete_async::<T>(&clauses).await? {
            return Err(Error::NotFound(format!("no row matches {:?}", clauses[0].value)));
        }
        Ok(())
    }

    async fn get_by_id(&self, id: Id) -> Result<Option<T>> {
        let clauses = Self::by_id(id)?;
        let rows = self.bridge.select_records_async::<T>(&clauses).await?;
        Ok(rows.into_iter().next())
    }
}
