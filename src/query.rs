//! Statement execution against a borrowed connection.
//!
//! The free functions here do the actual work for [`crate::SqliteBridge`];
//! [`ConnectionExt`] exposes the same operations directly on a
//! `rusqlite::Connection` for callers that manage the connection themselves.

use rusqlite::types::ToSql;
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::mapping::{describe, Record};
use crate::statement::{self, ColumnToUpdate, OrderByClause, Paging, SqlQuery, WhereClause};
use crate::value::{Params, Value};

/// Runs `f` with the bag rendered as rusqlite named parameters.
fn with_named<R>(
    params: &Params,
    f: impl FnOnce(&[(&str, &dyn ToSql)]) -> rusqlite::Result<R>,
) -> rusqlite::Result<R> {
    let named = params.named();
    let named: Vec<(&str, &dyn ToSql)> = named.iter().map(|(n, v)| (n.as_str(), *v)).collect();
    f(&named)
}

/// Runs a row-returning query and maps each row into `T`.
pub fn fetch<T: Record>(conn: &Connection, query: &SqlQuery) -> Result<Vec<T>> {
    debug!(sql = %query.statement, "fetch");
    let mut stmt = conn.prepare(&query.statement)?;
    let rows = with_named(&query.params, |params| {
        stmt.query_map(params, T::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
    })?;
    Ok(rows)
}

/// Runs a statement and returns the affected row count.
pub fn execute(conn: &Connection, query: &SqlQuery) -> Result<usize> {
    debug!(sql = %query.statement, "execute");
    let mut stmt = conn.prepare(&query.statement)?;
    Ok(with_named(&query.params, |params| stmt.execute(params))?)
}

/// Runs one statement once per parameter bag and sums the affected rows.
pub fn execute_each(conn: &Connection, statement: &str, rows: &[Params]) -> Result<usize> {
    debug!(sql = %statement, rows = rows.len(), "execute batch");
    let mut stmt = conn.prepare_cached(statement)?;
    let mut affected = 0;
    for params in rows {
        affected += with_named(params, |params| stmt.execute(params))?;
    }
    Ok(affected)
}

fn scalar(conn: &Connection, query: &SqlQuery) -> Result<i64> {
    debug!(sql = %query.statement, "scalar");
    let mut stmt = conn.prepare(&query.statement)?;
    Ok(with_named(&query.params, |params| {
        stmt.query_row(params, |row| row.get(0))
    })?)
}

/// INSERT statement of `T` and one parameter bag per item.
pub fn plan_insert<'a, T, I>(items: I) -> Result<(String, Vec<Params>)>
where
    T: Record,
    I: IntoIterator<Item = &'a T>,
{
    let mapping = describe::<T>()?;
    let query = statement::insert(
        mapping.table_name(),
        mapping.data_columns().map(|c| c.name.as_str()),
    );
    let rows = items
        .into_iter()
        .map(|item| mapping.data_params(item))
        .collect::<Result<Vec<_>>>()?;
    Ok((query.statement, rows))
}

/// UPDATE of every data column of `item`, filtered by `clauses`.
pub fn plan_update_record<T: Record>(item: &T, clauses: &[WhereClause]) -> Result<SqlQuery> {
    let mapping = describe::<T>()?;
    let columns = mapping
        .data_columns()
        .map(|c| {
            let value = mapping.value_of(item, &c.name).unwrap_or(Value::Null);
            ColumnToUpdate::new(c.name.clone(), value)
        })
        .collect::<Vec<_>>();
    statement::update(mapping.table_name(), &columns, clauses)
}

pub fn get_all<T: Record>(conn: &Connection) -> Result<Vec<T>> {
    let mapping = describe::<T>()?;
    fetch(conn, &statement::select_all(mapping.table_name()))
}

pub fn get_page<T: Record>(
    conn: &Connection,
    paging: Paging,
    order_by: &OrderByClause,
    clauses: &[WhereClause],
) -> Result<Vec<T>> {
    let mapping = describe::<T>()?;
    let query = statement::select_page(mapping.table_name(), paging, order_by, clauses)?;
    fetch(conn, &query)
}

pub fn row_count<T: Record>(conn: &Connection, clauses: &[WhereClause]) -> Result<u64> {
    let mapping = describe::<T>()?;
    let count = scalar(conn, &statement::count(mapping.table_name(), clauses)?)?;
    Ok(count.max(0) as u64)
}

pub fn select_records<T: Record>(conn: &Connection, clauses: &[WhereClause]) -> Result<Vec<T>> {
    let mapping = describe::<T>()?;
    fetch(conn, &statement::select(mapping.table_name(), clauses)?)
}

/// Reads the whole table and keeps the rows accepted by `predicate`.
pub fn select_matching<T, F>(conn: &Connection, mut predicate: F) -> Result<Vec<T>>
where
    T: Record,
    F: FnMut(&T) -> bool,
{
    let mut rows = get_all::<T>(conn)?;
    rows.retain(|row| predicate(row));
    Ok(rows)
}

pub fn insert<T: Record>(conn: &Connection, item: &T) -> Result<bool> {
    let (statement, rows) = plan_insert([item])?;
    Ok(execute_each(conn, &statement, &rows)? > 0)
}

/// Succeeds only if every item produced a row.
pub fn insert_many<T: Record>(conn: &Connection, items: &[T]) -> Result<bool> {
    let (statement, rows) = plan_insert(items)?;
    Ok(execute_each(conn, &statement, &rows)? == items.len())
}

pub fn update<T: Record>(
    conn: &Connection,
    columns: &[ColumnToUpdate],
    clauses: &[WhereClause],
) -> Result<bool> {
    let mapping = describe::<T>()?;
    let query = statement::update(mapping.table_name(), columns, clauses)?;
    Ok(execute(conn, &query)? > 0)
}

pub fn update_record<T: Record>(
    conn: &Connection,
    item: &T,
    clauses: &[WhereClause],
) -> Result<bool> {
    Ok(execute(conn, &plan_update_record(item, clauses)?)? > 0)
}

pub fn delete<T: Record>(conn: &Connection, clauses: &[WhereClause]) -> Result<bool> {
    let mapping = describe::<T>()?;
    Ok(execute(conn, &statement::delete(mapping.table_name(), clauses)?)? > 0)
}

pub fn create_index<T: Record>(conn: &Connection, name: &str, column: &str) -> Result<()> {
    let mapping = describe::<T>()?;
    execute(conn, &statement::create_index(name, mapping.table_name(), column))?;
    Ok(())
}

/// Mapped CRUD helpers on a plain `rusqlite::Connection`.
pub trait ConnectionExt {
    fn get_all<T: Record>(&self) -> Result<Vec<T>>;

    fn select_records<T: Record>(&self, clauses: &[WhereClause]) -> Result<Vec<T>>;

    fn select_matching<T, F>(&self, predicate: F) -> Result<Vec<T>>
    where
        T: Record,
        F: FnMut(&T) -> bool;

    fn insert_record<T: Record>(&self, item: &T) -> Result<bool>;

    fn insert_records<T: Record>(&self, items: &[T]) -> Result<bool>;

    fn update_columns<T: Record>(
        &self,
        columns: &[ColumnToUpdate],
        clauses: &[WhereClause],
    ) -> Result<bool>;

    /// Writes every mapped column of `item` into the rows matching `clauses`.
    fn update_record<T: Record>(&self, item: &T, clauses: &[WhereClause]) -> Result<bool>;
}

impl ConnectionExt for Connection {
    fn get_all<T: Record>(&self) -> Result<Vec<T>> {
        get_all(self)
    }

    fn select_records<T: Record>(&self, clauses: &[WhereClause]) -> Result<Vec<T>> {
        select_records(self, clauses)
    }

    fn select_matching<T, F>(&self, predicate: F) -> Result<Vec<T>>
    where
        T: Record,
        F: FnMut(&T) -> bool,
    {
        select_matching(self, predicate)
    }

    fn insert_record<T: Record>(&self, item: &T) -> Result<bool> {
        insert(self, item)
    }

    fn insert_records<T: Record>(&self, items: &[T]) -> Result<bool> {
        insert_many(self, items)
    }

    fn update_columns<T: Record>(
        &self,
        columns: &[ColumnToUpdate],
        clauses: &[WhereClause],
    ) -> Result<bool> {
        update::<T>(self, columns, clauses)
    }

    fn update_record<T: Record>(&self, item: &T, clauses: &[WhereClause]) -> Result<bool> {
        update_record(self, item, clauses)
    }
}
