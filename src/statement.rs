//! SQL text and parameter assembly for the CRUD statements.
//!
//! WHERE predicates bind `@<column>WhereToUpdate` so they never collide with
//! SET and VALUES parameters, which bind the bare column name.

use std::fmt::{self, Write};

use crate::error::Result;
use crate::value::{Params, Value};

const WHERE_PARAM_SUFFIX: &str = "WhereToUpdate";

/// Comparison operators usable in a [`WhereClause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlOperator {
    #[default]
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
}

impl SqlOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlOperator::Equals => "=",
            SqlOperator::NotEquals => "!=",
            SqlOperator::GreaterThan => ">",
            SqlOperator::LessThan => "<",
            SqlOperator::GreaterEqual => ">=",
            SqlOperator::LessEqual => "<=",
        }
    }
}

impl fmt::Display for SqlOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `column op value` filter. Clauses in one statement are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub column: String,
    pub value: Value,
    pub operator: SqlOperator,
}

impl WhereClause {
    /// An equality filter.
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_operator(column, value, SqlOperator::Equals)
    }

    pub fn with_operator(
        column: impl Into<String>,
        value: impl Into<Value>,
        operator: SqlOperator,
    ) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            operator,
        }
    }

    fn param_name(&self) -> String {
        format!("{}{}", self.column, WHERE_PARAM_SUFFIX)
    }
}

/// A `column = value` assignment of an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnToUpdate {
    pub column: String,
    pub value: Value,
}

impl ColumnToUpdate {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Sort columns sharing one direction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderByClause {
    pub columns: Vec<String>,
    pub desc: bool,
}

impl OrderByClause {
    /// Descending order over `columns`.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::descending(columns)
    }

    pub fn ascending<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            desc: false,
        }
    }

    pub fn descending<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            desc: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub limit: u32,
    pub offset: u32,
}

impl Paging {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

/// SQL Query with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// `WHERE a = @aWhereToUpdate AND ...`, or an empty string without clauses.
fn where_sql(clauses: &[WhereClause]) -> String {
    let mut sql = String::new();
    let mut prefix = "WHERE ";
    for clause in clauses {
        let _ = write!(
            sql,
            "{prefix}{} {} @{}",
            clause.column,
            clause.operator,
            clause.param_name()
        );
        prefix = " AND ";
    }
    sql
}

fn where_params(clauses: &[WhereClause]) -> Result<Params> {
    let mut params = Params::new();
    for clause in clauses {
        params.bind(clause.param_name(), clause.value.clone())?;
    }
    Ok(params)
}

fn order_by_sql(order_by: &OrderByClause) -> String {
    if order_by.columns.is_empty() {
        return String::new();
    }
    let direction = if order_by.desc { "DESC" } else { "ASC" };
    format!("ORDER BY {} {direction}", order_by.columns.join(", "))
}

/// Joins the non-empty parts with single spaces and terminates the statement.
fn finish(parts: &[&str]) -> String {
    let mut sql = parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    sql.push(';');
    sql
}

pub fn select_all(table: &str) -> SqlQuery {
    SqlQuery::new(&finish(&[format!("SELECT * FROM {table}").as_str()]))
}

pub fn select(table: &str, clauses: &[WhereClause]) -> Result<SqlQuery> {
    let statement = finish(&[
        format!("SELECT * FROM {table}").as_str(),
        where_sql(clauses).as_str(),
    ]);
    Ok(SqlQuery::new(&statement).with_params(where_params(clauses)?))
}

pub fn select_page(
    table: &str,
    paging: Paging,
    order_by: &OrderByClause,
    clauses: &[WhereClause],
) -> Result<SqlQuery> {
    let statement = finish(&[
        format!("SELECT * FROM {table}").as_str(),
        where_sql(clauses).as_str(),
        order_by_sql(order_by).as_str(),
        format!("LIMIT {} OFFSET {}", paging.limit, paging.offset).as_str(),
    ]);
    Ok(SqlQuery::new(&statement).with_params(where_params(clauses)?))
}

pub fn count(table: &str, clauses: &[WhereClause]) -> Result<SqlQuery> {
    let statement = finish(&[
        format!("SELECT COUNT(*) FROM {table}").as_str(),
        where_sql(clauses).as_str(),
    ]);
    Ok(SqlQuery::new(&statement).with_params(where_params(clauses)?))
}

/// `INSERT INTO t (a, b) VALUES (@a, @b);`, or `INSERT INTO t DEFAULT VALUES;`
/// without columns. Parameters are bound per row.
pub fn insert<'a, I>(table: &str, columns: I) -> SqlQuery
where
    I: IntoIterator<Item = &'a str>,
{
    let columns: Vec<&str> = columns.into_iter().collect();
    if columns.is_empty() {
        return SqlQuery::new(&format!("INSERT INTO {table} DEFAULT VALUES;"));
    }
    let values: Vec<String> = columns.iter().map(|c| format!("@{c}")).collect();
    SqlQuery::new(&format!(
        "INSERT INTO {table} ({}) VALUES ({});",
        columns.join(", "),
        values.join(", ")
    ))
}

pub fn update(
    table: &str,
    columns: &[ColumnToUpdate],
    clauses: &[WhereClause],
) -> Result<SqlQuery> {
    let assignments = columns
        .iter()
        .map(|c| format!("{0} = @{0}", c.column))
        .collect::<Vec<_>>()
        .join(", ");
    let statement = finish(&[
        format!("UPDATE {table} SET {assignments}").as_str(),
        where_sql(clauses).as_str(),
    ]);

    let mut params = Params::new();
    for column in columns {
        params.bind(column.column.clone(), column.value.clone())?;
    }
    params.extend(where_params(clauses)?)?;

    Ok(SqlQuery::new(&statement).with_params(params))
}

/// Without clauses this deletes every row of the table.
pub fn delete(table: &str, clauses: &[WhereClause]) -> Result<SqlQuery> {
    let statement = finish(&[
        format!("DELETE FROM {table}").as_str(),
        where_sql(clauses).as_str(),
    ]);
    Ok(SqlQuery::new(&statement).with_params(where_params(clauses)?))
}

pub fn create_index(name: &str, table: &str, column: &str) -> SqlQuery {
    SqlQuery::new(&format!("CREATE INDEX {name} ON {table} ({column})"))
}
