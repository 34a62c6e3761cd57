//! `CREATE TABLE` generation.
//!
//! Table and column names are written verbatim. Callers that build tables
//! from untrusted input must validate the names themselves.

use std::fmt::Write;

use crate::schema::{Column, Table};

impl Table {
    /// Renders the `CREATE TABLE` statement for this table.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("CREATE TABLE {} (", self.name());

        let mut prefix = "";
        for column in self.columns() {
            sql.push_str(prefix);
            sql.push_str(&column.to_sql());
            prefix = ", ";
        }

        for column in self.columns() {
            if let Some(reference) = column.foreign_key() {
                let _ = write!(
                    sql,
                    ", FOREIGN KEY ({}) REFERENCES {}({})",
                    column.name(),
                    reference.table,
                    reference.column
                );
            }
        }

        sql.push_str(");");
        sql
    }
}

impl Column {
    /// Renders the column definition, constraints in a fixed order.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name(), self.sql_type());

        let constraint = self.constraint();
        if constraint.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if constraint.auto_increment {
            sql.push_str(" AUTOINCREMENT");
        }
        if constraint.not_null {
            sql.push_str(" NOT NULL");
        }
        if constraint.unique {
            sql.push_str(" UNIQUE");
        }

        sql
    }
}
