#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_storage::{
    connect, create_database, create_table, Column, ColumnConstraint, DatabaseType, Mapping,
    Record, SqliteBridge, Table,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub birthday: DateTime<Utc>,
    pub data: String,
    pub double_value: f64,
    // Not mapped, never stored.
    pub count: i32,
}

impl Record for Person {
    fn mapping() -> Mapping<Self> {
        Mapping::table("Person")
            .identity("Id", |p: &Person| &p.id)
            .column("Name", |p: &Person| &p.name)
            .column("Birthday", |p: &Person| &p.birthday)
            .column("Data", |p: &Person| &p.data)
            .column("DoubleValue", |p: &Person| &p.double_value)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("Id")?,
            name: row.get("Name")?,
            birthday: row.get("Birthday")?,
            data: row.get("Data")?,
            double_value: row.get("DoubleValue")?,
            count: 0,
        })
    }
}

pub fn person_table() -> Table {
    Table::new(
        "Person",
        vec![
            Column::with_constraint::<i64>(
                "Id",
                ColumnConstraint::primary_key_not_null().as_auto_increment(),
            ),
            Column::new::<String>("Name"),
            Column::new::<DateTime<Utc>>("Birthday"),
            Column::new::<String>("Data"),
            Column::new::<f64>("DoubleValue"),
        ],
    )
}

pub fn birthday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1990, 5, 17, 8, 30, 0).unwrap()
}

pub fn person(name: &str) -> Person {
    Person {
        id: 0,
        name: name.to_string(),
        birthday: birthday(),
        data: "F".repeat(250),
        double_value: 13567.3334554545,
        count: 0,
    }
}

/// `foo 0` .. `foo {count - 1}`, inserted with ids 1..=count.
pub fn many_persons(count: usize) -> Vec<Person> {
    (0..count)
        .map(|i| Person {
            double_value: 13567.3334554545 + i as f64,
            ..person(&format!("foo {i}"))
        })
        .collect()
}

/// A fresh database with the `Person` table. Keep the `TempDir` alive for
/// the duration of the test.
pub fn create_test_db() -> anyhow::Result<(SqliteBridge, TempDir)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("test.db3");
    create_database(DatabaseType::Sqlite, &path)?;
    create_table(DatabaseType::Sqlite, &path, &person_table())?;
    Ok((connect(&path)?, dir))
}
