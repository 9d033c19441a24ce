// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Generic row access by table name and column predicates.
//!
//! Rows travel as JSON objects. Column names are checked against the live
//! table before any SQL is assembled.

use anyhow::{Context, Result, bail};
use radventure_app::SortDirection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::{Store, now_rfc3339, table_columns};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Profiles,
    MedicalCases,
    Events,
    RadcoinProducts,
    SpecialOffers,
    RadcoinTransactions,
    UserBenefits,
    CaseAttempts,
    OnboardingStates,
}

impl Table {
    pub const ALL: [Self; 9] = [
        Self::Profiles,
        Self::MedicalCases,
        Self::Events,
        Self::RadcoinProducts,
        Self::SpecialOffers,
        Self::RadcoinTransactions,
        Self::UserBenefits,
        Self::CaseAttempts,
        Self::OnboardingStates,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::MedicalCases => "medical_cases",
            Self::Events => "events",
            Self::RadcoinProducts => "radcoin_products",
            Self::SpecialOffers => "special_offers",
            Self::RadcoinTransactions => "radcoin_transactions",
            Self::UserBenefits => "user_benefits",
            Self::CaseAttempts => "case_attempts",
            Self::OnboardingStates => "onboarding_states",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.as_str() == value)
    }

    const fn json_columns(self) -> &'static [&'static str] {
        match self {
            Self::MedicalCases => &["answer_options", "tags"],
            Self::Events => &["prize_distribution", "case_filters"],
            Self::RadcoinProducts => &["benefits"],
            Self::RadcoinTransactions => &["metadata"],
            _ => &[],
        }
    }

    const fn bool_columns(self) -> &'static [&'static str] {
        match self {
            Self::RadcoinProducts | Self::SpecialOffers => &["is_active"],
            Self::CaseAttempts => &["correct"],
            Self::OnboardingStates => &["onboarding_completed"],
            _ => &[],
        }
    }

    fn is_json_column(self, column: &str) -> bool {
        self.json_columns().contains(&column)
    }

    fn is_bool_column(self, column: &str) -> bool {
        self.bool_columns().contains(&column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    /// JSON array column holds the value, or every value of an array.
    Contains(String, Value),
    /// Case-insensitive `LIKE` pattern.
    ILike(String, String),
}

impl Predicate {
    fn column(&self) -> &str {
        match self {
            Self::Eq(column, _)
            | Self::Neq(column, _)
            | Self::Gt(column, _)
            | Self::Gte(column, _)
            | Self::Lt(column, _)
            | Self::Lte(column, _)
            | Self::In(column, _)
            | Self::Contains(column, _)
            | Self::ILike(column, _) => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowQuery {
    pub table: Table,
    pub predicates: Vec<Predicate>,
    pub order: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl RowQuery {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            predicates: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(Predicate::Eq(column.to_owned(), value.into()))
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(Predicate::Neq(column.to_owned(), value.into()))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(Predicate::Gt(column.to_owned(), value.into()))
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(Predicate::Gte(column.to_owned(), value.into()))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(Predicate::Lt(column.to_owned(), value.into()))
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(Predicate::Lte(column.to_owned(), value.into()))
    }

    pub fn in_list<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(Predicate::In(
            column.to_owned(),
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn contains(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(Predicate::Contains(column.to_owned(), value.into()))
    }

    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.with(Predicate::ILike(column.to_owned(), pattern.to_owned()))
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order = Some((column.to_owned(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

impl Store {
    pub fn select_rows(&self, query: &RowQuery) -> Result<Vec<Map<String, Value>>> {
        let table = query.table;
        let columns = known_columns(&self.conn, table)?;
        let (where_sql, mut values) = build_where(query, &columns)?;

        let mut sql = format!("SELECT * FROM {}{where_sql}", table.as_str());
        if let Some((column, direction)) = &query.order {
            ensure_column(table, &columns, column)?;
            let keyword = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {column} {keyword}, rowid ASC"));
        }
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(SqlValue::Integer(
                i64::try_from(limit).context("row limit too large")?,
            ));
        }

        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("prepare select on {}", table.as_str()))?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let mut rows = stmt
            .query(params_from_iter(values))
            .with_context(|| format!("select from {}", table.as_str()))?;

        let mut output = Vec::new();
        while let Some(row) = rows
            .next()
            .with_context(|| format!("read row from {}", table.as_str()))?
        {
            let mut record = Map::new();
            for (index, name) in names.iter().enumerate() {
                let raw = row
                    .get_ref(index)
                    .with_context(|| format!("read {}.{name}", table.as_str()))?;
                record.insert(name.clone(), decode_value(table, name, raw)?);
            }
            output.push(record);
        }
        debug!(table = table.as_str(), rows = output.len(), "selected rows");
        Ok(output)
    }

    /// Inserts one row and returns its rowid. Timestamps default to now.
    pub fn insert_row(&self, table: Table, row: &Map<String, Value>) -> Result<i64> {
        if row.is_empty() {
            bail!("cannot insert an empty row into {}", table.as_str());
        }
        let columns = known_columns(&self.conn, table)?;
        let mut names = Vec::with_capacity(row.len() + 2);
        let mut values = Vec::with_capacity(row.len() + 2);
        for (column, value) in row {
            ensure_column(table, &columns, column)?;
            names.push(column.clone());
            values.push(encode_value(table, column, value)?);
        }
        let now = now_rfc3339()?;
        for stamp in ["created_at", "updated_at"] {
            if columns.contains(stamp) && !row.contains_key(stamp) {
                names.push(stamp.to_owned());
                values.push(SqlValue::Text(now.clone()));
            }
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            table.as_str(),
            names.join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(values))
            .with_context(|| format!("insert into {}", table.as_str()))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_rows(&self, query: &RowQuery, changes: &Map<String, Value>) -> Result<usize> {
        let table = query.table;
        if query.predicates.is_empty() {
            bail!(
                "refusing to update every row of {} -- add a filter",
                table.as_str()
            );
        }
        if changes.is_empty() {
            bail!("no changes given for {}", table.as_str());
        }
        let columns = known_columns(&self.conn, table)?;
        let mut assignments = Vec::with_capacity(changes.len() + 1);
        let mut values = Vec::with_capacity(changes.len() + 1);
        for (column, value) in changes {
            ensure_column(table, &columns, column)?;
            assignments.push(format!("{column} = ?"));
            values.push(encode_value(table, column, value)?);
        }
        if columns.contains("updated_at") && !changes.contains_key("updated_at") {
            assignments.push("updated_at = ?".to_owned());
            values.push(SqlValue::Text(now_rfc3339()?));
        }
        let (where_sql, where_values) = build_where(query, &columns)?;
        values.extend(where_values);

        let sql = format!(
            "UPDATE {} SET {}{where_sql}",
            table.as_str(),
            assignments.join(", ")
        );
        let updated = self
            .conn
            .execute(&sql, params_from_iter(values))
            .with_context(|| format!("update {}", table.as_str()))?;
        info!(table = table.as_str(), updated, "updated rows");
        Ok(updated)
    }

    pub fn delete_rows(&self, query: &RowQuery) -> Result<usize> {
        let table = query.table;
        if query.predicates.is_empty() {
            bail!(
                "refusing to delete every row of {} -- add a filter",
                table.as_str()
            );
        }
        let columns = known_columns(&self.conn, table)?;
        let (where_sql, values) = build_where(query, &columns)?;
        let sql = format!("DELETE FROM {}{where_sql}", table.as_str());
        let deleted = self
            .conn
            .execute(&sql, params_from_iter(values))
            .with_context(|| format!("delete from {}", table.as_str()))?;
        info!(table = table.as_str(), deleted, "deleted rows");
        Ok(deleted)
    }
}

fn known_columns(conn: &Connection, table: Table) -> Result<BTreeSet<String>> {
    let columns = table_columns(conn, table.as_str())?;
    if columns.is_empty() {
        bail!(
            "table `{}` does not exist -- bootstrap the database first",
            table.as_str()
        );
    }
    Ok(columns)
}

fn ensure_column(table: Table, columns: &BTreeSet<String>, column: &str) -> Result<()> {
    if !columns.contains(column) {
        bail!(
            "unknown column `{column}` on {} -- expected one of: {}",
            table.as_str(),
            columns.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}

fn build_where(query: &RowQuery, columns: &BTreeSet<String>) -> Result<(String, Vec<SqlValue>)> {
    let table = query.table;
    let mut clauses = Vec::with_capacity(query.predicates.len());
    let mut values = Vec::new();

    for predicate in &query.predicates {
        let column = predicate.column();
        ensure_column(table, columns, column)?;
        let clause = match predicate {
            Predicate::Eq(_, Value::Null) => format!("{column} IS NULL"),
            Predicate::Neq(_, Value::Null) => format!("{column} IS NOT NULL"),
            Predicate::Eq(_, value) => compare(table, column, "=", value, &mut values)?,
            Predicate::Neq(_, value) => compare(table, column, "<>", value, &mut values)?,
            Predicate::Gt(_, value) => compare(table, column, ">", value, &mut values)?,
            Predicate::Gte(_, value) => compare(table, column, ">=", value, &mut values)?,
            Predicate::Lt(_, value) => compare(table, column, "<", value, &mut values)?,
            Predicate::Lte(_, value) => compare(table, column, "<=", value, &mut values)?,
            Predicate::In(_, list) if list.is_empty() => "0 = 1".to_owned(),
            Predicate::In(_, list) => {
                for value in list {
                    values.push(encode_value(table, column, value)?);
                }
                format!("{column} IN ({})", vec!["?"; list.len()].join(", "))
            }
            Predicate::Contains(_, needle) => {
                if !table.is_json_column(column) {
                    bail!(
                        "`{column}` on {} is not a list column -- use eq instead of contains",
                        table.as_str()
                    );
                }
                let needles = match needle {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                if needles.is_empty() {
                    "1 = 1".to_owned()
                } else {
                    let mut parts = Vec::with_capacity(needles.len());
                    for item in &needles {
                        values.push(scalar_value(item)?);
                        parts.push(format!(
                            "EXISTS (SELECT 1 FROM json_each({column}) WHERE json_each.value = ?)"
                        ));
                    }
                    parts.join(" AND ")
                }
            }
            Predicate::ILike(_, pattern) => {
                values.push(SqlValue::Text(pattern.clone()));
                format!("LOWER({column}) LIKE LOWER(?)")
            }
        };
        clauses.push(clause);
    }

    if clauses.is_empty() {
        return Ok((String::new(), values));
    }
    Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
}

fn compare(
    table: Table,
    column: &str,
    operator: &str,
    value: &Value,
    values: &mut Vec<SqlValue>,
) -> Result<String> {
    values.push(encode_value(table, column, value)?);
    Ok(format!("{column} {operator} ?"))
}

fn encode_value(table: Table, column: &str, value: &Value) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    if table.is_json_column(column) {
        return Ok(SqlValue::Text(value.to_string()));
    }
    match value {
        Value::Array(_) | Value::Object(_) => bail!(
            "column `{column}` on {} takes a scalar, got {value}",
            table.as_str()
        ),
        other => scalar_value(other),
    }
}

fn scalar_value(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(
                number
                    .as_f64()
                    .with_context(|| format!("number {number} is out of range"))?,
            ),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => bail!("expected a scalar value, got {value}"),
    })
}

fn decode_value(table: Table, column: &str, raw: ValueRef<'_>) -> Result<Value> {
    Ok(match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(integer) if table.is_bool_column(column) => Value::Bool(integer != 0),
        ValueRef::Integer(integer) => Value::from(integer),
        ValueRef::Real(real) => Number::from_f64(real).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if table.is_json_column(column) {
                serde_json::from_str(&text)
                    .with_context(|| format!("decode {}.{column} as json", table.as_str()))?
            } else {
                Value::String(text.into_owned())
            }
        }
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    })
}
