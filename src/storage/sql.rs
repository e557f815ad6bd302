//! SQL rendering of compiled queries
//!
//! Turns a [`CompiledQuery`] into parameterized SQL for a relational
//! [`Dialect`]. Identifiers are quoted and every filter value travels as a
//! bind parameter. The one exception is an [`Order::Raw`] clause, which only
//! exists under the passthrough order policy and is emitted verbatim.
//!
//! # Differences between dialects
//!
//! - Postgres binds each filter value as a one-key `jsonb` object and reads
//!   it back through `jsonb_populate_record`, so the value takes the
//!   column's own type (`"10"` against a `BIGINT` column is the number 10)
//!   and the column itself stays bare for index use. A value the column type
//!   rejects fails the statement
//! - MySQL binds the value as is and relies on its implicit conversion
//! - Postgres matches `like` with `ILIKE` on the text cast of the column;
//!   MySQL's default collation already makes `LIKE` case-insensitive
//! - `$1, $2` placeholders versus `?`

use crate::core::compiler::{CompiledQuery, Constraint, Order, SortDirection, SortKey, Visibility};
use crate::core::store::{DELETED_AT_COLUMN, Window};
use serde_json::{Map, Value};

/// Upper bound for `LIMIT`/`OFFSET`, which are `BIGINT` in SQL
const MAX_WINDOW: u64 = i64::MAX as u64;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    fn quote(&self) -> char {
        match self {
            Dialect::Postgres => '"',
            Dialect::MySql => '`',
        }
    }

    fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::MySql => "?".to_string(),
        }
    }
}

/// A bind parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    /// Filter value; under Postgres a `{column: value}` object bound as `jsonb`
    Value(Value),
    /// `LIKE` pattern, always text
    Pattern(String),
}

/// Parameterized statement ready for execution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<Bind>,
}

/// Quote a column or `relation.column` identifier
pub fn quote_identifier(name: &str, dialect: Dialect) -> String {
    let q = dialect.quote();
    name.split('.')
        .map(|part| {
            let escaped = part.replace(q, &format!("{q}{q}"));
            format!("{q}{escaped}{q}")
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// `SELECT` of matching rows, ordered and windowed.
///
/// Postgres projects each row as a single `jsonb` value.
pub fn render_select(
    table: &str,
    query: &CompiledQuery,
    window: Option<Window>,
    dialect: Dialect,
) -> SqlStatement {
    let quoted = quote_identifier(table, dialect);
    let projection = match dialect {
        Dialect::Postgres => format!("to_jsonb({}.*)", quoted),
        Dialect::MySql => "*".to_string(),
    };

    let mut binds = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", projection, quoted);
    sql.push_str(&render_where(table, query, dialect, &mut binds));

    match &query.order {
        Some(Order::Keys(keys)) if !keys.is_empty() => {
            sql.push_str(" ORDER BY ");
            sql.push_str(&render_sort_keys(keys, dialect));
        }
        Some(Order::Raw(raw)) => {
            sql.push_str(" ORDER BY ");
            sql.push_str(raw);
        }
        _ => {}
    }

    if let Some(window) = window {
        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            window.limit.min(MAX_WINDOW),
            window.offset.min(MAX_WINDOW)
        ));
    }

    SqlStatement { sql, binds }
}

/// `SELECT COUNT(*)` under the same constraints and visibility
pub fn render_count(table: &str, query: &CompiledQuery, dialect: Dialect) -> SqlStatement {
    let mut binds = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table, dialect));
    sql.push_str(&render_where(table, query, dialect, &mut binds));
    SqlStatement { sql, binds }
}

/// Visibility predicate for the tombstone column, if any
pub fn visibility_predicate(visibility: Visibility, dialect: Dialect) -> Option<String> {
    let column = quote_identifier(DELETED_AT_COLUMN, dialect);
    match visibility {
        Visibility::Active => Some(format!("{} IS NULL", column)),
        Visibility::OnlyDeleted => Some(format!("{} IS NOT NULL", column)),
        Visibility::All => None,
    }
}

/// ` WHERE ...` clause (empty when unconstrained); appends to `binds`.
///
/// `table` is the row type unqualified fields belong to.
pub fn render_where(
    table: &str,
    query: &CompiledQuery,
    dialect: Dialect,
    binds: &mut Vec<Bind>,
) -> String {
    let mut predicates: Vec<String> = query
        .constraints
        .iter()
        .map(|constraint| render_constraint(table, constraint, dialect, binds))
        .collect();
    predicates.extend(visibility_predicate(query.visibility, dialect));

    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

/// Placeholder for `value`, typed like `field` under Postgres
fn push_value(table: &str, field: &str, value: &Value, dialect: Dialect, binds: &mut Vec<Bind>) -> String {
    match dialect {
        Dialect::Postgres => {
            let (record, column) = field.rsplit_once('.').unwrap_or((table, field));
            let mut object = Map::new();
            object.insert(column.to_string(), value.clone());
            binds.push(Bind::Value(Value::Object(object)));
            format!(
                "(jsonb_populate_record(NULL::{}, {})).{}",
                quote_identifier(record, dialect),
                dialect.placeholder(binds.len()),
                quote_identifier(column, dialect)
            )
        }
        Dialect::MySql => {
            binds.push(Bind::Value(value.clone()));
            dialect.placeholder(binds.len())
        }
    }
}

fn render_constraint(
    table: &str,
    constraint: &Constraint,
    dialect: Dialect,
    binds: &mut Vec<Bind>,
) -> String {
    match constraint {
        Constraint::Compare { field, op, value } => {
            let column = quote_identifier(field, dialect);
            let param = push_value(table, field, value, dialect, binds);
            format!("{} {} {}", column, op.as_sql(), param)
        }
        Constraint::In { field, values } => {
            if values.is_empty() {
                return "FALSE".to_string();
            }
            let column = quote_identifier(field, dialect);
            let params: Vec<String> = values
                .iter()
                .map(|value| push_value(table, field, value, dialect, binds))
                .collect();
            format!("{} IN ({})", column, params.join(", "))
        }
        Constraint::Range { field, low, high } => {
            let column = quote_identifier(field, dialect);
            let low = push_value(table, field, low, dialect, binds);
            let high = push_value(table, field, high, dialect, binds);
            format!("{} BETWEEN {} AND {}", column, low, high)
        }
        Constraint::AnyLike(terms) => {
            let alternatives: Vec<String> = terms
                .iter()
                .map(|term| {
                    let column = quote_identifier(&term.field, dialect);
                    binds.push(Bind::Pattern(term.pattern.clone()));
                    let param = dialect.placeholder(binds.len());
                    match dialect {
                        Dialect::Postgres => format!("CAST({} AS TEXT) ILIKE {}", column, param),
                        Dialect::MySql => format!("{} LIKE {}", column, param),
                    }
                })
                .collect();
            format!("({})", alternatives.join(" OR "))
        }
    }
}

fn render_sort_keys(keys: &[SortKey], dialect: Dialect) -> String {
    keys.iter()
        .map(|key| {
            let direction = match key.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{} {}", quote_identifier(&key.field, dialect), direction)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
