//! In-memory implementation of the store port for testing and development
//!
//! Rows are kept as JSON objects keyed by identity. Every [`Constraint`] is
//! evaluated with SQL-like semantics: comparisons against a missing or null
//! column are false, `LIKE` understands `%` and `_` and ignores case, and
//! nulls sort first.
//!
//! A filter value is converted to the type of the column it meets, as a
//! typed SQL column would: `"10"` equals an integer column holding 10, `5`
//! equals a text column holding `"5"`. A value the column cannot take (`"ten"`
//! or `5.5` against an integer column) fails the query.

use crate::core::compiler::{self, CompiledQuery, Constraint, Order, SortDirection, SortKey, Visibility};
use crate::core::entity::{Entity, Id};
use crate::core::store::{
    CREATED_AT_COLUMN, DELETED_AT_COLUMN, PRIMARY_KEY_COLUMN, Store, StoreError,
    UPDATED_AT_COLUMN, Window,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const BACKEND: &str = "memory";

#[derive(Debug, Clone)]
struct Row {
    data: Map<String, Value>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Row {
    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Column value as seen by queries
    fn column(&self, id: Id, field: &str) -> Value {
        // qualified names address the single table this store holds
        let column = field.rsplit('.').next().unwrap_or(field);
        match column {
            PRIMARY_KEY_COLUMN => Value::from(id),
            DELETED_AT_COLUMN => timestamp_value(self.deleted_at),
            _ => self.data.get(column).cloned().unwrap_or(Value::Null),
        }
    }
}

fn timestamp_value(ts: Option<DateTime<Utc>>) -> Value {
    ts.and_then(|ts| serde_json::to_value(ts).ok())
        .unwrap_or(Value::Null)
}

/// Overwrite `key` only when the entity type declares that column
fn stamp(data: &mut Map<String, Value>, key: &str, value: Value) {
    if let Some(slot) = data.get_mut(key) {
        *slot = value;
    }
}

/// In-memory store
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// clones share the same rows.
pub struct InMemoryStore<T> {
    rows: Arc<RwLock<BTreeMap<Id, Row>>>,
    next_id: Arc<AtomicU64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for InMemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            next_id: Arc::clone(&self.next_id),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            _marker: PhantomData,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Id, Row>>, StoreError> {
        self.rows.read().map_err(|e| StoreError::Query {
            backend: BACKEND.to_string(),
            message: format!("Failed to acquire read lock: {}", e),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Id, Row>>, StoreError> {
        self.rows.write().map_err(|e| StoreError::Query {
            backend: BACKEND.to_string(),
            message: format!("Failed to acquire write lock: {}", e),
        })
    }
}

impl<T: Entity> InMemoryStore<T> {
    fn to_data(entity: &T) -> Result<Map<String, Value>, StoreError> {
        match serde_json::to_value(entity) {
            Ok(Value::Object(data)) => Ok(data),
            Ok(other) => Err(StoreError::Serialization {
                backend: BACKEND.to_string(),
                message: format!("{} serialized to {} instead of an object", T::type_name(), other),
            }),
            Err(e) => Err(StoreError::Serialization {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn materialize(id: Id, row: &Row) -> Result<T, StoreError> {
        let mut data = row.data.clone();
        data.insert(PRIMARY_KEY_COLUMN.to_string(), Value::from(id));
        stamp(&mut data, DELETED_AT_COLUMN, timestamp_value(row.deleted_at));

        let mut entity: T =
            serde_json::from_value(Value::Object(data)).map_err(|e| StoreError::Serialization {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            })?;
        entity.set_primary_key(id);
        Ok(entity)
    }

    fn matching(rows: &BTreeMap<Id, Row>, query: &CompiledQuery) -> Result<Vec<(Id, Row)>, StoreError> {
        let mut matched = Vec::new();
        for (id, row) in rows {
            if !query.visibility.admits(row.is_deleted()) {
                continue;
            }
            let mut keep = true;
            for constraint in &query.constraints {
                keep &= satisfies(*id, row, constraint)?;
            }
            if keep {
                matched.push((*id, row.clone()));
            }
        }
        Ok(matched)
    }
}

#[async_trait]
impl<T: Entity> Store<T> for InMemoryStore<T> {
    async fn find_by_id(
        &self,
        id: Id,
        preloads: &[String],
        visibility: Visibility,
    ) -> Result<Option<T>, StoreError> {
        if !preloads.is_empty() {
            tracing::trace!(?preloads, "in-memory store ignores preloads");
        }
        let rows = self.read()?;
        match rows.get(&id) {
            Some(row) if visibility.admits(row.is_deleted()) => Ok(Some(Self::materialize(id, row)?)),
            _ => Ok(None),
        }
    }

    async fn query(
        &self,
        query: &CompiledQuery,
        window: Option<Window>,
    ) -> Result<Vec<T>, StoreError> {
        let mut matched = {
            let rows = self.read()?;
            Self::matching(&rows, query)?
        };

        match &query.order {
            Some(Order::Keys(keys)) => sort_rows(&mut matched, keys),
            Some(Order::Raw(raw)) => {
                let keys = compiler::parse_order(raw).map_err(|message| StoreError::Query {
                    backend: BACKEND.to_string(),
                    message: format!("unsupported order clause '{}': {}", raw, message),
                })?;
                sort_rows(&mut matched, &keys);
            }
            None => {}
        }

        let (offset, limit) = match window {
            Some(w) => (
                usize::try_from(w.offset).unwrap_or(usize::MAX),
                usize::try_from(w.limit).unwrap_or(usize::MAX),
            ),
            None => (0, usize::MAX),
        };

        matched
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(id, row)| Self::materialize(*id, row))
            .collect()
    }

    async fn count(&self, query: &CompiledQuery) -> Result<u64, StoreError> {
        let rows = self.read()?;
        Ok(Self::matching(&rows, query)?.len() as u64)
    }

    async fn insert(&self, entity: T) -> Result<T, StoreError> {
        let mut data = Self::to_data(&entity)?;
        let now = timestamp_value(Some(Utc::now()));
        stamp(&mut data, CREATED_AT_COLUMN, now.clone());
        stamp(&mut data, UPDATED_AT_COLUMN, now);
        stamp(&mut data, DELETED_AT_COLUMN, Value::Null);

        let mut rows = self.write()?;
        let id = match entity.primary_key() {
            0 => loop {
                let candidate = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                if !rows.contains_key(&candidate) {
                    break candidate;
                }
            },
            explicit if rows.contains_key(&explicit) => {
                return Err(StoreError::Constraint {
                    backend: BACKEND.to_string(),
                    message: format!("duplicate primary key {}", explicit),
                });
            }
            explicit => explicit,
        };

        let row = Row {
            data,
            deleted_at: None,
        };
        let created = Self::materialize(id, &row)?;
        rows.insert(id, row);
        Ok(created)
    }

    async fn save(&self, entity: &T) -> Result<u64, StoreError> {
        let id = entity.primary_key();
        let mut data = Self::to_data(entity)?;

        let mut rows = self.write()?;
        let Some(row) = rows.get_mut(&id).filter(|row| !row.is_deleted()) else {
            return Ok(0);
        };

        let created_at = row.data.get(CREATED_AT_COLUMN).cloned().unwrap_or(Value::Null);
        stamp(&mut data, CREATED_AT_COLUMN, created_at);
        stamp(&mut data, UPDATED_AT_COLUMN, timestamp_value(Some(Utc::now())));
        row.data = data;
        Ok(1)
    }

    async fn update_fields(&self, id: Id, fields: &Map<String, Value>) -> Result<u64, StoreError> {
        let mut rows = self.write()?;
        let Some(row) = rows.get_mut(&id).filter(|row| !row.is_deleted()) else {
            return Ok(0);
        };

        let mut data = row.data.clone();
        for (field, value) in fields {
            if field == PRIMARY_KEY_COLUMN || field == DELETED_AT_COLUMN {
                return Err(StoreError::Constraint {
                    backend: BACKEND.to_string(),
                    message: format!("column '{}' is store-managed", field),
                });
            }
            let Some(slot) = data.get_mut(field) else {
                return Err(StoreError::Query {
                    backend: BACKEND.to_string(),
                    message: format!("unknown column '{}'", field),
                });
            };
            *slot = value.clone();
        }
        stamp(&mut data, UPDATED_AT_COLUMN, timestamp_value(Some(Utc::now())));

        // reject values the entity type cannot hold, like a typed column would
        let candidate = Row {
            data,
            deleted_at: row.deleted_at,
        };
        Self::materialize(id, &candidate).map_err(|e| StoreError::Constraint {
            backend: BACKEND.to_string(),
            message: e.to_string(),
        })?;

        *row = candidate;
        Ok(1)
    }

    async fn soft_delete(&self, id: Id) -> Result<u64, StoreError> {
        let mut rows = self.write()?;
        match rows.get_mut(&id) {
            Some(row) if !row.is_deleted() => {
                row.deleted_at = Some(Utc::now());
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn clear_tombstone(&self, id: Id) -> Result<u64, StoreError> {
        let mut rows = self.write()?;
        match rows.get_mut(&id) {
            Some(row) if row.is_deleted() => {
                row.deleted_at = None;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn hard_delete(&self, id: Id) -> Result<u64, StoreError> {
        let mut rows = self.write()?;
        Ok(rows.remove(&id).map_or(0, |_| 1))
    }
}

// ---------------------------------------------------------------------------
// Constraint evaluation
// ---------------------------------------------------------------------------

fn satisfies(id: Id, row: &Row, constraint: &Constraint) -> Result<bool, StoreError> {
    let matched = match constraint {
        Constraint::Compare { field, op, value } => {
            let Some(ordering) = compare_filter(&row.column(id, field), value, field)? else {
                return Ok(false);
            };
            match op {
                compiler::CompareOp::Eq => ordering == Ordering::Equal,
                compiler::CompareOp::Ne => ordering != Ordering::Equal,
                compiler::CompareOp::Gt => ordering == Ordering::Greater,
                compiler::CompareOp::Ge => ordering != Ordering::Less,
                compiler::CompareOp::Lt => ordering == Ordering::Less,
                compiler::CompareOp::Le => ordering != Ordering::Greater,
            }
        }
        Constraint::In { field, values } => {
            let column = row.column(id, field);
            let mut found = false;
            for value in values {
                found |= compare_filter(&column, value, field)? == Some(Ordering::Equal);
            }
            found
        }
        Constraint::Range { field, low, high } => {
            let column = row.column(id, field);
            let above = compare_filter(&column, low, field)?;
            let below = compare_filter(&column, high, field)?;
            matches!(above, Some(Ordering::Greater | Ordering::Equal))
                && matches!(below, Some(Ordering::Less | Ordering::Equal))
        }
        Constraint::AnyLike(terms) => terms.iter().any(|term| {
            let text = match row.column(id, &term.field) {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return false,
            };
            like_matches(&text, &term.pattern)
        }),
    };
    Ok(matched)
}

/// [`compare`] surfacing unconvertible filter values as query errors
fn compare_filter(column: &Value, value: &Value, field: &str) -> Result<Option<Ordering>, StoreError> {
    compare(column, value).map_err(|message| StoreError::Query {
        backend: BACKEND.to_string(),
        message: format!("filter on '{}': {}", field, message),
    })
}

/// Compare a column with a filter value converted to the column's type.
///
/// `Ok(None)` when the column is null or the numbers are unordered.
fn compare(column: &Value, value: &Value) -> Result<Option<Ordering>, String> {
    let ordering = match column {
        Value::Null => return Ok(None),
        Value::Number(column) => compare_numbers(column, &number_for(column, value)?),
        Value::String(column) => Some(column.as_str().cmp(text_for(value)?.as_str())),
        Value::Bool(column) => Some(column.cmp(&bool_for(value)?)),
        _ => return Err("column does not hold a scalar".to_string()),
    };
    Ok(ordering)
}

fn is_integer(n: &serde_json::Number) -> bool {
    n.is_i64() || n.is_u64()
}

fn number_for(column: &serde_json::Number, value: &Value) -> Result<serde_json::Number, String> {
    let invalid = || format!("{} is not a valid {}", value, if is_integer(column) { "integer" } else { "number" });
    let number = match value {
        Value::Number(n) => n.clone(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                n.into()
            } else if let Ok(n) = s.parse::<u64>() {
                n.into()
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .ok_or_else(invalid)?
            }
        }
        _ => return Err(invalid()),
    };
    if is_integer(column) && !is_integer(&number) {
        return Err(invalid());
    }
    Ok(number)
}

fn text_for(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("{} is not a valid text value", other)),
    }
}

fn bool_for(value: &Value) -> Result<bool, String> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
            "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| format!("{} is not a valid boolean", value))
}

fn compare_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Ordering used for sorting: nulls first, incomparable values equal
fn sort_compare(left: &Value, right: &Value) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare(left, right).ok().flatten().unwrap_or(Ordering::Equal),
    }
}

fn sort_rows(rows: &mut [(Id, Row)], keys: &[SortKey]) {
    rows.sort_by(|(a_id, a), (b_id, b)| {
        keys.iter()
            .map(|key| {
                let ordering = sort_compare(&a.column(*a_id, &key.field), &b.column(*b_id, &key.field));
                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Case-insensitive `LIKE` with `%` (any run) and `_` (any one character)
fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    // matched[j]: pattern[..j] matches the text consumed so far
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }

    for c in &text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == *c,
            };
        }
        matched = next;
    }

    matched[pattern.len()]
}
