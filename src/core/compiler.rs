//! Query compiler
//!
//! Turns a [`FilterRequest`] into a [`CompiledQuery`]: a store-neutral list
//! of constraints that every [`Store`](crate::core::store::Store) adapter
//! knows how to execute. Compilation is a pure fold over the filters in
//! listed order. Either the whole request compiles or nothing does; a
//! partially-validated query is never handed to a store.
//!
//! Column names are checked against a strict identifier grammar and values
//! are carried as data, so adapters can bind them as parameters and never
//! splice caller input into query text.

use crate::core::entity::Entity;
use crate::core::error::{CrudError, CrudResult};
use crate::core::query::{
    FILTER_SEPARATOR, FILTER_VALUE_ALL, FILTER_VALUE_DELETED, Filter, FilterRequest, Operator,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

static COLUMN_REGEX: OnceLock<Regex> = OnceLock::new();
static RELATION_REGEX: OnceLock<Regex> = OnceLock::new();

/// `column` or `table.column`
pub fn is_column_identifier(name: &str) -> bool {
    COLUMN_REGEX
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap()
        })
        .is_match(name)
}

/// Dotted relation path such as `Profile.Address`
pub fn is_relation_path(name: &str) -> bool {
    RELATION_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap())
        .is_match(name)
}

/// Soft-delete visibility of a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Live rows only
    #[default]
    Active,
    /// Live and tombstoned rows
    All,
    /// Tombstoned rows only
    OnlyDeleted,
}

impl Visibility {
    /// Whether a row with the given tombstone state is visible
    pub fn admits(&self, deleted: bool) -> bool {
        match self {
            Visibility::Active => !deleted,
            Visibility::All => true,
            Visibility::OnlyDeleted => deleted,
        }
    }
}

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// One `field LIKE pattern` term of an OR group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeTerm {
    pub field: String,
    pub pattern: String,
}

/// A store-level predicate. All constraints of a query are conjoined.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// `field op value`
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// `field IN (values)`; an empty set matches nothing
    In { field: String, values: Vec<Value> },
    /// `field BETWEEN low AND high`, inclusive
    Range {
        field: String,
        low: Value,
        high: Value,
    },
    /// `(t1 OR t2 OR ...)` over LIKE terms
    AnyLike(Vec<LikeTerm>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Compiled sort clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    /// Validated sort keys
    Keys(Vec<SortKey>),
    /// Caller-supplied clause kept verbatim
    Raw(String),
}

/// How the caller's `order` clause is treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    /// Parse into sort keys and check columns against the entity allow-list
    #[default]
    Strict,
    /// Forward the clause verbatim to the store
    Passthrough,
}

/// Per-call compilation settings
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions<'a> {
    pub order_policy: OrderPolicy,
    /// Columns accepted in sort keys; empty accepts any identifier
    pub sortable_fields: &'a [&'a str],
}

impl CompileOptions<'static> {
    /// Options carrying the sortable columns declared by `T`
    pub fn for_entity<T: Entity>(order_policy: OrderPolicy) -> Self {
        Self {
            order_policy,
            sortable_fields: T::sortable_fields(),
        }
    }
}

/// Result of compiling a [`FilterRequest`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    /// Relations to eager-load, in request order
    pub preloads: Vec<String>,
    /// Conjoined constraints, in filter order
    pub constraints: Vec<Constraint>,
    pub visibility: Visibility,
    pub order: Option<Order>,
}

impl CompiledQuery {
    /// Query with no constraints and default visibility
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Compile a whole request.
///
/// # Errors
///
/// Any filter failing validation aborts compilation with the error of the
/// first offending filter.
pub fn compile(request: &FilterRequest, options: &CompileOptions<'_>) -> CrudResult<CompiledQuery> {
    let mut query = CompiledQuery::new();

    for relation in &request.preloads {
        if !is_relation_path(relation) {
            return Err(CrudError::InvalidFilter {
                field: relation.clone(),
                message: "preload is not a relation path".to_string(),
            });
        }
        query.preloads.push(relation.clone());
    }

    for filter in &request.filters {
        compile_filter(filter, &mut query)?;
    }

    query.order = compile_order(request.order.as_deref(), options)?;

    tracing::trace!(
        constraints = query.constraints.len(),
        visibility = ?query.visibility,
        "compiled filter request"
    );

    Ok(query)
}

/// Fold a single filter into `query`
pub fn compile_filter(filter: &Filter, query: &mut CompiledQuery) -> CrudResult<()> {
    tracing::trace!(
        field = %filter.field,
        operator = %filter.operator,
        value = %filter.value,
        "compiling filter"
    );

    if !filter.check() {
        return Err(CrudError::InvalidFilter {
            field: filter.field.clone(),
            message: "field, operator and a non-null value are required".to_string(),
        });
    }

    if filter.is_visibility_override() {
        match filter.value.as_str() {
            Some(FILTER_VALUE_ALL) => query.visibility = Visibility::All,
            Some(FILTER_VALUE_DELETED) => query.visibility = Visibility::OnlyDeleted,
            _ => {}
        }
        return Ok(());
    }

    let operator: Operator = filter.operator.parse()?;

    match operator {
        Operator::Eq => compile_compare(filter, CompareOp::Eq, query),
        Operator::Ne => compile_compare(filter, CompareOp::Ne, query),
        Operator::Gt => compile_compare(filter, CompareOp::Gt, query),
        Operator::Ge => compile_compare(filter, CompareOp::Ge, query),
        Operator::Lt => compile_compare(filter, CompareOp::Lt, query),
        Operator::Le => compile_compare(filter, CompareOp::Le, query),
        Operator::In => compile_in(filter, query),
        Operator::Between => compile_between(filter, query),
        Operator::Like => compile_like(filter, query),
    }
}

fn require_column(field: &str) -> CrudResult<()> {
    if is_column_identifier(field) {
        Ok(())
    } else {
        Err(CrudError::InvalidFilter {
            field: field.to_string(),
            message: "field is not a column identifier".to_string(),
        })
    }
}

fn is_scalar(value: &Value) -> bool {
    !(value.is_array() || value.is_object())
}

fn value_type_error(filter: &Filter, expected: &'static str) -> CrudError {
    CrudError::InvalidFilterValueType {
        field: filter.field.clone(),
        operator: filter.operator.clone(),
        expected,
    }
}

fn compile_compare(filter: &Filter, op: CompareOp, query: &mut CompiledQuery) -> CrudResult<()> {
    require_column(&filter.field)?;
    if !is_scalar(&filter.value) {
        return Err(value_type_error(filter, "a scalar"));
    }
    query.constraints.push(Constraint::Compare {
        field: filter.field.clone(),
        op,
        value: filter.value.clone(),
    });
    Ok(())
}

fn compile_in(filter: &Filter, query: &mut CompiledQuery) -> CrudResult<()> {
    require_column(&filter.field)?;
    let Some(values) = filter.value.as_array() else {
        return Err(value_type_error(filter, "a list"));
    };
    if !values.iter().all(is_scalar) {
        return Err(value_type_error(filter, "a list of scalars"));
    }
    query.constraints.push(Constraint::In {
        field: filter.field.clone(),
        values: values.clone(),
    });
    Ok(())
}

fn compile_between(filter: &Filter, query: &mut CompiledQuery) -> CrudResult<()> {
    require_column(&filter.field)?;
    let Some(values) = filter.value.as_array() else {
        return Err(value_type_error(filter, "a [low, high] list"));
    };
    let [low, high] = values.as_slice() else {
        return Err(CrudError::InvalidFilterValueSize {
            field: filter.field.clone(),
            operator: filter.operator.clone(),
            expected: 2,
            actual: values.len(),
        });
    };
    if !is_scalar(low) || !is_scalar(high) {
        return Err(value_type_error(filter, "a [low, high] list of scalars"));
    }

    let field = filter.field.clone();
    let constraint = match (low.is_null(), high.is_null()) {
        (false, false) => Constraint::Range {
            field,
            low: low.clone(),
            high: high.clone(),
        },
        (false, true) => Constraint::Compare {
            field,
            op: CompareOp::Ge,
            value: low.clone(),
        },
        (true, false) => Constraint::Compare {
            field,
            op: CompareOp::Le,
            value: high.clone(),
        },
        // open on both ends
        (true, true) => return Ok(()),
    };
    query.constraints.push(constraint);
    Ok(())
}

fn compile_like(filter: &Filter, query: &mut CompiledQuery) -> CrudResult<()> {
    let Some(needles) = filter.value.as_str() else {
        return Err(value_type_error(filter, "a string"));
    };

    let fields: Vec<&str> = filter
        .field
        .split(FILTER_SEPARATOR)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    let needles: Vec<&str> = needles
        .split(FILTER_SEPARATOR)
        .filter(|v| !v.is_empty())
        .collect();

    if fields.is_empty() || needles.is_empty() {
        return Err(CrudError::InvalidFilter {
            field: filter.field.clone(),
            message: "like needs at least one field and one value".to_string(),
        });
    }
    for field in &fields {
        require_column(field)?;
    }

    let terms = fields
        .iter()
        .flat_map(|field| {
            needles.iter().map(move |needle| LikeTerm {
                field: (*field).to_string(),
                pattern: format!("%{}%", needle),
            })
        })
        .collect();

    query.constraints.push(Constraint::AnyLike(terms));
    Ok(())
}

fn compile_order(order: Option<&str>, options: &CompileOptions<'_>) -> CrudResult<Option<Order>> {
    let Some(order) = order.map(str::trim).filter(|o| !o.is_empty()) else {
        return Ok(None);
    };

    match options.order_policy {
        OrderPolicy::Passthrough => Ok(Some(Order::Raw(order.to_string()))),
        OrderPolicy::Strict => {
            let keys = parse_order(order).map_err(|message| CrudError::InvalidOrder {
                order: order.to_string(),
                message,
            })?;
            if !options.sortable_fields.is_empty() {
                if let Some(key) = keys
                    .iter()
                    .find(|k| !options.sortable_fields.contains(&k.field.as_str()))
                {
                    return Err(CrudError::InvalidOrder {
                        order: order.to_string(),
                        message: format!("'{}' is not sortable", key.field),
                    });
                }
            }
            Ok(Some(Order::Keys(keys)))
        }
    }
}

/// Parse `col [asc|desc], col [asc|desc], ...` into sort keys
pub fn parse_order(order: &str) -> Result<Vec<SortKey>, String> {
    order
        .split(',')
        .map(|part| {
            let mut tokens = part.split_whitespace();
            let field = tokens
                .next()
                .ok_or_else(|| "empty sort key".to_string())?;
            if !is_column_identifier(field) {
                return Err(format!("'{}' is not a column identifier", field));
            }
            let direction = match tokens.next() {
                None => SortDirection::Asc,
                Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                Some(dir) => return Err(format!("unknown sort direction '{}'", dir)),
            };
            if let Some(extra) = tokens.next() {
                return Err(format!("unexpected token '{}'", extra));
            }
            Ok(SortKey {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}
