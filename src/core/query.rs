//! Filter model, pagination and request envelopes
//!
//! These are the wire-level value types a transport hands to the engine.
//! Nothing here is validated beyond shape; the
//! [compiler](crate::core::compiler) is the only place filters are given
//! meaning.

use crate::core::entity::Id;
use crate::core::error::CrudError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Separator for multi-field / multi-value `like` filters
pub const FILTER_SEPARATOR: char = '|';

/// Reserved field name that toggles soft-delete visibility
pub const FILTER_FIELD_DELETED: &str = "deleted";

/// `deleted` filter value that includes tombstoned rows
pub const FILTER_VALUE_ALL: &str = "all";

/// `deleted` filter value that restricts to tombstoned rows
pub const FILTER_VALUE_DELETED: &str = "deleted";

/// Page size used when a request leaves it unset or zero
pub const DEFAULT_PAGE_SIZE: u64 = 15;

/// Page index used when a request leaves it unset or zero
pub const FIRST_PAGE_INDEX: u64 = 1;

/// Supported filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Between,
    Like,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::In => "in",
            Operator::Between => "between",
            Operator::Like => "like",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CrudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Operator::Eq),
            "<>" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            word if word.eq_ignore_ascii_case("in") => Ok(Operator::In),
            word if word.eq_ignore_ascii_case("between") => Ok(Operator::Between),
            word if word.eq_ignore_ascii_case("like") => Ok(Operator::Like),
            other => Err(CrudError::UnsupportedOperator {
                operator: other.to_string(),
            }),
        }
    }
}

/// A single predicate: `field operator value`
///
/// The operator is kept as the raw string the caller sent so that an
/// unknown operator surfaces as [`CrudError::UnsupportedOperator`] at
/// compile time rather than as a deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,

    #[serde(alias = "operate")]
    pub operator: String,

    #[serde(default)]
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Shape check: non-empty field and operator, non-null value
    pub fn check(&self) -> bool {
        !self.field.is_empty() && !self.operator.is_empty() && !self.value.is_null()
    }

    /// Whether this filter addresses the reserved soft-delete field
    pub fn is_visibility_override(&self) -> bool {
        self.field == FILTER_FIELD_DELETED
    }
}

/// Ordered filter list plus sort clause and eager-load relations
///
/// All filters are conjoined in listed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRequest {
    pub filters: Vec<Filter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    pub preloads: Vec<String>,
}

impl FilterRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter
    pub fn add_filter(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.filters.push(Filter::new(field, operator, value));
        self
    }

    /// Builder form of [`add_filter`](Self::add_filter)
    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.add_filter(field, operator, value);
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn with_preload(mut self, relation: impl Into<String>) -> Self {
        self.preloads.push(relation.into());
        self
    }
}

/// Page position and size, plus the total computed by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pagination {
    /// Page number (starts at 1)
    pub page_index: u64,

    /// Number of records per page
    pub page_size: u64,

    /// Number of records matching the filter (output only)
    pub total: u64,
}

impl Pagination {
    pub fn new(page_index: u64, page_size: u64) -> Self {
        Self {
            page_index,
            page_size,
            total: 0,
        }
    }

    /// Replace unset or zero fields with defaults and clamp the page size
    pub fn normalized(&self, default_page_size: u64, max_page_size: Option<u64>) -> Self {
        let page_index = if self.page_index == 0 {
            FIRST_PAGE_INDEX
        } else {
            self.page_index
        };
        let mut page_size = if self.page_size == 0 {
            default_page_size.max(1)
        } else {
            self.page_size
        };
        if let Some(max) = max_page_size {
            page_size = page_size.min(max.max(1));
        }

        Self {
            page_index,
            page_size,
            total: self.total,
        }
    }

    /// Rows to skip: `(page_index - 1) * page_size`
    pub fn offset(&self) -> u64 {
        self.page_index
            .saturating_sub(1)
            .saturating_mul(self.page_size)
    }

    /// Rows to fetch
    pub fn limit(&self) -> u64 {
        self.page_size
    }

    pub fn total_pages(&self) -> u64 {
        if self.total == 0 || self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }

    pub fn has_next(&self) -> bool {
        self.offset().saturating_add(self.page_size) < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.page_index > 1
    }
}

/// Filter request plus page position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(flatten)]
    pub filter: FilterRequest,

    #[serde(flatten)]
    pub pagination: Pagination,
}

impl PageRequest {
    pub fn new(filter: FilterRequest, page_index: u64, page_size: u64) -> Self {
        Self {
            filter,
            pagination: Pagination::new(page_index, page_size),
        }
    }
}

/// Single-record lookup by identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRequest {
    pub id: Id,

    #[serde(default)]
    pub preloads: Vec<String>,
}

impl IdRequest {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            preloads: Vec::new(),
        }
    }

    pub fn with_preload(mut self, relation: impl Into<String>) -> Self {
        self.preloads.push(relation.into());
        self
    }
}

impl From<Id> for IdRequest {
    fn from(id: Id) -> Self {
        IdRequest::new(id)
    }
}

/// One page of records with its resolved pagination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub pagination: Pagination,
}
