//! # Cursor Pagination Types
//!
//! Relay-style connection shapes: `{edges: [{node, cursor}], pageInfo,
//! totalCount}` with `{first, after}` / `{last, before}` requests, plus
//! the filter/sort specification that scopes a collection query.
//!
//! Cursors are opaque position markers minted by the server; the client
//! never decodes them, only hands them back. Cursor order is stable for a
//! fixed (collection, filters, sort) tuple. `total_count` is advisory and
//! may be stale under concurrent writes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wire::record::Record;

/// Opaque pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

/// One filter predicate: field, operator, value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
}

/// Sort specification: field plus direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Which page to fetch. Forward pagination walks `{first, after}`,
/// backward walks `{last, before}`.
#[derive(Debug, Clone)]
pub enum PageRequest {
    Forward { first: u32, after: Option<Cursor> },
    Backward { last: u32, before: Option<Cursor> },
}

impl PageRequest {
    /// First page of a forward traversal.
    pub fn first(page_size: u32) -> Self {
        PageRequest::Forward {
            first: page_size,
            after: None,
        }
    }

    pub fn page_size(&self) -> u32 {
        match self {
            PageRequest::Forward { first, .. } => *first,
            PageRequest::Backward { last, .. } => *last,
        }
    }

    /// Folds the request into the variables map for the wire envelope.
    pub fn apply_to(&self, variables: &mut serde_json::Map<String, Value>) {
        match self {
            PageRequest::Forward { first, after } => {
                variables.insert("first".to_string(), Value::from(*first));
                if let Some(Cursor(c)) = after {
                    variables.insert("after".to_string(), Value::from(c.clone()));
                }
            }
            PageRequest::Backward { last, before } => {
                variables.insert("last".to_string(), Value::from(*last));
                if let Some(Cursor(c)) = before {
                    variables.insert("before".to_string(), Value::from(c.clone()));
                }
            }
        }
    }
}

/// A record paired with its position cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub node: Record,
    pub cursor: Cursor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<Cursor>,
    pub end_cursor: Option<Cursor>,
}

/// One page of a paginated collection result. Pages are never mutated in
/// place; a refresh produces a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
    pub total_count: Option<u64>,
}

impl Page {
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.edges.iter().map(|e| &e.node)
    }
}
