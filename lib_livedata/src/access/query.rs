//! # Collection Query Accessor
//!
//! Fetches pages of records matching a filter/sort specification. Reads
//! have no side effects and are safe to invoke repeatedly, so transient
//! failures are retried under the client's policy.

use serde_json::{Map, Value};

use crate::errors::ApiError;
use crate::transport::http::ApiClient;
use crate::utils::backoff::{with_retries, RetryPolicy};
use crate::wire::envelope::WireRequest;
use crate::wire::page::{Cursor, Filter, Page, PageRequest, Sort};
use crate::wire::record::Record;

/// Traversal guard for `fetch_all` against a server that never reports
/// the last page.
const MAX_TRAVERSED_PAGES: u32 = 10_000;

const COLLECTION_QUERY: &str = "\
query Collection($collection: String!, $filters: [Filter!], $sort: Sort, \
$first: Int, $after: String, $last: Int, $before: String) {\n\
  collection(name: $collection, filters: $filters, sort: $sort, \
first: $first, after: $after, last: $last, before: $before) {\n\
    edges { node cursor }\n\
    pageInfo { hasNextPage hasPreviousPage startCursor endCursor }\n\
    totalCount\n\
  }\n\
}";

/// What to fetch: collection, filter predicates, sort, and which page.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub page: PageRequest,
}

impl QuerySpec {
    /// A forward query over `collection` with the given page size.
    pub fn new(collection: impl Into<String>, page_size: u32) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            sort: None,
            page: PageRequest::first(page_size),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    fn variables(&self) -> Result<Value, ApiError> {
        if self.page.page_size() == 0 {
            return Err(ApiError::ValidationFailed {
                message: "page size must be greater than zero".to_string(),
                fields: Vec::new(),
            });
        }
        let mut vars = Map::new();
        vars.insert("collection".to_string(), Value::from(self.collection.clone()));
        if !self.filters.is_empty() {
            vars.insert(
                "filters".to_string(),
                serde_json::to_value(&self.filters)
                    .map_err(|e| ApiError::Unknown(e.to_string()))?,
            );
        }
        if let Some(sort) = &self.sort {
            vars.insert(
                "sort".to_string(),
                serde_json::to_value(sort).map_err(|e| ApiError::Unknown(e.to_string()))?,
            );
        }
        self.page.apply_to(&mut vars);
        Ok(Value::Object(vars))
    }
}

/// Fetches one page of records matching `spec`.
pub async fn fetch_page(client: &ApiClient, spec: &QuerySpec) -> Result<Page, ApiError> {
    fetch_page_with_policy(client, spec, &RetryPolicy::default()).await
}

/// `fetch_page` with an explicit retry policy for transient failures.
pub async fn fetch_page_with_policy(
    client: &ApiClient,
    spec: &QuerySpec,
    policy: &RetryPolicy,
) -> Result<Page, ApiError> {
    let variables = spec.variables()?;
    let request = WireRequest::new(COLLECTION_QUERY, variables);
    let data = with_retries(policy, || client.execute(&request, None)).await?;
    let connection = data
        .get("collection")
        .cloned()
        .ok_or_else(|| ApiError::Unknown("response data missing 'collection'".to_string()))?;
    serde_json::from_value(connection)
        .map_err(|e| ApiError::Unknown(format!("malformed connection payload: {}", e)))
}

/// Walks the whole collection forward from the spec's starting page and
/// returns every record. Intended for read-only snapshots; ids are
/// distinct because cursor order is stable for a fixed query.
pub async fn fetch_all(client: &ApiClient, spec: &QuerySpec) -> Result<Vec<Record>, ApiError> {
    let mut records = Vec::new();
    let mut pager = Pager::new(spec.clone());
    let mut traversed = 0u32;
    while let Some(page) = pager.load_more(client).await? {
        records.extend(page.records().cloned());
        traversed += 1;
        if traversed >= MAX_TRAVERSED_PAGES {
            return Err(ApiError::Unknown(format!(
                "aborting traversal after {} pages",
                traversed
            )));
        }
    }
    Ok(records)
}

/// Stateful "load more" helper: remembers the last end cursor and stops
/// once the server reports no further page.
#[derive(Debug)]
pub struct Pager {
    spec: QuerySpec,
    next_after: Option<Cursor>,
    exhausted: bool,
    started: bool,
}

impl Pager {
    pub fn new(spec: QuerySpec) -> Self {
        Self {
            spec,
            next_after: None,
            exhausted: false,
            started: false,
        }
    }

    /// Whether every page has been consumed.
    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next page, or `None` once the traversal is complete.
    pub async fn load_more(&mut self, client: &ApiClient) -> Result<Option<Page>, ApiError> {
        if self.exhausted {
            return Ok(None);
        }
        let first = self.spec.page.page_size();
        let mut spec = self.spec.clone();
        if self.started {
            spec.page = PageRequest::Forward {
                first,
                after: self.next_after.clone(),
            };
        }
        let page = fetch_page(client, &spec).await?;
        self.advance(&page)?;
        Ok(Some(page))
    }

    /// Moves the traversal cursor past `page`. A page claiming more
    /// results without an end cursor would restart the walk from the
    /// beginning, so it is rejected as malformed.
    fn advance(&mut self, page: &Page) -> Result<(), ApiError> {
        self.started = true;
        if !page.page_info.has_next_page {
            self.exhausted = true;
            return Ok(());
        }
        match &page.page_info.end_cursor {
            Some(cursor) => {
                self.next_after = Some(cursor.clone());
                Ok(())
            }
            None => {
                self.exhausted = true;
                Err(ApiError::Unknown(
                    "server reported another page without an end cursor".to_string(),
                ))
            }
        }
    }
}
