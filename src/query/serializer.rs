//! Canonical wire query for the data API.
//!
//! The backend speaks the server-side datatable protocol extended with a few
//! `additional_*` parameters. Join statements, preloads and order statements
//! travel as JSON strings inside single parameters; the backend decodes them
//! with a JSON parser, so their encoding is part of the protocol.
//!
//! Parameter order is fixed: `search`, `additional_join_statements`,
//! `additional_search_queries`, `additional_order_statements`, `draw`,
//! `length`, `model`, `columns`, `order`, `preloads`, `start`, followed by
//! any append parameters that do not override one of these.

use super::value::QueryValue;
use crate::error::{PanelLinkError, Result};
use crate::models::{QueryDescription, SortSpec};
use serde::Serialize;

/// Separator between free-text predicates in `additional_search_queries`.
pub const PREDICATE_SEPARATOR: &str = "|";

#[derive(Serialize)]
struct OrderStatement<'a> {
    column: &'a str,
    dir: &'static str,
}

/// Serialize a query description into the query string sent after `?`.
///
/// The result is byte-identical for equal inputs.
pub fn serialize(query: &QueryDescription) -> Result<String> {
    Ok(build_params(query)?.to_query_string())
}

/// Build the ordered parameter tree for `query`.
pub fn build_params(query: &QueryDescription) -> Result<QueryValue> {
    let mut filters = QueryValue::map();
    for (field, value) in query.active_filters() {
        filters.insert(field.clone(), QueryValue::scalar(value));
    }

    let mut params = QueryValue::map()
        .with(
            "search",
            QueryValue::map()
                .with("regex", QueryValue::scalar("false"))
                .with("value", filters),
        )
        .with("additional_join_statements", QueryValue::Scalar(to_json(&query.joins)?));

    match search_string(&query.predicates, &query.default_predicates) {
        Some(search) => params.insert("additional_search_queries", QueryValue::Scalar(search)),
        None => params.insert("additional_search_queries", QueryValue::Null),
    }

    params.insert(
        "additional_order_statements",
        QueryValue::Scalar(order_statements(query.sort.as_ref())?),
    );
    params.insert("draw", QueryValue::scalar("1"));
    params.insert("length", QueryValue::scalar(query.pagination.page_size));
    params.insert("model", QueryValue::scalar(&query.model));

    let mut columns = QueryValue::map();
    for (index, column) in query.columns.iter().enumerate() {
        let (data, name) = column.wire_pair();
        columns.insert(
            index.to_string(),
            QueryValue::map()
                .with("data", QueryValue::scalar(data))
                .with("name", QueryValue::scalar(name)),
        );
    }
    params.insert("columns", columns);

    params.insert(
        "order",
        QueryValue::map().with(
            "0",
            QueryValue::map()
                .with("column", QueryValue::scalar("0"))
                .with("dir", QueryValue::scalar("desc")),
        ),
    );
    params.insert("preloads", QueryValue::Scalar(to_json(&query.preloads)?));
    params.insert("start", QueryValue::scalar(query.pagination.start()));

    for (key, value) in &query.append {
        params.insert(key.clone(), QueryValue::from(value));
    }

    Ok(params)
}

/// Join active predicates with `|`, falling back to `defaults` when none is
/// active. Returns `None` when both are empty.
pub fn search_string(active: &[String], defaults: &[String]) -> Option<String> {
    let active: Vec<&str> = active
        .iter()
        .map(String::as_str)
        .filter(|p| !p.is_empty())
        .collect();
    let chosen: Vec<&str> = if active.is_empty() {
        defaults
            .iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .collect()
    } else {
        active
    };
    if chosen.is_empty() {
        None
    } else {
        Some(chosen.join(PREDICATE_SEPARATOR))
    }
}

/// Render filters as `key=value` predicates (empty values skipped).
pub fn filter_predicates<'a>(
    filters: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Vec<String> {
    filters
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, v))
        .collect()
}

fn order_statements(sort: Option<&SortSpec>) -> Result<String> {
    let statements: Vec<OrderStatement<'_>> = sort
        .map(|s| OrderStatement {
            column: s.field.as_str(),
            dir: s.direction.as_str(),
        })
        .into_iter()
        .collect();
    to_json(&statements)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        PanelLinkError::SerializationError(format!("Failed to encode query parameter: {}", e))
    })
}
