//! Interpretation of the data API's paging envelopes.
//!
//! Endpoints answer in one of two shapes:
//!
//! ```json
//! {"data": {"data": [...], "recordsFiltered": 101}}
//! {"data": [...], "recordsFiltered": 101}
//! ```
//!
//! The nested shape is checked first.

use crate::error::{PanelLinkError, Result};
use crate::models::{GridResult, Record};
use serde_json::Value;

/// A reconciled page together with its page count.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledPage {
    pub result: GridResult,
    pub total_pages: u32,
}

/// Normalize a raw response into a [`GridResult`].
pub fn reconcile(raw: &Value) -> Result<GridResult> {
    let outer = raw.get("data").ok_or_else(|| {
        PanelLinkError::MalformedResponse("response has no 'data' key".to_string())
    })?;

    if let Some(inner) = outer.get("data") {
        let records = records_from(inner, "data.data")?;
        let total = records_filtered(outer, "data.recordsFiltered")?;
        return Ok(GridResult::new(records, total));
    }

    if outer.is_array() {
        let records = records_from(outer, "data")?;
        let total = records_filtered(raw, "recordsFiltered")?;
        return Ok(GridResult::new(records, total));
    }

    Err(PanelLinkError::MalformedResponse(
        "expected 'data' to be a list or to contain 'data'".to_string(),
    ))
}

/// Reconcile and compute `ceil(recordsFiltered / page_size)`.
pub fn reconcile_page(raw: &Value, page_size: u32) -> Result<ReconciledPage> {
    let result = reconcile(raw)?;
    let total_pages = result.total_pages(page_size);
    Ok(ReconciledPage {
        result,
        total_pages,
    })
}

fn records_from(value: &Value, path: &str) -> Result<Vec<Record>> {
    let items = value.as_array().ok_or_else(|| {
        PanelLinkError::MalformedResponse(format!("'{}' is not a list", path))
    })?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object().cloned().ok_or_else(|| {
                PanelLinkError::MalformedResponse(format!("'{}[{}]' is not an object", path, i))
            })
        })
        .collect()
}

fn records_filtered(container: &Value, path: &str) -> Result<u64> {
    let value = container.get("recordsFiltered").ok_or_else(|| {
        PanelLinkError::MalformedResponse(format!("missing '{}'", path))
    })?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| {
            PanelLinkError::MalformedResponse(format!(
                "'{}' is not a non-negative integer: {}",
                path, value
            ))
        })
}
