//! Integration tests for the grid controller against an in-memory data
//! source.
//!
//! Fetches are raced on a paused clock to check that only the newest
//! request's result reaches the view.

use panel_link::pagination::PageItem::{Ellipsis, Page};
use panel_link::{
    serialize, ApplyOutcome, ColumnSpec, FetchErrorKind, GridConfig, GridController, RecordForm,
    SortDirection,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

mod common;

use common::FakeSource;

fn filters(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn devices(page_size: u32) -> GridConfig {
    GridConfig::new("devices")
        .page_size(page_size)
        .column(ColumnSpec::new("Name", "name"))
        .column(ColumnSpec::new("Outlet", "name").through("outlet"))
        .preload("outlet")
}

#[tokio::test(start_paused = true)]
async fn test_slow_earlier_fetch_is_discarded() {
    let delays = HashMap::from([(1, Duration::from_millis(500)), (2, Duration::from_millis(20))]);
    let source = FakeSource::with_delays(45, delays);
    let grid = GridController::new(Arc::clone(&source), devices(20)).unwrap();

    let first = grid.mount();
    let second = grid.set_page(2).expect("page change issues a fetch");
    assert!(second.token() > first.token());
    assert!(grid.view().loading);

    assert_eq!(second.wait().await, ApplyOutcome::Applied);
    assert_eq!(first.wait().await, ApplyOutcome::Stale);

    let view = grid.view();
    assert_eq!(view.current_page, 2);
    assert_eq!(view.total_count, 45);
    assert_eq!(view.total_pages, 3);
    assert!(!view.loading);
    assert_eq!(view.records.len(), 20);
    assert!(view.records.iter().all(|r| r["page"] == json!(2)));
    assert_eq!(view.records[0]["id"], json!(21));
}

#[tokio::test(start_paused = true)]
async fn test_unmount_ignores_pending_result() {
    let delays = HashMap::from([(1, Duration::from_millis(200))]);
    let source = FakeSource::with_delays(10, delays);
    let grid = GridController::new(Arc::clone(&source), devices(5)).unwrap();

    let pending = grid.mount();
    grid.unmount();
    assert_eq!(pending.wait().await, ApplyOutcome::Stale);
    assert!(grid.view().records.is_empty());
    assert!(!grid.view().loading);
}

#[tokio::test(start_paused = true)]
async fn test_sort_toggles_and_reaches_query() {
    let source = FakeSource::new(30);
    let grid = GridController::new(Arc::clone(&source), devices(10)).unwrap();
    grid.mount().wait().await;

    grid.set_sort("outlet.name").unwrap().wait().await;
    let sort = grid.view().sort.unwrap();
    assert_eq!(sort.field, "outlet.name");
    assert_eq!(sort.direction, SortDirection::Desc);

    grid.set_sort("outlet.name").unwrap().wait().await;
    assert_eq!(grid.view().sort.unwrap().direction, SortDirection::Asc);

    let qs = serialize(&source.last_query().unwrap()).unwrap();
    assert!(qs.contains(
        "additional_order_statements=%5B%7B%22column%22%3A%22outlet.name%22%2C%22dir%22%3A%22asc%22%7D%5D"
    ));
    assert!(qs.contains("preloads=%5B%22outlet%22%5D"));
}

#[tokio::test(start_paused = true)]
async fn test_filter_change_resets_page_and_empty_equals_unset() {
    let source = FakeSource::new(100);
    let grid = GridController::new(Arc::clone(&source), devices(10)).unwrap();
    grid.mount().wait().await;
    grid.set_page(4).unwrap().wait().await;
    assert_eq!(grid.view().current_page, 4);

    grid.set_filters(filters(&[("status", "active"), ("name", "")]))
        .unwrap()
        .wait()
        .await;
    let view = grid.view();
    assert_eq!(view.current_page, 1);
    assert_eq!(view.filters, filters(&[("status", "active")]));

    let query = source.last_query().unwrap();
    assert_eq!(query.pagination.page_number, 1);
    assert_eq!(query.predicates, vec!["status=active".to_string()]);
    let qs = serialize(&query).unwrap();
    assert!(qs.contains("search[value][status]=active"));
    assert!(!qs.contains("search[value][name]"));

    // Clearing an already-absent field is not a change.
    let fetches = source.fetch_count();
    assert!(grid.set_filters(filters(&[("status", "active")])).is_none());
    assert_eq!(source.fetch_count(), fetches);
}

#[tokio::test(start_paused = true)]
async fn test_cleared_search_falls_back_to_default_predicates() {
    let source = FakeSource::new(12);
    let config = devices(10).default_predicates(vec!["archived=false|kind=undefined".into()]);
    let grid = GridController::new(Arc::clone(&source), config).unwrap();

    // Seeded from the defaults, minus the `undefined` entry.
    assert_eq!(grid.view().filters, filters(&[("archived", "false")]));
    grid.mount().wait().await;

    grid.set_filters(BTreeMap::new()).unwrap().wait().await;
    assert!(grid.view().filters.is_empty());
    let qs = serialize(&source.last_query().unwrap()).unwrap();
    assert!(qs.contains("additional_search_queries=archived%3Dfalse%7Ckind%3Dundefined"));
}

#[tokio::test(start_paused = true)]
async fn test_paging_is_clamped_and_planned() {
    let source = FakeSource::new(95);
    let grid = GridController::new(Arc::clone(&source), devices(10)).unwrap();
    grid.mount().wait().await;

    let view = grid.view();
    assert_eq!(view.total_pages, 10);
    assert_eq!(view.page_plan().items, vec![Page(1), Page(2), Page(3), Ellipsis, Page(10)]);
    assert!(grid.prev_page().is_none(), "already on the first page");

    grid.next_page().unwrap().wait().await;
    assert_eq!(grid.view().current_page, 2);

    grid.set_page(10).unwrap().wait().await;
    let view = grid.view();
    assert_eq!(view.records.len(), 5);
    assert_eq!(view.page_plan().items, vec![Page(1), Ellipsis, Page(8), Page(9), Page(10)]);
    assert!(grid.next_page().is_none(), "already on the last page");

    grid.prev_page().unwrap().wait().await;
    assert_eq!(grid.view().current_page, 9);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_keeps_last_page() {
    let source = FakeSource::new(30);
    let grid = GridController::new(Arc::clone(&source), devices(10)).unwrap();
    grid.mount().wait().await;
    let before = grid.view().records;

    source.fail.store(true, Ordering::SeqCst);
    assert_eq!(grid.refresh().wait().await, ApplyOutcome::Failed);
    let view = grid.view();
    assert_eq!(view.records, before);
    let error = view.error.expect("error is surfaced");
    assert_eq!(error.kind, FetchErrorKind::NetworkFailure);
    assert_eq!(error.user_message(), "Failed to fetch data. Please try again.");

    source.fail.store(false, Ordering::SeqCst);
    assert_eq!(grid.refresh().wait().await, ApplyOutcome::Applied);
    assert!(grid.view().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_edit_save_and_delete_reload_page() {
    let source = FakeSource::new(30);
    let config = devices(10).append("outlet_id", json!("12"));
    let grid = GridController::new(Arc::clone(&source), config).unwrap();
    grid.mount().wait().await;

    let template = grid.new_record_template();
    assert_eq!(template["id"], json!("0"));
    assert_eq!(template["outlet_id"], json!("12"));

    grid.begin_edit("7");
    assert_eq!(grid.view().editing_record_id.as_deref(), Some("7"));
    let fetches = source.fetch_count();

    let form = RecordForm::new().field("id", "7").field("name", "kiosk");
    let response = grid.save(&form).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert!(grid.view().editing_record_id.is_none());
    assert_eq!(source.fetch_count(), fetches + 1);
    assert_eq!(source.saves.lock().unwrap()[0].get("name"), Some("kiosk"));

    grid.delete("7").await.unwrap();
    assert_eq!(*source.deletes.lock().unwrap(), vec!["7".to_string()]);
    assert_eq!(source.fetch_count(), fetches + 2);
}

#[tokio::test]
async fn test_subscribers_see_every_change() {
    let source = FakeSource::new(30);
    let grid = GridController::new(Arc::clone(&source), devices(10)).unwrap();
    let mut views = grid.subscribe();

    grid.mount().wait().await;
    views.changed().await.unwrap();
    let view = views.borrow_and_update().clone();
    assert_eq!(view.total_count, 30);
    assert!(!view.loading);
}

#[test]
fn test_invalid_config_is_rejected() {
    let source = FakeSource::new(0);
    assert!(GridController::new(Arc::clone(&source), GridConfig::new("")).is_err());
    assert!(GridController::new(source, GridConfig::new("devices").page_size(0)).is_err());
}
