//! Grid state machine.
//!
//! `GridState` is the single owner of a grid's page, sort, filters and edit
//! target. Every mutation that changes result identity hands back a
//! [`FetchTicket`] carrying a fresh request token. Results are applied only
//! when their token is still the latest one issued; anything older is
//! dropped on arrival. Nothing here performs I/O.

use crate::error::FetchError;
use crate::grid::config::GridConfig;
use crate::models::{
    ColumnSpec, GridResult, QueryDescription, Record, SortDirection, SortSpec,
};
use crate::pagination::{self, PagePlan};
use crate::query::filter_predicates;
use crate::record;
use std::collections::BTreeMap;

/// Everything needed to run one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub token: u64,
    pub query: QueryDescription,
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Result became the displayed page.
    Applied,
    /// Error recorded, previous records kept.
    Failed,
    /// A newer fetch was issued; result ignored.
    Stale,
}

/// Read-only snapshot handed to presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct GridView {
    pub records: Vec<Record>,
    pub total_count: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub sort: Option<SortSpec>,
    pub filters: BTreeMap<String, String>,
    pub editing_record_id: Option<String>,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl GridView {
    pub fn page_plan(&self) -> PagePlan {
        pagination::plan(self.current_page, self.total_pages)
    }

    /// Display text of `column` in row `row`; `None` past the last row.
    pub fn cell_text(&self, row: usize, column: &ColumnSpec) -> Option<String> {
        let record = self.records.get(row)?;
        Some(record::display_text(record::cell_value(record, column)))
    }

    /// Identifier of the row, used for edit and delete actions.
    pub fn row_id(&self, row: usize) -> Option<String> {
        self.records.get(row).and_then(record::record_id)
    }
}

#[derive(Debug, Clone)]
pub struct GridState {
    config: GridConfig,
    current_page: u32,
    sort: Option<SortSpec>,
    active_filters: BTreeMap<String, String>,
    editing_record_id: Option<String>,
    fetch_in_flight: bool,
    last_request_token: u64,
    records: Vec<Record>,
    total_count: u64,
    total_pages: u32,
    error: Option<FetchError>,
}

impl GridState {
    pub fn new(config: GridConfig) -> Self {
        let active_filters = config.seed_filters();
        let current_page = config.initial_page.max(1);
        Self {
            config,
            current_page,
            sort: None,
            active_filters,
            editing_record_id: None,
            fetch_in_flight: false,
            last_request_token: 0,
            records: Vec::new(),
            total_count: 0,
            total_pages: 0,
            error: None,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Initial fetch for a freshly mounted grid.
    pub fn mount(&mut self) -> FetchTicket {
        self.issue()
    }

    /// Back to defaults for a remount. The token keeps counting so fetches
    /// from the previous mount can never apply.
    pub fn reset(&mut self) -> FetchTicket {
        let token = self.last_request_token;
        *self = Self::new(self.config.clone());
        self.last_request_token = token;
        self.issue()
    }

    /// Abandon pending fetches (grid unmounted).
    pub fn abandon(&mut self) {
        self.last_request_token += 1;
        self.fetch_in_flight = false;
    }

    pub fn set_page(&mut self, page: u32) -> Option<FetchTicket> {
        let page = page.max(1);
        if page == self.current_page {
            return None;
        }
        self.current_page = page;
        Some(self.issue())
    }

    /// Clamped step backwards.
    pub fn prev_page(&mut self) -> Option<FetchTicket> {
        let target = pagination::plan(self.current_page, self.total_pages).prev_page();
        self.set_page(target)
    }

    /// Clamped step forwards.
    pub fn next_page(&mut self) -> Option<FetchTicket> {
        let target = pagination::plan(self.current_page, self.total_pages).next_page();
        self.set_page(target)
    }

    /// Sort by `field`: same field toggles direction, a new field starts
    /// descending.
    pub fn set_sort(&mut self, field: &str) -> Option<FetchTicket> {
        if field.trim().is_empty() {
            return None;
        }
        let direction = match &self.sort {
            Some(current) if current.field == field => current.direction.toggled(),
            _ => SortDirection::Desc,
        };
        self.sort = Some(SortSpec {
            field: field.to_string(),
            direction,
        });
        Some(self.issue())
    }

    /// Replace the filters. Empty values are pruned before comparing, so
    /// clearing a field equals never having set it. A real change resets
    /// the page to 1.
    pub fn set_filters(&mut self, filters: BTreeMap<String, String>) -> Option<FetchTicket> {
        let pruned: BTreeMap<String, String> =
            filters.into_iter().filter(|(_, v)| !v.is_empty()).collect();
        if pruned == self.active_filters {
            return None;
        }
        self.active_filters = pruned;
        self.current_page = 1;
        Some(self.issue())
    }

    pub fn begin_edit(&mut self, id: impl Into<String>) {
        self.editing_record_id = Some(id.into());
    }

    pub fn cancel_edit(&mut self) {
        self.editing_record_id = None;
    }

    /// Leave edit mode and reload the current page.
    pub fn commit_edit(&mut self) -> FetchTicket {
        self.editing_record_id = None;
        self.issue()
    }

    /// Reload the current page (row actions, deletes).
    pub fn refresh(&mut self) -> FetchTicket {
        self.issue()
    }

    /// Apply a completed fetch if `token` is still current.
    pub fn apply(&mut self, token: u64, outcome: Result<GridResult, FetchError>) -> ApplyOutcome {
        if token != self.last_request_token {
            log::debug!(
                "[GRID] Discarding stale result for '{}' (token={} latest={})",
                self.config.model,
                token,
                self.last_request_token
            );
            return ApplyOutcome::Stale;
        }
        self.fetch_in_flight = false;
        match outcome {
            Ok(result) => {
                self.total_pages = result.total_pages(self.config.page_size);
                self.total_count = result.total_count;
                self.records = result.records;
                self.error = None;
                ApplyOutcome::Applied
            },
            Err(err) => {
                log::warn!("[GRID] Fetch for '{}' failed: {}", self.config.model, err);
                self.error = Some(err);
                ApplyOutcome::Failed
            },
        }
    }

    pub fn query(&self) -> QueryDescription {
        QueryDescription {
            model: self.config.model.clone(),
            pagination: crate::models::Pagination {
                page_number: self.current_page,
                page_size: self.config.page_size.max(1),
            },
            sort: self.sort.clone(),
            filters: self.active_filters.clone(),
            predicates: filter_predicates(&self.active_filters),
            default_predicates: self.config.default_predicates.clone(),
            joins: self.config.joins.clone(),
            preloads: self.config.preloads.clone(),
            columns: self.config.columns.clone(),
            append: self.config.append.clone(),
        }
    }

    pub fn view(&self) -> GridView {
        GridView {
            records: self.records.clone(),
            total_count: self.total_count,
            total_pages: self.total_pages,
            current_page: self.current_page,
            sort: self.sort.clone(),
            filters: self.active_filters.clone(),
            editing_record_id: self.editing_record_id.clone(),
            loading: self.fetch_in_flight,
            error: self.error.clone(),
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn active_filters(&self) -> &BTreeMap<String, String> {
        &self.active_filters
    }

    pub fn editing_record_id(&self) -> Option<&str> {
        self.editing_record_id.as_deref()
    }

    pub fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn last_request_token(&self) -> u64 {
        self.last_request_token
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    fn issue(&mut self) -> FetchTicket {
        self.last_request_token += 1;
        self.fetch_in_flight = true;
        FetchTicket {
            token: self.last_request_token,
            query: self.query(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use crate::models::ColumnSpec;
    use serde_json::json;

    fn state() -> GridState {
        GridState::new(
            GridConfig::new("devices")
                .column(ColumnSpec::new("Name", "name"))
                .column(ColumnSpec::new("Outlet", "name").through("outlet")),
        )
    }

    fn rows(ids: &[i64]) -> Vec<Record> {
        ids.iter()
            .map(|id| json!({"id": id}).as_object().cloned().unwrap())
            .collect()
    }

    fn filters(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_mount_issues_first_token() {
        let mut s = state();
        let ticket = s.mount();
        assert_eq!(ticket.token, 1);
        assert_eq!(ticket.query.pagination.page_number, 1);
        assert!(s.fetch_in_flight());
    }

    #[test]
    fn test_set_sort_toggles_same_field() {
        let mut s = state();
        s.set_sort("name");
        assert_eq!(s.sort().unwrap().direction, SortDirection::Desc);
        s.set_sort("name");
        assert_eq!(s.sort().unwrap().direction, SortDirection::Asc);
        s.set_sort("name");
        assert_eq!(s.sort().unwrap().direction, SortDirection::Desc);
    }

    #[test]
    fn test_set_sort_new_field_defaults_descending() {
        let mut s = state();
        s.set_sort("name");
        s.set_sort("name");
        let ticket = s.set_sort("outlet.name").unwrap();
        let sort = ticket.query.sort.unwrap();
        assert_eq!(sort.field, "outlet.name");
        assert_eq!(sort.direction, SortDirection::Desc);
    }

    #[test]
    fn test_set_filters_resets_page() {
        let mut s = state();
        s.set_page(4);
        let ticket = s.set_filters(filters(&[("status", "active")])).unwrap();
        assert_eq!(s.current_page(), 1);
        assert_eq!(ticket.query.pagination.page_number, 1);
        assert_eq!(ticket.query.predicates, vec!["status=active".to_string()]);
    }

    #[test]
    fn test_empty_filter_equals_unset() {
        let mut s = state();
        assert!(s.set_filters(filters(&[("name", "")])).is_none());

        s.set_filters(filters(&[("status", "active")]));
        s.set_page(3);
        // clearing name while keeping status is not a change
        assert!(s.set_filters(filters(&[("status", "active"), ("name", "")])).is_none());
        assert_eq!(s.current_page(), 3);
    }

    #[test]
    fn test_set_page_same_page_is_noop() {
        let mut s = state();
        assert!(s.set_page(1).is_none());
        assert!(s.set_page(0).is_none());
        assert!(s.set_page(2).is_some());
    }

    #[test]
    fn test_stale_result_discarded() {
        let mut s = state();
        let a = s.set_page(2).unwrap();
        let b = s.set_page(3).unwrap();

        assert_eq!(s.apply(b.token, Ok(GridResult::new(rows(&[3]), 60))), ApplyOutcome::Applied);
        assert_eq!(s.apply(a.token, Ok(GridResult::new(rows(&[2]), 60))), ApplyOutcome::Stale);

        assert_eq!(s.records(), rows(&[3]).as_slice());
        assert_eq!(s.current_page(), 3);
    }

    #[test]
    fn test_in_flight_until_latest_applies() {
        let mut s = state();
        let a = s.mount();
        let b = s.set_sort("name").unwrap();
        assert_eq!(s.apply(a.token, Ok(GridResult::default())), ApplyOutcome::Stale);
        assert!(s.fetch_in_flight());
        s.apply(b.token, Ok(GridResult::default()));
        assert!(!s.fetch_in_flight());
    }

    #[test]
    fn test_error_keeps_previous_records() {
        let mut s = state();
        let first = s.mount();
        s.apply(first.token, Ok(GridResult::new(rows(&[1, 2]), 41)));
        assert_eq!(s.total_pages(), 3);

        let second = s.refresh();
        let err = FetchError {
            kind: FetchErrorKind::NetworkFailure,
            message: "connection reset".into(),
        };
        assert_eq!(s.apply(second.token, Err(err)), ApplyOutcome::Failed);
        assert_eq!(s.records().len(), 2);
        assert!(s.error().is_some());

        let third = s.refresh();
        s.apply(third.token, Ok(GridResult::new(rows(&[1]), 1)));
        assert!(s.error().is_none());
        assert_eq!(s.records().len(), 1);
    }

    #[test]
    fn test_edit_lifecycle() {
        let mut s = state();
        s.mount();
        s.begin_edit("42");
        assert_eq!(s.editing_record_id(), Some("42"));
        s.cancel_edit();
        assert!(s.editing_record_id().is_none());

        s.begin_edit("42");
        let before = s.last_request_token();
        let ticket = s.commit_edit();
        assert!(s.editing_record_id().is_none());
        assert_eq!(ticket.token, before + 1);
        assert_eq!(ticket.query.pagination.page_number, s.current_page());
    }

    #[test]
    fn test_reset_discards_previous_mount() {
        let mut s = state();
        s.set_filters(filters(&[("status", "x")]));
        let old = s.set_page(5).unwrap();
        let fresh = s.reset();
        assert!(fresh.token > old.token);
        assert_eq!(s.current_page(), 1);
        assert!(s.active_filters().is_empty());
        assert_eq!(s.apply(old.token, Ok(GridResult::default())), ApplyOutcome::Stale);
    }

    #[test]
    fn test_abandon_discards_pending() {
        let mut s = state();
        let ticket = s.mount();
        s.abandon();
        assert_eq!(s.apply(ticket.token, Ok(GridResult::default())), ApplyOutcome::Stale);
    }

    #[test]
    fn test_prev_next_clamped() {
        let mut s = state();
        let t = s.mount();
        s.apply(t.token, Ok(GridResult::new(Vec::new(), 40)));
        assert!(s.prev_page().is_none());
        assert!(s.next_page().is_some());
        assert_eq!(s.current_page(), 2);
        assert!(s.next_page().is_none());
    }

    #[test]
    fn test_seeded_filters_from_config() {
        let s = GridState::new(
            GridConfig::new("orders").default_predicates(vec!["status=paid".to_string()]),
        );
        assert_eq!(s.active_filters()["status"], "paid");
        let query = s.query();
        assert_eq!(query.predicates, vec!["status=paid".to_string()]);
    }

    #[test]
    fn test_view_cells_through_relation() {
        let mut s = state();
        let t = s.mount();
        let record = json!({"id": 9, "name": "kiosk", "outlet": [{"name": "KL Sentral"}]});
        s.apply(t.token, Ok(GridResult::new(vec![record.as_object().cloned().unwrap()], 1)));

        let view = s.view();
        let columns = &s.config().columns;
        assert_eq!(view.cell_text(0, &columns[0]).as_deref(), Some("kiosk"));
        assert_eq!(view.cell_text(0, &columns[1]).as_deref(), Some("KL Sentral"));
        assert_eq!(view.cell_text(1, &columns[0]), None);
        assert_eq!(view.row_id(0).as_deref(), Some("9"));
    }
}
