//! Async driver for a [`GridState`].
//!
//! The controller turns state transitions into spawned fetches against a
//! [`GridDataSource`] and publishes a fresh [`GridView`] on a watch channel
//! after every change. Superseded fetches are not cancelled; their results
//! are discarded when they arrive.

use crate::error::{FetchError, PanelLinkError, Result};
use crate::grid::config::GridConfig;
use crate::grid::state::{ApplyOutcome, FetchTicket, GridState, GridView};
use crate::models::{GridResult, QueryDescription, RecordForm, SaveResponse};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Backend the grid reads from and writes to.
#[async_trait]
pub trait GridDataSource: Send + Sync + 'static {
    async fn fetch_grid(&self, query: &QueryDescription) -> Result<GridResult>;

    async fn delete_record(&self, model: &str, id: &str) -> Result<()>;

    async fn save_record(&self, model: &str, form: &RecordForm) -> Result<SaveResponse>;
}

/// Handle on one spawned fetch.
pub struct FetchHandle {
    token: u64,
    task: JoinHandle<ApplyOutcome>,
}

impl FetchHandle {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Wait for the fetch to finish and report what happened to its result.
    pub async fn wait(self) -> ApplyOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("[GRID] Fetch task {} did not complete: {}", self.token, e);
                ApplyOutcome::Stale
            },
        }
    }
}

pub struct GridController<S: GridDataSource> {
    source: Arc<S>,
    state: Arc<Mutex<GridState>>,
    view_tx: Arc<watch::Sender<GridView>>,
}

impl<S: GridDataSource> Clone for GridController<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
            view_tx: Arc::clone(&self.view_tx),
        }
    }
}

impl<S: GridDataSource> GridController<S> {
    pub fn new(source: Arc<S>, config: GridConfig) -> Result<Self> {
        config.validate()?;
        let state = GridState::new(config);
        let (view_tx, _) = watch::channel(state.view());
        Ok(Self {
            source,
            state: Arc::new(Mutex::new(state)),
            view_tx: Arc::new(view_tx),
        })
    }

    /// Issue the initial fetch.
    pub fn mount(&self) -> FetchHandle {
        let ticket = self.lock().mount();
        self.dispatch(ticket)
    }

    /// Reset to defaults and fetch again; earlier results are ignored.
    pub fn remount(&self) -> FetchHandle {
        let ticket = self.lock().reset();
        self.dispatch(ticket)
    }

    /// Stop applying results from pending fetches.
    pub fn unmount(&self) {
        let view = {
            let mut state = self.lock();
            state.abandon();
            state.view()
        };
        log::debug!("[GRID] Unmounted '{}'", self.model());
        self.view_tx.send_replace(view);
    }

    pub fn set_page(&self, page: u32) -> Option<FetchHandle> {
        let ticket = self.lock().set_page(page);
        ticket.map(|t| self.dispatch(t))
    }

    pub fn prev_page(&self) -> Option<FetchHandle> {
        let ticket = self.lock().prev_page();
        ticket.map(|t| self.dispatch(t))
    }

    pub fn next_page(&self) -> Option<FetchHandle> {
        let ticket = self.lock().next_page();
        ticket.map(|t| self.dispatch(t))
    }

    pub fn set_sort(&self, field: &str) -> Option<FetchHandle> {
        let ticket = self.lock().set_sort(field);
        ticket.map(|t| self.dispatch(t))
    }

    pub fn set_filters(&self, filters: BTreeMap<String, String>) -> Option<FetchHandle> {
        let ticket = self.lock().set_filters(filters);
        ticket.map(|t| self.dispatch(t))
    }

    pub fn begin_edit(&self, id: impl Into<String>) {
        let view = {
            let mut state = self.lock();
            state.begin_edit(id);
            state.view()
        };
        self.view_tx.send_replace(view);
    }

    pub fn cancel_edit(&self) {
        let view = {
            let mut state = self.lock();
            state.cancel_edit();
            state.view()
        };
        self.view_tx.send_replace(view);
    }

    pub fn commit_edit(&self) -> FetchHandle {
        let ticket = self.lock().commit_edit();
        self.dispatch(ticket)
    }

    pub fn refresh(&self) -> FetchHandle {
        let ticket = self.lock().refresh();
        self.dispatch(ticket)
    }

    /// Persist `form`, then leave edit mode and reload the page.
    pub async fn save(&self, form: &RecordForm) -> Result<SaveResponse> {
        let model = self.model();
        let response = self.source.save_record(&model, form).await?;
        if !(200..300).contains(&response.status_code) {
            return Err(PanelLinkError::ServerError {
                status_code: response.status_code,
                message: response.body.to_string(),
            });
        }
        self.commit_edit().wait().await;
        Ok(response)
    }

    /// Delete a record, then reload the page.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let model = self.model();
        self.source.delete_record(&model, id).await?;
        log::info!("[GRID] Deleted '{}' record {}", model, id);
        self.refresh().wait().await;
        Ok(())
    }

    /// Prefilled values for the "new record" form.
    pub fn new_record_template(&self) -> Map<String, Value> {
        self.lock().config().new_record_template()
    }

    pub fn view(&self) -> GridView {
        self.view_tx.borrow().clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<GridView> {
        self.view_tx.subscribe()
    }

    pub fn model(&self) -> String {
        self.lock().config().model.clone()
    }

    fn lock(&self) -> MutexGuard<'_, GridState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, ticket: FetchTicket) -> FetchHandle {
        self.view_tx.send_replace(self.lock().view());

        let token = ticket.token;
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let view_tx = Arc::clone(&self.view_tx);

        log::debug!(
            "[GRID] Fetching '{}' page {} (token={})",
            ticket.query.model,
            ticket.query.pagination.page_number,
            token
        );

        let task = tokio::spawn(async move {
            let outcome = source
                .fetch_grid(&ticket.query)
                .await
                .map_err(|e| FetchError::from(&e));
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            let applied = guard.apply(ticket.token, outcome);
            if applied != ApplyOutcome::Stale {
                view_tx.send_replace(guard.view());
            }
            applied
        });

        FetchHandle { token, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnSpec, Record};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct FakeSource {
        queries: AsyncMutex<Vec<QueryDescription>>,
        deletes: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    fn rows(page: u32) -> Vec<Record> {
        vec![json!({"id": page, "name": format!("row-{}", page)})
            .as_object()
            .cloned()
            .unwrap()]
    }

    #[async_trait]
    impl GridDataSource for FakeSource {
        async fn fetch_grid(&self, query: &QueryDescription) -> Result<GridResult> {
            self.queries.lock().await.push(query.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(PanelLinkError::NetworkError("connection refused".into()));
            }
            Ok(GridResult::new(rows(query.pagination.page_number), 95))
        }

        async fn delete_record(&self, _model: &str, _id: &str) -> Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn save_record(&self, _model: &str, form: &RecordForm) -> Result<SaveResponse> {
            Ok(SaveResponse {
                status_code: 200,
                body: json!({"id": form.get("id")}),
            })
        }
    }

    fn controller() -> (Arc<FakeSource>, GridController<FakeSource>) {
        let source = Arc::new(FakeSource::default());
        let config = GridConfig::new("devices").column(ColumnSpec::new("Name", "name"));
        let controller = GridController::new(Arc::clone(&source), config).unwrap();
        (source, controller)
    }

    #[tokio::test]
    async fn test_mount_loads_first_page() {
        let (_, grid) = controller();
        assert_eq!(grid.mount().wait().await, ApplyOutcome::Applied);
        let view = grid.view();
        assert_eq!(view.current_page, 1);
        assert_eq!(view.total_count, 95);
        assert_eq!(view.total_pages, 5);
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_fetch_error_surfaces_in_view() {
        let (source, grid) = controller();
        grid.mount().wait().await;
        source.fail.store(true, Ordering::SeqCst);
        assert_eq!(grid.refresh().wait().await, ApplyOutcome::Failed);
        let view = grid.view();
        assert_eq!(view.records.len(), 1);
        assert_eq!(view.error.unwrap().user_message(), FetchError::USER_MESSAGE);
    }

    #[tokio::test]
    async fn test_delete_refetches() {
        let (source, grid) = controller();
        grid.mount().wait().await;
        grid.delete("1").await.unwrap();
        assert_eq!(source.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(source.queries.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_save_commits_edit() {
        let (source, grid) = controller();
        grid.mount().wait().await;
        grid.begin_edit("1");
        assert_eq!(grid.view().editing_record_id.as_deref(), Some("1"));
        grid.save(&RecordForm::new().field("id", "1")).await.unwrap();
        assert!(grid.view().editing_record_id.is_none());
        assert_eq!(source.queries.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unmount_discards_pending() {
        let (_, grid) = controller();
        let handle = grid.mount();
        grid.unmount();
        assert_eq!(handle.wait().await, ApplyOutcome::Stale);
        assert!(grid.view().records.is_empty());
    }

    #[tokio::test]
    async fn test_new_record_template_includes_id() {
        let source = Arc::new(FakeSource::default());
        let config = GridConfig::new("devices").append("outlet_id", json!(7));
        let grid = GridController::new(source, config).unwrap();
        let template = grid.new_record_template();
        assert_eq!(template["id"], "0");
        assert_eq!(template["outlet_id"], 7);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let source = Arc::new(FakeSource::default());
        assert!(GridController::new(source, GridConfig::new("")).is_err());
    }
}
