//! Paginated, sortable, filterable grid over a remote model.
//!
//! - [`config`]: declarative grid description
//! - [`state`]: pure state machine with request tokens
//! - [`controller`]: async driver publishing [`GridView`] snapshots

pub mod config;
pub mod controller;
pub mod state;

pub use config::{GridConfig, DEFAULT_PAGE_SIZE};
pub use controller::{FetchHandle, GridController, GridDataSource};
pub use state::{ApplyOutcome, FetchTicket, GridState, GridView};
