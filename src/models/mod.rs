//! Data models for the panel-link client library.
//!
//! Grid query descriptions and results, connection options, and the
//! realtime channel frames and state.

pub mod channel_state;
pub mod connection_options;
pub mod grid_result;
pub mod phx_message;
pub mod query_description;
pub mod record_form;

#[cfg(test)]
mod tests;

pub use channel_state::{counts_from_payload, CountsSnapshot, TopicState};
pub use connection_options::{ConnectionOptions, HttpVersion};
pub use grid_result::{GridResult, Record, SaveResponse};
pub use phx_message::{PhxMessage, Reply, ReplyStatus};
pub use query_description::{ColumnSpec, Pagination, QueryDescription, SortDirection, SortSpec};
pub use record_form::RecordForm;
