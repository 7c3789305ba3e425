//! Query serialization for the data API.
//!
//! - [`value`]: ordered parameter tree and bracket-notation flattening
//! - [`serializer`]: builds the canonical wire query from a
//!   [`QueryDescription`](crate::models::QueryDescription)

pub mod serializer;
pub mod value;

pub use serializer::{build_params, filter_predicates, search_string, serialize};
pub use value::{encode_component, QueryValue};
