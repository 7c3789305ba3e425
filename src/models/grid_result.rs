use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema-less record as returned by the data API.
pub type Record = Map<String, Value>;

/// Uniform result of one grid fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridResult {
    pub records: Vec<Record>,
    /// `recordsFiltered` reported by the server.
    pub total_count: u64,
}

impl GridResult {
    pub fn new(records: Vec<Record>, total_count: u64) -> Self {
        Self {
            records,
            total_count,
        }
    }

    /// `ceil(total_count / page_size)`; zero when `page_size` is zero.
    pub fn total_pages(&self, page_size: u32) -> u32 {
        if page_size == 0 {
            return 0;
        }
        u32::try_from(self.total_count.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reply to a multipart create/update call.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveResponse {
    pub status_code: u16,
    pub body: Value,
}
