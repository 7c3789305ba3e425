use crate::error::{PanelLinkError, Result};
use crate::models::ColumnSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default rows per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Declarative description of one grid screen.
///
/// # Example
///
/// ```rust
/// use panel_link::{ColumnSpec, GridConfig};
///
/// let config = GridConfig::new("devices")
///     .page_size(25)
///     .column(ColumnSpec::new("Name", "name"))
///     .column(ColumnSpec::new("Outlet", "name").through("outlet"))
///     .preload("outlet")
///     .default_predicates(vec!["archived=false".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub model: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub joins: Vec<Value>,
    #[serde(default)]
    pub preloads: Vec<String>,
    /// `key=value[|key=value]` predicates used when no search is active;
    /// they also seed the initial filters.
    #[serde(default)]
    pub default_predicates: Vec<String>,
    /// Extra parameters sent with every fetch and merged into new records.
    #[serde(default)]
    pub append: Map<String, Value>,
    /// Page shown on mount (the route's `page_no`).
    #[serde(default = "default_initial_page")]
    pub initial_page: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_initial_page() -> u32 {
    1
}

impl GridConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            page_size: DEFAULT_PAGE_SIZE,
            columns: Vec::new(),
            joins: Vec::new(),
            preloads: Vec::new(),
            default_predicates: Vec::new(),
            append: Map::new(),
            initial_page: 1,
        }
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn join(mut self, join: Value) -> Self {
        self.joins.push(join);
        self
    }

    pub fn preload(mut self, relation: impl Into<String>) -> Self {
        let relation = relation.into();
        if !self.preloads.contains(&relation) {
            self.preloads.push(relation);
        }
        self
    }

    pub fn default_predicates(mut self, predicates: Vec<String>) -> Self {
        self.default_predicates = predicates;
        self
    }

    pub fn append(mut self, key: impl Into<String>, value: Value) -> Self {
        self.append.insert(key.into(), value);
        self
    }

    /// Page shown on mount; `page_no` values that fail to parse fall back to 1.
    pub fn initial_page(mut self, page: u32) -> Self {
        self.initial_page = page.max(1);
        self
    }

    /// Initial page from a route query value such as `page_no=3`.
    pub fn initial_page_param(self, page_no: Option<&str>) -> Self {
        let page = page_no
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(1);
        self.initial_page(page)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(PanelLinkError::ConfigurationError(
                "grid model must not be empty".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(PanelLinkError::ConfigurationError(
                "grid page_size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Filters seeded from the default predicates.
    ///
    /// Each predicate may hold several `key=value` pairs joined with `|`;
    /// entries without `=` and values spelled `undefined` are skipped.
    pub fn seed_filters(&self) -> BTreeMap<String, String> {
        let mut filters = BTreeMap::new();
        for predicate in &self.default_predicates {
            for pair in predicate.split('|') {
                if let Some((key, value)) = pair.split_once('=') {
                    if key.is_empty() || value == "undefined" {
                        continue;
                    }
                    filters.insert(key.to_string(), value.to_string());
                }
            }
        }
        filters
    }

    /// Template for the "new record" form: `id = "0"` plus the append
    /// parameters.
    pub fn new_record_template(&self) -> Map<String, Value> {
        let mut template = Map::new();
        template.insert("id".to_string(), Value::String("0".to_string()));
        for (key, value) in &self.append {
            template.insert(key.clone(), value.clone());
        }
        template
    }
}
