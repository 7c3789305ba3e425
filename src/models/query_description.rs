use crate::error::{PanelLinkError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Sort direction sent as `dir` in the order statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single sort criterion. `field` may be qualified (`relation.field`) when
/// the column is sourced through a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Result<Self> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(PanelLinkError::InvalidQuery(
                "sort field must not be empty".to_string(),
            ));
        }
        Ok(Self { field, direction })
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_number: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page_number: u32, page_size: u32) -> Result<Self> {
        if page_number == 0 {
            return Err(PanelLinkError::InvalidQuery("page_number must be >= 1".to_string()));
        }
        if page_size == 0 {
            return Err(PanelLinkError::InvalidQuery("page_size must be >= 1".to_string()));
        }
        Ok(Self {
            page_number,
            page_size,
        })
    }

    /// Row offset of the first record on this page.
    pub fn start(&self) -> u64 {
        (self.page_number as u64 - 1) * self.page_size as u64
    }
}

/// Declarative column descriptor.
///
/// `through` names the relation path a column is read from; only its first
/// element is used for sorting and cell lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub label: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub through: Vec<String>,
}

impl ColumnSpec {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
            through: Vec::new(),
        }
    }

    pub fn through(mut self, relation: impl Into<String>) -> Self {
        self.through.push(relation.into());
        self
    }

    /// Field name used when this column is sorted.
    pub fn sort_field(&self) -> String {
        match self.through.first() {
            Some(relation) => format!("{}.{}", relation, self.data),
            None => self.data.clone(),
        }
    }

    /// `(data, name)` pair sent in the `columns[i]` wire block. Columns
    /// sourced through a relation are requested by `id`.
    pub fn wire_pair(&self) -> (&str, &str) {
        if self.through.is_empty() {
            (self.data.as_str(), self.label.as_str())
        } else {
            ("id", "id")
        }
    }
}

/// Immutable description of one grid fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescription {
    /// Remote collection identifier (`/api/{model}`).
    pub model: String,
    pub pagination: Pagination,
    pub sort: Option<SortSpec>,
    /// Column filters; empty values are dropped on serialization.
    pub filters: BTreeMap<String, String>,
    /// Active free-text predicates (`key=value`), joined with `|`.
    pub predicates: Vec<String>,
    /// Predicates sent when no free-text predicate is active.
    pub default_predicates: Vec<String>,
    /// Backend join statements, forwarded verbatim.
    pub joins: Vec<Value>,
    pub preloads: Vec<String>,
    pub columns: Vec<ColumnSpec>,
    /// Extra top-level parameters; nested objects use bracket notation.
    pub append: Map<String, Value>,
}

impl QueryDescription {
    pub fn new(model: impl Into<String>, page_number: u32, page_size: u32) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(PanelLinkError::InvalidQuery("model must not be empty".to_string()));
        }
        Ok(Self {
            model,
            pagination: Pagination::new(page_number, page_size)?,
            sort: None,
            filters: BTreeMap::new(),
            predicates: Vec::new(),
            default_predicates: Vec::new(),
            joins: Vec::new(),
            preloads: Vec::new(),
            columns: Vec::new(),
            append: Map::new(),
        })
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn with_filters(mut self, filters: BTreeMap<String, String>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_predicates(mut self, predicates: Vec<String>) -> Self {
        self.predicates = predicates;
        self
    }

    pub fn with_default_predicates(mut self, predicates: Vec<String>) -> Self {
        self.default_predicates = predicates;
        self
    }

    pub fn with_join(mut self, join: Value) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_joins(mut self, joins: Vec<Value>) -> Self {
        self.joins = joins;
        self
    }

    pub fn with_preload(mut self, relation: impl Into<String>) -> Self {
        let relation = relation.into();
        if !self.preloads.contains(&relation) {
            self.preloads.push(relation);
        }
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_append(mut self, append: Map<String, Value>) -> Self {
        self.append = append;
        self
    }

    /// Filters with empty values removed.
    pub fn active_filters(&self) -> impl Iterator<Item = (&String, &String)> {
        self.filters.iter().filter(|(_, v)| !v.is_empty())
    }
}
