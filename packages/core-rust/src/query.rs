//! Collection query and response shapes.
//!
//! A [`FindQuery`] is what an incremental loader sends to a collection service:
//! a document-style filter plus sort, skip, and limit. On the wire the query is a
//! single JSON object in which the control keys `$sort`, `$skip`, and `$limit`
//! sit beside the filter conditions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sort direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Numeric wire form: `1` ascending, `-1` descending.
    #[must_use]
    pub fn wire(self) -> i8 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }

    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// One entry of an ordered multi-key sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub path: String,
    pub direction: SortDirection,
}

impl SortKey {
    #[must_use]
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Asc,
        }
    }

    #[must_use]
    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A page request against a collection service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindQuery {
    /// Filter conditions keyed by field path.
    #[serde(default)]
    pub filter: Map<String, Value>,
    /// Sort keys in priority order.
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub skip: u64,
    /// `None` requests everything.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<u64>,
}

impl FindQuery {
    /// Flattens the query into the single-object wire form.
    ///
    /// `$sort` keeps key priority through insertion order. `$skip` is always
    /// present; `$limit` only when set.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut out = self.filter.clone();
        if !self.sort.is_empty() {
            let sort: Map<String, Value> = self
                .sort
                .iter()
                .map(|k| (k.path.clone(), Value::from(k.direction.wire())))
                .collect();
            out.insert("$sort".to_string(), Value::Object(sort));
        }
        if let Some(limit) = self.limit {
            out.insert("$limit".to_string(), Value::from(limit));
        }
        out.insert("$skip".to_string(), Value::from(self.skip));
        Value::Object(out)
    }
}

/// Result of a find call: a paginated envelope or a bare record list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindResponse {
    Page { total: u64, data: Vec<Value> },
    Bare(Vec<Value>),
}

impl FindResponse {
    /// Splits into `(total, records)`. A bare list counts as its own total.
    #[must_use]
    pub fn into_page(self) -> (u64, Vec<Value>) {
        match self {
            Self::Page { total, data } => (total, data),
            Self::Bare(data) => (data.len() as u64, data),
        }
    }
}
