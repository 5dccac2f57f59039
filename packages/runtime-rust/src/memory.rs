//! In-memory [`CollectionService`] implementation.
//!
//! Evaluates the document-filter subset produced by search fields (`$eq`,
//! `$ne`, `$lt`, `$gt`, `$lte`, `$gte`, `$in`, `$nin`, `$regex` with
//! `$options`, `$not`) over records held in a `Vec`. Suitable for tests, demos,
//! and small fixed data sets.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use panelgen_core::{FieldPath, FindQuery, FindResponse, SortDirection, SortKey};
use parking_lot::RwLock;
use regex::RegexBuilder;
use serde_json::{Map, Value};
use tracing::debug;

use crate::service::CollectionService;

/// A collection held entirely in memory.
pub struct MemoryCollection {
    path: String,
    id_field: FieldPath,
    records: RwLock<Vec<Value>>,
    find_calls: AtomicUsize,
    available: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryCollection {
    /// Creates an empty collection served under `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_records(path, Vec::new())
    }

    #[must_use]
    pub fn with_records(path: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            id_field: FieldPath::parse("_id"),
            records: RwLock::new(records),
            find_calls: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            latency: None,
        }
    }

    /// Uses `id_field` instead of `_id` for identity.
    #[must_use]
    pub fn with_id_field(mut self, id_field: &str) -> Self {
        self.id_field = FieldPath::parse(id_field);
        self
    }

    /// Delays every `find` by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// When unavailable every operation fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Number of `find` calls received so far.
    #[must_use]
    pub fn find_count(&self) -> usize {
        self.find_calls.load(AtomicOrdering::SeqCst)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.records.read().clone()
    }

    fn ensure_available(&self) -> anyhow::Result<()> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow!("collection `{}` unavailable", self.path))
        }
    }

    fn position(&self, records: &[Value], id: &Value) -> Option<usize> {
        records
            .iter()
            .position(|r| self.id_field.get(r) == Some(id))
    }

    fn run_query(&self, query: &FindQuery) -> anyhow::Result<FindResponse> {
        let records = self.records.read();
        let mut matched = Vec::new();
        for record in records.iter() {
            if matches_filter(record, &query.filter)? {
                matched.push(record.clone());
            }
        }
        drop(records);

        sort_records(&mut matched, &query.sort);
        let total = matched.len() as u64;
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let page = matched.into_iter().skip(skip);
        Ok(match query.limit {
            Some(limit) => FindResponse::Page {
                total,
                data: page.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
            },
            None => FindResponse::Bare(page.collect()),
        })
    }

    fn insert_one(&self, records: &mut Vec<Value>, mut record: Value) -> anyhow::Result<Value> {
        if !record.is_object() {
            bail!("cannot create non-object record in `{}`", self.path);
        }
        if self.id_field.get(&record).is_none() {
            if let (Some(key), Value::Object(fields)) = (self.id_field.last_name(), &mut record) {
                fields.insert(key.to_string(), Value::from(uuid::Uuid::new_v4().to_string()));
            }
        }
        records.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl CollectionService for MemoryCollection {
    fn path(&self) -> &str {
        &self.path
    }

    async fn find(&self, query: &FindQuery) -> anyhow::Result<FindResponse> {
        self.find_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.ensure_available()?;
        debug!(path = %self.path, skip = query.skip, limit = ?query.limit, "memory find");
        self.run_query(query)
    }

    async fn create(&self, payload: Value) -> anyhow::Result<Value> {
        self.ensure_available()?;
        let mut records = self.records.write();
        match payload {
            Value::Array(batch) => {
                let mut created = Vec::with_capacity(batch.len());
                for record in batch {
                    created.push(self.insert_one(&mut records, record)?);
                }
                Ok(Value::Array(created))
            }
            record => self.insert_one(&mut records, record),
        }
    }

    async fn patch(&self, id: &Value, payload: Value) -> anyhow::Result<Value> {
        self.ensure_available()?;
        let Value::Object(changes) = payload else {
            bail!("patch payload for `{}` must be an object", self.path);
        };
        let mut records = self.records.write();
        let index = self
            .position(&records, id)
            .ok_or_else(|| anyhow!("record {id} not found in `{}`", self.path))?;
        if let Value::Object(fields) = &mut records[index] {
            fields.extend(changes);
        }
        Ok(records[index].clone())
    }

    async fn remove(&self, id: &Value) -> anyhow::Result<Value> {
        self.ensure_available()?;
        let mut records = self.records.write();
        let index = self
            .position(&records, id)
            .ok_or_else(|| anyhow!("record {id} not found in `{}`", self.path))?;
        Ok(records.remove(index))
    }
}

// ---------------------------------------------------------------------------
// Filter evaluation
// ---------------------------------------------------------------------------

fn matches_filter(record: &Value, filter: &Map<String, Value>) -> anyhow::Result<bool> {
    for (path, condition) in filter {
        if path.starts_with('$') {
            continue;
        }
        let values = candidates(FieldPath::parse(path).collect(record));
        if !matches_condition(&values, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Values a condition is evaluated against; terminal arrays match per element.
fn candidates(values: Vec<&Value>) -> Vec<&Value> {
    values
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(elements) => elements.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn is_operator_object(condition: &Value) -> Option<&Map<String, Value>> {
    match condition {
        Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => Some(ops),
        _ => None,
    }
}

fn matches_condition(values: &[&Value], condition: &Value) -> anyhow::Result<bool> {
    let Some(ops) = is_operator_object(condition) else {
        return Ok(values.iter().any(|v| *v == condition));
    };
    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => values.iter().any(|v| *v == arg),
            "$ne" => values.iter().all(|v| *v != arg),
            "$lt" => any_cmp(values, arg, Ordering::is_lt),
            "$gt" => any_cmp(values, arg, Ordering::is_gt),
            "$lte" => any_cmp(values, arg, Ordering::is_le),
            "$gte" => any_cmp(values, arg, Ordering::is_ge),
            "$in" => {
                let set = arg.as_array().map(Vec::as_slice).unwrap_or_default();
                values.iter().any(|v| set.contains(*v))
            }
            "$nin" => {
                let set = arg.as_array().map(Vec::as_slice).unwrap_or_default();
                values.iter().all(|v| !set.contains(*v))
            }
            "$regex" => {
                let flags = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                let pattern = arg
                    .as_str()
                    .ok_or_else(|| anyhow!("$regex expects a string"))?;
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(flags.contains('i'))
                    .build()?;
                values
                    .iter()
                    .any(|v| v.as_str().is_some_and(|s| regex.is_match(s)))
            }
            "$options" => true,
            "$not" => !matches_condition(values, arg)?,
            other => bail!("unsupported filter operator `{other}`"),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_cmp(values: &[&Value], arg: &Value, accept: fn(Ordering) -> bool) -> bool {
    values
        .iter()
        .any(|v| compare(v, arg).is_some_and(accept))
}

/// Numbers compare numerically, strings lexically (ISO dates included).
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sort_records(records: &mut [Value], sort: &[SortKey]) {
    if sort.is_empty() {
        return;
    }
    let paths: Vec<(FieldPath, SortDirection)> = sort
        .iter()
        .map(|k| (FieldPath::parse(&k.path), k.direction))
        .collect();
    records.sort_by(|a, b| {
        for (path, direction) in &paths {
            let ordering = match (path.get(a), path.get(b)) {
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
