//! Views for the memory store
//!
//! A view is a map function over every JSON document plus an optional
//! built-in reducer. Views are defined in code with [`ViewDefinition::new`]
//! or declared in the configuration as a [`ViewSpec`] that emits one field
//! of each document as the row key.
//!
//! Queries follow the usual view semantics: rows are ordered by emitted key
//! (view collation, then document key), filtered by `key`/`keys` or a
//! `startkey`..`endkey` range, optionally reduced and grouped, and finally
//! paged with `skip`/`limit`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{StoredValue, ViewResponse, ViewRow};
use crate::error::{BasementError, Result};
use crate::query::{names, QueryParams};
use crate::value::Value;

/// Map function: document key and payload in, `(key, value)` rows out
pub type MapFn = Arc<dyn Fn(&str, &Value) -> Vec<(Value, Value)> + Send + Sync>;

/// Built-in reduce functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Number of rows
    Count,
    /// Sum of numeric row values
    Sum,
    /// `sum`, `count`, `min`, `max` and `sumsqr` of numeric row values
    Stats,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Count => "_count",
            Reducer::Sum => "_sum",
            Reducer::Stats => "_stats",
        }
    }

    fn reduce(&self, values: &[&Value]) -> Value {
        match self {
            Reducer::Count => Value::Integer(values.len() as i64),
            Reducer::Sum => sum(values),
            Reducer::Stats => {
                let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
                let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
                let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Value::from_pairs([
                    ("sum", sum(values)),
                    ("count", Value::Integer(numbers.len() as i64)),
                    ("min", if numbers.is_empty() { Value::Null } else { Value::Float(min) }),
                    ("max", if numbers.is_empty() { Value::Null } else { Value::Float(max) }),
                    ("sumsqr", Value::Float(numbers.iter().map(|n| n * n).sum())),
                ])
            }
        }
    }
}

/// Sum of the numeric values; integer while every number is an integer
fn sum(values: &[&Value]) -> Value {
    let numbers: Vec<&Value> = values
        .iter()
        .copied()
        .filter(|v| matches!(v, Value::Integer(_) | Value::Float(_)))
        .collect();
    if numbers.iter().all(|v| matches!(v, Value::Integer(_))) {
        let total = numbers
            .iter()
            .filter_map(|v| v.as_i64())
            .try_fold(0i64, i64::checked_add);
        if let Some(total) = total {
            return Value::Integer(total);
        }
    }
    // Mixed numbers, or an integer total past i64
    Value::Float(numbers.iter().filter_map(|v| v.as_f64()).sum())
}

impl FromStr for Reducer {
    type Err = BasementError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "_count" | "count" => Ok(Reducer::Count),
            "_sum" | "sum" => Ok(Reducer::Sum),
            "_stats" | "stats" => Ok(Reducer::Stats),
            other => Err(BasementError::InvalidConfiguration(format!(
                "Unknown reduce function '{}'. Use _count, _sum or _stats.",
                other
            ))),
        }
    }
}

/// A view: map function plus optional reducer
#[derive(Clone)]
pub struct ViewDefinition {
    map: MapFn,
    reduce: Option<Reducer>,
}

impl ViewDefinition {
    /// A view backed by a map function
    pub fn new<F>(map: F) -> Self
    where
        F: Fn(&str, &Value) -> Vec<(Value, Value)> + Send + Sync + 'static,
    {
        Self {
            map: Arc::new(map),
            reduce: None,
        }
    }

    /// A view emitting `key_field` of every document that has it, with
    /// `value_field` (or null) as the row value. Fields may be dotted paths.
    pub fn by_field(key_field: &str, value_field: Option<&str>) -> Self {
        let key_field = key_field.to_string();
        let value_field = value_field.map(str::to_string);
        Self::new(move |_, doc| match doc.get_path(&key_field) {
            Some(key) => {
                let value = value_field
                    .as_deref()
                    .and_then(|f| doc.get_path(f))
                    .cloned()
                    .unwrap_or(Value::Null);
                vec![(key.clone(), value)]
            }
            None => Vec::new(),
        })
    }

    pub fn with_reduce(mut self, reducer: Reducer) -> Self {
        self.reduce = Some(reducer);
        self
    }

    pub fn reducer(&self) -> Option<Reducer> {
        self.reduce
    }

    /// Run the view over `docs` and answer a query
    pub(crate) fn query<'a, I>(&self, docs: I, params: &QueryParams) -> Result<ViewResponse>
    where
        I: IntoIterator<Item = (&'a str, &'a StoredValue)>,
    {
        let opts = QueryOptions::parse(params)?;

        let mut rows = self.index(docs);
        let total_rows = rows.len();
        if opts.descending {
            rows.reverse();
        }
        let rows = opts.filter(rows);

        let reduce = opts.reduce.unwrap_or(self.reduce.is_some());
        if reduce {
            let reducer = self.reduce.ok_or_else(|| {
                BasementError::invalid_argument("reduce requested on a view without a reduce function")
            })?;
            let rows = group(&rows, &opts, reducer);
            return Ok(ViewResponse {
                reduced: true,
                total_rows: None,
                rows: opts.page(rows),
            });
        }

        let rows = opts
            .page(rows)
            .into_iter()
            .map(|row| ViewRow {
                id: Some(row.id.to_string()),
                key: row.key,
                value: row.value,
                doc: opts.include_docs.then(|| row.stored.clone()),
            })
            .collect();

        Ok(ViewResponse {
            reduced: false,
            total_rows: Some(total_rows),
            rows,
        })
    }

    /// Map every JSON document and sort the rows
    fn index<'a, I>(&self, docs: I) -> Vec<IndexedRow<'a>>
    where
        I: IntoIterator<Item = (&'a str, &'a StoredValue)>,
    {
        let mut rows = Vec::new();
        for (id, stored) in docs {
            // Only JSON documents can be indexed
            let Ok(doc) = Value::from_json_str(&stored.value) else {
                continue;
            };
            for (key, value) in (self.map)(id, &doc) {
                rows.push(IndexedRow {
                    id,
                    key,
                    value,
                    stored,
                });
            }
        }
        rows.sort_by(|a, b| a.key.collate(&b.key).then_with(|| a.id.cmp(b.id)));
        rows
    }
}

impl fmt::Debug for ViewDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDefinition")
            .field("reduce", &self.reduce)
            .finish_non_exhaustive()
    }
}

/// Declarative view, as written in the configuration file
///
/// ```toml
/// [[views]]
/// design = "users"
/// name = "by_age"
/// key_field = "age"
/// value_field = "name"
/// reduce = "_count"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSpec {
    pub design: String,
    pub name: String,
    pub key_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<String>,
}

impl ViewSpec {
    pub fn to_definition(&self) -> Result<ViewDefinition> {
        let view = ViewDefinition::by_field(&self.key_field, self.value_field.as_deref());
        match &self.reduce {
            Some(reduce) => Ok(view.with_reduce(reduce.parse()?)),
            None => Ok(view),
        }
    }
}

struct IndexedRow<'a> {
    id: &'a str,
    key: Value,
    value: Value,
    stored: &'a StoredValue,
}

/// Parsed query parameters
#[derive(Debug, Default)]
struct QueryOptions {
    descending: bool,
    key: Option<Value>,
    keys: Option<Vec<Value>>,
    start_key: Option<Value>,
    end_key: Option<Value>,
    start_doc_id: Option<String>,
    end_doc_id: Option<String>,
    inclusive_end: bool,
    skip: usize,
    limit: Option<usize>,
    include_docs: bool,
    reduce: Option<bool>,
    group: bool,
    group_level: Option<usize>,
}

impl QueryOptions {
    fn parse(params: &QueryParams) -> Result<Self> {
        let keys = match params.get_json(names::KEYS)? {
            Some(Value::List(keys)) => Some(keys),
            Some(other) => {
                return Err(BasementError::invalid_argument(format!(
                    "Parameter 'keys' must be a list, got {}",
                    other.type_name()
                )))
            }
            None => None,
        };

        Ok(Self {
            descending: params.get_bool(names::DESCENDING)?.unwrap_or(false),
            key: params.get_json(names::KEY)?,
            keys,
            start_key: params.get_json(names::START_KEY)?,
            end_key: params.get_json(names::END_KEY)?,
            start_doc_id: params.get(names::START_KEY_DOC_ID).map(str::to_string),
            end_doc_id: params.get(names::END_KEY_DOC_ID).map(str::to_string),
            inclusive_end: params.get_bool(names::INCLUSIVE_END)?.unwrap_or(true),
            skip: params.get_usize(names::SKIP)?.unwrap_or(0),
            limit: params.get_usize(names::LIMIT)?,
            include_docs: params.get_bool(names::INCLUDE_DOCS)?.unwrap_or(false),
            reduce: params.get_bool(names::REDUCE)?,
            group: params.get_bool(names::GROUP)?.unwrap_or(false),
            group_level: params.get_usize(names::GROUP_LEVEL)?,
        })
    }

    /// Compare in iteration order (reversed when descending)
    fn directed(&self, a: &Value, a_id: &str, b: &Value, b_id: Option<&str>) -> Ordering {
        let ord = a
            .collate(b)
            .then_with(|| b_id.map_or(Ordering::Equal, |b_id| a_id.cmp(b_id)));
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }

    fn filter<'a>(&self, rows: Vec<IndexedRow<'a>>) -> Vec<IndexedRow<'a>> {
        if let Some(keys) = &self.keys {
            let mut selected = Vec::new();
            let mut rows: Vec<Option<IndexedRow<'a>>> = rows.into_iter().map(Some).collect();
            for wanted in keys {
                for slot in rows.iter_mut() {
                    if slot
                        .as_ref()
                        .is_some_and(|row| row.key.collate(wanted) == Ordering::Equal)
                    {
                        selected.extend(slot.take());
                    }
                }
            }
            return selected;
        }

        rows.into_iter()
            .filter(|row| {
                self.key
                    .as_ref()
                    .map_or(true, |key| row.key.collate(key) == Ordering::Equal)
            })
            .filter(|row| {
                self.start_key.as_ref().map_or(true, |start| {
                    self.directed(&row.key, row.id, start, self.start_doc_id.as_deref())
                        != Ordering::Less
                })
            })
            .filter(|row| {
                self.end_key.as_ref().map_or(true, |end| {
                    match self.directed(&row.key, row.id, end, self.end_doc_id.as_deref()) {
                        Ordering::Less => true,
                        Ordering::Equal => self.inclusive_end,
                        Ordering::Greater => false,
                    }
                })
            })
            .collect()
    }

    fn page<T>(&self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Key a row is grouped under
    fn group_key(&self, key: &Value) -> Option<Value> {
        match (self.group_level, key) {
            (Some(level), Value::List(items)) => {
                Some(Value::List(items.iter().take(level).cloned().collect()))
            }
            (Some(_), other) => Some(other.clone()),
            (None, other) if self.group => Some(other.clone()),
            (None, _) => None,
        }
    }
}

/// Reduce rows, one output row per group (or a single row without grouping)
fn group(rows: &[IndexedRow<'_>], opts: &QueryOptions, reducer: Reducer) -> Vec<ViewRow> {
    let grouping = opts.group || opts.group_level.is_some();
    if !grouping {
        if rows.is_empty() {
            return Vec::new();
        }
        let values: Vec<&Value> = rows.iter().map(|r| &r.value).collect();
        return vec![ViewRow {
            id: None,
            key: Value::Null,
            value: reducer.reduce(&values),
            doc: None,
        }];
    }

    // Rows are sorted, so each group is a contiguous run
    let mut groups: Vec<(Value, Vec<&Value>)> = Vec::new();
    for row in rows {
        let key = opts.group_key(&row.key).unwrap_or(Value::Null);
        match groups.last_mut() {
            Some((current, values)) if current.collate(&key) == Ordering::Equal => {
                values.push(&row.value)
            }
            _ => groups.push((key, vec![&row.value])),
        }
    }

    groups
        .into_iter()
        .map(|(key, values)| ViewRow {
            id: None,
            key,
            value: reducer.reduce(&values),
            doc: None,
        })
        .collect()
}
