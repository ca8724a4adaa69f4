//! View query parameters
//!
//! [`ViewQuery`] builds the parameter set for a view request. Every setter
//! checks its input, so a query that made it through the builder is one the
//! store will accept. The builder keeps its state between queries, which
//! makes it cheap to reuse for paging (`skip`/`limit`).
//!
//! The result of [`ViewQuery::params`] is a [`QueryParams`]: parameter name
//! to wire value. Callers that already have wire-ready values can build a
//! `QueryParams` directly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{BasementError, Result};
use crate::value::Value;

/// Parameter names as understood by the store
pub mod names {
    pub const STALE: &str = "stale";
    pub const DESCENDING: &str = "descending";
    pub const REDUCE: &str = "reduce";
    pub const INCLUDE_DOCS: &str = "include_docs";
    pub const SKIP: &str = "skip";
    pub const LIMIT: &str = "limit";
    pub const GROUP: &str = "group";
    pub const GROUP_LEVEL: &str = "group_level";
    pub const KEY: &str = "key";
    pub const KEYS: &str = "keys";
    pub const START_KEY: &str = "startkey";
    pub const END_KEY: &str = "endkey";
    pub const START_KEY_DOC_ID: &str = "startkey_docid";
    pub const END_KEY_DOC_ID: &str = "endkey_docid";
    pub const INCLUSIVE_END: &str = "inclusive_end";
    pub const ON_ERROR: &str = "on_error";
}

/// Whether a view may answer from a stale index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stale {
    /// Update the index before answering
    False,
    /// Answer from the index as it is
    Ok,
    /// Answer from the index as it is, then update it
    UpdateAfter,
}

impl Stale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stale::False => "false",
            Stale::Ok => "ok",
            Stale::UpdateAfter => "update_after",
        }
    }
}

impl fmt::Display for Stale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stale {
    type Err = BasementError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "false" => Ok(Stale::False),
            "true" | "ok" => Ok(Stale::Ok),
            "update_after" | "after" => Ok(Stale::UpdateAfter),
            other => Err(BasementError::invalid_argument(format!(
                "Unknown stale mode: {}",
                other
            ))),
        }
    }
}

impl TryFrom<bool> for Stale {
    type Error = BasementError;

    fn try_from(stale: bool) -> Result<Self> {
        Ok(if stale { Stale::Ok } else { Stale::False })
    }
}

impl TryFrom<&str> for Stale {
    type Error = BasementError;

    fn try_from(stale: &str) -> Result<Self> {
        stale.parse()
    }
}

/// What the store does when a node fails while answering a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    Continue,
    Stop,
}

impl OnError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnError::Continue => "continue",
            OnError::Stop => "stop",
        }
    }
}

impl FromStr for OnError {
    type Err = BasementError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "continue" => Ok(OnError::Continue),
            "stop" => Ok(OnError::Stop),
            other => Err(BasementError::invalid_argument(format!(
                "Unknown on_error mode: {}",
                other
            ))),
        }
    }
}

/// Wire-ready view parameters, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a boolean parameter (`"true"`/`"false"`)
    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        self.get(name)
            .map(|raw| match raw {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(BasementError::invalid_argument(format!(
                    "Parameter '{}' must be true or false, got '{}'",
                    name, other
                ))),
            })
            .transpose()
    }

    /// Read a non-negative integer parameter
    pub fn get_usize(&self, name: &str) -> Result<Option<usize>> {
        self.get(name)
            .map(|raw| {
                raw.parse::<usize>().map_err(|_| {
                    BasementError::invalid_argument(format!(
                        "Parameter '{}' must be a non-negative integer, got '{}'",
                        name, raw
                    ))
                })
            })
            .transpose()
    }

    /// Read a JSON-encoded parameter
    pub fn get_json(&self, name: &str) -> Result<Option<Value>> {
        self.get(name)
            .map(|raw| {
                Value::from_json_str(raw).map_err(|e| {
                    BasementError::invalid_argument(format!(
                        "Parameter '{}' is not valid JSON: {}",
                        name, e
                    ))
                })
            })
            .transpose()
    }

    /// Render as `name=value&...` for logging or URL-based stores.
    ///
    /// Values are not percent-encoded.
    pub fn to_query_string(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validating builder for view parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    params: QueryParams,
}

impl Default for ViewQuery {
    fn default() -> Self {
        let mut params = QueryParams::new();
        params
            .insert(names::STALE, Stale::False.as_str())
            .insert(names::REDUCE, "false")
            .insert(names::INCLUDE_DOCS, "false");
        Self { params }
    }
}

impl ViewQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated parameters
    pub fn params(&self) -> QueryParams {
        self.params.clone()
    }

    pub fn into_params(self) -> QueryParams {
        self.params
    }

    /// Current wire value of a parameter
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Drop everything set so far and restore the defaults
    pub fn reset(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    /// Allow answers from a stale index.
    ///
    /// Accepts `false`, `true`/`"ok"` and `"update_after"`/`"after"`.
    pub fn stale<T>(&mut self, stale: T) -> Result<&mut Self>
    where
        T: TryInto<Stale, Error = BasementError>,
    {
        let stale = stale.try_into()?;
        Ok(self.stale_mode(stale))
    }

    pub fn stale_mode(&mut self, stale: Stale) -> &mut Self {
        self.params.insert(names::STALE, stale.as_str());
        self
    }

    pub fn descending(&mut self, descending: impl Into<Value>) -> &mut Self {
        self.set_flag(names::DESCENDING, descending.into())
    }

    /// Use the view's reduce function
    pub fn reduce(&mut self, reduce: impl Into<Value>) -> &mut Self {
        self.set_flag(names::REDUCE, reduce.into())
    }

    /// Return the full documents alongside the rows
    pub fn include_docs(&mut self, include: impl Into<Value>) -> &mut Self {
        self.set_flag(names::INCLUDE_DOCS, include.into())
    }

    /// Group reduced rows by their full key
    pub fn group(&mut self, group: impl Into<Value>) -> &mut Self {
        self.set_flag(names::GROUP, group.into())
    }

    /// Include rows whose key equals `endkey`
    pub fn inclusive_end(&mut self, inclusive: impl Into<Value>) -> &mut Self {
        self.set_flag(names::INCLUSIVE_END, inclusive.into())
    }

    /// Skip this number of rows before returning results
    pub fn skip(&mut self, skip: i64) -> Result<&mut Self> {
        self.set_count(names::SKIP, skip)
    }

    /// Return at most this many rows
    pub fn limit(&mut self, limit: i64) -> Result<&mut Self> {
        self.set_count(names::LIMIT, limit)
    }

    /// Group reduced rows by the first `level` elements of list keys
    pub fn group_level(&mut self, level: i64) -> Result<&mut Self> {
        self.set_count(names::GROUP_LEVEL, level)
    }

    /// Only return rows with exactly this key
    pub fn key(&mut self, key: impl Into<Value>) -> &mut Self {
        self.set_json(names::KEY, key.into())
    }

    /// Only return rows matching one of these keys
    pub fn keys(&mut self, keys: impl Into<Value>) -> &mut Self {
        self.set_json(names::KEYS, keys.into())
    }

    /// Start returning rows at this key
    pub fn start_key(&mut self, key: impl Into<Value>) -> &mut Self {
        self.set_json(names::START_KEY, key.into())
    }

    /// Stop returning rows at this key
    pub fn end_key(&mut self, key: impl Into<Value>) -> &mut Self {
        self.set_json(names::END_KEY, key.into())
    }

    /// Start at this document id among rows sharing the start key
    pub fn start_key_doc_id(&mut self, doc_id: impl Into<Value>) -> Result<&mut Self> {
        self.set_doc_id(names::START_KEY_DOC_ID, doc_id.into())
    }

    /// Stop at this document id among rows sharing the end key
    pub fn end_key_doc_id(&mut self, doc_id: impl Into<Value>) -> Result<&mut Self> {
        self.set_doc_id(names::END_KEY_DOC_ID, doc_id.into())
    }

    /// Behaviour when a node fails: `"continue"` or `"stop"`
    pub fn on_error(&mut self, mode: &str) -> Result<&mut Self> {
        let mode: OnError = mode.parse()?;
        self.params.insert(names::ON_ERROR, mode.as_str());
        Ok(self)
    }

    fn set_flag(&mut self, name: &str, value: Value) -> &mut Self {
        let flag = if value.is_truthy() { "true" } else { "false" };
        self.params.insert(name, flag);
        self
    }

    fn set_count(&mut self, name: &str, count: i64) -> Result<&mut Self> {
        if count < 0 {
            return Err(BasementError::invalid_argument(format!(
                "Given {} value is invalid: {} (must be zero or more)",
                name, count
            )));
        }
        self.params.insert(name, count.to_string());
        Ok(self)
    }

    fn set_json(&mut self, name: &str, value: Value) -> &mut Self {
        self.params.insert(name, value.to_canonical_json());
        self
    }

    fn set_doc_id(&mut self, name: &str, doc_id: Value) -> Result<&mut Self> {
        match doc_id {
            Value::String(id) => {
                self.params.insert(name, id);
                Ok(self)
            }
            other => Err(BasementError::invalid_argument(format!(
                "{} must be a string, got {}",
                name,
                other.type_name()
            ))),
        }
    }
}
