//! Store layer
//!
//! [`Store`] is the narrow interface the client talks to: raw string values
//! with CAS tokens, the three write flavours (`set`, `add`, `replace`),
//! `delete`, and view queries. It deals in wire data only; transcoding and
//! result shaping happen in the client.
//!
//! Rejections are values, not errors: a write the store refuses returns
//! `Ok(None)` and a missing key returns `Ok(None)` from `get`. `Err` is
//! reserved for failures that kept the operation from running at all.
//!
//! ## Implementations
//!
//! - [`memory::MemoryStore`]: in-process store with CAS, expiration, views
//!   and optional snapshot persistence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::document::Cas;
use crate::error::Result;
use crate::query::QueryParams;
use crate::value::Value;

pub mod memory;
pub mod snapshot;
pub mod views;

pub use memory::{MemoryConnector, MemoryStore};
pub use views::{Reducer, ViewDefinition, ViewSpec};

/// A raw stored value and its current CAS token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: String,
    pub cas: Cas,
}

/// One row of a view response
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    /// Key of the document that emitted the row (absent for reduced rows)
    pub id: Option<String>,
    /// Emitted key
    pub key: Value,
    /// Emitted value, or the reduction output
    pub value: Value,
    /// The emitting document, when `include_docs` was requested
    pub doc: Option<StoredValue>,
}

/// A view response as returned by the store
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewResponse {
    pub reduced: bool,
    pub total_rows: Option<usize>,
    pub rows: Vec<ViewRow>,
}

/// Write operation chosen by the client for a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    /// Unconditional upsert
    Set,
    /// Insert; rejected if the key exists
    Add,
    /// Update; rejected if the key is missing
    Replace,
}

impl StoreOperation {
    /// Pick the operation for a save's `override`/`replace` flags.
    ///
    /// `override` without `replace` is a `set`, no `override` is an `add`,
    /// and `replace` (with `override`) is a `replace`.
    pub fn select(override_existing: bool, replace: bool) -> Self {
        match (override_existing, replace) {
            (true, false) => StoreOperation::Set,
            (false, _) => StoreOperation::Add,
            (true, true) => StoreOperation::Replace,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::Set => "set",
            StoreOperation::Add => "add",
            StoreOperation::Replace => "replace",
        }
    }

    /// Issue this operation against `store`
    pub fn apply(
        &self,
        store: &mut dyn Store,
        key: &str,
        value: &str,
        expiration: u32,
        cas: Option<Cas>,
    ) -> Result<Option<Cas>> {
        match self {
            StoreOperation::Set => store.set(key, value, expiration, cas),
            StoreOperation::Add => store.add(key, value, expiration, cas),
            StoreOperation::Replace => store.replace(key, value, expiration, cas),
        }
    }
}

/// Key/value + view store the client persists to
pub trait Store: Send {
    /// Fetch the raw value and CAS for `key`
    fn get(&self, key: &str) -> Result<Option<StoredValue>>;

    /// Store unconditionally (subject to `cas`)
    fn set(&mut self, key: &str, value: &str, expiration: u32, cas: Option<Cas>)
        -> Result<Option<Cas>>;

    /// Store only if `key` does not exist yet
    fn add(&mut self, key: &str, value: &str, expiration: u32, cas: Option<Cas>)
        -> Result<Option<Cas>>;

    /// Store only if `key` already exists (subject to `cas`)
    fn replace(
        &mut self,
        key: &str,
        value: &str,
        expiration: u32,
        cas: Option<Cas>,
    ) -> Result<Option<Cas>>;

    /// Remove `key`; `false` if it did not exist
    fn delete(&mut self, key: &str) -> Result<bool>;

    /// Query a view. Unknown design documents or views are
    /// [`crate::BasementError::InvalidView`].
    fn view(&self, design: &str, view: &str, params: &QueryParams) -> Result<ViewResponse>;

    /// Version of the store client library
    fn client_version(&self) -> String;

    /// Version reported by each node, keyed by node address
    fn cluster_version(&self) -> Result<BTreeMap<String, String>>;
}

/// Opens a [`Store`] for a configuration
pub trait Connector: Send {
    fn connect(&self, config: &Config) -> Result<Box<dyn Store>>;
}

impl<F> Connector for F
where
    F: Fn(&Config) -> Result<Box<dyn Store>> + Send,
{
    fn connect(&self, config: &Config) -> Result<Box<dyn Store>> {
        self(config)
    }
}
