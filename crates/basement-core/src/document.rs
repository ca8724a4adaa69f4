//! Documents
//!
//! A [`Document`] is the object form of one entry in the bucket: a key, a
//! structured payload and, once it has been read or written, the CAS token
//! the store assigned. Documents built from reduced view rows carry the
//! reduction output in `value` instead of a payload.

use std::cell::OnceCell;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::keygen::{KeyGenerator, UniqueKeyGenerator};
use crate::value::Value;

/// Opaque check-and-set token assigned by the store on every write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cas(u64);

impl Cas {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cas {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Cas)
    }
}

/// A document stored under a unique key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Set once; generated on first read if the caller never provides one
    key: OnceCell<String>,
    payload: Option<Value>,
    cas: Option<Cas>,
    /// Reduction output of a view row
    value: Option<Value>,
}

impl Document {
    /// Create an empty document without a key
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document with the given key
    pub fn with_key(key: impl Into<String>) -> Self {
        let mut doc = Self::new();
        doc.set_key(key);
        doc
    }

    /// Create a document with a key and a payload
    pub fn with_payload(key: impl Into<String>, payload: impl Into<Value>) -> Self {
        let mut doc = Self::with_key(key);
        doc.payload = Some(payload.into());
        doc
    }

    /// Get the key, generating one on first access if none was set
    pub fn key(&self) -> &str {
        self.key_with(&UniqueKeyGenerator)
    }

    /// Get the key, generating one with `generator` if none was set
    pub fn key_with(&self, generator: &dyn KeyGenerator) -> &str {
        self.key.get_or_init(|| generator.generate(""))
    }

    /// Whether a key has been set or generated
    pub fn has_key(&self) -> bool {
        self.key.get().is_some()
    }

    /// Replace the key. An empty key leaves the document without one.
    pub fn set_key(&mut self, key: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.key = if key.is_empty() {
            OnceCell::new()
        } else {
            OnceCell::from(key)
        };
        self
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Value> {
        self.payload.as_mut()
    }

    /// Replace the whole payload
    pub fn set_payload(&mut self, payload: impl Into<Value>) -> &mut Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn take_payload(&mut self) -> Option<Value> {
        self.payload.take()
    }

    /// Read a single field of a map payload
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(field))
    }

    /// Set a single field of the payload.
    ///
    /// A missing or non-map payload is replaced by a map holding only this
    /// field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let payload = self.payload.get_or_insert_with(Value::map);
        if payload.as_map().is_none() {
            *payload = Value::map();
        }
        if let Some(map) = payload.as_map_mut() {
            map.insert(field.into(), value.into());
        }
        self
    }

    /// Remove a field from a map payload, returning its old value
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.payload
            .as_mut()
            .and_then(|p| p.as_map_mut())
            .and_then(|m| m.remove(field))
    }

    pub fn cas(&self) -> Option<Cas> {
        self.cas
    }

    pub fn set_cas(&mut self, cas: Option<Cas>) -> &mut Self {
        self.cas = cas;
        self
    }

    /// Reduction output, for documents built from reduced view rows
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<Value>) -> &mut Self {
        self.value = value;
        self
    }

    /// The payload as canonical JSON text (`null` without a payload)
    pub fn to_json(&self) -> String {
        self.payload
            .as_ref()
            .map(Value::to_canonical_json)
            .unwrap_or_else(|| "null".to_string())
    }
}
