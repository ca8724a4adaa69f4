//! Transcoders
//!
//! A transcoder turns a payload into the string stored in the bucket and
//! back. The [`TranscoderRegistry`] holds them by name; the client looks up
//! the configured default (or a per-call override) for every save and find.
//!
//! Two transcoders are always registered:
//!
//! - `json`: plain JSON text. The only format views can index.
//! - `serialize`: CBOR, base64-encoded because the store holds text.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{BasementError, Result};
use crate::value::Value;

/// Name of the JSON transcoder
pub const JSON: &str = "json";

/// Name of the CBOR transcoder
pub const SERIALIZE: &str = "serialize";

/// Encode/decode strategy for payloads
pub trait Transcoder: Send + Sync {
    /// Turn a payload into its stored form
    fn encode(&self, payload: &Value) -> Result<String>;

    /// Turn a stored string back into a payload
    fn decode(&self, raw: &str) -> Result<Value>;
}

/// Payloads as JSON text
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTranscoder;

impl Transcoder for JsonTranscoder {
    fn encode(&self, payload: &Value) -> Result<String> {
        serde_json::to_string(payload).map_err(|e| BasementError::transcode(JSON, e))
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        serde_json::from_str(raw).map_err(|e| BasementError::transcode(JSON, e))
    }
}

/// Payloads as base64-encoded CBOR
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeTranscoder;

impl Transcoder for SerializeTranscoder {
    fn encode(&self, payload: &Value) -> Result<String> {
        let mut bytes = Vec::new();
        ciborium::into_writer(payload, &mut bytes)
            .map_err(|e| BasementError::transcode(SERIALIZE, e))?;
        Ok(STANDARD.encode(bytes))
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|e| BasementError::transcode(SERIALIZE, e))?;
        ciborium::from_reader(bytes.as_slice()).map_err(|e| BasementError::transcode(SERIALIZE, e))
    }
}

/// Stores string payloads untouched.
///
/// Not registered by default. Non-string payloads are rejected on encode;
/// decoding always yields a string payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranscoder;

impl Transcoder for PassthroughTranscoder {
    fn encode(&self, payload: &Value) -> Result<String> {
        payload.as_str().map(str::to_string).ok_or_else(|| {
            BasementError::transcode(
                "passthrough",
                format!("expected a string payload, got {}", payload.type_name()),
            )
        })
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        Ok(Value::String(raw.to_string()))
    }
}

/// Boxed encode function for [`TranscoderRegistry::register_fns`]
pub type EncodeFn = Box<dyn Fn(&Value) -> Result<String> + Send + Sync>;

/// Boxed decode function for [`TranscoderRegistry::register_fns`]
pub type DecodeFn = Box<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// A transcoder assembled from a pair of closures
struct FnTranscoder {
    encode: EncodeFn,
    decode: DecodeFn,
}

impl Transcoder for FnTranscoder {
    fn encode(&self, payload: &Value) -> Result<String> {
        (self.encode)(payload)
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        (self.decode)(raw)
    }
}

/// Named transcoders
#[derive(Clone)]
pub struct TranscoderRegistry {
    transcoders: BTreeMap<String, Arc<dyn Transcoder>>,
}

impl TranscoderRegistry {
    /// A registry holding the built-in `json` and `serialize` transcoders
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(JSON, JsonTranscoder);
        registry.register(SERIALIZE, SerializeTranscoder);
        registry
    }

    /// A registry with nothing registered
    pub fn empty() -> Self {
        Self {
            transcoders: BTreeMap::new(),
        }
    }

    /// Register a transcoder, replacing any previous one with that name
    pub fn register(&mut self, name: impl Into<String>, transcoder: impl Transcoder + 'static) {
        self.transcoders.insert(name.into(), Arc::new(transcoder));
    }

    /// Register a transcoder built from an encode and a decode function.
    ///
    /// Both functions are required.
    pub fn register_fns(
        &mut self,
        name: impl Into<String>,
        encode: Option<EncodeFn>,
        decode: Option<DecodeFn>,
    ) -> Result<()> {
        let name = name.into();
        match (encode, decode) {
            (Some(encode), Some(decode)) => {
                self.register(name, FnTranscoder { encode, decode });
                Ok(())
            }
            _ => Err(BasementError::InvalidConfiguration(format!(
                "Transcoder '{}' must provide both an encode and a decode function",
                name
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transcoder>> {
        self.transcoders.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transcoders.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.transcoders.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.transcoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcoders.is_empty()
    }
}

impl Default for TranscoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TranscoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscoderRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payloads() -> Vec<Value> {
        vec![
            Value::Null,
            Value::from(true),
            Value::from(-17),
            Value::from(2.25),
            Value::from("foobar"),
            Value::from(vec!["foobar"]),
            Value::from(json!({
                "name": "a",
                "nested": { "list": [1, 2.5, "three", null], "flag": false },
                "empty": {}
            })),
        ]
    }

    #[test]
    fn test_default_registry() {
        let registry = TranscoderRegistry::new();
        assert_eq!(registry.names(), vec![JSON, SERIALIZE]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let json = TranscoderRegistry::new().get(JSON).unwrap();
        for payload in sample_payloads() {
            let encoded = json.encode(&payload).unwrap();
            assert_eq!(json.decode(&encoded).unwrap(), payload);
        }
    }

    #[test]
    fn test_serialize_round_trip() {
        let cbor = TranscoderRegistry::new().get(SERIALIZE).unwrap();
        for payload in sample_payloads() {
            let encoded = cbor.encode(&payload).unwrap();
            assert_eq!(cbor.decode(&encoded).unwrap(), payload);
        }
    }

    #[test]
    fn test_json_encoding_is_plain_text() {
        let encoded = JsonTranscoder.encode(&Value::from(vec!["foobar"])).unwrap();
        assert_eq!(encoded, r#"["foobar"]"#);
    }

    #[test]
    fn test_decode_errors() {
        let err = JsonTranscoder.decode("{not json").unwrap_err();
        assert!(matches!(err, BasementError::Transcode { ref transcoder, .. } if transcoder == JSON));

        let err = SerializeTranscoder.decode("!!!").unwrap_err();
        assert!(matches!(err, BasementError::Transcode { .. }));
    }

    #[test]
    fn test_passthrough() {
        let mut registry = TranscoderRegistry::new();
        registry.register("none", PassthroughTranscoder);
        let none = registry.get("none").unwrap();

        assert_eq!(none.encode(&Value::from("raw text")).unwrap(), "raw text");
        assert_eq!(none.decode("raw text").unwrap(), Value::from("raw text"));
        assert!(none.encode(&Value::from(1)).is_err());
    }

    #[test]
    fn test_register_fns_requires_both() {
        let mut registry = TranscoderRegistry::new();

        let encode: EncodeFn = Box::new(|_: &Value| Ok(String::new()));
        let err = registry.register_fns("half", Some(encode), None).unwrap_err();
        assert!(matches!(err, BasementError::InvalidConfiguration(_)));
        assert!(!registry.contains("half"));

        let encode: EncodeFn =
            Box::new(|v: &Value| Ok(v.as_str().unwrap_or_default().to_uppercase()));
        let decode: DecodeFn = Box::new(|raw: &str| Ok(Value::from(raw.to_lowercase())));
        registry
            .register_fns("upper", Some(encode), Some(decode))
            .unwrap();

        let upper = registry.get("upper").unwrap();
        assert_eq!(upper.encode(&Value::from("abc")).unwrap(), "ABC");
        assert_eq!(upper.decode("ABC").unwrap(), Value::from("abc"));
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = TranscoderRegistry::new();
        registry.register(JSON, PassthroughTranscoder);

        let json = registry.get(JSON).unwrap();
        assert_eq!(json.encode(&Value::from("x")).unwrap(), "x");
        assert_eq!(registry.len(), 2);
    }
}
