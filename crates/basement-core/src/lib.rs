//! Basement Core Library
//!
//! Document persistence and view queries over a key/value store with
//! check-and-set (CAS) tokens.
//!
//! # Architecture
//!
//! - **Client**: saves documents, fetches them by key and queries views
//! - **Store**: the key/value + view backend the client talks to
//!
//! Payloads are turned into stored strings by named transcoders, so the
//! same client can read and write JSON, CBOR or any registered format.
//!
//! # Quick Start
//!
//! ```text
//! let mut client = Client::new(Config::default())?;
//!
//! // Save a document
//! let mut doc = Document::with_key("user:1");
//! doc.set("name", "alice");
//! client.save_document(&mut doc, &SaveOptions::default())?;
//!
//! // Fetch it back
//! let found = client.find_document("user:1")?;
//!
//! // Query a view
//! let mut query = ViewQuery::new();
//! query.limit(10)?.descending(true);
//! let result = client.find_by_view("users", "by_age", query)?;
//! ```
//!
//! # Modules
//!
//! - `client`: the client (main entry point)
//! - `document`, `collection`, `view`: result objects
//! - `query`: view query builder
//! - `transcoder`: payload encodings
//! - `store`: store trait and the in-process memory store
//! - `config`: client configuration

pub mod client;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod keygen;
pub mod query;
pub mod store;
pub mod transcoder;
pub mod value;
pub mod view;

pub use client::{
    Client, FindOptions, FindRequest, FindResult, KeyLookup, KeySelection, QueryInput,
    ResultShape, SaveInput, SaveOptions, ViewLookup,
};
pub use collection::DocumentCollection;
pub use config::Config;
pub use document::{Cas, Document};
pub use error::{BasementError, Result};
pub use keygen::{generate_key, KeyGenerator, SequentialKeyGenerator, UniqueKeyGenerator};
pub use query::{QueryParams, Stale, ViewQuery};
pub use store::{Connector, MemoryConnector, MemoryStore, Store, StoreOperation};
pub use transcoder::{Transcoder, TranscoderRegistry};
pub use value::Value;
pub use view::ViewResult;
