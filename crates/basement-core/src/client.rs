//! The client
//!
//! [`Client`] is the entry point: it owns the configuration, the transcoder
//! registry, the key generator and the connection to a [`Store`], and turns
//! documents into store writes and store answers into documents.
//!
//! ## Saving
//!
//! [`Client::save`] picks the store operation from [`SaveOptions`]:
//!
//! | `override_existing` | `replace` | operation |
//! |---|---|---|
//! | true | false | `set` |
//! | false | any | `add` |
//! | true | true | `replace` |
//!
//! A write the store refuses (key exists, key missing, CAS mismatch) is
//! `Ok(None)`, not an error.
//!
//! ## Finding
//!
//! [`Client::find`] takes a [`FindRequest`]: either keys to fetch or a view
//! to query. Key lookups decode each stored value with the configured (or
//! requested) transcoder; view queries turn every row into a [`Document`]
//! inside a [`ViewResult`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::collection::DocumentCollection;
use crate::config::Config;
use crate::document::{Cas, Document};
use crate::error::{BasementError, Result};
use crate::keygen::{KeyGenerator, UniqueKeyGenerator};
use crate::query::{QueryParams, ViewQuery};
use crate::store::{Connector, MemoryConnector, Store, StoreOperation, ViewRow};
use crate::transcoder::{JsonTranscoder, Transcoder, TranscoderRegistry};
use crate::value::Value;
use crate::view::ViewResult;

/// Options for [`Client::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    /// Overwrite an existing value (`set`); `false` only inserts (`add`)
    pub override_existing: bool,
    /// Only update an existing value (`replace`)
    pub replace: bool,
    /// `0` never expires; up to 30 days is relative seconds, larger values
    /// are Unix timestamps
    pub expiration: u32,
    /// Only write if the stored CAS still matches
    pub cas: Option<Cas>,
    /// Transcoder name; the configured default when `None`
    pub transcoder: Option<String>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            override_existing: true,
            replace: false,
            expiration: 0,
            cas: None,
            transcoder: None,
        }
    }
}

impl SaveOptions {
    /// Insert only: rejected if the key exists
    pub fn add() -> Self {
        Self {
            override_existing: false,
            ..Self::default()
        }
    }

    /// Update only: rejected if the key is missing
    pub fn replace() -> Self {
        Self {
            replace: true,
            ..Self::default()
        }
    }

    pub fn with_expiration(mut self, expiration: u32) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_cas(mut self, cas: Cas) -> Self {
        self.cas = Some(cas);
        self
    }

    pub fn with_transcoder(mut self, name: impl Into<String>) -> Self {
        self.transcoder = Some(name.into());
        self
    }

    /// Store operation these options select
    pub fn operation(&self) -> StoreOperation {
        StoreOperation::select(self.override_existing, self.replace)
    }
}

/// What to save: a document, or a bare key and payload
#[derive(Debug, Clone)]
pub enum SaveInput<'a> {
    Document(&'a Document),
    Pair {
        key: Option<String>,
        payload: Option<Value>,
    },
}

impl<'a> From<&'a Document> for SaveInput<'a> {
    fn from(doc: &'a Document) -> Self {
        SaveInput::Document(doc)
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for SaveInput<'_> {
    fn from((key, payload): (K, V)) -> Self {
        SaveInput::Pair {
            key: Some(key.into()),
            payload: Some(payload.into()),
        }
    }
}

/// One key or several
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelection {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for KeySelection {
    fn from(key: &str) -> Self {
        KeySelection::One(key.to_string())
    }
}

impl From<String> for KeySelection {
    fn from(key: String) -> Self {
        KeySelection::One(key)
    }
}

impl From<Vec<String>> for KeySelection {
    fn from(keys: Vec<String>) -> Self {
        KeySelection::Many(keys)
    }
}

impl From<Vec<&str>> for KeySelection {
    fn from(keys: Vec<&str>) -> Self {
        KeySelection::Many(keys.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for KeySelection {
    fn from(keys: &[&str]) -> Self {
        KeySelection::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

/// Shape of a key lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    /// A document for one key, a collection for several
    #[default]
    Auto,
    /// Always a single document (the first one found)
    First,
    /// Always a collection
    All,
}

/// Options for key lookups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Return the stored string without decoding (single key only)
    pub raw: bool,
    pub shape: ResultShape,
    /// Transcoder name; the configured default when `None`
    pub transcoder: Option<String>,
}

impl FindOptions {
    pub fn raw() -> Self {
        Self {
            raw: true,
            ..Self::default()
        }
    }

    pub fn with_shape(mut self, shape: ResultShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_transcoder(mut self, name: impl Into<String>) -> Self {
        self.transcoder = Some(name.into());
        self
    }
}

/// Fetch documents by key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLookup {
    pub keys: KeySelection,
    pub options: FindOptions,
}

impl KeyLookup {
    pub fn new(keys: impl Into<KeySelection>) -> Self {
        Self {
            keys: keys.into(),
            options: FindOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FindOptions) -> Self {
        self.options = options;
        self
    }
}

/// Parameters for a view lookup
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryInput {
    /// No parameters; the store's defaults apply
    #[default]
    None,
    /// Ready-made parameters
    Params(QueryParams),
    /// A query builder, resolved through [`ViewQuery::params`]
    Builder(ViewQuery),
}

impl QueryInput {
    pub fn into_params(self) -> QueryParams {
        match self {
            QueryInput::None => QueryParams::new(),
            QueryInput::Params(params) => params,
            QueryInput::Builder(query) => query.into_params(),
        }
    }
}

impl From<QueryParams> for QueryInput {
    fn from(params: QueryParams) -> Self {
        QueryInput::Params(params)
    }
}

impl From<ViewQuery> for QueryInput {
    fn from(query: ViewQuery) -> Self {
        QueryInput::Builder(query)
    }
}

impl From<&ViewQuery> for QueryInput {
    fn from(query: &ViewQuery) -> Self {
        QueryInput::Params(query.params())
    }
}

impl From<&mut ViewQuery> for QueryInput {
    fn from(query: &mut ViewQuery) -> Self {
        QueryInput::Params(query.params())
    }
}

/// Query a view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewLookup {
    pub design: String,
    pub view: String,
    pub query: QueryInput,
}

impl ViewLookup {
    pub fn new(design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            design: design.into(),
            view: view.into(),
            query: QueryInput::None,
        }
    }

    pub fn with_query(mut self, query: impl Into<QueryInput>) -> Self {
        self.query = query.into();
        self
    }
}

/// A find request: by key or by view
#[derive(Debug, Clone, PartialEq)]
pub enum FindRequest {
    Key(KeyLookup),
    View(ViewLookup),
}

impl From<KeyLookup> for FindRequest {
    fn from(lookup: KeyLookup) -> Self {
        FindRequest::Key(lookup)
    }
}

impl From<ViewLookup> for FindRequest {
    fn from(lookup: ViewLookup) -> Self {
        FindRequest::View(lookup)
    }
}

/// Result of [`Client::find`]
#[derive(Debug, Clone, PartialEq)]
pub enum FindResult {
    NotFound,
    Raw(String),
    Document(Document),
    Collection(DocumentCollection),
    View(ViewResult),
}

impl FindResult {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FindResult::NotFound)
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            FindResult::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_collection(self) -> Option<DocumentCollection> {
        match self {
            FindResult::Collection(docs) => Some(docs),
            _ => None,
        }
    }

    pub fn into_raw(self) -> Option<String> {
        match self {
            FindResult::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn into_view(self) -> Option<ViewResult> {
        match self {
            FindResult::View(view) => Some(view),
            _ => None,
        }
    }
}

/// Persistence and query client over a [`Store`]
pub struct Client {
    config: Config,
    connector: Box<dyn Connector>,
    connection: Option<Box<dyn Store>>,
    transcoders: TranscoderRegistry,
    keys: Box<dyn KeyGenerator>,
}

impl Client {
    /// Create a client backed by the local memory store.
    ///
    /// Connects right away when `config.connect` is set.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_connector(config, MemoryConnector::new())
    }

    /// Create a client that opens its store through `connector`
    pub fn with_connector(config: Config, connector: impl Connector + 'static) -> Result<Self> {
        let mut client = Self {
            config,
            connector: Box::new(connector),
            connection: None,
            transcoders: TranscoderRegistry::new(),
            keys: Box::new(UniqueKeyGenerator),
        };

        if client.config.connect {
            client.connect()?;
        }
        Ok(client)
    }

    /// Create a client on an already open store
    pub fn with_store(config: Config, store: impl Store + 'static) -> Self {
        Self {
            config,
            connector: Box::new(MemoryConnector::new()),
            connection: Some(Box::new(store)),
            transcoders: TranscoderRegistry::new(),
            keys: Box::new(UniqueKeyGenerator),
        }
    }

    /// Use `generator` for document keys
    pub fn with_key_generator(mut self, generator: impl KeyGenerator + 'static) -> Self {
        self.keys = Box::new(generator);
        self
    }

    /// Open (or reopen) the store connection
    pub fn connect(&mut self) -> Result<()> {
        let store = self
            .connector
            .connect(&self.config)
            .map_err(|e| match e {
                BasementError::Io(io) => BasementError::ConnectionFailure {
                    host: self.config.host.clone(),
                    reason: io.to_string(),
                },
                other => other,
            })?;

        info!(
            "Connected to {} (bucket '{}')",
            self.config.host, self.config.bucket
        );
        self.connection = Some(store);
        Ok(())
    }

    pub fn connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The open store, or [`BasementError::NotConnected`]
    pub fn connection(&self) -> Result<&dyn Store> {
        self.connection.as_deref().ok_or(BasementError::NotConnected)
    }

    pub fn connection_mut(&mut self) -> Result<&mut (dyn Store + 'static)> {
        self.connection
            .as_deref_mut()
            .ok_or(BasementError::NotConnected)
    }

    pub fn transcoders(&self) -> &TranscoderRegistry {
        &self.transcoders
    }

    pub fn transcoders_mut(&mut self) -> &mut TranscoderRegistry {
        &mut self.transcoders
    }

    /// Register a transcoder, replacing any previous one with that name
    pub fn register_transcoder(
        &mut self,
        name: impl Into<String>,
        transcoder: impl Transcoder + 'static,
    ) -> &mut Self {
        self.transcoders.register(name, transcoder);
        self
    }

    /// Version of the store client library
    pub fn client_version(&self) -> Result<String> {
        Ok(self.connection()?.client_version())
    }

    /// Version of every node of the cluster
    pub fn cluster_version(&self) -> Result<BTreeMap<String, String>> {
        self.connection()?.cluster_version()
    }

    /// Generate a fresh document key
    pub fn generate_key(&self, prefix: &str) -> String {
        self.keys.generate(prefix)
    }

    /// Save a document or a key/payload pair.
    ///
    /// Returns the new CAS, or `None` when the store rejected the write.
    pub fn save<'a>(
        &mut self,
        input: impl Into<SaveInput<'a>>,
        options: &SaveOptions,
    ) -> Result<Option<Cas>> {
        let (key, payload) = match input.into() {
            SaveInput::Document(doc) => (
                doc.key_with(&*self.keys).to_string(),
                doc.payload().cloned().unwrap_or(Value::Null),
            ),
            SaveInput::Pair { key, payload } => {
                let key = key
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| BasementError::invalid_argument("A key is required to save"))?;
                let payload = payload.ok_or_else(|| {
                    BasementError::invalid_argument(format!("No payload given for key '{}'", key))
                })?;
                (key, payload)
            }
        };

        let transcoder = self.transcoder(options.transcoder.as_deref())?;
        let encoded = transcoder.encode(&payload)?;
        let operation = options.operation();

        debug!(
            "save '{}' via {} (expiration: {}, cas: {:?})",
            key,
            operation.as_str(),
            options.expiration,
            options.cas
        );
        let store = self.connection_mut()?;
        operation.apply(store, &key, &encoded, options.expiration, options.cas)
    }

    /// Save a document and record the new CAS on it
    pub fn save_document(
        &mut self,
        doc: &mut Document,
        options: &SaveOptions,
    ) -> Result<Option<Cas>> {
        let cas = self.save(&*doc, options)?;
        if cas.is_some() {
            doc.set_cas(cas);
        }
        Ok(cas)
    }

    /// Delete a key; `false` if it did not exist
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Err(BasementError::invalid_argument("A key is required to delete"));
        }
        debug!("delete '{}'", key);
        self.connection_mut()?.delete(key)
    }

    /// Find documents by key or query a view
    pub fn find(&self, request: impl Into<FindRequest>) -> Result<FindResult> {
        match request.into() {
            FindRequest::Key(lookup) => self.find_keys(lookup),
            FindRequest::View(lookup) => self.query_view(lookup).map(FindResult::View),
        }
    }

    /// Find by key with the given options
    pub fn find_by_key(
        &self,
        keys: impl Into<KeySelection>,
        options: FindOptions,
    ) -> Result<FindResult> {
        self.find(KeyLookup::new(keys).with_options(options))
    }

    /// Query a view
    pub fn find_by_view(
        &self,
        design: &str,
        view: &str,
        query: impl Into<QueryInput>,
    ) -> Result<ViewResult> {
        self.query_view(ViewLookup::new(design, view).with_query(query))
    }

    /// Fetch one document
    pub fn find_document(&self, key: &str) -> Result<Option<Document>> {
        self.find_by_key(key, FindOptions::default())
            .map(FindResult::into_document)
    }

    /// Fetch several documents; missing keys are skipped
    pub fn find_many(&self, keys: impl Into<KeySelection>) -> Result<DocumentCollection> {
        let options = FindOptions::default().with_shape(ResultShape::All);
        let result = self.find_by_key(keys, options)?;
        Ok(result.into_collection().unwrap_or_default())
    }

    /// Resolve a transcoder: the named one, or the configured default
    fn transcoder(&self, name: Option<&str>) -> Result<Arc<dyn Transcoder>> {
        match name {
            Some(name) => self.transcoders.get(name).ok_or_else(|| {
                BasementError::invalid_argument(format!(
                    "Unknown transcoder '{}'. Registered: {}",
                    name,
                    self.transcoders.names().join(", ")
                ))
            }),
            None => self.transcoders.get(&self.config.transcoder).ok_or_else(|| {
                BasementError::InvalidConfiguration(format!(
                    "Default transcoder '{}' is not registered",
                    self.config.transcoder
                ))
            }),
        }
    }

    fn find_keys(&self, lookup: KeyLookup) -> Result<FindResult> {
        let KeyLookup { keys, options } = lookup;
        let (keys, single) = match keys {
            KeySelection::One(key) => (vec![key], true),
            KeySelection::Many(keys) => (keys, false),
        };

        if keys.is_empty() {
            return Err(BasementError::invalid_argument("No keys given"));
        }
        if keys.iter().any(String::is_empty) {
            return Err(BasementError::invalid_argument("Keys must not be empty"));
        }
        if options.raw && (!single || options.shape == ResultShape::All) {
            return Err(BasementError::invalid_argument(
                "Raw lookups take a single key and return a single value",
            ));
        }

        let store = self.connection()?;
        debug!("find {} key(s), raw: {}", keys.len(), options.raw);

        if options.raw {
            return Ok(match store.get(&keys[0])? {
                Some(stored) => FindResult::Raw(stored.value),
                None => FindResult::NotFound,
            });
        }

        let transcoder = self.transcoder(options.transcoder.as_deref())?;
        let first_only = match options.shape {
            ResultShape::First => true,
            ResultShape::All => false,
            ResultShape::Auto => single,
        };

        let mut found = DocumentCollection::new();
        for key in keys {
            let Some(stored) = store.get(&key)? else {
                continue;
            };
            let mut doc = Document::with_payload(key, transcoder.decode(&stored.value)?);
            doc.set_cas(Some(stored.cas));
            found.push(doc);
            if first_only {
                break;
            }
        }

        if first_only {
            Ok(found
                .into_iter()
                .next()
                .map_or(FindResult::NotFound, FindResult::Document))
        } else {
            Ok(FindResult::Collection(found))
        }
    }

    fn query_view(&self, lookup: ViewLookup) -> Result<ViewResult> {
        let ViewLookup {
            design,
            view,
            query,
        } = lookup;
        if design.is_empty() || view.is_empty() {
            return Err(BasementError::invalid_argument(
                "Both a design document and a view name are required",
            ));
        }

        let params = query.into_params();
        let store = self.connection()?;
        debug!("query view {}/{} ({})", design, view, params.to_query_string());

        let response = store.view(&design, &view, &params)?;

        let mut rows = DocumentCollection::new();
        let mut keys = Vec::with_capacity(response.rows.len());
        for row in response.rows {
            let (doc, key) = self.row_document(row, response.reduced)?;
            rows.push(doc);
            keys.push(key);
        }

        Ok(ViewResult::new(response.reduced, rows)
            .with_total_rows(response.total_rows)
            .with_keys(keys))
    }

    /// Turn a view row into a document plus its emitted key
    fn row_document(&self, row: ViewRow, reduced: bool) -> Result<(Document, Value)> {
        let ViewRow { id, key, value, doc } = row;
        let mut document = Document::new();

        if reduced {
            document.set_key(match &key {
                Value::String(s) => s.clone(),
                other => other.to_canonical_json(),
            });
        } else if let Some(id) = id {
            document.set_key(id);
        }
        document.set_value(Some(value));

        // Views only index JSON documents, whatever the default transcoder
        if let (false, Some(stored)) = (reduced, doc) {
            let payload = JsonTranscoder.decode(&stored.value)?;
            document.set_payload(payload).set_cas(Some(stored.cas));
        }

        Ok((document, key))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.host)
            .field("bucket", &self.config.bucket)
            .field("connected", &self.connected())
            .field("transcoders", &self.transcoders)
            .finish_non_exhaustive()
    }
}
