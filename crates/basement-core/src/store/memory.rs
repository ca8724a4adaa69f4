//! In-process store
//!
//! [`MemoryStore`] implements [`Store`] on a sorted map. It hands out CAS
//! tokens from a counter, honours memcached-style expirations, answers view
//! queries from registered [`ViewDefinition`]s and, when opened on a path,
//! persists itself as a [`Snapshot`] after every successful write.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, info, warn};

use super::snapshot::{Entry, Snapshot};
use super::views::ViewDefinition;
use super::{Connector, Store, StoreOperation, StoredValue, ViewResponse};
use crate::config::Config;
use crate::document::Cas;
use crate::error::{BasementError, Result};
use crate::query::QueryParams;

/// Expirations up to this many seconds are relative to now, larger values
/// are absolute Unix timestamps
pub const RELATIVE_EXPIRATION_LIMIT: u32 = 60 * 60 * 24 * 30;

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Key/value store with CAS, expiration and views, held in memory
pub struct MemoryStore {
    host: String,
    entries: BTreeMap<String, Entry>,
    views: BTreeMap<String, BTreeMap<String, ViewDefinition>>,
    last_cas: u64,
    snapshot_path: Option<PathBuf>,
    clock: Clock,
}

impl MemoryStore {
    /// An empty store that is never written to disk
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            entries: BTreeMap::new(),
            views: BTreeMap::new(),
            last_cas: 0,
            snapshot_path: None,
            clock: Arc::new(Utc::now),
        }
    }

    /// Open a store backed by a snapshot file.
    ///
    /// The snapshot is loaded if it exists; every successful write
    /// rewrites it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self::new();

        if let Some(snapshot) = Snapshot::load(&path)? {
            let now = (store.clock)();
            store.last_cas = snapshot.last_cas;
            store.entries = snapshot
                .entries
                .into_iter()
                .filter(|(_, entry)| !entry.is_expired(now))
                .collect();
            debug!(
                "Loaded {} entries from snapshot {:?}",
                store.entries.len(),
                path
            );
        }

        store.snapshot_path = Some(path);
        Ok(store)
    }

    /// Name reported as the single node of the cluster
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replace the clock used for expirations
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Register (or replace) a view
    pub fn define_view(
        &mut self,
        design: impl Into<String>,
        view: impl Into<String>,
        definition: ViewDefinition,
    ) -> &mut Self {
        self.views
            .entry(design.into())
            .or_default()
            .insert(view.into(), definition);
        self
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = (self.clock)();
        self.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self, key: &str, now: DateTime<Utc>) -> Option<&Entry> {
        self.entries.get(key).filter(|entry| !entry.is_expired(now))
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    fn expires_at(&self, expiration: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match expiration {
            0 => None,
            secs if secs <= RELATIVE_EXPIRATION_LIMIT => {
                Some(now + Duration::seconds(i64::from(secs)))
            }
            timestamp => Utc.timestamp_opt(i64::from(timestamp), 0).single(),
        }
    }

    fn write(
        &mut self,
        operation: StoreOperation,
        key: &str,
        value: &str,
        expiration: u32,
        cas: Option<Cas>,
    ) -> Result<Option<Cas>> {
        if key.is_empty() {
            return Err(BasementError::invalid_argument("Key must not be empty"));
        }

        let now = (self.clock)();
        self.purge_expired(now);

        let existing = self.entries.get(key).map(|entry| entry.cas);
        let accepted = match operation {
            StoreOperation::Set => match (existing, cas) {
                (_, None) => true,
                (Some(current), Some(expected)) => current == expected,
                (None, Some(_)) => false,
            },
            StoreOperation::Add => existing.is_none(),
            StoreOperation::Replace => match (existing, cas) {
                (Some(current), Some(expected)) => current == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
        };

        if !accepted {
            warn!(
                "Store rejected {} for key '{}' (exists: {}, cas: {:?})",
                operation.as_str(),
                key,
                existing.is_some(),
                cas
            );
            return Ok(None);
        }

        let previous_cas = self.last_cas;
        self.last_cas += 1;
        let new_cas = Cas::new(self.last_cas);
        let expires_at = self.expires_at(expiration, now);
        let previous = self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                cas: new_cas,
                expires_at,
            },
        );

        // A write that could not be persisted is not applied
        if let Err(e) = self.persist() {
            self.last_cas = previous_cas;
            self.restore(key, previous);
            return Err(e);
        }
        debug!("{} '{}' -> cas {}", operation.as_str(), key, new_cas);
        Ok(Some(new_cas))
    }

    /// Put back the entry a failed write or delete displaced
    fn restore(&mut self, key: &str, previous: Option<Entry>) {
        match previous {
            Some(entry) => {
                self.entries.insert(key.to_string(), entry);
            }
            None => {
                self.entries.remove(key);
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            last_cas: self.last_cas,
            entries: self.entries.clone(),
        };
        snapshot.save(path).map_err(|e| {
            warn!("Failed to write snapshot {:?}: {}", path, e);
            e
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("host", &self.host)
            .field("entries", &self.entries.len())
            .field("last_cas", &self.last_cas)
            .field("snapshot_path", &self.snapshot_path)
            .finish_non_exhaustive()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let now = (self.clock)();
        Ok(self.live(key, now).map(|entry| StoredValue {
            value: entry.value.clone(),
            cas: entry.cas,
        }))
    }

    fn set(
        &mut self,
        key: &str,
        value: &str,
        expiration: u32,
        cas: Option<Cas>,
    ) -> Result<Option<Cas>> {
        self.write(StoreOperation::Set, key, value, expiration, cas)
    }

    fn add(
        &mut self,
        key: &str,
        value: &str,
        expiration: u32,
        cas: Option<Cas>,
    ) -> Result<Option<Cas>> {
        self.write(StoreOperation::Add, key, value, expiration, cas)
    }

    fn replace(
        &mut self,
        key: &str,
        value: &str,
        expiration: u32,
        cas: Option<Cas>,
    ) -> Result<Option<Cas>> {
        self.write(StoreOperation::Replace, key, value, expiration, cas)
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        let now = (self.clock)();
        self.purge_expired(now);

        let Some(removed) = self.entries.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist() {
            self.restore(key, Some(removed));
            return Err(e);
        }
        debug!("delete '{}'", key);
        Ok(true)
    }

    fn view(&self, design: &str, view: &str, params: &QueryParams) -> Result<ViewResponse> {
        let definition = self
            .views
            .get(design)
            .and_then(|views| views.get(view))
            .ok_or_else(|| BasementError::InvalidView {
                design: design.to_string(),
                view: view.to_string(),
            })?;

        let now = (self.clock)();
        let docs: Vec<(&str, StoredValue)> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| {
                (
                    key.as_str(),
                    StoredValue {
                        value: entry.value.clone(),
                        cas: entry.cas,
                    },
                )
            })
            .collect();

        debug!("view {}/{} with {} params", design, view, params.len());
        definition.query(docs.iter().map(|(key, stored)| (*key, stored)), params)
    }

    fn client_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn cluster_version(&self) -> Result<BTreeMap<String, String>> {
        let mut versions = BTreeMap::new();
        versions.insert(self.host.clone(), env!("CARGO_PKG_VERSION").to_string());
        Ok(versions)
    }
}

/// Builds a [`MemoryStore`] from a [`Config`]
///
/// The store gets the configured host, every view declared in
/// `config.views` plus any added with [`MemoryConnector::with_view`], and a
/// snapshot at [`Config::snapshot_path`] when `persist` is set.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    views: Vec<(String, String, ViewDefinition)>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a view on every store this connector opens
    pub fn with_view(
        mut self,
        design: impl Into<String>,
        view: impl Into<String>,
        definition: ViewDefinition,
    ) -> Self {
        self.views.push((design.into(), view.into(), definition));
        self
    }
}

impl fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .views
            .iter()
            .map(|(design, view, _)| format!("{}/{}", design, view))
            .collect();
        f.debug_struct("MemoryConnector").field("views", &names).finish()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &Config) -> Result<Box<dyn Store>> {
        if config.host.trim().is_empty() {
            return Err(BasementError::ConnectionFailure {
                host: config.host.clone(),
                reason: "no host configured".to_string(),
            });
        }

        let store = if config.persist {
            MemoryStore::open(config.snapshot_path())?
        } else {
            MemoryStore::new()
        };
        let mut store = store.with_host(config.host.clone());

        for spec in &config.views {
            store.define_view(spec.design.clone(), spec.name.clone(), spec.to_definition()?);
        }
        for (design, view, definition) in &self.views {
            store.define_view(design.clone(), view.clone(), definition.clone());
        }

        info!(
            "Connected to bucket '{}' on {} as '{}' (memory store)",
            config.bucket,
            config.host,
            config.effective_user()
        );
        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ViewSpec;
    use crate::value::Value;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// A clock the test can move forward
    fn manual_clock(start: DateTime<Utc>) -> (Clock, Arc<Mutex<DateTime<Utc>>>) {
        let now = Arc::new(Mutex::new(start));
        let handle = now.clone();
        let clock: Clock = Arc::new(move || *handle.lock().unwrap());
        (clock, now)
    }

    #[test]
    fn test_set_and_get() {
        let mut store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());

        let cas = store.set("k", "v1", 0, None).unwrap().unwrap();
        let stored = store.get("k").unwrap().unwrap();
        assert_eq!(stored.value, "v1");
        assert_eq!(stored.cas, cas);

        let cas2 = store.set("k", "v2", 0, None).unwrap().unwrap();
        assert!(cas2.get() > cas.get());
        assert_eq!(store.get("k").unwrap().unwrap().value, "v2");
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.set("", "v", 0, None).unwrap_err(),
            BasementError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_add_only_when_missing() {
        let mut store = MemoryStore::new();
        assert!(store.add("k", "first", 0, None).unwrap().is_some());
        assert!(store.add("k", "second", 0, None).unwrap().is_none());
        assert_eq!(store.get("k").unwrap().unwrap().value, "first");
    }

    #[test]
    fn test_replace_only_when_present() {
        let mut store = MemoryStore::new();
        assert!(store.replace("k", "v", 0, None).unwrap().is_none());
        assert!(store.get("k").unwrap().is_none());

        store.set("k", "v", 0, None).unwrap();
        assert!(store.replace("k", "w", 0, None).unwrap().is_some());
        assert_eq!(store.get("k").unwrap().unwrap().value, "w");
    }

    #[test]
    fn test_cas_constraint() {
        let mut store = MemoryStore::new();
        let cas = store.set("k", "v1", 0, None).unwrap().unwrap();

        let stale = Cas::new(cas.get() + 100);
        assert!(store.set("k", "v2", 0, Some(stale)).unwrap().is_none());
        assert!(store.replace("k", "v2", 0, Some(stale)).unwrap().is_none());
        assert_eq!(store.get("k").unwrap().unwrap().value, "v1");

        let cas2 = store.replace("k", "v2", 0, Some(cas)).unwrap().unwrap();
        assert!(store.set("k", "v3", 0, Some(cas2)).unwrap().is_some());

        // A constraint on a missing key never matches
        assert!(store.set("missing", "v", 0, Some(cas)).unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let mut store = MemoryStore::new();
        store.set("k", "v", 0, None).unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn test_relative_expiration() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let (clock, now) = manual_clock(start);
        let mut store = MemoryStore::new().with_clock(clock);

        store.set("k", "v", 10, None).unwrap();
        assert!(store.get("k").unwrap().is_some());

        *now.lock().unwrap() = start + Duration::seconds(10);
        assert!(store.get("k").unwrap().is_none());
        assert!(store.is_empty());

        // Expired keys can be added again
        assert!(store.add("k", "again", 0, None).unwrap().is_some());
    }

    #[test]
    fn test_absolute_expiration() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let (clock, now) = manual_clock(start);
        let mut store = MemoryStore::new().with_clock(clock);

        store.set("k", "v", 1_700_000_100, None).unwrap();
        *now.lock().unwrap() = start + Duration::seconds(99);
        assert!(store.get("k").unwrap().is_some());

        *now.lock().unwrap() = start + Duration::seconds(100);
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn test_unknown_view() {
        let store = MemoryStore::new();
        let err = store.view("users", "by_age", &QueryParams::new()).unwrap_err();
        assert!(matches!(err, BasementError::InvalidView { .. }));
    }

    #[test]
    fn test_view_skips_expired_and_non_json() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let (clock, now) = manual_clock(start);
        let mut store = MemoryStore::new().with_clock(clock);
        store.define_view("users", "by_age", ViewDefinition::by_field("age", None));

        store.set("u1", r#"{"age":30}"#, 0, None).unwrap();
        store.set("u2", r#"{"age":20}"#, 5, None).unwrap();
        store.set("raw", "plain text", 0, None).unwrap();

        let response = store.view("users", "by_age", &QueryParams::new()).unwrap();
        assert_eq!(response.rows.len(), 2);

        *now.lock().unwrap() = start + Duration::seconds(5);
        let response = store.view("users", "by_age", &QueryParams::new()).unwrap();
        assert_eq!(response.rows.len(), 1);
        assert_eq!(response.rows[0].key, Value::from(30));
    }

    #[test]
    fn test_versions() {
        let store = MemoryStore::new().with_host("db1");
        assert_eq!(store.client_version(), env!("CARGO_PKG_VERSION"));

        let versions = store.cluster_version().unwrap();
        assert_eq!(versions.len(), 1);
        assert!(versions.contains_key("db1"));
    }

    #[test]
    fn test_snapshot_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");

        let cas = {
            let mut store = MemoryStore::open(&path).unwrap();
            store.set("a", "1", 0, None).unwrap();
            store.set("b", "2", 0, None).unwrap();
            store.delete("a").unwrap();
            store.get("b").unwrap().unwrap().cas
        };
        assert!(path.exists());

        let mut store = MemoryStore::open(&path).unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.get("b").unwrap().unwrap().cas, cas);

        // CAS tokens keep increasing across reopen
        let next = store.set("c", "3", 0, None).unwrap().unwrap();
        assert!(next.get() > cas.get());
    }

    #[test]
    fn test_failed_snapshot_write_leaves_store_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        let mut store = MemoryStore::open(data_dir.join("store.json")).unwrap();
        let cas = store.set("k", "1", 0, None).unwrap().unwrap();

        // A regular file where the data directory should be
        std::fs::remove_dir_all(&data_dir).unwrap();
        std::fs::write(&data_dir, "not a directory").unwrap();

        assert!(store.set("k", "2", 0, None).is_err());
        assert!(store.add("new", "3", 0, None).is_err());
        assert!(store.delete("k").is_err());

        let current = store.get("k").unwrap().unwrap();
        assert_eq!(current.value, "1");
        assert_eq!(current.cas, cas);
        assert!(store.get("new").unwrap().is_none());

        std::fs::remove_file(&data_dir).unwrap();
        let next = store.set("k", "4", 0, None).unwrap().unwrap();
        assert_eq!(next.get(), cas.get() + 1);
    }

    #[test]
    fn test_connector_builds_views_from_config() {
        let config = Config {
            views: vec![ViewSpec {
                design: "users".to_string(),
                name: "by_age".to_string(),
                key_field: "age".to_string(),
                value_field: None,
                reduce: Some("_count".to_string()),
            }],
            ..Config::default()
        };
        let connector = MemoryConnector::new().with_view(
            "users",
            "all",
            ViewDefinition::new(|id, _| vec![(Value::from(id), Value::Null)]),
        );

        let mut store = connector.connect(&config).unwrap();
        store.set("u1", r#"{"age":30}"#, 0, None).unwrap();

        let response = store.view("users", "by_age", &QueryParams::new()).unwrap();
        assert!(response.reduced);
        assert_eq!(response.rows[0].value, Value::from(1));

        let response = store.view("users", "all", &QueryParams::new()).unwrap();
        assert_eq!(response.rows[0].id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_connector_rejects_empty_host() {
        let config = Config {
            host: String::new(),
            ..Config::default()
        };
        let err = MemoryConnector::new().connect(&config).err().expect("connect should fail");
        assert!(matches!(err, BasementError::ConnectionFailure { .. }));
    }

    #[test]
    fn test_connector_persists_when_configured() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            persist: true,
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        {
            let mut store = MemoryConnector::new().connect(&config).unwrap();
            store.set("k", "v", 0, None).unwrap();
        }

        let store = MemoryConnector::new().connect(&config).unwrap();
        assert_eq!(store.get("k").unwrap().unwrap().value, "v");
        assert!(config.snapshot_path().exists());
    }
}
