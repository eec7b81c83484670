//! Namespaced key-value persistence.
//!
//! The gateway keeps all of its durable state (route table, trusted group
//! names) as JSON values behind this interface.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashmap::DashMap;
use serde_json::Value;

use crate::store::StoreError;

/// Minimal persistence contract: `get`/`set` of JSON values by namespace and key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError>;
}

type Entries = DashMap<(String, String), Value>;

fn entry_key(namespace: &str, key: &str) -> (String, String) {
    (namespace.to_string(), key.to_string())
}

/// Volatile store, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Entries,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .entries
            .get(&entry_key(namespace, key))
            .map(|r| r.value().clone()))
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(entry_key(namespace, key), value);
        Ok(())
    }
}

/// Store persisted as a single JSON document: `{ namespace: { key: value } }`.
///
/// Every `set` rewrites the file through a temporary sibling and a rename, so
/// a crash never leaves a half-written document behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Entries,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store, loading the file if it exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = Entries::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let document: BTreeMap<String, BTreeMap<String, Value>> =
                serde_json::from_reader(reader)?;

            for (namespace, values) in document {
                for (key, value) in values {
                    entries.insert((namespace.clone(), key), value);
                }
            }
            tracing::info!(path = ?path, entries = entries.len(), "Loaded store file");
        }

        Ok(Self {
            path,
            entries,
            write_lock: Mutex::new(()),
        })
    }

    fn document(&self) -> BTreeMap<String, BTreeMap<String, Value>> {
        let mut document: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        for r in self.entries.iter() {
            let (namespace, key) = r.key();
            document
                .entry(namespace.clone())
                .or_default()
                .insert(key.clone(), r.value().clone());
        }
        document
    }

    fn persist(&self, document: &BTreeMap<String, BTreeMap<String, Value>>) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, document)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .entries
            .get(&entry_key(namespace, key))
            .map(|r| r.value().clone()))
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        // Write the file first; memory only changes once the data is on disk.
        let mut document = self.document();
        document
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        self.persist(&document)?;

        self.entries.insert(entry_key(namespace, key), value);
        Ok(())
    }
}
