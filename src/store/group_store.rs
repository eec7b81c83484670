//! Trusted group names.
//!
//! Group names reach the gateway from the session source and can be renamed
//! by users with enough privileges there. The first name seen for a group id
//! is recorded and reported from then on, so renaming a group cannot make it
//! impersonate another one in the `x-disraptor-groups` header.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::identity::CallerGroup;
use crate::store::kv::KeyValueStore;
use crate::store::{StoreError, NAMESPACE};

const GROUPS_KEY: &str = "groups";

pub type GroupNames = BTreeMap<u64, String>;

/// Recorded group names, read from a snapshot.
///
/// Only a first sighting takes the write lock and touches the backing store.
pub struct GroupStore {
    kv: Arc<dyn KeyValueStore>,
    trusted: ArcSwap<GroupNames>,
    write_lock: Mutex<()>,
}

impl GroupStore {
    /// Load the recorded names from `kv`.
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let stored: BTreeMap<String, String> = match kv.get(NAMESPACE, GROUPS_KEY)? {
            Some(value) => serde_json::from_value(value)?,
            None => BTreeMap::new(),
        };

        let trusted: GroupNames = stored
            .into_iter()
            .filter_map(|(id, name)| id.parse().ok().map(|id| (id, name)))
            .collect();

        Ok(Self {
            kv,
            trusted: ArcSwap::from_pointee(trusted),
            write_lock: Mutex::new(()),
        })
    }

    /// Recorded names by group id.
    pub fn get_groups(&self) -> Arc<GroupNames> {
        self.trusted.load_full()
    }

    /// Trusted names for `groups` if every id has been seen before.
    pub fn known_names(&self, groups: &[CallerGroup]) -> Option<Vec<String>> {
        let trusted = self.trusted.load();
        groups
            .iter()
            .map(|group| trusted.get(&group.id).cloned())
            .collect()
    }

    /// Map the caller's groups to their trusted names, recording first sightings.
    ///
    /// May write to the backing store; async callers should run it on a
    /// blocking thread unless [`known_names`](Self::known_names) already answered.
    pub fn translate_groups(&self, groups: &[CallerGroup]) -> Result<Vec<String>, StoreError> {
        if let Some(names) = self.known_names(groups) {
            return Ok(names);
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut trusted = GroupNames::clone(&self.trusted.load());
        let names: Vec<String> = groups
            .iter()
            .map(|group| {
                trusted
                    .entry(group.id)
                    .or_insert_with(|| group.name.clone())
                    .clone()
            })
            .collect();

        let stored: BTreeMap<String, String> = trusted
            .iter()
            .map(|(id, name)| (id.to_string(), name.clone()))
            .collect();
        self.kv
            .set(NAMESPACE, GROUPS_KEY, serde_json::to_value(stored)?)?;
        self.trusted.store(Arc::new(trusted));

        tracing::debug!(groups = names.len(), "Recorded new trusted group names");
        Ok(names)
    }
}
