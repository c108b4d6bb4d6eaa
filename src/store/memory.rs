// src/store/memory.rs
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{merge_observation, IncidentStore, StoreError};
use crate::normalize::{IncidentKey, UnifiedIncident, STATUS_ACTIVE};

/// Store with the same insert-or-merge policy as Postgres, held in a map.
/// The whole upsert runs under one lock.
#[derive(Debug, Default)]
pub struct InMemoryIncidentStore {
    rows: Mutex<BTreeMap<IncidentKey, UnifiedIncident>>,
    writes: AtomicUsize,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &IncidentKey) -> Option<UnifiedIncident> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful upserts, inserts and merges alike.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<UnifiedIncident> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn upsert(&self, incident: &UnifiedIncident) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Rejected("in-memory store lock poisoned".into()))?;
        match rows.entry(incident.key()) {
            Entry::Vacant(v) => {
                let mut row = incident.clone();
                row.status = STATUS_ACTIVE.to_string();
                v.insert(row);
            }
            Entry::Occupied(mut o) => merge_observation(o.get_mut(), incident),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
