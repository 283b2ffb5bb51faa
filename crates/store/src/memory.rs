//! In-memory record store
//!
//! Backs offline/demo pages and tests. Validates against its registry the
//! way the backend does, and can simulate the backend's failure modes:
//! row-level protection (protected rows are silently skipped by batch
//! writes and invisible to single updates) and going offline.

use std::cell::RefCell;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use labgrid_engine::column::ColumnRegistry;
use labgrid_engine::record::{Fields, Record, RecordId};

use crate::store::{RecordStore, StoreError};

#[derive(Debug, Default)]
struct State {
    /// Insertion order
    records: Vec<Record>,
    next_id: u64,
    protected: HashSet<RecordId>,
    offline: bool,
    calls: usize,
}

#[derive(Debug)]
pub struct MemoryStore {
    registry: ColumnRegistry,
    state: RefCell<State>,
}

impl MemoryStore {
    pub fn new(registry: ColumnRegistry) -> Self {
        Self {
            registry,
            state: RefCell::new(State::default()),
        }
    }

    /// Seed with existing records (not validated)
    pub fn with_records(registry: ColumnRegistry, records: Vec<Record>) -> Self {
        let next_id = records.len() as u64;
        Self {
            registry,
            state: RefCell::new(State {
                records,
                next_id,
                ..State::default()
            }),
        }
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    /// Refuse writes to this record from now on
    pub fn protect(&self, id: impl Into<RecordId>) {
        self.state.borrow_mut().protected.insert(id.into());
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.borrow_mut().offline = offline;
    }

    /// Number of store calls made so far
    pub fn calls(&self) -> usize {
        self.state.borrow().calls
    }

    pub fn len(&self) -> usize {
        self.state.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.state
            .borrow()
            .records
            .iter()
            .find(|r| &r.id == id)
            .cloned()
    }

    /// Count the call and fail if offline
    fn enter(&self, op: &str) -> Result<std::cell::RefMut<'_, State>, StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        if state.offline {
            return Err(StoreError::Unavailable(format!("{op}: store is offline")));
        }
        Ok(state)
    }
}

fn writable(state: &State, id: &RecordId) -> bool {
    !state.protected.contains(id)
}

fn apply_patch(record: &mut Record, patch: &Fields) {
    for (k, v) in patch {
        record.fields.insert(k.clone(), v.clone());
    }
}

impl RecordStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Record>, StoreError> {
        let state = self.enter("list")?;
        // Newest first; among equal timestamps, last inserted first
        let mut records: Vec<Record> = state.records.iter().rev().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn update(&self, id: &RecordId, patch: &Fields) -> Result<Record, StoreError> {
        let mut state = self.enter("update")?;
        let patch = self.registry.validate_patch(patch)?;

        let allowed = writable(&state, id);
        let record = state
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .filter(|_| allowed)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        apply_patch(record, &patch);
        Ok(record.clone())
    }

    async fn delete_many(&self, ids: &[RecordId]) -> Result<usize, StoreError> {
        let mut state = self.enter("delete_many")?;
        let targets: HashSet<&RecordId> = ids
            .iter()
            .filter(|id| writable(&state, id))
            .collect();

        let before = state.records.len();
        state.records.retain(|r| !targets.contains(&r.id));
        Ok(before - state.records.len())
    }

    async fn update_many(&self, ids: &[RecordId], patch: &Fields) -> Result<usize, StoreError> {
        let mut state = self.enter("update_many")?;
        let patch = self.registry.validate_patch(patch)?;

        let targets: HashSet<RecordId> = ids
            .iter()
            .filter(|id| writable(&state, id))
            .cloned()
            .collect();

        let mut updated = 0;
        for record in state.records.iter_mut().filter(|r| targets.contains(&r.id)) {
            apply_patch(record, &patch);
            updated += 1;
        }
        Ok(updated)
    }

    async fn insert_many(&self, payloads: &[Fields]) -> Result<Vec<Record>, StoreError> {
        let mut state = self.enter("insert_many")?;

        // Validate everything before touching state
        let mut validated = Vec::with_capacity(payloads.len());
        for (i, payload) in payloads.iter().enumerate() {
            let fields = self
                .registry
                .validate_payload(payload)
                .map_err(|e| e.at_row(i + 1))?;
            validated.push(fields);
        }

        let now: DateTime<Utc> = Utc::now();
        let mut inserted = Vec::with_capacity(validated.len());
        for fields in validated {
            state.next_id += 1;
            let id = format!("{}-{}", self.registry.name(), state.next_id);
            let record = Record::new(id, fields, now);
            state.records.push(record.clone());
            inserted.push(record);
        }
        Ok(inserted)
    }
}
