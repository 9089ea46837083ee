use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::Result;
use uuid::Uuid;

use crate::schema::MemoryRecord;

/// Abstract CRUD surface the core writes memories through.  In-place mutation
/// through [`MemoryStore::find_active_mut`] is acceptable; persistence is the
/// implementation's concern and never blocks the in-memory computation.
pub trait MemoryStore {
    /// Insert a new record.  Returns `false` when the id already exists.
    fn create(&mut self, record: MemoryRecord) -> bool;

    /// Replace an existing record by id.  Returns `false` when absent.
    fn update(&mut self, record: MemoryRecord) -> bool;

    /// Mark a record inactive.  Returns `false` when absent.
    fn deactivate(&mut self, id: Uuid) -> bool;

    /// All active records.
    fn active(&self) -> Vec<&MemoryRecord>;

    /// Every record, inactive ones included.  Health-audit use only.
    fn all(&self) -> &[MemoryRecord];

    /// Mutable handle to the first active record matching `pred`.
    fn find_active_mut(&mut self, pred: &dyn Fn(&MemoryRecord) -> bool)
    -> Option<&mut MemoryRecord>;

    /// Active records matching `pred`.
    fn query_active(&self, pred: &dyn Fn(&MemoryRecord) -> bool) -> Vec<&MemoryRecord> {
        self.active().into_iter().filter(|r| pred(r)).collect()
    }
}

/// Vec-backed store with an id set guarding against duplicate inserts.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Vec<MemoryRecord>,
    seen_ids: HashSet<Uuid>,
}

impl InMemoryStore {
    pub fn from_records(records: Vec<MemoryRecord>) -> Self {
        let mut store = Self::default();
        for record in records {
            store.create(record);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut MemoryRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Load a snapshot written by [`InMemoryStore::save_to`].  A missing file
    /// yields an empty store.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let records: Vec<MemoryRecord> = serde_json::from_str(&raw)?;
        Ok(Self::from_records(records))
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = serde_json::to_string_pretty(&self.records)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

impl MemoryStore for InMemoryStore {
    fn create(&mut self, record: MemoryRecord) -> bool {
        if !self.seen_ids.insert(record.id) {
            return false;
        }
        self.records.push(record);
        true
    }

    fn update(&mut self, record: MemoryRecord) -> bool {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    fn deactivate(&mut self, id: Uuid) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.is_active = false;
                true
            }
            None => false,
        }
    }

    fn active(&self) -> Vec<&MemoryRecord> {
        self.records.iter().filter(|r| r.is_active).collect()
    }

    fn all(&self) -> &[MemoryRecord] {
        &self.records
    }

    fn find_active_mut(
        &mut self,
        pred: &dyn Fn(&MemoryRecord) -> bool,
    ) -> Option<&mut MemoryRecord> {
        self.records.iter_mut().find(|r| r.is_active && pred(r))
    }
}
