//! The persistence contract and an in-memory reference store.
//!
//! The engine never assumes a storage format; it reads the player record and
//! equipment rows through [`StateStore`] on construction and writes them back
//! on autosave and after every state-changing transaction.

use crate::equipment::EquipmentType;
use crate::serialize::{DeserializeError, SaveFile, SerializeError};
use crate::state::PlayerState;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("failed to encode save: {0}")]
    Serialize(#[from] SerializeError),
    #[error("failed to decode save: {0}")]
    Deserialize(#[from] DeserializeError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// What subscribers see after every write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub player: Option<PlayerState>,
    pub equipment: Vec<(EquipmentType, u32)>,
}

pub type StoreListener = Box<dyn FnMut(&StoreSnapshot)>;

pub trait StateStore {
    /// The player record, or `None` on first run.
    fn get(&self) -> Result<Option<PlayerState>, StoreError>;

    fn put(&mut self, state: &PlayerState) -> Result<(), StoreError>;

    /// Every stored `(type, count)` row.
    fn get_equipment(&self) -> Result<Vec<(EquipmentType, u32)>, StoreError>;

    fn put_equipment(&mut self, equipment: EquipmentType, count: u32) -> Result<(), StoreError>;

    /// Register a listener called after every change.
    fn subscribe(&mut self, listener: StoreListener);

    /// Write every row. Stores with batch writes should override this.
    fn put_fleet(&mut self, rows: &[(EquipmentType, u32)]) -> Result<(), StoreError> {
        for &(ty, count) in rows {
            self.put_equipment(ty, count)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    blob: Option<Vec<u8>>,
    revision: u64,
    listeners: Vec<StoreListener>,
}

/// Keeps the durable copy as an encoded save blob. Clones share the same
/// storage, so a test can hand one handle to the engine and inspect another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<Inner>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MemoryStore")
            .field("revision", &inner.revision)
            .field("bytes", &inner.blob.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with a record and equipment.
    pub fn with_state(
        player: PlayerState,
        equipment: &[(EquipmentType, u32)],
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        let file = SaveFile::new(0, Some(player), equipment.to_vec());
        store.inner.borrow_mut().blob = Some(file.encode()?);
        Ok(store)
    }

    /// Number of writes so far.
    pub fn revision(&self) -> u64 {
        self.inner.borrow().revision
    }

    /// The encoded save, if anything was written.
    pub fn blob(&self) -> Option<Vec<u8>> {
        self.inner.borrow().blob.clone()
    }

    fn load(&self) -> Result<SaveFile, StoreError> {
        let inner = self.inner.borrow();
        match &inner.blob {
            Some(bytes) => Ok(SaveFile::decode(bytes)?),
            None => Ok(SaveFile::new(inner.revision, None, Vec::new())),
        }
    }

    fn write(&mut self, update: impl FnOnce(&mut SaveFile)) -> Result<(), StoreError> {
        let mut file = self.load()?;
        update(&mut file);
        let revision = self.inner.borrow().revision + 1;
        file.header.revision = revision;
        let bytes = file.encode()?;

        let mut listeners = {
            let mut inner = self.inner.borrow_mut();
            inner.blob = Some(bytes);
            inner.revision = revision;
            std::mem::take(&mut inner.listeners)
        };
        let snapshot = StoreSnapshot {
            revision,
            player: file.player,
            equipment: file.equipment,
        };
        for listener in &mut listeners {
            listener(&snapshot);
        }
        // Listeners added during delivery go after the existing ones.
        let mut inner = self.inner.borrow_mut();
        listeners.append(&mut inner.listeners);
        inner.listeners = listeners;
        Ok(())
    }
}

impl StateStore for MemoryStore {
    fn get(&self) -> Result<Option<PlayerState>, StoreError> {
        Ok(self.load()?.player)
    }

    fn put(&mut self, state: &PlayerState) -> Result<(), StoreError> {
        let state = state.clone();
        self.write(|file| file.player = Some(state))
    }

    fn get_equipment(&self) -> Result<Vec<(EquipmentType, u32)>, StoreError> {
        Ok(self.load()?.equipment)
    }

    fn put_equipment(&mut self, equipment: EquipmentType, count: u32) -> Result<(), StoreError> {
        self.write(|file| upsert(&mut file.equipment, equipment, count))
    }

    fn subscribe(&mut self, listener: StoreListener) {
        self.inner.borrow_mut().listeners.push(listener);
    }

    fn put_fleet(&mut self, rows: &[(EquipmentType, u32)]) -> Result<(), StoreError> {
        self.write(|file| {
            for &(ty, count) in rows {
                upsert(&mut file.equipment, ty, count);
            }
        })
    }
}

fn upsert(rows: &mut Vec<(EquipmentType, u32)>, ty: EquipmentType, count: u32) {
    match rows.iter_mut().find(|(t, _)| *t == ty) {
        Some(row) => row.1 = count,
        None => rows.push((ty, count)),
    }
}
