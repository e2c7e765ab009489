//! Stable external entity handles.
//!
//! An [`EntityKey`] is what callers hold. It indexes the store's [`KeyTable`]
//! and carries the version the slot had when the key was issued; removal
//! bumps the slot version so older keys stop resolving, even after the slot
//! is handed out again.

use std::collections::VecDeque;
use std::fmt;

use crate::entity::Entity;
use crate::EcsError;

/// Versioned handle to an entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    index: u32,
    version: u32,
}

impl EntityKey {
    #[inline]
    pub(crate) fn new(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn version(self) -> u32 {
        self.version
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({}v{})", self.index, self.version)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.version)
    }
}

// ---------------------------------------------------------------------------
// KeyTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct KeySlot {
    version: u32,
    entity: Option<Entity>,
}

/// Growable table mapping keys to the entities they name.
#[derive(Debug, Default)]
pub struct KeyTable {
    slots: Vec<KeySlot>,
    free: VecDeque<u32>,
    live: usize,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a key for `entity`, reusing the oldest freed slot if any.
    pub fn create(&mut self, entity: Entity) -> EntityKey {
        self.live += 1;
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.entity = Some(entity);
            return EntityKey::new(index, slot.version);
        }
        let index = self.slots.len() as u32;
        self.slots.push(KeySlot {
            version: 0,
            entity: Some(entity),
        });
        EntityKey::new(index, 0)
    }

    /// Invalidate `key` and return the entity it named.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidKey`] if `key` does not resolve.
    pub fn remove(&mut self, key: EntityKey) -> Result<Entity, EcsError> {
        let entity = self.resolve(key)?;
        let slot = &mut self.slots[key.index as usize];
        slot.version = slot.version.wrapping_add(1);
        slot.entity = None;
        self.free.push_back(key.index);
        self.live -= 1;
        Ok(entity)
    }

    /// The entity named by a live key.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidKey`] for out-of-range, removed, or stale
    /// keys.
    pub fn resolve(&self, key: EntityKey) -> Result<Entity, EcsError> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.version == key.version)
            .and_then(|slot| slot.entity)
            .ok_or(EcsError::InvalidKey { key })
    }

    #[inline]
    pub fn contains(&self, key: EntityKey) -> bool {
        self.resolve(key).is_ok()
    }

    /// Number of keys that currently resolve.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Invalidate every live key. Slot versions are bumped so keys issued
    /// before the clear never resolve again.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entity.take().is_some() {
                slot.version = slot.version.wrapping_add(1);
                self.free.push_back(index as u32);
            }
        }
        self.live = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
