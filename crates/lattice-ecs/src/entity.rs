//! Entity identities and the per-group identity table.
//!
//! An [`Entity`] names a slot inside one [`Group`](crate::group::Group): its
//! `index` is stable for as long as the entity lives and doubles as the
//! element index into every component chunk the group owns. The `version` is
//! bumped each time the index is recycled.
//!
//! Entities are internal. Anything held across a removal should be an
//! [`EntityKey`](crate::key::EntityKey) instead, because removals reorder the
//! dense table synchronously.

use std::collections::VecDeque;
use std::fmt;

use crate::group::GroupId;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A versioned slot inside a group.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    index: u32,
    version: u32,
    group: GroupId,
}

impl Entity {
    #[inline]
    pub(crate) fn new(index: u32, version: u32, group: GroupId) -> Self {
        Self {
            index,
            version,
            group,
        }
    }

    /// Slot index within the owning group.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Recycle counter for this index.
    #[inline]
    pub fn version(self) -> u32 {
        self.version
    }

    /// The group that owns this entity.
    #[inline]
    pub fn group(self) -> GroupId {
        self.group
    }

    /// Element offset of this entity inside any of its group's chunks.
    #[inline]
    pub fn slot(self) -> usize {
        self.index as usize
    }

    fn next_version(self) -> Self {
        Self {
            version: self.version.wrapping_add(1),
            ..self
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity({}v{}@{})",
            self.index, self.version, self.group.0
        )
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}@{}", self.index, self.version, self.group.0)
    }
}

// ---------------------------------------------------------------------------
// EntityTable
// ---------------------------------------------------------------------------

/// Sparse/dense identity table with a FIFO recycling list.
///
/// `dense` holds live entities packed at the front; `sparse[index]` is the
/// position of that index in `dense`, or `None` while the index sits in the
/// free list. Recycled entities carry their already-bumped version.
#[derive(Debug, Default)]
pub struct EntityTable {
    sparse: Vec<Option<u32>>,
    dense: Vec<Entity>,
    free: VecDeque<Entity>,
    counter: u32,
}

impl EntityTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with room for `capacity` entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sparse: Vec::with_capacity(capacity),
            dense: Vec::with_capacity(capacity),
            free: VecDeque::new(),
            counter: 0,
        }
    }

    /// Allocate an entity for `group`.
    ///
    /// Reuses the oldest freed index when one is available; otherwise a fresh
    /// index is minted with version 0.
    pub fn create(&mut self, group: GroupId) -> Entity {
        let entity = match self.free.pop_front() {
            Some(recycled) => Entity { group, ..recycled },
            None => {
                let index = self.counter;
                self.counter += 1;
                self.sparse.push(None);
                Entity::new(index, 0, group)
            }
        };
        self.sparse[entity.index as usize] = Some(self.dense.len() as u32);
        self.dense.push(entity);
        entity
    }

    /// Remove a live entity with swap-pop.
    ///
    /// The last dense entity moves into the vacated position and its sparse
    /// entry is fixed up. Returns the entity that was relocated, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not live in this table
    /// (never allocated, already removed, or an older version).
    pub fn remove(&mut self, entity: Entity) -> Result<Option<Entity>, EcsError> {
        let position = self
            .position(entity)
            .ok_or(EcsError::StaleEntity { entity })?;

        self.dense.swap_remove(position);
        let relocated = self.dense.get(position).copied();
        if let Some(moved) = relocated {
            self.sparse[moved.index as usize] = Some(position as u32);
        }
        self.sparse[entity.index as usize] = None;
        self.free.push_back(entity.next_version());
        Ok(relocated)
    }

    /// Current position of `entity` in the dense table, if it is live.
    pub fn position(&self, entity: Entity) -> Option<usize> {
        let position = (*self.sparse.get(entity.index as usize)?)? as usize;
        let stored = self.dense.get(position)?;
        (stored.version == entity.version).then_some(position)
    }

    /// Whether `entity` is live with a matching version.
    #[inline]
    pub fn is_live(&self, entity: Entity) -> bool {
        self.position(entity).is_some()
    }

    /// Number of live entities.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.dense.len()
    }

    /// Number of distinct indices ever minted.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.counter
    }

    /// Live entities in dense order.
    #[inline]
    pub fn dense(&self) -> &[Entity] {
        &self.dense
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
