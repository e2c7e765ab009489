//! Fixed-capacity archetype groups.
//!
//! A [`Group`] holds up to `capacity` entities that share one exact
//! [`Signature`]. For every component type in the signature the group owns a
//! chunk of `capacity` elements in that type's arena, reserved once when the
//! group is built. An entity's component lives at `offset + entity.index`, so
//! the swap-remove in the identity table never moves component bytes.

use std::fmt;

use crate::component::ComponentTypeId;
use crate::entity::{Entity, EntityTable};
use crate::key::EntityKey;
use crate::signature::Signature;
use crate::EcsError;

/// Index of a group inside its store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// Entities of one exact archetype plus the arena offsets of their chunks.
#[derive(Debug)]
pub struct Group {
    id: GroupId,
    capacity: usize,
    entities: EntityTable,
    signature: Signature,
    /// Indexed by `ComponentTypeId`; `None` for types outside the signature.
    offsets: Vec<Option<usize>>,
    /// Indexed by entity slot; the key that owns the slot while it is live.
    owners: Vec<Option<EntityKey>>,
}

impl Group {
    /// Build a group from `(component id, chunk offset)` pairs.
    ///
    /// Every chunk must already hold `capacity` elements.
    pub fn new(id: GroupId, chunks: &[(ComponentTypeId, usize)], capacity: usize) -> Self {
        let table_len = chunks
            .iter()
            .map(|(component, _)| component.index() + 1)
            .max()
            .unwrap_or(0);
        let mut offsets = vec![None; table_len];
        for &(component, offset) in chunks {
            offsets[component.index()] = Some(offset);
        }

        Self {
            id,
            capacity,
            entities: EntityTable::with_capacity(capacity),
            signature: Signature::new(chunks.iter().map(|(component, _)| *component)),
            offsets,
            owners: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Maximum number of live entities.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.entities.live_count()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.live_count() >= self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Allocate a slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::GroupFull`] when every slot is taken.
    pub fn create_entity(&mut self) -> Result<Entity, EcsError> {
        if self.is_full() {
            return Err(EcsError::GroupFull {
                group: self.id,
                capacity: self.capacity,
            });
        }
        let entity = self.entities.create(self.id);
        if entity.slot() >= self.owners.len() {
            self.owners.resize(entity.slot() + 1, None);
        }
        Ok(entity)
    }

    /// Free the slot held by `entity`. Returns the entity relocated in dense
    /// order, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` belongs to another group
    /// or is no longer live here.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<Option<Entity>, EcsError> {
        if entity.group() != self.id {
            return Err(EcsError::StaleEntity { entity });
        }
        let relocated = self.entities.remove(entity)?;
        if let Some(owner) = self.owners.get_mut(entity.slot()) {
            *owner = None;
        }
        Ok(relocated)
    }

    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        entity.group() == self.id && self.entities.is_live(entity)
    }

    /// Whether the group stores every type in `ids`.
    pub fn has_all(&self, ids: &Signature) -> bool {
        self.signature.is_superset_of(ids)
    }

    /// Whether the group stores exactly the types in `ids`.
    pub fn has_only(&self, ids: &Signature) -> bool {
        self.signature.len() == ids.len() && self.has_all(ids)
    }

    /// Arena offset of this group's chunk for `component`.
    #[inline]
    pub fn get_offset(&self, component: ComponentTypeId) -> Option<usize> {
        self.offsets.get(component.index()).copied().flatten()
    }

    #[inline]
    pub fn component_exists(&self, component: ComponentTypeId) -> bool {
        self.get_offset(component).is_some()
    }

    /// Arena index of `component` for the entity in `slot`.
    #[inline]
    pub fn element_index(&self, component: ComponentTypeId, slot: usize) -> Option<usize> {
        Some(self.get_offset(component)? + slot)
    }

    /// `(component, offset)` for every chunk the group owns.
    pub fn chunks(&self) -> impl Iterator<Item = (ComponentTypeId, usize)> + '_ {
        self.signature
            .ids()
            .iter()
            .filter_map(|&id| Some((id, self.get_offset(id)?)))
    }

    /// Live entities in dense order.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        self.entities.dense()
    }

    /// Live slot indices in dense order.
    pub fn slots(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.entities.dense().iter().map(|e| e.slot())
    }

    /// The key owning `slot`, if the slot is live.
    #[inline]
    pub fn owner(&self, slot: usize) -> Option<EntityKey> {
        self.owners.get(slot).copied().flatten()
    }

    pub(crate) fn set_owner(&mut self, slot: usize, key: EntityKey) {
        if let Some(owner) = self.owners.get_mut(slot) {
            *owner = Some(key);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
