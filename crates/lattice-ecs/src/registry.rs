//! Group lookup and construction.

use crate::arena::ArenaSet;
use crate::component::{ComponentRegistry, ComponentTypeId};
use crate::group::{Group, GroupId};
use crate::signature::Signature;
use crate::view::ViewCache;
use crate::EcsError;

/// Every group a store has built, in creation order.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: Vec<Group>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a non-full group for exactly `signature`, or build one with room
    /// for `group_size` entities.
    ///
    /// Building reserves one `group_size` chunk per component type and then
    /// pushes the group into every cached view it satisfies. If any chunk
    /// cannot be reserved, the chunks already taken are handed back and no
    /// group is created.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EmptySignature`] if `signature` names no types.
    /// - [`EcsError::InvalidConfig`] if `group_size` is zero or does not fit
    ///   an entity index.
    /// - [`EcsError::UnknownComponent`] if a type was never registered.
    /// - [`EcsError::AllocationFailed`] if an arena cannot grow.
    pub fn get_or_make_group(
        &mut self,
        signature: &Signature,
        group_size: usize,
        components: &ComponentRegistry,
        arenas: &mut ArenaSet,
        views: &mut ViewCache,
    ) -> Result<GroupId, EcsError> {
        if signature.is_empty() {
            return Err(EcsError::EmptySignature);
        }
        if let Some(group) = self
            .groups
            .iter()
            .find(|group| group.has_only(signature) && !group.is_full())
        {
            return Ok(group.id());
        }
        if group_size == 0 || group_size > u32::MAX as usize {
            return Err(EcsError::InvalidConfig(format!(
                "group size must be between 1 and {}, got {group_size}",
                u32::MAX
            )));
        }

        let mut chunks: Vec<(ComponentTypeId, usize)> = Vec::with_capacity(signature.len());
        for &component in signature.ids() {
            let reserved = match components.get_info(component) {
                Some(info) => arenas.get_or_create(info).get_or_create_chunk(group_size),
                None => Err(EcsError::UnknownComponent {
                    name: components.name_of(component),
                }),
            };
            match reserved {
                Ok(offset) => chunks.push((component, offset)),
                Err(err) => {
                    for &(taken, offset) in &chunks {
                        if let Some(arena) = arenas.get_mut(taken) {
                            arena.return_chunk(offset, group_size);
                        }
                    }
                    return Err(err);
                }
            }
        }

        let id = GroupId(self.groups.len() as u32);
        let group = Group::new(id, &chunks, group_size);
        tracing::debug!(
            group = id.0,
            signature = ?signature.ids(),
            capacity = group_size,
            offsets = ?chunks,
            "group created"
        );
        views.on_group_created(&group);
        self.groups.push(group);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.index())
    }

    #[inline]
    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drop every group, returning its chunks to their arenas.
    pub fn clear(&mut self, arenas: &mut ArenaSet) {
        for group in self.groups.drain(..) {
            for (component, offset) in group.chunks() {
                if let Some(arena) = arenas.get_mut(component) {
                    arena.return_chunk(offset, group.capacity());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
