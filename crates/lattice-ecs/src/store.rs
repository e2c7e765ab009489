//! The top-level entity/component store.
//!
//! A [`Store`] owns the component registry, one arena per component type,
//! every archetype group, the view cache and the key table. Callers only ever
//! hold [`EntityKey`]s; every access resolves
//! key → entity → group → chunk offset → arena element.
//!
//! ```
//! use lattice_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
//! #[repr(C)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
//! #[repr(C)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut store = Store::new();
//! let key = store.create_entity::<(Position, Velocity)>().unwrap();
//! store.set_component(key, Velocity { dx: 1.0, dy: 0.5 }).unwrap();
//!
//! for (_key, (pos, vel)) in store.query_mut::<(&mut Position, &Velocity)>() {
//!     pos.x += vel.dx;
//!     pos.y += vel.dy;
//! }
//! assert_eq!(store.get_component::<Position>(key).unwrap(), &Position { x: 1.0, y: 0.5 });
//! ```

use crate::arena::{ArenaSet, ComponentArena};
use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::config::StoreConfig;
use crate::entity::Entity;
use crate::group::{Group, GroupId};
use crate::key::{EntityKey, KeyTable};
use crate::registry::GroupRegistry;
use crate::signature::{ComponentSet, Signature};
use crate::view::{View, ViewCache, ViewId};
use crate::EcsError;

/// Archetype-grouped component storage.
#[derive(Debug)]
pub struct Store {
    config: StoreConfig,
    pub(crate) components: ComponentRegistry,
    pub(crate) arenas: ArenaSet,
    pub(crate) groups: GroupRegistry,
    pub(crate) views: ViewCache,
    keys: KeyTable,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::build(StoreConfig::default())
    }

    /// Create an empty store after validating `config`.
    pub fn with_config(config: StoreConfig) -> Result<Self, EcsError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: StoreConfig) -> Self {
        Self {
            config,
            components: ComponentRegistry::new(),
            arenas: ArenaSet::new(),
            groups: GroupRegistry::new(),
            views: ViewCache::new(),
            keys: KeyTable::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Register `T` under a readable name. Types used without registering
    /// are named after their Rust type path.
    pub fn register_component<T: Component>(
        &mut self,
        name: &str,
    ) -> Result<ComponentTypeId, EcsError> {
        self.components.register::<T>(name)
    }

    /// The id of `T`, if it has been registered.
    pub fn component_id<T: Component>(&self) -> Option<ComponentTypeId> {
        self.components.lookup::<T>()
    }

    /// Look up a component id by registered name.
    pub fn lookup(&self, name: &str) -> Option<ComponentTypeId> {
        self.components.lookup_by_name(name)
    }

    // -- entity lifecycle ----------------------------------------------------

    /// Create an entity with the components in `S`, zero-initialised, in a
    /// group of the configured default size.
    pub fn create_entity<S: ComponentSet>(&mut self) -> Result<EntityKey, EcsError> {
        let group_size = self.config.default_group_size;
        self.create_entity_with_capacity::<S>(group_size)
    }

    /// Like [`create_entity`](Self::create_entity), but a newly built group
    /// holds `group_size` entities.
    pub fn create_entity_with_capacity<S: ComponentSet>(
        &mut self,
        group_size: usize,
    ) -> Result<EntityKey, EcsError> {
        let signature = S::signature(&mut self.components)?;
        self.create_entity_from_signature(&signature, group_size)
    }

    /// Create an entity for an archetype given by component ids.
    pub fn create_entity_from_signature(
        &mut self,
        signature: &Signature,
        group_size: usize,
    ) -> Result<EntityKey, EcsError> {
        let group = self.groups.get_or_make_group(
            signature,
            group_size,
            &self.components,
            &mut self.arenas,
            &mut self.views,
        )?;
        self.create_entity_in_group(group)
    }

    /// Create an entity in one specific group.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::GroupFull`] when the group has no free slot.
    pub fn create_entity_in_group(&mut self, group: GroupId) -> Result<EntityKey, EcsError> {
        let target = self
            .groups
            .get_mut(group)
            .ok_or(EcsError::UnknownGroup { group })?;
        let entity = target.create_entity()?;
        for (component, offset) in target.chunks() {
            if let Some(arena) = self.arenas.get_mut(component) {
                arena.zero(offset + entity.slot());
            }
        }
        let key = self.keys.create(entity);
        target.set_owner(entity.slot(), key);
        Ok(key)
    }

    /// Destroy the entity behind `key`. The key and any copies of it stop
    /// resolving.
    pub fn remove_entity(&mut self, key: EntityKey) -> Result<(), EcsError> {
        let entity = match self.keys.resolve(key) {
            Ok(entity) => entity,
            Err(err) => {
                tracing::warn!(%key, "remove_entity called with a stale or unknown key");
                return Err(err);
            }
        };
        self.groups
            .get_mut(entity.group())
            .ok_or(EcsError::StaleEntity { entity })?
            .remove_entity(entity)?;
        self.keys.remove(key)?;
        Ok(())
    }

    /// The internal entity a live key names.
    pub fn resolve(&self, key: EntityKey) -> Result<Entity, EcsError> {
        self.keys.resolve(key)
    }

    pub fn is_alive(&self, key: EntityKey) -> bool {
        self.keys.contains(key)
    }

    /// Whether the entity's archetype includes `T`. False for dead keys.
    pub fn has_component<T: Component>(&self, key: EntityKey) -> bool {
        let (Ok(entity), Some(component)) = (self.keys.resolve(key), self.component_id::<T>())
        else {
            return false;
        };
        self.groups
            .get(entity.group())
            .is_some_and(|group| group.component_exists(component))
    }

    // -- component access ----------------------------------------------------

    /// Arena element index of `T` for the entity behind `key`.
    fn locate<T: Component>(&self, key: EntityKey) -> Result<(ComponentTypeId, usize), EcsError> {
        let entity = self.keys.resolve(key)?;
        let component = self
            .component_id::<T>()
            .ok_or_else(|| EcsError::UnknownComponent {
                name: std::any::type_name::<T>().to_owned(),
            })?;
        let group = self
            .groups
            .get(entity.group())
            .ok_or(EcsError::StaleEntity { entity })?;
        let index = group
            .element_index(component, entity.slot())
            .ok_or_else(|| EcsError::ComponentNotPresent {
                component: self.components.name_of(component),
                group: group.id(),
            })?;
        Ok((component, index))
    }

    /// Read the `T` component of the entity behind `key`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidKey`] if `key` is stale.
    /// - [`EcsError::UnknownComponent`] if `T` was never registered.
    /// - [`EcsError::ComponentNotPresent`] if the archetype lacks `T`.
    pub fn get_component<T: Component>(&self, key: EntityKey) -> Result<&T, EcsError> {
        let (component, index) = self.locate::<T>(key)?;
        let arena = self
            .arenas
            .get(component)
            .ok_or_else(|| missing_arena(&self.components, component))?;
        arena
            .as_slice::<T>()?
            .get(index)
            .ok_or_else(|| missing_arena(&self.components, component))
    }

    /// Mutable access to the `T` component of the entity behind `key`.
    pub fn get_component_mut<T: Component>(&mut self, key: EntityKey) -> Result<&mut T, EcsError> {
        let (component, index) = self.locate::<T>(key)?;
        let components = &self.components;
        match self.arenas.get_mut(component) {
            Some(arena) => arena
                .as_mut_slice::<T>()?
                .get_mut(index)
                .ok_or_else(|| missing_arena(components, component)),
            None => Err(missing_arena(components, component)),
        }
    }

    /// Overwrite the `T` component of the entity behind `key`.
    pub fn set_component<T: Component>(&mut self, key: EntityKey, value: T) -> Result<(), EcsError> {
        *self.get_component_mut::<T>(key)? = value;
        Ok(())
    }

    /// Every `T` element in the store, indexed by `group offset + slot`.
    ///
    /// Empty until some group holding `T` has been built.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if `T` was never registered.
    pub fn component_array<T: Component>(&self) -> Result<&[T], EcsError> {
        let component = self
            .component_id::<T>()
            .ok_or_else(|| EcsError::UnknownComponent {
                name: std::any::type_name::<T>().to_owned(),
            })?;
        match self.arenas.get(component) {
            Some(arena) => arena.as_slice::<T>(),
            None => Ok(&[]),
        }
    }

    /// Mutable bulk access to every `T` element. Registers `T` on first use.
    pub fn get_component_array<T: Component>(&mut self) -> Result<&mut [T], EcsError> {
        let component = self.components.id_or_register::<T>()?;
        match self.arenas.get_mut(component) {
            Some(arena) => arena.as_mut_slice::<T>(),
            None => Ok(&mut []),
        }
    }

    /// The arena backing `component`, if any group has used it.
    pub fn arena(&self, component: ComponentTypeId) -> Option<&ComponentArena> {
        self.arenas.get(component)
    }

    // -- groups and views ----------------------------------------------------

    /// Cached view over every group storing all of `ids`.
    pub fn get_view(&mut self, ids: &[ComponentTypeId]) -> ViewId {
        let filter = Signature::from(ids);
        self.views.get_or_create(&filter, &self.groups)
    }

    /// Cached view for the component types in `S`.
    pub fn view_of<S: ComponentSet>(&mut self) -> Result<ViewId, EcsError> {
        let filter = S::signature(&mut self.components)?;
        Ok(self.views.get_or_create(&filter, &self.groups))
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(id)
    }

    /// Live entities across every group of a view.
    pub fn view_len(&self, id: ViewId) -> usize {
        self.views
            .get(id)
            .map(|view| {
                view.groups()
                    .iter()
                    .filter_map(|&group| self.groups.get(group))
                    .map(Group::live_count)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Keys of every live entity in a view, group by group.
    pub fn view_keys(&self, id: ViewId) -> impl Iterator<Item = EntityKey> + '_ {
        self.views
            .get(id)
            .map(View::groups)
            .unwrap_or_default()
            .iter()
            .filter_map(|&group| self.groups.get(group))
            .flat_map(|group| group.slots().filter_map(move |slot| group.owner(slot)))
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    /// Every group in creation order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    // -- stats & lifecycle ---------------------------------------------------

    pub fn entity_count(&self) -> usize {
        self.keys.live_count()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Destroy every entity and group.
    ///
    /// Chunks go back to their arenas for reuse, cached views keep their ids
    /// but lose their groups, and every outstanding key is invalidated.
    /// Component registrations survive.
    pub fn clear(&mut self) {
        tracing::debug!(
            entities = self.keys.live_count(),
            groups = self.groups.len(),
            "store cleared"
        );
        self.groups.clear(&mut self.arenas);
        self.views.clear_groups();
        self.keys.clear();
    }
}

fn missing_arena(components: &ComponentRegistry, component: ComponentTypeId) -> EcsError {
    EcsError::ComponentLayout {
        component: components.name_of(component),
        details: "no arena backs this component".to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
    #[repr(C)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
    #[repr(C)]
    struct Health(u32);

    fn store() -> Store {
        let mut store = Store::new();
        store.register_component::<Position>("position").unwrap();
        store.register_component::<Velocity>("velocity").unwrap();
        store.register_component::<Health>("health").unwrap();
        store
    }

    #[test]
    fn create_set_get() {
        let mut store = store();
        let key = store.create_entity::<(Position, Velocity)>().unwrap();
        assert_eq!(
            store.get_component::<Position>(key).unwrap(),
            &Position { x: 0.0, y: 0.0 }
        );
        store.set_component(key, Velocity { dx: 2.0, dy: 3.0 }).unwrap();
        assert_eq!(
            store.get_component::<Velocity>(key).unwrap(),
            &Velocity { dx: 2.0, dy: 3.0 }
        );
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn component_outside_signature_is_reported() {
        let mut store = store();
        let key = store.create_entity::<(Position,)>().unwrap();
        assert!(!store.has_component::<Health>(key));
        assert!(matches!(
            store.get_component::<Health>(key),
            Err(EcsError::ComponentNotPresent { .. })
        ));
    }

    #[test]
    fn unregistered_component_is_unknown() {
        #[derive(Clone, Copy, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
        #[repr(C)]
        struct Never(u8);

        let mut store = store();
        let key = store.create_entity::<(Position,)>().unwrap();
        assert!(matches!(
            store.get_component::<Never>(key),
            Err(EcsError::UnknownComponent { .. })
        ));
        assert!(store.component_array::<Never>().is_err());
    }

    #[test]
    fn removed_key_is_rejected_everywhere() {
        let mut store = store();
        let key = store.create_entity::<(Position,)>().unwrap();
        store.remove_entity(key).unwrap();

        assert!(!store.is_alive(key));
        assert!(matches!(
            store.get_component::<Position>(key),
            Err(EcsError::InvalidKey { .. })
        ));
        assert!(store.remove_entity(key).is_err());
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn reused_slot_is_zeroed() {
        let mut store = store();
        let a = store.create_entity_with_capacity::<(Health,)>(1).unwrap();
        store.set_component(a, Health(77)).unwrap();
        store.remove_entity(a).unwrap();

        let b = store.create_entity_with_capacity::<(Health,)>(1).unwrap();
        assert_eq!(store.group_count(), 1);
        assert_eq!(store.get_component::<Health>(b).unwrap(), &Health(0));
    }

    #[test]
    fn full_group_spills_into_new_group() {
        let mut store = store();
        for _ in 0..3 {
            store.create_entity_with_capacity::<(Position,)>(2).unwrap();
        }
        assert_eq!(store.group_count(), 2);
        let g0 = store.group(GroupId(0)).unwrap();
        assert!(g0.is_full());
        assert!(store
            .create_entity_in_group(GroupId(0))
            .unwrap_err()
            .is_capacity_exceeded());
    }

    #[test]
    fn component_array_matches_offsets() {
        let mut store = store();
        let key = store.create_entity::<(Position, Health)>().unwrap();
        store.set_component(key, Health(5)).unwrap();

        let entity = store.resolve(key).unwrap();
        let health = store.component_id::<Health>().unwrap();
        let offset = store.group(entity.group()).unwrap().get_offset(health).unwrap();
        let array = store.component_array::<Health>().unwrap();
        assert_eq!(array.len(), 1600);
        assert_eq!(array[offset + entity.slot()], Health(5));
    }

    #[test]
    fn bulk_writes_through_component_array() {
        let mut store = store();
        let keys: Vec<_> = (0..4)
            .map(|_| store.create_entity_with_capacity::<(Health,)>(4).unwrap())
            .collect();
        for (i, h) in store.get_component_array::<Health>().unwrap().iter_mut().enumerate() {
            *h = Health(i as u32 * 10);
        }
        assert_eq!(store.get_component::<Health>(keys[3]).unwrap(), &Health(30));
    }

    #[test]
    fn view_len_counts_live_entities() {
        let mut store = store();
        store.create_entity::<(Position, Velocity)>().unwrap();
        let gone = store.create_entity::<(Position,)>().unwrap();
        store.create_entity::<(Velocity,)>().unwrap();
        store.remove_entity(gone).unwrap();

        let pos = store.component_id::<Position>().unwrap();
        let view = store.get_view(&[pos]);
        assert_eq!(store.view(view).unwrap().len(), 2);
        assert_eq!(store.view_len(view), 1);
        assert_eq!(store.view_keys(view).count(), 1);
    }

    #[test]
    fn clear_reuses_arena_space() {
        let mut store = store();
        let keys: Vec<_> = (0..10)
            .map(|_| store.create_entity_with_capacity::<(Position,)>(8).unwrap())
            .collect();
        let pos = store.component_id::<Position>().unwrap();
        let before = store.arena(pos).unwrap().len();
        assert_eq!(before, 16);
        let key = keys[0];
        let view = store.get_view(&[pos]);

        store.clear();
        assert_eq!(store.entity_count(), 0);
        assert_eq!(store.group_count(), 0);
        assert!(!store.is_alive(key));
        assert!(store.view(view).unwrap().is_empty());

        let fresh = store.create_entity_with_capacity::<(Position,)>(8).unwrap();
        let entity = store.resolve(fresh).unwrap();
        assert_eq!(store.group(entity.group()).unwrap().get_offset(pos), Some(0));
        assert_eq!(store.arena(pos).unwrap().len(), before);
        assert_eq!(store.view_len(view), 1);
    }

    #[test]
    fn cleared_neighbouring_chunks_serve_a_larger_group() {
        let mut store = store();
        for _ in 0..8 {
            store.create_entity_with_capacity::<(Position,)>(4).unwrap();
        }
        let pos = store.component_id::<Position>().unwrap();
        assert_eq!(store.group_count(), 2);
        assert_eq!(store.arena(pos).unwrap().len(), 8);

        store.clear();
        let key = store.create_entity_with_capacity::<(Position,)>(8).unwrap();
        let entity = store.resolve(key).unwrap();
        assert_eq!(store.group(entity.group()).unwrap().get_offset(pos), Some(0));
        assert_eq!(store.arena(pos).unwrap().len(), 8);
        assert!(store.arena(pos).unwrap().free_ranges().is_empty());
    }

    #[test]
    fn get_component_mut_reports_each_failure() {
        let mut store = store();
        let key = store.create_entity::<(Position,)>().unwrap();

        store.get_component_mut::<Position>(key).unwrap().x = 4.0;
        assert_eq!(store.get_component::<Position>(key).unwrap().x, 4.0);
        assert!(matches!(
            store.get_component_mut::<Velocity>(key),
            Err(EcsError::ComponentNotPresent { .. })
        ));

        store.remove_entity(key).unwrap();
        assert!(matches!(
            store.get_component_mut::<Position>(key),
            Err(EcsError::InvalidKey { .. })
        ));
        assert!(store.set_component(key, Position { x: 1.0, y: 1.0 }).is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Store::with_config(StoreConfig {
            default_group_size: 0,
        })
        .unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }
}
