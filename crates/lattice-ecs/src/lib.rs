//! Lattice ECS -- archetype-grouped, pool-allocated entity/component storage.
//!
//! Entities with the same exact set of component types live together in
//! fixed-capacity groups. Each component type owns one growable arena; every
//! group reserves a chunk of that arena once, and an entity's component sits
//! at `group offset + entity slot` for as long as the entity lives. Callers
//! hold versioned [`EntityKey`](key::EntityKey)s and iterate through cached
//! views or typed queries.
//!
//! # Quick Start
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
//! struct Light { intensity: f32 }
//!
//! let mut store = Store::new();
//! let position = store.register_component::<Position>("position").unwrap();
//! let light = store.register_component::<Light>("light").unwrap();
//!
//! let key = store.create_entity::<(Position, Light)>().unwrap();
//! store.set_component(key, Light { intensity: 0.5 }).unwrap();
//!
//! // Offset-based bulk iteration, group by group.
//! let view = store.get_view(&[position, light]);
//! let lights = store.component_array::<Light>().unwrap();
//! for &group_id in store.view(view).unwrap().groups() {
//!     let group = store.group(group_id).unwrap();
//!     let offset = group.get_offset(light).unwrap();
//!     for slot in group.slots() {
//!         assert_eq!(lights[offset + slot].intensity, 0.5);
//!     }
//! }
//! ```

#![deny(unsafe_code)]

pub mod arena;
pub mod component;
pub mod config;
pub mod entity;
pub mod group;
pub mod key;
#[allow(unsafe_code)]
pub mod pool;
#[allow(unsafe_code)]
pub mod query;
pub mod registry;
pub mod signature;
pub mod store;
pub mod view;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// Every slot of the group is taken.
    #[error("group {group} is full ({capacity} entities)")]
    GroupFull {
        group: group::GroupId,
        capacity: usize,
    },

    /// An arena could not grow (allocator failure or size overflow).
    #[error("allocation of {requested} elements failed{}", for_component(.component))]
    AllocationFailed {
        component: Option<String>,
        requested: usize,
    },

    /// The entity's archetype does not include the component type.
    #[error("component '{component}' is not part of group {group}")]
    ComponentNotPresent {
        component: String,
        group: group::GroupId,
    },

    /// The key was removed, is stale, or was never issued.
    #[error("entity key {key} is stale or was never issued")]
    InvalidKey { key: key::EntityKey },

    /// The entity is not live in the group it names.
    #[error("entity {entity:?} is not live in its group")]
    StaleEntity { entity: entity::Entity },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered")]
    UnknownComponent { name: String },

    /// No group exists with this id.
    #[error("group {group} does not exist")]
    UnknownGroup { group: group::GroupId },

    /// Zero-sized types have nothing to store.
    #[error("component '{name}' is zero-sized")]
    ZeroSizedComponent { name: String },

    /// The name is already bound to another type.
    #[error("component name '{name}' is already registered for another type")]
    DuplicateComponentName { name: String },

    /// An archetype needs at least one component type.
    #[error("cannot create an entity with no components")]
    EmptySignature,

    /// A typed view over arena bytes failed.
    #[error("invalid layout for component '{component}': {details}")]
    ComponentLayout { component: String, details: String },

    /// Store configuration was rejected.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

fn for_component(component: &Option<String>) -> String {
    match component {
        Some(name) => format!(" for component '{name}'"),
        None => String::new(),
    }
}

impl EcsError {
    /// Whether this error means some capacity ran out: a full group or an
    /// arena that cannot grow.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(
            self,
            EcsError::GroupFull { .. } | EcsError::AllocationFailed { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
    pub use crate::config::StoreConfig;
    pub use crate::entity::Entity;
    pub use crate::group::{Group, GroupId};
    pub use crate::key::EntityKey;
    pub use crate::query::{Query, QueryItem, QueryIter, QueryIterMut};
    pub use crate::signature::{ComponentSet, Signature};
    pub use crate::store::Store;
    pub use crate::view::{View, ViewId};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
