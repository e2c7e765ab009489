//! Component type registration and metadata.
//!
//! Every component type stored in a [`Store`](crate::store::Store) gets a
//! [`ComponentTypeId`] from the store's [`ComponentRegistry`]. Ids are handed
//! out in registration order, starting at zero, and are never removed. They
//! index the store's arenas and every group's offset map directly.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for types that can live in a component arena.
///
/// Components are plain old data: the store copies their bytes around and
/// hands out typed views over those bytes, but never runs drop glue. Any
/// [`bytemuck::Pod`] type qualifies, except zero-sized ones which registration
/// rejects.
pub trait Component: bytemuck::Pod {}

impl<T: bytemuck::Pod> Component for T {}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Position of this type in per-type tables.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Id assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name.
    pub name: String,
    /// `std::mem::size_of::<T>()`, the arena stride.
    pub size: usize,
    /// `std::mem::align_of::<T>()`
    pub align: usize,
    /// Rust `TypeId`, checked before every typed arena view.
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and their metadata.
///
/// A type is registered at most once; registering it again returns the
/// existing id and ignores the new name.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by `ComponentTypeId.0`.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`, or return its existing id.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ZeroSizedComponent`] if `T` has no bytes to store.
    /// - [`EcsError::DuplicateComponentName`] if `name` already belongs to a
    ///   different type.
    pub fn register<T: Component>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }
        if std::mem::size_of::<T>() == 0 {
            return Err(EcsError::ZeroSizedComponent {
                name: name.to_owned(),
            });
        }
        if self.by_name.contains_key(name) {
            return Err(EcsError::DuplicateComponentName {
                name: name.to_owned(),
            });
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            type_id: rust_type_id,
        });
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Return the id for `T`, registering it under its type name on first use.
    pub fn id_or_register<T: Component>(&mut self) -> Result<ComponentTypeId, EcsError> {
        match self.lookup::<T>() {
            Some(id) => Ok(id),
            None => self.register::<T>(std::any::type_name::<T>()),
        }
    }

    /// Look up a component type by its Rust type.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a component type by its registered name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Get the [`ComponentInfo`] for a registered id.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Name of a registered id, or a placeholder for error messages.
    pub(crate) fn name_of(&self, id: ComponentTypeId) -> String {
        self.get_info(id)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| format!("{id:?}"))
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
