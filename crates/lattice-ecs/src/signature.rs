//! Archetype signatures.
//!
//! A [`Signature`] is the exact, unordered set of component types an entity is
//! made of. It is stored sorted and deduplicated so that set equality is plain
//! slice equality. [`ComponentSet`] builds a signature from a tuple of
//! component types: `(Position, Velocity)` describes the archetype
//! {Position, Velocity}.

use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::EcsError;

/// Sorted, deduplicated set of component type ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature(Vec<ComponentTypeId>);

impl Signature {
    /// Build a signature from ids in any order. Duplicates collapse.
    pub fn new(ids: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        let mut ids: Vec<ComponentTypeId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    /// The ids in ascending order.
    #[inline]
    pub fn ids(&self) -> &[ComponentTypeId] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `id` is part of this signature.
    #[inline]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// Whether every id of `other` is part of this signature.
    pub fn is_superset_of(&self, other: &Signature) -> bool {
        other.0.iter().all(|id| self.contains(*id))
    }
}

impl From<&[ComponentTypeId]> for Signature {
    fn from(ids: &[ComponentTypeId]) -> Self {
        Self::new(ids.iter().copied())
    }
}

impl<const N: usize> From<[ComponentTypeId; N]> for Signature {
    fn from(ids: [ComponentTypeId; N]) -> Self {
        Self::new(ids)
    }
}

// ---------------------------------------------------------------------------
// ComponentSet
// ---------------------------------------------------------------------------

/// A compile-time list of component types describing one archetype.
///
/// Implemented for tuples of up to eight [`Component`] types. Types are
/// registered on first use.
pub trait ComponentSet {
    /// Resolve (and if needed register) every member type.
    fn signature(registry: &mut ComponentRegistry) -> Result<Signature, EcsError>;
}

macro_rules! impl_component_set {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> ComponentSet for ($($ty,)+) {
            fn signature(registry: &mut ComponentRegistry) -> Result<Signature, EcsError> {
                Ok(Signature::new([$(registry.id_or_register::<$ty>()?),+]))
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
