//! Typed iteration over groups.
//!
//! Queries walk the groups of the cached view for their component set and
//! yield `(EntityKey, (&C1, &mut C2, ...))` for every live slot, group by
//! group in creation order and in dense order within a group.
//!
//! ## Soundness
//!
//! Read-only queries (`&T`) use [`Store::query`] which takes `&self` and
//! reads through checked `bytemuck` casts. Mutable queries use
//! [`Store::query_mut`] which takes `&mut self`, so the store is exclusively
//! borrowed for the iterator's lifetime. `&mut T` items are built from raw
//! element pointers; they never alias because each slot is visited once,
//! distinct slots map to distinct arena elements, and a query may not name
//! the same component type twice when one of the uses is mutable.

use std::marker::PhantomData;

use crate::component::{Component, ComponentTypeId};
use crate::group::{Group, GroupId};
use crate::key::EntityKey;
use crate::signature::Signature;
use crate::store::Store;

// ---------------------------------------------------------------------------
// QueryItem trait -- describes one element in a query tuple
// ---------------------------------------------------------------------------

/// A single element of a query fetch: `&T` (read) or `&mut T` (write).
///
/// Fetching hands out references tied to the store borrow, so it is an
/// `unsafe` operation and only the query iterators call it:
///
/// ```compile_fail
/// use lattice_ecs::prelude::*;
///
/// #[derive(Clone, Copy, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
/// #[repr(C)]
/// struct Pos(f32);
///
/// let mut store = Store::new();
/// let key = store.create_entity::<(Pos,)>().unwrap();
/// let entity = store.resolve(key).unwrap();
/// let group = store.group(entity.group()).unwrap();
/// let _pos = <&mut Pos as QueryItem>::fetch(&store, group, entity.slot());
/// ```
pub trait QueryItem {
    /// The output type yielded per slot.
    type Item<'w>;
    /// Whether this item borrows mutably.
    const MUTABLE: bool;
    /// The component type's id, if registered.
    fn component_type_id(store: &Store) -> Option<ComponentTypeId>;
    /// Fetch the item for `slot` of `group`.
    ///
    /// # Safety
    ///
    /// If `MUTABLE` is set, the caller must hold exclusive access to the
    /// store for `'w`, must not fetch the same slot of the same component
    /// twice while an earlier result is alive, and must not let any other
    /// reference into that component's arena coexist with the result.
    unsafe fn fetch<'w>(store: &'w Store, group: &Group, slot: usize) -> Option<Self::Item<'w>>;
}

impl<T: Component> QueryItem for &T {
    type Item<'w> = &'w T;
    const MUTABLE: bool = false;

    fn component_type_id(store: &Store) -> Option<ComponentTypeId> {
        store.component_id::<T>()
    }

    unsafe fn fetch<'w>(store: &'w Store, group: &Group, slot: usize) -> Option<Self::Item<'w>> {
        let component = store.component_id::<T>()?;
        let index = group.element_index(component, slot)?;
        store.arenas.get(component)?.as_slice::<T>().ok()?.get(index)
    }
}

// `&mut T` goes through the arena's raw element pointer. Exclusivity is the
// caller's obligation under `fetch`'s contract.
impl<T: Component> QueryItem for &mut T {
    type Item<'w> = &'w mut T;
    const MUTABLE: bool = true;

    fn component_type_id(store: &Store) -> Option<ComponentTypeId> {
        store.component_id::<T>()
    }

    unsafe fn fetch<'w>(store: &'w Store, group: &Group, slot: usize) -> Option<Self::Item<'w>> {
        let component = store.component_id::<T>()?;
        let index = group.element_index(component, slot)?;
        let arena = store.arenas.get(component)?;
        if !arena.stores::<T>() {
            return None;
        }
        let ptr = arena.element_ptr(index)?;
        // SAFETY: the pool is aligned for `T` with a stride of
        // `size_of::<T>()`, every byte is initialised and `T: Pod` accepts
        // any bit pattern. The caller guarantees nothing else aliases it.
        let item = unsafe { &mut *ptr.cast::<T>() };
        Some(item)
    }
}

// ---------------------------------------------------------------------------
// Query trait -- describes a tuple of QueryItems
// ---------------------------------------------------------------------------

/// A tuple of query items: `(&A,)`, `(&mut A, &B)`, etc.
pub trait Query {
    /// The per-slot output type.
    type Item<'w>;
    /// Whether any item in this query borrows mutably.
    const HAS_MUTABLE: bool;
    /// Every component id in the tuple, or `None` if one is unregistered.
    fn type_ids(store: &Store) -> Option<Vec<ComponentTypeId>>;
    /// Panic if one component type is accessed mutably and any other way.
    fn validate_no_access_conflicts(store: &Store);
    /// Fetch one slot.
    ///
    /// # Safety
    ///
    /// Same contract as [`QueryItem::fetch`] for every item in the tuple.
    /// [`validate_no_access_conflicts`](Self::validate_no_access_conflicts)
    /// must have passed for `store` when `HAS_MUTABLE` is set.
    unsafe fn fetch_row<'w>(store: &'w Store, group: &Group, slot: usize) -> Option<Self::Item<'w>>;
}

/// Panics if the same component type appears as `&mut T` more than once, or
/// as both `&mut T` and `&T`.
fn check_access(items: &[(bool, Option<ComponentTypeId>)]) {
    let mut mutable_ids: Vec<ComponentTypeId> = Vec::new();
    let mut read_ids: Vec<ComponentTypeId> = Vec::new();
    for &(is_mutable, type_id) in items {
        let Some(id) = type_id else { continue };
        if is_mutable && mutable_ids.contains(&id) {
            panic!("query accesses a component type mutably more than once");
        }
        if mutable_ids.contains(&id) || (is_mutable && read_ids.contains(&id)) {
            panic!("query contains overlapping read and mutable access to the same component type");
        }
        if is_mutable {
            mutable_ids.push(id);
        } else {
            read_ids.push(id);
        }
    }
}

macro_rules! impl_query {
    ($($item:ident),+) => {
        impl<$($item: QueryItem),+> Query for ($($item,)+) {
            type Item<'w> = ($($item::Item<'w>,)+);
            const HAS_MUTABLE: bool = $($item::MUTABLE)||+;

            fn type_ids(store: &Store) -> Option<Vec<ComponentTypeId>> {
                Some(vec![$($item::component_type_id(store)?),+])
            }

            fn validate_no_access_conflicts(store: &Store) {
                check_access(&[$(($item::MUTABLE, $item::component_type_id(store))),+]);
            }

            unsafe fn fetch_row<'w>(store: &'w Store, group: &Group, slot: usize) -> Option<Self::Item<'w>> {
                // SAFETY: forwarded from this function's contract; the
                // access check rules out two items sharing a component.
                Some(($(unsafe { $item::fetch(store, group, slot) }?,)+))
            }
        }
    };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);

// ---------------------------------------------------------------------------
// Cursor shared by both iterators
// ---------------------------------------------------------------------------

struct Cursor {
    groups: Vec<GroupId>,
    group_cursor: usize,
    row_cursor: usize,
}

impl Cursor {
    fn new(groups: Vec<GroupId>) -> Self {
        Self {
            groups,
            group_cursor: 0,
            row_cursor: 0,
        }
    }

    /// Advance to the next live slot: `(group, slot, owning key)`.
    fn next<'w>(&mut self, store: &'w Store) -> Option<(&'w Group, usize, EntityKey)> {
        loop {
            let id = *self.groups.get(self.group_cursor)?;
            let Some(group) = store.groups.get(id) else {
                self.group_cursor += 1;
                continue;
            };
            match group.entities().get(self.row_cursor) {
                Some(entity) => {
                    self.row_cursor += 1;
                    if let Some(key) = group.owner(entity.slot()) {
                        return Some((group, entity.slot(), key));
                    }
                }
                None => {
                    self.group_cursor += 1;
                    self.row_cursor = 0;
                }
            }
        }
    }

    fn remaining(&self, store: &Store) -> usize {
        self.groups
            .iter()
            .skip(self.group_cursor)
            .filter_map(|&id| store.groups.get(id))
            .map(Group::live_count)
            .sum::<usize>()
            .saturating_sub(self.row_cursor)
    }
}

// ---------------------------------------------------------------------------
// QueryIter (read-only)
// ---------------------------------------------------------------------------

/// Iterator yielding `(EntityKey, Q::Item)` for a read-only query.
pub struct QueryIter<'w, Q: Query> {
    store: &'w Store,
    cursor: Cursor,
    _marker: PhantomData<Q>,
}

impl<'w, Q: Query> Iterator for QueryIter<'w, Q> {
    type Item = (EntityKey, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let store = self.store;
        loop {
            let (group, slot, key) = self.cursor.next(store)?;
            // SAFETY: `Q` holds no `&mut` items (checked in `query`), so
            // every reference handed out is shared.
            if let Some(item) = unsafe { Q::fetch_row(store, group, slot) } {
                return Some((key, item));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.cursor.remaining(self.store)))
    }
}

// ---------------------------------------------------------------------------
// QueryIterMut (mutable)
// ---------------------------------------------------------------------------

/// Iterator yielding `(EntityKey, Q::Item)` for a query with `&mut T` items.
///
/// Built from `&'w mut Store`, so nothing else can touch the store while it
/// lives.
pub struct QueryIterMut<'w, Q: Query> {
    store: &'w Store,
    cursor: Cursor,
    _marker: PhantomData<Q>,
}

impl<'w, Q: Query> Iterator for QueryIterMut<'w, Q> {
    type Item = (EntityKey, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let store = self.store;
        loop {
            let (group, slot, key) = self.cursor.next(store)?;
            // SAFETY: the iterator was built from `&'w mut Store` after the
            // access check, and the cursor visits each slot once.
            if let Some(item) = unsafe { Q::fetch_row(store, group, slot) } {
                return Some((key, item));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.cursor.remaining(self.store)))
    }
}

// ---------------------------------------------------------------------------
// Store query methods
// ---------------------------------------------------------------------------

impl Store {
    /// Run a read-only query over every entity whose archetype holds all of
    /// `Q`'s component types.
    ///
    /// Uses the cached view for `Q` when one exists and scans the groups
    /// otherwise. Yields nothing if a type in `Q` was never registered.
    ///
    /// # Panics
    ///
    /// Panics if the query contains `&mut T` items. Use
    /// [`query_mut`](Self::query_mut) for those.
    ///
    /// ```ignore
    /// for (key, (pos, vel)) in store.query::<(&Pos, &Vel)>() {
    ///     println!("{key}: pos={pos:?} vel={vel:?}");
    /// }
    /// ```
    pub fn query<Q: Query>(&self) -> QueryIter<'_, Q> {
        assert!(
            !Q::HAS_MUTABLE,
            "Store::query() cannot be used with mutable query items (&mut T). \
             Use Store::query_mut() instead, which requires &mut self."
        );
        let groups = match Q::type_ids(self) {
            Some(ids) => {
                let filter = Signature::new(ids);
                match self.views.find(&filter).and_then(|id| self.views.get(id)) {
                    Some(view) => view.groups().to_vec(),
                    None => self
                        .groups
                        .iter()
                        .filter(|group| group.has_all(&filter))
                        .map(Group::id)
                        .collect(),
                }
            }
            None => Vec::new(),
        };
        QueryIter {
            store: self,
            cursor: Cursor::new(groups),
            _marker: PhantomData,
        }
    }

    /// Run a query that may write components.
    ///
    /// Builds (or reuses) the cached view for `Q`'s component set.
    ///
    /// # Panics
    ///
    /// Panics if one component type appears as `&mut T` together with any
    /// other access to the same type.
    ///
    /// ```ignore
    /// for (_key, (pos, vel)) in store.query_mut::<(&mut Pos, &Vel)>() {
    ///     pos.x += vel.dx;
    /// }
    /// ```
    pub fn query_mut<Q: Query>(&mut self) -> QueryIterMut<'_, Q> {
        Q::validate_no_access_conflicts(self);
        let groups = match Q::type_ids(self) {
            Some(ids) => {
                let view = self.get_view(&ids);
                self.views
                    .get(view)
                    .map(|view| view.groups().to_vec())
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };
        QueryIterMut {
            store: self,
            cursor: Cursor::new(groups),
            _marker: PhantomData,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
