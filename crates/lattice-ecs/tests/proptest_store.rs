//! Property tests for store operations.
//!
//! These tests use `proptest` to generate random sequences of store
//! operations and verify that capacity, identity and view invariants hold
//! after each step.

use std::collections::HashMap;

use lattice_ecs::arena::ComponentArena;
use lattice_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct Pos {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct Vel {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct Tag(u32);

/// Operations we can perform on the store.
#[derive(Debug, Clone)]
enum StoreOp {
    CreatePos,
    CreatePosVel,
    CreatePosVelTag,
    Remove(usize),
    SetPos(usize, f32, f32),
    ViewPos,
    ViewPosVel,
}

/// Strategy that generates finite (non-NaN, non-Inf) f32 values.
fn finite_f32() -> impl Strategy<Value = f32> {
    (-1_000_000i32..1_000_000i32).prop_map(|v| v as f32 * 0.01)
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        Just(StoreOp::CreatePos),
        Just(StoreOp::CreatePosVel),
        Just(StoreOp::CreatePosVelTag),
        (0..100usize).prop_map(StoreOp::Remove),
        (0..100usize, finite_f32(), finite_f32()).prop_map(|(i, x, y)| StoreOp::SetPos(i, x, y)),
        Just(StoreOp::ViewPos),
        Just(StoreOp::ViewPosVel),
    ]
}

fn ids(store: &Store) -> (ComponentTypeId, ComponentTypeId, ComponentTypeId) {
    (
        store.component_id::<Pos>().unwrap(),
        store.component_id::<Vel>().unwrap(),
        store.component_id::<Tag>().unwrap(),
    )
}

fn new_store() -> Store {
    let mut store = Store::new();
    store.register_component::<Pos>("pos").unwrap();
    store.register_component::<Vel>("vel").unwrap();
    store.register_component::<Tag>("tag").unwrap();
    store
}

/// Every group satisfying `has_all(filter)` is in the view, in creation order.
fn view_is_complete(store: &Store, view: ViewId) -> bool {
    let view = store.view(view).unwrap();
    let expected: Vec<GroupId> = store
        .groups()
        .filter(|group| group.has_all(view.filter()))
        .map(Group::id)
        .collect();
    view.groups() == expected.as_slice()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    #[test]
    fn random_ops_preserve_invariants(
        group_size in 1..6usize,
        ops in prop::collection::vec(store_op_strategy(), 1..60),
    ) {
        let mut store = new_store();
        let (pos, vel, tag) = ids(&store);
        let mut alive: Vec<EntityKey> = Vec::new();
        let mut expected: HashMap<EntityKey, Pos> = HashMap::new();
        let mut views: Vec<ViewId> = Vec::new();

        for op in ops {
            match op {
                StoreOp::CreatePos => {
                    let key = store.create_entity_with_capacity::<(Pos,)>(group_size).unwrap();
                    expected.insert(key, Pos { x: 0.0, y: 0.0 });
                    alive.push(key);
                }
                StoreOp::CreatePosVel => {
                    let key = store
                        .create_entity_with_capacity::<(Pos, Vel)>(group_size)
                        .unwrap();
                    expected.insert(key, Pos { x: 0.0, y: 0.0 });
                    alive.push(key);
                }
                StoreOp::CreatePosVelTag => {
                    let key = store
                        .create_entity_with_capacity::<(Tag, Vel, Pos)>(group_size)
                        .unwrap();
                    expected.insert(key, Pos { x: 0.0, y: 0.0 });
                    alive.push(key);
                }
                StoreOp::Remove(idx) => {
                    if !alive.is_empty() {
                        let key = alive.remove(idx % alive.len());
                        expected.remove(&key);
                        store.remove_entity(key).unwrap();
                    }
                }
                StoreOp::SetPos(idx, x, y) => {
                    if !alive.is_empty() {
                        let key = alive[idx % alive.len()];
                        store.set_component(key, Pos { x, y }).unwrap();
                        expected.insert(key, Pos { x, y });
                    }
                }
                StoreOp::ViewPos => views.push(store.get_view(&[pos])),
                StoreOp::ViewPosVel => views.push(store.get_view(&[vel, pos])),
            }

            // Invariant: no group ever exceeds its capacity.
            for group in store.groups() {
                prop_assert!(group.live_count() <= group.capacity());
            }

            // Invariant: entity_count matches our tracking.
            prop_assert_eq!(store.entity_count(), alive.len());

            // Invariant: every live key resolves to the last value written.
            for key in &alive {
                prop_assert_eq!(store.get_component::<Pos>(*key).unwrap(), &expected[key]);
            }

            // Invariant: cached views track every matching group.
            for &view in &views {
                prop_assert!(view_is_complete(&store, view));
            }

            // Invariant: exact lookup never mixes archetypes.
            for group in store.groups() {
                let sig = group.signature();
                prop_assert!(sig.contains(pos));
                prop_assert!(!sig.contains(tag) || sig.contains(vel));
            }
        }

        prop_assert_eq!(store.query::<(&Pos,)>().count(), alive.len());
    }

    /// After removal, a key never resolves again, even once its slot is
    /// recycled; the recycling key carries a strictly greater version.
    #[test]
    fn stale_keys_rejected_after_remove_and_recycle(
        create_count in 1..20usize,
        remove_indices in prop::collection::vec(0..20usize, 1..10),
    ) {
        let mut store = new_store();

        let mut keys: Vec<EntityKey> = (0..create_count)
            .map(|_| store.create_entity_with_capacity::<(Pos,)>(4).unwrap())
            .collect();

        let mut stale: Vec<EntityKey> = Vec::new();
        for &idx in &remove_indices {
            if !keys.is_empty() {
                let key = keys.remove(idx % keys.len());
                store.remove_entity(key).unwrap();
                stale.push(key);
            }
        }

        for _ in 0..stale.len() {
            keys.push(store.create_entity_with_capacity::<(Pos,)>(4).unwrap());
        }

        for &old in &stale {
            prop_assert!(!store.is_alive(old));
            prop_assert!(store.get_component::<Pos>(old).is_err());
            if let Some(new) = keys.iter().find(|k| k.index() == old.index()) {
                prop_assert!(new.version() > old.version());
            }
        }
        for &key in &keys {
            prop_assert!(store.is_alive(key));
        }
    }

    /// Returning a chunk and asking for the same length hands the same start
    /// back when it is the first free range that fits.
    #[test]
    fn returned_chunk_is_reused(
        lens in prop::collection::vec(1..64usize, 1..12),
        pick in 0..12usize,
    ) {
        let mut registry = ComponentRegistry::new();
        let id = registry.register::<Vel>("vel").unwrap();
        let mut arena = ComponentArena::new(registry.get_info(id).unwrap().clone());

        let starts: Vec<usize> = lens
            .iter()
            .map(|&len| arena.get_or_create_chunk(len).unwrap())
            .collect();
        let high_water = arena.len();

        let pick = pick % lens.len();
        arena.return_chunk(starts[pick], lens[pick]);
        prop_assert_eq!(arena.get_or_create_chunk(lens[pick]).unwrap(), starts[pick]);
        prop_assert_eq!(arena.len(), high_water);
        prop_assert!(arena.free_ranges().is_empty());
    }

    /// A view sees groups created both before and after it.
    #[test]
    fn views_cover_groups_created_before_and_after(
        before in prop::collection::vec(0..3u8, 0..8),
        after in prop::collection::vec(0..3u8, 0..8),
    ) {
        let mut store = new_store();
        let create = |store: &mut Store, kind: u8| match kind {
            0 => store.create_entity_with_capacity::<(Pos,)>(1),
            1 => store.create_entity_with_capacity::<(Pos, Vel)>(1),
            _ => store.create_entity_with_capacity::<(Vel, Tag)>(1),
        };

        for kind in before {
            create(&mut store, kind).unwrap();
        }
        let (pos, vel, _) = ids(&store);
        let by_pos = store.get_view(&[pos]);
        let by_vel = store.get_view(&[vel]);
        for kind in after {
            create(&mut store, kind).unwrap();
        }

        prop_assert!(view_is_complete(&store, by_pos));
        prop_assert!(view_is_complete(&store, by_vel));
    }
}
