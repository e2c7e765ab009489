//! End-to-end scenarios: group capacity and slot reuse, superset views versus
//! exact archetype lookup, and disposal via `clear`.

use lattice_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct Velocity {
    dx: f32,
    dy: f32,
    dz: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct Color(u32);

#[test]
fn group_of_four_fills_and_recycles() {
    let mut store = Store::new();
    let keys: Vec<EntityKey> = (0..4)
        .map(|_| {
            store
                .create_entity_with_capacity::<(Position, Velocity)>(4)
                .unwrap()
        })
        .collect();

    let entity = store.resolve(keys[0]).unwrap();
    let group = entity.group();
    assert!(store.group(group).unwrap().is_full());

    // A fifth create directly in that group fails.
    let err = store.create_entity_in_group(group).unwrap_err();
    assert!(err.is_capacity_exceeded());
    assert!(matches!(err, EcsError::GroupFull { capacity: 4, .. }));

    // Remove the entity in slot 2, then create again: slot 2 comes back with
    // the next version.
    let removed = store.resolve(keys[2]).unwrap();
    assert_eq!(removed.slot(), 2);
    store.remove_entity(keys[2]).unwrap();

    let key = store
        .create_entity_with_capacity::<(Position, Velocity)>(4)
        .unwrap();
    let reused = store.resolve(key).unwrap();
    assert_eq!(reused.group(), group);
    assert_eq!(reused.slot(), 2);
    assert_eq!(reused.version(), removed.version() + 1);
    assert_eq!(store.group_count(), 1);

    // The old key stays dead.
    assert!(matches!(
        store.get_component::<Position>(keys[2]),
        Err(EcsError::InvalidKey { .. })
    ));
}

#[test]
fn swap_remove_does_not_move_component_data() {
    let mut store = Store::new();
    let keys: Vec<EntityKey> = (0..4)
        .map(|i| {
            let key = store.create_entity_with_capacity::<(Color,)>(4).unwrap();
            store.set_component(key, Color(i)).unwrap();
            key
        })
        .collect();

    store.remove_entity(keys[0]).unwrap();
    for (i, key) in keys.iter().enumerate().skip(1) {
        assert_eq!(store.get_component::<Color>(*key).unwrap(), &Color(i as u32));
    }

    let color = store.component_id::<Color>().unwrap();
    let lookup = store.resolve(keys[3]).unwrap();
    let offset = store.group(lookup.group()).unwrap().get_offset(color).unwrap();
    assert_eq!(store.component_array::<Color>().unwrap()[offset + 3], Color(3));
}

#[test]
fn superset_view_versus_exact_lookup() {
    let mut store = Store::new();
    let ab = store.create_entity::<(Position, Velocity)>().unwrap();
    let abc = store.create_entity::<(Position, Velocity, Color)>().unwrap();

    let ab_group = store.resolve(ab).unwrap().group();
    let abc_group = store.resolve(abc).unwrap().group();
    assert_ne!(ab_group, abc_group);

    let a = store.component_id::<Position>().unwrap();
    let b = store.component_id::<Velocity>().unwrap();
    let view = store.get_view(&[a, b]);
    assert_eq!(store.view(view).unwrap().groups(), &[ab_group, abc_group]);
    assert_eq!(store.view_len(view), 2);

    // Further {A, B} entities keep landing in the exact group.
    for _ in 0..10 {
        let key = store.create_entity::<(Velocity, Position)>().unwrap();
        assert_eq!(store.resolve(key).unwrap().group(), ab_group);
    }
    assert_eq!(store.group(abc_group).unwrap().live_count(), 1);
}

#[test]
fn consumer_style_offset_iteration() {
    let mut store = Store::new();
    for i in 0..6 {
        let key = store
            .create_entity_with_capacity::<(Position, Color)>(4)
            .unwrap();
        store.set_component(key, Color(i)).unwrap();
    }
    let lone = store.create_entity::<(Position,)>().unwrap();
    store
        .set_component(lone, Position { x: 1.0, y: 1.0, z: 1.0 })
        .unwrap();

    let pos = store.component_id::<Position>().unwrap();
    let color = store.component_id::<Color>().unwrap();
    let view = store.get_view(&[pos, color]);

    let groups = store.view(view).unwrap().groups().to_vec();
    assert_eq!(groups.len(), 2);

    let mut seen = Vec::new();
    let colors = store.component_array::<Color>().unwrap();
    for id in groups {
        let group = store.group(id).unwrap();
        let offset = group.get_offset(color).unwrap();
        for slot in group.slots() {
            seen.push(colors[offset + slot].0);
        }
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn new_groups_join_existing_views() {
    let mut store = Store::new();
    let pos = store.register_component::<Position>("position").unwrap();
    let view = store.get_view(&[pos]);
    assert!(store.view(view).unwrap().is_empty());

    store.create_entity::<(Position,)>().unwrap();
    store.create_entity::<(Position, Color)>().unwrap();
    store.create_entity::<(Color,)>().unwrap();

    assert_eq!(store.view(view).unwrap().len(), 2);
    assert_eq!(store.query::<(&Position,)>().count(), 2);
}

#[test]
fn clear_returns_chunks_for_reuse() {
    let mut store = Store::new();
    for _ in 0..3 {
        store.create_entity::<(Position, Velocity)>().unwrap();
    }
    let pos = store.component_id::<Position>().unwrap();
    let capacity_before = store.arena(pos).unwrap().capacity();
    let len_before = store.arena(pos).unwrap().len();

    store.clear();
    assert_eq!(store.entity_count(), 0);

    let key = store.create_entity::<(Position, Velocity)>().unwrap();
    let entity = store.resolve(key).unwrap();
    assert_eq!(store.group(entity.group()).unwrap().get_offset(pos), Some(0));
    assert_eq!(store.arena(pos).unwrap().len(), len_before);
    assert_eq!(store.arena(pos).unwrap().capacity(), capacity_before);
    assert_eq!(
        store.get_component::<Position>(key).unwrap(),
        &Position { x: 0.0, y: 0.0, z: 0.0 }
    );
}

#[test]
fn store_config_sets_default_group_size() {
    let mut store = Store::with_config(StoreConfig {
        default_group_size: 2,
    })
    .unwrap();
    for _ in 0..5 {
        store.create_entity::<(Color,)>().unwrap();
    }
    assert_eq!(store.group_count(), 3);
}
