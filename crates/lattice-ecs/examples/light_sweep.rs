//! Light sweep demo -- a lighting pass driving the store the way render
//! systems do: fetch a cached view once, then walk each group's chunk with
//! its fixed offset.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example light_sweep -p lattice-ecs

use lattice_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct Transform {
    position: [f32; 3],
    scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct PointLight {
    color: [f32; 3],
    intensity: f32,
    radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C)]
struct Flicker {
    phase: f32,
    speed: f32,
}

const LIGHTS_PER_GROUP: usize = 64;

/// Total light reaching `probe`, summed over every light in the view.
fn sweep(store: &Store, view: ViewId, probe: [f32; 3]) -> anyhow::Result<[f32; 3]> {
    let transform = store
        .component_id::<Transform>()
        .ok_or_else(|| anyhow::anyhow!("Transform not registered"))?;
    let light = store
        .component_id::<PointLight>()
        .ok_or_else(|| anyhow::anyhow!("PointLight not registered"))?;

    let transforms = store.component_array::<Transform>()?;
    let lights = store.component_array::<PointLight>()?;
    let groups = store
        .view(view)
        .ok_or_else(|| anyhow::anyhow!("view {view:?} missing"))?
        .groups();

    let mut total = [0.0f32; 3];
    for &id in groups {
        let Some(group) = store.group(id) else { continue };
        let (Some(t_offset), Some(l_offset)) = (group.get_offset(transform), group.get_offset(light))
        else {
            continue;
        };
        for slot in group.slots() {
            let t = &transforms[t_offset + slot];
            let l = &lights[l_offset + slot];
            let d2: f32 = (0..3).map(|i| (t.position[i] - probe[i]).powi(2)).sum();
            if d2 > l.radius * l.radius {
                continue;
            }
            let falloff = 1.0 - d2.sqrt() / l.radius;
            for (channel, c) in total.iter_mut().zip(l.color) {
                *channel += c * l.intensity * falloff;
            }
        }
    }
    Ok(total)
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut store = Store::with_config(StoreConfig {
        default_group_size: LIGHTS_PER_GROUP,
    })?;
    let transform = store.register_component::<Transform>("transform")?;
    let light = store.register_component::<PointLight>("point_light")?;
    store.register_component::<Flicker>("flicker")?;

    // The view exists before any light does; groups join it as they appear.
    let view = store.get_view(&[transform, light]);

    let mut keys = Vec::new();
    for i in 0..200 {
        let key = if i % 4 == 0 {
            let key = store.create_entity::<(Transform, PointLight, Flicker)>()?;
            store.set_component(key, Flicker { phase: i as f32, speed: 2.0 })?;
            key
        } else {
            store.create_entity::<(Transform, PointLight)>()?
        };
        let x = (i % 20) as f32;
        let z = (i / 20) as f32;
        store.set_component(key, Transform { position: [x, 0.0, z], scale: 1.0 })?;
        store.set_component(
            key,
            PointLight {
                color: [1.0, 0.9, 0.7],
                intensity: 1.0,
                radius: 3.0,
            },
        )?;
        keys.push(key);
    }

    let probe = [10.0, 0.0, 5.0];
    println!(
        "{} lights in {} groups, view spans {} groups",
        store.entity_count(),
        store.group_count(),
        store.view(view).map_or(0, View::len),
    );
    println!("light at probe: {:?}", sweep(&store, view, probe)?);

    // Flickering lights dim over time.
    for (_key, (l, f)) in store.query_mut::<(&mut PointLight, &Flicker)>() {
        l.intensity = 0.5 + 0.5 * (f.phase * f.speed).sin();
    }
    println!("after flicker: {:?}", sweep(&store, view, probe)?);

    // Knock out every third light; the old keys stop resolving.
    for key in keys.iter().step_by(3) {
        store.remove_entity(*key)?;
    }
    let stale = keys[0];
    if let Err(err) = store.get_component::<PointLight>(stale) {
        println!("stale key {stale}: {err}");
    }
    println!(
        "{} lights remain ({} in view), light at probe: {:?}",
        store.entity_count(),
        store.view_len(view),
        sweep(&store, view, probe)?,
    );

    store.clear();
    println!(
        "cleared: {} entities, transform arena holds {} elements",
        store.entity_count(),
        store.arena(transform).map_or(0, |arena| arena.len()),
    );
    Ok(())
}
