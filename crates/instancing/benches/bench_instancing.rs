use std::hint::black_box;
use std::time::Instant;

use glam::{Mat4, Vec3};
use skirmish_assets::samples;
use skirmish_common::{BoundingSphere, Camera, FixedCamera, InstanceKey, ItemType, PlayerNumber, Transform};
use skirmish_instancing::{
    ChangeRequest, CullEntry, CullJob, CullingConfig, CullingScan, InstancePayload, InstanceRegistry,
    InstancedModelPart, PartType, RegistryConfig, RotationAxis,
};

fn camera() -> FixedCamera {
    FixedCamera::looking_at(Vec3::new(0.0, 80.0, 160.0), Vec3::ZERO, 60f32.to_radians(), 16.0 / 9.0)
}

fn grid_position(i: usize, count: usize, spacing: f32) -> Vec3 {
    let side = (count as f32).sqrt().ceil() as usize;
    Vec3::new((i % side) as f32 * spacing, 0.0, (i / side) as f32 * spacing)
}

fn bench_part_drain(instance_count: usize, iterations: usize) {
    let mut part = InstancedModelPart::new("Hull", 0, PartType::Normal);
    let start = Instant::now();
    for iteration in 0..iterations {
        for i in 0..instance_count {
            let world = Mat4::from_translation(grid_position(i, instance_count, 4.0));
            let payload = InstancePayload {
                visible: (i + iteration) % 3 != 0,
                ..InstancePayload::default()
            };
            part.enter_change_request(
                InstanceKey(i as u64),
                ChangeRequest::add_or_update(world, payload, PartType::Normal),
            );
        }
        part.swap();
        black_box(part.process_double_buffers(black_box(0.016)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  enter + drain ({instance_count} instances, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_cull_scan(instance_count: usize, iterations: usize) {
    let scan = CullingScan::new(CullingConfig::default());
    let job = CullJob {
        generation: 0,
        frustum: Some(camera().frustum()),
        entries: (0..instance_count)
            .map(|i| CullEntry {
                item_type: ItemType(0),
                key: InstanceKey(i as u64),
                world: Mat4::from_translation(grid_position(i, instance_count, 4.0)),
                bounds: BoundingSphere::new(Vec3::ZERO, 1.5),
                was_visible: true,
            })
            .collect(),
    };

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(scan.evaluate(black_box(&job), None));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  cull scan ({instance_count} instances, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_registry_frame(instance_count: usize, iterations: usize) {
    let (catalog, loader) = samples::sample_library();
    let mut registry = InstanceRegistry::new(RegistryConfig::default(), catalog, Box::new(loader));
    registry.register_type(samples::TANK);
    registry.process_loads();

    let keys: Vec<_> = (0..instance_count)
        .map(|i| {
            let key = registry.allocate_instance_key();
            let transform = Transform::from_position(grid_position(i, instance_count, 4.0));
            let _ = registry.update_instance_transform(samples::TANK, key, transform, PlayerNumber(1));
            key
        })
        .collect();
    let camera = camera();
    registry.update_frame(&camera, 0.016);

    let start = Instant::now();
    for iteration in 0..iterations {
        let angle = iteration as f32 * 0.01;
        for key in &keys {
            let _ = registry.set_bone_rotation(samples::TANK, *key, "Turret", RotationAxis::Y, angle);
        }
        black_box(registry.update_frame(&camera, 0.016));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  registry frame, turrets turning ({instance_count} tanks, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Instancing Benchmarks ===\n");

    println!("Part drain:");
    bench_part_drain(100, 1000);
    bench_part_drain(1000, 100);
    bench_part_drain(10000, 10);

    println!("\nCulling scan:");
    bench_cull_scan(1000, 1000);
    bench_cull_scan(10000, 100);

    println!("\nRegistry frame:");
    bench_registry_frame(100, 100);
    bench_registry_frame(1000, 20);

    println!("\n=== Done ===");
}
