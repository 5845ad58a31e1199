use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use particle_world::*;
use std::hint::black_box;

const DT: f32 = 1.0 / 60.0;

fn prepare_world(particle_count: usize, system_count: usize) -> ParticleWorld {
    let mut world = ParticleWorld::default();
    let ground = world
        .create_body(RigidBody::fixed(Vec3::new(0.0, -0.5, 0.0)))
        .expect("unlocked");
    world
        .create_collider(
            Collider::builder()
                .cuboid(Vec3::new(50.0, 0.5, 50.0))
                .build(ground),
        )
        .expect("ground body exists");
    for i in 0..16 {
        let body = world
            .create_body(RigidBody::dynamic(Vec3::new(i as f32 * 2.0, 3.0, 0.0)))
            .expect("unlocked");
        world
            .create_collider(Collider::builder().sphere(0.5).build(body))
            .expect("body exists");
    }

    let per_system = particle_count / system_count.max(1);
    let side = (per_system as f32).cbrt().ceil() as usize;
    for s in 0..system_count {
        let handle = world
            .attach_particle_system(ParticleSystemDef::with_radius(0.1))
            .expect("unlocked");
        let system = world.particle_system_mut(handle).expect("just attached");
        for i in 0..per_system {
            let (x, y, z) = (i % side, (i / side) % side, i / (side * side));
            let position = Vec3::new(
                x as f32 * 0.2 + s as f32 * 10.0,
                y as f32 * 0.2 + 1.0,
                z as f32 * 0.2,
            );
            system
                .create_particle(ParticleDef::at(position))
                .expect("unbounded system");
        }
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &count in &[512usize, 2048, 8192] {
        group.bench_with_input(BenchmarkId::new("one_system", count), &count, |b, &count| {
            let mut world = prepare_world(count, 1);
            b.iter(|| world.step(black_box(DT)).expect("step"))
        });
        group.bench_with_input(BenchmarkId::new("four_systems", count), &count, |b, &count| {
            let mut world = prepare_world(count, 4);
            b.iter(|| world.step(black_box(DT)).expect("step"))
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let world = prepare_world(4096, 4);
    let region = Aabb::from_center_half_extents(Vec3::new(5.0, 1.5, 0.5), Vec3::splat(2.0));

    c.bench_function("query_aabb", |b| {
        b.iter(|| {
            let mut hits = CollectHits::new();
            world.query_aabb(black_box(&region), &mut hits);
            hits.hits.len()
        })
    });
    c.bench_function("ray_cast_closest", |b| {
        b.iter(|| world.ray_cast_closest(black_box(Vec3::new(-5.0, 1.5, 0.5)), Vec3::new(45.0, 1.5, 0.5)))
    });
}

criterion_group!(benches, bench_world_step, bench_queries);
criterion_main!(benches);
