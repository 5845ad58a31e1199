use particle_world::*;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

#[test]
fn test_particle_world_is_sync_and_send() {
    fn assert_sync_send<T: Sync + Send>() {}
    assert_sync_send::<ParticleWorld>();
    assert_sync_send::<ParticleSystem>();
}

#[test]
fn test_shared_particle_world_across_threads() {
    let mut world = ParticleWorld::default();
    let system = world
        .attach_particle_system(ParticleSystemDef::with_radius(0.1))
        .unwrap();
    world
        .particle_system_mut(system)
        .unwrap()
        .create_particle(ParticleDef::at(Vec3::new(0.0, 5.0, 0.0)))
        .unwrap();
    let world = Arc::new(Mutex::new(world));

    let mut handles = vec![];
    for _ in 0..4 {
        let world_clone = Arc::clone(&world);
        let handle = thread::spawn(move || {
            let mut world = world_clone.lock().unwrap();
            world.step(1.0 / 60.0).unwrap();
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let world = world.lock().unwrap();
    let y = world.particle_system(system).unwrap().particles()[0].position.y;
    assert!(y < 5.0, "particle should have fallen, y = {y}");
}

#[test]
fn test_concurrent_queries_share_a_world() {
    let mut world = ParticleWorld::default();
    let body = world.create_body(RigidBody::fixed(Vec3::ZERO)).unwrap();
    world
        .create_collider(Collider::builder().sphere(1.0).build(body))
        .unwrap();
    let system = world
        .attach_particle_system(ParticleSystemDef::with_radius(0.1))
        .unwrap();
    for i in 0..32 {
        world
            .particle_system_mut(system)
            .unwrap()
            .create_particle(ParticleDef::at(Vec3::new(i as f32 * 0.5, 3.0, 0.0)))
            .unwrap();
    }
    let world = Arc::new(RwLock::new(world));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                let world = world.read().unwrap();
                world
                    .hits_in_aabb(&Aabb::new(Vec3::new(-2.0, -2.0, -1.0), Vec3::new(20.0, 4.0, 1.0)))
                    .len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 33);
    }
}
