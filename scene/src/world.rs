use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use rand::Rng;

use crate::config::{Config, ObjectConfig, ShapeKind, SpawnerConfig};
use crate::error::{Result, SceneError};
use crate::models::resolve_mesh;
use crate::object::{Mesh, ObjectId, ObjectSource, RayMaterial, TraceableObject};
use crate::registry::ObjectRegistry;
use crate::structs::DirectionalLight;

/// Owns the scene objects and decides which of them take part in ray tracing.
#[derive(Debug, Default)]
pub struct Scene {
    objects: HashMap<ObjectId, TraceableObject>,
    registry: ObjectRegistry,
    next_id: u64,
    pub sun: DirectionalLight,
    pub environment_path: Option<String>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the scene described by `config`. Meshes named more than once are loaded once and shared.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut scene = Scene {
            sun: DirectionalLight::new(Vec3::from(config.sun.direction), config.sun.intensity),
            environment_path: config.environment.path.clone(),
            ..Scene::default()
        };

        let mut meshes: HashMap<String, Arc<Mesh>> = HashMap::new();
        for (index, object_config) in config.objects.iter().enumerate() {
            let object = build_object(index, object_config, &mut meshes)?;
            let id = scene.insert(object);
            if object_config.active {
                scene.activate(id);
            }
        }

        log::info!(
            "Scene loaded: {} objects, {} traced, {} meshes",
            scene.objects.len(),
            scene.registry.len(),
            meshes.len()
        );
        Ok(scene)
    }

    /// Adds an object without registering it for tracing.
    pub fn insert(&mut self, object: TraceableObject) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        self.objects.insert(id, object);
        id
    }

    /// Adds an object and registers it right away.
    pub fn spawn(&mut self, object: TraceableObject) -> ObjectId {
        let id = self.insert(object);
        self.activate(id);
        id
    }

    /// Registers the object for tracing. Activating twice registers it twice.
    pub fn activate(&mut self, id: ObjectId) {
        self.registry.register(id);
    }

    pub fn deactivate(&mut self, id: ObjectId) -> bool {
        self.registry.unregister(id)
    }

    /// Removes the object. Its registry entry, if any, is left to go stale.
    pub fn despawn(&mut self, id: ObjectId) -> Option<TraceableObject> {
        self.objects.remove(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut TraceableObject> {
        self.objects.get_mut(&id)
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Drops a ball with random size and colours somewhere inside the spawner bounds.
    pub fn spawn_random_ball<R: Rng + ?Sized>(&mut self, rng: &mut R, spawner: &SpawnerConfig) -> ObjectId {
        let min = Vec3::from(spawner.position_min);
        let max = Vec3::from(spawner.position_max);
        let position = Vec3::new(
            random_in(rng, min.x, max.x),
            random_in(rng, min.y, max.y),
            random_in(rng, min.z, max.z),
        );
        let scale = random_in(rng, spawner.scale_min, spawner.scale_max);

        let material = RayMaterial::new(
            random_color(rng, spawner.value_min),
            random_color(rng, spawner.value_min),
            rng.gen_range(0.0..=1.0),
            random_color(rng, spawner.value_min),
        );

        let id = self.spawn(TraceableObject::sphere(position, scale / 2.0, material));
        log::debug!("Spawned ball {:?} at {} with scale {}", id, position, scale);
        id
    }
}

impl ObjectSource for Scene {
    fn object(&self, id: ObjectId) -> Option<&TraceableObject> {
        self.objects.get(&id)
    }
}

fn build_object(index: usize, config: &ObjectConfig, meshes: &mut HashMap<String, Arc<Mesh>>) -> Result<TraceableObject> {
    let transform = config.transform();
    let material = config.material();
    match config.shape {
        ShapeKind::Sphere => Ok(TraceableObject {
            shape: crate::object::Shape::Sphere,
            transform,
            material,
        }),
        ShapeKind::Mesh => {
            let name = config.mesh.as_deref().ok_or(SceneError::MissingMesh { index })?;
            let mesh = match meshes.get(name) {
                Some(mesh) => mesh.clone(),
                None => {
                    let mesh = Arc::new(resolve_mesh(name)?);
                    meshes.insert(name.to_string(), mesh.clone());
                    mesh
                }
            };
            Ok(TraceableObject::mesh(mesh, transform, material))
        }
    }
}

/// Uniform in [min, max), or `min` when the range is empty.
fn random_in<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

/// Fully saturated colour with random hue and a value in [value_min, 1].
fn random_color<R: Rng + ?Sized>(rng: &mut R, value_min: f32) -> Vec3 {
    let hue = rng.gen_range(0.0..1.0);
    let value = rng.gen_range(value_min.clamp(0.0, 1.0)..=1.0);
    hsv_to_rgb(hue, 1.0, value)
}

pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Vec3 {
    let h = hue.rem_euclid(1.0) * 6.0;
    let c = value * saturation;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    Vec3::new(r + m, g + m, b + m)
}
