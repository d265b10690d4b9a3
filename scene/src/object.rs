use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

/// Stable handle of an object owned by a [`Scene`](crate::Scene).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Triangle mesh asset. Shared between objects and never modified by the ray tracer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Clone, Debug)]
pub enum Shape {
    Sphere,
    Mesh(Arc<Mesh>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }

    pub fn local_to_world(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Surface description read by the kernel. Colors are linear RGB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayMaterial {
    pub albedo: Vec3,
    pub specular: Vec3,
    pub smoothness: f32, //0.0 - 1.0
    pub emission: Vec3,
}

impl RayMaterial {
    pub fn new(albedo: Vec3, specular: Vec3, smoothness: f32, emission: Vec3) -> Self {
        Self { albedo, specular, smoothness, emission }
    }
}

impl Default for RayMaterial {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            specular: Vec3::ONE,
            smoothness: 0.0,
            emission: Vec3::ZERO,
        }
    }
}

/// A scene entity that contributes geometry to the ray tracing pass.
#[derive(Clone, Debug)]
pub struct TraceableObject {
    pub shape: Shape,
    pub transform: Transform,
    pub material: RayMaterial,
}

impl TraceableObject {
    /// The sphere primitive has unit diameter, so `radius` becomes a uniform scale of `2 * radius`.
    pub fn sphere(center: Vec3, radius: f32, material: RayMaterial) -> Self {
        Self {
            shape: Shape::Sphere,
            transform: Transform {
                position: center,
                rotation: Quat::IDENTITY,
                scale: Vec3::splat(radius * 2.0),
            },
            material,
        }
    }

    pub fn mesh(mesh: Arc<Mesh>, transform: Transform, material: RayMaterial) -> Self {
        Self {
            shape: Shape::Mesh(mesh),
            transform,
            material,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.shape, Shape::Mesh(_))
    }

    pub fn radius(&self) -> f32 {
        self.transform.scale.x / 2.0
    }
}

/// Read-only access to objects by handle.
pub trait ObjectSource {
    fn object(&self, id: ObjectId) -> Option<&TraceableObject>;
}

impl ObjectSource for std::collections::HashMap<ObjectId, TraceableObject> {
    fn object(&self, id: ObjectId) -> Option<&TraceableObject> {
        self.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_radius_from_scale() {
        let sphere = TraceableObject::sphere(Vec3::ZERO, 1.5, RayMaterial::default());
        assert_eq!(sphere.transform.scale, Vec3::splat(3.0));
        assert_eq!(sphere.radius(), 1.5);
        assert!(!sphere.is_mesh());
    }

    #[test]
    fn test_local_to_world_translates_points() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        };
        let point = transform.local_to_world().transform_point3(Vec3::ONE);
        assert_eq!(point, Vec3::new(3.0, 4.0, 5.0));
    }
}
