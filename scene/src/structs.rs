use glam::{Mat4, Vec3};

use crate::object::RayMaterial;

// Strides shared with res/shader/raytrace.wgsl
pub const SPHERE_STRIDE: usize = 56;
pub const MESH_OBJECT_STRIDE: usize = 112;
pub const VERTEX_STRIDE: usize = 12;
pub const INDEX_STRIDE: usize = 4;

/// Mesh vertices are uploaded as tightly packed positions.
pub type Vertex = [f32; 3];

//-----------Sphere-----------------
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereUniform {
    pub center: [f32; 3],
    pub radius: f32,
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
    pub smoothness: f32,
    pub emission: [f32; 3],
}

impl SphereUniform {
    pub fn new(center: Vec3, radius: f32, material: &RayMaterial) -> Self {
        Self {
            center: center.to_array(),
            radius,
            albedo: material.albedo.to_array(),
            specular: material.specular.to_array(),
            smoothness: material.smoothness,
            emission: material.emission.to_array(),
        }
    }
}

//-----------Mesh instance-----------------
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshObjectUniform {
    pub local_to_world: [[f32; 4]; 4],
    pub indices_offset: u32,
    pub indices_count: u32,
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
    pub smoothness: f32,
    pub emission: [f32; 3],
}

impl MeshObjectUniform {
    pub fn new(local_to_world: Mat4, indices_offset: u32, indices_count: u32, material: &RayMaterial) -> Self {
        Self {
            local_to_world: local_to_world.to_cols_array_2d(),
            indices_offset,
            indices_count,
            albedo: material.albedo.to_array(),
            specular: material.specular.to_array(),
            smoothness: material.smoothness,
            emission: material.emission.to_array(),
        }
    }
}

//-----------Light-----------------
/// A sun-like light. `direction` is the way the light travels (the sun's forward vector).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            intensity,
        }
    }

    /// Packed as `_DirectionalLight`: xyz = direction, w = intensity.
    pub fn to_uniform(&self) -> [f32; 4] {
        [self.direction.x, self.direction.y, self.direction.z, self.intensity]
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::new(-0.3, -1.0, 0.5), 1.0)
    }
}

//-----------Kernel parameters-----------------
/// Uniform block of the ray tracing kernel (`Params` in raytrace.wgsl).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TracerParams {
    pub camera_to_world: [[f32; 4]; 4],
    pub camera_inverse_projection: [[f32; 4]; 4],
    pub directional_light: [f32; 4],
    pub seed: f32,
    pub sphere_count: u32,
    pub mesh_count: u32,
    _padding: u32,
}

impl TracerParams {
    pub fn new(camera_to_world: [[f32; 4]; 4], camera_inverse_projection: [[f32; 4]; 4], seed: f32) -> Self {
        Self {
            camera_to_world,
            camera_inverse_projection,
            directional_light: [0.0; 4],
            seed,
            sphere_count: 0,
            mesh_count: 0,
            _padding: 0,
        }
    }
}

const _: () = assert!(std::mem::size_of::<SphereUniform>() == SPHERE_STRIDE);
const _: () = assert!(std::mem::size_of::<MeshObjectUniform>() == MESH_OBJECT_STRIDE);
const _: () = assert!(std::mem::size_of::<Vertex>() == VERTEX_STRIDE);
const _: () = assert!(std::mem::size_of::<u32>() == INDEX_STRIDE);
const _: () = assert!(std::mem::size_of::<TracerParams>() == 160);
