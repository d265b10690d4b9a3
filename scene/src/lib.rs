//! # Scene
//!
//! Everything the ray tracer knows about the world: traceable objects, the registry of active
//! objects, and the aggregator that packs them into GPU buffers each tick.
//!
//! ## Modules
//!
//! - `object`: `TraceableObject`, its `Shape`, `Transform` and `RayMaterial`.
//! - `registry`: the ordered set of objects currently taking part in ray tracing.
//! - `aggregator`: flattens the registry into sphere, mesh instance, vertex and index buffers.
//! - `world`: the `Scene` that owns objects and drives the registry.
//! - `structs`: the GPU-side layouts shared with the kernel.
//! - `config`: loads the TOML scene description.
//! - `models`: builtin meshes, .obj loading and environment images.
//! - `texture`: uploads the environment texture.
//! - `camera`: the fly camera and its projection.
//!
//! ## Usage
//!
//! ```ignore
//! let config = Config::new("res/scene.toml")?;
//! let scene = Scene::from_config(&config)?;
//! let mut aggregator = SceneAggregator::new();
//! aggregator.tick(scene.registry(), &scene, &mut backend);
//! ```
mod aggregator;
mod camera;
mod config;
mod error;
mod models;
mod object;
mod registry;
mod structs;
mod texture;
mod world;

pub use aggregator::{SceneAggregator, SceneGeometry, SceneSnapshot, TickReport};
pub use camera::{Camera, CameraController, Projection};
pub use config::{CameraConfig, Config, EnvironmentConfig, ObjectConfig, ShapeKind, SpawnerConfig, SunConfig, TracerConfig};
pub use error::SceneError;
pub use models::{cube_mesh, load_exr, load_hdr, load_hdri, load_obj, load_obj_from_reader, quad_mesh, resolve_mesh};
pub use object::{Mesh, ObjectId, ObjectSource, RayMaterial, Shape, TraceableObject, Transform};
pub use registry::ObjectRegistry;
pub use structs::{
    DirectionalLight, MeshObjectUniform, SphereUniform, TracerParams, Vertex, INDEX_STRIDE, MESH_OBJECT_STRIDE,
    SPHERE_STRIDE, VERTEX_STRIDE,
};
pub use texture::{create_texture, fallback_image, EnvironmentTexture};
pub use world::{hsv_to_rgb, Scene};
