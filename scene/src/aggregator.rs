//! Packs the registered objects into the four GPU buffers read by the ray tracing kernel.
//!
//! Everything is re-derived from the registry on every tick. Only the buffer allocations are
//! carried over, and those are kept only while their shape stays the same.

use wgpu_utils::{reconcile_buffer, release_buffer, BufferBackend, BufferChange, StructuredBuffer};

use crate::object::{ObjectSource, Shape};
use crate::registry::ObjectRegistry;
use crate::structs::{
    MeshObjectUniform, SphereUniform, Vertex, INDEX_STRIDE, MESH_OBJECT_STRIDE, SPHERE_STRIDE, VERTEX_STRIDE,
};

/// CPU-side result of flattening the registry for one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneGeometry {
    pub spheres: Vec<SphereUniform>,
    pub mesh_objects: Vec<MeshObjectUniform>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl SceneGeometry {
    /// Walks the registry once, in order, and splits it into spheres and mesh instances.
    ///
    /// Mesh vertices and indices are appended to shared lists. Each index is shifted by the
    /// number of vertices already present, and each instance records where its indices start.
    pub fn collect<S: ObjectSource + ?Sized>(registry: &ObjectRegistry, objects: &S) -> Self {
        let mut geometry = SceneGeometry::default();

        for id in registry.enumerate() {
            let Some(object) = objects.object(id) else {
                log::warn!("Registered object {:?} no longer exists, skipping", id);
                continue;
            };

            match &object.shape {
                Shape::Sphere => {
                    geometry.spheres.push(SphereUniform::new(
                        object.transform.position,
                        object.radius(),
                        &object.material,
                    ));
                }
                Shape::Mesh(mesh) => {
                    let first_vertex = geometry.vertices.len() as u32;
                    geometry.vertices.extend_from_slice(&mesh.vertices);

                    let first_index = geometry.indices.len() as u32;
                    // corrupt indices wrap instead of aborting the tick
                    geometry.indices.extend(mesh.indices.iter().map(|index| index.wrapping_add(first_vertex)));

                    #[cfg(debug_assertions)]
                    if let Some(bad) = mesh.indices.iter().find(|index| **index as usize >= mesh.vertices.len()) {
                        log::warn!(
                            "Mesh of object {:?} references vertex {} but has only {} vertices",
                            id,
                            bad,
                            mesh.vertices.len()
                        );
                    }

                    geometry.mesh_objects.push(MeshObjectUniform::new(
                        object.transform.local_to_world(),
                        first_index,
                        mesh.indices.len() as u32,
                        &object.material,
                    ));
                }
            }
        }

        geometry
    }
}

/// What happened to each buffer during one [`SceneAggregator::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub spheres: BufferChange,
    pub mesh_objects: BufferChange,
    pub vertices: BufferChange,
    pub indices: BufferChange,
}

impl TickReport {
    pub fn any_allocated(&self) -> bool {
        [self.spheres, self.mesh_objects, self.vertices, self.indices]
            .iter()
            .any(|change| change.allocated())
    }
}

/// Borrowed view of the current buffers. Any slot may be absent.
#[derive(Debug)]
pub struct SceneSnapshot<'a, B> {
    pub spheres: Option<&'a StructuredBuffer<B>>,
    pub mesh_objects: Option<&'a StructuredBuffer<B>>,
    pub vertices: Option<&'a StructuredBuffer<B>>,
    pub indices: Option<&'a StructuredBuffer<B>>,
}

impl<B> Clone for SceneSnapshot<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for SceneSnapshot<'_, B> {}

impl<B> SceneSnapshot<'_, B> {
    pub fn sphere_count(&self) -> u32 {
        self.spheres.map_or(0, |buffer| buffer.count() as u32)
    }

    pub fn mesh_count(&self) -> u32 {
        self.mesh_objects.map_or(0, |buffer| buffer.count() as u32)
    }
}

/// Owner of the sphere, mesh instance, vertex and index buffers.
#[derive(Debug)]
pub struct SceneAggregator<B> {
    spheres: Option<StructuredBuffer<B>>,
    mesh_objects: Option<StructuredBuffer<B>>,
    vertices: Option<StructuredBuffer<B>>,
    indices: Option<StructuredBuffer<B>>,
}

impl<B> Default for SceneAggregator<B> {
    fn default() -> Self {
        Self {
            spheres: None,
            mesh_objects: None,
            vertices: None,
            indices: None,
        }
    }
}

impl<B> SceneAggregator<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the scene geometry and re-provisions the four buffers to match it.
    pub fn tick<A, S>(&mut self, registry: &ObjectRegistry, objects: &S, backend: &mut A) -> TickReport
    where
        A: BufferBackend<Buffer = B>,
        S: ObjectSource + ?Sized,
    {
        let geometry = SceneGeometry::collect(registry, objects);
        self.upload(&geometry, backend)
    }

    /// Applies the reconciliation policy to every buffer.
    pub fn upload<A>(&mut self, geometry: &SceneGeometry, backend: &mut A) -> TickReport
    where
        A: BufferBackend<Buffer = B>,
    {
        let report = TickReport {
            vertices: reconcile_buffer(backend, &mut self.vertices, "Vertex Buffer", &geometry.vertices, VERTEX_STRIDE),
            spheres: reconcile_buffer(backend, &mut self.spheres, "Sphere Buffer", &geometry.spheres, SPHERE_STRIDE),
            mesh_objects: reconcile_buffer(
                backend,
                &mut self.mesh_objects,
                "Mesh Object Buffer",
                &geometry.mesh_objects,
                MESH_OBJECT_STRIDE,
            ),
            indices: reconcile_buffer(backend, &mut self.indices, "Index Buffer", &geometry.indices, INDEX_STRIDE),
        };

        log::trace!(
            "Scene tick: {} spheres, {} meshes, {} vertices, {} indices",
            geometry.spheres.len(),
            geometry.mesh_objects.len(),
            geometry.vertices.len(),
            geometry.indices.len()
        );
        report
    }

    pub fn snapshot(&self) -> SceneSnapshot<'_, B> {
        SceneSnapshot {
            spheres: self.spheres.as_ref(),
            mesh_objects: self.mesh_objects.as_ref(),
            vertices: self.vertices.as_ref(),
            indices: self.indices.as_ref(),
        }
    }

    /// Frees every allocation. Called when the scene is disabled.
    pub fn release<A>(&mut self, backend: &mut A)
    where
        A: BufferBackend<Buffer = B>,
    {
        release_buffer(backend, &mut self.spheres);
        release_buffer(backend, &mut self.mesh_objects);
        release_buffer(backend, &mut self.vertices);
        release_buffer(backend, &mut self.indices);
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_none() && self.mesh_objects.is_none() && self.vertices.is_none() && self.indices.is_none()
    }
}
