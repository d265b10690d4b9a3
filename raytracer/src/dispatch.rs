//! Per-frame decisions of the ray tracing pass, kept free of any GPU handle.
//!
//! [`FrameDispatcher::plan`] turns the frame state into either a skip or a [`DispatchCommand`].
//! Executing the command is the job of [`TracerPass`](crate::tracer_pass::TracerPass).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scene::{DirectionalLight, SceneSnapshot, TracerParams};

/// Edge length of the kernel's square workgroup.
pub const WORKGROUP_SIZE: u32 = 8;

/// Upper bound (exclusive) of the per-frame seed.
pub const SEED_RANGE: f32 = 4000.0;

/// Workgroups needed to cover a `width` x `height` image.
pub fn workgroup_count(width: u32, height: u32) -> [u32; 3] {
    [width.div_ceil(WORKGROUP_SIZE), height.div_ceil(WORKGROUP_SIZE), 1]
}

/// What the host knows about the frame being rendered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    /// The simulation is running.
    pub playing: bool,
    /// Trace even while the simulation is paused.
    pub scene_preview: bool,
    pub width: u32,
    pub height: u32,
    pub camera_to_world: [[f32; 4]; 4],
    pub camera_inverse_projection: [[f32; 4]; 4],
}

/// The active scene as seen by one frame: its light and the buffers of the last tick.
#[derive(Debug)]
pub struct SceneView<'a, B> {
    pub light: DirectionalLight,
    pub buffers: SceneSnapshot<'a, B>,
}

impl<B> Clone for SceneView<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for SceneView<'_, B> {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither playing nor previewing.
    Inactive,
    /// The kernel failed to load or compile.
    MissingKernel,
}

/// Everything needed to record one dispatch of the kernel.
#[derive(Debug)]
pub struct DispatchCommand<'a, B> {
    pub params: TracerParams,
    /// `None` renders the environment only, without scene buffers or light.
    pub scene: Option<SceneView<'a, B>>,
    pub workgroups: [u32; 3],
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub enum FramePlan<'a, B> {
    Skipped(SkipReason),
    Dispatch(DispatchCommand<'a, B>),
}

impl<'a, B> FramePlan<'a, B> {
    pub fn command(&self) -> Option<&DispatchCommand<'a, B>> {
        match self {
            FramePlan::Dispatch(command) => Some(command),
            FramePlan::Skipped(_) => None,
        }
    }
}

/// Decides every frame whether and how the kernel runs.
pub struct FrameDispatcher {
    rng: StdRng,
}

impl Default for FrameDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDispatcher {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Deterministic seeds, for tests and captures.
    pub fn with_rng_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn plan<'a, B>(
        &mut self,
        input: &FrameInput,
        kernel_ready: bool,
        scene: Option<SceneView<'a, B>>,
    ) -> FramePlan<'a, B> {
        if !input.playing && !input.scene_preview {
            return FramePlan::Skipped(SkipReason::Inactive);
        }
        if !kernel_ready {
            log::error!("Ray tracing kernel is not available, skipping frame");
            return FramePlan::Skipped(SkipReason::MissingKernel);
        }

        let seed = self.rng.gen::<f32>() * SEED_RANGE;
        let mut params = TracerParams::new(input.camera_to_world, input.camera_inverse_projection, seed);
        if let Some(view) = &scene {
            params.directional_light = view.light.to_uniform();
            params.sphere_count = view.buffers.sphere_count();
            params.mesh_count = view.buffers.mesh_count();
        }

        FramePlan::Dispatch(DispatchCommand {
            params,
            scene,
            workgroups: workgroup_count(input.width, input.height),
            width: input.width,
            height: input.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use scene::{cube_mesh, ObjectRegistry, RayMaterial, Scene, SceneAggregator, TraceableObject, Transform};
    use std::sync::Arc;
    use wgpu_utils::BufferBackend;

    use super::*;

    #[derive(Default)]
    struct CountingBackend {
        next_id: u32,
    }

    impl BufferBackend for CountingBackend {
        type Buffer = u32;

        fn create_buffer(&mut self, _label: &str, _count: usize, _stride: usize) -> u32 {
            self.next_id += 1;
            self.next_id
        }

        fn upload(&mut self, _buffer: &u32, _bytes: &[u8]) {}

        fn release(&mut self, _buffer: u32) {}
    }

    const IDENTITY: [[f32; 4]; 4] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    fn input(playing: bool, scene_preview: bool) -> FrameInput {
        FrameInput {
            playing,
            scene_preview,
            width: 1920,
            height: 1080,
            camera_to_world: IDENTITY,
            camera_inverse_projection: IDENTITY,
        }
    }

    fn no_scene() -> Option<SceneView<'static, u32>> {
        None
    }

    #[test]
    fn test_workgroup_count_rounds_up() {
        assert_eq!(workgroup_count(1920, 1080), [240, 135, 1]);
        assert_eq!(workgroup_count(1921, 1), [241, 1, 1]);
        assert_eq!(workgroup_count(7, 9), [1, 2, 1]);
    }

    #[test]
    fn test_inactive_frame_is_skipped() {
        let mut dispatcher = FrameDispatcher::with_rng_seed(1);
        let plan = dispatcher.plan(&input(false, false), true, no_scene());
        assert!(matches!(plan, FramePlan::Skipped(SkipReason::Inactive)));
    }

    #[test]
    fn test_preview_dispatches_while_paused() {
        let mut dispatcher = FrameDispatcher::with_rng_seed(1);
        let plan = dispatcher.plan(&input(false, true), true, no_scene());
        assert!(plan.command().is_some());
    }

    #[test]
    fn test_missing_kernel_is_skipped() {
        let mut dispatcher = FrameDispatcher::with_rng_seed(1);
        let plan = dispatcher.plan(&input(true, false), false, no_scene());
        assert!(matches!(plan, FramePlan::Skipped(SkipReason::MissingKernel)));
        assert!(plan.command().is_none());
    }

    #[test]
    fn test_no_scene_dispatches_environment_only() {
        let mut dispatcher = FrameDispatcher::with_rng_seed(1);
        let plan = dispatcher.plan(&input(true, false), true, no_scene());
        let command = plan.command().expect("frame should dispatch");
        assert!(command.scene.is_none());
        assert_eq!(command.workgroups, [240, 135, 1]);
        assert_eq!(command.params.directional_light, [0.0; 4]);
        assert_eq!(command.params.sphere_count, 0);
        assert_eq!(command.params.mesh_count, 0);
        assert_eq!(command.params.camera_to_world, IDENTITY);
    }

    #[test]
    fn test_scene_bindings_and_counts() {
        let mut scene = Scene::new();
        scene.sun = DirectionalLight::new(Vec3::new(0.0, -1.0, 0.0), 2.0);
        scene.spawn(TraceableObject::sphere(Vec3::ZERO, 1.0, RayMaterial::default()));
        scene.spawn(TraceableObject::sphere(Vec3::ONE, 1.0, RayMaterial::default()));
        scene.spawn(TraceableObject::mesh(Arc::new(cube_mesh()), Transform::default(), RayMaterial::default()));

        let mut backend = CountingBackend::default();
        let mut aggregator = SceneAggregator::new();
        aggregator.tick(scene.registry(), &scene, &mut backend);

        let mut dispatcher = FrameDispatcher::with_rng_seed(1);
        let view = SceneView {
            light: scene.sun,
            buffers: aggregator.snapshot(),
        };
        let plan = dispatcher.plan(&input(true, false), true, Some(view));
        let command = plan.command().expect("frame should dispatch");
        assert_eq!(command.params.sphere_count, 2);
        assert_eq!(command.params.mesh_count, 1);
        assert_eq!(command.params.directional_light, [0.0, -1.0, 0.0, 2.0]);
        let buffers = command.scene.expect("scene bindings").buffers;
        assert_eq!(buffers.indices.map(|buffer| buffer.count()), Some(36));
    }

    #[test]
    fn test_empty_scene_has_zero_counts() {
        let registry = ObjectRegistry::new();
        let scene = Scene::new();
        let mut backend = CountingBackend::default();
        let mut aggregator = SceneAggregator::new();
        aggregator.tick(&registry, &scene, &mut backend);

        let mut dispatcher = FrameDispatcher::with_rng_seed(1);
        let view = SceneView {
            light: scene.sun,
            buffers: aggregator.snapshot(),
        };
        let plan = dispatcher.plan(&input(true, false), true, Some(view));
        let command = plan.command().expect("frame should dispatch");
        assert_eq!(command.params.sphere_count, 0);
        assert!(command.scene.is_some_and(|view| view.buffers.spheres.is_none()));
    }

    #[test]
    fn test_seed_range_and_variation() {
        let mut dispatcher = FrameDispatcher::with_rng_seed(42);
        let seeds: Vec<f32> = (0..100)
            .filter_map(|_| dispatcher.plan(&input(true, false), true, no_scene()).command().map(|c| c.params.seed))
            .collect();
        assert_eq!(seeds.len(), 100);
        assert!(seeds.iter().all(|seed| (0.0..SEED_RANGE).contains(seed)));
        assert!(seeds.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_same_rng_seed_is_reproducible() {
        let mut a = FrameDispatcher::with_rng_seed(9);
        let mut b = FrameDispatcher::with_rng_seed(9);
        let seed_a = a.plan(&input(true, false), true, no_scene()).command().map(|c| c.params.seed);
        let seed_b = b.plan(&input(true, false), true, no_scene()).command().map(|c| c.params.seed);
        assert_eq!(seed_a, seed_b);
    }
}
