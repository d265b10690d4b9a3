use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::event::*;
use winit::keyboard::{Key, NamedKey};
use winit::window::Window;

use scene::{
    Camera, CameraController, Config, EnvironmentTexture, Projection, Scene, SceneAggregator, SpawnerConfig,
};
use wgpu_utils::{setup_gpu, GpuContext, WgpuBufferBackend};

use crate::dispatch::{FrameDispatcher, FrameInput, FramePlan, SceneView};
use crate::timestep::FixedTimestep;
use crate::tracer_pass::TracerPass;

const DEFAULT_CONFIG: &str = "res/scene.toml";

pub struct State {
    pub window: Arc<Window>,
    gpu: GpuContext,
    //Camera
    camera: Camera,
    projection: Projection,
    pub camera_controller: CameraController,
    pub mouse_pressed: bool,
    //Scene
    scene: Scene,
    spawner: SpawnerConfig,
    scene_enabled: bool,
    aggregator: SceneAggregator<wgpu::Buffer>,
    timestep: FixedTimestep,
    rng: StdRng,
    //Ray tracing
    dispatcher: FrameDispatcher,
    tracer: TracerPass,
    environment: EnvironmentTexture,
    pub playing: bool,
    pub scene_preview: bool,
    pub frame_limit: u32,
}

impl State {
    /// Loads the scene description, sets up the GPU and uploads the initial scene.
    ///
    /// Without `config_path` the scene is read from `res/scene.toml`.
    pub async fn new(window: Arc<Window>, config_path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = config_path.unwrap_or(DEFAULT_CONFIG);
        log::info!("Using config file: {}", config_path);
        let config = Config::new(config_path).with_context(|| format!("Failed to read config {}", config_path))?;
        let scene = Scene::from_config(&config).context("Failed to build scene")?;

        let gpu = setup_gpu(window.clone()).await?;
        log::info!("Hardware initialized");

        //-------------Camera-------------
        let camera = Camera::new(
            config.camera.position,
            cgmath::Deg(config.camera.rotation[0]),
            cgmath::Deg(config.camera.rotation[1]),
        );
        let projection = Projection::new(
            gpu.config.width,
            gpu.config.height,
            cgmath::Deg(config.camera.fov),
            config.camera.near_far[0],
            config.camera.near_far[1],
        );
        let camera_controller = CameraController::new(4.0, 1.6);

        //-------------Tracer-------------
        let environment = EnvironmentTexture::load(&gpu.device, &gpu.queue, scene.environment_path.as_deref());
        let tracer = TracerPass::new(&gpu.device, gpu.config.format, config.tracer.kernel_path.as_deref());

        // first tick so a paused preview has something to show
        let mut aggregator = SceneAggregator::new();
        aggregator.tick(
            scene.registry(),
            &scene,
            &mut WgpuBufferBackend::new(&gpu.device, &gpu.queue),
        );

        Ok(Self {
            window,
            gpu,
            camera,
            projection,
            camera_controller,
            mouse_pressed: false,
            scene,
            spawner: config.spawner.clone(),
            scene_enabled: true,
            aggregator,
            timestep: FixedTimestep::new(config.tracer.fixed_timestep),
            rng: StdRng::from_entropy(),
            dispatcher: FrameDispatcher::new(),
            tracer,
            environment,
            playing: true,
            scene_preview: config.tracer.scene_preview,
            frame_limit: config.tracer.frame_limit,
        })
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.gpu.size
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.projection.resize(new_size.width, new_size.height);
            self.gpu.size = new_size;
            self.gpu.config.width = new_size.width;
            self.gpu.config.height = new_size.height;
            self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
            self.tracer.invalidate_targets();
        }
    }

    /// Handles camera and scene controls. Returns whether the event was consumed.
    ///
    /// `P` pauses the simulation, `Tab` enables or disables the scene and a right click drops a
    /// random ball into it.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: key,
                        state,
                        ..
                    },
                ..
            } => match key {
                Key::Character(c) if c.to_lowercase() == "p" => {
                    if *state == ElementState::Pressed {
                        self.toggle_playing();
                    }
                    true
                }
                Key::Named(NamedKey::Tab) => {
                    if *state == ElementState::Pressed {
                        self.set_scene_enabled(!self.scene_enabled);
                    }
                    true
                }
                _ => self.camera_controller.process_keyboard(key, state),
            },
            WindowEvent::MouseWheel { delta, .. } => {
                self.camera_controller.process_scroll(delta);
                true
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.mouse_pressed = *state == ElementState::Pressed;
                true
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: ElementState::Pressed,
                ..
            } => {
                if self.scene_enabled {
                    self.scene.spawn_random_ball(&mut self.rng, &self.spawner);
                }
                true
            }
            _ => false,
        }
    }

    fn toggle_playing(&mut self) {
        self.playing = !self.playing;
        // a paused stretch must not turn into a burst of ticks
        self.timestep.reset();
        log::info!("Simulation {}", if self.playing { "resumed" } else { "paused" });
    }

    /// A disabled scene gives up its buffers. Frames then only trace the environment.
    fn set_scene_enabled(&mut self, enabled: bool) {
        self.scene_enabled = enabled;
        let mut backend = WgpuBufferBackend::new(&self.gpu.device, &self.gpu.queue);
        if enabled {
            self.aggregator.tick(self.scene.registry(), &self.scene, &mut backend);
        } else {
            self.aggregator.release(&mut backend);
        }
        log::info!("Scene {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Moves the camera and runs the fixed simulation ticks due for `dt`.
    pub fn update(&mut self, dt: Duration) {
        self.camera_controller.update_camera(&mut self.camera, dt);

        if !self.playing {
            return;
        }
        let ticks = self.timestep.advance(dt);
        if !self.scene_enabled {
            return;
        }
        let mut backend = WgpuBufferBackend::new(&self.gpu.device, &self.gpu.queue);
        for _ in 0..ticks {
            let report = self.aggregator.tick(self.scene.registry(), &self.scene, &mut backend);
            if report.any_allocated() {
                log::debug!("Scene buffers reallocated: {:?}", report);
            }
        }
    }

    /// Traces the frame into the surface, or shows the last result when the frame is skipped.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.gpu.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        let input = FrameInput {
            playing: self.playing,
            scene_preview: self.scene_preview,
            width: self.gpu.config.width,
            height: self.gpu.config.height,
            camera_to_world: self.camera.camera_to_world().into(),
            camera_inverse_projection: self.projection.inverse_matrix().into(),
        };
        let scene = self.scene_enabled.then(|| SceneView {
            light: self.scene.sun,
            buffers: self.aggregator.snapshot(),
        });

        match self.dispatcher.plan(&input, self.tracer.kernel_ready(), scene) {
            FramePlan::Dispatch(command) => self.tracer.encode(
                &self.gpu.device,
                &self.gpu.queue,
                &mut encoder,
                &command,
                &self.environment,
                &view,
            ),
            FramePlan::Skipped(reason) => {
                log::trace!("Frame skipped: {:?}", reason);
                self.tracer.blit(&mut encoder, &view);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
