use std::sync::Arc;

use winit::{event::*, event_loop::{ControlFlow, EventLoop}, keyboard::{Key, NamedKey}};

pub mod dispatch;
pub mod state;
pub mod timestep;
pub mod tracer_pass;

use crate::state::State;

/// Starts the application.
///
/// Initializes the logger, opens the window and runs the event loop until the window is closed.
/// `config_path` names the scene description, `res/scene.toml` when `None`.
///
/// Controls: WASD/arrows, space and shift move, dragging with the left mouse button looks around,
/// the wheel dollies, `P` pauses, `Tab` toggles the scene, a right click spawns a ball and `Escape` quits.
///
/// # Errors
///
/// Fails when the window or GPU cannot be set up or the scene description cannot be loaded.
pub async fn run(config_path: Option<String>) -> anyhow::Result<()> {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Info)?;
        } else {
            env_logger::init();
        }
    }

    let event_loop = EventLoop::new()?;
    let title = env!("CARGO_PKG_NAME");
    let window = winit::window::WindowBuilder::new()
        .with_title(title)
        .with_inner_size(winit::dpi::LogicalSize::new(1200.0, 800.0))
        .build(&event_loop)?;
    let window = Arc::new(window);

    // ControlFlow::Poll continuously runs the event loop,
    // even if the OS hasn't dispatched any events.
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut state = State::new(window, config_path.as_deref()).await?;
    let mut last_render_time = instant::Instant::now();

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            ref event,
            window_id,
        } if window_id == state.window.id() && !state.input(event) => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => elwt.exit(),
            WindowEvent::RedrawRequested => {
                let now = instant::Instant::now();
                let dt = now - last_render_time;
                last_render_time = now;
                state.update(dt);
                match state.render() {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => state.resize(state.size()),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory, exiting");
                        elwt.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => log::warn!("Surface timeout"),
                }
            }
            WindowEvent::Resized(physical_size) => state.resize(*physical_size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::debug!("Window={window_id:?} changed scale to {scale_factor}");
            }
            _ => {}
        },
        Event::DeviceEvent {
            event: DeviceEvent::MouseMotion { delta },
            ..
        } => {
            if state.mouse_pressed {
                state.camera_controller.process_mouse(delta.0, delta.1)
            }
        }
        // Request a redraw before the system goes to idle
        Event::AboutToWait => {
            if state.frame_limit != 0 {
                let frame_budget = std::time::Duration::from_secs_f32(1.0 / state.frame_limit as f32);
                let frame_time = instant::Instant::now() - last_render_time;
                if frame_time < frame_budget {
                    std::thread::sleep(frame_budget - frame_time);
                }
            }
            state.window.request_redraw();
        }
        _ => (),
    })?;

    Ok(())
}
