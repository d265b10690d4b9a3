use cgmath::*;
use std::time::Duration;
use winit::dpi::PhysicalPosition;
use winit::event::*;
use winit::keyboard::{Key, NamedKey};

/// Represents a camera in 3D space.
///
/// The camera looks down its local -Z axis with +Y up. `rotation` maps camera space to world space.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Point3<f32>,
    pub rotation: Quaternion<f32>,
}

impl Camera {
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(position: V, yaw: Y, pitch: P) -> Self {
        let rotation = Quaternion::from_angle_y(yaw) * Quaternion::from_angle_x(pitch);
        log::debug!("Camera initial rotation quaternion = {:?}", rotation);
        Self {
            position: position.into(),
            rotation,
        }
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.rotation.rotate_vector(-Vector3::unit_z())
    }

    /// World transform of the camera, translation times rotation.
    pub fn camera_to_world(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position.to_vec()) * Matrix4::from(self.rotation)
    }

    /// View matrix, the inverse of [`Camera::camera_to_world`].
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
    }
}

/// Represents a projection of a 3D scene onto the 2D plane of the camera.
///
/// The projection is defined by an aspect ratio, a field of view, and near and far clipping planes.
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    /// Maps clip space back to camera space. A degenerate projection yields the identity.
    pub fn inverse_matrix(&self) -> Matrix4<f32> {
        self.calc_matrix().invert().unwrap_or_else(|| {
            log::warn!("Projection matrix is not invertible, falling back to identity");
            Matrix4::identity()
        })
    }
}

/// Controls the movement and rotation of a camera.
///
/// The controller keeps track of the amount of movement in each direction and the pending rotation.
/// `speed` is in units per second and `sensitivity` scales mouse deltas.
#[derive(Debug)]
pub struct CameraController {
    amount_left: f32,
    amount_right: f32,
    amount_forward: f32,
    amount_backward: f32,
    amount_up: f32,
    amount_down: f32,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    scroll: f32,
    speed: f32,
    sensitivity: f32,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            amount_left: 0.0,
            amount_right: 0.0,
            amount_forward: 0.0,
            amount_backward: 0.0,
            amount_up: 0.0,
            amount_down: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            scroll: 0.0,
            speed,
            sensitivity,
        }
    }

    pub fn process_keyboard(&mut self, key: &Key, state: &ElementState) -> bool {
        let amount = if state == &ElementState::Pressed { 1.0 } else { 0.0 };
        match key {
            Key::Character(c) if c.to_lowercase() == "w" => {
                self.amount_forward = amount;
                true
            }
            Key::Character(c) if c.to_lowercase() == "s" => {
                self.amount_backward = amount;
                true
            }
            Key::Character(c) if c.to_lowercase() == "a" => {
                self.amount_left = amount;
                true
            }
            Key::Character(c) if c.to_lowercase() == "d" => {
                self.amount_right = amount;
                true
            }
            Key::Named(NamedKey::ArrowUp) => {
                self.amount_forward = amount;
                true
            }
            Key::Named(NamedKey::ArrowDown) => {
                self.amount_backward = amount;
                true
            }
            Key::Named(NamedKey::ArrowLeft) => {
                self.amount_left = amount;
                true
            }
            Key::Named(NamedKey::ArrowRight) => {
                self.amount_right = amount;
                true
            }
            Key::Named(NamedKey::Space) => {
                self.amount_up = amount;
                true
            }
            Key::Named(NamedKey::Shift) => {
                self.amount_down = amount;
                true
            }
            _ => false,
        }
    }

    pub fn process_mouse(&mut self, mouse_dx: f64, mouse_dy: f64) {
        self.rotate_horizontal = -mouse_dx as f32;
        self.rotate_vertical = mouse_dy as f32;
    }

    /// Scrolling moves the camera along its forward axis.
    pub fn process_scroll(&mut self, delta: &MouseScrollDelta) {
        self.scroll = match delta {
            // a line is roughly 100 pixels
            MouseScrollDelta::LineDelta(_, scroll) => scroll * 0.5,
            MouseScrollDelta::PixelDelta(PhysicalPosition { y: scroll, .. }) => *scroll as f32 * 0.005,
        };
    }

    pub fn update_camera(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();

        let forward = camera.forward().normalize();
        let right = camera.rotation.rotate_vector(Vector3::unit_x()).normalize();
        camera.position += forward * (self.amount_forward - self.amount_backward) * self.speed * dt;
        camera.position += right * (self.amount_right - self.amount_left) * self.speed * dt;
        camera.position += forward * self.scroll * self.speed * 0.1;

        camera.position.y += (self.amount_up - self.amount_down) * self.speed * dt;

        // yaw around world up, pitch around the camera's own x axis
        let pitch = Quaternion::from_axis_angle(Vector3::unit_x(), Rad(-self.rotate_vertical) * self.sensitivity * dt);
        let yaw = Quaternion::from_axis_angle(Vector3::unit_y(), Rad(self.rotate_horizontal) * self.sensitivity * dt);
        camera.rotation = (yaw * camera.rotation * pitch).normalize();

        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;
        self.scroll = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_camera_looks_down_negative_z() {
        let camera = Camera::new((0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        assert_close(camera.forward(), Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_camera_to_world_moves_origin_to_position() {
        let camera = Camera::new((1.0, 2.0, 3.0), Deg(90.0), Deg(0.0));
        let origin = camera.camera_to_world() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_close(origin.truncate(), Vector3::new(1.0, 2.0, 3.0));

        // yaw of 90 degrees turns the view towards -X
        let forward = camera.camera_to_world() * Vector4::new(0.0, 0.0, -1.0, 0.0);
        assert_close(forward.truncate(), Vector3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_view_is_inverse_of_camera_to_world() {
        let camera = Camera::new((1.0, -2.0, 0.5), Deg(30.0), Deg(-10.0));
        let product = camera.calc_matrix() * camera.camera_to_world();
        let point = product * Vector4::new(0.3, 0.2, 0.1, 1.0);
        assert_close(point.truncate(), Vector3::new(0.3, 0.2, 0.1));
    }

    #[test]
    fn test_projection_inverse() {
        let projection = Projection::new(800, 600, Deg(45.0), 0.1, 100.0);
        let product = projection.calc_matrix() * projection.inverse_matrix();
        let point = product * Vector4::new(0.5, -0.5, 0.25, 1.0);
        assert!((point - Vector4::new(0.5, -0.5, 0.25, 1.0)).magnitude() < 1e-4);
    }

    #[test]
    fn test_controller_moves_forward() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        let mut controller = CameraController::new(2.0, 1.0);
        assert!(controller.process_keyboard(&Key::Character("w".into()), &ElementState::Pressed));
        controller.update_camera(&mut camera, Duration::from_secs(1));
        assert_close(camera.position.to_vec(), Vector3::new(0.0, 0.0, -2.0));
    }
}
