use std::fs;

use glam::{EulerRot, Quat, Vec3};
use serde::Deserialize;

use crate::error::Result;
use crate::object::{RayMaterial, Transform};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    #[serde(default)]
    pub tracer: TracerConfig,
    #[serde(default)]
    pub sun: SunConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    #[serde(default)]
    pub spawner: SpawnerConfig,
}

impl Config {
    pub fn new(config_path: &str) -> Result<Self> {
        let toml_str = fs::read_to_string(config_path)?;
        Self::from_str(&toml_str)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)?;
        if config.objects.is_empty() {
            log::info!("No objects defined in config");
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub position: [f32; 3],
    /// Yaw and pitch in degrees.
    pub rotation: [f32; 2],
    // Near and far are only needed in edge cases, so they may be left out
    #[serde(default = "default_near_far")]
    pub near_far: [f32; 2],
    pub fov: f32,
}

fn default_near_far() -> [f32; 2] {
    [0.1, 100.0]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Keep tracing while the simulation is paused.
    pub scene_preview: bool,
    /// Seconds per simulation tick.
    pub fixed_timestep: f32,
    /// Frames per second, 0 disables the limit.
    pub frame_limit: u32,
    pub kernel_path: Option<String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            scene_preview: false,
            fixed_timestep: 0.02,
            frame_limit: 45,
            kernel_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SunConfig {
    /// Forward vector of the sun, the direction its light travels.
    pub direction: [f32; 3],
    pub intensity: f32,
}

impl Default for SunConfig {
    fn default() -> Self {
        Self {
            direction: [-0.3, -1.0, 0.5],
            intensity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Sphere,
    Mesh,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectConfig {
    pub shape: ShapeKind,
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler angles in degrees, applied Y then X then Z.
    #[serde(default)]
    pub rotation: [f32; 3],
    pub scale: Option<[f32; 3]>,
    /// Spheres only, overrides `scale`.
    pub radius: Option<f32>,
    /// "cube", "quad" or a path to an .obj file.
    pub mesh: Option<String>,
    #[serde(default = "white")]
    pub albedo: [f32; 3],
    #[serde(default = "white")]
    pub specular: [f32; 3],
    #[serde(default)]
    pub smoothness: f32,
    #[serde(default)]
    pub emission: [f32; 3],
    /// Inactive objects exist in the scene but are not traced.
    #[serde(default = "active")]
    pub active: bool,
}

fn white() -> [f32; 3] {
    [1.0; 3]
}

fn active() -> bool {
    true
}

impl ObjectConfig {
    pub fn transform(&self) -> Transform {
        let [yaw, pitch, roll] = [self.rotation[1], self.rotation[0], self.rotation[2]].map(f32::to_radians);
        let scale = match (self.shape, self.radius) {
            (ShapeKind::Sphere, Some(radius)) => Vec3::splat(radius * 2.0),
            _ => self.scale.map(Vec3::from).unwrap_or(Vec3::ONE),
        };
        Transform {
            position: Vec3::from(self.position),
            rotation: Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll),
            scale,
        }
    }

    pub fn material(&self) -> RayMaterial {
        RayMaterial::new(
            Vec3::from(self.albedo),
            Vec3::from(self.specular),
            self.smoothness.clamp(0.0, 1.0),
            Vec3::from(self.emission),
        )
    }
}

/// Bounds for balls spawned at runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    pub position_min: [f32; 3],
    pub position_max: [f32; 3],
    pub scale_min: f32,
    pub scale_max: f32,
    /// Lowest HSV value of the random colours, the highest is always 1.
    pub value_min: f32,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            position_min: [-5.0, 20.0, -5.0],
            position_max: [5.0, 25.0, 5.0],
            scale_min: 0.2,
            scale_max: 4.0,
            value_min: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SceneError;

    const CAMERA: &str = "[camera]\nposition = [0.0, 1.0, 2.0]\nrotation = [0.0, 0.0]\nnear_far = [0.1, 100.0]\nfov = 45.0\n";

    #[test]
    fn test_camera_missing() {
        let config = Config::from_str("[[objects]]\nshape = \"sphere\"\nradius = 1.0");
        assert!(matches!(config, Err(SceneError::Toml(_))));
    }

    #[test]
    fn test_camera_missing_position() {
        let config = Config::from_str("[camera]\nrotation = [0.0, 0.0]\nnear_far = [0.1, 100.0]\nfov = 45.0");
        assert!(config.is_err());
    }

    #[test]
    fn test_camera_missing_rotation() {
        let config = Config::from_str("[camera]\nposition = [0.0, 1.0, 2.0]\nnear_far = [0.1, 100.0]\nfov = 45.0");
        assert!(config.is_err());
    }

    #[test]
    fn test_camera_missing_near_far() {
        let config = Config::from_str("[camera]\nposition = [0.0, 1.0, 2.0]\nrotation = [0.0, 0.0]\nfov = 45.0");
        let config = config.expect("Could not unwrap config");
        assert_eq!(config.camera.near_far, [0.1, 100.0]);
    }

    #[test]
    fn test_camera_missing_fov() {
        let config = Config::from_str("[camera]\nposition = [0.0, 1.0, 2.0]\nrotation = [0.0, 0.0]\nnear_far = [0.1, 100.0]");
        assert!(config.is_err());
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_str(CAMERA).expect("Could not unwrap config");
        assert!(!config.tracer.scene_preview);
        assert_eq!(config.tracer.fixed_timestep, 0.02);
        assert_eq!(config.tracer.frame_limit, 45);
        assert!(config.tracer.kernel_path.is_none());
        assert_eq!(config.sun.intensity, 1.0);
        assert!(config.environment.path.is_none());
        assert!(config.objects.is_empty());
        assert_eq!(config.spawner.position_min, [-5.0, 20.0, -5.0]);
    }

    #[test]
    fn test_tracer_section() {
        let toml = format!("{CAMERA}[tracer]\nscene_preview = true\nframe_limit = 0\n");
        let config = Config::from_str(&toml).expect("Could not unwrap config");
        assert!(config.tracer.scene_preview);
        assert_eq!(config.tracer.frame_limit, 0);
        // unspecified fields keep their defaults
        assert_eq!(config.tracer.fixed_timestep, 0.02);
    }

    #[test]
    fn test_sphere_object() {
        let toml = format!(
            "{CAMERA}[[objects]]\nshape = \"sphere\"\nposition = [1.0, 2.0, 3.0]\nradius = 1.5\nalbedo = [1.0, 0.0, 0.0]\nsmoothness = 0.7\n"
        );
        let config = Config::from_str(&toml).expect("Could not unwrap config");
        assert_eq!(config.objects.len(), 1);
        let object = &config.objects[0];
        assert_eq!(object.shape, ShapeKind::Sphere);
        assert!(object.active);

        let transform = object.transform();
        assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.scale, Vec3::splat(3.0));

        let material = object.material();
        assert_eq!(material.albedo, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(material.specular, Vec3::ONE);
        assert_eq!(material.smoothness, 0.7);
        assert_eq!(material.emission, Vec3::ZERO);
    }

    #[test]
    fn test_mesh_object() {
        let toml = format!(
            "{CAMERA}[[objects]]\nshape = \"mesh\"\nmesh = \"cube\"\nscale = [2.0, 1.0, 2.0]\nrotation = [0.0, 90.0, 0.0]\nactive = false\n"
        );
        let config = Config::from_str(&toml).expect("Could not unwrap config");
        let object = &config.objects[0];
        assert_eq!(object.shape, ShapeKind::Mesh);
        assert_eq!(object.mesh.as_deref(), Some("cube"));
        assert!(!object.active);

        let transform = object.transform();
        assert_eq!(transform.scale, Vec3::new(2.0, 1.0, 2.0));
        let rotated = transform.rotation * Vec3::X;
        assert!((rotated - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_unknown_shape() {
        let toml = format!("{CAMERA}[[objects]]\nshape = \"torus\"\n");
        assert!(Config::from_str(&toml).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(Config::new("does/not/exist.toml"), Err(SceneError::Io(_))));
    }
}
