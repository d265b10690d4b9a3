use thiserror::Error;

/// Errors raised while loading a scene description or its assets.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Could not find/read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Object {index} is a mesh but names no mesh")]
    MissingMesh { index: usize },
    #[error("Unknown mesh '{0}'. Use \"cube\", \"quad\" or a path to an .obj file")]
    UnknownMesh(String),
    #[error("Failed to load obj file: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("Unsupported file format for background image. Supported formats are: .hdr, .exr")]
    UnsupportedImage,
    #[error("Failed to decode image: {0}")]
    Image(String),
    #[error("Failed to read exr file: {0}")]
    Exr(#[from] exr::error::Error),
}

pub type Result<T, E = SceneError> = std::result::Result<T, E>;
