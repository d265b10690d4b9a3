use std::io::BufRead;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, Rgba};

use crate::error::{Result, SceneError};
use crate::object::Mesh;

fn obj_load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Unit cube centred on the origin. 8 shared corners, 12 triangles.
pub fn cube_mesh() -> Mesh {
    let vertices = vec![
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 0, 3, 2, // back
        4, 5, 6, 4, 6, 7, // front
        0, 4, 7, 0, 7, 3, // left
        1, 2, 6, 1, 6, 5, // right
        3, 7, 6, 3, 6, 2, // top
        0, 1, 5, 0, 5, 4, // bottom
    ];
    Mesh::new(vertices, indices)
}

/// Unit quad in the XZ plane facing +Y.
pub fn quad_mesh() -> Mesh {
    let vertices = vec![[-0.5, 0.0, -0.5], [0.5, 0.0, -0.5], [0.5, 0.0, 0.5], [-0.5, 0.0, 0.5]];
    Mesh::new(vertices, vec![0, 2, 1, 0, 3, 2])
}

/// Resolves the `mesh` field of an object: a builtin name or a path to an .obj file.
pub fn resolve_mesh(name: &str) -> Result<Mesh> {
    match name {
        "cube" => Ok(cube_mesh()),
        "quad" => Ok(quad_mesh()),
        path if path.ends_with(".obj") => load_obj(path),
        other => Err(SceneError::UnknownMesh(other.to_string())),
    }
}

/// Loads every model in an .obj file into one triangle mesh. Faces with more than three
/// corners are triangulated.
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let (models, _materials) = tobj::load_obj(path.as_ref(), &obj_load_options())?;
    let mesh = merge_models(&models);
    log::info!(
        "Loaded {:?}: {} vertices, {} triangles",
        path.as_ref(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Same as [`load_obj`] but reads the file contents from `reader`. Material libraries are ignored.
pub fn load_obj_from_reader<R: BufRead>(reader: &mut R) -> Result<Mesh> {
    let (models, _materials) = tobj::load_obj_buf(reader, &obj_load_options(), |_| Err(tobj::LoadError::OpenFileFailed))?;
    Ok(merge_models(&models))
}

fn merge_models(models: &[tobj::Model]) -> Mesh {
    let mut vertices: Vec<[f32; 3]> = Vec::new();
    let mut indices = Vec::new();
    for model in models {
        let first_vertex = vertices.len() as u32;
        vertices.extend(model.mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
        indices.extend(model.mesh.indices.iter().map(|index| index + first_vertex));
    }
    Mesh::new(vertices, indices)
}

/// Loads an equirectangular environment image. Supported formats are .hdr and .exr.
pub fn load_hdr<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("hdr") => load_hdri(path),
        Some("exr") => load_exr(path),
        _ => Err(SceneError::UnsupportedImage),
    }
}

pub fn load_hdri(path: &Path) -> Result<DynamicImage> {
    let contents = std::fs::read(path)?;
    let mut decoder = zune_hdr::HdrDecoder::new(contents);
    let pix: Vec<f32> = decoder.decode().map_err(|e| SceneError::Image(format!("{:?}", e)))?;
    let (width, height) = decoder
        .get_dimensions()
        .ok_or_else(|| SceneError::Image("hdr image has no dimensions".to_string()))?;

    if pix.len() < width * height * 3 {
        return Err(SceneError::Image(format!("hdr image holds {} floats, expected {}", pix.len(), width * height * 3)));
    }

    let image = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_fn(width as u32, height as u32, |x, y| {
        let index = (y as usize * width + x as usize) * 3;
        Rgba([to_byte(pix[index]), to_byte(pix[index + 1]), to_byte(pix[index + 2]), 255])
    });
    Ok(DynamicImage::ImageRgba8(image))
}

pub fn load_exr(path: &Path) -> Result<DynamicImage> {
    use exr::prelude::*;

    let image: Image<Layer<SpecificChannels<::image::RgbaImage, RgbaChannels>>> = read()
        .no_deep_data()
        .largest_resolution_level()
        .rgba_channels(
            |resolution, _channels: &RgbaChannels| -> ::image::RgbaImage {
                ::image::ImageBuffer::new(resolution.width() as u32, resolution.height() as u32)
            },
            |pixels, position, (r, g, b, a): (f32, f32, f32, f32)| {
                pixels.put_pixel(
                    position.x() as u32,
                    position.y() as u32,
                    ::image::Rgba([tone_map(r), tone_map(g), tone_map(b), to_byte(a)]),
                );
            },
        )
        .first_valid_layer()
        .all_attributes()
        .from_file(path)?;

    Ok(DynamicImage::ImageRgba8(image.layer_data.channel_data.pixels))
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

/// Compresses any f32 into [0,1] before quantizing.
fn tone_map(linear: f32) -> u8 {
    let clamped = (linear - 0.5).tanh() * 0.5 + 0.5;
    to_byte(clamped)
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor};

    use super::*;

    #[test]
    fn test_cube_counts() {
        let cube = cube_mesh();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|index| *index < 8));
    }

    #[test]
    fn test_quad_counts() {
        let quad = quad_mesh();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.triangle_count(), 2);
    }

    #[test]
    fn test_resolve_builtin_meshes() {
        assert_eq!(resolve_mesh("cube").expect("cube").triangle_count(), 12);
        assert_eq!(resolve_mesh("quad").expect("quad").triangle_count(), 2);
        assert!(matches!(resolve_mesh("teapot"), Err(SceneError::UnknownMesh(name)) if name == "teapot"));
    }

    #[test]
    fn test_load_obj_triangle() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_reader(&mut BufReader::new(Cursor::new(obj))).expect("Failed to load obj");
        assert_eq!(mesh.vertices, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_load_obj_quads_are_triangulated() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = load_obj_from_reader(&mut BufReader::new(Cursor::new(obj))).expect("Failed to load obj");
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_load_obj_merges_objects() {
        let obj = "o a\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\no b\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n";
        let mesh = load_obj_from_reader(&mut BufReader::new(Cursor::new(obj))).expect("Failed to load obj");
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_load_obj_missing_file() {
        assert!(load_obj("does/not/exist.obj").is_err());
    }

    #[test]
    fn test_load_hdr_wrong_extension() {
        let error = load_hdr("image.png").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unsupported file format for background image. Supported formats are: .hdr, .exr"
        );
    }

    #[test]
    fn test_load_hdr_missing_file() {
        assert!(matches!(load_hdr("does/not/exist.hdr"), Err(SceneError::Io(_))));
    }

    #[test]
    fn test_tone_map_range() {
        assert_eq!(tone_map(-100.0), 0);
        assert_eq!(tone_map(100.0), 255);
        assert_eq!(to_byte(2.0), 255);
    }
}
