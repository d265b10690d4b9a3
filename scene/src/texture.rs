use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use wgpu::{Device, Queue, Texture, TextureDimension, TextureFormat};

use crate::models::load_hdr;

/// Colour of the 1x1 stand-in used when no environment image is configured.
const FALLBACK_SKY: [u8; 4] = [140, 170, 210, 255];

/// The equirectangular environment sampled by rays that leave the scene.
pub struct EnvironmentTexture {
    pub texture: Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl EnvironmentTexture {
    pub fn from_image(device: &Device, queue: &Queue, image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        let texture = create_texture(device, width, height);
        write_texture(queue, &texture, image);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Skybox Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self { texture, view, sampler }
    }

    pub fn fallback(device: &Device, queue: &Queue) -> Self {
        Self::from_image(device, queue, &fallback_image())
    }

    /// Loads the image at `path`. Any failure is logged and replaced by the fallback.
    pub fn load(device: &Device, queue: &Queue, path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Self::fallback(device, queue);
        };
        match load_hdr(path) {
            Ok(image) => {
                log::info!("Loaded environment {} ({}x{})", path, image.width(), image.height());
                Self::from_image(device, queue, &image)
            }
            Err(e) => {
                log::error!("Failed to load environment {}: {}", path, e);
                Self::fallback(device, queue)
            }
        }
    }
}

pub fn fallback_image() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba(FALLBACK_SKY)))
}

pub fn create_texture(device: &Device, width: u32, height: u32) -> Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Skybox Texture"),
        view_formats: &[],
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
    })
}

fn write_texture(queue: &Queue, texture: &Texture, image: &DynamicImage) {
    let (width, height) = image.dimensions();
    let bytes_per_pixel = 4; // Rgba8Unorm
    let data = image.to_rgba8().into_raw();

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_pixel),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
