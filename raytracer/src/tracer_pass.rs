use std::borrow::Cow;

use anyhow::Context;
use wgpu_utils::{BindGroupDescriptor, BindingResourceTemplate, BufferInitDescriptor, BufferType, StructuredBuffer};

use scene::{
    EnvironmentTexture, TracerParams, INDEX_STRIDE, MESH_OBJECT_STRIDE, SPHERE_STRIDE, VERTEX_STRIDE,
};

use crate::dispatch::DispatchCommand;

const BUNDLED_KERNEL: &str = include_str!("../../res/shader/raytrace.wgsl");
const SCREEN_SHADER: &str = include_str!("../../res/shader/screen-shader.wgsl");

/// Format of the image the kernel writes.
pub const RESULT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// Stands in for a resource when only the layout of a descriptor is needed.
const UNBOUND: wgpu::BindingResource<'static> = wgpu::BindingResource::BufferArray(&[]);

/// Resources of one kernel dispatch, in binding order.
struct KernelResources<'a> {
    params: wgpu::BindingResource<'a>,
    result: wgpu::BindingResource<'a>,
    spheres: wgpu::BindingResource<'a>,
    mesh_objects: wgpu::BindingResource<'a>,
    vertices: wgpu::BindingResource<'a>,
    indices: wgpu::BindingResource<'a>,
    skybox: wgpu::BindingResource<'a>,
    sampler: wgpu::BindingResource<'a>,
}

impl KernelResources<'static> {
    fn unbound() -> Self {
        Self {
            params: UNBOUND,
            result: UNBOUND,
            spheres: UNBOUND,
            mesh_objects: UNBOUND,
            vertices: UNBOUND,
            indices: UNBOUND,
            skybox: UNBOUND,
            sampler: UNBOUND,
        }
    }
}

impl<'a> KernelResources<'a> {
    fn descriptor(self) -> BindGroupDescriptor<'a> {
        BindGroupDescriptor::new(
            Some("raytracing"),
            wgpu::ShaderStages::COMPUTE,
            vec![
                BufferType::new(BindingResourceTemplate::BufferUniform(self.params)),
                BufferType::with_view_dimension(
                    BindingResourceTemplate::StorageTexture(self.result),
                    wgpu::TextureViewDimension::D2,
                ),
                BufferType::new(BindingResourceTemplate::BufferStorage(self.spheres)),
                BufferType::new(BindingResourceTemplate::BufferStorage(self.mesh_objects)),
                BufferType::new(BindingResourceTemplate::BufferStorage(self.vertices)),
                BufferType::new(BindingResourceTemplate::BufferStorage(self.indices)),
                BufferType::with_view_dimension(
                    BindingResourceTemplate::TextureView(self.skybox),
                    wgpu::TextureViewDimension::D2,
                ),
                BufferType::new(BindingResourceTemplate::Sampler(self.sampler)),
            ],
        )
    }
}

fn blit_descriptor<'a>(result: wgpu::BindingResource<'a>, sampler: wgpu::BindingResource<'a>) -> BindGroupDescriptor<'a> {
    BindGroupDescriptor::new(
        Some("screen_transfer"),
        wgpu::ShaderStages::FRAGMENT,
        vec![
            BufferType::new(BindingResourceTemplate::Sampler(sampler)),
            BufferType::with_view_dimension(BindingResourceTemplate::TextureView(result), wgpu::TextureViewDimension::D2),
        ],
    )
}

/// One-element buffers bound in place of scene buffers that do not exist.
struct Placeholders {
    spheres: wgpu::Buffer,
    mesh_objects: wgpu::Buffer,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
}

impl Placeholders {
    fn new(device: &wgpu::Device) -> Self {
        let descriptor = BufferInitDescriptor::new(Some("Placeholder Buffer"), wgpu::BufferUsages::STORAGE);
        Self {
            spheres: descriptor.create_new_buffer(device, &[0u8; SPHERE_STRIDE]),
            mesh_objects: descriptor.create_new_buffer(device, &[0u8; MESH_OBJECT_STRIDE]),
            vertices: descriptor.create_new_buffer(device, &[0u8; VERTEX_STRIDE]),
            indices: descriptor.create_new_buffer(device, &[0u8; INDEX_STRIDE]),
        }
    }
}

/// The storage texture the kernel writes, plus the bind group that shows it on screen.
struct ResultTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    blit_bind_group: wgpu::BindGroup,
}

/// Runs the ray tracing kernel and copies its result onto the frame.
pub struct TracerPass {
    kernel: Option<wgpu::ComputePipeline>,
    kernel_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    placeholders: Placeholders,
    target: Option<ResultTarget>,
    blit_pipeline: wgpu::RenderPipeline,
    blit_layout: wgpu::BindGroupLayout,
    blit_sampler: wgpu::Sampler,
}

impl TracerPass {
    /// Builds the pass. A kernel that fails to load or compile is logged and leaves the pass
    /// without a kernel, every frame is then skipped.
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, kernel_path: Option<&str>) -> Self {
        let kernel_layout = KernelResources::unbound().descriptor().create_layout(device);

        let kernel = match kernel_source(kernel_path) {
            Ok(source) => compile_kernel(device, &kernel_layout, source),
            Err(e) => {
                log::error!("{:#}", e);
                None
            }
        };

        let params_buffer = BufferInitDescriptor::new(
            Some("Tracer Params Buffer"),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )
        .create_new_buffer(device, &[TracerParams::new([[0.0; 4]; 4], [[0.0; 4]; 4], 0.0)]);

        let blit_layout = blit_descriptor(UNBOUND, UNBOUND).create_layout(device);
        let blit_pipeline = create_blit_pipeline(device, &blit_layout, surface_format);
        let blit_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Screen Transfer Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            kernel,
            kernel_layout,
            params_buffer,
            placeholders: Placeholders::new(device),
            target: None,
            blit_pipeline,
            blit_layout,
            blit_sampler,
        }
    }

    pub fn kernel_ready(&self) -> bool {
        self.kernel.is_some()
    }

    /// Drops the result texture. The next dispatch recreates it at the new size.
    pub fn invalidate_targets(&mut self) {
        self.target = None;
    }

    /// Records the kernel dispatch described by `command` followed by the blit onto `output`.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        command: &DispatchCommand<'_, wgpu::Buffer>,
        environment: &EnvironmentTexture,
        output: &wgpu::TextureView,
    ) {
        let Some(kernel) = &self.kernel else {
            return;
        };

        let target = ensure_target(
            &mut self.target,
            device,
            &self.blit_layout,
            &self.blit_sampler,
            command.width,
            command.height,
        );

        queue.write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[command.params]));

        let buffers = command.scene.map(|view| view.buffers);
        let bind_group = KernelResources {
            params: self.params_buffer.as_entire_binding(),
            result: wgpu::BindingResource::TextureView(&target.view),
            spheres: buffer_or(buffers.and_then(|b| b.spheres), &self.placeholders.spheres),
            mesh_objects: buffer_or(buffers.and_then(|b| b.mesh_objects), &self.placeholders.mesh_objects),
            vertices: buffer_or(buffers.and_then(|b| b.vertices), &self.placeholders.vertices),
            indices: buffer_or(buffers.and_then(|b| b.indices), &self.placeholders.indices),
            skybox: wgpu::BindingResource::TextureView(&environment.view),
            sampler: wgpu::BindingResource::Sampler(&environment.sampler),
        }
        .descriptor()
        .bind(device, &self.kernel_layout);

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Ray Tracing Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(kernel);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            let [x, y, z] = command.workgroups;
            compute_pass.dispatch_workgroups(x, y, z);
        }

        self.blit(encoder, output);
    }

    /// Copies the last result onto `output` with a fullscreen triangle, or clears it when
    /// nothing has been traced yet.
    pub fn blit(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Screen Transfer Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        if let Some(target) = &self.target {
            render_pass.set_pipeline(&self.blit_pipeline);
            render_pass.set_bind_group(0, &target.blit_bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
    }
}

fn buffer_or<'a>(
    slot: Option<&'a StructuredBuffer<wgpu::Buffer>>,
    placeholder: &'a wgpu::Buffer,
) -> wgpu::BindingResource<'a> {
    slot.map_or(placeholder, StructuredBuffer::raw).as_entire_binding()
}

fn ensure_target<'t>(
    slot: &'t mut Option<ResultTarget>,
    device: &wgpu::Device,
    blit_layout: &wgpu::BindGroupLayout,
    blit_sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> &'t ResultTarget {
    if let Some(target) = slot.as_ref() {
        if target.width != width || target.height != height {
            log::debug!(
                "Result target is {}x{} but the frame is {}x{}, recreating",
                target.width,
                target.height,
                width,
                height
            );
            *slot = None;
        }
    }

    slot.get_or_insert_with(|| {
        log::debug!("Creating {}x{} result target", width, height);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Ray Tracing Result"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RESULT_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let blit_bind_group = blit_descriptor(
            wgpu::BindingResource::TextureView(&view),
            wgpu::BindingResource::Sampler(blit_sampler),
        )
        .bind(device, blit_layout);

        ResultTarget {
            _texture: texture,
            view,
            width,
            height,
            blit_bind_group,
        }
    })
}

fn kernel_source(kernel_path: Option<&str>) -> anyhow::Result<Cow<'static, str>> {
    match kernel_path {
        Some(path) => {
            let source = std::fs::read_to_string(path).with_context(|| format!("Could not read kernel {}", path))?;
            log::info!("Using kernel {}", path);
            Ok(Cow::Owned(source))
        }
        None => Ok(Cow::Borrowed(BUNDLED_KERNEL)),
    }
}

/// Compiles the kernel inside an error scope so a broken shader is reported instead of
/// poisoning the device.
fn compile_kernel(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    source: Cow<'static, str>,
) -> Option<wgpu::ComputePipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Ray Tracing Kernel"),
        source: wgpu::ShaderSource::Wgsl(source),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Ray Tracing Pipeline Layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Ray Tracing Pipeline"),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: "main",
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => {
            log::error!("Ray tracing kernel failed to compile: {}", error);
            None
        }
        None => {
            log::info!("Ray tracing kernel ready");
            Some(pipeline)
        }
    }
}

fn create_blit_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let screen_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Screen Transfer Shader"),
        source: wgpu::ShaderSource::Wgsl(SCREEN_SHADER.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Screen Transfer Pipeline Layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Screen Transfer Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &screen_shader,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &screen_shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_layout_matches_shader_bindings() {
        let entries = KernelResources::unbound().descriptor().layout_entries();
        assert_eq!(entries.len(), 8);
        assert!(matches!(
            entries[0].ty,
            wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, .. }
        ));
        assert!(matches!(
            entries[1].ty,
            wgpu::BindingType::StorageTexture { format: RESULT_FORMAT, .. }
        ));
        for entry in &entries[2..6] {
            assert!(matches!(
                entry.ty,
                wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Storage { read_only: true }, .. }
            ));
        }
        assert!(matches!(entries[6].ty, wgpu::BindingType::Texture { .. }));
        assert!(matches!(entries[7].ty, wgpu::BindingType::Sampler(_)));
        assert!(entries.iter().all(|entry| entry.visibility == wgpu::ShaderStages::COMPUTE));
    }

    #[test]
    fn test_bundled_kernel_declares_contract() {
        for name in ["_CameraToWorld", "_CameraInverseProjection", "_DirectionalLight", "_Seed", "Result", "_Spheres", "_MeshObjects", "_Vertices", "_Indices", "_SkyboxTexture"] {
            assert!(BUNDLED_KERNEL.contains(name), "kernel is missing {}", name);
        }
        assert!(BUNDLED_KERNEL.contains("@workgroup_size(8, 8, 1)"));
    }

    #[test]
    fn test_missing_kernel_file() {
        assert!(kernel_source(Some("does/not/exist.wgsl")).is_err());
        assert!(matches!(kernel_source(None), Ok(Cow::Borrowed(_))));
    }
}
