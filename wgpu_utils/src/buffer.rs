use bytemuck::Pod;
use wgpu::util::DeviceExt;

/// A struct representing the initial descriptor for a buffer.
///
/// This struct is used to create a new buffer with specified label and usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferInitDescriptor<'a> {
    /// Debug label of a buffer. This will show up in graphics debuggers for easy identification.
    pub label: wgpu::Label<'a>,
    /// Usages of a buffer. If the buffer is used in any way that isn't specified here, the operation
    /// will panic.
    pub usage: wgpu::BufferUsages,
}

impl<'a> BufferInitDescriptor<'a> {
    pub fn new(label: wgpu::Label<'a>, usage: wgpu::BufferUsages) -> Self {
        Self { label, usage }
    }

    /// Creates a buffer initialised with `data`.
    pub fn create_new_buffer<T: Pod>(&self, device: &wgpu::Device, data: &[T]) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: self.label,
            contents: bytemuck::cast_slice(data),
            usage: self.usage,
        })
    }
}

//-----------Structured buffers-----------------

/// Allocation seam between the buffer reconciliation logic and the device.
///
/// The production implementation is [`WgpuBufferBackend`]. Keeping the policy generic over
/// this trait lets it run (and be tested) without an adapter.
pub trait BufferBackend {
    type Buffer;

    /// Allocates storage for `count` elements of `stride` bytes each.
    fn create_buffer(&mut self, label: &str, count: usize, stride: usize) -> Self::Buffer;
    /// Overwrites the whole buffer with `bytes`.
    fn upload(&mut self, buffer: &Self::Buffer, bytes: &[u8]);
    /// Frees the backing allocation.
    fn release(&mut self, buffer: Self::Buffer);
}

/// A GPU allocation together with the shape it was created for.
#[derive(Debug)]
pub struct StructuredBuffer<B> {
    raw: B,
    count: usize,
    stride: usize,
}

impl<B> StructuredBuffer<B> {
    pub fn raw(&self) -> &B {
        &self.raw
    }

    /// Number of elements the allocation holds.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Size of one element in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn byte_size(&self) -> u64 {
        (self.count * self.stride) as u64
    }
}

/// What [`reconcile_buffer`] did to a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferChange {
    /// No data and no allocation, slot stays absent.
    Empty,
    /// An allocation existed but the new data is empty.
    Released,
    /// No allocation existed, a new one was created and filled.
    Created,
    /// The old allocation had the wrong shape and was replaced.
    Recreated,
    /// Same shape, the allocation was reused and re-uploaded.
    Reused,
}

impl BufferChange {
    pub fn allocated(self) -> bool {
        matches!(self, BufferChange::Created | BufferChange::Recreated)
    }
}

/// Brings `slot` in line with `data`.
///
/// An existing allocation is released when the data is empty, or when its element count or
/// stride no longer matches. Non-empty data is then uploaded, creating an allocation first if
/// the slot is empty. A slot is therefore only reallocated when its shape changes.
pub fn reconcile_buffer<A, T>(
    backend: &mut A,
    slot: &mut Option<StructuredBuffer<A::Buffer>>,
    label: &str,
    data: &[T],
    stride: usize,
) -> BufferChange
where
    A: BufferBackend,
    T: Pod,
{
    debug_assert_eq!(std::mem::size_of::<T>(), stride, "{label}: element size does not match stride");

    let mut released = false;
    if let Some(existing) = slot.as_ref() {
        if data.is_empty() || existing.count != data.len() || existing.stride != stride {
            if let Some(existing) = slot.take() {
                backend.release(existing.raw);
            }
            released = true;
        }
    }

    if data.is_empty() {
        return if released { BufferChange::Released } else { BufferChange::Empty };
    }

    let change = match slot {
        Some(_) => BufferChange::Reused,
        None => {
            log::debug!("{label}: allocating {} x {} bytes", data.len(), stride);
            *slot = Some(StructuredBuffer {
                raw: backend.create_buffer(label, data.len(), stride),
                count: data.len(),
                stride,
            });
            if released { BufferChange::Recreated } else { BufferChange::Created }
        }
    };

    if let Some(buffer) = slot.as_ref() {
        backend.upload(&buffer.raw, bytemuck::cast_slice(data));
    }
    change
}

/// Releases whatever `slot` holds.
pub fn release_buffer<A: BufferBackend>(backend: &mut A, slot: &mut Option<StructuredBuffer<A::Buffer>>) {
    if let Some(buffer) = slot.take() {
        backend.release(buffer.raw);
    }
}

/// [`BufferBackend`] that allocates read-only storage buffers on a wgpu device.
pub struct WgpuBufferBackend<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl<'a> WgpuBufferBackend<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

impl BufferBackend for WgpuBufferBackend<'_> {
    type Buffer = wgpu::Buffer;

    fn create_buffer(&mut self, label: &str, count: usize, stride: usize) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (count * stride) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn upload(&mut self, buffer: &wgpu::Buffer, bytes: &[u8]) {
        self.queue.write_buffer(buffer, 0, bytes);
    }

    fn release(&mut self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }
}

//-----------Bind groups-----------------

/// An enum representing the template for a binding resource.
/// This shortens the amount of code needed to create a bind group layout and bind group.
#[derive(Clone, Debug)]
pub enum BindingResourceTemplate<'a> {
    BufferStorage(wgpu::BindingResource<'a>),
    BufferUniform(wgpu::BindingResource<'a>),
    StorageTexture(wgpu::BindingResource<'a>),
    TextureView(wgpu::BindingResource<'a>),
    Sampler(wgpu::BindingResource<'a>),
}

impl<'a> BindingResourceTemplate<'a> {
    fn resource(&self) -> wgpu::BindingResource<'a> {
        match self {
            BindingResourceTemplate::BufferStorage(resource)
            | BindingResourceTemplate::BufferUniform(resource)
            | BindingResourceTemplate::StorageTexture(resource)
            | BindingResourceTemplate::TextureView(resource)
            | BindingResourceTemplate::Sampler(resource) => resource.clone(),
        }
    }
}

impl PartialEq for BindingResourceTemplate<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A struct representing a type of buffer.
/// This enables the user to specify the type of buffer and the view dimension in a compact way.
/// This struct can be picked apart to create a bind group layout and bind group.
pub struct BufferType<'a> {
    ty: BindingResourceTemplate<'a>,
    view_dimension: Option<wgpu::TextureViewDimension>,
}

impl<'a> BufferType<'a> {
    pub fn new(ty: BindingResourceTemplate<'a>) -> Self {
        Self { ty, view_dimension: None }
    }

    /// Only texture views and storage textures carry a view dimension, it is ignored for
    /// every other binding kind.
    pub fn with_view_dimension(ty: BindingResourceTemplate<'a>, view_dimension: wgpu::TextureViewDimension) -> Self {
        match ty {
            BindingResourceTemplate::TextureView(_) | BindingResourceTemplate::StorageTexture(_) => {
                Self { ty, view_dimension: Some(view_dimension) }
            }
            _ => {
                log::warn!("view dimension ignored for non-texture binding");
                Self { ty, view_dimension: None }
            }
        }
    }

    fn layout_entry(&self, binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
        let view_dimension = self.view_dimension.unwrap_or(wgpu::TextureViewDimension::D2);
        let ty = match &self.ty {
            BindingResourceTemplate::BufferStorage(_) => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingResourceTemplate::BufferUniform(_) => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingResourceTemplate::StorageTexture(_) => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::Rgba8Unorm,
                view_dimension,
            },
            BindingResourceTemplate::TextureView(_) => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension,
                multisampled: false,
            },
            BindingResourceTemplate::Sampler(_) => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        };
        wgpu::BindGroupLayoutEntry { binding, visibility, ty, count: None }
    }
}

/// A struct representing a descriptor for a bind group.
/// Bindings are numbered in the order they are given.
pub struct BindGroupDescriptor<'a> {
    pub label: wgpu::Label<'a>,
    pub vis: wgpu::ShaderStages,
    pub bindings: Vec<BufferType<'a>>,
}

impl<'a> BindGroupDescriptor<'a> {
    pub fn new(label: wgpu::Label<'a>, vis: wgpu::ShaderStages, bindings: Vec<BufferType<'a>>) -> Self {
        Self { label, vis, bindings }
    }

    /// Creates the bind group layout. Only the binding kinds are read, not the resources.
    pub fn create_layout(&self, device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let label = self.label.map(|label| format!("{}_bind_group_layout", label));
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: label.as_deref(),
            entries: &self.layout_entries(),
        })
    }

    /// Binds this descriptor's resources against a layout created earlier.
    ///
    /// Used when the resources change every frame but the pipeline layout must stay the same.
    pub fn bind(&self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> wgpu::BindGroup {
        let entries = self
            .bindings
            .iter()
            .enumerate()
            .map(|(index, binding)| wgpu::BindGroupEntry {
                binding: index as u32,
                resource: binding.ty.resource(),
            })
            .collect::<Vec<_>>();

        let label = self.label.map(|label| format!("{}_bind_group", label));
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: label.as_deref(),
            layout,
            entries: &entries,
        })
    }

    pub fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(index, binding)| binding.layout_entry(index as u32, self.vis))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out sequential ids and records every call.
    #[derive(Default)]
    struct RecordingBackend {
        next_id: u32,
        created: Vec<(u32, usize, usize)>,
        released: Vec<u32>,
        uploads: Vec<(u32, Vec<u8>)>,
    }

    impl BufferBackend for RecordingBackend {
        type Buffer = u32;

        fn create_buffer(&mut self, _label: &str, count: usize, stride: usize) -> u32 {
            self.next_id += 1;
            self.created.push((self.next_id, count, stride));
            self.next_id
        }

        fn upload(&mut self, buffer: &u32, bytes: &[u8]) {
            self.uploads.push((*buffer, bytes.to_vec()));
        }

        fn release(&mut self, buffer: u32) {
            self.released.push(buffer);
        }
    }

    #[test]
    fn test_empty_data_without_buffer_stays_absent() {
        let mut backend = RecordingBackend::default();
        let mut slot = None;
        let change = reconcile_buffer::<_, u32>(&mut backend, &mut slot, "indices", &[], 4);
        assert_eq!(change, BufferChange::Empty);
        assert!(slot.is_none());
        assert!(backend.created.is_empty());
        assert!(backend.uploads.is_empty());
    }

    #[test]
    fn test_first_upload_creates_buffer() {
        let mut backend = RecordingBackend::default();
        let mut slot = None;
        let change = reconcile_buffer(&mut backend, &mut slot, "indices", &[1u32, 2, 3], 4);
        assert_eq!(change, BufferChange::Created);
        let buffer = slot.as_ref().expect("buffer should exist");
        assert_eq!(buffer.count(), 3);
        assert_eq!(buffer.stride(), 4);
        assert_eq!(buffer.byte_size(), 12);
        assert_eq!(backend.uploads.len(), 1);
        assert_eq!(backend.uploads[0].1.len(), 12);
    }

    #[test]
    fn test_same_shape_reuses_allocation() {
        let mut backend = RecordingBackend::default();
        let mut slot = None;
        reconcile_buffer(&mut backend, &mut slot, "indices", &[1u32, 2, 3], 4);
        let change = reconcile_buffer(&mut backend, &mut slot, "indices", &[4u32, 5, 6], 4);
        assert_eq!(change, BufferChange::Reused);
        assert_eq!(*slot.as_ref().map(StructuredBuffer::raw).expect("buffer should exist"), 1);
        assert_eq!(backend.created.len(), 1);
        assert!(backend.released.is_empty());
        // contents are fully overwritten
        assert_eq!(backend.uploads[1].1, bytemuck::cast_slice::<u32, u8>(&[4, 5, 6]).to_vec());
    }

    #[test]
    fn test_count_change_recreates() {
        let mut backend = RecordingBackend::default();
        let mut slot = None;
        reconcile_buffer(&mut backend, &mut slot, "indices", &[1u32, 2, 3], 4);
        let change = reconcile_buffer(&mut backend, &mut slot, "indices", &[1u32, 2, 3, 4], 4);
        assert_eq!(change, BufferChange::Recreated);
        assert_eq!(backend.released, vec![1]);
        assert_eq!(slot.as_ref().map(|b| (*b.raw(), b.count())), Some((2, 4)));
    }

    #[test]
    fn test_stride_change_recreates() {
        let mut backend = RecordingBackend::default();
        let mut slot = None;
        reconcile_buffer(&mut backend, &mut slot, "data", &[1u32, 2], 4);
        let change = reconcile_buffer(&mut backend, &mut slot, "data", &[[1u32, 2]; 2], 8);
        assert_eq!(change, BufferChange::Recreated);
        assert_eq!(backend.released, vec![1]);
        assert_eq!(slot.as_ref().map(StructuredBuffer::stride), Some(8));
    }

    #[test]
    fn test_empty_data_releases_buffer() {
        let mut backend = RecordingBackend::default();
        let mut slot = None;
        reconcile_buffer(&mut backend, &mut slot, "indices", &[1u32], 4);
        let change = reconcile_buffer::<_, u32>(&mut backend, &mut slot, "indices", &[], 4);
        assert_eq!(change, BufferChange::Released);
        assert!(slot.is_none());
        assert_eq!(backend.released, vec![1]);
        assert_eq!(backend.uploads.len(), 1);
    }

    #[test]
    fn test_release_buffer_clears_slot() {
        let mut backend = RecordingBackend::default();
        let mut slot = None;
        reconcile_buffer(&mut backend, &mut slot, "indices", &[1u32], 4);
        release_buffer(&mut backend, &mut slot);
        release_buffer(&mut backend, &mut slot);
        assert!(slot.is_none());
        assert_eq!(backend.released, vec![1]);
    }

    #[test]
    fn test_binding_template_equality_ignores_resource() {
        let a = BindingResourceTemplate::Sampler(wgpu::BindingResource::TextureViewArray(&[]));
        let b = BindingResourceTemplate::Sampler(wgpu::BindingResource::SamplerArray(&[]));
        let c = BindingResourceTemplate::TextureView(wgpu::BindingResource::SamplerArray(&[]));
        assert!(a == b);
        assert!(a != c);
    }
}
