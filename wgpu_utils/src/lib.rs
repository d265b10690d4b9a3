mod buffer;
mod gpu;


pub use buffer::{BufferInitDescriptor, BindGroupDescriptor, BufferType, BindingResourceTemplate,
            BufferBackend, BufferChange, StructuredBuffer, WgpuBufferBackend, reconcile_buffer, release_buffer};
pub use gpu::{setup_gpu, GpuContext};
