//! GPU backend abstraction layer.
//!
//! This module provides a trait-based abstraction for GPU backends. The
//! batching and binding subsystems depend only on [`GpuBackend`]; a concrete
//! implementation (OpenGL, Vulkan, Metal, ...) lives behind the trait and is
//! supplied at context construction.
//!
//! # Available Backends
//!
//! - [`DummyBackend`](dummy::DummyBackend): records every call without
//!   touching GPU hardware, used for testing and development.

pub mod dummy;

pub use dummy::DummyBackend;

use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, Extent2d, TextureDescriptor, TextureFormat, TextureUsage};
use crate::vertex::{PrimitiveTopology, VertexLayoutId};

/// Opaque handle to a backend buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Opaque handle to a backend texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Standard shader variants selected automatically for batched draws.
///
/// Batched draw requests carry one of these as a shader-selection hint; the
/// backend attaches the matching built-in shader once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StandardShader {
    /// Untextured primitives.
    #[default]
    Default,
    /// Textured primitives.
    Textured,
}

/// A vertex buffer bound for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    /// The bound buffer.
    pub buffer: BufferId,
    /// Byte offset of the first vertex.
    pub offset: u64,
}

/// An index buffer bound for an indexed submission.
///
/// Indices are always 16-bit; the batcher flushes before the accumulated
/// vertex count could exceed the `u16` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBinding {
    /// The bound index buffer.
    pub buffer: BufferId,
    /// Byte offset of the first index.
    pub offset: u64,
    /// Number of indices to draw.
    pub count: u32,
}

/// One hardware draw, covering every vertex accumulated into a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Interned vertex layout of the bound buffers.
    pub layout: VertexLayoutId,
    /// Up to two bound vertex streams.
    pub vertex_buffers: [Option<BufferBinding>; 2],
    /// Index binding for indexed draws.
    pub index: Option<IndexBinding>,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Number of vertices written into the bound streams.
    pub vertex_count: u32,
    /// Texture sampled by the draw, if any.
    pub texture: Option<TextureId>,
}

/// A color or depth/stencil attachment reference for a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentRef {
    /// The attached texture.
    pub texture: TextureId,
    /// Mip level receiving draw output.
    pub mipmap: u32,
    /// Array slice receiving draw output.
    pub slice: u32,
}

/// GPU backend capability trait.
///
/// Every operation the batching/pooling subsystem needs from the hardware
/// layer, and nothing more. Implementations must not retain references into
/// the arguments beyond the call.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Create a buffer resource.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, GraphicsError>;

    /// Destroy a buffer resource.
    fn destroy_buffer(&self, buffer: BufferId);

    /// Write data to a buffer.
    ///
    /// May block if the GPU is still reading the destination range.
    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]);

    /// Create a texture resource.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, GraphicsError>;

    /// Destroy a texture resource.
    fn destroy_texture(&self, texture: TextureId);

    /// Issue one hardware draw.
    fn submit(&self, submission: &Submission) -> Result<(), GraphicsError>;

    /// Attach a built-in shader. Called at most once per batch.
    fn attach_default_shader(&self, shader: StandardShader);

    /// Install a render-target set. Empty `colors` selects the backbuffer.
    fn set_render_targets(
        &self,
        colors: &[AttachmentRef],
        depth_stencil: Option<AttachmentRef>,
        pixel_size: Extent2d,
    ) -> Result<(), GraphicsError>;

    /// Clear the currently bound depth/stencil attachment.
    fn clear_depth_stencil(&self, depth: f32, stencil: u32);

    /// Regenerate the mip chain of a texture from its base level.
    fn generate_mipmaps(&self, texture: TextureId);

    /// Check whether a format supports the given usage on this device.
    fn supports_format(&self, format: TextureFormat, usage: TextureUsage) -> bool;

    /// Maximum number of simultaneous color targets.
    fn max_color_targets(&self) -> u32;
}
