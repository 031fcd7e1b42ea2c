//! # Ember Graphics
//!
//! Draw-call batching and transient GPU resource pooling for the Ember
//! graphics module.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsContext`] - Owns the whole subsystem and drives a frame
//! - [`GeometryBatcher`] - Coalesces compatible draw requests into few
//!   submissions
//! - [`ResourcePool`] - Caches transient textures/buffers across frames with
//!   idle-frame eviction
//! - [`RenderTargetBinder`] - Validated render-target binding with implicit
//!   depth/stencil synthesis
//! - [`GpuBackend`](backend::GpuBackend) - Trait for hardware backends, with
//!   a recording [`DummyBackend`](backend::DummyBackend) for testing
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ember_graphics::backend::{DummyBackend, GpuBackend};
//! use ember_graphics::vertex::{IndexMode, StreamFormat};
//! use ember_graphics::{BatchedDrawCommand, Extent2d, GraphicsContext};
//!
//! # fn main() -> Result<(), ember_graphics::GraphicsError> {
//! let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
//! let mut gfx = GraphicsContext::new(backend, Extent2d::new(800, 600))?;
//!
//! // Three quads accumulate into a single indexed submission.
//! for _ in 0..3 {
//!     let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 4)
//!         .with_index_mode(IndexMode::Quads);
//!     let mut vertices = gfx.request_batched_draw(&cmd)?;
//!     vertices.stream(0).fill(0);
//! }
//! gfx.end_frame()?;
//!
//! assert_eq!(gfx.draw_calls(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod batch;
pub mod context;
pub mod error;
pub mod pool;
pub mod resources;
pub mod state;
pub mod target;
pub mod types;
pub mod vertex;

// Re-export main types for convenience
pub use batch::{BatchedDrawCommand, BatchedVertices, GeometryBatcher, MAX_BATCH_VERTICES};
pub use context::GraphicsContext;
pub use error::GraphicsError;
pub use pool::{BufferPool, ResourcePool, TexturePool, DEFAULT_EVICTION_FRAMES};
pub use resources::{Buffer, StreamBuffer, Texture};
pub use state::{
    BlendMode, ColorMask, CompareMode, DepthState, DisplayState, StackType, StateStack,
    StencilAction, StencilState, MAX_STACK_DEPTH,
};
pub use target::{RenderTarget, RenderTargetBinder, RenderTargetSet, TemporaryTargetFlags};
pub use types::{
    BufferDescriptor, BufferUsage, Color, Extent2d, MipmapMode, ScissorRect, TextureDescriptor,
    TextureFormat, TextureUsage,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("Ember Graphics v{VERSION} initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend() {
        use crate::backend::GpuBackend;
        let backend = backend::DummyBackend::new();
        assert!(backend.name() == "Dummy");
    }
}
