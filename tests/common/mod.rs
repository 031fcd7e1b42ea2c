//! Shared helpers for integration tests.
//!
//! Each integration test binary compiles this module separately, so not
//! every helper is referenced by every binary.
#![allow(dead_code)]

use std::sync::Arc;

use ember_graphics::backend::DummyBackend;
use ember_graphics::vertex::{IndexMode, StreamFormat, XyVertex};
use ember_graphics::{
    BatchedDrawCommand, Extent2d, GraphicsContext, RenderTarget, RenderTargetSet,
    TextureDescriptor, TextureFormat, Texture,
};

pub const BACKBUFFER: Extent2d = Extent2d {
    width: 800,
    height: 600,
};

/// A context over a recording dummy backend.
pub struct TestContext {
    pub dummy: Arc<DummyBackend>,
    pub gfx: GraphicsContext,
}

impl TestContext {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dummy = Arc::new(DummyBackend::new());
        let gfx = GraphicsContext::new(dummy.clone(), BACKBUFFER).expect("context creation");
        Self { dummy, gfx }
    }

    /// Create a plain color render target.
    pub fn color_target(&self, width: u32, height: u32) -> Arc<Texture> {
        self.gfx
            .new_texture(TextureDescriptor::render_target(
                width,
                height,
                TextureFormat::Rgba8Unorm,
                1,
            ))
            .expect("texture creation")
    }

    /// A single-color-attachment target set.
    pub fn target_set(&self, width: u32, height: u32) -> RenderTargetSet {
        RenderTargetSet::new().with_color(RenderTarget::new(self.color_target(width, height)))
    }

    /// Issue one quad draw request (4 vertices, quad index expansion) and
    /// fill its vertices with an axis-aligned rectangle.
    pub fn draw_quad(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let cmd =
            BatchedDrawCommand::triangles(StreamFormat::Xy, 4).with_index_mode(IndexMode::Quads);
        let mut vertices = self.gfx.request_batched_draw(&cmd).expect("draw request");
        let out: &mut [XyVertex] = bytemuck::cast_slice_mut(vertices.stream(0));
        out[0] = XyVertex { x, y };
        out[1] = XyVertex { x, y: y + h };
        out[2] = XyVertex { x: x + w, y };
        out[3] = XyVertex { x: x + w, y: y + h };
    }

    /// Issue one non-indexed triangle draw request with placeholder vertices.
    pub fn draw_triangles(&mut self, vertex_count: u32) {
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, vertex_count);
        let mut vertices = self.gfx.request_batched_draw(&cmd).expect("draw request");
        vertices.stream(0).fill(0);
    }
}
