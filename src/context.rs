//! The graphics context.
//!
//! [`GraphicsContext`] owns every component of the batching and pooling
//! subsystem: the backend handle, the vertex layout registry, the geometry
//! batcher, the transient texture/buffer pools, the render-target binder and
//! the state stack. All drawing goes through it, on a single thread.
//!
//! # Frame Shape
//!
//! ```no_run
//! use std::sync::Arc;
//! use ember_graphics::backend::{DummyBackend, GpuBackend};
//! use ember_graphics::vertex::StreamFormat;
//! use ember_graphics::{BatchedDrawCommand, Extent2d, GraphicsContext};
//!
//! # fn main() -> Result<(), ember_graphics::GraphicsError> {
//! let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
//! let mut gfx = GraphicsContext::new(backend, Extent2d::new(800, 600))?;
//!
//! let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);
//! let mut vertices = gfx.request_batched_draw(&cmd)?;
//! vertices.stream(0).fill(0);
//!
//! gfx.end_frame()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::backend::{GpuBackend, StandardShader};
use crate::batch::{BatchedDrawCommand, BatchedVertices, GeometryBatcher};
use crate::error::GraphicsError;
use crate::pool::{BufferPool, TexturePool};
use crate::resources::{Buffer, Texture};
use crate::state::{
    BlendMode, ColorMask, DepthState, DisplayState, StackType, StateStack, StencilState,
};
use crate::target::{RenderTargetBinder, RenderTargetSet};
use crate::types::{BufferDescriptor, Color, Extent2d, ScissorRect, TextureDescriptor};
use crate::vertex::VertexLayoutRegistry;

/// Owns and coordinates the batching/pooling subsystem.
///
/// Single-threaded: one context drives one frame thread.
pub struct GraphicsContext {
    backend: Arc<dyn GpuBackend>,
    registry: VertexLayoutRegistry,
    batcher: GeometryBatcher,
    texture_pool: TexturePool,
    buffer_pool: BufferPool,
    binder: RenderTargetBinder,
    stack: StateStack,
    state: DisplayState,
    frame: u64,
}

impl GraphicsContext {
    /// Create a context over the given backend, drawing to a backbuffer of
    /// the given size until render targets are bound.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        backbuffer_size: Extent2d,
    ) -> Result<Self, GraphicsError> {
        log::info!(
            "creating graphics context on backend '{}' ({}x{})",
            backend.name(),
            backbuffer_size.width,
            backbuffer_size.height
        );

        let batcher = GeometryBatcher::new(&backend)?;
        Ok(Self {
            backend,
            registry: VertexLayoutRegistry::new(),
            batcher,
            texture_pool: TexturePool::new(),
            buffer_pool: BufferPool::new(),
            binder: RenderTargetBinder::new(backbuffer_size),
            stack: StateStack::new(),
            state: DisplayState::default(),
            frame: 0,
        })
    }

    /// The backend this context draws through.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Create a texture on this context's backend.
    pub fn new_texture(&self, descriptor: TextureDescriptor) -> Result<Arc<Texture>, GraphicsError> {
        Texture::new(self.backend.clone(), descriptor)
    }

    /// Create a buffer on this context's backend.
    pub fn new_buffer(&self, descriptor: BufferDescriptor) -> Result<Arc<Buffer>, GraphicsError> {
        Buffer::new(self.backend.clone(), descriptor)
    }

    // ========================================================================
    // Batched drawing
    // ========================================================================

    /// Append a draw request to the open batch.
    ///
    /// See [`GeometryBatcher::request`] for the flush/growth rules.
    pub fn request_batched_draw(
        &mut self,
        cmd: &BatchedDrawCommand,
    ) -> Result<BatchedVertices<'_>, GraphicsError> {
        self.batcher.request(&self.backend, &mut self.registry, cmd)
    }

    /// Flush any pending batched geometry as one submission.
    pub fn flush_batched_draws(&mut self) -> Result<(), GraphicsError> {
        self.batcher
            .flush_under_identity(&self.backend, &mut self.registry, &mut self.stack)
    }

    // ========================================================================
    // Render targets
    // ========================================================================

    /// Bind a render-target set for subsequent drawing.
    pub fn set_render_targets(&mut self, set: &RenderTargetSet) -> Result<(), GraphicsError> {
        self.binder.bind(
            &self.backend,
            &mut self.batcher,
            &mut self.registry,
            &mut self.stack,
            &mut self.texture_pool,
            set,
        )?;
        self.state.render_targets = self.binder.current().clone();
        Ok(())
    }

    /// Restore drawing to the backbuffer.
    pub fn set_render_target(&mut self) -> Result<(), GraphicsError> {
        self.binder.unbind(
            &self.backend,
            &mut self.batcher,
            &mut self.registry,
            &mut self.stack,
        )?;
        self.state.render_targets = RenderTargetSet::new();
        Ok(())
    }

    /// Projection in effect: the custom override when set, otherwise the
    /// binder's default orthographic projection for the bound dimensions.
    pub fn projection(&self) -> Mat4 {
        self.state
            .custom_projection
            .unwrap_or_else(|| self.binder.projection())
    }

    /// Override the projection, or clear the override with `None`.
    pub fn set_custom_projection(&mut self, projection: Option<Mat4>) -> Result<(), GraphicsError> {
        if self.state.custom_projection != projection {
            self.flush_batched_draws()?;
            self.state.custom_projection = projection;
        }
        Ok(())
    }

    // ========================================================================
    // Display state
    // ========================================================================

    /// Current display state.
    pub fn display_state(&self) -> &DisplayState {
        &self.state
    }

    /// Set the draw color. Does not flush: the color is baked into vertices
    /// as they are written.
    pub fn set_color(&mut self, color: Color) {
        self.state.color = color;
    }

    /// Current draw color.
    pub fn color(&self) -> Color {
        self.state.color
    }

    /// Set the background (clear) color.
    pub fn set_background_color(&mut self, color: Color) {
        self.state.background_color = color;
    }

    /// Set the blend mode. Flushes pending geometry on change.
    pub fn set_blend_mode(&mut self, blend: BlendMode) -> Result<(), GraphicsError> {
        if self.state.blend != blend {
            self.flush_batched_draws()?;
            self.state.blend = blend;
        }
        Ok(())
    }

    /// Set the line width. Flushes pending geometry on change.
    pub fn set_line_width(&mut self, width: f32) -> Result<(), GraphicsError> {
        if self.state.line_width != width {
            self.flush_batched_draws()?;
            self.state.line_width = width;
        }
        Ok(())
    }

    /// Set the point size. Flushes pending geometry on change.
    pub fn set_point_size(&mut self, size: f32) -> Result<(), GraphicsError> {
        if self.state.point_size != size {
            self.flush_batched_draws()?;
            self.state.point_size = size;
        }
        Ok(())
    }

    /// Set or disable the scissor rectangle. Flushes pending geometry on
    /// change.
    pub fn set_scissor(&mut self, scissor: Option<ScissorRect>) -> Result<(), GraphicsError> {
        if self.state.scissor != scissor {
            self.flush_batched_draws()?;
            self.state.scissor = scissor;
        }
        Ok(())
    }

    /// Set the stencil configuration. Flushes pending geometry on change.
    pub fn set_stencil_state(&mut self, stencil: StencilState) -> Result<(), GraphicsError> {
        if self.state.stencil != stencil {
            self.flush_batched_draws()?;
            self.state.stencil = stencil;
        }
        Ok(())
    }

    /// Set the depth configuration. Flushes pending geometry on change.
    pub fn set_depth_state(&mut self, depth: DepthState) -> Result<(), GraphicsError> {
        if self.state.depth != depth {
            self.flush_batched_draws()?;
            self.state.depth = depth;
        }
        Ok(())
    }

    /// Set the color write mask. Flushes pending geometry on change.
    pub fn set_color_mask(&mut self, mask: ColorMask) -> Result<(), GraphicsError> {
        if self.state.color_mask != mask {
            self.flush_batched_draws()?;
            self.state.color_mask = mask;
        }
        Ok(())
    }

    /// Enable or disable wireframe rasterization. Flushes pending geometry
    /// on change.
    pub fn set_wireframe(&mut self, wireframe: bool) -> Result<(), GraphicsError> {
        if self.state.wireframe != wireframe {
            self.flush_batched_draws()?;
            self.state.wireframe = wireframe;
        }
        Ok(())
    }

    /// Select the standard shader for subsequent batched draws. Flushes
    /// pending geometry on change.
    pub fn set_standard_shader(&mut self, shader: StandardShader) -> Result<(), GraphicsError> {
        if self.state.shader != shader {
            self.flush_batched_draws()?;
            self.state.shader = shader;
        }
        Ok(())
    }

    // ========================================================================
    // State stack & transforms
    // ========================================================================

    /// Save the transform, and for [`StackType::All`] the full display
    /// state.
    pub fn push(&mut self, stack_type: StackType) -> Result<(), GraphicsError> {
        self.stack.push(stack_type, &self.state)
    }

    /// Undo the most recent [`push`](Self::push), restoring the saved
    /// display state with a minimal diff.
    pub fn pop(&mut self) -> Result<(), GraphicsError> {
        if let Some(snapshot) = self.stack.pop()? {
            self.restore_state_checked(snapshot)?;
        }
        Ok(())
    }

    /// Current user push depth.
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Current coordinate transform.
    pub fn transform(&self) -> Mat4 {
        *self.stack.transform()
    }

    /// Accumulated pixel scale of the current transform.
    pub fn pixel_scale(&self) -> f32 {
        self.stack.pixel_scale()
    }

    /// Translate the coordinate system.
    pub fn translate(&mut self, x: f32, y: f32) {
        let transform = self.stack.transform_mut();
        *transform *= Mat4::from_translation(Vec3::new(x, y, 0.0));
    }

    /// Rotate the coordinate system around the z axis.
    pub fn rotate(&mut self, radians: f32) {
        let transform = self.stack.transform_mut();
        *transform *= Mat4::from_rotation_z(radians);
    }

    /// Scale the coordinate system.
    pub fn scale(&mut self, x: f32, y: f32) {
        let transform = self.stack.transform_mut();
        *transform *= Mat4::from_scale(Vec3::new(x, y, 1.0));
        self.stack.scale_pixel_scale((x.abs() + y.abs()) / 2.0);
    }

    /// Reset the coordinate system to the origin.
    pub fn origin(&mut self) {
        self.stack.reset_transform();
    }

    /// Multiply an arbitrary transform onto the coordinate system.
    pub fn apply_transform(&mut self, transform: &Mat4) {
        *self.stack.transform_mut() *= *transform;
    }

    // ========================================================================
    // Transient resources
    // ========================================================================

    /// Borrow a transient texture from the pool, creating one if no idle
    /// match exists.
    pub fn temporary_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        let backend = self.backend.clone();
        self.texture_pool
            .acquire(descriptor, || Texture::new(backend, descriptor.clone()))
    }

    /// Return a transient texture to the pool.
    pub fn release_temporary_texture(&mut self, texture: &Arc<Texture>) {
        self.texture_pool.release(texture);
    }

    /// Borrow a transient buffer from the pool, creating one if no idle
    /// match exists.
    pub fn temporary_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        let backend = self.backend.clone();
        self.buffer_pool
            .acquire(descriptor, || Buffer::new(backend, descriptor.clone()))
    }

    /// Return a transient buffer to the pool.
    pub fn release_temporary_buffer(&mut self, buffer: &Arc<Buffer>) {
        self.buffer_pool.release(buffer);
    }

    // ========================================================================
    // Frame boundary & stats
    // ========================================================================

    /// End the frame: flush pending geometry, reclaim stream buffer
    /// capacity, and age/evict pooled resources.
    ///
    /// Must be called exactly once per frame.
    pub fn end_frame(&mut self) -> Result<(), GraphicsError> {
        self.flush_batched_draws()?;
        self.batcher.next_frame();
        self.texture_pool.advance_frame();
        self.buffer_pool.advance_frame();
        self.frame += 1;
        Ok(())
    }

    /// Frames completed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Draw submissions issued so far.
    pub fn draw_calls(&self) -> u64 {
        self.batcher.draw_calls()
    }

    /// Draw requests that merged into an already-open batch.
    pub fn draw_calls_batched(&self) -> u64 {
        self.batcher.draw_calls_batched()
    }

    /// Render-target switches that reached the backend.
    pub fn render_target_switches(&self) -> u64 {
        self.binder.switch_count()
    }

    /// Reapply a popped display-state snapshot, touching only the fields
    /// that differ from the current state.
    fn restore_state_checked(&mut self, saved: DisplayState) -> Result<(), GraphicsError> {
        self.set_color(saved.color);
        self.set_background_color(saved.background_color);
        self.set_blend_mode(saved.blend)?;
        self.set_line_width(saved.line_width)?;
        self.set_point_size(saved.point_size)?;
        self.set_scissor(saved.scissor)?;
        self.set_stencil_state(saved.stencil)?;
        self.set_depth_state(saved.depth)?;
        self.set_color_mask(saved.color_mask)?;
        self.set_wireframe(saved.wireframe)?;
        self.set_standard_shader(saved.shader)?;
        self.set_custom_projection(saved.custom_projection)?;

        if saved.render_targets != self.state.render_targets {
            let targets = saved.render_targets.clone();
            self.set_render_targets(&targets)?;
        }
        Ok(())
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        // No target surface is guaranteed to exist at teardown, so pending
        // geometry is dropped rather than flushed.
        self.batcher.discard();
        self.texture_pool.clear();
        self.buffer_pool.clear();
        log::info!("graphics context destroyed after {} frames", self.frame);
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("backend", &self.backend.name())
            .field("frame", &self.frame)
            .field("stack_depth", &self.stack.depth())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::vertex::StreamFormat;

    fn context() -> (GraphicsContext, Arc<DummyBackend>) {
        let dummy = Arc::new(DummyBackend::new());
        let context = GraphicsContext::new(dummy.clone(), Extent2d::new(800, 600)).unwrap();
        (context, dummy)
    }

    #[test]
    fn test_end_frame_flushes_and_advances() {
        let (mut gfx, dummy) = context();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);

        gfx.request_batched_draw(&cmd).unwrap();
        assert_eq!(dummy.submission_count(), 0);

        gfx.end_frame().unwrap();
        assert_eq!(dummy.submission_count(), 1);
        assert_eq!(gfx.frame_count(), 1);
    }

    #[test]
    fn test_scissor_change_flushes_pending_geometry() {
        let (mut gfx, dummy) = context();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);

        gfx.request_batched_draw(&cmd).unwrap();
        gfx.set_scissor(Some(ScissorRect::new(0, 0, 100, 100)))
            .unwrap();
        assert_eq!(dummy.submission_count(), 1);

        // Setting the same scissor again does not flush.
        gfx.request_batched_draw(&cmd).unwrap();
        gfx.set_scissor(Some(ScissorRect::new(0, 0, 100, 100)))
            .unwrap();
        assert_eq!(dummy.submission_count(), 1);
    }

    #[test]
    fn test_color_change_does_not_flush() {
        let (mut gfx, dummy) = context();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);

        gfx.request_batched_draw(&cmd).unwrap();
        gfx.set_color(Color::new(1.0, 0.0, 0.0, 1.0));
        gfx.request_batched_draw(&cmd).unwrap();
        gfx.flush_batched_draws().unwrap();

        assert_eq!(dummy.submission_count(), 1);
        assert_eq!(dummy.submissions()[0].vertex_count, 6);
    }

    #[test]
    fn test_push_pop_restores_state_bit_for_bit() {
        let (mut gfx, _) = context();
        let initial = gfx.display_state().clone();

        gfx.push(StackType::All).unwrap();
        gfx.set_color(Color::new(0.2, 0.4, 0.6, 1.0));
        gfx.set_blend_mode(BlendMode::Add).unwrap();
        gfx.set_line_width(3.0).unwrap();
        gfx.set_wireframe(true).unwrap();
        gfx.set_scissor(Some(ScissorRect::new(10, 10, 50, 50)))
            .unwrap();
        gfx.pop().unwrap();

        assert_eq!(*gfx.display_state(), initial);
    }

    #[test]
    fn test_restore_diff_does_not_flush_unchanged_state() {
        let (mut gfx, dummy) = context();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);

        gfx.push(StackType::All).unwrap();
        gfx.request_batched_draw(&cmd).unwrap();
        // Nothing was changed since the push, so the pop's diff is empty and
        // the open batch survives.
        gfx.pop().unwrap();
        assert_eq!(dummy.submission_count(), 0);

        gfx.flush_batched_draws().unwrap();
        assert_eq!(dummy.submission_count(), 1);
    }

    #[test]
    fn test_pop_without_push_is_misuse() {
        let (mut gfx, _) = context();
        assert!(matches!(gfx.pop(), Err(GraphicsError::Misuse(_))));
    }

    #[test]
    fn test_transform_push_does_not_restore_display_state() {
        let (mut gfx, _) = context();

        gfx.push(StackType::Transform).unwrap();
        gfx.translate(10.0, 20.0);
        gfx.set_color(Color::BLACK);
        gfx.pop().unwrap();

        assert_eq!(gfx.transform(), Mat4::IDENTITY);
        // Display state is untouched by a transform-only pop.
        assert_eq!(gfx.color(), Color::BLACK);
    }

    #[test]
    fn test_scale_tracks_pixel_scale() {
        let (mut gfx, _) = context();
        gfx.scale(2.0, 4.0);
        assert_eq!(gfx.pixel_scale(), 3.0);

        gfx.origin();
        assert_eq!(gfx.pixel_scale(), 1.0);
        assert_eq!(gfx.transform(), Mat4::IDENTITY);
    }

    #[test]
    fn test_target_bind_flush_preserves_user_transform() {
        let (mut gfx, dummy) = context();
        let target = gfx
            .new_texture(TextureDescriptor::render_target(
                64,
                64,
                crate::types::TextureFormat::Rgba8Unorm,
                1,
            ))
            .unwrap();
        let set = crate::target::RenderTargetSet::new()
            .with_color(crate::target::RenderTarget::new(target));

        gfx.translate(7.0, 3.0);
        let expected = gfx.transform();

        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);
        gfx.request_batched_draw(&cmd).unwrap();
        gfx.set_render_targets(&set).unwrap();

        // The bind flushed the pending batch under an identity transform and
        // restored the user transform afterwards.
        assert_eq!(dummy.submission_count(), 1);
        assert_eq!(gfx.transform(), expected);
    }

    #[test]
    fn test_temporary_texture_round_trip() {
        let (mut gfx, dummy) = context();
        let desc = TextureDescriptor::render_target(
            64,
            64,
            crate::types::TextureFormat::Rgba8Unorm,
            1,
        );

        let first = gfx.temporary_texture(&desc).unwrap();
        let id = first.id();
        gfx.release_temporary_texture(&first);
        drop(first);

        // Reacquired before the eviction threshold: same backend object.
        gfx.end_frame().unwrap();
        let second = gfx.temporary_texture(&desc).unwrap();
        assert_eq!(second.id(), id);
        assert!(dummy.destroyed_textures().is_empty());
    }

    #[test]
    fn test_temporary_texture_evicted_after_idle_frames() {
        let (mut gfx, dummy) = context();
        let desc = TextureDescriptor::render_target(
            64,
            64,
            crate::types::TextureFormat::Rgba8Unorm,
            1,
        );

        let texture = gfx.temporary_texture(&desc).unwrap();
        let id = texture.id();
        gfx.release_temporary_texture(&texture);
        drop(texture);

        for _ in 0..crate::pool::DEFAULT_EVICTION_FRAMES {
            gfx.end_frame().unwrap();
        }
        assert_eq!(dummy.destroyed_textures(), vec![id]);
    }

    #[test]
    fn test_drop_discards_pending_batch() {
        let dummy = Arc::new(DummyBackend::new());
        {
            let mut gfx =
                GraphicsContext::new(dummy.clone(), Extent2d::new(800, 600)).unwrap();
            let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);
            gfx.request_batched_draw(&cmd).unwrap();
        }
        assert_eq!(dummy.submission_count(), 0);
    }
}
