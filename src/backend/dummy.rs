//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations but records every call,
//! providing a valid implementation for testing the graphics API without
//! requiring GPU hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, Extent2d, TextureDescriptor, TextureFormat, TextureUsage};

use super::{AttachmentRef, BufferId, GpuBackend, StandardShader, Submission, TextureId};

/// One recorded render-target installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    /// Color attachments; empty for the backbuffer.
    pub colors: Vec<AttachmentRef>,
    /// Depth/stencil attachment, if any.
    pub depth_stencil: Option<AttachmentRef>,
    /// Pixel dimensions of the pass.
    pub pixel_size: Extent2d,
}

/// Dummy GPU backend.
///
/// Records submissions, target switches, clears and mipmap regenerations so
/// tests can assert on exactly what reached the hardware layer.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_id: AtomicU64,
    fail_allocations: AtomicBool,
    submissions: Mutex<Vec<Submission>>,
    target_sets: Mutex<Vec<TargetRecord>>,
    shader_attachments: Mutex<Vec<StandardShader>>,
    depth_stencil_clears: Mutex<Vec<(f32, u32)>>,
    mipmap_regenerations: Mutex<Vec<TextureId>>,
    destroyed_buffers: Mutex<Vec<BufferId>>,
    destroyed_textures: Mutex<Vec<TextureId>>,
    created_textures: Mutex<Vec<TextureDescriptor>>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed).max(1)
    }

    /// Make subsequent resource creation fail with [`GraphicsError::OutOfMemory`].
    pub fn set_fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::Relaxed);
    }

    /// All draw submissions recorded so far.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Number of draw submissions recorded so far.
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    /// All render-target installations recorded so far.
    pub fn target_sets(&self) -> Vec<TargetRecord> {
        self.target_sets.lock().unwrap().clone()
    }

    /// All built-in shader attachments recorded so far.
    pub fn shader_attachments(&self) -> Vec<StandardShader> {
        self.shader_attachments.lock().unwrap().clone()
    }

    /// All depth/stencil clears recorded so far.
    pub fn depth_stencil_clears(&self) -> Vec<(f32, u32)> {
        self.depth_stencil_clears.lock().unwrap().clone()
    }

    /// All mipmap regenerations recorded so far.
    pub fn mipmap_regenerations(&self) -> Vec<TextureId> {
        self.mipmap_regenerations.lock().unwrap().clone()
    }

    /// Textures destroyed so far.
    pub fn destroyed_textures(&self) -> Vec<TextureId> {
        self.destroyed_textures.lock().unwrap().clone()
    }

    /// Buffers destroyed so far.
    pub fn destroyed_buffers(&self) -> Vec<BufferId> {
        self.destroyed_buffers.lock().unwrap().clone()
    }

    /// Descriptors of every texture created so far.
    pub fn created_textures(&self) -> Vec<TextureDescriptor> {
        self.created_textures.lock().unwrap().clone()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, GraphicsError> {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(GraphicsError::OutOfMemory);
        }
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        Ok(BufferId(self.next_id()))
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        log::trace!("DummyBackend: destroying buffer {buffer:?}");
        self.destroyed_buffers.lock().unwrap().push(buffer);
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) {
        log::trace!(
            "DummyBackend: write_buffer {buffer:?} offset={offset} len={}",
            data.len()
        );
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, GraphicsError> {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(GraphicsError::OutOfMemory);
        }
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );
        self.created_textures.lock().unwrap().push(descriptor.clone());
        Ok(TextureId(self.next_id()))
    }

    fn destroy_texture(&self, texture: TextureId) {
        log::trace!("DummyBackend: destroying texture {texture:?}");
        self.destroyed_textures.lock().unwrap().push(texture);
    }

    fn submit(&self, submission: &Submission) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: submit {} vertices, {} indices",
            submission.vertex_count,
            submission.index.map(|binding| binding.count).unwrap_or(0)
        );
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }

    fn attach_default_shader(&self, shader: StandardShader) {
        self.shader_attachments.lock().unwrap().push(shader);
    }

    fn set_render_targets(
        &self,
        colors: &[AttachmentRef],
        depth_stencil: Option<AttachmentRef>,
        pixel_size: Extent2d,
    ) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: set_render_targets ({} colors, {}x{})",
            colors.len(),
            pixel_size.width,
            pixel_size.height
        );
        self.target_sets.lock().unwrap().push(TargetRecord {
            colors: colors.to_vec(),
            depth_stencil,
            pixel_size,
        });
        Ok(())
    }

    fn clear_depth_stencil(&self, depth: f32, stencil: u32) {
        self.depth_stencil_clears
            .lock()
            .unwrap()
            .push((depth, stencil));
    }

    fn generate_mipmaps(&self, texture: TextureId) {
        self.mipmap_regenerations.lock().unwrap().push(texture);
    }

    fn supports_format(&self, _format: TextureFormat, _usage: TextureUsage) -> bool {
        true
    }

    fn max_color_targets(&self) -> u32 {
        8
    }
}
