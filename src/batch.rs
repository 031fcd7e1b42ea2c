//! Streaming geometry batching.
//!
//! Shape, sprite and text drawing produce many small draw requests per frame.
//! Submitting each one individually would drown the GPU in tiny draws, so the
//! batcher coalesces compatible requests into shared stream buffers and emits
//! one submission per batch on [`GeometryBatcher::flush`].
//!
//! Two requests are compatible when they agree on primitive topology, both
//! vertex stream formats, indexed-ness, bound texture and standard shader. A
//! request that disagrees with the open batch (or would overflow the 16-bit
//! index space, or needs more room than the buffers hold) forces a flush
//! first.
//!
//! Callers write vertex data directly into the mapped regions returned by
//! [`GeometryBatcher::request`]; there is no intermediate copy.

use std::sync::Arc;

use crate::backend::{BufferBinding, GpuBackend, IndexBinding, StandardShader, Submission};
use crate::error::GraphicsError;
use crate::resources::{StreamBuffer, Texture};
use crate::state::StateStack;
use crate::types::BufferUsage;
use crate::vertex::{
    composite_layout, fill_indices, IndexMode, PrimitiveTopology, StreamFormat, VertexLayoutId,
    VertexLayoutRegistry,
};

/// Most vertices a single indexed batch can address (16-bit indices).
pub const MAX_BATCH_VERTICES: u32 = u16::MAX as u32;

const INITIAL_VERTEX_BUFFER_SIZE: usize = 1024 * 1024;
const INITIAL_INDEX_BUFFER_SIZE: usize = std::mem::size_of::<u16>() * MAX_BATCH_VERTICES as usize;

/// One batched draw request.
#[derive(Debug, Clone)]
pub struct BatchedDrawCommand {
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Up to two vertex stream formats; unused streams are `None`.
    pub formats: [StreamFormat; 2],
    /// Index synthesis mode; `None` for non-indexed accumulation.
    pub index_mode: IndexMode,
    /// Number of vertices this request appends.
    pub vertex_count: u32,
    /// Texture sampled by the draw, if any.
    pub texture: Option<Arc<Texture>>,
    /// Standard shader selection hint.
    pub shader: StandardShader,
}

impl BatchedDrawCommand {
    /// Create a request for untextured triangles in a single stream.
    pub fn triangles(format: StreamFormat, vertex_count: u32) -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            formats: [format, StreamFormat::None],
            index_mode: IndexMode::None,
            vertex_count,
            texture: None,
            shader: StandardShader::Default,
        }
    }

    /// Set the index synthesis mode.
    pub fn with_index_mode(mut self, mode: IndexMode) -> Self {
        self.index_mode = mode;
        self
    }

    /// Set the bound texture and switch to the textured standard shader.
    pub fn with_texture(mut self, texture: Arc<Texture>) -> Self {
        self.texture = Some(texture);
        self.shader = StandardShader::Textured;
        self
    }

    /// Set the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the second vertex stream format.
    pub fn with_second_stream(mut self, format: StreamFormat) -> Self {
        self.formats[1] = format;
        self
    }
}

/// Writable vertex regions for a batched draw request.
///
/// Each non-`None` stream of the request has a mapped byte region exactly
/// `stride * vertex_count` long. The caller fills them before the next
/// request or flush.
pub struct BatchedVertices<'a> {
    /// Mapped regions, one per stream.
    pub streams: [Option<&'a mut [u8]>; 2],
}

impl BatchedVertices<'_> {
    /// Mapped region of stream `index`.
    ///
    /// # Panics
    ///
    /// Panics if the request did not use that stream.
    pub fn stream(&mut self, index: usize) -> &mut [u8] {
        self.streams[index]
            .as_deref_mut()
            .expect("stream was not requested")
    }
}

/// Accumulates compatible draw requests and flushes them as one submission.
pub struct GeometryBatcher {
    vertex_buffers: [StreamBuffer; 2],
    index_buffer: StreamBuffer,

    topology: PrimitiveTopology,
    formats: [StreamFormat; 2],
    texture: Option<Arc<Texture>>,
    shader: StandardShader,

    vertex_count: u32,
    index_count: u32,
    flushing: bool,

    layout_cache: [[VertexLayoutId; StreamFormat::COUNT]; StreamFormat::COUNT],

    draw_calls: u64,
    draw_calls_batched: u64,
}

impl GeometryBatcher {
    /// Create an empty batcher with freshly allocated stream buffers.
    pub fn new(backend: &Arc<dyn GpuBackend>) -> Result<Self, GraphicsError> {
        Ok(Self {
            vertex_buffers: [
                StreamBuffer::new(backend, BufferUsage::VERTEX, INITIAL_VERTEX_BUFFER_SIZE, "batch_vertex0")?,
                StreamBuffer::new(backend, BufferUsage::VERTEX, INITIAL_VERTEX_BUFFER_SIZE, "batch_vertex1")?,
            ],
            index_buffer: StreamBuffer::new(
                backend,
                BufferUsage::INDEX,
                INITIAL_INDEX_BUFFER_SIZE,
                "batch_index",
            )?,
            topology: PrimitiveTopology::TriangleList,
            formats: [StreamFormat::None, StreamFormat::None],
            texture: None,
            shader: StandardShader::Default,
            vertex_count: 0,
            index_count: 0,
            flushing: false,
            layout_cache: [[VertexLayoutId::INVALID; StreamFormat::COUNT]; StreamFormat::COUNT],
            draw_calls: 0,
            draw_calls_batched: 0,
        })
    }

    /// Accumulated vertex count of the open batch.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Accumulated index count of the open batch.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Returns true if a batch is currently open.
    pub fn has_pending(&self) -> bool {
        self.vertex_count > 0 || self.index_count > 0
    }

    /// Total submissions issued.
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    /// Draw requests that merged into an already-open batch.
    pub fn draw_calls_batched(&self) -> u64 {
        self.draw_calls_batched
    }

    fn same_texture(&self, other: Option<&Arc<Texture>>) -> bool {
        self.texture.as_ref().map(|texture| texture.id()) == other.map(|texture| texture.id())
    }

    /// Append a draw request to the open batch, flushing first when the
    /// request is incompatible or the buffers are full.
    ///
    /// Returns mapped vertex regions for the caller to fill. Indices (when an
    /// index mode is requested) are synthesized internally, offset past the
    /// vertices already accumulated.
    pub fn request(
        &mut self,
        backend: &Arc<dyn GpuBackend>,
        registry: &mut VertexLayoutRegistry,
        cmd: &BatchedDrawCommand,
    ) -> Result<BatchedVertices<'_>, GraphicsError> {
        let indexed = cmd.index_mode != IndexMode::None;

        // A request this large can never be accumulated, no matter how often
        // we flush.
        if indexed && cmd.vertex_count > MAX_BATCH_VERTICES {
            return Err(GraphicsError::Misuse(format!(
                "indexed draw request with {} vertices exceeds the 16-bit index limit",
                cmd.vertex_count
            )));
        }

        let mut should_flush = cmd.topology != self.topology
            || cmd.formats[0] != self.formats[0]
            || cmd.formats[1] != self.formats[1]
            || indexed != (self.index_count > 0)
            || !self.same_texture(cmd.texture.as_ref())
            || cmd.shader != self.shader;

        let total_vertices = self.vertex_count + cmd.vertex_count;

        if indexed && total_vertices > MAX_BATCH_VERTICES {
            should_flush = true;
        }

        // Sizes the batch would need with this request appended, per stream
        // and for the index buffer.
        let mut grow_sizes = [0usize; 3];
        let mut should_grow = false;

        for (stream, format) in cmd.formats.iter().enumerate() {
            let stride = format.stride();
            if stride == 0 {
                continue;
            }
            let data_size = stride * total_vertices as usize;
            let buffer = &self.vertex_buffers[stream];

            if buffer.is_mapped() && data_size > buffer.usable_size() {
                should_flush = true;
            }
            if data_size > buffer.size() {
                grow_sizes[stream] = data_size.max(buffer.size() * 2);
                should_grow = true;
            }
        }

        let request_indices = cmd.index_mode.index_count(cmd.vertex_count as usize);
        if indexed {
            let data_size =
                (self.index_count as usize + request_indices) * std::mem::size_of::<u16>();
            if self.index_buffer.is_mapped() && data_size > self.index_buffer.usable_size() {
                should_flush = true;
            }
            if data_size > self.index_buffer.size() {
                grow_sizes[2] = data_size.max(self.index_buffer.size() * 2);
                should_grow = true;
            }
        }

        if should_flush || should_grow {
            self.flush(backend, registry)?;

            self.topology = cmd.topology;
            self.formats = cmd.formats;
            self.texture = cmd.texture.clone();
            self.shader = cmd.shader;
        }

        if should_grow {
            // Flush closed every mapping, so the old buffers can be replaced.
            for (stream, size) in grow_sizes.iter().take(2).enumerate() {
                if self.vertex_buffers[stream].size() < *size {
                    log::debug!("growing batch vertex stream {stream} to {size} bytes");
                    self.vertex_buffers[stream] = StreamBuffer::new(
                        backend,
                        BufferUsage::VERTEX,
                        *size,
                        &format!("batch_vertex{stream}"),
                    )?;
                }
            }
            if self.index_buffer.size() < grow_sizes[2] {
                log::debug!("growing batch index buffer to {} bytes", grow_sizes[2]);
                self.index_buffer =
                    StreamBuffer::new(backend, BufferUsage::INDEX, grow_sizes[2], "batch_index")?;
            }
        }

        // A frame's earlier batches may have consumed the front of a buffer;
        // wrap when the remainder can't hold this request. On real backends
        // the wrap waits for the GPU to release the prior ranges.
        for (stream, format) in cmd.formats.iter().enumerate() {
            let needed = format.stride() * cmd.vertex_count as usize;
            let buffer = &mut self.vertex_buffers[stream];
            if !buffer.is_mapped() && needed > buffer.usable_size() {
                buffer.next_frame();
            }
        }
        {
            let needed = request_indices * std::mem::size_of::<u16>();
            if !self.index_buffer.is_mapped() && needed > self.index_buffer.usable_size() {
                self.index_buffer.next_frame();
            }
        }

        // First request of a batch: attach the standard shader once.
        if self.vertex_count == 0 {
            backend.attach_default_shader(cmd.shader);
        } else {
            self.draw_calls_batched += 1;
        }

        // Degenerate counts (a strip/fan below three vertices, quads below
        // four) synthesize no indices; an empty mapping would stay open past
        // the flush, which only unmaps buffers it wrote to.
        if request_indices > 0 {
            let region = self
                .index_buffer
                .map_write(request_indices * std::mem::size_of::<u16>());
            let indices: &mut [u16] = bytemuck::cast_slice_mut(region);
            fill_indices(
                cmd.index_mode,
                self.vertex_count as u16,
                cmd.vertex_count as u16,
                indices,
            );
        }

        self.vertex_count += cmd.vertex_count;
        self.index_count += request_indices as u32;

        let [buffer0, buffer1] = &mut self.vertex_buffers;
        let mut streams = [None, None];
        if cmd.formats[0] != StreamFormat::None {
            streams[0] = Some(buffer0.map_write(cmd.formats[0].stride() * cmd.vertex_count as usize));
        }
        if cmd.formats[1] != StreamFormat::None {
            streams[1] = Some(buffer1.map_write(cmd.formats[1].stride() * cmd.vertex_count as usize));
        }

        Ok(BatchedVertices { streams })
    }

    /// Finalize the open batch into exactly one submission.
    ///
    /// No-op when nothing is accumulated, and guarded against re-entry:
    /// issuing the submission may trigger state changes that would otherwise
    /// flush again.
    pub fn flush(
        &mut self,
        backend: &Arc<dyn GpuBackend>,
        registry: &mut VertexLayoutRegistry,
    ) -> Result<(), GraphicsError> {
        if (self.vertex_count == 0 && self.index_count == 0) || self.flushing {
            return Ok(());
        }

        let cache_slot =
            &mut self.layout_cache[self.formats[0].index()][self.formats[1].index()];
        if !cache_slot.is_valid() {
            *cache_slot = registry.register(&composite_layout(self.formats));
        }
        let layout = *cache_slot;

        let mut used_sizes = [0usize; 2];
        let mut bindings: [Option<BufferBinding>; 2] = [None, None];

        for (stream, format) in self.formats.iter().enumerate() {
            let stride = format.stride();
            if stride == 0 {
                continue;
            }
            let used = stride * self.vertex_count as usize;
            let offset = self.vertex_buffers[stream].unmap(used);
            bindings[stream] = Some(BufferBinding {
                buffer: self.vertex_buffers[stream].buffer_id(),
                offset,
            });
            used_sizes[stream] = used;
        }

        let mut index_used = 0;
        let index = if self.index_count > 0 {
            index_used = self.index_count as usize * std::mem::size_of::<u16>();
            let offset = self.index_buffer.unmap(index_used);
            Some(IndexBinding {
                buffer: self.index_buffer.buffer_id(),
                offset,
                count: self.index_count,
            })
        } else {
            None
        };

        let submission = Submission {
            layout,
            vertex_buffers: bindings,
            index,
            topology: self.topology,
            vertex_count: self.vertex_count,
            texture: self.texture.as_ref().map(|texture| texture.id()),
        };

        self.flushing = true;
        let submit_result = backend.submit(&submission);
        self.flushing = false;
        submit_result?;

        for (stream, used) in used_sizes.iter().enumerate() {
            if *used > 0 {
                self.vertex_buffers[stream].mark_used(*used);
            }
        }
        if index_used > 0 {
            self.index_buffer.mark_used(index_used);
        }

        self.draw_calls += 1;
        self.vertex_count = 0;
        self.index_count = 0;

        Ok(())
    }

    /// Flush with the coordinate transform forced to identity.
    ///
    /// Batched vertices were already transformed when they were written, so
    /// no flush may see the current user transform. Every caller that holds
    /// a state stack goes through here rather than [`flush`](Self::flush).
    pub fn flush_under_identity(
        &mut self,
        backend: &Arc<dyn GpuBackend>,
        registry: &mut VertexLayoutRegistry,
        stack: &mut StateStack,
    ) -> Result<(), GraphicsError> {
        stack.push_identity_transform();
        let result = self.flush(backend, registry);
        stack.pop_transform();
        result
    }

    /// Drop any pending accumulation without submitting it.
    ///
    /// Used at context teardown, where no valid target surface is guaranteed
    /// to exist.
    pub fn discard(&mut self) {
        for buffer in &mut self.vertex_buffers {
            buffer.discard();
        }
        self.index_buffer.discard();
        self.vertex_count = 0;
        self.index_count = 0;
    }

    /// Advance the stream buffers to a new frame, reclaiming their capacity.
    pub fn next_frame(&mut self) {
        debug_assert!(!self.has_pending(), "batch left open across a frame");
        for buffer in &mut self.vertex_buffers {
            buffer.next_frame();
        }
        self.index_buffer.next_frame();
    }
}

impl std::fmt::Debug for GeometryBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryBatcher")
            .field("topology", &self.topology)
            .field("formats", &self.formats)
            .field("vertex_count", &self.vertex_count)
            .field("index_count", &self.index_count)
            .field("draw_calls", &self.draw_calls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::types::{TextureDescriptor, TextureFormat};
    use crate::vertex::XyVertex;

    struct Rig {
        dummy: Arc<DummyBackend>,
        backend: Arc<dyn GpuBackend>,
        registry: VertexLayoutRegistry,
        batcher: GeometryBatcher,
    }

    fn rig() -> Rig {
        let dummy = Arc::new(DummyBackend::new());
        let backend: Arc<dyn GpuBackend> = dummy.clone();
        let batcher = GeometryBatcher::new(&backend).unwrap();
        Rig {
            dummy,
            backend,
            registry: VertexLayoutRegistry::new(),
            batcher,
        }
    }

    fn write_xy(vertices: &mut [u8], count: usize) {
        let out: &mut [XyVertex] = bytemuck::cast_slice_mut(vertices);
        for (i, vertex) in out.iter_mut().enumerate().take(count) {
            *vertex = XyVertex {
                x: i as f32,
                y: i as f32,
            };
        }
    }

    #[test]
    fn test_compatible_requests_coalesce_into_one_submission() {
        let mut rig = rig();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);

        for _ in 0..5 {
            let mut vertices = rig
                .batcher
                .request(&rig.backend, &mut rig.registry, &cmd)
                .unwrap();
            write_xy(vertices.stream(0), 3);
        }
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();

        let submissions = rig.dummy.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].vertex_count, 15);
        assert!(submissions[0].index.is_none());
        assert_eq!(rig.batcher.draw_calls(), 1);
        assert_eq!(rig.batcher.draw_calls_batched(), 4);
    }

    #[test]
    fn test_texture_change_forces_flush() {
        let mut rig = rig();
        let texture = Texture::new(
            rig.backend.clone(),
            TextureDescriptor::new_2d(
                8,
                8,
                TextureFormat::Rgba8Unorm,
                crate::types::TextureUsage::TEXTURE_BINDING,
            ),
        )
        .unwrap();

        let plain = BatchedDrawCommand::triangles(StreamFormat::XyUv, 3);
        let textured = BatchedDrawCommand::triangles(StreamFormat::XyUv, 3).with_texture(texture);

        rig.batcher
            .request(&rig.backend, &mut rig.registry, &plain)
            .unwrap();
        rig.batcher
            .request(&rig.backend, &mut rig.registry, &textured)
            .unwrap();
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();

        let submissions = rig.dummy.submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].vertex_count, 3);
        assert_eq!(submissions[0].texture, None);
        assert_eq!(submissions[1].vertex_count, 3);
        assert!(submissions[1].texture.is_some());
    }

    #[test]
    fn test_topology_and_format_changes_force_flush() {
        let mut rig = rig();

        let triangles = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);
        let lines = BatchedDrawCommand::triangles(StreamFormat::Xy, 2)
            .with_topology(PrimitiveTopology::LineList);
        let uv = BatchedDrawCommand::triangles(StreamFormat::XyUv, 3);

        rig.batcher
            .request(&rig.backend, &mut rig.registry, &triangles)
            .unwrap();
        rig.batcher
            .request(&rig.backend, &mut rig.registry, &lines)
            .unwrap();
        rig.batcher
            .request(&rig.backend, &mut rig.registry, &uv)
            .unwrap();
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();

        assert_eq!(rig.dummy.submission_count(), 3);
    }

    #[test]
    fn test_quad_expansion() {
        let mut rig = rig();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 4)
            .with_index_mode(IndexMode::Quads);

        for _ in 0..3 {
            let mut vertices = rig
                .batcher
                .request(&rig.backend, &mut rig.registry, &cmd)
                .unwrap();
            write_xy(vertices.stream(0), 4);
        }
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();

        let submissions = rig.dummy.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].vertex_count, 12);
        let index = submissions[0].index.unwrap();
        assert_eq!(index.count, 18);
    }

    #[test]
    fn test_index_overflow_flushes_before_accumulating() {
        let mut rig = rig();
        let big = BatchedDrawCommand::triangles(StreamFormat::Xy, 40000)
            .with_index_mode(IndexMode::Fan);

        rig.batcher
            .request(&rig.backend, &mut rig.registry, &big)
            .unwrap();
        assert_eq!(rig.dummy.submission_count(), 0);

        // 40000 + 40000 > 65535, so the second request flushes the first.
        rig.batcher
            .request(&rig.backend, &mut rig.registry, &big)
            .unwrap();
        assert_eq!(rig.dummy.submission_count(), 1);
        assert_eq!(rig.dummy.submissions()[0].vertex_count, 40000);

        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();
        assert_eq!(rig.dummy.submission_count(), 2);
    }

    #[test]
    fn test_degenerate_indexed_request_flushes_cleanly() {
        let mut rig = rig();
        // Two strip vertices synthesize zero indices.
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 2)
            .with_topology(PrimitiveTopology::TriangleStrip)
            .with_index_mode(IndexMode::Strip);

        let mut vertices = rig
            .batcher
            .request(&rig.backend, &mut rig.registry, &cmd)
            .unwrap();
        write_xy(vertices.stream(0), 2);

        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();
        // The index buffer was never mapped, so the frame can turn over.
        rig.batcher.next_frame();

        let submissions = rig.dummy.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].vertex_count, 2);
        assert!(submissions[0].index.is_none());
    }

    #[test]
    fn test_single_oversized_indexed_request_is_misuse() {
        let mut rig = rig();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, MAX_BATCH_VERTICES + 1)
            .with_index_mode(IndexMode::Quads);

        let result = rig.batcher.request(&rig.backend, &mut rig.registry, &cmd);
        assert!(matches!(result, Err(GraphicsError::Misuse(_))));
        assert!(!rig.batcher.has_pending());
    }

    #[test]
    fn test_growth_replaces_buffer_and_flushes() {
        let mut rig = rig();
        // 70000 non-indexed Xy vertices need 560000 bytes; fits. Issue enough
        // to exceed the initial 1 MiB vertex buffer within one batch.
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 70000);

        rig.batcher
            .request(&rig.backend, &mut rig.registry, &cmd)
            .unwrap();
        rig.batcher
            .request(&rig.backend, &mut rig.registry, &cmd)
            .unwrap();

        // The second request needed 1120000 bytes total, beyond 1 MiB: the
        // first batch was flushed and the buffer replaced with a larger one.
        assert_eq!(rig.dummy.submission_count(), 1);

        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();
        let submissions = rig.dummy.submissions();
        assert_eq!(submissions.len(), 2);
        assert_ne!(
            submissions[0].vertex_buffers[0].unwrap().buffer,
            submissions[1].vertex_buffers[0].unwrap().buffer,
        );
    }

    #[test]
    fn test_growth_failure_is_fatal() {
        let mut rig = rig();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 70000);

        rig.batcher
            .request(&rig.backend, &mut rig.registry, &cmd)
            .unwrap();

        rig.dummy.set_fail_allocations(true);
        let result = rig.batcher.request(&rig.backend, &mut rig.registry, &cmd);
        assert!(matches!(result, Err(GraphicsError::OutOfMemory)));
    }

    #[test]
    fn test_flush_of_empty_batch_is_noop() {
        let mut rig = rig();
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();
        assert_eq!(rig.dummy.submission_count(), 0);
    }

    #[test]
    fn test_shader_attached_once_per_batch() {
        let mut rig = rig();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);

        for _ in 0..4 {
            rig.batcher
                .request(&rig.backend, &mut rig.registry, &cmd)
                .unwrap();
        }
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();

        assert_eq!(rig.dummy.shader_attachments().len(), 1);
    }

    #[test]
    fn test_layout_id_cached_per_format_pair() {
        let mut rig = rig();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);

        rig.batcher
            .request(&rig.backend, &mut rig.registry, &cmd)
            .unwrap();
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();
        rig.batcher
            .request(&rig.backend, &mut rig.registry, &cmd)
            .unwrap();
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();

        let submissions = rig.dummy.submissions();
        assert_eq!(submissions[0].layout, submissions[1].layout);
        assert_eq!(rig.registry.len(), 1);
    }

    #[test]
    fn test_discard_drops_pending_batch() {
        let mut rig = rig();
        let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, 3);

        rig.batcher
            .request(&rig.backend, &mut rig.registry, &cmd)
            .unwrap();
        rig.batcher.discard();

        assert!(!rig.batcher.has_pending());
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();
        assert_eq!(rig.dummy.submission_count(), 0);
    }

    #[test]
    fn test_written_vertices_total_matches_requests() {
        let mut rig = rig();

        let sizes = [3u32, 6, 9];
        for &size in &sizes {
            let cmd = BatchedDrawCommand::triangles(StreamFormat::Xy, size);
            let mut vertices = rig
                .batcher
                .request(&rig.backend, &mut rig.registry, &cmd)
                .unwrap();
            assert_eq!(
                vertices.stream(0).len(),
                StreamFormat::Xy.stride() * size as usize
            );
            write_xy(vertices.stream(0), size as usize);
        }
        rig.batcher.flush(&rig.backend, &mut rig.registry).unwrap();

        let total: u32 = sizes.iter().sum();
        assert_eq!(rig.dummy.submissions()[0].vertex_count, total);
    }
}
