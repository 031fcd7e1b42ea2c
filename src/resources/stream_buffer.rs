//! Growable streaming buffer for CPU-to-GPU vertex/index data.
//!
//! A stream buffer accumulates per-frame geometry written by the CPU and
//! hands contiguous byte ranges to the GPU. Writes go into a CPU shadow
//! region ("mapping"); [`StreamBuffer::unmap`] uploads the written range and
//! returns its byte offset for draw bindings, and [`StreamBuffer::mark_used`]
//! retires the range so later maps in the same frame don't overwrite data the
//! GPU may still be reading.
//!
//! The buffer does not grow in place: when a batch needs more room than the
//! total capacity, the owner replaces it with a freshly created, larger one.
//! Wrapping back to offset zero ([`StreamBuffer::next_frame`]) may block on
//! real backends until the GPU has finished with the prior frame's contents.

use std::sync::Arc;

use crate::backend::{BufferId, GpuBackend};
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, BufferUsage};

struct MapState {
    start: usize,
    written: usize,
}

/// A growable streaming buffer with an open-map write cursor.
pub struct StreamBuffer {
    buffer: Arc<Buffer>,
    shadow: Vec<u8>,
    frame_offset: usize,
    map: Option<MapState>,
}

impl StreamBuffer {
    /// Create a new stream buffer with the given byte capacity.
    pub fn new(
        backend: &Arc<dyn GpuBackend>,
        usage: BufferUsage,
        size: usize,
        label: &str,
    ) -> Result<Self, GraphicsError> {
        let descriptor = BufferDescriptor::new(size as u64, usage | BufferUsage::STREAM)
            .with_label(format!("{label}_stream"));
        let buffer = Buffer::new(backend.clone(), descriptor)?;

        Ok(Self {
            buffer,
            shadow: vec![0; size],
            frame_offset: 0,
            map: None,
        })
    }

    /// Backend handle of the underlying buffer.
    pub fn buffer_id(&self) -> BufferId {
        self.buffer.id()
    }

    /// Total capacity in bytes.
    pub fn size(&self) -> usize {
        self.shadow.len()
    }

    /// Bytes still available this frame.
    pub fn usable_size(&self) -> usize {
        self.shadow.len() - self.frame_offset
    }

    /// Returns true if a mapping is open.
    pub fn is_mapped(&self) -> bool {
        self.map.is_some()
    }

    /// Bytes written into the current mapping.
    pub fn mapped_len(&self) -> usize {
        self.map.as_ref().map(|map| map.written).unwrap_or(0)
    }

    /// Append `len` writable bytes to the current mapping, opening one at the
    /// frame cursor if none is open.
    ///
    /// The caller must have checked [`usable_size`](Self::usable_size); the
    /// batcher flushes or grows before a mapping could run past capacity.
    pub fn map_write(&mut self, len: usize) -> &mut [u8] {
        let map = self.map.get_or_insert(MapState {
            start: self.frame_offset,
            written: 0,
        });

        let begin = map.start + map.written;
        debug_assert!(begin + len <= self.shadow.len(), "mapping past capacity");
        map.written += len;
        &mut self.shadow[begin..begin + len]
    }

    /// Upload the first `used` bytes of the current mapping and close it.
    ///
    /// Returns the byte offset of the uploaded range for draw bindings.
    pub fn unmap(&mut self, used: usize) -> u64 {
        let Some(map) = self.map.take() else {
            return self.frame_offset as u64;
        };
        debug_assert!(used <= map.written, "unmapping more than was written");

        let start = map.start;
        self.buffer
            .write(start as u64, &self.shadow[start..start + used]);
        start as u64
    }

    /// Retire `used` bytes as GPU-in-use, advancing the frame cursor.
    pub fn mark_used(&mut self, used: usize) {
        debug_assert!(self.frame_offset + used <= self.shadow.len());
        self.frame_offset += used;
    }

    /// Drop the current mapping without uploading anything.
    pub fn discard(&mut self) {
        self.map = None;
    }

    /// Start a new frame, reclaiming the full capacity.
    ///
    /// On real backends this is where the implicit wait for the GPU to finish
    /// reading the previous frame's ranges happens.
    pub fn next_frame(&mut self) {
        debug_assert!(self.map.is_none(), "mapping left open across a frame");
        self.frame_offset = 0;
    }
}

impl std::fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("size", &self.shadow.len())
            .field("frame_offset", &self.frame_offset)
            .field("mapped", &self.is_mapped())
            .field("buffer", &self.buffer.label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn test_backend() -> Arc<dyn GpuBackend> {
        Arc::new(DummyBackend::new())
    }

    fn new_stream(size: usize) -> StreamBuffer {
        StreamBuffer::new(&test_backend(), BufferUsage::VERTEX, size, "test").unwrap()
    }

    #[test]
    fn test_map_appends() {
        let mut stream = new_stream(64);

        stream.map_write(16).fill(0xAA);
        stream.map_write(8).fill(0xBB);
        assert_eq!(stream.mapped_len(), 24);

        let offset = stream.unmap(24);
        assert_eq!(offset, 0);
        assert!(!stream.is_mapped());
    }

    #[test]
    fn test_mark_used_advances_frame_cursor() {
        let mut stream = new_stream(64);

        stream.map_write(16);
        stream.unmap(16);
        stream.mark_used(16);
        assert_eq!(stream.usable_size(), 48);

        // The next mapping starts past the retired range.
        stream.map_write(8);
        let offset = stream.unmap(8);
        assert_eq!(offset, 16);
    }

    #[test]
    fn test_next_frame_reclaims_capacity() {
        let mut stream = new_stream(64);
        stream.map_write(32);
        stream.unmap(32);
        stream.mark_used(32);

        stream.next_frame();
        assert_eq!(stream.usable_size(), 64);
    }

    #[test]
    fn test_discard_drops_mapping() {
        let mut stream = new_stream(64);
        stream.map_write(32);
        stream.discard();
        assert!(!stream.is_mapped());
        assert_eq!(stream.usable_size(), 64);
    }
}
