//! GPU buffer resource.

use std::sync::Arc;

use crate::backend::{BufferId, GpuBackend};
use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, BufferUsage};

/// A GPU buffer resource.
///
/// Buffers are reference-counted via `Arc`; the backend object is destroyed
/// when the last reference drops.
pub struct Buffer {
    backend: Arc<dyn GpuBackend>,
    id: BufferId,
    descriptor: BufferDescriptor,
}

impl Buffer {
    /// Create a new buffer on the given backend.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        descriptor: BufferDescriptor,
    ) -> Result<Arc<Self>, GraphicsError> {
        let id = backend.create_buffer(&descriptor)?;
        Ok(Arc::new(Self {
            backend,
            id,
            descriptor,
        }))
    }

    /// Get the backend handle.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Write data into the buffer at the given byte offset.
    pub fn write(&self, offset: u64, data: &[u8]) {
        self.backend.write_buffer(self.id, offset, data);
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.backend.destroy_buffer(self.id);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);
