//! Transient GPU resource pooling with frame-based eviction.
//!
//! Short-lived render targets and buffers (implicit depth/stencil surfaces,
//! scratch copies) are expensive to allocate but frequently needed for a
//! frame or two. The pool caches them between uses and evicts entries that
//! sit idle for [`DEFAULT_EVICTION_FRAMES`] consecutive frames, bounding
//! memory without reallocating every frame.
//!
//! Entries are tracked with an idle-frame counter; the sentinel `-1` marks an
//! entry as currently borrowed. A borrowed entry is never handed out again
//! and never evicted until it is released.

use std::sync::Arc;

use crate::error::GraphicsError;
use crate::resources::{Buffer, Texture};
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Frames an entry may sit idle before it is destroyed.
pub const DEFAULT_EVICTION_FRAMES: i32 = 4;

/// A resource type that can live in a [`ResourcePool`].
pub trait PoolResource {
    /// Descriptor used to find a matching cached entry.
    type Descriptor;

    /// Returns true if this resource can satisfy a request for `descriptor`.
    fn matches(&self, descriptor: &Self::Descriptor) -> bool;
}

impl PoolResource for Texture {
    type Descriptor = TextureDescriptor;

    fn matches(&self, descriptor: &TextureDescriptor) -> bool {
        let own = self.descriptor();
        own.format == descriptor.format
            && own.size == descriptor.size
            && own.sample_count == descriptor.sample_count
    }
}

impl PoolResource for Buffer {
    type Descriptor = BufferDescriptor;

    fn matches(&self, descriptor: &BufferDescriptor) -> bool {
        self.descriptor().matches(descriptor)
    }
}

struct PoolEntry<T> {
    resource: Arc<T>,
    /// -1 while borrowed, otherwise the number of consecutive idle frames.
    frames_since_use: i32,
}

/// Pool of transient GPU resources, evicted after a few idle frames.
pub struct ResourcePool<T: PoolResource> {
    entries: Vec<PoolEntry<T>>,
    eviction_frames: i32,
}

/// Pool of transient textures (implicit depth/stencil surfaces).
pub type TexturePool = ResourcePool<Texture>;

/// Pool of transient buffers.
pub type BufferPool = ResourcePool<Buffer>;

impl<T: PoolResource> ResourcePool<T> {
    /// Create an empty pool with the default eviction threshold.
    pub fn new() -> Self {
        Self::with_eviction_frames(DEFAULT_EVICTION_FRAMES)
    }

    /// Create an empty pool with a custom eviction threshold.
    pub fn with_eviction_frames(eviction_frames: i32) -> Self {
        Self {
            entries: Vec::new(),
            eviction_frames,
        }
    }

    /// Borrow a resource matching `descriptor`, creating one with `create`
    /// when no idle match exists.
    ///
    /// The returned resource is not handed out again until
    /// [`release`](Self::release) is called for it.
    pub fn acquire(
        &mut self,
        descriptor: &T::Descriptor,
        create: impl FnOnce() -> Result<Arc<T>, GraphicsError>,
    ) -> Result<Arc<T>, GraphicsError> {
        for entry in &mut self.entries {
            if entry.frames_since_use < 0 {
                continue;
            }
            if entry.resource.matches(descriptor) {
                entry.frames_since_use = -1;
                return Ok(entry.resource.clone());
            }
        }

        let resource = create()?;
        self.entries.push(PoolEntry {
            resource: resource.clone(),
            frames_since_use: -1,
        });
        Ok(resource)
    }

    /// Return a borrowed resource to the pool.
    ///
    /// Resources are matched by identity. Releasing something the pool does
    /// not own is a logged no-op.
    pub fn release(&mut self, resource: &Arc<T>) {
        for entry in &mut self.entries {
            if Arc::ptr_eq(&entry.resource, resource) {
                entry.frames_since_use = 0;
                return;
            }
        }
        log::warn!("released a resource the pool does not own");
    }

    /// Advance the frame boundary: age idle entries and evict stale ones.
    ///
    /// Must be called exactly once per frame. Borrowed entries are skipped.
    pub fn advance_frame(&mut self) {
        let threshold = self.eviction_frames;
        self.entries.retain_mut(|entry| {
            if entry.frames_since_use < 0 {
                return true;
            }
            entry.frames_since_use += 1;
            entry.frames_since_use < threshold
        });
    }

    /// Destroy every entry unconditionally. Used at shutdown.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries currently cached (borrowed or idle).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the pool holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: PoolResource> Default for ResourcePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, GpuBackend};
    use crate::types::TextureFormat;

    fn target_desc(width: u32) -> TextureDescriptor {
        TextureDescriptor::render_target(width, 64, TextureFormat::Depth24UnormStencil8, 1)
    }

    fn pool_and_backend() -> (TexturePool, Arc<DummyBackend>) {
        (TexturePool::new(), Arc::new(DummyBackend::new()))
    }

    fn acquire(
        pool: &mut TexturePool,
        backend: &Arc<DummyBackend>,
        desc: &TextureDescriptor,
    ) -> Arc<Texture> {
        let backend: Arc<dyn GpuBackend> = backend.clone();
        pool.acquire(desc, || Texture::new(backend.clone(), desc.clone()))
            .unwrap()
    }

    #[test]
    fn test_reuse_below_threshold() {
        let (mut pool, backend) = pool_and_backend();
        let desc = target_desc(128);

        let first = acquire(&mut pool, &backend, &desc);
        let first_id = first.id();
        pool.release(&first);
        drop(first);

        for _ in 0..DEFAULT_EVICTION_FRAMES - 1 {
            pool.advance_frame();
        }

        let second = acquire(&mut pool, &backend, &desc);
        assert_eq!(second.id(), first_id);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_eviction_at_threshold() {
        let (mut pool, backend) = pool_and_backend();
        let desc = target_desc(128);

        let first = acquire(&mut pool, &backend, &desc);
        let first_id = first.id();
        pool.release(&first);
        drop(first);

        for _ in 0..DEFAULT_EVICTION_FRAMES {
            pool.advance_frame();
        }

        assert!(pool.is_empty());
        assert_eq!(backend.destroyed_textures(), vec![first_id]);

        let second = acquire(&mut pool, &backend, &desc);
        assert_ne!(second.id(), first_id);
    }

    #[test]
    fn test_borrowed_entries_never_evicted_or_reused() {
        let (mut pool, backend) = pool_and_backend();
        let desc = target_desc(128);

        let borrowed = acquire(&mut pool, &backend, &desc);

        for _ in 0..DEFAULT_EVICTION_FRAMES * 2 {
            pool.advance_frame();
        }
        assert_eq!(pool.len(), 1);
        assert!(backend.destroyed_textures().is_empty());

        // A concurrent request for the same descriptor gets a new resource.
        let other = acquire(&mut pool, &backend, &desc);
        assert_ne!(borrowed.id(), other.id());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_acquire_matches_descriptor() {
        let (mut pool, backend) = pool_and_backend();

        let small = acquire(&mut pool, &backend, &target_desc(64));
        pool.release(&small);

        let large = acquire(&mut pool, &backend, &target_desc(256));
        assert_ne!(small.id(), large.id());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_clear_destroys_everything() {
        let (mut pool, backend) = pool_and_backend();
        let desc = target_desc(128);

        let texture = acquire(&mut pool, &backend, &desc);
        let id = texture.id();
        pool.release(&texture);
        drop(texture);

        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(backend.destroyed_textures(), vec![id]);
    }

    #[test]
    fn test_release_of_unknown_resource_is_noop() {
        let (mut pool, backend) = pool_and_backend();
        let backend_dyn: Arc<dyn GpuBackend> = backend.clone();
        let stray = Texture::new(backend_dyn, target_desc(32)).unwrap();

        pool.release(&stray);
        assert!(pool.is_empty());
    }
}
