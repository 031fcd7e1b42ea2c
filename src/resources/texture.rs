//! GPU texture resource.

use std::sync::Arc;

use crate::backend::{GpuBackend, TextureId};
use crate::error::GraphicsError;
use crate::types::{Extent2d, MipmapMode, TextureDescriptor, TextureFormat, TextureUsage};

/// A GPU texture resource.
///
/// Textures are reference-counted via `Arc`; the backend object is destroyed
/// when the last reference drops.
pub struct Texture {
    backend: Arc<dyn GpuBackend>,
    id: TextureId,
    descriptor: TextureDescriptor,
}

impl Texture {
    /// Create a new texture on the given backend.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        descriptor: TextureDescriptor,
    ) -> Result<Arc<Self>, GraphicsError> {
        let id = backend.create_texture(&descriptor)?;
        Ok(Arc::new(Self {
            backend,
            id,
            descriptor,
        }))
    }

    /// Get the backend handle.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the base-level size.
    pub fn size(&self) -> Extent2d {
        self.descriptor.size
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the sample count.
    pub fn sample_count(&self) -> u32 {
        self.descriptor.sample_count
    }

    /// Get the mip level count.
    pub fn mipmap_count(&self) -> u32 {
        self.descriptor.mip_level_count
    }

    /// Get the mipmap generation mode.
    pub fn mipmap_mode(&self) -> MipmapMode {
        self.descriptor.mipmap_mode
    }

    /// Returns true if this texture can receive draw output.
    pub fn is_render_target(&self) -> bool {
        self.descriptor.usage.contains(TextureUsage::RENDER_ATTACHMENT)
    }

    /// Pixel width of the given mip level.
    pub fn pixel_width(&self, mipmap: u32) -> u32 {
        (self.descriptor.size.width >> mipmap).max(1)
    }

    /// Pixel height of the given mip level.
    pub fn pixel_height(&self, mipmap: u32) -> u32 {
        (self.descriptor.size.height >> mipmap).max(1)
    }

    /// Returns true if `slice` addresses a valid array layer.
    pub fn is_valid_slice(&self, slice: u32) -> bool {
        slice < self.descriptor.layer_count
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.backend.destroy_texture(self.id);
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn test_backend() -> Arc<dyn GpuBackend> {
        Arc::new(DummyBackend::new())
    }

    #[test]
    fn test_mip_dimensions() {
        let desc = TextureDescriptor::new_2d(
            256,
            64,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        )
        .with_mip_levels(9);
        let texture = Texture::new(test_backend(), desc).unwrap();

        assert_eq!(texture.pixel_width(0), 256);
        assert_eq!(texture.pixel_width(4), 16);
        assert_eq!(texture.pixel_height(4), 4);
        // Dimensions never shrink below one pixel.
        assert_eq!(texture.pixel_height(8), 1);
    }

    #[test]
    fn test_drop_destroys_backend_texture() {
        let backend = Arc::new(DummyBackend::new());
        let desc = TextureDescriptor::render_target(16, 16, TextureFormat::Rgba8Unorm, 1);
        let texture = Texture::new(backend.clone(), desc).unwrap();
        let id = texture.id();

        assert!(backend.destroyed_textures().is_empty());
        drop(texture);
        assert_eq!(backend.destroyed_textures(), vec![id]);
    }

    #[test]
    fn test_render_target_capability() {
        let backend = test_backend();
        let rt = Texture::new(
            backend.clone(),
            TextureDescriptor::render_target(8, 8, TextureFormat::Rgba8Unorm, 1),
        )
        .unwrap();
        assert!(rt.is_render_target());

        let sampled = Texture::new(
            backend,
            TextureDescriptor::new_2d(
                8,
                8,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ),
        )
        .unwrap();
        assert!(!sampled.is_render_target());
    }
}
