//! Texture types and descriptors.

use super::Extent2d;
use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,

    // Depth/stencil formats
    /// 8-bit stencil.
    Stencil8,
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth.
    Depth24Unorm,
    /// 32-bit depth, float.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24UnormStencil8,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Stencil8
                | Self::Depth16Unorm
                | Self::Depth24Unorm
                | Self::Depth32Float
                | Self::Depth24UnormStencil8
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a depth component.
    pub fn has_depth(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24Unorm
                | Self::Depth32Float
                | Self::Depth24UnormStencil8
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            Self::Stencil8 | Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this is an sRGB format.
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb)
    }

    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm | Self::Stencil8 => 1,
            Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Depth24Unorm
            | Self::Depth24UnormStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// How mipmaps for a texture are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipmapMode {
    /// No mipmaps beyond the base level.
    #[default]
    None,
    /// Mipmaps are filled in manually by the caller.
    Manual,
    /// Mipmaps are regenerated automatically after the texture is rendered to.
    Auto,
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Size of the texture.
    pub size: Extent2d,
    /// Number of array layers (1 for plain 2D textures).
    pub layer_count: u32,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
    /// Mipmap generation mode.
    pub mipmap_mode: MipmapMode,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent2d::new(width, height),
            layer_count: 1,
            mip_level_count: 1,
            sample_count: 1,
            format,
            usage,
            mipmap_mode: MipmapMode::None,
        }
    }

    /// Create a render-target descriptor, optionally multisampled.
    pub fn render_target(width: u32, height: u32, format: TextureFormat, samples: u32) -> Self {
        let mut desc = Self::new_2d(
            width,
            height,
            format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        );
        desc.sample_count = samples.max(1);
        desc
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Set the array layer count.
    pub fn with_layers(mut self, count: u32) -> Self {
        self.layer_count = count;
        self
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Set the mipmap generation mode.
    pub fn with_mipmap_mode(mut self, mode: MipmapMode) -> Self {
        self.mipmap_mode = mode;
        self
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            size: Extent2d::default(),
            layer_count: 1,
            mip_level_count: 1,
            sample_count: 1,
            format: TextureFormat::default(),
            usage: TextureUsage::empty(),
            mipmap_mode: MipmapMode::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_stencil_roles() {
        assert!(TextureFormat::Depth24UnormStencil8.is_depth_stencil());
        assert!(TextureFormat::Depth24UnormStencil8.has_depth());
        assert!(TextureFormat::Depth24UnormStencil8.has_stencil());

        assert!(TextureFormat::Stencil8.is_depth_stencil());
        assert!(!TextureFormat::Stencil8.has_depth());
        assert!(TextureFormat::Stencil8.has_stencil());

        assert!(TextureFormat::Depth32Float.has_depth());
        assert!(!TextureFormat::Depth32Float.has_stencil());

        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn test_render_target_descriptor() {
        let desc = TextureDescriptor::render_target(256, 128, TextureFormat::Rgba8Unorm, 4);
        assert_eq!(desc.size, Extent2d::new(256, 128));
        assert_eq!(desc.sample_count, 4);
        assert!(desc.usage.contains(TextureUsage::RENDER_ATTACHMENT));

        // Sample count is clamped to at least 1.
        let desc = TextureDescriptor::render_target(8, 8, TextureFormat::Depth24Unorm, 0);
        assert_eq!(desc.sample_count, 1);
    }
}
