//! Render-target sets and the target binder.
//!
//! A [`RenderTargetSet`] names the color attachments a pass draws into, an
//! optional explicit depth/stencil attachment, and flags requesting a
//! temporary depth/stencil surface synthesized from the texture pool. The
//! [`RenderTargetBinder`] validates a requested set in full before touching
//! any state, flushes pending batched geometry, installs the set on the
//! backend, and keeps the per-target bookkeeping (switch counter, default
//! projection, deferred mipmap regeneration) consistent.
//!
//! Binding is transactional: a set that fails validation leaves the
//! previously bound set current.

use std::sync::Arc;

use bitflags::bitflags;
use glam::Mat4;

use crate::backend::{AttachmentRef, GpuBackend};
use crate::batch::GeometryBatcher;
use crate::error::GraphicsError;
use crate::pool::TexturePool;
use crate::resources::Texture;
use crate::state::StateStack;
use crate::types::{Extent2d, TextureDescriptor, TextureFormat, TextureUsage};
use crate::vertex::VertexLayoutRegistry;

bitflags! {
    /// Request flags for a pool-synthesized depth/stencil attachment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TemporaryTargetFlags: u32 {
        /// The pass needs a depth component.
        const DEPTH = 1 << 0;
        /// The pass needs a stencil component.
        const STENCIL = 1 << 1;
    }
}

impl Default for TemporaryTargetFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// One attachment of a render-target set: a texture plus the mip level and
/// array slice receiving draw output.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    /// The attached texture.
    pub texture: Arc<Texture>,
    /// Mip level receiving draw output.
    pub mipmap: u32,
    /// Array slice receiving draw output.
    pub slice: u32,
}

impl RenderTarget {
    /// Attach the base level of a texture.
    pub fn new(texture: Arc<Texture>) -> Self {
        Self {
            texture,
            mipmap: 0,
            slice: 0,
        }
    }

    /// Select the mip level receiving draw output.
    pub fn with_mipmap(mut self, mipmap: u32) -> Self {
        self.mipmap = mipmap;
        self
    }

    /// Select the array slice receiving draw output.
    pub fn with_slice(mut self, slice: u32) -> Self {
        self.slice = slice;
        self
    }

    /// Pixel dimensions of the attached mip level.
    pub fn pixel_size(&self) -> Extent2d {
        Extent2d::new(
            self.texture.pixel_width(self.mipmap),
            self.texture.pixel_height(self.mipmap),
        )
    }

    fn attachment(&self) -> AttachmentRef {
        AttachmentRef {
            texture: self.texture.id(),
            mipmap: self.mipmap,
            slice: self.slice,
        }
    }
}

impl PartialEq for RenderTarget {
    fn eq(&self, other: &Self) -> bool {
        self.texture.id() == other.texture.id()
            && self.mipmap == other.mipmap
            && self.slice == other.slice
    }
}

impl Eq for RenderTarget {}

/// A set of render targets requested for drawing.
///
/// An empty set (no colors, no depth/stencil) stands for the backbuffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderTargetSet {
    /// Color attachments, in binding order.
    pub colors: Vec<RenderTarget>,
    /// Explicit depth/stencil attachment.
    pub depth_stencil: Option<RenderTarget>,
    /// Requested temporary depth/stencil components. Ignored when an
    /// explicit depth/stencil attachment is present.
    pub temporary: TemporaryTargetFlags,
}

impl RenderTargetSet {
    /// Create an empty set (the backbuffer).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a color attachment.
    pub fn with_color(mut self, target: RenderTarget) -> Self {
        self.colors.push(target);
        self
    }

    /// Attach an explicit depth/stencil target.
    pub fn with_depth_stencil(mut self, target: RenderTarget) -> Self {
        self.depth_stencil = Some(target);
        self
    }

    /// Request temporary depth/stencil components.
    pub fn with_temporary(mut self, flags: TemporaryTargetFlags) -> Self {
        self.temporary = flags;
        self
    }

    /// Returns true if this set stands for the backbuffer.
    pub fn is_backbuffer(&self) -> bool {
        self.colors.is_empty() && self.depth_stencil.is_none()
    }

    /// Pixel dimensions of the set, taken from its first attachment.
    pub fn pixel_size(&self) -> Option<Extent2d> {
        self.colors
            .first()
            .or(self.depth_stencil.as_ref())
            .map(RenderTarget::pixel_size)
    }
}

/// Validates and installs render-target sets, tracking the bookkeeping that
/// goes with every switch.
pub struct RenderTargetBinder {
    current: RenderTargetSet,
    backbuffer_size: Extent2d,
    projection: Mat4,
    switch_count: u64,
}

impl RenderTargetBinder {
    /// Create a binder currently bound to a backbuffer of the given size.
    pub fn new(backbuffer_size: Extent2d) -> Self {
        Self {
            current: RenderTargetSet::new(),
            backbuffer_size,
            projection: ortho_projection(backbuffer_size),
            switch_count: 0,
        }
    }

    /// The currently bound set. Empty means the backbuffer.
    pub fn current(&self) -> &RenderTargetSet {
        &self.current
    }

    /// Number of target switches that actually reached the backend.
    pub fn switch_count(&self) -> u64 {
        self.switch_count
    }

    /// Default orthographic projection for the bound pixel dimensions.
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Pixel dimensions of the bound set.
    pub fn pixel_size(&self) -> Extent2d {
        self.current.pixel_size().unwrap_or(self.backbuffer_size)
    }

    /// Resize the backbuffer. Takes effect on the next backbuffer bind.
    pub fn set_backbuffer_size(&mut self, size: Extent2d) {
        self.backbuffer_size = size;
        if self.current.is_backbuffer() {
            self.projection = ortho_projection(size);
        }
    }

    /// Bind a render-target set.
    ///
    /// Binding the already-bound set is a no-op. Validation runs in full
    /// before any state changes; a failed bind leaves the previous set
    /// current. Binding an empty set restores the backbuffer.
    pub fn bind(
        &mut self,
        backend: &Arc<dyn GpuBackend>,
        batcher: &mut GeometryBatcher,
        registry: &mut VertexLayoutRegistry,
        stack: &mut StateStack,
        texture_pool: &mut TexturePool,
        set: &RenderTargetSet,
    ) -> Result<(), GraphicsError> {
        if set.is_backbuffer() {
            return self.unbind(backend, batcher, registry, stack);
        }
        if *set == self.current {
            return Ok(());
        }

        let pixel_size = self.validate(backend, set)?;

        batcher.flush_under_identity(backend, registry, stack)?;

        // Flags only matter when no explicit depth/stencil is attached. The
        // surface goes straight back to the pool; it stays alive there and
        // a later bind with the same dimensions picks it up again.
        let mut synthesized = None;
        if set.depth_stencil.is_none() && !set.temporary.is_empty() {
            let sample_count = set.colors[0].texture.sample_count();
            let texture =
                synthesize_depth_stencil(backend, texture_pool, set.temporary, pixel_size, sample_count)?;
            texture_pool.release(&texture);
            synthesized = Some(texture);
        }

        let colors: Vec<AttachmentRef> = set.colors.iter().map(RenderTarget::attachment).collect();
        let depth_stencil = set
            .depth_stencil
            .as_ref()
            .map(RenderTarget::attachment)
            .or_else(|| {
                synthesized.as_ref().map(|texture| AttachmentRef {
                    texture: texture.id(),
                    mipmap: 0,
                    slice: 0,
                })
            });

        backend.set_render_targets(&colors, depth_stencil, pixel_size)?;

        self.regenerate_previous_mipmaps(backend);
        self.current = set.clone();
        self.switch_count += 1;
        self.projection = ortho_projection(pixel_size);

        // A surface fresh from the pool carries stale contents.
        if synthesized.is_some() {
            backend.clear_depth_stencil(1.0, 0);
        }

        Ok(())
    }

    /// Restore the backbuffer. No-op when nothing else is bound.
    pub fn unbind(
        &mut self,
        backend: &Arc<dyn GpuBackend>,
        batcher: &mut GeometryBatcher,
        registry: &mut VertexLayoutRegistry,
        stack: &mut StateStack,
    ) -> Result<(), GraphicsError> {
        if self.current.is_backbuffer() {
            return Ok(());
        }

        batcher.flush_under_identity(backend, registry, stack)?;
        backend.set_render_targets(&[], None, self.backbuffer_size)?;

        self.regenerate_previous_mipmaps(backend);
        self.current = RenderTargetSet::new();
        self.switch_count += 1;
        self.projection = ortho_projection(self.backbuffer_size);

        Ok(())
    }

    /// Full validation of a requested set, before any mutation.
    fn validate(
        &self,
        backend: &Arc<dyn GpuBackend>,
        set: &RenderTargetSet,
    ) -> Result<Extent2d, GraphicsError> {
        if set.colors.is_empty() {
            return Err(GraphicsError::Validation(
                "a render-target set needs at least one color attachment".into(),
            ));
        }
        if set.colors.len() > backend.max_color_targets() as usize {
            return Err(GraphicsError::Validation(format!(
                "{} color targets exceed the device limit of {}",
                set.colors.len(),
                backend.max_color_targets()
            )));
        }

        let first = &set.colors[0];
        let pixel_size = first.pixel_size();
        let sample_count = first.texture.sample_count();

        for (index, target) in set.colors.iter().enumerate() {
            validate_target(backend, target, &format!("color target {index}"))?;
            if target.texture.format().is_depth_stencil() {
                return Err(GraphicsError::Validation(format!(
                    "color target {index} has depth/stencil format {:?}",
                    target.texture.format()
                )));
            }
            if target.pixel_size() != pixel_size {
                return Err(GraphicsError::Validation(format!(
                    "color target {index} is {}x{} but the set is {}x{}",
                    target.pixel_size().width,
                    target.pixel_size().height,
                    pixel_size.width,
                    pixel_size.height
                )));
            }
            if target.texture.sample_count() != sample_count {
                return Err(GraphicsError::Validation(format!(
                    "color target {index} has {} samples but the set has {}",
                    target.texture.sample_count(),
                    sample_count
                )));
            }
        }

        if let Some(target) = &set.depth_stencil {
            validate_target(backend, target, "depth/stencil target")?;
            if !target.texture.format().is_depth_stencil() {
                return Err(GraphicsError::Validation(format!(
                    "depth/stencil target has color format {:?}",
                    target.texture.format()
                )));
            }
            if target.pixel_size() != pixel_size {
                return Err(GraphicsError::Validation(
                    "depth/stencil target dimensions do not match the color targets".into(),
                ));
            }
            if target.texture.sample_count() != sample_count {
                return Err(GraphicsError::Validation(
                    "depth/stencil target sample count does not match the color targets".into(),
                ));
            }
        }

        Ok(pixel_size)
    }

    /// Queue mipmap regeneration for the color targets being switched away
    /// from. Only base-level attachments of auto-mipmap textures qualify.
    fn regenerate_previous_mipmaps(&self, backend: &Arc<dyn GpuBackend>) {
        for target in &self.current.colors {
            if target.mipmap == 0
                && target.texture.mipmap_mode() == crate::types::MipmapMode::Auto
                && target.texture.mipmap_count() > 1
            {
                backend.generate_mipmaps(target.texture.id());
            }
        }
    }
}

impl std::fmt::Debug for RenderTargetBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTargetBinder")
            .field("colors", &self.current.colors.len())
            .field("backbuffer", &self.current.is_backbuffer())
            .field("switch_count", &self.switch_count)
            .finish()
    }
}

fn validate_target(
    backend: &Arc<dyn GpuBackend>,
    target: &RenderTarget,
    what: &str,
) -> Result<(), GraphicsError> {
    let texture = &target.texture;
    if !texture.is_render_target() {
        return Err(GraphicsError::Validation(format!(
            "{what} was not created with render-attachment usage"
        )));
    }
    if target.mipmap >= texture.mipmap_count() {
        return Err(GraphicsError::Validation(format!(
            "{what} mip level {} out of range (texture has {})",
            target.mipmap,
            texture.mipmap_count()
        )));
    }
    if !texture.is_valid_slice(target.slice) {
        return Err(GraphicsError::Validation(format!(
            "{what} slice {} out of range",
            target.slice
        )));
    }
    if !backend.supports_format(texture.format(), TextureUsage::RENDER_ATTACHMENT) {
        return Err(GraphicsError::Validation(format!(
            "{what} format {:?} is not renderable on this device",
            texture.format()
        )));
    }
    Ok(())
}

/// Candidate formats for a synthesized depth/stencil surface, best precision
/// first.
fn depth_stencil_candidates(flags: TemporaryTargetFlags) -> &'static [TextureFormat] {
    use TextureFormat as F;
    let depth = flags.contains(TemporaryTargetFlags::DEPTH);
    let stencil = flags.contains(TemporaryTargetFlags::STENCIL);
    match (depth, stencil) {
        (true, true) => &[F::Depth24UnormStencil8, F::Depth32FloatStencil8],
        (true, false) => &[
            F::Depth24Unorm,
            F::Depth32Float,
            F::Depth16Unorm,
            F::Depth24UnormStencil8,
            F::Depth32FloatStencil8,
        ],
        (false, true) => &[F::Stencil8, F::Depth24UnormStencil8, F::Depth32FloatStencil8],
        (false, false) => &[],
    }
}

fn synthesize_depth_stencil(
    backend: &Arc<dyn GpuBackend>,
    pool: &mut TexturePool,
    flags: TemporaryTargetFlags,
    pixel_size: Extent2d,
    sample_count: u32,
) -> Result<Arc<Texture>, GraphicsError> {
    let format = depth_stencil_candidates(flags)
        .iter()
        .copied()
        .find(|format| backend.supports_format(*format, TextureUsage::RENDER_ATTACHMENT))
        .ok_or_else(|| {
            GraphicsError::ResourceCreationFailed(format!(
                "no renderable depth/stencil format for {flags:?}"
            ))
        })?;

    let descriptor =
        TextureDescriptor::render_target(pixel_size.width, pixel_size.height, format, sample_count)
            .with_label("temporary_depth_stencil");
    pool.acquire(&descriptor, || Texture::new(backend.clone(), descriptor.clone()))
}

/// Orthographic projection mapping pixel coordinates to clip space, origin
/// top-left, y down.
fn ortho_projection(size: Extent2d) -> Mat4 {
    Mat4::orthographic_rh(
        0.0,
        size.width.max(1) as f32,
        size.height.max(1) as f32,
        0.0,
        -10.0,
        10.0,
    )
}
