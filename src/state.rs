//! Render state snapshots and the save/restore stack.
//!
//! [`DisplayState`] is the full CPU-side render state a frame draws with.
//! The [`StateStack`] saves and restores it in a strictly balanced,
//! depth-bounded way: every push duplicates the coordinate transform, and a
//! [`StackType::All`] push additionally snapshots the display state so the
//! matching pop can restore it field by field.
//!
//! The stack itself never talks to the backend; the context reapplies a
//! popped snapshot with a checked diff so unchanged state is not re-sent.

use glam::Mat4;

use crate::backend::StandardShader;
use crate::error::GraphicsError;
use crate::target::RenderTargetSet;
use crate::types::{Color, ScissorRect};

/// Maximum user-visible push depth.
pub const MAX_STACK_DEPTH: usize = 128;

/// What a push saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackType {
    /// Transform and the full display state.
    All,
    /// Transform only.
    Transform,
}

/// Blend mode applied to color output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Standard alpha blending.
    #[default]
    Alpha,
    /// Additive.
    Add,
    /// Subtractive.
    Subtract,
    /// Multiplicative.
    Multiply,
    /// Screen.
    Screen,
    /// Source replaces destination.
    Replace,
    /// Blending disabled.
    None,
}

/// Comparison function for depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareMode {
    /// Test never passes.
    Never,
    /// Test always passes.
    #[default]
    Always,
    /// Passes when the incoming value is less.
    Less,
    /// Passes when the incoming value is less or equal.
    LessEqual,
    /// Passes when the values are equal.
    Equal,
    /// Passes when the values differ.
    NotEqual,
    /// Passes when the incoming value is greater or equal.
    GreaterEqual,
    /// Passes when the incoming value is greater.
    Greater,
}

/// Action taken on the stencil buffer when a fragment passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilAction {
    /// Leave the stencil value untouched.
    #[default]
    Keep,
    /// Zero the stencil value.
    Zero,
    /// Replace with the reference value.
    Replace,
    /// Increment, clamping at the maximum.
    Increment,
    /// Decrement, clamping at zero.
    Decrement,
    /// Increment with wraparound.
    IncrementWrap,
    /// Decrement with wraparound.
    DecrementWrap,
    /// Bitwise invert.
    Invert,
}

/// Stencil test and write configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StencilState {
    /// Comparison against the reference value.
    pub compare: CompareMode,
    /// Action on passing fragments.
    pub action: StencilAction,
    /// Reference value.
    pub reference: u32,
    /// Bits read by the comparison.
    pub read_mask: u32,
    /// Bits written by the action.
    pub write_mask: u32,
}

/// Depth test and write configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    /// Depth comparison.
    pub compare: CompareMode,
    /// Whether passing fragments write their depth.
    pub write: bool,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            compare: CompareMode::Always,
            write: false,
        }
    }
}

/// Per-channel color write mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMask {
    /// Red channel enabled.
    pub r: bool,
    /// Green channel enabled.
    pub g: bool,
    /// Blue channel enabled.
    pub b: bool,
    /// Alpha channel enabled.
    pub a: bool,
}

impl Default for ColorMask {
    fn default() -> Self {
        Self {
            r: true,
            g: true,
            b: true,
            a: true,
        }
    }
}

/// The full render state a frame draws with.
///
/// `PartialEq` is derived so restores can be verified bit for bit and
/// reapplied as a minimal diff.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    /// Current draw color, multiplied into batched vertices.
    pub color: Color,
    /// Clear color for the bound target.
    pub background_color: Color,
    /// Blend mode.
    pub blend: BlendMode,
    /// Line rasterization width in pixels.
    pub line_width: f32,
    /// Point rasterization size in pixels.
    pub point_size: f32,
    /// Scissor rectangle; `None` disables the scissor test.
    pub scissor: Option<ScissorRect>,
    /// Stencil configuration.
    pub stencil: StencilState,
    /// Depth configuration.
    pub depth: DepthState,
    /// Color write mask.
    pub color_mask: ColorMask,
    /// Wireframe rasterization.
    pub wireframe: bool,
    /// Standard shader used for batched draws.
    pub shader: StandardShader,
    /// Bound render targets.
    pub render_targets: RenderTargetSet,
    /// Projection override; `None` uses the binder's default orthographic
    /// projection.
    pub custom_projection: Option<Mat4>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            background_color: Color::BLACK,
            blend: BlendMode::Alpha,
            line_width: 1.0,
            point_size: 1.0,
            scissor: None,
            stencil: StencilState::default(),
            depth: DepthState::default(),
            color_mask: ColorMask::default(),
            wireframe: false,
            shader: StandardShader::Default,
            render_targets: RenderTargetSet::new(),
            custom_projection: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TransformEntry {
    transform: Mat4,
    pixel_scale: f32,
}

impl Default for TransformEntry {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            pixel_scale: 1.0,
        }
    }
}

/// Balanced save/restore stack for transforms and display-state snapshots.
pub struct StateStack {
    pushes: Vec<StackType>,
    snapshots: Vec<DisplayState>,
    // Never empty; the last entry is the current transform.
    transforms: Vec<TransformEntry>,
}

impl StateStack {
    /// Create an empty stack with an identity transform.
    pub fn new() -> Self {
        Self {
            pushes: Vec::new(),
            snapshots: Vec::new(),
            transforms: vec![TransformEntry::default()],
        }
    }

    /// Current user push depth.
    pub fn depth(&self) -> usize {
        self.pushes.len()
    }

    /// Save the current transform, and for [`StackType::All`] a snapshot of
    /// `state`.
    pub fn push(&mut self, stack_type: StackType, state: &DisplayState) -> Result<(), GraphicsError> {
        if self.pushes.len() >= MAX_STACK_DEPTH {
            return Err(GraphicsError::Misuse(format!(
                "state stack depth limit of {MAX_STACK_DEPTH} reached"
            )));
        }

        let top = self.transforms.last().cloned().unwrap_or_default();
        self.transforms.push(top);
        if stack_type == StackType::All {
            self.snapshots.push(state.clone());
        }
        self.pushes.push(stack_type);
        Ok(())
    }

    /// Undo the most recent push.
    ///
    /// Returns the display-state snapshot to restore when that push was
    /// [`StackType::All`].
    pub fn pop(&mut self) -> Result<Option<DisplayState>, GraphicsError> {
        let Some(stack_type) = self.pushes.pop() else {
            return Err(GraphicsError::Misuse(
                "pop without a matching push".into(),
            ));
        };

        self.transforms.pop();
        debug_assert!(!self.transforms.is_empty());

        match stack_type {
            StackType::All => {
                let snapshot = self.snapshots.pop().ok_or_else(|| {
                    GraphicsError::Misuse("state snapshot stack out of sync".into())
                })?;
                Ok(Some(snapshot))
            }
            StackType::Transform => Ok(None),
        }
    }

    /// Current coordinate transform.
    pub fn transform(&self) -> &Mat4 {
        self.transforms
            .last()
            .map(|entry| &entry.transform)
            .unwrap_or(&Mat4::IDENTITY)
    }

    /// Mutable access to the current coordinate transform.
    pub fn transform_mut(&mut self) -> &mut Mat4 {
        &mut self.current_mut().transform
    }

    /// Accumulated pixel scale of the current transform.
    pub fn pixel_scale(&self) -> f32 {
        self.transforms
            .last()
            .map(|entry| entry.pixel_scale)
            .unwrap_or(1.0)
    }

    /// Multiply the tracked pixel scale, alongside a `scale` on the
    /// transform.
    pub fn scale_pixel_scale(&mut self, factor: f32) {
        self.current_mut().pixel_scale *= factor;
    }

    /// Reset the current transform to identity and the pixel scale to one.
    pub fn reset_transform(&mut self) {
        *self.current_mut() = TransformEntry::default();
    }

    /// Temporarily switch to an identity transform, without consuming user
    /// push depth. Balanced by [`pop_transform`](Self::pop_transform).
    ///
    /// Used around batch flushes: batched vertices were already transformed
    /// when they were written.
    pub fn push_identity_transform(&mut self) {
        self.transforms.push(TransformEntry::default());
    }

    /// Undo [`push_identity_transform`](Self::push_identity_transform).
    pub fn pop_transform(&mut self) {
        debug_assert!(self.transforms.len() > 1, "transform stack underflow");
        if self.transforms.len() > 1 {
            self.transforms.pop();
        }
    }

    fn current_mut(&mut self) -> &mut TransformEntry {
        // Kept non-empty by construction.
        if self.transforms.is_empty() {
            self.transforms.push(TransformEntry::default());
        }
        let last = self.transforms.len() - 1;
        &mut self.transforms[last]
    }
}

impl Default for StateStack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStack")
            .field("depth", &self.pushes.len())
            .field("snapshots", &self.snapshots.len())
            .finish()
    }
}
