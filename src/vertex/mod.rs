//! Vertex stream formats and index synthesis for batched drawing.
//!
//! Batched draws carry their vertex data in up to two streams, each using one
//! of a small fixed set of [`StreamFormat`]s. Keeping the set fixed lets the
//! batcher compare formats with integer equality on the hot path and cache the
//! composite layout per format pair.

mod layout;
mod registry;

pub use layout::{
    VertexAttribute, VertexAttributeFormat, VertexBufferLayout, VertexLayout, VertexSemantic,
    VertexStepMode,
};
pub use registry::{VertexLayoutId, VertexLayoutRegistry};

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Primitive topology for draw submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Separate triangles.
    #[default]
    TriangleList,
    /// Connected triangle strip.
    TriangleStrip,
    /// Separate lines.
    LineList,
    /// Connected line strip.
    LineStrip,
    /// Points.
    PointList,
}

/// Fixed vertex formats used by batched draw streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamFormat {
    /// Stream is unused.
    #[default]
    None,
    /// 2D position.
    Xy,
    /// 2D position + texture coordinates.
    XyUv,
    /// 2D position + texture coordinates + 8-bit color.
    XyUvColor,
    /// 8-bit color only (secondary stream).
    Color,
}

impl StreamFormat {
    /// Number of distinct stream formats, for per-pair caches.
    pub const COUNT: usize = 5;

    /// Index of this format within [`Self::COUNT`].
    pub fn index(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Xy => 1,
            Self::XyUv => 2,
            Self::XyUvColor => 3,
            Self::Color => 4,
        }
    }

    /// Byte stride of one vertex in this format. Zero for [`Self::None`].
    pub fn stride(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Xy => std::mem::size_of::<XyVertex>(),
            Self::XyUv => std::mem::size_of::<XyUvVertex>(),
            Self::XyUvColor => std::mem::size_of::<XyUvColorVertex>(),
            Self::Color => std::mem::size_of::<ColorVertex>(),
        }
    }

    /// Attributes of this format: (semantic, data format, byte offset).
    pub fn attributes(&self) -> &'static [(VertexSemantic, VertexAttributeFormat, u32)] {
        use VertexAttributeFormat as F;
        use VertexSemantic as S;
        match self {
            Self::None => &[],
            Self::Xy => &[(S::Position, F::Float2, 0)],
            Self::XyUv => &[(S::Position, F::Float2, 0), (S::TexCoord, F::Float2, 8)],
            Self::XyUvColor => &[
                (S::Position, F::Float2, 0),
                (S::TexCoord, F::Float2, 8),
                (S::Color, F::Unorm8x4, 16),
            ],
            Self::Color => &[(S::Color, F::Unorm8x4, 0)],
        }
    }

    /// Returns true if any attribute carries a vertex color.
    pub fn has_color(&self) -> bool {
        matches!(self, Self::XyUvColor | Self::Color)
    }
}

/// Build the composite vertex layout for a pair of batch streams.
///
/// Each non-`None` stream becomes one vertex buffer binding; attributes
/// reference their stream's buffer index.
pub fn composite_layout(formats: [StreamFormat; 2]) -> VertexLayout {
    let mut layout = VertexLayout::new();
    let mut buffer_index = 0;
    for format in formats {
        if format == StreamFormat::None {
            continue;
        }
        layout = layout.with_buffer(VertexBufferLayout::new(format.stride() as u32));
        for &(semantic, attr_format, offset) in format.attributes() {
            layout = layout.with_attribute(
                VertexAttribute::new(semantic, attr_format, offset).at_buffer(buffer_index),
            );
        }
        buffer_index += 1;
    }
    layout
}

// ============================================================================
// POD vertex structs
// ============================================================================

/// Vertex with a 2D position.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct XyVertex {
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
}

/// Vertex with a 2D position and texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct XyUvVertex {
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
    /// Texture coordinate.
    pub u: f32,
    /// Texture coordinate.
    pub v: f32,
}

/// Vertex with a 2D position, texture coordinates and an 8-bit color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct XyUvColorVertex {
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
    /// Texture coordinate.
    pub u: f32,
    /// Texture coordinate.
    pub v: f32,
    /// RGBA color.
    pub color: [u8; 4],
}

/// Color-only vertex for secondary streams.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ColorVertex {
    /// RGBA color.
    pub color: [u8; 4],
}

const_assert_eq!(std::mem::size_of::<XyVertex>(), 8);
const_assert_eq!(std::mem::size_of::<XyUvVertex>(), 16);
const_assert_eq!(std::mem::size_of::<XyUvColorVertex>(), 20);
const_assert_eq!(std::mem::size_of::<ColorVertex>(), 4);

// ============================================================================
// Index synthesis
// ============================================================================

/// How indices are synthesized for the vertices of a batched draw request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexMode {
    /// No indices; the draw is non-indexed.
    #[default]
    None,
    /// Triangle per adjacent vertex triple, alternating winding.
    Strip,
    /// Triangle per vertex, anchored at the first vertex.
    Fan,
    /// Two triangles per group of four vertices.
    Quads,
}

impl IndexMode {
    /// Number of indices synthesized for `vertex_count` vertices.
    pub fn index_count(&self, vertex_count: usize) -> usize {
        match self {
            Self::None => 0,
            Self::Strip | Self::Fan => 3 * vertex_count.saturating_sub(2),
            Self::Quads => vertex_count / 4 * 6,
        }
    }
}

/// Fill `indices` with synthesized triangle indices.
///
/// `vertex_start` offsets every written index, so indices for vertices
/// appended to an existing batch point past the already-accumulated ones.
/// `indices` must hold exactly `mode.index_count(vertex_count)` entries.
pub fn fill_indices(mode: IndexMode, vertex_start: u16, vertex_count: u16, indices: &mut [u16]) {
    debug_assert_eq!(indices.len(), mode.index_count(vertex_count as usize));

    match mode {
        IndexMode::None => {}
        IndexMode::Strip => {
            let mut i = 0;
            for index in 0..vertex_count.saturating_sub(2) {
                indices[i] = vertex_start + index;
                indices[i + 1] = vertex_start + index + 1 + (index & 1);
                indices[i + 2] = vertex_start + index + 2 - (index & 1);
                i += 3;
            }
        }
        IndexMode::Fan => {
            let mut i = 0;
            for index in 2..vertex_count {
                indices[i] = vertex_start;
                indices[i + 1] = vertex_start + index - 1;
                indices[i + 2] = vertex_start + index;
                i += 3;
            }
        }
        IndexMode::Quads => {
            // 0---2
            // | / |
            // 1---3
            for group in 0..(vertex_count / 4) as usize {
                let i = group * 6;
                let v = vertex_start + (group as u16) * 4;

                indices[i] = v;
                indices[i + 1] = v + 1;
                indices[i + 2] = v + 2;

                indices[i + 3] = v + 2;
                indices[i + 4] = v + 1;
                indices[i + 5] = v + 3;
            }
        }
    }
}
