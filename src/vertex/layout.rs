//! Vertex layout definitions.
//!
//! A [`VertexLayout`] describes how vertex attributes are packed into one or
//! more buffers: per-buffer stride and step mode, plus the attributes that
//! read from each buffer. Layouts are immutable once registered with the
//! [`VertexLayoutRegistry`](super::VertexLayoutRegistry); equality is
//! structural, so two layouts built the same way compare equal.

/// Semantic meaning of a vertex attribute.
///
/// Semantics are used to match vertex data with shader inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    /// Vertex position.
    Position,
    /// Texture coordinates.
    TexCoord,
    /// Vertex color.
    Color,
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
    /// Two 16-bit unsigned integers (normalized to 0.0-1.0).
    Unorm16x2,
}

impl VertexAttributeFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> usize {
        match self {
            Self::Float => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::Unorm8x4 | Self::Unorm16x2 => 4,
        }
    }
}

/// How a vertex buffer advances: per-vertex or per-instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Buffer advances once per vertex (default).
    #[default]
    Vertex,
    /// Buffer advances once per instance (for instanced rendering).
    Instance,
}

/// Describes a single vertex buffer binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    /// Stride in bytes between consecutive elements.
    pub stride: u32,
    /// How the buffer advances (per-vertex or per-instance).
    pub step_mode: VertexStepMode,
}

impl VertexBufferLayout {
    /// Create a new vertex buffer layout with the given stride.
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            step_mode: VertexStepMode::Vertex,
        }
    }

    /// Create a per-instance buffer layout.
    pub fn per_instance(stride: u32) -> Self {
        Self {
            stride,
            step_mode: VertexStepMode::Instance,
        }
    }
}

/// A single vertex attribute description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Semantic meaning of this attribute.
    pub semantic: VertexSemantic,
    /// Data format of this attribute.
    pub format: VertexAttributeFormat,
    /// Byte offset within the vertex buffer.
    pub offset: u32,
    /// Index of the vertex buffer this attribute reads from.
    pub buffer_index: u32,
}

impl VertexAttribute {
    /// Create a new vertex attribute reading from buffer 0.
    pub fn new(semantic: VertexSemantic, format: VertexAttributeFormat, offset: u32) -> Self {
        Self {
            semantic,
            format,
            offset,
            buffer_index: 0,
        }
    }

    /// Set the buffer index for this attribute.
    pub fn at_buffer(mut self, buffer_index: u32) -> Self {
        self.buffer_index = buffer_index;
        self
    }
}

/// Describes the layout of vertex data across one or more buffers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    /// Descriptions of each vertex buffer binding.
    pub buffers: Vec<VertexBufferLayout>,
    /// The vertex attributes, each referencing a buffer by index.
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Create a new empty vertex layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex buffer binding.
    pub fn with_buffer(mut self, buffer: VertexBufferLayout) -> Self {
        self.buffers.push(buffer);
        self
    }

    /// Add a vertex attribute.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Get the number of vertex buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Get the stride for a specific buffer, or 0 if out of range.
    pub fn buffer_stride(&self, buffer_index: usize) -> u32 {
        self.buffers
            .get(buffer_index)
            .map(|buffer| buffer.stride)
            .unwrap_or(0)
    }

    /// Check if this layout has a specific semantic.
    pub fn has_semantic(&self, semantic: VertexSemantic) -> bool {
        self.attributes.iter().any(|attr| attr.semantic == semantic)
    }

    /// Get an attribute by semantic.
    pub fn attribute(&self, semantic: VertexSemantic) -> Option<&VertexAttribute> {
        self.attributes
            .iter()
            .find(|attr| attr.semantic == semantic)
    }

    /// Validate the layout (check that all attributes reference valid buffers).
    pub fn validate(&self) -> Result<(), String> {
        for attr in &self.attributes {
            if attr.buffer_index as usize >= self.buffers.len() {
                return Err(format!(
                    "attribute {:?} references buffer {} but only {} buffers defined",
                    attr.semantic,
                    attr.buffer_index,
                    self.buffers.len()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_format_size() {
        assert_eq!(VertexAttributeFormat::Float.size(), 4);
        assert_eq!(VertexAttributeFormat::Float2.size(), 8);
        assert_eq!(VertexAttributeFormat::Unorm8x4.size(), 4);
    }

    #[test]
    fn test_layout_structural_equality() {
        let build = || {
            VertexLayout::new()
                .with_buffer(VertexBufferLayout::new(16))
                .with_attribute(VertexAttribute::new(
                    VertexSemantic::Position,
                    VertexAttributeFormat::Float2,
                    0,
                ))
                .with_attribute(VertexAttribute::new(
                    VertexSemantic::TexCoord,
                    VertexAttributeFormat::Float2,
                    8,
                ))
        };
        assert_eq!(build(), build());

        let other = VertexLayout::new().with_buffer(VertexBufferLayout::new(8));
        assert_ne!(build(), other);
    }

    #[test]
    fn test_layout_validation() {
        let invalid = VertexLayout::new()
            .with_buffer(VertexBufferLayout::new(8))
            .with_attribute(
                VertexAttribute::new(VertexSemantic::Position, VertexAttributeFormat::Float2, 0)
                    .at_buffer(3),
            );
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_instance_step_mode() {
        let layout = VertexBufferLayout::per_instance(64);
        assert_eq!(layout.step_mode, VertexStepMode::Instance);
        assert_ne!(layout, VertexBufferLayout::new(64));
    }
}
