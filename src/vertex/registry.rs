//! Interning of vertex layouts into small integer handles.
//!
//! Comparing full layouts structurally on every draw would dominate the hot
//! batching path; interning turns those comparisons into O(1) integer
//! equality. The registry only grows, and the number of distinct layouts in a
//! session stays small, so lookup is a plain vector scan.

use crate::error::GraphicsError;

use super::VertexLayout;

/// Handle to a registered vertex layout.
///
/// Valid ids are 1-based; [`VertexLayoutId::INVALID`] (0) never resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexLayoutId(pub u32);

impl VertexLayoutId {
    /// The invalid/unset id.
    pub const INVALID: Self = Self(0);

    /// Returns true if this id can possibly resolve to a layout.
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// Interns vertex layouts, handing out stable [`VertexLayoutId`]s.
#[derive(Debug, Default)]
pub struct VertexLayoutRegistry {
    layouts: Vec<VertexLayout>,
}

impl VertexLayoutRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a layout, returning the existing id when a structurally equal
    /// layout is already registered.
    pub fn register(&mut self, layout: &VertexLayout) -> VertexLayoutId {
        for (index, existing) in self.layouts.iter().enumerate() {
            if existing == layout {
                return VertexLayoutId(index as u32 + 1);
            }
        }

        self.layouts.push(layout.clone());
        VertexLayoutId(self.layouts.len() as u32)
    }

    /// Resolve an id back to its layout.
    pub fn resolve(&self, id: VertexLayoutId) -> Result<&VertexLayout, GraphicsError> {
        if !id.is_valid() {
            return Err(GraphicsError::OutOfRange(
                "vertex layout id 0 is invalid".to_string(),
            ));
        }

        self.layouts.get(id.0 as usize - 1).ok_or_else(|| {
            GraphicsError::OutOfRange(format!(
                "vertex layout id {} exceeds registered count {}",
                id.0,
                self.layouts.len()
            ))
        })
    }

    /// Number of registered layouts.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Returns true if no layouts are registered.
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
