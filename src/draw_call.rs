//! Queued draw calls and their coalescing rules.

use crate::fixed::FixedVec;
use crate::types::{PrimitiveMode, TextureId};

/// One GPU draw covering a contiguous run of vertices.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DrawCall {
    /// How the vertices are assembled.
    pub mode: PrimitiveMode,
    /// Vertices submitted under this call.
    pub vertex_count: usize,
    /// Dead vertices following this call, counted but never drawn.
    pub vertex_alignment_padding: usize,
    /// Texture bound while drawing.
    pub texture: TextureId,
}

impl DrawCall {
    /// An empty call.
    pub fn new(mode: PrimitiveMode, texture: TextureId) -> Self {
        Self {
            mode,
            vertex_count: 0,
            vertex_alignment_padding: 0,
            texture,
        }
    }

    /// Whether submissions under `mode` and `texture` can extend this call.
    pub fn matches(&self, mode: PrimitiveMode, texture: TextureId) -> bool {
        self.mode == mode && self.texture == texture
    }

    /// Vertices this call occupies in the buffer, padding included.
    pub fn span(&self) -> usize {
        self.vertex_count + self.vertex_alignment_padding
    }
}

/// Ordered draw calls since the last flush.
///
/// Always holds at least one entry: the last one is the open call that new
/// vertices are counted against.
#[derive(Debug, Clone)]
pub struct DrawCallList {
    calls: FixedVec<DrawCall>,
    default_texture: TextureId,
}

impl DrawCallList {
    /// Create a list holding at most `capacity` calls (minimum one).
    pub fn new(capacity: usize, default_texture: TextureId) -> Self {
        let mut list = Self {
            calls: FixedVec::with_capacity(capacity.max(1)),
            default_texture,
        };
        list.reset();
        list
    }

    /// The call new vertices are counted against.
    pub fn open(&self) -> &DrawCall {
        self.calls
            .last()
            .unwrap_or_else(|| unreachable!("draw call list is never empty"))
    }

    /// The open call, mutably.
    pub fn open_mut(&mut self) -> &mut DrawCall {
        self.calls
            .last_mut()
            .unwrap_or_else(|| unreachable!("draw call list is never empty"))
    }

    /// Start a new call after the open one. Returns `false` if the list is
    /// full.
    pub fn append(&mut self, call: DrawCall) -> bool {
        self.calls.try_push(call).is_ok()
    }

    /// All queued calls, in submission order.
    pub fn calls(&self) -> &[DrawCall] {
        self.calls.as_slice()
    }

    /// Number of queued calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// The call before the open one, if any.
    pub fn previous(&self) -> Option<&DrawCall> {
        let calls = self.calls.as_slice();
        calls.len().checked_sub(2).map(|index| &calls[index])
    }

    /// Drop the open call so the previous one becomes open again. Does
    /// nothing, and returns `None`, when the open call is the only one.
    pub fn reopen_previous(&mut self) -> Option<&mut DrawCall> {
        if self.calls.len() < 2 {
            return None;
        }
        self.calls.pop();
        self.calls.last_mut()
    }

    /// The texture a reset list opens with.
    pub fn default_texture(&self) -> TextureId {
        self.default_texture
    }

    /// Drop every call and reopen a single empty quad call on the default
    /// texture.
    pub fn reset(&mut self) {
        self.calls.clear();
        let _ = self
            .calls
            .try_push(DrawCall::new(PrimitiveMode::Quads, self.default_texture));
    }
}
