//! Lane chunking shared by the reference kernels
//!
//! A kernel walks its `element_count` elements in steps of
//! `style.vector_element_count()`. Full steps form the vector body; the
//! last partial step (if any) is the scalar tail.
//!
//! ```text
//!  element_count = 10, lanes = 4
//!  ┌───────────┬───────────┬─────┐
//!  │  0  1 2 3 │ 4  5  6 7 │ 8 9 │
//!  └───────────┴───────────┴─────┘
//!     vector      vector     tail
//! ```

use std::ops::Range;
use vectorhal_backends::ProcessingStyle;

/// One step of a chunked walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneChunk {
    /// Exactly `lanes` elements
    Vector(Range<usize>),
    /// Fewer than `lanes` elements at the end of the walk
    Tail(Range<usize>),
}

impl LaneChunk {
    pub fn range(&self) -> Range<usize> {
        match self {
            Self::Vector(r) | Self::Tail(r) => r.clone(),
        }
    }
}

/// Iterator over the chunks of `0..element_count`
#[derive(Debug, Clone)]
pub struct LaneChunks {
    lanes: usize,
    element_count: usize,
    position: usize,
}

impl Iterator for LaneChunks {
    type Item = LaneChunk;

    fn next(&mut self) -> Option<LaneChunk> {
        if self.position >= self.element_count {
            return None;
        }
        let start = self.position;
        let end = (start + self.lanes).min(self.element_count);
        self.position = end;
        if end - start == self.lanes {
            Some(LaneChunk::Vector(start..end))
        } else {
            Some(LaneChunk::Tail(start..end))
        }
    }
}

/// Chunk `0..element_count` by the style's lane count
pub fn lane_chunks(style: &ProcessingStyle, element_count: usize) -> LaneChunks {
    LaneChunks {
        lanes: style.vector_element_count().max(1),
        element_count,
        position: 0,
    }
}
