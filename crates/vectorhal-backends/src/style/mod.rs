//! Processing styles and the extension table that resolves them
//!
//! A [`ProcessingStyle`] says how a kernel should treat its data: which
//! element type, which backend extension, and how many bits one vector
//! register holds. Kernels read `vector_element_count()` to decide their
//! step size.
//!
//! ```text
//! (ElementType, parallelism | width)
//!         │
//!         ▼
//!   ExtensionTable::resolve ──▶ ProcessingStyle { element, extension, width_bits }
//! ```

mod detect;
mod table;

pub use detect::{host_cpu_flags, host_has_flag};
pub use table::{ExtensionSpec, ExtensionTable, TableDocument};

use crate::element::ElementType;
use crate::error::{BackendError, Result};
use std::borrow::Cow;
use std::fmt;

/// Identifier of a backend extension (`"scalar"`, `"avx2"`, `"fpga_rtl"`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionTag(Cow<'static, str>);

impl ExtensionTag {
    /// One element per step, no vector unit
    pub const SCALAR: ExtensionTag = ExtensionTag(Cow::Borrowed("scalar"));

    /// Synthesized logic on the accelerator device
    pub const FPGA_RTL: ExtensionTag = ExtensionTag(Cow::Borrowed("fpga_rtl"));

    /// Create a tag from a configured name
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concrete vector descriptor handed to kernels
///
/// Invariant: `width_bits` is a non-zero multiple of the element width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessingStyle {
    element: ElementType,
    extension: ExtensionTag,
    width_bits: usize,
}

impl ProcessingStyle {
    /// Scalar style: one lane, as wide as the element
    pub fn scalar(element: ElementType) -> Self {
        Self {
            element,
            extension: ExtensionTag::SCALAR,
            width_bits: element.bits(),
        }
    }

    /// Style for the accelerator's synthesized logic at an explicit width
    pub fn accelerator(element: ElementType, width_bits: usize) -> Result<Self> {
        Self::new(element, ExtensionTag::FPGA_RTL, width_bits)
    }

    pub(crate) fn new(element: ElementType, extension: ExtensionTag, width_bits: usize) -> Result<Self> {
        if width_bits == 0 || width_bits % element.bits() != 0 {
            return Err(BackendError::UnsupportedVectorLength { element, width_bits });
        }
        Ok(Self {
            element,
            extension,
            width_bits,
        })
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    pub fn extension(&self) -> &ExtensionTag {
        &self.extension
    }

    pub fn width_bits(&self) -> usize {
        self.width_bits
    }

    /// Lanes per vector register
    pub fn vector_element_count(&self) -> usize {
        self.width_bits / self.element.bits()
    }

    pub fn is_scalar(&self) -> bool {
        self.extension == ExtensionTag::SCALAR
    }
}

impl fmt::Display for ProcessingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "simd<{}, {}, {}>", self.element, self.extension, self.width_bits)
    }
}
