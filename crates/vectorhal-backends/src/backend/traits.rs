//! Kernel contract
//!
//! A kernel is written once against [`ProcessingStyle`] and runs unmodified
//! on every executor. The executor resolves the style, validates the
//! invocation, then hands the kernel plain slices:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Kernel::apply                 │
//! │  (style, &mut [Output], &[&[Input]], count)  │
//! └──────────────────────┬───────────────────────┘
//!                        │
//!            ┌───────────┴───────────┐
//!            ▼                       ▼
//!     ┌─────────────┐        ┌───────────────────┐
//!     │HostExecutor │        │AcceleratorExecutor│
//!     │ (same thread)│       │  (queue worker)   │
//!     └─────────────┘        └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use vectorhal_backends::{Kernel, ProcessingStyle, Result};
//!
//! struct Negate;
//!
//! impl Kernel for Negate {
//!     type Input = i32;
//!     type Output = i32;
//!
//!     fn name(&self) -> &str {
//!         "negate"
//!     }
//!
//!     fn apply(&self, style: &ProcessingStyle, output: &mut [i32], inputs: &[&[i32]], element_count: usize) -> Result<()> {
//!         let step = style.vector_element_count();
//!         let input = inputs[0];
//!         let mut i = 0;
//!         while i < element_count {
//!             let end = (i + step).min(element_count);
//!             for j in i..end {
//!                 output[j] = -input[j];
//!             }
//!             i = end;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::element::Element;
use crate::error::{BackendError, Result};
use crate::style::ProcessingStyle;

/// Pluggable compute kernel
///
/// `apply` is only called after the executor has checked that
/// `style.element() == Self::Input::TYPE` and that `element_count` fits the
/// output and every input. `element_count` need not be a multiple of
/// `style.vector_element_count()`; the kernel owns its remainder handling.
pub trait Kernel: Send + Sync {
    type Input: Element;
    type Output: Element;

    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Process `element_count` elements
    fn apply(
        &self,
        style: &ProcessingStyle,
        output: &mut [Self::Output],
        inputs: &[&[Self::Input]],
        element_count: usize,
    ) -> Result<()>;
}

/// Shared invocation checks run by both executors before `apply`
pub(crate) fn check_invocation<K: Kernel + ?Sized>(
    style: &ProcessingStyle,
    output_len: usize,
    input_lens: impl IntoIterator<Item = usize>,
    element_count: usize,
) -> Result<()> {
    let expected = <K::Input as Element>::TYPE;
    if style.element() != expected {
        return Err(BackendError::type_mismatch(expected, style.element()));
    }
    if element_count > output_len {
        return Err(BackendError::BufferOutOfBounds {
            requested: element_count,
            len: output_len,
        });
    }
    for len in input_lens {
        if element_count > len {
            return Err(BackendError::BufferOutOfBounds {
                requested: element_count,
                len,
            });
        }
    }
    Ok(())
}
