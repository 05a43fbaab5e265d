//! Hardware abstraction for running one generic kernel on host SIMD units
//! and on an FPGA accelerator
//!
//! This crate provides:
//! - **Processing styles**: data-driven resolution of `(element, lanes)` to a
//!   concrete vector extension
//! - **Kernel trait**: the contract every pluggable kernel implements
//! - **Host executor**: synchronous submission with aligned host buffers
//! - **Accelerator executor**: queued submission over host-visible and
//!   device-exclusive memory
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Kernel::apply                        │
//! │          (written once against ProcessingStyle)          │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┴─────────────┐
//!         ▼                           ▼
//!   ┌──────────────┐          ┌───────────────────┐
//!   │ HostExecutor │          │AcceleratorExecutor│
//!   │ ExtensionTbl │          │ CommandQueue      │
//!   │ HostMemory   │          │ DeviceMemory      │
//!   └──────────────┘          └───────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use vectorhal_backends::{ExtensionSpec, ExtensionTable, HostExecutor, Kernel, ProcessingStyle, Result};
//!
//! struct Square;
//!
//! impl Kernel for Square {
//!     type Input = f32;
//!     type Output = f32;
//!
//!     fn name(&self) -> &str {
//!         "square"
//!     }
//!
//!     fn apply(&self, _style: &ProcessingStyle, out: &mut [f32], inputs: &[&[f32]], n: usize) -> Result<()> {
//!         for (o, x) in out[..n].iter_mut().zip(&inputs[0][..n]) {
//!             *o = x * x;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let table = ExtensionTable::new(vec![ExtensionSpec::new("sse", 128, &[])])?;
//! let exec = HostExecutor::with_table(table);
//!
//! let input = [1.0f32, 2.0, 3.0];
//! let mut output = exec.allocate::<f32>(3, 64)?;
//! exec.submit_with_parallelism(&Square, 4, &mut output, &[&input[..]], 3)?;
//! assert_eq!(&output[..], &[1.0, 4.0, 9.0]);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod backends;
pub mod config;
pub mod element;
pub mod error;
pub mod style;

// Re-export public API
pub use backend::{CopyDest, CopySource, DeviceBuffer, Kernel, MemoryClass};
pub use backends::{
    AcceleratorConfig, AcceleratorExecutor, DeviceCapabilities, DeviceDescriptor, DeviceSelector, EmulatorOptions,
    ExecutorState, HostBuffer, HostExecutor, HostMemoryManager, QueueProfile,
};
pub use config::HalConfig;
pub use element::{Element, ElementType};
pub use error::{BackendError, ErrorKind, FailFast, Result};
pub use style::{ExtensionSpec, ExtensionTable, ExtensionTag, ProcessingStyle, TableDocument};
