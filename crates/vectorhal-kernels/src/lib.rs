//! # vectorhal-kernels - Reference Kernels
//!
//! Kernels written once against [`ProcessingStyle`](vectorhal_backends::ProcessingStyle)
//! and submitted unchanged to both executors.
//!
//! ## Kernels
//!
//! - [`VectorAdd`] - element-wise addition for every element type
//! - [`LeadingZeroCount`] - `u32` leading-zero count, the accelerator's
//!   synthesized-logic kernel
//!
//! Both walk their input in steps of `vector_element_count()` lanes and
//! finish with a scalar tail (see [`lanes`]).
//!
//! ## Example
//!
//! ```rust
//! use vectorhal_backends::{AcceleratorExecutor, HostExecutor, MemoryClass};
//! use vectorhal_kernels::LeadingZeroCount;
//!
//! # fn main() -> vectorhal_backends::Result<()> {
//! let input: Vec<u32> = (0..8).collect();
//!
//! // Host
//! let host = HostExecutor::new()?;
//! let mut host_out = host.allocate::<u32>(input.len(), 0)?;
//! host.submit_widest(&LeadingZeroCount, &mut host_out, &[&input[..]], input.len())?;
//!
//! // Accelerator
//! let accel = AcceleratorExecutor::emulator()?;
//! let src = accel.allocate::<u32>(input.len(), MemoryClass::DeviceExclusive, 0)?;
//! let dst = accel.allocate::<u32>(input.len(), MemoryClass::DeviceExclusive, 0)?;
//! accel.copy(src, input.as_slice(), input.len())?;
//! accel.submit(&LeadingZeroCount, 512, dst, &[src], input.len())?;
//!
//! let mut accel_out = vec![0u32; input.len()];
//! accel.copy(accel_out.as_mut_slice(), dst, input.len())?;
//! assert_eq!(&host_out[..], &accel_out[..]);
//! # Ok(())
//! # }
//! ```

pub mod arith;
pub mod bits;
pub mod lanes;

pub use arith::{LaneAdd, VectorAdd};
pub use bits::LeadingZeroCount;
