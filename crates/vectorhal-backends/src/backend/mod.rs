//! Kernel contract and handle types

mod traits;
mod types;

pub(crate) use traits::check_invocation;
pub use traits::Kernel;
pub use types::{CopyDest, CopySource, DeviceBuffer, MemoryClass};
