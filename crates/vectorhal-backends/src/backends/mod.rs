//! Backend implementations for different execution targets
//!
//! This module contains:
//! - `common` - Shared infrastructure (aligned heap blocks)
//! - `cpu` - Host CPU executor (synchronous, SIMD processing styles)
//! - `fpga` - Accelerator executor (command queue, two memory classes)

pub(crate) mod common;
pub mod cpu;
pub mod fpga;

// Re-export executors
pub use cpu::{HostBuffer, HostExecutor, HostMemoryManager};
pub use fpga::{
    AcceleratorConfig, AcceleratorExecutor, DeviceCapabilities, DeviceDescriptor, DeviceSelector, EmulatorOptions,
    ExecutorState, QueueProfile,
};
