//! General-purpose (host CPU) executor
//!
//! Binds an [`ExtensionTable`] and a [`HostMemoryManager`] into a synchronous
//! kernel interface: `submit` runs the kernel on the calling thread and
//! returns when it is done.
//!
//! ```text
//! HostExecutor
//! ├── ExtensionTable     - resolves (element, lanes) to a ProcessingStyle
//! └── HostMemoryManager  - aligned host buffers + live counters
//! ```
//!
//! # Usage
//!
//! ```rust
//! use vectorhal_backends::{ElementType, ExtensionTable, HostExecutor};
//!
//! # fn main() -> vectorhal_backends::Result<()> {
//! let exec = HostExecutor::with_table(ExtensionTable::scalar_only());
//! let mut buf = exec.allocate::<u32>(128, 64)?;
//! buf.iter_mut().enumerate().for_each(|(i, x)| *x = i as u32);
//!
//! let style = exec.extension_table().widest(ElementType::U32);
//! assert!(style.is_scalar());
//! exec.deallocate(buf)?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod memory;

use crate::backend::{check_invocation, Kernel};
use crate::config::HalConfig;
use crate::element::Element;
use crate::error::{BackendError, Result};
use crate::style::{ExtensionTable, ProcessingStyle};
pub use memory::{HostBuffer, HostMemoryManager};
use std::time::Instant;
use vectorhal_tracing::performance::{record_submission, PerformanceSpan};

const BACKEND_NAME: &str = "cpu";

/// Synchronous executor for the host CPU
#[derive(Debug)]
pub struct HostExecutor {
    table: ExtensionTable,
    memory: HostMemoryManager,
}

impl HostExecutor {
    /// Create an executor using the vector extensions detected on this host
    #[tracing::instrument]
    pub fn new() -> Result<Self> {
        Ok(Self::with_table(ExtensionTable::detect_host()?))
    }

    /// Create an executor with an explicit extension table
    #[tracing::instrument(skip(table), fields(extensions = table.extensions().len()))]
    pub fn with_table(table: ExtensionTable) -> Self {
        let start = Instant::now();
        let memory = HostMemoryManager::new();

        tracing::info!(
            backend = BACKEND_NAME,
            extensions = ?table.extensions().iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            duration_us = start.elapsed().as_micros() as u64,
            "executor_created"
        );

        Self { table, memory }
    }

    /// Create an executor from environment-derived configuration
    pub fn from_config(config: &HalConfig) -> Result<Self> {
        Ok(Self::with_table(config.extension_table()?))
    }

    pub fn extension_table(&self) -> &ExtensionTable {
        &self.table
    }

    pub fn memory(&self) -> &HostMemoryManager {
        &self.memory
    }

    pub fn allocate<T: Element>(&self, element_count: usize, alignment: usize) -> Result<HostBuffer<T>> {
        self.memory.allocate(element_count, alignment)
    }

    pub fn deallocate<T: Element>(&self, buffer: HostBuffer<T>) -> Result<()> {
        self.memory.deallocate(buffer)
    }

    pub fn copy<T: Element>(&self, dst: &mut [T], src: &[T], element_count: usize) -> Result<()> {
        self.memory.copy(dst, src, element_count)
    }

    /// Run `kernel` with an explicit style on the calling thread
    #[tracing::instrument(skip_all, fields(kernel = kernel.name(), style = %style, elements = element_count))]
    pub fn submit<K: Kernel>(
        &self,
        kernel: &K,
        style: &ProcessingStyle,
        output: &mut [K::Output],
        inputs: &[&[K::Input]],
        element_count: usize,
    ) -> Result<()> {
        self.check_style(style)?;
        check_invocation::<K>(style, output.len(), inputs.iter().map(|i| i.len()), element_count)?;
        if element_count == 0 {
            return Ok(());
        }

        let span = PerformanceSpan::configured(format!("{BACKEND_NAME}_submit:{}", kernel.name()));
        kernel.apply(style, output, inputs, element_count)?;
        record_submission(kernel.name(), BACKEND_NAME, element_count, span.elapsed_us());
        Ok(())
    }

    /// A vector style must be the one this executor's table resolves for its width
    fn check_style(&self, style: &ProcessingStyle) -> Result<()> {
        if style.is_scalar() {
            return Ok(());
        }
        match self.table.resolve_width(style.element(), style.width_bits()) {
            Ok(resolved) if resolved.extension() == style.extension() => Ok(()),
            _ => Err(BackendError::UnsupportedVectorLength {
                element: style.element(),
                width_bits: style.width_bits(),
            }),
        }
    }

    /// Resolve `parallelism` lanes for the kernel's input type, then submit
    ///
    /// Unsupported lane counts fail with `UnsupportedVectorLength`; there is
    /// no fallback to scalar.
    pub fn submit_with_parallelism<K: Kernel>(
        &self,
        kernel: &K,
        parallelism: usize,
        output: &mut [K::Output],
        inputs: &[&[K::Input]],
        element_count: usize,
    ) -> Result<()> {
        let style = self.table.resolve(<K::Input as Element>::TYPE, parallelism)?;
        self.submit(kernel, &style, output, inputs, element_count)
    }

    /// Submit with the widest style available for the kernel's input type
    pub fn submit_widest<K: Kernel>(
        &self,
        kernel: &K,
        output: &mut [K::Output],
        inputs: &[&[K::Input]],
        element_count: usize,
    ) -> Result<()> {
        let style = self.table.widest(<K::Input as Element>::TYPE);
        self.submit(kernel, &style, output, inputs, element_count)
    }

    /// Run an arbitrary closure on the calling thread
    pub fn submit_fn<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        f()
    }

    /// Host submissions complete before `submit` returns
    pub fn wait(&self) -> Result<()> {
        Ok(())
    }
}

impl Drop for HostExecutor {
    fn drop(&mut self) {
        tracing::debug!(
            backend = BACKEND_NAME,
            live_allocations = self.memory.live_allocations(),
            "executor_dropped"
        );
    }
}
