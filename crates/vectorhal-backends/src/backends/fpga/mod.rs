//! Accelerator (FPGA) executor
//!
//! Memory comes in two classes: host-visible allocations the host can read
//! and write directly, and device-exclusive allocations reachable only
//! through copies and kernels. Copies and kernels run on an in-order
//! command queue; every call blocks until its command has completed.
//!
//! # Architecture
//!
//! ```text
//! AcceleratorExecutor
//! ├── DeviceDescriptor  - selected device + capabilities
//! ├── DeviceMemory      - Arc<RwLock<..>> shared with the queue worker
//! ├── CommandQueue      - FIFO worker thread, panic-to-fault boundary
//! └── ExecutorState     - Ready → Faulted / TornDown
//! ```
//!
//! # Usage
//!
//! ```rust
//! use vectorhal_backends::{AcceleratorExecutor, MemoryClass};
//!
//! # fn main() -> vectorhal_backends::Result<()> {
//! let exec = AcceleratorExecutor::emulator()?;
//! let data: Vec<u32> = (0..16).collect();
//!
//! let dev = exec.allocate::<u32>(16, MemoryClass::DeviceExclusive, 64)?;
//! exec.copy(dev, data.as_slice(), 16)?;
//!
//! let mut back = vec![0u32; 16];
//! exec.copy(back.as_mut_slice(), dev, 16)?;
//! assert_eq!(back, data);
//!
//! exec.deallocate(dev)?;
//! # Ok(())
//! # }
//! ```

mod device;
pub(crate) mod memory;
mod queue;

pub use device::{AcceleratorConfig, DeviceCapabilities, DeviceDescriptor, DeviceSelector, EmulatorOptions};
pub use queue::QueueProfile;

use crate::backend::{check_invocation, CopyDest, CopySource, DeviceBuffer, Kernel, MemoryClass};
use crate::config::HalConfig;
use crate::element::Element;
use crate::error::{BackendError, ErrorKind, Result};
use crate::style::ProcessingStyle;
use memory::DeviceMemory;
use parking_lot::{Mutex, RwLock};
use queue::CommandQueue;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use vectorhal_tracing::performance::{record_allocation, record_submission, record_transfer, PerformanceSpan};

const BACKEND_NAME: &str = "fpga_emulator";

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of an accelerator executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState {
    Ready,
    /// A queued command failed; the message describes the first fault
    Faulted(String),
    TornDown,
}

/// Executor for an accelerator device reached through a command queue
pub struct AcceleratorExecutor {
    id: u64,
    descriptor: DeviceDescriptor,
    memory: Arc<RwLock<DeviceMemory>>,
    queue: CommandQueue,
    state: Mutex<ExecutorState>,
}

impl AcceleratorExecutor {
    /// Open the configured device and start its queue
    ///
    /// Fails with `MissingCapability` if the device cannot allocate both
    /// host-visible and device-exclusive memory.
    #[tracing::instrument(skip(config), fields(device = %config.device, profiling = config.enable_profiling))]
    pub fn new(config: AcceleratorConfig) -> Result<Self> {
        let start = Instant::now();

        let descriptor = device::open(&config)?;
        descriptor.validate()?;

        let id = NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed);
        let memory = Arc::new(RwLock::new(DeviceMemory::new(descriptor.memory_limit_bytes)));
        let queue = CommandQueue::start(&id.to_string(), Arc::clone(&memory), config.enable_profiling)?;

        tracing::info!(
            executor = id,
            device = %descriptor.name,
            kind = %descriptor.kind,
            duration_us = start.elapsed().as_micros() as u64,
            "executor_created"
        );

        Ok(Self {
            id,
            descriptor,
            memory,
            queue,
            state: Mutex::new(ExecutorState::Ready),
        })
    }

    /// Executor on the emulated device with default options
    pub fn emulator() -> Result<Self> {
        Self::new(AcceleratorConfig::emulator())
    }

    /// Executor configured from the environment
    pub fn from_config(config: &HalConfig) -> Result<Self> {
        Self::new(config.accelerator.clone())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ExecutorState {
        self.state.lock().clone()
    }

    /// Allocations not yet deallocated
    pub fn live_allocations(&self) -> usize {
        self.memory.read().live_allocations()
    }

    pub fn live_bytes(&self) -> usize {
        self.memory.read().live_bytes()
    }

    /// Per-command timings; empty unless profiling was enabled
    pub fn profile(&self) -> Vec<QueueProfile> {
        self.queue.profile()
    }

    /// Allocate `element_count` zeroed elements in `class`
    ///
    /// `alignment` follows the host rules: 0 means `align_of::<T>()`,
    /// otherwise a power of two.
    pub fn allocate<T: Element>(
        &self,
        element_count: usize,
        class: MemoryClass,
        alignment: usize,
    ) -> Result<DeviceBuffer<T>> {
        self.ensure_ready()?;
        let start = Instant::now();

        let align = match alignment {
            0 => std::mem::align_of::<T>(),
            a if !a.is_power_of_two() => return Err(BackendError::InvalidAlignment(a)),
            a => a.max(std::mem::align_of::<T>()),
        };
        let size_bytes = element_count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| BackendError::allocation_failed(usize::MAX, "size overflow"))?;

        let id = self
            .memory
            .write()
            .allocate(size_bytes, align, class, T::TYPE, element_count)?;

        record_allocation(size_bytes, class.as_str(), align, start.elapsed().as_micros() as u64);
        tracing::debug!(
            executor = self.id,
            buffer = id,
            class = %class,
            elements = element_count,
            element_type = %T::TYPE,
            "device_buffer_allocated"
        );

        Ok(DeviceBuffer::new(id, element_count, class, self.id))
    }

    /// Release `buffer` according to its memory class
    pub fn deallocate<T: Element>(&self, buffer: DeviceBuffer<T>) -> Result<()> {
        self.ensure_ready()?;
        self.check_owner(&buffer)?;
        let size = self.memory.write().free(buffer.id(), buffer.class())?;
        tracing::debug!(
            executor = self.id,
            buffer = buffer.id(),
            class = %buffer.class(),
            size_bytes = size,
            "device_buffer_freed"
        );
        Ok(())
    }

    /// Copy `element_count` elements between any combination of host
    /// slices and device buffers; blocks until the copy has completed
    pub fn copy<'d, 's, T: Element>(
        &self,
        dst: impl Into<CopyDest<'d, T>>,
        src: impl Into<CopySource<'s, T>>,
        element_count: usize,
    ) -> Result<()> {
        self.ensure_ready()?;
        let dst = dst.into();
        let src = src.into();

        for handle in [device_of_dest(&dst), device_of_source(&src)].into_iter().flatten() {
            self.check_live(&handle)?;
        }
        let len = dst.len().min(src.len());
        if element_count > len {
            return Err(BackendError::BufferOutOfBounds {
                requested: element_count,
                len,
            });
        }
        if element_count == 0 {
            return Ok(());
        }

        let start = Instant::now();
        let direction = match (dst, src) {
            (CopyDest::Host(d), CopySource::Host(s)) => {
                d[..element_count].copy_from_slice(&s[..element_count]);
                "H2H"
            }
            (CopyDest::Device(d), CopySource::Host(s)) => {
                let staged = s[..element_count].to_vec();
                self.run("copy_h2d", move |memory| memory.write(d.id(), staged.as_slice()))?;
                "H2D"
            }
            (CopyDest::Host(d), CopySource::Device(s)) => {
                let data = self.run("copy_d2h", move |memory| memory.read::<T>(s.id(), element_count))?;
                d[..element_count].copy_from_slice(&data);
                "D2H"
            }
            (CopyDest::Device(d), CopySource::Device(s)) => {
                self.run("copy_d2d", move |memory| {
                    memory.copy_between::<T>(d.id(), s.id(), element_count)
                })?;
                "D2D"
            }
        };

        record_transfer(
            element_count * std::mem::size_of::<T>(),
            direction,
            start.elapsed().as_micros() as u64,
        );
        Ok(())
    }

    /// Run `kernel` on the device at `width_bits` and wait for it
    ///
    /// The kernel sees a style tagged with the synthesized-logic extension.
    /// `output` must not also appear in `inputs`.
    ///
    /// A `Kernel` error from `apply` is returned as is and the executor stays
    /// `Ready`, as on the host. A panic in the kernel, or any other failure
    /// on the queue, is a `DeviceFault` and moves the executor to `Faulted`.
    #[tracing::instrument(skip_all, fields(executor = self.id, kernel = kernel.name(), width_bits = width_bits, elements = element_count))]
    pub fn submit<K>(
        &self,
        kernel: &K,
        width_bits: usize,
        output: DeviceBuffer<K::Output>,
        inputs: &[DeviceBuffer<K::Input>],
        element_count: usize,
    ) -> Result<()>
    where
        K: Kernel + Clone + 'static,
    {
        self.ensure_ready()?;
        let style = ProcessingStyle::accelerator(<K::Input as Element>::TYPE, width_bits)?;

        self.check_live(&output)?;
        for input in inputs {
            self.check_live(input)?;
            if input.id() == output.id() {
                return Err(BackendError::AliasedBuffers(output.id()));
            }
        }
        check_invocation::<K>(&style, output.len(), inputs.iter().map(|i| i.len()), element_count)?;
        if element_count == 0 {
            return Ok(());
        }

        let label = format!("kernel:{}", kernel.name());
        let span = PerformanceSpan::configured(format!("{BACKEND_NAME}_submit:{}", kernel.name()));
        let worker_kernel = kernel.clone();
        let input_ids: Vec<u64> = inputs.iter().map(|i| i.id()).collect();

        self.run(&label, move |memory| {
            let mut target = memory.take(output.id())?;
            let result = catch_unwind(AssertUnwindSafe(|| {
                let out = target.typed_mut::<K::Output>(element_count)?;
                let views = input_ids
                    .iter()
                    .map(|&id| memory.get(id).and_then(|a| a.typed::<K::Input>(element_count)))
                    .collect::<Result<Vec<_>>>()?;
                worker_kernel.apply(&style, out, &views, element_count)
            }));
            // The output goes back into the map even if the kernel panicked.
            memory.restore(output.id(), target);
            result.unwrap_or_else(|payload| resume_unwind(payload))
        })?;

        record_submission(kernel.name(), BACKEND_NAME, element_count, span.elapsed_us());
        Ok(())
    }

    /// Read a host-visible buffer in place
    pub fn with_host_visible<T: Element, R>(&self, buffer: DeviceBuffer<T>, f: impl FnOnce(&[T]) -> R) -> Result<R> {
        self.ensure_ready()?;
        self.check_host_visible(&buffer)?;
        let memory = self.memory.read();
        let view = memory.get(buffer.id())?.typed::<T>(buffer.len())?;
        Ok(f(view))
    }

    /// Write a host-visible buffer in place
    pub fn with_host_visible_mut<T: Element, R>(
        &self,
        buffer: DeviceBuffer<T>,
        f: impl FnOnce(&mut [T]) -> R,
    ) -> Result<R> {
        self.ensure_ready()?;
        self.check_host_visible(&buffer)?;
        let mut memory = self.memory.write();
        let view = memory.get_mut(buffer.id())?.typed_mut::<T>(buffer.len())?;
        Ok(f(view))
    }

    /// Block until every queued command has completed
    pub fn wait(&self) -> Result<()> {
        self.ensure_ready()?;
        self.run("wait", |_| Ok(()))
    }

    /// Drain and stop the queue, then release all device memory
    ///
    /// Allowed from `Ready` and `Faulted`. Every later call fails with
    /// `ExecutorTornDown`.
    pub fn teardown(&mut self) -> Result<()> {
        if *self.state.lock() == ExecutorState::TornDown {
            return Err(BackendError::ExecutorTornDown);
        }
        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.queue.shutdown();
        let (leaked, bytes) = self.memory.write().release_all();
        if leaked > 0 {
            tracing::warn!(
                executor = self.id,
                allocations = leaked,
                bytes = bytes,
                "device_allocations_leaked"
            );
        }
        *self.state.lock() = ExecutorState::TornDown;
        tracing::info!(executor = self.id, device = %self.descriptor.name, "executor_torn_down");
    }

    fn ensure_ready(&self) -> Result<()> {
        match &*self.state.lock() {
            ExecutorState::Ready => Ok(()),
            ExecutorState::Faulted(message) => Err(BackendError::ExecutorFaulted(message.clone())),
            ExecutorState::TornDown => Err(BackendError::ExecutorTornDown),
        }
    }

    /// Run a command on the queue; any failure other than a kernel's own
    /// error faults the executor
    fn run<R, F>(&self, label: &str, work: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut DeviceMemory) -> Result<R> + Send + 'static,
    {
        self.queue.submit(label, work).inspect_err(|err| {
            if err.kind() == ErrorKind::Kernel {
                tracing::warn!(executor = self.id, command = label, error = %err, "kernel_error");
                return;
            }
            tracing::error!(executor = self.id, command = label, error = %err, "device_fault");
            let mut state = self.state.lock();
            if *state == ExecutorState::Ready {
                *state = ExecutorState::Faulted(err.to_string());
            }
        })
    }

    fn check_owner<T: Element>(&self, buffer: &DeviceBuffer<T>) -> Result<()> {
        if buffer.owner() != self.id {
            return Err(BackendError::ForeignHandle {
                handle: buffer.id(),
                owner: buffer.owner(),
                expected: self.id,
            });
        }
        Ok(())
    }

    fn check_live<T: Element>(&self, buffer: &DeviceBuffer<T>) -> Result<()> {
        self.check_owner(buffer)?;
        if !self.memory.read().contains(buffer.id()) {
            return Err(BackendError::InvalidHandle(buffer.id()));
        }
        Ok(())
    }

    fn check_host_visible<T: Element>(&self, buffer: &DeviceBuffer<T>) -> Result<()> {
        self.check_live(buffer)?;
        if buffer.class() != MemoryClass::HostVisible {
            return Err(BackendError::WrongMemoryClass {
                handle: buffer.id(),
                expected: MemoryClass::HostVisible,
                actual: buffer.class(),
            });
        }
        Ok(())
    }
}

impl Drop for AcceleratorExecutor {
    fn drop(&mut self) {
        if *self.state.lock() != ExecutorState::TornDown {
            self.shutdown();
        }
    }
}

fn device_of_dest<T: Element>(dst: &CopyDest<'_, T>) -> Option<DeviceBuffer<T>> {
    match dst {
        CopyDest::Device(buffer) => Some(*buffer),
        CopyDest::Host(_) => None,
    }
}

fn device_of_source<T: Element>(src: &CopySource<'_, T>) -> Option<DeviceBuffer<T>> {
    match src {
        CopySource::Device(buffer) => Some(*buffer),
        CopySource::Host(_) => None,
    }
}
