//! Host memory manager
//!
//! Flat, zero-initialised host allocations with explicit alignment. Every
//! [`HostBuffer`] remembers which manager produced it; the manager keeps
//! live counters so allocate/deallocate cycles can be checked for residue.

use crate::backends::common::AlignedBlock;
use crate::element::Element;
use crate::error::{BackendError, Result};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use vectorhal_tracing::performance::{record_allocation, record_transfer};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct AllocationStats {
    live_allocations: AtomicUsize,
    live_bytes: AtomicUsize,
    next_buffer_id: AtomicU64,
}

/// Allocates, copies and frees flat host memory
#[derive(Debug)]
pub struct HostMemoryManager {
    id: u64,
    stats: Arc<AllocationStats>,
}

impl HostMemoryManager {
    pub fn new() -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            stats: Arc::new(AllocationStats::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Allocate `element_count` zeroed elements
    ///
    /// `alignment == 0` means `align_of::<T>()`. Otherwise it must be a
    /// power of two; it is raised to `align_of::<T>()` if smaller.
    pub fn allocate<T: Element>(&self, element_count: usize, alignment: usize) -> Result<HostBuffer<T>> {
        let start = Instant::now();

        let align = match alignment {
            0 => std::mem::align_of::<T>(),
            a if !a.is_power_of_two() => return Err(BackendError::InvalidAlignment(a)),
            a => a.max(std::mem::align_of::<T>()),
        };
        let size_bytes = element_count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| BackendError::allocation_failed(usize::MAX, "size overflow"))?;

        let block = AlignedBlock::zeroed(size_bytes, align)?;
        let id = self.stats.next_buffer_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.live_allocations.fetch_add(1, Ordering::Relaxed);
        self.stats.live_bytes.fetch_add(size_bytes, Ordering::Relaxed);

        let duration_us = start.elapsed().as_micros() as u64;
        record_allocation(size_bytes, "host", align, duration_us);
        tracing::debug!(
            buffer = id,
            elements = element_count,
            element_type = %T::TYPE,
            size_bytes = size_bytes,
            alignment = align,
            "host_buffer_allocated"
        );

        Ok(HostBuffer {
            block,
            len: element_count,
            id,
            owner: self.id,
            stats: Arc::clone(&self.stats),
            _marker: PhantomData,
        })
    }

    /// Release a buffer produced by this manager
    ///
    /// A buffer from another manager is rejected with `ForeignHandle`; its
    /// memory is still returned to its own manager when it drops here.
    pub fn deallocate<T: Element>(&self, buffer: HostBuffer<T>) -> Result<()> {
        if buffer.owner != self.id {
            return Err(BackendError::ForeignHandle {
                handle: buffer.id,
                owner: buffer.owner,
                expected: self.id,
            });
        }
        tracing::debug!(buffer = buffer.id, size_bytes = buffer.size_bytes(), "host_buffer_freed");
        drop(buffer);
        Ok(())
    }

    /// Copy `element_count` elements from `src` to `dst` in one bulk move
    pub fn copy<T: Element>(&self, dst: &mut [T], src: &[T], element_count: usize) -> Result<()> {
        let len = dst.len().min(src.len());
        if element_count > len {
            return Err(BackendError::BufferOutOfBounds {
                requested: element_count,
                len,
            });
        }

        let start = Instant::now();
        dst[..element_count].copy_from_slice(&src[..element_count]);
        record_transfer(
            element_count * std::mem::size_of::<T>(),
            "H2H",
            start.elapsed().as_micros() as u64,
        );
        Ok(())
    }

    /// Buffers allocated by this manager and not yet dropped
    pub fn live_allocations(&self) -> usize {
        self.stats.live_allocations.load(Ordering::Relaxed)
    }

    /// Bytes held by live buffers
    pub fn live_bytes(&self) -> usize {
        self.stats.live_bytes.load(Ordering::Relaxed)
    }
}

impl Default for HostMemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Aligned host allocation viewed as `[T]`
pub struct HostBuffer<T: Element> {
    block: AlignedBlock,
    len: usize,
    id: u64,
    owner: u64,
    stats: Arc<AllocationStats>,
    _marker: PhantomData<T>,
}

impl<T: Element> HostBuffer<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the manager that allocated this buffer
    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn alignment(&self) -> usize {
        self.block.align()
    }

    pub fn size_bytes(&self) -> usize {
        self.block.size_bytes()
    }

    pub fn as_slice(&self) -> &[T] {
        self.block.typed(self.len)
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.block.typed_mut(self.len)
    }
}

impl<T: Element> Deref for HostBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Element> DerefMut for HostBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Element> Drop for HostBuffer<T> {
    fn drop(&mut self) {
        self.stats.live_allocations.fetch_sub(1, Ordering::Relaxed);
        self.stats.live_bytes.fetch_sub(self.block.size_bytes(), Ordering::Relaxed);
    }
}

impl<T: Element> fmt::Debug for HostBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuffer")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("len", &self.len)
            .field("element_type", &T::TYPE)
            .field("alignment", &self.block.align())
            .finish()
    }
}
