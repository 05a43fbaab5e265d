//! Zero-initialised, explicitly aligned heap blocks
//!
//! Backing storage for host buffers and for the emulated device's memory.
//! Typed views go through `bytemuck`, so callers never touch raw pointers.

use crate::error::{BackendError, Result};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Owned heap block with a fixed size and alignment
pub(crate) struct AlignedBlock {
    data: NonNull<u8>,
    layout: Layout,
}

impl AlignedBlock {
    /// Allocate `size_bytes` zeroed bytes aligned to `align`
    ///
    /// `align` must be a non-zero power of two. A zero-size block performs no
    /// allocation and points at a dangling address that still honours
    /// `align`.
    pub(crate) fn zeroed(size_bytes: usize, align: usize) -> Result<Self> {
        if !align.is_power_of_two() {
            return Err(BackendError::InvalidAlignment(align));
        }
        let layout = Layout::from_size_align(size_bytes, align)
            .map_err(|e| BackendError::allocation_failed(size_bytes, e.to_string()))?;

        let data = if size_bytes == 0 {
            NonNull::new(align as *mut u8)
        } else {
            // SAFETY: layout has a non-zero size.
            NonNull::new(unsafe { alloc_zeroed(layout) })
        }
        .ok_or_else(|| BackendError::allocation_failed(size_bytes, "allocator returned null"))?;

        Ok(Self { data, layout })
    }

    pub(crate) fn size_bytes(&self) -> usize {
        self.layout.size()
    }

    pub(crate) fn align(&self) -> usize {
        self.layout.align()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        // SAFETY: data points at `size` initialised bytes owned by self (or is
        // a dangling, aligned pointer for a zero-length slice).
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.layout.size()) }
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.layout.size()) }
    }

    /// First `len` elements viewed as `T`
    pub(crate) fn typed<T: bytemuck::Pod>(&self, len: usize) -> &[T] {
        bytemuck::cast_slice(&self.as_bytes()[..len * std::mem::size_of::<T>()])
    }

    pub(crate) fn typed_mut<T: bytemuck::Pod>(&mut self, len: usize) -> &mut [T] {
        bytemuck::cast_slice_mut(&mut self.as_bytes_mut()[..len * std::mem::size_of::<T>()])
    }
}

impl Drop for AlignedBlock {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            // SAFETY: allocated in `zeroed` with this exact layout.
            unsafe { dealloc(self.data.as_ptr(), self.layout) }
        }
    }
}

// SAFETY: AlignedBlock uniquely owns its allocation, like Box<[u8]>.
unsafe impl Send for AlignedBlock {}
unsafe impl Sync for AlignedBlock {}
