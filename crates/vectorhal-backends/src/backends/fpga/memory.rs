//! Emulated accelerator memory
//!
//! Allocations of both classes live in one map keyed by handle id. The map
//! is shared between the executor (allocation, host-visible access) and the
//! queue worker (copies, kernels) behind `Arc<RwLock<_>>`.

use crate::backend::MemoryClass;
use crate::backends::common::AlignedBlock;
use crate::element::{Element, ElementType};
use crate::error::{BackendError, Result};
use std::collections::HashMap;

pub(crate) struct DeviceAllocation {
    block: AlignedBlock,
    class: MemoryClass,
    element_type: ElementType,
    len: usize,
}

impl DeviceAllocation {
    pub(crate) fn class(&self) -> MemoryClass {
        self.class
    }

    pub(crate) fn typed<T: Element>(&self, len: usize) -> Result<&[T]> {
        self.check_view::<T>(len)?;
        Ok(self.block.typed(len))
    }

    pub(crate) fn typed_mut<T: Element>(&mut self, len: usize) -> Result<&mut [T]> {
        self.check_view::<T>(len)?;
        Ok(self.block.typed_mut(len))
    }

    fn check_view<T: Element>(&self, len: usize) -> Result<()> {
        if T::TYPE != self.element_type {
            return Err(BackendError::type_mismatch(self.element_type, T::TYPE));
        }
        if len > self.len {
            return Err(BackendError::BufferOutOfBounds {
                requested: len,
                len: self.len,
            });
        }
        Ok(())
    }
}

pub(crate) struct DeviceMemory {
    allocations: HashMap<u64, DeviceAllocation>,
    next_id: u64,
    device_bytes: usize,
    host_bytes: usize,
    limit_bytes: Option<usize>,
}

impl DeviceMemory {
    pub(crate) fn new(limit_bytes: Option<usize>) -> Self {
        Self {
            allocations: HashMap::new(),
            next_id: 1,
            device_bytes: 0,
            host_bytes: 0,
            limit_bytes,
        }
    }

    pub(crate) fn allocate(
        &mut self,
        size_bytes: usize,
        align: usize,
        class: MemoryClass,
        element_type: ElementType,
        len: usize,
    ) -> Result<u64> {
        if class == MemoryClass::DeviceExclusive {
            if let Some(limit) = self.limit_bytes {
                let available = limit.saturating_sub(self.device_bytes);
                if size_bytes > available {
                    return Err(BackendError::allocation_failed(
                        size_bytes,
                        format!("device memory limit reached ({available} of {limit} bytes free)"),
                    ));
                }
            }
        }

        let block = AlignedBlock::zeroed(size_bytes, align)?;
        let id = self.next_id;
        self.next_id += 1;

        match class {
            MemoryClass::DeviceExclusive => self.device_bytes += size_bytes,
            MemoryClass::HostVisible => self.host_bytes += size_bytes,
        }
        self.allocations.insert(
            id,
            DeviceAllocation {
                block,
                class,
                element_type,
                len,
            },
        );
        Ok(id)
    }

    /// Free `id`, which must be live and of `class`
    pub(crate) fn free(&mut self, id: u64, class: MemoryClass) -> Result<usize> {
        let actual = self.get(id)?.class();
        if actual != class {
            return Err(BackendError::WrongMemoryClass {
                handle: id,
                expected: class,
                actual,
            });
        }
        let allocation = self.allocations.remove(&id).ok_or(BackendError::InvalidHandle(id))?;
        let size = allocation.block.size_bytes();
        self.account_release(allocation.class(), size);
        Ok(size)
    }

    pub(crate) fn get(&self, id: u64) -> Result<&DeviceAllocation> {
        self.allocations.get(&id).ok_or(BackendError::InvalidHandle(id))
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Result<&mut DeviceAllocation> {
        self.allocations.get_mut(&id).ok_or(BackendError::InvalidHandle(id))
    }

    /// Temporarily remove an allocation so it can be written while others
    /// are borrowed
    pub(crate) fn take(&mut self, id: u64) -> Result<DeviceAllocation> {
        self.allocations.remove(&id).ok_or(BackendError::InvalidHandle(id))
    }

    pub(crate) fn restore(&mut self, id: u64, allocation: DeviceAllocation) {
        self.allocations.insert(id, allocation);
    }

    pub(crate) fn write<T: Element>(&mut self, id: u64, data: &[T]) -> Result<()> {
        self.get_mut(id)?.typed_mut::<T>(data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn read<T: Element>(&self, id: u64, len: usize) -> Result<Vec<T>> {
        Ok(self.get(id)?.typed::<T>(len)?.to_vec())
    }

    pub(crate) fn copy_between<T: Element>(&mut self, dst: u64, src: u64, len: usize) -> Result<()> {
        if dst == src {
            self.get(src)?.typed::<T>(len)?;
            return Ok(());
        }
        let mut target = self.take(dst)?;
        let result = self
            .get(src)
            .and_then(|source| source.typed::<T>(len))
            .and_then(|data| {
                target.typed_mut::<T>(len)?.copy_from_slice(data);
                Ok(())
            });
        self.restore(dst, target);
        result
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.allocations.contains_key(&id)
    }

    pub(crate) fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    pub(crate) fn live_bytes(&self) -> usize {
        self.device_bytes + self.host_bytes
    }

    /// Drop every allocation, returning `(count, bytes)` released
    pub(crate) fn release_all(&mut self) -> (usize, usize) {
        let released = (self.allocations.len(), self.live_bytes());
        self.allocations.clear();
        self.device_bytes = 0;
        self.host_bytes = 0;
        released
    }

    fn account_release(&mut self, class: MemoryClass, size: usize) {
        match class {
            MemoryClass::DeviceExclusive => self.device_bytes -= size,
            MemoryClass::HostVisible => self.host_bytes -= size,
        }
    }
}
