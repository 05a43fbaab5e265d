//! Handle and endpoint types shared by the executors

use crate::element::Element;
use std::fmt;
use std::marker::PhantomData;

/// Where an accelerator allocation lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryClass {
    /// Host-resident, visible to the device (USM host memory)
    HostVisible,
    /// Device-resident, not addressable from the host
    DeviceExclusive,
}

impl MemoryClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            MemoryClass::HostVisible => "host_visible",
            MemoryClass::DeviceExclusive => "device_exclusive",
        }
    }
}

impl fmt::Display for MemoryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryClass::HostVisible => f.write_str("host-visible"),
            MemoryClass::DeviceExclusive => f.write_str("device-exclusive"),
        }
    }
}

/// Handle to an accelerator allocation
///
/// Handles are plain values: copying one does not duplicate or reference
/// count the memory behind it. The allocation stays live until the handle
/// is passed to the owning executor's `deallocate`.
pub struct DeviceBuffer<T> {
    id: u64,
    len: usize,
    class: MemoryClass,
    owner: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Element> DeviceBuffer<T> {
    pub(crate) fn new(id: u64, len: usize, class: MemoryClass, owner: u64) -> Self {
        Self {
            id,
            len,
            class,
            owner,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Length in elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn class(&self) -> MemoryClass {
        self.class
    }

    /// Id of the executor that allocated this buffer
    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn size_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }
}

impl<T> Clone for DeviceBuffer<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DeviceBuffer<T> {}

impl<T> PartialEq for DeviceBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.owner == other.owner
    }
}

impl<T> Eq for DeviceBuffer<T> {}

impl<T> fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("id", &self.id)
            .field("len", &self.len)
            .field("class", &self.class)
            .field("owner", &self.owner)
            .finish()
    }
}

impl<T> fmt::Display for DeviceBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}@{}", self.id, self.owner)
    }
}

/// Source side of an accelerator copy
#[derive(Debug)]
pub enum CopySource<'a, T> {
    Host(&'a [T]),
    Device(DeviceBuffer<T>),
}

/// Destination side of an accelerator copy
#[derive(Debug)]
pub enum CopyDest<'a, T> {
    Host(&'a mut [T]),
    Device(DeviceBuffer<T>),
}

impl<'a, T> From<&'a [T]> for CopySource<'a, T> {
    fn from(slice: &'a [T]) -> Self {
        CopySource::Host(slice)
    }
}

impl<'a, T> From<&'a Vec<T>> for CopySource<'a, T> {
    fn from(vec: &'a Vec<T>) -> Self {
        CopySource::Host(vec.as_slice())
    }
}

impl<T> From<DeviceBuffer<T>> for CopySource<'_, T> {
    fn from(buffer: DeviceBuffer<T>) -> Self {
        CopySource::Device(buffer)
    }
}

impl<'a, T> From<&'a mut [T]> for CopyDest<'a, T> {
    fn from(slice: &'a mut [T]) -> Self {
        CopyDest::Host(slice)
    }
}

impl<'a, T> From<&'a mut Vec<T>> for CopyDest<'a, T> {
    fn from(vec: &'a mut Vec<T>) -> Self {
        CopyDest::Host(vec.as_mut_slice())
    }
}

impl<T> From<DeviceBuffer<T>> for CopyDest<'_, T> {
    fn from(buffer: DeviceBuffer<T>) -> Self {
        CopyDest::Device(buffer)
    }
}

impl<T> CopySource<'_, T> {
    pub(crate) fn len(&self) -> usize {
        match self {
            CopySource::Host(slice) => slice.len(),
            CopySource::Device(buffer) => buffer.len,
        }
    }
}

impl<T> CopyDest<'_, T> {
    pub(crate) fn len(&self) -> usize {
        match self {
            CopyDest::Host(slice) => slice.len(),
            CopyDest::Device(buffer) => buffer.len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_buffer_is_copy() {
        let a: DeviceBuffer<u32> = DeviceBuffer::new(3, 128, MemoryClass::DeviceExclusive, 1);
        let b = a;
        assert_eq!(a, b);
        assert_eq!(a.size_bytes(), 512);
        assert_eq!(a.to_string(), "dev3@1");
    }

    #[test]
    fn test_endpoint_lengths() {
        let data = vec![1u16, 2, 3];
        let src: CopySource<'_, u16> = (&data).into();
        assert_eq!(src.len(), 3);

        let buffer: DeviceBuffer<u16> = DeviceBuffer::new(1, 9, MemoryClass::HostVisible, 2);
        let dst: CopyDest<'_, u16> = buffer.into();
        assert_eq!(dst.len(), 9);
    }
}
