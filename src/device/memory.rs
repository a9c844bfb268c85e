//! Device memory: reference-counted allocations addressed by [`DevicePtr`].
//!
//! A `DevicePtr` keeps its allocation alive, so work still queued on a
//! stream never outlives the memory it touches. Buffers are owned by the
//! caller; the library only borrows pointers and never frees them.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{DeviceError, DeviceResult, DeviceStream};
use crate::element::DeviceElement;

/// Alignment of every allocation, in bytes.
pub const ALLOCATION_ALIGN: usize = 256;

pub(crate) struct Allocation {
    ptr: NonNull<u8>,
    bytes: usize,
    id: u64,
    /// Stream counter of live bytes, released on drop.
    accounting: Option<Arc<AtomicUsize>>,
}

// Safety: the allocation is plain bytes; concurrent access is ordered by the
// streams that use it, as on a real device.
unsafe impl Send for Allocation {}
unsafe impl Sync for Allocation {}

impl Allocation {
    pub(crate) fn zeroed(bytes: usize) -> DeviceResult<Arc<Self>> {
        Self::zeroed_with(bytes, None)
    }

    /// Allocate `bytes` already added to `counter`; the count is released
    /// when the allocation is freed, or at once if allocation fails.
    pub(crate) fn zeroed_accounted(bytes: usize, counter: &Arc<AtomicUsize>) -> DeviceResult<Arc<Self>> {
        Self::zeroed_with(bytes, Some(Arc::clone(counter))).map_err(|e| {
            counter.fetch_sub(bytes, Ordering::AcqRel);
            e
        })
    }

    fn zeroed_with(bytes: usize, accounting: Option<Arc<AtomicUsize>>) -> DeviceResult<Arc<Self>> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        if bytes == 0 {
            return Ok(Arc::new(Allocation {
                // Never dereferenced: every access is bounds-checked against `bytes`.
                ptr: NonNull::<u8>::dangling(),
                bytes: 0,
                id,
                accounting,
            }));
        }

        let layout = Layout::from_size_align(bytes, ALLOCATION_ALIGN)
            .map_err(|_| DeviceError::OutOfMemory { requested: bytes, limit: 0 })?;
        // Safety: layout has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(DeviceError::OutOfMemory { requested: bytes, limit: 0 })?;
        Ok(Arc::new(Allocation { ptr, bytes, id, accounting }))
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if let Some(counter) = &self.accounting {
            counter.fetch_sub(self.bytes, Ordering::AcqRel);
        }
        if self.bytes > 0 {
            // Safety: allocated in `zeroed` with the same layout.
            unsafe {
                alloc::dealloc(
                    self.ptr.as_ptr(),
                    Layout::from_size_align_unchecked(self.bytes, ALLOCATION_ALIGN),
                );
            }
        }
    }
}

/// A possibly-null untyped device address.
#[derive(Clone, Default)]
pub struct DevicePtr {
    alloc: Option<Arc<Allocation>>,
    offset: usize,
}

impl DevicePtr {
    pub fn null() -> Self {
        Self::default()
    }

    pub(crate) fn from_allocation(alloc: Arc<Allocation>) -> Self {
        Self { alloc: Some(alloc), offset: 0 }
    }

    pub fn is_null(&self) -> bool {
        self.alloc.is_none()
    }

    /// Pointer advanced by `bytes`. Offsets past the end are allowed here and
    /// rejected when the pointer is used.
    pub fn add_bytes(&self, bytes: usize) -> Self {
        Self {
            alloc: self.alloc.clone(),
            offset: self.offset.saturating_add(bytes),
        }
    }

    /// Pointer advanced by `count` elements of `T`.
    pub fn add<T: DeviceElement>(&self, count: usize) -> Self {
        self.add_bytes(count.saturating_mul(std::mem::size_of::<T>()))
    }

    /// Bytes addressable from this pointer to the end of its allocation.
    pub fn available_bytes(&self) -> usize {
        match &self.alloc {
            Some(a) => a.bytes.saturating_sub(self.offset),
            None => 0,
        }
    }

    /// Numeric address, 0 for null.
    pub fn address(&self) -> usize {
        match &self.alloc {
            Some(a) => (a.ptr.as_ptr() as usize).wrapping_add(self.offset),
            None => 0,
        }
    }

    pub fn allocation_id(&self) -> Option<u64> {
        self.alloc.as_ref().map(|a| a.id)
    }

    /// Byte range `[start, end)` covered by `len_bytes` starting here.
    pub(crate) fn byte_range(&self, len_bytes: usize) -> (usize, usize) {
        let start = self.address();
        (start, start.saturating_add(len_bytes))
    }

    /// Raw pointer for kernels. Callers must bounds-check with
    /// [`available_bytes`](Self::available_bytes) first.
    pub(crate) fn as_mut_ptr<T>(&self) -> *mut T {
        match &self.alloc {
            // Safety: offset is within or one past the allocation whenever the
            // caller has bounds-checked; the pointer is only formed, not read.
            Some(a) => a.ptr.as_ptr().wrapping_add(self.offset) as *mut T,
            None => std::ptr::null_mut(),
        }
    }

    /// Read one `T` at this address, or `None` if out of bounds.
    pub(crate) fn read<T: DeviceElement>(&self) -> Option<T> {
        if self.available_bytes() < std::mem::size_of::<T>() {
            return None;
        }
        // Safety: in bounds; read_unaligned because offsets are caller-chosen.
        Some(unsafe { std::ptr::read_unaligned(self.as_mut_ptr::<T>()) })
    }
}

impl PartialEq for DevicePtr {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for DevicePtr {}

impl fmt::Debug for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("DevicePtr(null)")
        } else {
            write!(f, "DevicePtr({:#x})", self.address())
        }
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.address())
    }
}

/// A typed, caller-owned device buffer.
pub struct DeviceBuffer<T: DeviceElement> {
    ptr: DevicePtr,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: DeviceElement> DeviceBuffer<T> {
    pub fn zeroed(stream: &dyn DeviceStream, len: usize) -> DeviceResult<Self> {
        let bytes = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(DeviceError::OutOfMemory { requested: usize::MAX, limit: 0 })?;
        let ptr = stream.allocate(bytes)?;
        Ok(Self { ptr, len, _marker: PhantomData })
    }

    pub fn from_host(stream: &dyn DeviceStream, data: &[T]) -> DeviceResult<Self> {
        let buf = Self::zeroed(stream, data.len())?;
        buf.write(0, data);
        Ok(buf)
    }

    /// Synchronous host-to-device copy into the start of the buffer.
    pub fn copy_from_host(&self, stream: &dyn DeviceStream, data: &[T]) -> DeviceResult<()> {
        if data.len() > self.len {
            return Err(DeviceError::LaunchFailed {
                kernel: "memcpy_h2d".to_string(),
                message: format!("{} elements do not fit in {}", data.len(), self.len),
            });
        }
        stream.synchronize()?;
        self.write(0, data);
        Ok(())
    }

    /// Synchronous device-to-host copy of the whole buffer.
    pub fn copy_to_host(&self, stream: &dyn DeviceStream) -> DeviceResult<Vec<T>> {
        stream.synchronize()?;
        let mut out = vec![T::default(); self.len];
        if self.len > 0 {
            // Safety: the allocation holds exactly `len` elements of T.
            unsafe {
                std::ptr::copy_nonoverlapping(self.ptr.as_mut_ptr::<T>() as *const T, out.as_mut_ptr(), self.len);
            }
        }
        Ok(out)
    }

    fn write(&self, at: usize, data: &[T]) {
        debug_assert!(at + data.len() <= self.len);
        if data.is_empty() {
            return;
        }
        // Safety: bounds checked by callers; source and destination never overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_mut_ptr::<T>().add(at), data.len());
        }
    }

    pub fn ptr(&self) -> DevicePtr {
        self.ptr.clone()
    }

    /// Pointer to element `index`.
    pub fn ptr_at(&self, index: usize) -> DevicePtr {
        self.ptr.add::<T>(index)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: DeviceElement> fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("type", &T::DATATYPE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::InlineStream;

    #[test]
    fn test_allocation_is_aligned_and_zeroed() {
        let stream = InlineStream::new();
        let buf = DeviceBuffer::<f64>::zeroed(&stream, 33).unwrap();
        assert_eq!(buf.ptr().address() % ALLOCATION_ALIGN, 0);
        assert!(buf.copy_to_host(&stream).unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_host_round_trip() {
        let stream = InlineStream::new();
        let data: Vec<f32> = (0..17).map(|i| i as f32 * 0.5).collect();
        let buf = DeviceBuffer::from_host(&stream, &data).unwrap();
        assert_eq!(buf.copy_to_host(&stream).unwrap(), data);

        let update = vec![9.0f32; 4];
        buf.copy_from_host(&stream, &update).unwrap();
        let back = buf.copy_to_host(&stream).unwrap();
        assert_eq!(&back[..4], &update[..]);
        assert_eq!(back[4], 2.0);
        assert!(buf.copy_from_host(&stream, &vec![0.0; 18]).is_err());
    }

    #[test]
    fn test_pointer_arithmetic_and_bounds() {
        let stream = InlineStream::new();
        let buf = DeviceBuffer::<f32>::zeroed(&stream, 8).unwrap();
        let p = buf.ptr_at(6);
        assert_eq!(p.available_bytes(), 8);
        assert_eq!(p.address() - buf.ptr().address(), 24);
        assert_eq!(p.read::<f32>(), Some(0.0));
        assert_eq!(buf.ptr_at(8).read::<f32>(), None);
        assert_eq!(DevicePtr::null().available_bytes(), 0);
        assert!(DevicePtr::null().is_null());
    }

    #[test]
    fn test_equality_is_by_address() {
        let stream = InlineStream::new();
        let buf = DeviceBuffer::<i32>::zeroed(&stream, 4).unwrap();
        assert_eq!(buf.ptr(), buf.ptr_at(0));
        assert_ne!(buf.ptr(), buf.ptr_at(1));
        assert_eq!(buf.ptr().allocation_id(), buf.ptr_at(3).allocation_id());
    }
}
