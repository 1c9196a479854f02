use std::alloc::{self, Layout};
use std::collections::BTreeMap;
use std::ptr::NonNull;

use parking_lot::Mutex;
use snafu::OptionExt;

use crate::device::Device;
use crate::error::{InvalidArgumentSnafu, OutOfMemorySnafu, Result};

/// Live allocations of one device, keyed by base address.
///
/// Backends record every allocation here so that `free` of an unknown address
/// and device-side copy ranges outside any allocation can be rejected.
#[derive(Debug, Default)]
pub struct AllocationTable {
    live: Mutex<BTreeMap<usize, usize>>,
}

impl AllocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an allocation of `size` requested bytes at `addr`.
    pub fn insert(&self, addr: usize, size: usize) {
        let previous = self.live.lock().insert(addr, size);
        debug_assert!(previous.is_none(), "address {addr:#x} allocated twice");
    }

    /// Forget an allocation, returning its requested size.
    pub fn remove(&self, addr: usize) -> Option<usize> {
        self.live.lock().remove(&addr)
    }

    /// Requested size of the allocation starting exactly at `addr`.
    pub fn size_of(&self, addr: usize) -> Option<usize> {
        self.live.lock().get(&addr).copied()
    }

    /// Whether `[addr, addr + len)` lies inside a single live allocation.
    pub fn contains_range(&self, addr: usize, len: usize) -> bool {
        let Some(end) = addr.checked_add(len) else {
            return false;
        };
        let live = self.live.lock();
        live.range(..=addr).next_back().is_some_and(|(&base, &size)| end <= base + size)
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    /// Sum of requested bytes over all live allocations.
    pub fn total_bytes(&self) -> usize {
        self.live.lock().values().sum()
    }
}

/// Aligned allocations from the system allocator with per-device bookkeeping.
///
/// Zero-byte requests reserve one byte so every allocation has a unique,
/// non-null address; the recorded size stays zero.
#[derive(Debug)]
pub struct AlignedAllocator {
    alignment: usize,
    table: AllocationTable,
}

impl AlignedAllocator {
    pub fn new(alignment: usize) -> Self {
        debug_assert!(alignment.is_power_of_two());
        Self { alignment, table: AllocationTable::new() }
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    fn layout(&self, size: usize) -> Option<Layout> {
        Layout::from_size_align(size.max(1), self.alignment).ok()
    }

    pub fn alloc(&self, device: Device, size: usize) -> Result<NonNull<u8>> {
        let layout = self.layout(size).context(OutOfMemorySnafu { device, size })?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = NonNull::new(unsafe { alloc::alloc(layout) }).context(OutOfMemorySnafu { device, size })?;
        self.table.insert(ptr.as_ptr() as usize, size);
        tracing::trace!(%device, size, live = self.table.len(), live_bytes = self.table.total_bytes(), "allocation recorded");
        Ok(ptr)
    }

    /// Release an allocation made by [`AlignedAllocator::alloc`].
    ///
    /// # Safety
    ///
    /// No live reference into the allocation may remain.
    pub unsafe fn free(&self, device: Device, ptr: NonNull<u8>) -> Result<()> {
        let addr = ptr.as_ptr() as usize;
        let size = self.table.remove(addr).with_context(|| InvalidArgumentSnafu {
            reason: format!("{addr:#x} is not a live allocation on {device}"),
        })?;
        // SAFETY: the table only holds addresses returned by `alloc`, whose layout
        // was built from the same size and alignment and validated then.
        unsafe {
            let layout = Layout::from_size_align_unchecked(size.max(1), self.alignment);
            alloc::dealloc(ptr.as_ptr(), layout);
        }
        tracing::trace!(%device, size, live = self.table.len(), live_bytes = self.table.total_bytes(), "allocation released");
        Ok(())
    }

    /// Fail with `InvalidArgument` unless `[ptr, ptr + len)` is inside a live allocation.
    pub fn check_range(&self, device: Device, ptr: *const u8, len: usize) -> Result<()> {
        let addr = ptr as usize;
        snafu::ensure!(
            self.table.contains_range(addr, len),
            InvalidArgumentSnafu { reason: format!("range {addr:#x}+{len} is outside any allocation on {device}") }
        );
        Ok(())
    }
}
