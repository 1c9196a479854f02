//! Host memory backend.

use std::ptr::{self, NonNull};

use crate::allocator::AlignedAllocator;
use crate::device::Device;
use crate::error::Result;

#[derive(Debug)]
pub struct HostBackend {
    memory: AlignedAllocator,
}

impl HostBackend {
    pub fn new(alignment: usize) -> Self {
        tracing::info!(alignment, "host backend initialized");
        Self { memory: AlignedAllocator::new(alignment) }
    }

    pub fn enumerate(&self) -> Vec<Device> {
        vec![Device::cpu()]
    }

    pub fn describe(&self) -> String {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        format!(
            "{} (host memory, {}, {cores} logical cores, {}-byte aligned)",
            Device::cpu(),
            std::env::consts::ARCH,
            self.memory.alignment()
        )
    }

    pub fn malloc(&self, size: usize) -> Result<NonNull<u8>> {
        self.memory.alloc(Device::cpu(), size)
    }

    /// # Safety
    ///
    /// `ptr` must not be used after this call.
    pub unsafe fn free(&self, ptr: NonNull<u8>) -> Result<()> {
        unsafe { self.memory.free(Device::cpu(), ptr) }
    }

    /// Plain host-to-host copy.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid for `size` bytes and must not overlap.
    pub unsafe fn copy(&self, dst: *mut u8, src: *const u8, size: usize) {
        unsafe { ptr::copy_nonoverlapping(src, dst, size) };
    }
}
