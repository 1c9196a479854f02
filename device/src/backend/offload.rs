//! Reference offload runtime for the `SYCL_CPU` and `SYCL_GPU` memory spaces.
//!
//! This is a CPU reference implementation of an offload (SYCL-style) runtime:
//! a device table with one host-fallback queue and a configurable number of
//! device-native queues, each owning its own allocation table. Memory lives in
//! host RAM but callers only reach it through [`OffloadRuntime::upload`],
//! [`OffloadRuntime::download`] and [`OffloadRuntime::copy_peer`], which check
//! every device-side range against the owning queue's live allocations.
//!
//! Copies between different queues have no direct path and are host-staged by
//! the memory manager.

use std::ptr::{self, NonNull};

use snafu::OptionExt;

use crate::allocator::AlignedAllocator;
use crate::config::BackendConfig;
use crate::device::{Device, DeviceKind};
use crate::error::{Result, UnsupportedDeviceSnafu};

#[derive(Debug)]
struct Queue {
    device: Device,
    name: String,
    memory: AlignedAllocator,
}

impl Queue {
    fn new(device: Device, name: String, alignment: usize) -> Self {
        Self { device, name, memory: AlignedAllocator::new(alignment) }
    }
}

#[derive(Debug)]
pub struct OffloadRuntime {
    host_fallback: Vec<Queue>,
    device_native: Vec<Queue>,
}

impl OffloadRuntime {
    pub fn new(config: &BackendConfig) -> Self {
        let alignment = config.host_alignment;

        let host_fallback = if config.is_enabled(DeviceKind::SyclCpu) {
            vec![Queue::new(Device::sycl_cpu(0), "reference offload runtime, host-fallback queue".into(), alignment)]
        } else {
            Vec::new()
        };

        let device_native = if config.is_enabled(DeviceKind::SyclGpu) {
            (0..config.sycl_gpu_devices)
                .map(|i| {
                    Queue::new(Device::sycl_gpu(i), format!("reference offload runtime, device-native queue {i}"), alignment)
                })
                .collect()
        } else {
            Vec::new()
        };

        tracing::info!(
            host_fallback = host_fallback.len(),
            device_native = device_native.len(),
            "offload runtime initialized"
        );

        Self { host_fallback, device_native }
    }

    fn queues(&self, kind: DeviceKind) -> &[Queue] {
        match kind {
            DeviceKind::SyclCpu => &self.host_fallback,
            DeviceKind::SyclGpu => &self.device_native,
            DeviceKind::Cpu | DeviceKind::Cuda => &[],
        }
    }

    fn queue(&self, device: Device) -> Result<&Queue> {
        self.queues(device.kind()).get(device.index()).context(UnsupportedDeviceSnafu {
            device,
            reason: "no such offload queue",
        })
    }

    pub fn enumerate(&self, kind: DeviceKind) -> Vec<Device> {
        self.queues(kind).iter().map(|queue| queue.device).collect()
    }

    pub fn contains(&self, device: Device) -> bool {
        self.queue(device).is_ok()
    }

    pub fn describe(&self, device: Device) -> Option<String> {
        self.queue(device).ok().map(|queue| format!("{} ({})", queue.device, queue.name))
    }

    pub fn malloc(&self, device: Device, size: usize) -> Result<NonNull<u8>> {
        self.queue(device)?.memory.alloc(device, size)
    }

    /// # Safety
    ///
    /// `ptr` must not be used after this call.
    pub unsafe fn free(&self, device: Device, ptr: NonNull<u8>) -> Result<()> {
        unsafe { self.queue(device)?.memory.free(device, ptr) }
    }

    pub fn check_range(&self, device: Device, ptr: *const u8, size: usize) -> Result<()> {
        self.queue(device)?.memory.check_range(device, ptr, size)
    }

    /// Host memory into a queue allocation.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads of `size` bytes.
    pub unsafe fn upload(&self, dst: NonNull<u8>, dst_device: Device, src: *const u8, size: usize) -> Result<()> {
        self.check_range(dst_device, dst.as_ptr(), size)?;
        unsafe { ptr::copy_nonoverlapping(src, dst.as_ptr(), size) };
        Ok(())
    }

    /// Queue allocation into host memory.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes of `size` bytes.
    pub unsafe fn download(&self, dst: *mut u8, src: NonNull<u8>, src_device: Device, size: usize) -> Result<()> {
        self.check_range(src_device, src.as_ptr(), size)?;
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), dst, size) };
        Ok(())
    }

    /// Copy within one queue.
    ///
    /// # Safety
    ///
    /// No other access to either range may happen concurrently.
    pub unsafe fn copy_peer(
        &self,
        dst: NonNull<u8>,
        dst_device: Device,
        src: NonNull<u8>,
        src_device: Device,
        size: usize,
    ) -> Result<()> {
        self.check_range(src_device, src.as_ptr(), size)?;
        self.check_range(dst_device, dst.as_ptr(), size)?;
        unsafe { ptr::copy(src.as_ptr(), dst.as_ptr(), size) };
        Ok(())
    }

    /// Only copies inside a single queue are direct.
    pub fn has_peer_path(&self, src: Device, dst: Device) -> bool {
        src == dst
    }
}
