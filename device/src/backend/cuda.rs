//! CUDA backend over the `cudarc` driver API.
//!
//! One context per ordinal is created when the backend is first used. A
//! missing driver library, a failed driver call or zero devices makes the
//! backend unavailable rather than an error for callers that only enumerate.

use std::panic;
use std::ptr::NonNull;
use std::sync::Arc;

use cudarc::driver::{CudaContext, DriverError, result, sys::CUdeviceptr, sys::CUresult};
use snafu::{OptionExt, ResultExt};

use crate::allocator::AllocationTable;
use crate::device::Device;
use crate::error::{CudaSnafu, DeviceTransferSnafu, InvalidArgumentSnafu, OutOfMemorySnafu, Result, UnsupportedDeviceSnafu};

#[derive(Debug)]
struct CudaDevice {
    device: Device,
    context: Arc<CudaContext>,
    name: String,
    allocations: AllocationTable,
}

#[derive(Debug)]
pub struct CudaBackend {
    devices: Vec<CudaDevice>,
}

impl CudaBackend {
    pub fn new() -> Result<Self> {
        result::init().context(CudaSnafu)?;
        let count = result::device::get_count().context(CudaSnafu)?;

        let devices = (0..count.max(0) as usize)
            .map(|ordinal| {
                let context = CudaContext::new(ordinal).context(CudaSnafu)?;
                let name = context.name().unwrap_or_else(|_| "unknown CUDA device".into());
                Ok(CudaDevice { device: Device::cuda(ordinal), context, name, allocations: AllocationTable::new() })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(devices = devices.len(), "CUDA backend initialized");
        Ok(Self { devices })
    }

    /// Initialize the backend, or `None` if the driver is unusable.
    ///
    /// `cudarc` loads `libcuda` lazily and panics when the library is missing,
    /// so the panic is contained here and reported like any other init failure.
    pub fn load() -> Option<Self> {
        match panic::catch_unwind(Self::new) {
            Ok(Ok(backend)) => Some(backend),
            Ok(Err(error)) => {
                tracing::warn!(%error, "CUDA backend unavailable");
                None
            }
            Err(_) => {
                tracing::warn!("CUDA driver library could not be loaded, CUDA backend unavailable");
                None
            }
        }
    }

    fn get(&self, device: Device) -> Result<&CudaDevice> {
        self.devices.get(device.index()).context(UnsupportedDeviceSnafu { device, reason: "no such CUDA ordinal" })
    }

    /// Bind the device's context to the calling thread.
    fn bind(&self, device: Device) -> Result<&CudaDevice> {
        let cuda = self.get(device)?;
        cuda.context.bind_to_thread().context(CudaSnafu)?;
        Ok(cuda)
    }

    pub fn enumerate(&self) -> Vec<Device> {
        self.devices.iter().map(|cuda| cuda.device).collect()
    }

    pub fn contains(&self, device: Device) -> bool {
        self.get(device).is_ok()
    }

    pub fn describe(&self, device: Device) -> Option<String> {
        self.get(device).ok().map(|cuda| format!("{} ({})", cuda.device, cuda.name))
    }

    pub fn malloc(&self, device: Device, size: usize) -> Result<NonNull<u8>> {
        let cuda = self.bind(device)?;
        // SAFETY: the context is bound; the allocation is tracked and freed through `free`.
        let dptr = match unsafe { result::malloc_sync(size.max(1)) } {
            Ok(dptr) => dptr,
            Err(DriverError(CUresult::CUDA_ERROR_OUT_OF_MEMORY)) => return OutOfMemorySnafu { device, size }.fail(),
            Err(source) => return Err(source).context(CudaSnafu),
        };
        let ptr = NonNull::new(dptr as usize as *mut u8).context(OutOfMemorySnafu { device, size })?;
        cuda.allocations.insert(dptr as usize, size);
        Ok(ptr)
    }

    /// # Safety
    ///
    /// `ptr` must not be used after this call.
    pub unsafe fn free(&self, device: Device, ptr: NonNull<u8>) -> Result<()> {
        let cuda = self.bind(device)?;
        let addr = ptr.as_ptr() as usize;
        cuda.allocations.size_of(addr).with_context(|| InvalidArgumentSnafu {
            reason: format!("{addr:#x} is not a live allocation on {device}"),
        })?;
        // Forget the entry only once the driver has released the memory.
        unsafe { result::free_sync(addr as CUdeviceptr) }.context(CudaSnafu)?;
        cuda.allocations.remove(addr);
        Ok(())
    }

    pub fn check_range(&self, device: Device, ptr: *const u8, size: usize) -> Result<()> {
        let addr = ptr as usize;
        snafu::ensure!(
            self.get(device)?.allocations.contains_range(addr, size),
            InvalidArgumentSnafu { reason: format!("range {addr:#x}+{size} is outside any allocation on {device}") }
        );
        Ok(())
    }

    /// # Safety
    ///
    /// `src` must be valid for reads of `size` bytes.
    pub unsafe fn upload(&self, dst: NonNull<u8>, dst_device: Device, src: *const u8, size: usize) -> Result<()> {
        self.check_range(dst_device, dst.as_ptr(), size)?;
        self.bind(dst_device)?;
        let host = unsafe { std::slice::from_raw_parts(src, size) };
        unsafe { result::memcpy_htod_sync(dst.as_ptr() as usize as CUdeviceptr, host) }
            .map_err(|e| transfer_error(Device::cpu(), dst_device, e))
    }

    /// # Safety
    ///
    /// `dst` must be valid for writes of `size` bytes.
    pub unsafe fn download(&self, dst: *mut u8, src: NonNull<u8>, src_device: Device, size: usize) -> Result<()> {
        self.check_range(src_device, src.as_ptr(), size)?;
        self.bind(src_device)?;
        let host = unsafe { std::slice::from_raw_parts_mut(dst, size) };
        unsafe { result::memcpy_dtoh_sync(host, src.as_ptr() as usize as CUdeviceptr) }
            .map_err(|e| transfer_error(src_device, Device::cpu(), e))
    }

    /// Device-to-device copy on a single ordinal.
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
        self.bind(dst_device)?;
        unsafe {
            result::memcpy_dtod_sync(dst.as_ptr() as usize as CUdeviceptr, src.as_ptr() as usize as CUdeviceptr, size)
        }
        .map_err(|e| transfer_error(src_device, dst_device, e))
    }

    // TODO: enable cuMemcpyPeer between ordinals once peer access is negotiated per pair.
    pub fn has_peer_path(&self, src: Device, dst: Device) -> bool {
        src.index() == dst.index()
    }
}

fn transfer_error(src: Device, dst: Device, error: DriverError) -> crate::error::Error {
    DeviceTransferSnafu { src, dst, reason: error.to_string() }.build()
}
