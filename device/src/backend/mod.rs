//! Closed dispatch over the memory backends compiled into this build.
//!
//! Each [`Backend`] variant borrows a lazily initialized backend owned by the
//! [`BackendRegistry`](crate::registry::BackendRegistry). The set of variants
//! is fixed at compile time by cargo features:
//! - `Host`: always present
//! - `Cuda`: feature `cuda`
//! - `Offload`: feature `sycl`, serving both `SYCL_CPU` and `SYCL_GPU`

use std::ptr::NonNull;

use crate::device::{Device, DeviceKind};
use crate::error::Result;

#[cfg(feature = "cuda")]
pub mod cuda;
pub mod host;
#[cfg(feature = "sycl")]
pub mod offload;

#[cfg(feature = "cuda")]
pub use cuda::CudaBackend;
pub use host::HostBackend;
#[cfg(feature = "sycl")]
pub use offload::OffloadRuntime;

#[derive(Debug, Clone, Copy)]
pub enum Backend<'a> {
    Host(&'a HostBackend),
    #[cfg(feature = "cuda")]
    Cuda(&'a CudaBackend),
    #[cfg(feature = "sycl")]
    Offload(&'a OffloadRuntime),
}

impl Backend<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Host(_) => "host",
            #[cfg(feature = "cuda")]
            Backend::Cuda(_) => "cuda",
            #[cfg(feature = "sycl")]
            Backend::Offload(_) => "offload",
        }
    }

    /// Devices of `kind` served by this backend, ascending by index.
    pub fn enumerate(&self, kind: DeviceKind) -> Vec<Device> {
        match self {
            Backend::Host(host) if kind == DeviceKind::Cpu => host.enumerate(),
            Backend::Host(_) => Vec::new(),
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) if kind == DeviceKind::Cuda => cuda.enumerate(),
            #[cfg(feature = "cuda")]
            Backend::Cuda(_) => Vec::new(),
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => runtime.enumerate(kind),
        }
    }

    pub fn contains(&self, device: Device) -> bool {
        match self {
            Backend::Host(_) => device.is_cpu(),
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => cuda.contains(device),
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => runtime.contains(device),
        }
    }

    pub fn describe(&self, device: Device) -> Option<String> {
        match self {
            Backend::Host(host) => Some(host.describe()),
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => cuda.describe(device),
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => runtime.describe(device),
        }
    }

    pub fn malloc(&self, device: Device, size: usize) -> Result<NonNull<u8>> {
        match self {
            Backend::Host(host) => host.malloc(size),
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => cuda.malloc(device, size),
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => runtime.malloc(device, size),
        }
    }

    /// # Safety
    ///
    /// `ptr` must not be used after this call.
    pub unsafe fn free(&self, device: Device, ptr: NonNull<u8>) -> Result<()> {
        match self {
            Backend::Host(host) => unsafe { host.free(ptr) },
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => unsafe { cuda.free(device, ptr) },
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => unsafe { runtime.free(device, ptr) },
        }
    }

    /// Validate a device-side range. Host ranges are trusted.
    pub fn check_range(&self, device: Device, ptr: *const u8, size: usize) -> Result<()> {
        match self {
            Backend::Host(_) => Ok(()),
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => cuda.check_range(device, ptr, size),
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => runtime.check_range(device, ptr, size),
        }
    }

    /// Host memory into memory of `dst_device`.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads of `size` bytes; `dst` must be valid for
    /// writes of `size` bytes on `dst_device`.
    pub unsafe fn upload(&self, dst: NonNull<u8>, dst_device: Device, src: *const u8, size: usize) -> Result<()> {
        match self {
            Backend::Host(host) => {
                unsafe { host.copy(dst.as_ptr(), src, size) };
                Ok(())
            }
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => unsafe { cuda.upload(dst, dst_device, src, size) },
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => unsafe { runtime.upload(dst, dst_device, src, size) },
        }
    }

    /// Memory of `src_device` into host memory.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes of `size` bytes; `src` must be valid for
    /// reads of `size` bytes on `src_device`.
    pub unsafe fn download(&self, dst: *mut u8, src: NonNull<u8>, src_device: Device, size: usize) -> Result<()> {
        match self {
            Backend::Host(host) => {
                unsafe { host.copy(dst, src.as_ptr(), size) };
                Ok(())
            }
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => unsafe { cuda.download(dst, src, src_device, size) },
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => unsafe { runtime.download(dst, src, src_device, size) },
        }
    }

    /// Direct copy between two devices of this backend. Only valid when
    /// [`Backend::has_peer_path`] holds for the pair.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid for `size` bytes on their devices.
    pub unsafe fn copy_peer(
        &self,
        dst: NonNull<u8>,
        dst_device: Device,
        src: NonNull<u8>,
        src_device: Device,
        size: usize,
    ) -> Result<()> {
        match self {
            Backend::Host(host) => {
                unsafe { host.copy(dst.as_ptr(), src.as_ptr(), size) };
                Ok(())
            }
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => unsafe { cuda.copy_peer(dst, dst_device, src, src_device, size) },
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => unsafe { runtime.copy_peer(dst, dst_device, src, src_device, size) },
        }
    }

    /// Whether `src -> dst` has a direct path inside this backend.
    pub fn has_peer_path(&self, src: Device, dst: Device) -> bool {
        match self {
            Backend::Host(_) => src.is_cpu() && dst.is_cpu(),
            #[cfg(feature = "cuda")]
            Backend::Cuda(cuda) => src.is_cuda() && dst.is_cuda() && cuda.has_peer_path(src, dst),
            #[cfg(feature = "sycl")]
            Backend::Offload(runtime) => src.is_sycl() && dst.is_sycl() && runtime.has_peer_path(src, dst),
        }
    }
}
