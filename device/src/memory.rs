//! Allocation, release and cross-device copies of raw byte buffers.
//!
//! [`MemoryManager`] holds no state of its own: every call names its devices
//! explicitly and the caller owns every buffer it allocates. Copies pick the
//! most direct path available for the `(src, dst)` pair:
//!
//! | src \ dst | host          | accelerator                      |
//! |-----------|---------------|----------------------------------|
//! | host      | `HostToHost`  | `Upload`                         |
//! | accel.    | `Download`    | `Peer` if the backend has one, otherwise `HostStaged` |
//!
//! A host-staged copy downloads into a scratch host buffer and uploads from it.

use std::ptr::NonNull;

use snafu::OptionExt;

use crate::backend::Backend;
use crate::device::Device;
use crate::error::{InvalidArgumentSnafu, OutOfMemorySnafu, Result};
use crate::registry::{BackendRegistry, registry};

/// Path taken by a copy between two devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferRoute {
    HostToHost,
    /// Host source, accelerator destination.
    Upload,
    /// Accelerator source, host destination.
    Download,
    /// Direct copy inside one backend.
    Peer,
    /// Two hops through a scratch host buffer.
    HostStaged,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryManager<'r> {
    registry: &'r BackendRegistry,
}

impl MemoryManager<'static> {
    /// Manager over the global registry.
    pub fn global() -> Self {
        Self { registry: registry() }
    }
}

impl Default for MemoryManager<'static> {
    fn default() -> Self {
        Self::global()
    }
}

impl<'r> MemoryManager<'r> {
    pub fn with_registry(registry: &'r BackendRegistry) -> Self {
        Self { registry }
    }

    /// Allocate `size` bytes on `device`.
    ///
    /// A zero-byte request returns a unique non-null address that must still
    /// be passed to [`MemoryManager::free`] and is never dereferenced.
    pub fn malloc(&self, size: usize, device: Device) -> Result<NonNull<u8>> {
        let backend = self.registry.backend(device)?;
        let ptr = backend.malloc(device, size)?;
        tracing::debug!(device = %device, size, ptr = ?ptr, "allocated");
        Ok(ptr)
    }

    /// Release a buffer returned by [`MemoryManager::malloc`] on the same device.
    ///
    /// Fails with `InvalidArgument` if `ptr` is not a live allocation of `device`.
    ///
    /// # Safety
    ///
    /// `ptr` must not be used after this call.
    pub unsafe fn free(&self, ptr: NonNull<u8>, device: Device) -> Result<()> {
        let backend = self.registry.backend(device)?;
        unsafe { backend.free(device, ptr)? };
        tracing::debug!(device = %device, ptr = ?ptr, "freed");
        Ok(())
    }

    /// Route a copy from `src` to `dst` would take.
    pub fn route(&self, src: Device, dst: Device) -> Result<TransferRoute> {
        let (route, ..) = self.plan(src, dst)?;
        Ok(route)
    }

    #[allow(unreachable_patterns)]
    fn plan(&self, src: Device, dst: Device) -> Result<(TransferRoute, Backend<'r>, Backend<'r>)> {
        let src_backend = self.registry.backend(src)?;
        let dst_backend = self.registry.backend(dst)?;

        let route = match (src_backend, dst_backend) {
            (Backend::Host(_), Backend::Host(_)) => TransferRoute::HostToHost,
            (Backend::Host(_), _) => TransferRoute::Upload,
            (_, Backend::Host(_)) => TransferRoute::Download,
            #[cfg(feature = "cuda")]
            (Backend::Cuda(_), Backend::Cuda(_)) if src_backend.has_peer_path(src, dst) => TransferRoute::Peer,
            #[cfg(feature = "sycl")]
            (Backend::Offload(_), Backend::Offload(_)) if src_backend.has_peer_path(src, dst) => TransferRoute::Peer,
            _ => TransferRoute::HostStaged,
        };

        tracing::trace!(src = %src, dst = %dst, ?route, "transfer route");
        Ok((route, src_backend, dst_backend))
    }

    /// Copy `size` bytes from `src` on `src_device` to `dst` on `dst_device`.
    ///
    /// A zero-byte copy succeeds without touching memory. Copying a buffer onto
    /// itself leaves it unchanged. Overlapping, non-identical ranges on the same
    /// device fail with `InvalidArgument`.
    ///
    /// # Safety
    ///
    /// Host-side ranges must be valid for `size` bytes. Device-side ranges are
    /// checked against the backend's live allocations.
    pub unsafe fn memcpy(
        &self,
        dst: NonNull<u8>,
        dst_device: Device,
        src: NonNull<u8>,
        src_device: Device,
        size: usize,
    ) -> Result<()> {
        let (route, src_backend, dst_backend) = self.plan(src_device, dst_device)?;

        if size == 0 {
            return Ok(());
        }

        if src_device == dst_device {
            if src == dst {
                src_backend.check_range(src_device, src.as_ptr(), size)?;
                tracing::trace!(device = %src_device, size, "self copy");
                return Ok(());
            }
            let (s, d) = (src.as_ptr() as usize, dst.as_ptr() as usize);
            snafu::ensure!(
                s.abs_diff(d) >= size,
                InvalidArgumentSnafu { reason: format!("overlapping ranges {s:#x} and {d:#x} of {size} bytes on {src_device}") }
            );
        }

        match route {
            TransferRoute::HostToHost | TransferRoute::Peer => unsafe {
                src_backend.copy_peer(dst, dst_device, src, src_device, size)?
            },
            TransferRoute::Upload => unsafe { dst_backend.upload(dst, dst_device, src.as_ptr(), size)? },
            TransferRoute::Download => unsafe { src_backend.download(dst.as_ptr(), src, src_device, size)? },
            TransferRoute::HostStaged => {
                src_backend.check_range(src_device, src.as_ptr(), size)?;
                dst_backend.check_range(dst_device, dst.as_ptr(), size)?;
                let mut scratch = Vec::new();
                scratch.try_reserve_exact(size).ok().context(OutOfMemorySnafu { device: Device::cpu(), size })?;
                scratch.resize(size, 0u8);
                unsafe {
                    src_backend.download(scratch.as_mut_ptr(), src, src_device, size)?;
                    dst_backend.upload(dst, dst_device, scratch.as_ptr(), size)?;
                }
            }
        }

        tracing::debug!(src = %src_device, dst = %dst_device, size, ?route, "copied");
        Ok(())
    }

    /// Copy a host slice into `dst` on `dst_device`.
    ///
    /// # Safety
    ///
    /// Same contract as [`MemoryManager::memcpy`] for the destination.
    pub unsafe fn memcpy_from_host(&self, dst: NonNull<u8>, dst_device: Device, src: &[u8]) -> Result<()> {
        let src_ptr = NonNull::from(src).cast::<u8>();
        unsafe { self.memcpy(dst, dst_device, src_ptr, Device::cpu(), src.len()) }
    }

    /// Copy `dst.len()` bytes from `src` on `src_device` into a host slice.
    ///
    /// # Safety
    ///
    /// Same contract as [`MemoryManager::memcpy`] for the source.
    pub unsafe fn memcpy_to_host(&self, dst: &mut [u8], src: NonNull<u8>, src_device: Device) -> Result<()> {
        let size = dst.len();
        let dst_ptr = NonNull::from(dst).cast::<u8>();
        unsafe { self.memcpy(dst_ptr, Device::cpu(), src, src_device, size) }
    }
}
