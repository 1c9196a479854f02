//! Process-wide backend registry.
//!
//! Each backend runtime is initialized at most once, on first use, behind its
//! own `OnceCell`. A backend that is not compiled in, disabled by
//! configuration, or fails to initialize resolves to "unavailable": lookups
//! fail with `UnsupportedDevice` and enumeration yields nothing.

use once_cell::sync::{Lazy, OnceCell};

use crate::backend::{Backend, HostBackend};
use crate::config::BackendConfig;
use crate::device::{Device, DeviceKind};
use crate::error::{Result, UnsupportedDeviceSnafu};

#[cfg(feature = "cuda")]
use crate::backend::CudaBackend;
#[cfg(feature = "sycl")]
use crate::backend::OffloadRuntime;

#[derive(Debug)]
pub struct BackendRegistry {
    config: BackendConfig,
    host: OnceCell<HostBackend>,
    #[cfg(feature = "cuda")]
    cuda: OnceCell<Option<CudaBackend>>,
    #[cfg(feature = "sycl")]
    offload: OnceCell<Option<OffloadRuntime>>,
}

impl BackendRegistry {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            host: OnceCell::new(),
            #[cfg(feature = "cuda")]
            cuda: OnceCell::new(),
            #[cfg(feature = "sycl")]
            offload: OnceCell::new(),
        }
    }

    /// Backend serving `kind`, or the reason it is unavailable.
    fn lookup(&self, kind: DeviceKind) -> std::result::Result<Backend<'_>, &'static str> {
        if !self.config.is_enabled(kind) {
            return Err("backend disabled by configuration");
        }

        match kind {
            DeviceKind::Cpu => Ok(Backend::Host(self.host.get_or_init(|| HostBackend::new(self.config.host_alignment)))),
            #[cfg(feature = "cuda")]
            DeviceKind::Cuda => self
                .cuda
                .get_or_init(CudaBackend::load)
                .as_ref()
                .map(Backend::Cuda)
                .ok_or("CUDA backend failed to initialize"),
            #[cfg(not(feature = "cuda"))]
            DeviceKind::Cuda => Err("CUDA backend not compiled in"),
            #[cfg(feature = "sycl")]
            DeviceKind::SyclCpu | DeviceKind::SyclGpu => self
                .offload
                .get_or_init(|| Some(OffloadRuntime::new(&self.config)))
                .as_ref()
                .map(Backend::Offload)
                .ok_or("offload runtime failed to initialize"),
            #[cfg(not(feature = "sycl"))]
            DeviceKind::SyclCpu | DeviceKind::SyclGpu => Err("offload runtime not compiled in"),
        }
    }

    /// Backend for a concrete device. Fails with `UnsupportedDevice` unless the
    /// device is currently enumerable.
    pub fn backend(&self, device: Device) -> Result<Backend<'_>> {
        let backend = match self.lookup(device.kind()) {
            Ok(backend) => backend,
            Err(reason) => return UnsupportedDeviceSnafu { device, reason }.fail(),
        };
        snafu::ensure!(
            backend.contains(device),
            UnsupportedDeviceSnafu { device, reason: format!("index out of range for {} backend", backend.name()) }
        );
        Ok(backend)
    }

    /// Enumerable devices of `kind`, ascending by index. Never fails.
    pub fn available(&self, kind: DeviceKind) -> Vec<Device> {
        self.lookup(kind).map(|backend| backend.enumerate(kind)).unwrap_or_default()
    }

    pub fn describe(&self, device: Device) -> Option<String> {
        self.backend(device).ok()?.describe(device)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

/// Global registry, configured from the environment on first access.
static REGISTRY: Lazy<BackendRegistry> = Lazy::new(|| BackendRegistry::new(BackendConfig::from_env()));

/// Get the global backend registry.
pub fn registry() -> &'static BackendRegistry {
    &REGISTRY
}
