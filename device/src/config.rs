//! Backend configuration.
//!
//! Built explicitly with a bon builder, or read from environment variables.
//! The global registry reads the environment exactly once, on first use.

use bon::bon;

use crate::device::DeviceKind;

/// Default alignment of host and offload allocations, in bytes.
pub const DEFAULT_HOST_ALIGNMENT: usize = 64;

/// Default number of device-native offload devices exposed by the reference runtime.
pub const DEFAULT_SYCL_GPU_DEVICES: usize = 1;

/// Upper bound on device-native offload devices; larger requests are clamped.
pub const MAX_SYCL_GPU_DEVICES: usize = 64;

/// Which backends are visible and how they are shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Kinds treated as not present. Never contains [`DeviceKind::Cpu`].
    pub disabled: Vec<DeviceKind>,
    /// Device-native offload devices exposed by the reference offload runtime,
    /// at most [`MAX_SYCL_GPU_DEVICES`].
    pub sycl_gpu_devices: usize,
    /// Alignment of host-memory allocations (power of two).
    pub host_alignment: usize,
}

#[bon]
impl BackendConfig {
    #[builder]
    pub fn new(
        #[builder(default)] disabled: Vec<DeviceKind>,
        #[builder(default = DEFAULT_SYCL_GPU_DEVICES)] sycl_gpu_devices: usize,
        #[builder(default = DEFAULT_HOST_ALIGNMENT)] host_alignment: usize,
    ) -> Self {
        let mut disabled: Vec<DeviceKind> = disabled.into_iter().filter(|kind| *kind != DeviceKind::Cpu).collect();
        disabled.sort();
        disabled.dedup();

        let host_alignment = if host_alignment.is_power_of_two() {
            host_alignment
        } else {
            tracing::warn!(host_alignment, "host alignment is not a power of two, using default");
            DEFAULT_HOST_ALIGNMENT
        };

        if sycl_gpu_devices > MAX_SYCL_GPU_DEVICES {
            tracing::warn!(sycl_gpu_devices, max = MAX_SYCL_GPU_DEVICES, "too many device-native offload devices, clamping");
        }
        let sycl_gpu_devices = sycl_gpu_devices.min(MAX_SYCL_GPU_DEVICES);

        Self { disabled, sycl_gpu_devices, host_alignment }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `TESSERA_DISABLE_BACKENDS` - Comma-separated kind tokens to hide (e.g. `CUDA,SYCL_GPU`)
    /// * `TESSERA_SYCL_GPU_DEVICES` - Device-native offload devices (default: 1, at most 64)
    /// * `TESSERA_HOST_ALIGNMENT` - Host allocation alignment in bytes (default: 64)
    pub fn from_env() -> Self {
        let vars = std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        Self::from_vars(vars)
    }

    /// Same as [`BackendConfig::from_env`], reading from an arbitrary key/value source.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut disabled = Vec::new();
        let mut sycl_gpu_devices = DEFAULT_SYCL_GPU_DEVICES;
        let mut host_alignment = DEFAULT_HOST_ALIGNMENT;

        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "TESSERA_DISABLE_BACKENDS" => disabled = parse_kind_list(value),
                "TESSERA_SYCL_GPU_DEVICES" => {
                    if let Ok(count) = value.parse() {
                        sycl_gpu_devices = count;
                    } else {
                        tracing::warn!(value, "ignoring invalid TESSERA_SYCL_GPU_DEVICES");
                    }
                }
                "TESSERA_HOST_ALIGNMENT" => {
                    if let Ok(alignment) = value.parse() {
                        host_alignment = alignment;
                    } else {
                        tracing::warn!(value, "ignoring invalid TESSERA_HOST_ALIGNMENT");
                    }
                }
                _ => {}
            }
        }

        Self::builder().disabled(disabled).sycl_gpu_devices(sycl_gpu_devices).host_alignment(host_alignment).build()
    }

    /// Whether a kind is allowed by configuration. The host is always enabled.
    pub fn is_enabled(&self, kind: DeviceKind) -> bool {
        !self.disabled.contains(&kind)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn parse_kind_list(value: &str) -> Vec<DeviceKind> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match DeviceKind::parse(token) {
            Ok(DeviceKind::Cpu) => {
                tracing::warn!("the CPU backend cannot be disabled");
                None
            }
            Ok(kind) => Some(kind),
            Err(error) => {
                tracing::warn!(%error, "ignoring entry in TESSERA_DISABLE_BACKENDS");
                None
            }
        })
        .collect()
}
