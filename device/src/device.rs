//! Device identity: a device kind plus an index within that kind.
//!
//! [`Device`] is a small `Copy` value used as the address of every memory
//! operation. Its canonical string form `"<KIND>:<index>"` (e.g. `"CUDA:0"`)
//! is what it prints as, parses from, and hashes by.
//!
//! Construction never checks that a device actually exists. Availability is
//! resolved lazily by the backend registry when the device is used, or
//! explicitly through [`Device::is_available`] and the `available_*` queries.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use strum::VariantArray;

use crate::error::{InvalidArgumentSnafu, Result};
use crate::registry::registry;

/// Category of compute/memory backend.
///
/// Declaration order defines the ordering of [`Device`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::VariantArray)]
pub enum DeviceKind {
    /// Host memory. There is exactly one host device.
    Cpu,
    /// Discrete accelerator memory (CUDA).
    Cuda,
    /// Offload accelerator, host-fallback flavor.
    SyclCpu,
    /// Offload accelerator, device-native flavor.
    SyclGpu,
}

impl DeviceKind {
    /// All kinds in ascending order.
    pub const ALL: &'static [DeviceKind] = Self::VARIANTS;

    /// Token used in the canonical string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Cuda => "CUDA",
            Self::SyclCpu => "SYCL_CPU",
            Self::SyclGpu => "SYCL_GPU",
        }
    }

    /// Parse a kind token. Matching is case-sensitive.
    pub fn parse(token: &str) -> Result<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == token).ok_or_else(|| {
            InvalidArgumentSnafu { reason: format!("unrecognized device kind {token:?}") }.build()
        })
    }

    pub const fn is_sycl(&self) -> bool {
        matches!(self, Self::SyclCpu | Self::SyclGpu)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Device identifier: kind and index within that kind.
///
/// For [`DeviceKind::Cpu`] the index is always `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Device {
    kind: DeviceKind,
    index: usize,
}

impl Default for Device {
    fn default() -> Self {
        Self::cpu()
    }
}

impl Device {
    /// Create a device from kind and index. Host devices are normalized to index `0`.
    pub const fn new(kind: DeviceKind, index: usize) -> Self {
        let index = match kind {
            DeviceKind::Cpu => 0,
            _ => index,
        };
        Self { kind, index }
    }

    /// Create a device from a kind token (e.g. `"CUDA"`) and an index.
    pub fn from_kind_str(kind: &str, index: usize) -> Result<Self> {
        Ok(Self::new(DeviceKind::parse(kind)?, index))
    }

    /// Parse a specifier of the exact form `"<KIND>:<index>"`.
    ///
    /// - `"CPU:0"` -> host
    /// - `"CUDA:1"` -> second CUDA device
    /// - `"CUDA:01"` -> same as `"CUDA:1"`
    ///
    /// Kind tokens are case-sensitive; the index must be a non-empty run of
    /// ASCII digits with no sign or whitespace.
    pub fn parse(spec: &str) -> Result<Self> {
        let Some((kind, index)) = spec.split_once(':') else {
            return InvalidArgumentSnafu {
                reason: format!("device specifier {spec:?} must have the form \"<KIND>:<index>\""),
            }
            .fail();
        };

        let kind = DeviceKind::parse(kind)?;
        let index = parse_index(index).ok_or_else(|| {
            InvalidArgumentSnafu {
                reason: format!("device specifier {spec:?} has an invalid index {index:?}"),
            }
            .build()
        })?;

        Ok(Self::new(kind, index))
    }

    pub const fn cpu() -> Self {
        Self::new(DeviceKind::Cpu, 0)
    }

    pub const fn cuda(index: usize) -> Self {
        Self::new(DeviceKind::Cuda, index)
    }

    pub const fn sycl_cpu(index: usize) -> Self {
        Self::new(DeviceKind::SyclCpu, index)
    }

    pub const fn sycl_gpu(index: usize) -> Self {
        Self::new(DeviceKind::SyclGpu, index)
    }

    pub const fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn is_cpu(&self) -> bool {
        matches!(self.kind, DeviceKind::Cpu)
    }

    pub const fn is_cuda(&self) -> bool {
        matches!(self.kind, DeviceKind::Cuda)
    }

    /// True for both offload flavors.
    pub const fn is_sycl(&self) -> bool {
        self.kind.is_sycl()
    }

    pub const fn is_sycl_cpu(&self) -> bool {
        matches!(self.kind, DeviceKind::SyclCpu)
    }

    pub const fn is_sycl_gpu(&self) -> bool {
        matches!(self.kind, DeviceKind::SyclGpu)
    }

    /// Canonical `"<KIND>:<index>"` form. Round-trips through [`Device::parse`].
    pub fn canonicalize(&self) -> String {
        self.to_string()
    }

    /// Human-readable description, including backend-provided details when the
    /// device is currently available. Not suitable as a key.
    pub fn description(&self) -> String {
        registry().describe(*self).unwrap_or_else(|| format!("{self} (unavailable)"))
    }

    /// Whether this exact device is currently enumerable. Never fails.
    pub fn is_available(&self) -> bool {
        registry().available(self.kind).contains(self)
    }

    /// Every enumerable device, ascending by `(kind, index)`.
    pub fn available() -> Vec<Device> {
        DeviceKind::ALL.iter().flat_map(|&kind| registry().available(kind)).collect()
    }

    /// Always exactly `[CPU:0]`.
    pub fn available_cpu() -> Vec<Device> {
        registry().available(DeviceKind::Cpu)
    }

    pub fn available_cuda() -> Vec<Device> {
        registry().available(DeviceKind::Cuda)
    }

    /// Devices of both offload flavors, host-fallback first.
    pub fn available_sycl() -> Vec<Device> {
        let mut devices = Self::available_sycl_cpu();
        devices.extend(Self::available_sycl_gpu());
        devices
    }

    pub fn available_sycl_cpu() -> Vec<Device> {
        registry().available(DeviceKind::SyclCpu)
    }

    pub fn available_sycl_gpu() -> Vec<Device> {
        registry().available(DeviceKind::SyclGpu)
    }

    /// One description line per enumerable device.
    pub fn describe_available() -> Vec<String> {
        Self::available().iter().map(Device::description).collect()
    }

    /// Print every enumerable device to stdout.
    pub fn print_available() {
        for line in Self::describe_available() {
            println!("{line}");
        }
    }
}

fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.index)
    }
}

impl FromStr for Device {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Hashes the canonical string so that the hash agrees with the serialized key.
impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonicalize().hash(state);
    }
}

impl From<DeviceKind> for Device {
    fn from(kind: DeviceKind) -> Self {
        Self::new(kind, 0)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Device {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Device {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let spec = String::deserialize(deserializer)?;
        Self::parse(&spec).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for DeviceKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for DeviceKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Self::parse(&token).map_err(serde::de::Error::custom)
    }
}
