//! Device identity and cross-device memory transfer.
//!
//! - [`Device`] names a device by kind and index (`"CPU:0"`, `"CUDA:1"`,
//!   `"SYCL_GPU:0"`) and answers availability and enumeration queries.
//! - [`MemoryManager`] allocates, frees and copies raw byte buffers between
//!   any two devices, staging through host memory when no direct path exists.
//!
//! Backends are selected by cargo features (`cuda`, `sycl`) and initialized
//! lazily, once, on first use. See [`BackendConfig`] for runtime configuration.
//!
//! ```
//! use tessera_device::{Device, MemoryManager};
//!
//! let device: Device = "CPU:0".parse().unwrap();
//! let mm = MemoryManager::global();
//! let ptr = mm.malloc(16, device).unwrap();
//! unsafe { mm.free(ptr, device).unwrap() };
//! ```

pub mod allocator;
pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod memory;
pub mod registry;

#[cfg(test)]
pub mod test;

pub use config::BackendConfig;
pub use device::{Device, DeviceKind};
pub use error::{Error, Result};
pub use memory::{MemoryManager, TransferRoute};
pub use registry::{BackendRegistry, registry};
