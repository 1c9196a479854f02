use snafu::Snafu;

use crate::device::Device;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Malformed device specifier, unknown kind token, or a buffer address/size
    /// that is detectably wrong for the call.
    #[snafu(display("invalid argument: {reason}"))]
    InvalidArgument { reason: String },

    /// The device's backend is not compiled in, disabled, failed to
    /// initialize, or the index is not currently enumerable.
    #[snafu(display("unsupported device {device}: {reason}"))]
    UnsupportedDevice { device: Device, reason: String },

    /// Backend could not satisfy an allocation request.
    #[snafu(display("out of memory on {device}: failed to allocate {size} bytes"))]
    OutOfMemory { device: Device, size: usize },

    /// Backend-reported copy failure.
    #[snafu(display("transfer {src} -> {dst} failed: {reason}"))]
    DeviceTransfer { src: Device, dst: Device, reason: String },

    #[cfg(feature = "cuda")]
    /// CUDA driver errors outside of a transfer.
    #[snafu(display("CUDA error: {source}"))]
    Cuda { source: cudarc::driver::DriverError },
}
