use crate::backend::Backend;
use crate::config::MAX_SYCL_GPU_DEVICES;
use crate::{BackendConfig, BackendRegistry, Device, DeviceKind, Error};

#[test]
fn test_registry_cpu() {
    let backend = crate::registry().backend(Device::cpu()).unwrap();
    assert_eq!(backend.name(), "host");
    assert!(matches!(backend, Backend::Host(_)));
}

#[test]
fn test_global_registry_is_shared() {
    assert!(std::ptr::eq(crate::registry(), crate::registry()));
}

#[cfg(not(feature = "cuda"))]
#[test]
fn test_cuda_not_compiled_in() {
    let registry = BackendRegistry::default();
    assert!(matches!(registry.backend(Device::cuda(0)), Err(Error::UnsupportedDevice { .. })));
    assert!(registry.available(DeviceKind::Cuda).is_empty());
}

#[cfg(feature = "sycl")]
#[test]
fn test_disabled_backend_is_unavailable() {
    let registry = BackendRegistry::new(BackendConfig::builder().disabled(vec![DeviceKind::SyclGpu]).build());

    assert!(registry.available(DeviceKind::SyclGpu).is_empty());
    assert_eq!(registry.available(DeviceKind::SyclCpu), vec![Device::sycl_cpu(0)]);
    assert_eq!(registry.available(DeviceKind::Cpu), vec![Device::cpu()]);
    assert!(registry.describe(Device::sycl_gpu(0)).is_none());

    match registry.backend(Device::sycl_gpu(0)) {
        Err(Error::UnsupportedDevice { device, .. }) => assert_eq!(device, Device::sycl_gpu(0)),
        other => panic!("expected UnsupportedDevice, got {other:?}"),
    }
}

#[cfg(feature = "sycl")]
#[test]
fn test_sycl_gpu_count_follows_config() {
    let registry = BackendRegistry::new(BackendConfig::builder().sycl_gpu_devices(3).build());
    assert_eq!(
        registry.available(DeviceKind::SyclGpu),
        vec![Device::sycl_gpu(0), Device::sycl_gpu(1), Device::sycl_gpu(2)]
    );
    assert!(registry.backend(Device::sycl_gpu(2)).is_ok());
    assert!(matches!(registry.backend(Device::sycl_gpu(3)), Err(Error::UnsupportedDevice { .. })));
}

#[cfg(feature = "sycl")]
#[test]
fn test_oversized_sycl_gpu_count_is_clamped() {
    let registry = BackendRegistry::new(BackendConfig::from_vars([("TESSERA_SYCL_GPU_DEVICES", "100000000")]));
    let devices = registry.available(DeviceKind::SyclGpu);
    assert_eq!(devices.len(), MAX_SYCL_GPU_DEVICES);
    assert_eq!(devices.last(), Some(&Device::sycl_gpu(MAX_SYCL_GPU_DEVICES - 1)));
    assert!(matches!(
        registry.backend(Device::sycl_gpu(MAX_SYCL_GPU_DEVICES)),
        Err(Error::UnsupportedDevice { .. })
    ));
}

/// Without a usable driver the CUDA backend resolves to "unavailable" on
/// every call, not only the first one.
#[cfg(feature = "cuda")]
#[test]
fn test_cuda_enumeration_without_driver_does_not_panic() {
    let registry = BackendRegistry::default();
    let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| registry.available(DeviceKind::Cuda)));
    assert!(first.is_ok(), "CUDA enumeration panicked");
    let first = first.unwrap();
    assert_eq!(registry.available(DeviceKind::Cuda), first);

    if first.is_empty() {
        assert!(registry.describe(Device::cuda(0)).is_none());
        assert!(matches!(registry.backend(Device::cuda(0)), Err(Error::UnsupportedDevice { .. })));
    } else {
        assert!(registry.backend(Device::cuda(0)).is_ok());
    }

    assert_eq!(Device::cuda(0).is_available(), !Device::available_cuda().is_empty());
    Device::print_available();
}

#[test]
fn test_enumeration_never_fails_when_everything_is_disabled() {
    let registry = BackendRegistry::new(
        BackendConfig::builder().disabled(vec![DeviceKind::Cuda, DeviceKind::SyclCpu, DeviceKind::SyclGpu]).build(),
    );
    for &kind in DeviceKind::ALL {
        let expected = if kind == DeviceKind::Cpu { vec![Device::cpu()] } else { Vec::new() };
        assert_eq!(registry.available(kind), expected);
    }
}

#[test]
fn test_concurrent_first_use() {
    let registry = BackendRegistry::default();
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for &kind in DeviceKind::ALL {
                    let _ = registry.available(kind);
                }
                assert!(registry.backend(Device::cpu()).is_ok());
            });
        }
    });
}
