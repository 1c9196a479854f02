use crate::config::{DEFAULT_HOST_ALIGNMENT, DEFAULT_SYCL_GPU_DEVICES, MAX_SYCL_GPU_DEVICES};
use crate::{BackendConfig, DeviceKind};

#[test]
fn test_defaults() {
    let config = BackendConfig::default();
    assert!(config.disabled.is_empty());
    assert_eq!(config.sycl_gpu_devices, DEFAULT_SYCL_GPU_DEVICES);
    assert_eq!(config.host_alignment, DEFAULT_HOST_ALIGNMENT);
    assert!(DeviceKind::ALL.iter().all(|&kind| config.is_enabled(kind)));
}

#[test]
fn test_from_vars() {
    let config = BackendConfig::from_vars([
        ("TESSERA_DISABLE_BACKENDS", "SYCL_GPU, CUDA"),
        ("TESSERA_SYCL_GPU_DEVICES", "3"),
        ("TESSERA_HOST_ALIGNMENT", "128"),
        ("UNRELATED", "1"),
    ]);

    assert_eq!(config.disabled, vec![DeviceKind::Cuda, DeviceKind::SyclGpu]);
    assert_eq!(config.sycl_gpu_devices, 3);
    assert_eq!(config.host_alignment, 128);
    assert!(config.is_enabled(DeviceKind::SyclCpu));
    assert!(!config.is_enabled(DeviceKind::SyclGpu));
}

#[test]
fn test_cpu_cannot_be_disabled() {
    let config = BackendConfig::from_vars([("TESSERA_DISABLE_BACKENDS", "CPU,SYCL_CPU")]);
    assert_eq!(config.disabled, vec![DeviceKind::SyclCpu]);
    assert!(config.is_enabled(DeviceKind::Cpu));

    let config = BackendConfig::builder().disabled(vec![DeviceKind::Cpu]).build();
    assert!(config.is_enabled(DeviceKind::Cpu));
}

#[test]
fn test_invalid_values_fall_back() {
    let config = BackendConfig::from_vars([
        ("TESSERA_DISABLE_BACKENDS", "bogus,,cuda"),
        ("TESSERA_SYCL_GPU_DEVICES", "many"),
        ("TESSERA_HOST_ALIGNMENT", "48"),
    ]);
    assert!(config.disabled.is_empty());
    assert_eq!(config.sycl_gpu_devices, DEFAULT_SYCL_GPU_DEVICES);
    assert_eq!(config.host_alignment, DEFAULT_HOST_ALIGNMENT);
}

#[test]
fn test_builder_dedups_disabled() {
    let config = BackendConfig::builder()
        .disabled(vec![DeviceKind::SyclGpu, DeviceKind::Cuda, DeviceKind::SyclGpu])
        .sycl_gpu_devices(0)
        .build();
    assert_eq!(config.disabled, vec![DeviceKind::Cuda, DeviceKind::SyclGpu]);
    assert_eq!(config.sycl_gpu_devices, 0);
}

#[test]
fn test_sycl_gpu_devices_are_clamped() {
    let config = BackendConfig::from_vars([("TESSERA_SYCL_GPU_DEVICES", "100000000")]);
    assert_eq!(config.sycl_gpu_devices, MAX_SYCL_GPU_DEVICES);

    let config = BackendConfig::from_vars([("TESSERA_SYCL_GPU_DEVICES", MAX_SYCL_GPU_DEVICES.to_string())]);
    assert_eq!(config.sycl_gpu_devices, MAX_SYCL_GPU_DEVICES);

    let config = BackendConfig::builder().sycl_gpu_devices(usize::MAX).build();
    assert_eq!(config.sycl_gpu_devices, MAX_SYCL_GPU_DEVICES);
}
