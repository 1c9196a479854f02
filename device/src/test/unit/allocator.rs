use crate::allocator::{AlignedAllocator, AllocationTable};
use crate::{Device, Error};

#[test]
fn test_table_ranges() {
    let table = AllocationTable::new();
    table.insert(0x1000, 64);
    table.insert(0x2000, 0);

    assert!(table.contains_range(0x1000, 64));
    assert!(table.contains_range(0x1010, 16));
    assert!(!table.contains_range(0x1010, 64));
    assert!(!table.contains_range(0x0fff, 2));
    assert!(table.contains_range(0x2000, 0));
    assert!(!table.contains_range(0x2000, 1));
    assert!(!table.contains_range(usize::MAX, 2));

    assert_eq!(table.len(), 2);
    assert_eq!(table.total_bytes(), 64);
    assert_eq!(table.size_of(0x1000), Some(64));
    assert_eq!(table.remove(0x1000), Some(64));
    assert_eq!(table.remove(0x1000), None);
    assert!(!table.contains_range(0x1010, 16));
}

#[test]
fn test_aligned_alloc_and_free() {
    let allocator = AlignedAllocator::new(128);
    let device = Device::cpu();

    let ptr = allocator.alloc(device, 100).unwrap();
    assert_eq!(ptr.as_ptr() as usize % 128, 0);
    assert_eq!(allocator.table().size_of(ptr.as_ptr() as usize), Some(100));
    allocator.check_range(device, ptr.as_ptr(), 100).unwrap();
    assert!(matches!(allocator.check_range(device, ptr.as_ptr(), 101), Err(Error::InvalidArgument { .. })));

    unsafe { allocator.free(device, ptr).unwrap() };
    assert!(allocator.table().is_empty());
}

#[test]
fn test_zero_byte_allocations_are_unique() {
    let allocator = AlignedAllocator::new(64);
    let device = Device::cpu();

    let a = allocator.alloc(device, 0).unwrap();
    let b = allocator.alloc(device, 0).unwrap();
    assert_ne!(a, b);
    assert_eq!(allocator.table().total_bytes(), 0);

    unsafe {
        allocator.free(device, a).unwrap();
        allocator.free(device, b).unwrap();
    }
}

#[test]
fn test_double_free_is_rejected() {
    let allocator = AlignedAllocator::new(64);
    let device = Device::cpu();

    let ptr = allocator.alloc(device, 8).unwrap();
    unsafe {
        allocator.free(device, ptr).unwrap();
        assert!(matches!(allocator.free(device, ptr), Err(Error::InvalidArgument { .. })));
    }
}

#[test]
fn test_oversized_allocation_is_out_of_memory() {
    let allocator = AlignedAllocator::new(64);
    let result = allocator.alloc(Device::cpu(), usize::MAX);
    assert!(matches!(result, Err(Error::OutOfMemory { size: usize::MAX, .. })));
}
