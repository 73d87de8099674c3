mod common;

use common::{DEVICE, SMALL, bootstrap, frame, pa, va};
use kernel_vmem::{AccessFault, MapFlags, PmapError, SpaceId, VmProt};

#[test]
fn kernel_enter_and_extract() {
    let mut pmap = bootstrap(SMALL);
    let (avail, end) = pmap.virtual_space();
    assert!(avail < end);

    pmap.enter(SpaceId::KERNEL, avail, frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    assert_eq!(pmap.extract_kernel(avail + 4).unwrap(), Some(frame(0) + 4));
    assert_eq!(pmap.extract(SpaceId::KERNEL, avail).unwrap(), Some(frame(0)));

    let resident = pmap.resident_count(SpaceId::KERNEL).unwrap();
    pmap.remove(SpaceId::KERNEL, avail, avail + 0x2000).unwrap();
    assert_eq!(pmap.extract_kernel(avail).unwrap(), None);
    assert_eq!(pmap.resident_count(SpaceId::KERNEL).unwrap(), resident - 1);
    assert!(pmap.hardware().flushed(avail));
}

#[test]
fn kernel_operations_reject_user_addresses() {
    let mut pmap = bootstrap(SMALL);
    let low = va(0x0010_0000);
    let err = Err(PmapError::OutsideKernelRange(low));
    assert_eq!(pmap.enter_kernel(low, frame(0), VmProt::ALL, MapFlags::empty()), err);
    assert_eq!(pmap.kenter_pa(low, DEVICE, VmProt::ALL), err);
    assert_eq!(pmap.kremove(low, 0x2000), err);
    assert_eq!(pmap.remove_kernel(low, va(0xF800_0000)), err);
    assert_eq!(pmap.protect_kernel(low, va(0xF800_0000), VmProt::READ), err);
    assert_eq!(pmap.extract_kernel(low), Err(PmapError::OutsideKernelRange(low)));
}

#[test]
fn kenter_pa_maps_untracked() {
    let mut pmap = bootstrap(SMALL);
    let [temp, _] = pmap.temporary_pages();
    pmap.kenter_pa(temp, frame(3), VmProt::READ).unwrap();

    assert_eq!(pmap.extract_kernel(temp).unwrap(), Some(frame(3)));
    assert!(pmap.mappings(frame(3)).is_empty());
    assert_eq!(
        pmap.access(SpaceId::KERNEL, temp, true),
        Err(AccessFault::WriteProtected(temp))
    );

    pmap.hardware_mut().clear();
    pmap.kremove(temp, 0x2000).unwrap();
    assert_eq!(pmap.extract_kernel(temp).unwrap(), None);
    assert!(pmap.hardware().flushed(temp));
}

#[test]
#[should_panic(expected = "BUG: kenter_pa over the live mapping")]
fn kenter_pa_refuses_live_slots() {
    let mut pmap = bootstrap(SMALL);
    let [temp, _] = pmap.temporary_pages();
    pmap.kenter_pa(temp, DEVICE, VmProt::ALL).unwrap();
    pmap.kenter_pa(temp, DEVICE, VmProt::ALL).unwrap();
}

#[test]
fn map_covers_the_physical_range() {
    let mut pmap = bootstrap(SMALL);
    let (avail, _) = pmap.virtual_space();
    let next = pmap
        .map(avail, pa(0x0100_0000), pa(0x0100_6000), VmProt::ALL)
        .unwrap();
    assert_eq!(next, avail + 0x6000);
    for page in 0..3 {
        assert_eq!(
            pmap.extract_kernel(avail + page * 0x2000).unwrap(),
            Some(pa(0x0100_0000 + page * 0x2000))
        );
    }

    // an empty range still maps one page
    let after = pmap.map(next, pa(0x0200_0000), pa(0x0200_0000), VmProt::READ).unwrap();
    assert_eq!(after, next + 0x2000);
    assert_eq!(pmap.extract_kernel(next).unwrap(), Some(pa(0x0200_0000)));
}

#[test]
fn map_reaches_the_last_physical_page() {
    let mut pmap = bootstrap(SMALL);
    let (avail, _) = pmap.virtual_space();
    let next = pmap
        .map(avail, pa(0xFFFF_C000), pa(0xFFFF_FFFF), VmProt::READ)
        .unwrap();
    assert_eq!(next, avail + 0x4000);
    assert_eq!(pmap.extract_kernel(avail).unwrap(), Some(pa(0xFFFF_C000)));
    assert_eq!(
        pmap.extract_kernel(avail + 0x2000 + 0x1FFF).unwrap(),
        Some(pa(0xFFFF_FFFF))
    );
    assert_eq!(pmap.extract_kernel(next).unwrap(), None);
}

#[test]
fn kernel_protection() {
    let mut pmap = bootstrap(SMALL);
    let (avail, _) = pmap.virtual_space();
    let end = pmap
        .map(avail, frame(0), frame(2), VmProt::ALL)
        .unwrap();

    pmap.protect(SpaceId::KERNEL, avail, end, VmProt::ALL).unwrap();
    assert!(pmap.access(SpaceId::KERNEL, avail, true).is_ok());

    pmap.hardware_mut().clear();
    pmap.protect(SpaceId::KERNEL, avail, end, VmProt::READ).unwrap();
    assert_eq!(
        pmap.access(SpaceId::KERNEL, avail + 0x2000, true),
        Err(AccessFault::WriteProtected(avail + 0x2000))
    );
    assert!(pmap.hardware().flushed(avail));
    assert!(pmap.hardware().flushed(avail + 0x2000));

    pmap.protect(SpaceId::KERNEL, avail, end, VmProt::NONE).unwrap();
    assert_eq!(pmap.extract_kernel(avail).unwrap(), None);
    assert!(pmap.mappings(frame(0)).is_empty());
    // the write through the first mapping is remembered
    assert!(pmap.is_modified(frame(0)));
}

#[test]
fn kernel_pages_are_visible_from_user_spaces() {
    let mut pmap = bootstrap(SMALL);
    let (avail, _) = pmap.virtual_space();
    pmap.enter_kernel(avail, frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();

    let space = pmap.create();
    pmap.enter(space, va(0x2000), frame(1), VmProt::ALL, MapFlags::empty())
        .unwrap();
    assert_eq!(pmap.access(space, avail, false), Ok(frame(0)));
    assert!(pmap.is_referenced(frame(0)));
}
