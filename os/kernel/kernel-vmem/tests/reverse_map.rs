mod common;

use common::{SMALL, bootstrap, frame, va};
use kernel_vmem::{AccessFault, Level, MapFlags, PvFlags, SpaceId, VmProt};

#[test]
fn chains_match_the_forward_translation() {
    let mut pmap = bootstrap(SMALL);
    let a = pmap.create();
    let b = pmap.create();
    let plan = [
        (a, 0x0000_2000, 0),
        (a, 0x0004_0000, 1),
        (a, 0x0200_0000, 0),
        (b, 0x0000_2000, 0),
        (b, 0x0010_0000, 2),
        (b, 0x0010_2000, 1),
    ];
    for (space, v, f) in plan {
        pmap.enter(space, va(v), frame(f), VmProt::ALL, MapFlags::empty())
            .unwrap();
    }
    // remap one page elsewhere and drop another
    pmap.enter(a, va(0x0004_0000), frame(2), VmProt::ALL, MapFlags::empty())
        .unwrap();
    pmap.remove(b, va(0x0010_2000), va(0x0010_4000)).unwrap();

    for f in 0..3 {
        let mut chained = pmap.mappings(frame(f));
        chained.sort();
        let mut walked: Vec<(SpaceId, _)> = plan
            .iter()
            .map(|&(space, v, _)| (space, va(v)))
            .filter(|&(space, v)| pmap.extract(space, v).unwrap() == Some(frame(f)))
            .collect();
        walked.sort();
        walked.dedup();
        assert_eq!(chained, walked, "frame {f}");
    }
    assert_eq!(pmap.mappings(frame(0)).len(), 3);
    assert!(pmap.mappings(frame(1)).is_empty());
}

#[test]
fn newest_mapping_comes_first() {
    let mut pmap = bootstrap(SMALL);
    let a = pmap.create();
    let b = pmap.create();
    pmap.enter(a, va(0x2000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    pmap.enter(b, va(0x8000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    assert_eq!(pmap.mappings(frame(0)), [(b, va(0x8000)), (a, va(0x2000))]);
}

#[test]
fn writes_set_modified_until_cleared() {
    let mut pmap = bootstrap(SMALL);
    let a = pmap.create();
    let b = pmap.create();
    pmap.enter(a, va(0x2000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    pmap.enter(b, va(0x8000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    assert!(!pmap.is_modified(frame(0)));

    pmap.access(a, va(0x2000), true).unwrap();
    assert!(pmap.is_modified(frame(0)));
    assert!(pmap.is_referenced(frame(0)));

    pmap.hardware_mut().clear();
    pmap.clear(frame(0), PvFlags::MODIFIED);
    assert!(!pmap.is_modified(frame(0)));
    assert!(pmap.is_referenced(frame(0)));
    // both mappings are flushed, loaded or not
    assert!(pmap.hardware().flushed(va(0x2000)));
    assert!(pmap.hardware().flushed(va(0x8000)));

    pmap.access(b, va(0x8000), false).unwrap();
    assert!(!pmap.is_modified(frame(0)));
    pmap.access(b, va(0x8000), true).unwrap();
    assert!(pmap.is_modified(frame(0)));
}

#[test]
fn history_survives_unmapping() {
    let mut pmap = bootstrap(SMALL);
    let a = pmap.create();
    pmap.enter(a, va(0x2000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    pmap.access(a, va(0x2000), true).unwrap();
    pmap.remove(a, va(0x2000), va(0x4000)).unwrap();

    assert!(pmap.mappings(frame(0)).is_empty());
    assert!(pmap.clear_modify(frame(0)));
    assert!(!pmap.clear_modify(frame(0)));
    assert!(pmap.clear_reference(frame(0)));
    assert!(!pmap.is_referenced(frame(0)));
}

#[test]
fn write_protecting_a_shared_page() {
    let mut pmap = bootstrap(SMALL);
    let a = pmap.create();
    let b = pmap.create();
    pmap.enter(a, va(0x2000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    pmap.enter(b, va(0x8000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();

    pmap.page_protect(frame(0), VmProt::ALL);
    assert!(pmap.access(a, va(0x2000), true).is_ok());

    pmap.page_protect(frame(0), VmProt::READ);
    assert_eq!(
        pmap.access(a, va(0x2000), true),
        Err(AccessFault::WriteProtected(va(0x2000)))
    );
    assert_eq!(
        pmap.access(b, va(0x8000), true),
        Err(AccessFault::WriteProtected(va(0x8000)))
    );
    assert_eq!(pmap.mappings(frame(0)).len(), 2);
}

#[test]
fn revoking_a_shared_page_unmaps_it_everywhere() {
    let mut pmap = bootstrap(SMALL);
    let a = pmap.create();
    let b = pmap.create();
    pmap.enter(a, va(0x2000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    pmap.enter(a, va(0x4000), frame(1), VmProt::ALL, MapFlags::empty())
        .unwrap();
    pmap.enter(b, va(0x8000), frame(0), VmProt::ALL, MapFlags::WIRED)
        .unwrap();
    pmap.activate(a).unwrap();
    pmap.access(b, va(0x8000), true).unwrap();
    pmap.activate(a).unwrap();

    pmap.hardware_mut().clear();
    pmap.page_protect(frame(0), VmProt::NONE);

    assert!(pmap.mappings(frame(0)).is_empty());
    assert_eq!(pmap.extract(a, va(0x2000)).unwrap(), None);
    assert_eq!(pmap.extract(b, va(0x8000)).unwrap(), None);
    assert_eq!(pmap.extract(a, va(0x4000)).unwrap(), Some(frame(1)));
    assert!(pmap.is_modified(frame(0)));

    // only the loaded space is flushed
    assert!(pmap.hardware().flushed(va(0x2000)));
    assert!(!pmap.hardware().flushed(va(0x8000)));

    // b lost its only (wired) mapping and with it every table
    assert_eq!(pmap.wired_count(b).unwrap(), 0);
    assert_eq!(pmap.top_table(b).unwrap(), None);
    let leaf = pmap.table_for(a, va(0x4000), Level::Leaf).unwrap().unwrap();
    assert_eq!(pmap.table_info(leaf).unwrap().valid_entries, 1);
}

#[test]
fn kernel_mappings_are_chained_too() {
    let mut pmap = bootstrap(SMALL);
    let (avail, _) = pmap.virtual_space();
    pmap.enter_kernel(avail, frame(5), VmProt::ALL, MapFlags::empty())
        .unwrap();
    assert_eq!(pmap.mappings(frame(5)), [(SpaceId::KERNEL, avail)]);

    pmap.hardware_mut().clear();
    pmap.page_protect(frame(5), VmProt::NONE);
    assert_eq!(pmap.extract_kernel(avail).unwrap(), None);
    assert!(pmap.hardware().flushed(avail));
}

#[test]
fn unmanaged_pages_have_no_history() {
    let mut pmap = bootstrap(SMALL);
    assert!(!pmap.clear_modify(common::DEVICE));
    assert!(!pmap.is_referenced(common::DEVICE));
    pmap.page_protect(common::DEVICE, VmProt::NONE);
}
