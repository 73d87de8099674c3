mod common;

use common::{SMALL, bootstrap, frame, va};
use kernel_vmem::{Level, MapFlags, SpaceId, VmProt};

fn tables(pmap: &common::TestPmap, space: SpaceId, v: u32) -> [kernel_vmem::TableHandle; 3] {
    Level::ALL.map(|level| pmap.table_for(space, va(v), level).unwrap().unwrap())
}

#[test]
fn wiring_credits_cascade_on_first_and_last_entry() {
    let mut pmap = bootstrap(SMALL);
    let space = pmap.create();
    pmap.enter(space, va(0x2000), frame(0), VmProt::ALL, MapFlags::WIRED)
        .unwrap();
    let [top, mid, leaf] = tables(&pmap, space, 0x2000);

    let wired = |pmap: &common::TestPmap, h| pmap.table_info(h).unwrap().wired_entries;
    assert_eq!([wired(&pmap, top), wired(&pmap, mid), wired(&pmap, leaf)], [1, 1, 1]);
    for h in [top, mid, leaf] {
        assert_eq!(pmap.is_queued(h), Some(false));
    }

    // a second wired entry in the same leaf only credits the leaf
    pmap.enter(space, va(0x4000), frame(1), VmProt::ALL, MapFlags::WIRED)
        .unwrap();
    assert_eq!([wired(&pmap, top), wired(&pmap, mid), wired(&pmap, leaf)], [1, 1, 2]);
    assert_eq!(pmap.wired_count(space).unwrap(), 2);

    pmap.unwire(space, va(0x2000)).unwrap();
    assert_eq!(wired(&pmap, leaf), 1);
    assert_eq!(pmap.is_queued(leaf), Some(false));

    pmap.unwire(space, va(0x4000)).unwrap();
    assert_eq!([wired(&pmap, top), wired(&pmap, mid), wired(&pmap, leaf)], [0, 0, 0]);
    for h in [top, mid, leaf] {
        assert_eq!(pmap.is_queued(h), Some(true));
    }
    assert_eq!(pmap.wired_count(space).unwrap(), 0);
    assert_eq!(pmap.resident_count(space).unwrap(), 2);
}

#[test]
fn mid_credit_counts_wired_children() {
    let mut pmap = bootstrap(SMALL);
    let space = pmap.create();
    pmap.enter(space, va(0x0000_2000), frame(0), VmProt::ALL, MapFlags::WIRED)
        .unwrap();
    pmap.enter(space, va(0x0004_2000), frame(1), VmProt::ALL, MapFlags::WIRED)
        .unwrap();
    let [top, mid, _] = tables(&pmap, space, 0x2000);
    assert_eq!(pmap.table_info(mid).unwrap().wired_entries, 2);
    assert_eq!(pmap.table_info(top).unwrap().wired_entries, 1);

    pmap.unwire(space, va(0x0000_2000)).unwrap();
    assert_eq!(pmap.table_info(mid).unwrap().wired_entries, 1);
    assert_eq!(pmap.is_queued(mid), Some(false));
}

#[test]
fn unwired_tables_rejoin_at_the_tail() {
    let mut pmap = bootstrap(SMALL);
    let space = pmap.create();
    pmap.enter(space, va(0), frame(0), VmProt::ALL, MapFlags::WIRED)
        .unwrap();
    for n in 1..8 {
        pmap.enter(space, va(n * 0x0004_0000), frame(n), VmProt::ALL, MapFlags::empty())
            .unwrap();
    }
    pmap.unwire(space, va(0)).unwrap();

    // the unwired leaf is the newest in the queue: the next steal takes another
    pmap.enter(space, va(8 * 0x0004_0000), frame(8), VmProt::ALL, MapFlags::empty())
        .unwrap();
    assert_eq!(pmap.extract(space, va(0)).unwrap(), Some(frame(0)));
    assert_eq!(pmap.extract(space, va(0x0004_0000)).unwrap(), None);
}

#[test]
fn reentering_without_wired_keeps_the_entry_wired() {
    let mut pmap = bootstrap(SMALL);
    let space = pmap.create();
    pmap.enter(space, va(0x2000), frame(0), VmProt::ALL, MapFlags::WIRED)
        .unwrap();
    pmap.enter(space, va(0x2000), frame(0), VmProt::READ, MapFlags::empty())
        .unwrap();
    assert_eq!(pmap.wired_count(space).unwrap(), 1);

    // re-entering wired does not add a second credit
    pmap.enter(space, va(0x2000), frame(0), VmProt::ALL, MapFlags::WIRED)
        .unwrap();
    assert_eq!(pmap.wired_count(space).unwrap(), 1);
}

#[test]
fn unwiring_unmapped_or_kernel_pages_is_ignored() {
    let mut pmap = bootstrap(SMALL);
    let space = pmap.create();
    pmap.unwire(space, va(0x2000)).unwrap();
    pmap.enter(space, va(0x2000), frame(0), VmProt::ALL, MapFlags::empty())
        .unwrap();
    pmap.unwire(space, va(0x2000)).unwrap();
    pmap.unwire(space, va(0x4000)).unwrap();
    assert_eq!(pmap.wired_count(space).unwrap(), 0);

    let kernel_wired = pmap.wired_count(SpaceId::KERNEL).unwrap();
    pmap.unwire(SpaceId::KERNEL, va(0xF800_2000)).unwrap();
    assert_eq!(pmap.wired_count(SpaceId::KERNEL).unwrap(), kernel_wired);
}
