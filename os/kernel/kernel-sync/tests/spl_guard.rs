use kernel_sync::{InterruptControl, PriorityLevel, SplGuard};
use std::cell::{Cell, RefCell};

thread_local! {
    static LEVEL: Cell<PriorityLevel> = const { Cell::new(PriorityLevel::NONE) };
    static CALLS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

/// Emulated status register, one per test thread.
struct Emulated;

impl InterruptControl for Emulated {
    fn raise(level: PriorityLevel) -> PriorityLevel {
        CALLS.with(|c| c.borrow_mut().push("raise"));
        LEVEL.with(|l| {
            let previous = l.get();
            l.set(previous.max(level));
            previous
        })
    }

    fn restore(previous: PriorityLevel) {
        CALLS.with(|c| c.borrow_mut().push("restore"));
        LEVEL.with(|l| l.set(previous));
    }
}

fn level() -> PriorityLevel {
    LEVEL.with(Cell::get)
}

#[test]
fn raises_and_restores() {
    assert_eq!(level(), PriorityLevel::NONE);
    {
        let g = SplGuard::<Emulated>::raise(PriorityLevel::VM);
        assert_eq!(level(), PriorityLevel::VM);
        assert_eq!(g.previous(), PriorityLevel::NONE);
    }
    assert_eq!(level(), PriorityLevel::NONE);
    CALLS.with(|c| assert_eq!(*c.borrow(), ["raise", "restore"]));
}

#[test]
fn nested_guards_restore_in_reverse_order() {
    let outer = SplGuard::<Emulated>::raise(PriorityLevel::VM);
    {
        let inner = SplGuard::<Emulated>::raise(PriorityLevel::HIGH);
        assert_eq!(level(), PriorityLevel::HIGH);
        assert_eq!(inner.previous(), PriorityLevel::VM);
    }
    assert_eq!(level(), PriorityLevel::VM);
    drop(outer);
    assert_eq!(level(), PriorityLevel::NONE);
}

#[test]
fn raising_never_lowers() {
    let _high = SplGuard::<Emulated>::raise(PriorityLevel::HIGH);
    {
        let low = SplGuard::<Emulated>::raise(PriorityLevel::VM);
        assert_eq!(level(), PriorityLevel::HIGH);
        assert_eq!(low.previous(), PriorityLevel::HIGH);
    }
    assert_eq!(level(), PriorityLevel::HIGH);
}

#[test]
fn restores_on_unwind() {
    let result = std::panic::catch_unwind(|| {
        let _g = SplGuard::<Emulated>::raise(PriorityLevel::VM);
        panic!("boom");
    });
    assert!(result.is_err());
    assert_eq!(level(), PriorityLevel::NONE);
}

#[test]
#[should_panic(expected = "out of range")]
fn rejects_levels_above_high() {
    let _ = PriorityLevel::new(8);
}

#[test]
fn levels_are_ordered() {
    assert!(PriorityLevel::NONE < PriorityLevel::VM);
    assert!(PriorityLevel::VM < PriorityLevel::HIGH);
    assert_eq!(PriorityLevel::new(4), PriorityLevel::VM);
}
