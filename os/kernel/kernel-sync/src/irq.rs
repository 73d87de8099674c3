use core::marker::PhantomData;

/// Interrupt priority level.
///
/// Levels are ordered: raising to a level masks every interrupt source at or
/// below it. Level `0` lets every interrupt through, level `7` masks all but
/// the non-maskable one.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PriorityLevel(u8);

impl PriorityLevel {
    /// All interrupts enabled.
    pub const NONE: Self = Self(0);

    /// Level that blocks every source which may touch translation tables or
    /// the reverse map (disk, network and clock handlers).
    pub const VM: Self = Self(4);

    /// Everything masked.
    pub const HIGH: Self = Self(7);

    /// # Panics
    /// Panics if `level` is above [`PriorityLevel::HIGH`].
    #[inline]
    #[must_use]
    pub const fn new(level: u8) -> Self {
        assert!(level <= Self::HIGH.0, "interrupt priority level out of range");
        Self(level)
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

/// Access to the processor's interrupt priority mask.
///
/// Implementations talk to the status register of the target CPU; the
/// functions are associated (not methods) since there is exactly one mask per
/// processor.
pub trait InterruptControl {
    /// Raises the priority mask to at least `level` and returns the mask that
    /// was active before. Never lowers the mask.
    fn raise(level: PriorityLevel) -> PriorityLevel;

    /// Restores a mask previously returned by [`raise`](Self::raise).
    fn restore(previous: PriorityLevel);
}

/// RAII guard that raises the interrupt priority level on creation and
/// restores the previous level on drop.
///
/// # Examples
///
/// ```
/// use kernel_sync::irq::{InterruptControl, PriorityLevel, SplGuard};
///
/// struct Fake;
/// impl InterruptControl for Fake {
///     fn raise(_level: PriorityLevel) -> PriorityLevel {
///         PriorityLevel::NONE
///     }
///     fn restore(_previous: PriorityLevel) {}
/// }
///
/// {
///     let g = SplGuard::<Fake>::raise(PriorityLevel::VM);
///     assert_eq!(g.previous(), PriorityLevel::NONE);
///     // critical section
/// }
/// // previous level restored here
/// ```
#[must_use = "dropping the guard immediately restores the previous level"]
pub struct SplGuard<C: InterruptControl> {
    /// The level that was active when the guard was created.
    previous: PriorityLevel,
    _control: PhantomData<fn() -> C>,
}

impl<C: InterruptControl> SplGuard<C> {
    /// Raises to `level` and remembers the prior level.
    #[inline]
    pub fn raise(level: PriorityLevel) -> Self {
        let previous = C::raise(level);
        Self {
            previous,
            _control: PhantomData,
        }
    }

    /// The level that will be restored on drop.
    #[inline]
    #[must_use]
    pub const fn previous(&self) -> PriorityLevel {
        self.previous
    }
}

impl<C: InterruptControl> Drop for SplGuard<C> {
    fn drop(&mut self) {
        C::restore(self.previous);
    }
}
