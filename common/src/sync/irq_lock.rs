use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
};

use super::irq::IrqControl;

/// Lock shared between thread context and an interrupt handler.
///
/// - Masks interrupts for as long as the guard lives
/// - Restores the previous interrupt state on drop
/// - Not fair, not reentrant
///
/// On single-core parts without compare-and-swap (ARMv6-M) the masked section
/// is what provides exclusion and the flag only records ownership. Where the
/// target has byte-sized CAS the flag is taken with an atomic swap.
pub struct IrqLock<T, I: IrqControl> {
    held: AtomicBool,
    data: UnsafeCell<T>,
    _irq: PhantomData<I>,
}

unsafe impl<T: Send, I: IrqControl> Send for IrqLock<T, I> {}
unsafe impl<T: Send, I: IrqControl> Sync for IrqLock<T, I> {}

impl<T, I: IrqControl> IrqLock<T, I> {
    /// Create a new lock around `data`.
    pub const fn new(data: T) -> Self {
        Self {
            held: AtomicBool::new(false),
            data: UnsafeCell::new(data),
            _irq: PhantomData,
        }
    }

    /// Mask interrupts and take the lock, spinning while another core holds it.
    pub fn lock(&self) -> IrqLockGuard<'_, T, I> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            core::hint::spin_loop();
        }
    }

    /// Take the lock if it is free. Interrupts stay unmasked on failure.
    pub fn try_lock(&self) -> Option<IrqLockGuard<'_, T, I>> {
        let irq_state = I::disable();

        if !self.acquire() {
            I::restore(irq_state);
            return None;
        }

        Some(IrqLockGuard {
            lock: self,
            irq_state,
        })
    }

    /// Returns `true` while a guard is alive.
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// Exclusive access without masking; the borrow checker proves no guard exists.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    #[cfg(target_has_atomic = "8")]
    fn acquire(&self) -> bool {
        !self.held.swap(true, Ordering::Acquire)
    }

    // Interrupts are masked here, so nothing can run between the load and the store.
    #[cfg(not(target_has_atomic = "8"))]
    fn acquire(&self) -> bool {
        if self.held.load(Ordering::Acquire) {
            return false;
        }
        self.held.store(true, Ordering::Relaxed);
        true
    }
}

/// Guard returned by [`IrqLock::lock`] and [`IrqLock::try_lock`].
///
/// Releases the lock, then restores the interrupt state, on drop.
pub struct IrqLockGuard<'a, T, I: IrqControl> {
    lock: &'a IrqLock<T, I>,
    irq_state: I::State,
}

impl<T, I: IrqControl> core::ops::Deref for IrqLockGuard<'_, T, I> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the flag is held, so this guard is the only accessor
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, I: IrqControl> core::ops::DerefMut for IrqLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the flag is held, so this guard is the only accessor
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, I: IrqControl> Drop for IrqLockGuard<'_, T, I> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
        I::restore(self.irq_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    static MASKED: AtomicUsize = AtomicUsize::new(0);
    static RESTORED: AtomicUsize = AtomicUsize::new(0);

    /// Records every mask/restore so tests can check pairing.
    struct CountingIrq;

    impl IrqControl for CountingIrq {
        type State = u8;

        fn disable() -> u8 {
            MASKED.fetch_add(1, Ordering::SeqCst);
            0xA5
        }

        fn restore(state: u8) {
            assert_eq!(state, 0xA5);
            RESTORED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn guard_masks_and_restores() {
        let lock: IrqLock<u32, CountingIrq> = IrqLock::new(1);
        let masked = MASKED.load(Ordering::SeqCst);
        let restored = RESTORED.load(Ordering::SeqCst);

        {
            let mut guard = lock.lock();
            *guard += 1;
            assert!(lock.is_locked());
            assert_eq!(MASKED.load(Ordering::SeqCst), masked + 1);
            assert_eq!(RESTORED.load(Ordering::SeqCst), restored);
        }

        assert!(!lock.is_locked());
        assert_eq!(RESTORED.load(Ordering::SeqCst), restored + 1);
        assert_eq!(lock.into_inner(), 2);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock: IrqLock<u8, crate::arch::CurrentIrq> = IrqLock::new(0);
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn get_mut_bypasses_flag() {
        let mut lock: IrqLock<[u8; 2], crate::arch::CurrentIrq> = IrqLock::new([0; 2]);
        lock.get_mut()[1] = 7;
        assert_eq!(*lock.lock(), [0, 7]);
    }
}
