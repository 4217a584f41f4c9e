//! Interrupt-disabling critical sections.
//!
//! All shared state of this crate lives in [`critical_section::Mutex`]es.
//! Access always goes through a [CriticalSection] token, which is either
//! handed in by the caller (`*_cs` methods) or taken from a short lived
//! [IrqGuard].

use core::marker::PhantomData;
use critical_section::RestoreState;

pub use critical_section::{CriticalSection, Mutex};

/// Scoped interrupt lock.
///
/// Disables interrupts on construction and restores the previous
/// interrupt state when dropped.
pub struct IrqGuard {
    restore: RestoreState,
    // The saved state belongs to this execution context.
    _not_send: PhantomData<*mut ()>,
}

impl IrqGuard {
    #[inline(always)]
    pub fn new() -> Self {
        // SAFETY: The matching `release` is done exactly once in `drop`
        //         with the state returned here.
        //         Guards are !Send, so they are dropped in the context
        //         that created them, in reverse creation order.
        let restore = unsafe { critical_section::acquire() };
        fence();
        Self {
            restore,
            _not_send: PhantomData,
        }
    }

    /// Get a token that is valid for as long as the guard is borrowed.
    #[inline(always)]
    pub fn cs(&self) -> CriticalSection<'_> {
        // SAFETY: Interrupts are disabled until `self` is dropped
        //         and the token cannot outlive the borrow of `self`.
        unsafe { CriticalSection::new() }
    }
}

impl Default for IrqGuard {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline(always)]
    fn drop(&mut self) {
        fence();
        // SAFETY: `restore` was returned by the `acquire` in `new`
        //         and is released only once.
        unsafe { critical_section::release(self.restore) };
    }
}

/// Run `f` with interrupts disabled.
#[inline(always)]
pub fn free<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    let guard = IrqGuard::new();
    f(guard.cs())
}

/// Optimization and reordering fence.
#[inline(always)]
pub fn fence() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
mod test {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn test_guard_nesting() {
        let m = Mutex::new(Cell::new(0_u8));
        {
            let outer = IrqGuard::new();
            m.borrow(outer.cs()).set(1);
            {
                let inner = IrqGuard::new();
                let v = m.borrow(inner.cs()).get();
                m.borrow(inner.cs()).set(v + 1);
            }
            assert_eq!(m.borrow(outer.cs()).get(), 2);
        }
        assert_eq!(free(|cs| m.borrow(cs).get()), 2);
    }

    #[test]
    fn test_guard_released_on_early_return() {
        fn bump(m: &Mutex<Cell<u8>>, stop: bool) -> Option<u8> {
            let guard = IrqGuard::new();
            let v = m.borrow(guard.cs());
            if stop {
                return None;
            }
            v.set(v.get() + 1);
            Some(v.get())
        }

        let m = Mutex::new(Cell::new(0));
        assert_eq!(bump(&m, true), None);
        assert_eq!(bump(&m, false), Some(1));
        // Would deadlock on the host, if the early return leaked the lock
        // to another thread.
        let t = std::thread::spawn(|| free(|_cs| 42));
        assert_eq!(t.join().ok(), Some(42));
    }
}

// vim: ts=4 sw=4 expandtab
