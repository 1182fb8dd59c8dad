//! Critical section guard
//!
//! Saves the interrupt-enable state, masks interrupts, and restores the
//! saved state afterwards. Every other piece of shared state in this crate
//! is coordinated through this primitive.
//!
//! Nesting is safe: an inner acquire sees interrupts already masked, so its
//! release leaves them masked and only the outermost release re-enables.
//!
//! ```text
//! acquire() ── enabled? ──► token { was_enabled: true }  ── release ──► enable
//!    acquire() ── masked ──► token { was_enabled: false } ── release ──► (no-op)
//! ```

/// Platform interrupt mask control
///
/// Implemented by chip-specific HALs (PRIMASK on Cortex-M, MIE on RISC-V).
pub trait InterruptControl {
    /// Check if interrupts are currently enabled
    fn are_enabled(&self) -> bool;

    /// Mask all maskable interrupts
    fn disable(&self);

    /// Unmask interrupts
    fn enable(&self);
}

/// Prior interrupt state returned by [`CriticalSection::acquire`]
///
/// Consumed by [`CriticalSection::release`], so each token is released at
/// most once.
#[must_use = "interrupts stay masked until the token is released"]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RestoreToken {
    was_enabled: bool,
}

impl RestoreToken {
    /// Check if interrupts were enabled when this token was taken
    pub fn interrupts_were_enabled(&self) -> bool {
        self.was_enabled
    }
}

/// Interrupt-masking critical section
pub struct CriticalSection<I> {
    irq: I,
}

impl<I: InterruptControl> CriticalSection<I> {
    /// Wrap a platform interrupt controller
    pub const fn new(irq: I) -> Self {
        Self { irq }
    }

    /// Mask interrupts, returning the previous state
    pub fn acquire(&self) -> RestoreToken {
        let was_enabled = self.irq.are_enabled();
        self.irq.disable();
        RestoreToken { was_enabled }
    }

    /// Restore the interrupt state captured by `token`
    ///
    /// Unbalanced use (dropping a token, or releasing out of order) is not
    /// detected and can leave interrupts masked.
    pub fn release(&self, token: RestoreToken) {
        if token.was_enabled {
            self.irq.enable();
        }
    }

    /// Acquire a scoped guard that releases on drop
    pub fn lock(&self) -> CriticalGuard<'_, I> {
        CriticalGuard {
            cs: self,
            token: Some(self.acquire()),
        }
    }

    /// Run `f` with interrupts masked
    ///
    /// The prior state is restored on every exit path of `f`.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }

    /// Check if interrupts are currently enabled
    pub fn interrupts_enabled(&self) -> bool {
        self.irq.are_enabled()
    }

    /// Get the underlying interrupt controller
    pub fn controller(&self) -> &I {
        &self.irq
    }
}

/// RAII critical section
///
/// Interrupts are restored to their prior state when the guard drops.
pub struct CriticalGuard<'a, I: InterruptControl> {
    cs: &'a CriticalSection<I>,
    token: Option<RestoreToken>,
}

impl<I: InterruptControl> Drop for CriticalGuard<'_, I> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.cs.release(token);
        }
    }
}
