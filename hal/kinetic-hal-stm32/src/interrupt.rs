//! PRIMASK interrupt control

use kinetic_hal::critical::InterruptControl;

/// Global interrupt mask through the PRIMASK register
///
/// Masks every configurable-priority interrupt; faults and NMI still run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaskInterrupts;

impl InterruptControl for PrimaskInterrupts {
    fn are_enabled(&self) -> bool {
        cortex_m::register::primask::read().is_active()
    }

    fn disable(&self) {
        cortex_m::interrupt::disable();
    }

    fn enable(&self) {
        // Only reached when restoring a token captured with interrupts on
        unsafe { cortex_m::interrupt::enable() }
    }
}
