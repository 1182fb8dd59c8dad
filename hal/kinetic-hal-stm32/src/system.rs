//! Reset flags and software reset

use embassy_stm32::pac;
use kinetic_hal::reset::{RebootStatus, ResetFlags, SystemControl};

// RCC_CSR remove-reset-flags bit
const RMVF: u32 = 1 << 24;

/// Reset control through the RCC and the Cortex-M SCB
#[derive(Debug, Clone, Copy, Default)]
pub struct RccSystem;

impl SystemControl for RccSystem {
    fn reset_flags(&self) -> ResetFlags {
        ResetFlags::from_rcc_csr(pac::RCC.csr().read().0)
    }

    fn clear_reset_flags(&mut self) {
        pac::RCC.csr().modify(|w| w.0 |= RMVF);
    }

    fn reboot(&mut self) -> RebootStatus {
        cortex_m::peripheral::SCB::sys_reset()
    }
}
