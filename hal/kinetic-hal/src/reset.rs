//! Reset cause capture and reboot

/// Why the most recent boot began
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetCause {
    PowerOn,
    Watchdog,
    Software,
    External,
    /// Unrecognized, or already cleared
    #[default]
    Unknown,
}

impl ResetCause {
    /// Decode the hardware flags
    ///
    /// Several flags can be set at once (the reset pin is asserted on every
    /// reset, brown-out accompanies power-on), so the most specific flag
    /// wins: watchdog, then software, then power-on, then the pin alone.
    pub fn from_flags(flags: ResetFlags) -> Self {
        if flags.independent_watchdog || flags.window_watchdog {
            ResetCause::Watchdog
        } else if flags.software {
            ResetCause::Software
        } else if flags.power_on || flags.brown_out {
            ResetCause::PowerOn
        } else if flags.pin {
            ResetCause::External
        } else {
            ResetCause::Unknown
        }
    }

    /// Numeric code reported to host tools
    pub fn code(self) -> u8 {
        match self {
            ResetCause::PowerOn => 1,
            ResetCause::External => 2,
            ResetCause::Watchdog => 8,
            ResetCause::Software => 32,
            ResetCause::Unknown => 0,
        }
    }
}

/// Decoded hardware reset flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetFlags {
    pub power_on: bool,
    pub brown_out: bool,
    pub pin: bool,
    pub software: bool,
    pub independent_watchdog: bool,
    pub window_watchdog: bool,
    pub low_power: bool,
}

// STM32F4 RCC_CSR reset flag bits (RM0090 7.3.21)
const CSR_LPWRRSTF: u32 = 1 << 31;
const CSR_WWDGRSTF: u32 = 1 << 30;
const CSR_IWDGRSTF: u32 = 1 << 29;
const CSR_SFTRSTF: u32 = 1 << 28;
const CSR_PORRSTF: u32 = 1 << 27;
const CSR_PINRSTF: u32 = 1 << 26;
const CSR_BORRSTF: u32 = 1 << 25;

impl ResetFlags {
    /// Decode a raw STM32F4 `RCC_CSR` value
    pub fn from_rcc_csr(csr: u32) -> Self {
        Self {
            power_on: csr & CSR_PORRSTF != 0,
            brown_out: csr & CSR_BORRSTF != 0,
            pin: csr & CSR_PINRSTF != 0,
            software: csr & CSR_SFTRSTF != 0,
            independent_watchdog: csr & CSR_IWDGRSTF != 0,
            window_watchdog: csr & CSR_WWDGRSTF != 0,
            low_power: csr & CSR_LPWRRSTF != 0,
        }
    }
}

/// Outcome of a reboot request that returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RebootStatus {
    /// The platform has no software restart; nothing happened
    Unsupported,
    /// Restart requested and will happen shortly
    Requested,
}

/// Reset and restart hooks
pub trait SystemControl {
    /// Read the reset flags latched by hardware
    fn reset_flags(&self) -> ResetFlags;

    /// Clear the latched reset flags
    fn clear_reset_flags(&mut self);

    /// Restart execution
    ///
    /// Implementations that can reset never return. The default is for
    /// platforms without a software re-entry path.
    fn reboot(&mut self) -> RebootStatus {
        RebootStatus::Unsupported
    }
}

/// Reset cause controller
///
/// The cause is captured once at construction, before anything can clear
/// the hardware flags.
pub struct ResetController<S> {
    system: S,
    cause: ResetCause,
}

impl<S: SystemControl> ResetController<S> {
    /// Capture the boot reset cause
    pub fn capture(system: S) -> Self {
        let flags = system.reset_flags();
        let cause = ResetCause::from_flags(flags);
        info!("Reset cause: {} (flags {})", cause, flags);
        Self { system, cause }
    }

    /// Reset cause captured at boot, or `Unknown` once cleared
    pub fn get_reset_source(&self) -> ResetCause {
        self.cause
    }

    /// Forget the captured cause and clear the hardware flags
    pub fn clear_reset_source(&mut self) {
        self.cause = ResetCause::Unknown;
        self.system.clear_reset_flags();
    }

    /// Request a restart
    ///
    /// May return [`RebootStatus::Unsupported`]; pair with a watchdog when
    /// a restart is mandatory.
    pub fn reboot(&mut self) -> RebootStatus {
        info!("Reboot requested");
        let status = self.system.reboot();
        if status == RebootStatus::Unsupported {
            warn!("Reboot not supported on this platform");
        }
        status
    }

    /// Get the underlying system hooks
    pub fn system(&self) -> &S {
        &self.system
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSystem;

    #[test]
    fn test_decode_priority() {
        let por = ResetFlags {
            power_on: true,
            brown_out: true,
            pin: true,
            ..ResetFlags::default()
        };
        assert_eq!(ResetCause::from_flags(por), ResetCause::PowerOn);

        let wdg = ResetFlags {
            independent_watchdog: true,
            pin: true,
            ..ResetFlags::default()
        };
        assert_eq!(ResetCause::from_flags(wdg), ResetCause::Watchdog);

        let sw = ResetFlags {
            software: true,
            pin: true,
            ..ResetFlags::default()
        };
        assert_eq!(ResetCause::from_flags(sw), ResetCause::Software);

        let ext = ResetFlags {
            pin: true,
            ..ResetFlags::default()
        };
        assert_eq!(ResetCause::from_flags(ext), ResetCause::External);

        let lp = ResetFlags {
            low_power: true,
            ..ResetFlags::default()
        };
        assert_eq!(ResetCause::from_flags(lp), ResetCause::Unknown);
        assert_eq!(ResetCause::from_flags(ResetFlags::default()), ResetCause::Unknown);
    }

    #[test]
    fn test_rcc_csr_bits() {
        // Power-on reset value: PORRSTF | PINRSTF | BORRSTF, LSI off
        let por = ResetFlags::from_rcc_csr(0x0E00_0000);
        assert_eq!(
            por,
            ResetFlags {
                power_on: true,
                brown_out: true,
                pin: true,
                ..ResetFlags::default()
            }
        );
        assert_eq!(ResetCause::from_flags(por), ResetCause::PowerOn);

        assert!(ResetFlags::from_rcc_csr(1 << 31).low_power);
        assert!(ResetFlags::from_rcc_csr(1 << 30).window_watchdog);
        assert!(ResetFlags::from_rcc_csr(1 << 29).independent_watchdog);
        assert!(ResetFlags::from_rcc_csr(1 << 28).software);

        // RMVF and the clock bits below it are not reset flags
        assert_eq!(ResetFlags::from_rcc_csr(0x01FF_FFFF), ResetFlags::default());

        let sw = ResetFlags::from_rcc_csr((1 << 28) | (1 << 26));
        assert_eq!(ResetCause::from_flags(sw), ResetCause::Software);
    }

    #[test]
    fn test_codes() {
        assert_eq!(ResetCause::PowerOn.code(), 1);
        assert_eq!(ResetCause::External.code(), 2);
        assert_eq!(ResetCause::Watchdog.code(), 8);
        assert_eq!(ResetCause::Software.code(), 32);
        assert_eq!(ResetCause::Unknown.code(), 0);
    }

    #[test]
    fn test_get_then_clear() {
        let mut reset = ResetController::capture(MockSystem::with_flags(ResetFlags {
            window_watchdog: true,
            ..ResetFlags::default()
        }));

        assert_eq!(reset.get_reset_source(), ResetCause::Watchdog);
        assert_eq!(reset.get_reset_source(), ResetCause::Watchdog, "reads do not clear");

        reset.clear_reset_source();
        assert_eq!(reset.get_reset_source(), ResetCause::Unknown);
        assert_eq!(reset.system().clear_calls, 1);
        assert_eq!(reset.system().flags, ResetFlags::default());
    }

    #[test]
    fn test_reboot_unsupported() {
        let mut reset = ResetController::capture(MockSystem::default());
        assert_eq!(reset.reboot(), RebootStatus::Unsupported);
        assert_eq!(reset.system().reboot_calls, 1);
    }

    #[test]
    fn test_reboot_requested() {
        let mut system = MockSystem::default();
        system.reboot_supported = true;
        let mut reset = ResetController::capture(system);
        assert_eq!(reset.reboot(), RebootStatus::Requested);
    }
}
