//! HAL context
//!
//! [`Hal`] owns every platform hook for the lifetime of the firmware and
//! exposes the boundary operations as methods. The only state shared with
//! interrupt handlers is the [`AdcChannelState`], which lives in a static
//! and is borrowed here.
//!
//! # Example
//!
//! ```ignore
//! static ADC_STATE: AdcChannelState = AdcChannelState::new();
//!
//! let mut hal = Hal::<Board>::init(&config, &ADC_STATE, parts)?;
//! hal.start_conversion(Pin::new(Port::A, 0))?;
//! // ... ADC interrupt: ADC_STATE.on_conversion_complete(sample)
//! let raw = hal.get_result();
//! ```

use crate::adc::{Adc, AdcChannelState, AdcError, AdcPeripheral};
use crate::config::{ConfigError, HalConfig};
use crate::critical::{CriticalSection, InterruptControl, RestoreToken};
use crate::memory::{self, MemoryProbe};
use crate::pin::Pin;
use crate::pwm::{FrequencyChange, Pwm, PwmError, PwmTimers, DEFAULT_DUTY_RESOLUTION};
use crate::reset::{RebootStatus, ResetCause, ResetController, SystemControl};
use crate::serial::SerialBindings;

/// Platform hook types
///
/// Chip crates implement this on a marker type to name the concrete
/// hooks for one board.
pub trait Platform {
    type Interrupts: InterruptControl;
    type Adc: AdcPeripheral;
    type Timers: PwmTimers;
    type System: SystemControl;
    type Memory: MemoryProbe;
}

/// Platform hooks handed to [`Hal::init`]
pub struct HalParts<P: Platform> {
    pub interrupts: P::Interrupts,
    pub adc: P::Adc,
    pub timers: P::Timers,
    pub system: P::System,
    pub memory: P::Memory,
}

/// HAL context
pub struct Hal<'s, P: Platform> {
    cs: CriticalSection<P::Interrupts>,
    adc: Adc<'s, P::Adc>,
    pwm: Pwm<P::Timers>,
    serial: SerialBindings,
    reset: ResetController<P::System>,
    memory: P::Memory,
}

impl<'s, P: Platform> Hal<'s, P> {
    /// Validate `config` and bring up the boundary
    ///
    /// Nothing is configured when validation fails.
    pub fn init(
        config: &HalConfig,
        adc_state: &'s AdcChannelState,
        parts: HalParts<P>,
    ) -> Result<Self, ConfigError> {
        let serial = config.validate()?;

        let bits = config.adc.resolution_bits;
        let mut adc = Adc::new(parts.adc, adc_state, config.analog_profile(), bits)
            .map_err(|_| ConfigError::UnsupportedResolution(bits))?;
        adc.init();

        let pwm = Pwm::new(parts.timers, config.pwm.reserved_timers.clone());
        let reset = ResetController::capture(parts.system);

        info!(
            "HAL ready: primary serial {}, ADC {=u8}-bit",
            serial.primary().port,
            bits
        );

        Ok(Self {
            cs: CriticalSection::new(parts.interrupts),
            adc,
            pwm,
            serial,
            reset,
            memory: parts.memory,
        })
    }

    // Critical sections

    /// Mask interrupts, returning the prior state
    pub fn acquire(&self) -> RestoreToken {
        self.cs.acquire()
    }

    /// Restore the state captured by [`Hal::acquire`]
    pub fn release(&self, token: RestoreToken) {
        self.cs.release(token)
    }

    /// The critical section guard
    pub fn critical(&self) -> &CriticalSection<P::Interrupts> {
        &self.cs
    }

    // ADC

    /// Start a conversion on `pin`; ignored while one is pending
    pub fn start_conversion(&mut self, pin: Pin) -> Result<(), AdcError> {
        self.adc.start_conversion(&self.cs, pin)
    }

    /// Last latched conversion result
    pub fn get_result(&self) -> u16 {
        self.adc.get_result()
    }

    /// Take a completed result exactly once
    pub fn take_result(&self) -> Option<u16> {
        self.adc.take_result(&self.cs)
    }

    pub fn adc(&self) -> &Adc<'s, P::Adc> {
        &self.adc
    }

    // PWM

    /// Set the frequency of the timer driving `pin`
    pub fn set_pwm_frequency(&mut self, pin: Pin, hz: u32) -> Result<FrequencyChange, PwmError> {
        self.pwm.set_frequency(&self.cs, pin, hz)
    }

    /// Set the duty of `pin` on a `[0, resolution]` scale
    pub fn set_pwm_duty(
        &mut self,
        pin: Pin,
        value: u16,
        resolution: u16,
        invert: bool,
    ) -> Result<u32, PwmError> {
        self.pwm.set_duty(&self.cs, pin, value, resolution, invert)
    }

    /// Set the duty of `pin` on the default 0-255 scale
    pub fn set_pwm_value(&mut self, pin: Pin, value: u16) -> Result<u32, PwmError> {
        self.set_pwm_duty(pin, value, DEFAULT_DUTY_RESOLUTION, false)
    }

    /// Borrow `pin` as an `embedded-hal` PWM channel
    pub fn pwm_pin(&mut self, pin: Pin) -> Result<PwmPin<'_, 's, P>, PwmError> {
        let timer = self.pwm.timer_of(pin).ok_or(PwmError::NoTimer(pin))?;
        if self.pwm.is_reserved(timer) {
            return Err(PwmError::ReservedTimer { pin, timer });
        }
        Ok(PwmPin { hal: self, pin })
    }

    pub fn pwm(&self) -> &Pwm<P::Timers> {
        &self.pwm
    }

    // Serial

    /// Resolved serial slot table
    pub fn serial(&self) -> &SerialBindings {
        &self.serial
    }

    // Reset

    /// Boot reset cause, or `Unknown` once cleared
    pub fn get_reset_source(&self) -> ResetCause {
        self.reset.get_reset_source()
    }

    pub fn clear_reset_source(&mut self) {
        self.reset.clear_reset_source()
    }

    /// Request a restart
    pub fn reboot(&mut self) -> RebootStatus {
        self.reset.reboot()
    }

    // Memory

    /// Bytes between the stack pointer and the heap end
    pub fn free_memory(&self) -> usize {
        memory::free_memory(&self.memory)
    }
}

/// One PWM pin as an `embedded-hal` duty cycle channel
///
/// Duty is on the full `u16` scale.
pub struct PwmPin<'h, 's, P: Platform> {
    hal: &'h mut Hal<'s, P>,
    pin: Pin,
}

impl<P: Platform> PwmPin<'_, '_, P> {
    pub fn pin(&self) -> Pin {
        self.pin
    }
}

impl<P: Platform> embedded_hal::pwm::ErrorType for PwmPin<'_, '_, P> {
    type Error = PwmError;
}

impl<P: Platform> embedded_hal::pwm::SetDutyCycle for PwmPin<'_, '_, P> {
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.hal
            .set_pwm_duty(self.pin, duty, u16::MAX, false)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::AnalogChannel;
    use crate::memory::FrameProbe;
    use crate::mock::{MockAdc, MockInterrupts, MockPlatform, MockSystem, MockTimers};
    use crate::pin::Port;
    use crate::pwm::TimerId;
    use crate::reset::ResetFlags;
    use crate::serial::{SerialPort, UartInstance};
    use embedded_hal::pwm::SetDutyCycle;

    fn parts(flags: ResetFlags) -> HalParts<MockPlatform> {
        HalParts {
            interrupts: MockInterrupts::new(true),
            adc: MockAdc::default(),
            timers: MockTimers::default(),
            system: MockSystem::with_flags(flags),
            memory: FrameProbe::new(0),
        }
    }

    fn power_on() -> ResetFlags {
        ResetFlags {
            power_on: true,
            pin: true,
            ..ResetFlags::default()
        }
    }

    #[test]
    fn test_init() {
        let state = AdcChannelState::new();
        let hal = Hal::init(&HalConfig::default(), &state, parts(power_on())).unwrap();

        assert_eq!(hal.adc().peripheral().resolution_calls, [12]);
        assert_eq!(
            hal.serial().primary().port,
            SerialPort::Uart(UartInstance::Uart1)
        );
        assert_eq!(hal.get_reset_source(), ResetCause::PowerOn);
        assert!(hal.critical().interrupts_enabled());
    }

    #[test]
    fn test_init_rejects_bad_selector() {
        let state = AdcChannelState::new();
        let mut config = HalConfig::default();
        config.serial.primary = 0;
        assert!(matches!(
            Hal::init(&config, &state, parts(power_on())),
            Err(ConfigError::Serial(_))
        ));
    }

    #[test]
    fn test_acquire_release() {
        let state = AdcChannelState::new();
        let hal = Hal::init(&HalConfig::default(), &state, parts(power_on())).unwrap();

        let outer = hal.acquire();
        assert!(!hal.critical().interrupts_enabled());
        let inner = hal.acquire();
        hal.release(inner);
        assert!(!hal.critical().interrupts_enabled());
        hal.release(outer);
        assert!(hal.critical().interrupts_enabled());
    }

    #[test]
    fn test_conversion_cycle() {
        let state = AdcChannelState::new();
        let mut hal = Hal::init(&HalConfig::default(), &state, parts(power_on())).unwrap();
        let pa0 = Pin::new(Port::A, 0);
        let pa1 = Pin::new(Port::A, 1);

        hal.start_conversion(pa0).unwrap();
        assert_eq!(hal.get_result(), 0, "prior value until completion");
        hal.start_conversion(pa1).unwrap();
        assert_eq!(hal.adc().selected_pin(), pa0);

        // conversion-complete interrupt
        state.on_conversion_complete(2048);

        assert_eq!(hal.get_result(), 2048);
        assert_eq!(hal.take_result(), Some(2048));
        assert_eq!(hal.take_result(), None);
        assert_eq!(
            hal.adc().peripheral().triggered,
            [AnalogChannel {
                pin: pa0,
                unit: crate::adc::AdcUnit::Adc1,
                channel: 0
            }]
        );

        hal.start_conversion(pa1).unwrap();
        assert_eq!(hal.adc().selected_pin(), pa1);
    }

    #[test]
    fn test_pwm_duty() {
        let state = AdcChannelState::new();
        let mut hal = Hal::init(&HalConfig::default(), &state, parts(power_on())).unwrap();
        let pa8 = Pin::new(Port::A, 8);

        let change = hal.set_pwm_frequency(pa8, 20_000).unwrap();
        assert_eq!(change.timer, TimerId::new(1));
        let max = hal.pwm().max_native(pa8).unwrap();

        assert_eq!(hal.set_pwm_duty(pa8, 0, 255, false), Ok(0));
        assert_eq!(hal.set_pwm_duty(pa8, 255, 255, false), Ok(max));
        assert_eq!(hal.set_pwm_value(pa8, 255), Ok(max));
        assert_eq!(hal.set_pwm_duty(pa8, 0, 255, true), Ok(max));
        assert_eq!(
            hal.pwm().timers().last_compare(TimerId::new(1), 1),
            Some(max)
        );
    }

    #[test]
    fn test_pwm_pin_adapter() {
        let state = AdcChannelState::new();
        let mut hal = Hal::init(&HalConfig::default(), &state, parts(power_on())).unwrap();
        let pb6 = Pin::new(Port::B, 6);

        let mut channel = hal.pwm_pin(pb6).unwrap();
        assert_eq!(channel.max_duty_cycle(), u16::MAX);
        channel.set_duty_cycle_fully_on().unwrap();
        let max = hal.pwm().max_native(pb6).unwrap();
        assert_eq!(hal.pwm().native_duty(pb6), Some(max));

        let mut channel = hal.pwm_pin(pb6).unwrap();
        channel.set_duty_cycle_fully_off().unwrap();
        assert_eq!(hal.pwm().native_duty(pb6), Some(0));

        assert!(matches!(
            hal.pwm_pin(Pin::new(Port::D, 3)),
            Err(PwmError::NoTimer(_))
        ));
    }

    #[test]
    fn test_reset_source_lifecycle() {
        let state = AdcChannelState::new();
        let flags = ResetFlags {
            software: true,
            pin: true,
            ..ResetFlags::default()
        };
        let mut hal = Hal::init(&HalConfig::default(), &state, parts(flags)).unwrap();

        assert_eq!(hal.get_reset_source(), ResetCause::Software);
        hal.clear_reset_source();
        assert_eq!(hal.get_reset_source(), ResetCause::Unknown);
        assert_eq!(hal.reboot(), RebootStatus::Unsupported);
    }

    #[test]
    fn test_free_memory() {
        let state = AdcChannelState::new();
        let hal = Hal::init(&HalConfig::default(), &state, parts(power_on())).unwrap();
        assert!(hal.free_memory() > 0);
    }
}
