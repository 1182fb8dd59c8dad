//! PWM output on shared hardware timers
//!
//! Every PWM-capable pin is driven by one channel of a hardware timer, and
//! all channels of a timer share its frequency. Changing the frequency for
//! one pin therefore changes it for every pin on that timer; the last
//! writer wins. [`Pwm::set_frequency`] reports which other pins were
//! affected so callers can notice the coupling.
//!
//! Duty values are given on a caller-chosen scale `[0, resolution]` and
//! mapped to the timer's native compare range `[0, period]`:
//!
//! ```text
//! native = round((invert ? resolution - value : value) * period / resolution)
//! ```

use core::fmt;

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::critical::{CriticalSection, InterruptControl};
use crate::pin::{Pin, Port};

/// Frequency used when a timer is first driven by a duty update
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 1000;

/// Duty scale used when the caller does not choose one
pub const DEFAULT_DUTY_RESOLUTION: u16 = 255;

/// Maximum pins with stored PWM configuration, one per table entry
pub const MAX_PWM_CHANNELS: usize = PWM_OUTPUTS.len();

/// Maximum timers running PWM at once; covers every timer in the table
pub const MAX_ACTIVE_TIMERS: usize = 8;

/// Maximum reserved timers
pub const MAX_RESERVED_TIMERS: usize = 4;

/// Largest prescaler a 16-bit prescaler register can express
const MAX_PRESCALER: u64 = 1 << 16;

/// Hardware timer number (TIM1 = 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimerId(u8);

impl TimerId {
    /// Create a timer id
    pub const fn new(number: u8) -> Self {
        TimerId(number)
    }

    /// Timer number
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TIM{}", self.0)
    }
}

/// Timers driving the stepper and temperature interrupts
pub const DEFAULT_RESERVED_TIMERS: [TimerId; 2] = [TimerId(6), TimerId(14)];

/// PWM-capable pin and the timer channel behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmOutput {
    pub pin: Pin,
    pub timer: TimerId,
    /// Capture/compare channel (1-4)
    pub channel: u8,
}

const fn out(port: Port, index: u8, timer: u8, channel: u8) -> PwmOutput {
    PwmOutput {
        pin: Pin::new(port, index),
        timer: TimerId(timer),
        channel,
    }
}

/// Pin to timer channel map
pub const PWM_OUTPUTS: &[PwmOutput] = &[
    out(Port::A, 0, 2, 1),
    out(Port::A, 1, 2, 2),
    out(Port::A, 2, 2, 3),
    out(Port::A, 3, 2, 4),
    out(Port::A, 6, 3, 1),
    out(Port::A, 7, 3, 2),
    out(Port::B, 0, 3, 3),
    out(Port::B, 1, 3, 4),
    out(Port::A, 8, 1, 1),
    out(Port::A, 9, 1, 2),
    out(Port::A, 10, 1, 3),
    out(Port::A, 11, 1, 4),
    out(Port::B, 6, 4, 1),
    out(Port::B, 7, 4, 2),
    out(Port::B, 8, 4, 3),
    out(Port::B, 9, 4, 4),
    out(Port::C, 6, 8, 1),
    out(Port::C, 7, 8, 2),
    out(Port::C, 8, 8, 3),
    out(Port::C, 9, 8, 4),
    out(Port::E, 5, 9, 1),
    out(Port::E, 6, 9, 2),
    out(Port::B, 14, 12, 1),
    out(Port::B, 15, 12, 2),
];

/// Errors from PWM operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmError {
    /// Pin has no timer channel
    NoTimer(Pin),
    /// Pin's timer is reserved for a system interrupt
    ReservedTimer { pin: Pin, timer: TimerId },
    /// Frequency is zero or out of the timer's range
    InvalidFrequency(u32),
    /// Duty resolution of zero
    ZeroResolution,
    /// No room to track another pin or timer
    TooManyChannels,
}

impl embedded_hal::pwm::Error for PwmError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

/// Look up the timer channel for a pin, honoring reserved timers
pub fn resolve_output(pin: Pin, reserved: &[TimerId]) -> Result<PwmOutput, PwmError> {
    let output = PWM_OUTPUTS
        .iter()
        .copied()
        .find(|o| o.pin == pin)
        .ok_or(PwmError::NoTimer(pin))?;
    if reserved.contains(&output.timer) {
        return Err(PwmError::ReservedTimer {
            pin,
            timer: output.timer,
        });
    }
    Ok(output)
}

/// Prescaler and period for one timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerSettings {
    /// Input clock divider (1 = undivided)
    pub prescaler: u32,
    /// Counter ticks per PWM cycle; also the native full-duty compare value
    pub period: u32,
}

impl TimerSettings {
    /// Compute settings for `hz` on a timer clocked at `clock_hz`
    ///
    /// Uses the smallest prescaler that fits the period into the counter,
    /// which keeps duty resolution as fine as possible.
    pub fn for_frequency(clock_hz: u32, hz: u32, counter_bits: u8) -> Result<Self, PwmError> {
        if hz == 0 || hz > clock_hz {
            return Err(PwmError::InvalidFrequency(hz));
        }
        let ticks = u64::from(clock_hz / hz);
        let counter_range = 1u64 << counter_bits.min(32);
        let prescaler = ticks / counter_range + 1;
        if prescaler > MAX_PRESCALER {
            return Err(PwmError::InvalidFrequency(hz));
        }
        Ok(Self {
            prescaler: prescaler as u32,
            period: (ticks / prescaler) as u32,
        })
    }

    /// Actual output frequency for these settings
    pub fn frequency(&self, clock_hz: u32) -> u32 {
        let divisor = u64::from(self.prescaler) * u64::from(self.period);
        if divisor == 0 {
            return 0;
        }
        (u64::from(clock_hz) / divisor) as u32
    }
}

/// Map a duty value onto the native compare range
///
/// `value` is clamped to `[0, resolution]`. `resolution` must be non-zero.
pub fn native_duty(value: u16, resolution: u16, invert: bool, max_native: u32) -> u32 {
    let resolution = u64::from(resolution.max(1));
    let value = u64::from(value).min(resolution);
    let value = if invert { resolution - value } else { value };
    ((value * u64::from(max_native) + resolution / 2) / resolution) as u32
}

/// Stored configuration for one PWM pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmChannelConfig {
    pub pin: Pin,
    pub timer: TimerId,
    pub channel: u8,
    /// Frequency of the timer this pin runs on
    pub frequency_hz: u32,
    /// Duty value, already clamped to `resolution`
    pub value: u16,
    pub resolution: u16,
    pub invert: bool,
}

impl PwmChannelConfig {
    fn new(output: PwmOutput, frequency_hz: u32) -> Self {
        Self {
            pin: output.pin,
            timer: output.timer,
            channel: output.channel,
            frequency_hz,
            value: 0,
            resolution: DEFAULT_DUTY_RESOLUTION,
            invert: false,
        }
    }

    /// Compare value for a timer period
    pub fn native_duty(&self, max_native: u32) -> u32 {
        native_duty(self.value, self.resolution, self.invert, max_native)
    }
}

/// Result of a frequency change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyChange {
    pub timer: TimerId,
    /// Frequency before the change, if the timer was running
    pub previous_hz: Option<u32>,
    pub frequency_hz: u32,
    /// Other configured pins on the same timer
    pub shared_with: Vec<Pin, MAX_PWM_CHANNELS>,
}

impl FrequencyChange {
    /// Check if the change altered another pin's frequency
    pub fn is_conflict(&self) -> bool {
        !self.shared_with.is_empty() && self.previous_hz != Some(self.frequency_hz)
    }
}

/// PWM timer hardware
pub trait PwmTimers {
    /// Input clock of `timer` in Hz
    fn clock_hz(&self, timer: TimerId) -> u32;

    /// Counter width of `timer` (16 or 32)
    fn counter_bits(&self, timer: TimerId) -> u8;

    /// Program prescaler and period, and start the timer in PWM mode
    fn configure(&mut self, timer: TimerId, settings: TimerSettings);

    /// Set the compare value of one channel
    fn set_compare(&mut self, timer: TimerId, channel: u8, value: u32);
}

#[derive(Debug, Clone, Copy)]
struct ActiveTimer {
    timer: TimerId,
    frequency_hz: u32,
    settings: TimerSettings,
}

/// PWM subsystem
pub struct Pwm<T> {
    timers: T,
    reserved: Vec<TimerId, MAX_RESERVED_TIMERS>,
    channels: Vec<PwmChannelConfig, MAX_PWM_CHANNELS>,
    active: Vec<ActiveTimer, MAX_ACTIVE_TIMERS>,
}

impl<T: PwmTimers> Pwm<T> {
    /// Create the PWM subsystem
    pub fn new(timers: T, reserved: Vec<TimerId, MAX_RESERVED_TIMERS>) -> Self {
        Self {
            timers,
            reserved,
            channels: Vec::new(),
            active: Vec::new(),
        }
    }

    /// Set the frequency of the timer behind `pin`
    ///
    /// Applies to every pin on that timer. Stored duty values on the timer
    /// are re-applied so their duty fraction is preserved.
    pub fn set_frequency<I: InterruptControl>(
        &mut self,
        cs: &CriticalSection<I>,
        pin: Pin,
        hz: u32,
    ) -> Result<FrequencyChange, PwmError> {
        let output = resolve_output(pin, &self.reserved)?;
        let timer = output.timer;
        let settings = TimerSettings::for_frequency(
            self.timers.clock_hz(timer),
            hz,
            self.timers.counter_bits(timer),
        )?;
        self.ensure_capacity(output)?;

        let previous_hz = self.active_timer(timer).map(|a| a.frequency_hz);
        self.store_timer(timer, hz, settings)?;
        self.store_channel(output, hz)?;

        let mut shared_with = Vec::new();
        for config in self.channels.iter_mut().filter(|c| c.timer == timer) {
            config.frequency_hz = hz;
            if config.pin != pin {
                // Capacity matches `channels`, cannot overflow
                let _ = shared_with.push(config.pin);
            }
        }

        let timers = &mut self.timers;
        let channels = &self.channels;
        cs.with(|| {
            timers.configure(timer, settings);
            for config in channels.iter().filter(|c| c.timer == timer) {
                timers.set_compare(timer, config.channel, config.native_duty(settings.period));
            }
        });

        let change = FrequencyChange {
            timer,
            previous_hz,
            frequency_hz: hz,
            shared_with,
        };
        if change.is_conflict() {
            warn!(
                "{} now {=u32} Hz, also drives {=usize} other pin(s)",
                timer,
                hz,
                change.shared_with.len()
            );
        } else {
            debug!("{} set to {=u32} Hz for {}", timer, hz, pin);
        }
        Ok(change)
    }

    /// Set the duty of `pin` on a `[0, resolution]` scale
    ///
    /// Out-of-range values are clamped. A timer not yet running starts at
    /// [`DEFAULT_PWM_FREQUENCY_HZ`]. Returns the native compare value.
    pub fn set_duty<I: InterruptControl>(
        &mut self,
        cs: &CriticalSection<I>,
        pin: Pin,
        value: u16,
        resolution: u16,
        invert: bool,
    ) -> Result<u32, PwmError> {
        if resolution == 0 {
            return Err(PwmError::ZeroResolution);
        }
        let output = resolve_output(pin, &self.reserved)?;
        let timer = output.timer;

        let (frequency_hz, settings, fresh) = match self.active_timer(timer) {
            Some(active) => (active.frequency_hz, active.settings, false),
            None => {
                let settings = TimerSettings::for_frequency(
                    self.timers.clock_hz(timer),
                    DEFAULT_PWM_FREQUENCY_HZ,
                    self.timers.counter_bits(timer),
                )?;
                (DEFAULT_PWM_FREQUENCY_HZ, settings, true)
            }
        };
        self.ensure_capacity(output)?;
        if fresh {
            self.store_timer(timer, frequency_hz, settings)?;
        }
        let index = self.store_channel(output, frequency_hz)?;

        let config = &mut self.channels[index];
        config.value = value.min(resolution);
        config.resolution = resolution;
        config.invert = invert;
        let native = config.native_duty(settings.period);

        let timers = &mut self.timers;
        cs.with(|| {
            if fresh {
                timers.configure(timer, settings);
            }
            timers.set_compare(timer, output.channel, native);
        });

        trace!("{} duty {=u32}/{=u32}", pin, native, settings.period);
        Ok(native)
    }

    /// Timer driving `pin`, if any
    pub fn timer_of(&self, pin: Pin) -> Option<TimerId> {
        PWM_OUTPUTS
            .iter()
            .find(|o| o.pin == pin)
            .map(|o| o.timer)
    }

    /// Configured pins running on `timer`
    pub fn pins_on_timer(&self, timer: TimerId) -> impl Iterator<Item = Pin> + '_ {
        self.channels
            .iter()
            .filter(move |c| c.timer == timer)
            .map(|c| c.pin)
    }

    /// Stored configuration for `pin`
    pub fn channel(&self, pin: Pin) -> Option<&PwmChannelConfig> {
        self.channels.iter().find(|c| c.pin == pin)
    }

    /// Current native compare value for `pin`
    pub fn native_duty(&self, pin: Pin) -> Option<u32> {
        let config = self.channel(pin)?;
        let active = self.active_timer(config.timer)?;
        Some(config.native_duty(active.settings.period))
    }

    /// Native full-duty value for `pin`'s timer
    pub fn max_native(&self, pin: Pin) -> Option<u32> {
        let config = self.channel(pin)?;
        self.active_timer(config.timer).map(|a| a.settings.period)
    }

    /// Current frequency of `timer`
    pub fn frequency(&self, timer: TimerId) -> Option<u32> {
        self.active_timer(timer).map(|a| a.frequency_hz)
    }

    /// Check if `timer` is reserved
    pub fn is_reserved(&self, timer: TimerId) -> bool {
        self.reserved.contains(&timer)
    }

    /// Get the underlying timer hardware
    pub fn timers(&self) -> &T {
        &self.timers
    }

    fn active_timer(&self, timer: TimerId) -> Option<&ActiveTimer> {
        self.active.iter().find(|a| a.timer == timer)
    }

    /// Fail before mutating anything if a new pin or timer will not fit
    fn ensure_capacity(&self, output: PwmOutput) -> Result<(), PwmError> {
        let new_timer = self.active_timer(output.timer).is_none();
        let new_channel = self.channel(output.pin).is_none();
        if (new_timer && self.active.is_full()) || (new_channel && self.channels.is_full()) {
            return Err(PwmError::TooManyChannels);
        }
        Ok(())
    }

    fn store_timer(
        &mut self,
        timer: TimerId,
        frequency_hz: u32,
        settings: TimerSettings,
    ) -> Result<(), PwmError> {
        let entry = ActiveTimer {
            timer,
            frequency_hz,
            settings,
        };
        match self.active.iter_mut().find(|a| a.timer == timer) {
            Some(active) => *active = entry,
            None => self
                .active
                .push(entry)
                .map_err(|_| PwmError::TooManyChannels)?,
        }
        Ok(())
    }

    fn store_channel(&mut self, output: PwmOutput, frequency_hz: u32) -> Result<usize, PwmError> {
        if let Some(index) = self.channels.iter().position(|c| c.pin == output.pin) {
            return Ok(index);
        }
        self.channels
            .push(PwmChannelConfig::new(output, frequency_hz))
            .map_err(|_| PwmError::TooManyChannels)?;
        Ok(self.channels.len() - 1)
    }
}
