//! ADC conversion management
//!
//! A single conversion channel shared between the main loop and the ADC
//! conversion-complete interrupt:
//!
//! - The main loop calls [`Adc::start_conversion`] and reads the latched
//!   result with [`Adc::get_result`].
//! - The interrupt handler calls [`AdcChannelState::on_conversion_complete`].
//!
//! The (result, ready, pending) triple lives in one 32-bit atomic word, so
//! a reader always sees a result together with the flags it was stored
//! with. Only plain loads and stores are used, which keeps this usable on
//! cores without compare-and-swap (thumbv6m).

use core::sync::atomic::{AtomicI16, AtomicU32, Ordering};

use crate::critical::{CriticalSection, InterruptControl};
use crate::pin::{Pin, Port};

/// Resolutions the converter can be configured for
pub const SUPPORTED_RESOLUTIONS: [u8; 4] = [6, 8, 10, 12];

/// Default sampling resolution in bits
pub const DEFAULT_RESOLUTION_BITS: u8 = 12;

/// Converter reference voltage in millivolts for 3.3 V boards
pub const DEFAULT_REFERENCE_MV: u32 = 3300;

const RESULT_MASK: u32 = 0xFFFF;
const READY: u32 = 1 << 16;
const PENDING: u32 = 1 << 17;

/// ADC converter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcUnit {
    Adc1,
    Adc3,
}

/// Analog-capable pin and the converter input it is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogChannel {
    /// Physical pin
    pub pin: Pin,
    /// Converter instance
    pub unit: AdcUnit,
    /// Input channel number on that converter
    pub channel: u8,
}

const fn analog(port: Port, index: u8, unit: AdcUnit, channel: u8) -> AnalogChannel {
    AnalogChannel {
        pin: Pin::new(port, index),
        unit,
        channel,
    }
}

/// Standard analog table (ADC1, inputs 0-15)
pub const STANDARD_ANALOG: &[AnalogChannel] = &[
    analog(Port::A, 0, AdcUnit::Adc1, 0),
    analog(Port::A, 1, AdcUnit::Adc1, 1),
    analog(Port::A, 2, AdcUnit::Adc1, 2),
    analog(Port::A, 3, AdcUnit::Adc1, 3),
    analog(Port::A, 4, AdcUnit::Adc1, 4),
    analog(Port::A, 5, AdcUnit::Adc1, 5),
    analog(Port::A, 6, AdcUnit::Adc1, 6),
    analog(Port::A, 7, AdcUnit::Adc1, 7),
    analog(Port::B, 0, AdcUnit::Adc1, 8),
    analog(Port::B, 1, AdcUnit::Adc1, 9),
    analog(Port::C, 0, AdcUnit::Adc1, 10),
    analog(Port::C, 1, AdcUnit::Adc1, 11),
    analog(Port::C, 2, AdcUnit::Adc1, 12),
    analog(Port::C, 3, AdcUnit::Adc1, 13),
    analog(Port::C, 4, AdcUnit::Adc1, 14),
    analog(Port::C, 5, AdcUnit::Adc1, 15),
];

/// Alternate analog table (ADC3, thermistors on port F)
pub const ALTERNATE_ANALOG: &[AnalogChannel] = &[
    analog(Port::A, 0, AdcUnit::Adc3, 0),
    analog(Port::A, 1, AdcUnit::Adc3, 1),
    analog(Port::A, 2, AdcUnit::Adc3, 2),
    analog(Port::A, 3, AdcUnit::Adc3, 3),
    analog(Port::F, 6, AdcUnit::Adc3, 4),
    analog(Port::F, 7, AdcUnit::Adc3, 5),
    analog(Port::F, 8, AdcUnit::Adc3, 6),
    analog(Port::F, 9, AdcUnit::Adc3, 7),
    analog(Port::F, 10, AdcUnit::Adc3, 8),
    analog(Port::F, 3, AdcUnit::Adc3, 9),
    analog(Port::C, 0, AdcUnit::Adc3, 10),
    analog(Port::C, 1, AdcUnit::Adc3, 11),
    analog(Port::C, 2, AdcUnit::Adc3, 12),
    analog(Port::C, 3, AdcUnit::Adc3, 13),
    analog(Port::F, 4, AdcUnit::Adc3, 14),
    analog(Port::F, 5, AdcUnit::Adc3, 15),
];

/// Which analog channel table the board uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogProfile {
    #[default]
    Standard,
    Alternate,
}

impl AnalogProfile {
    /// Get the channel table for this profile
    pub fn table(self) -> &'static [AnalogChannel] {
        match self {
            AnalogProfile::Standard => STANDARD_ANALOG,
            AnalogProfile::Alternate => ALTERNATE_ANALOG,
        }
    }
}

/// Errors from ADC operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// Pin is marked unconnected
    Unconnected,
    /// Pin has no analog input in the active profile
    NotAnalog(Pin),
    /// Resolution is not one of [`SUPPORTED_RESOLUTIONS`]
    UnsupportedResolution(u8),
    /// `init` has not run yet
    NotInitialized,
}

/// Converter hardware
///
/// Implementations start a single conversion and arrange for the
/// conversion-complete interrupt to call
/// [`AdcChannelState::on_conversion_complete`].
pub trait AdcPeripheral {
    /// Configure the sampling resolution in bits
    fn set_resolution(&mut self, bits: u8);

    /// Bits the data register latches when configured for `configured` bits
    ///
    /// Some clone silicon always latches 12 bits regardless of the
    /// configured resolution.
    fn latched_bits(&self, configured: u8) -> u8 {
        configured
    }

    /// Start sampling `channel`
    fn trigger(&mut self, channel: AnalogChannel);

    /// Reference voltage in millivolts; full scale reads this voltage
    fn reference_mv(&self) -> u32 {
        DEFAULT_REFERENCE_MV
    }
}

/// Shared ADC channel state
///
/// Lives for the whole program, usually in a `static` so the interrupt
/// handler can reach it. The interrupt handler is the only writer of the
/// (result, ready) pair; `start_conversion` only writes with interrupts
/// masked.
#[derive(Debug)]
pub struct AdcChannelState {
    pin: AtomicI16,
    slot: AtomicU32,
}

impl Default for AdcChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl AdcChannelState {
    /// Create an idle channel with a zero result
    pub const fn new() -> Self {
        Self {
            pin: AtomicI16::new(Pin::NC.raw()),
            slot: AtomicU32::new(0),
        }
    }

    /// Conversion-complete handler
    ///
    /// Call from the ADC interrupt with the raw data register value.
    /// Latches the sample, sets ready and clears pending in one store.
    pub fn on_conversion_complete(&self, sample: u16) {
        self.slot.store(u32::from(sample) | READY, Ordering::Release);
    }

    /// Last latched raw sample
    pub fn raw_result(&self) -> u16 {
        (self.slot.load(Ordering::Acquire) & RESULT_MASK) as u16
    }

    /// Check if the latest requested conversion has completed
    pub fn is_ready(&self) -> bool {
        self.slot.load(Ordering::Acquire) & READY != 0
    }

    /// Check if a conversion is in flight
    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire) & PENDING != 0
    }

    /// Pin of the most recently started conversion
    pub fn selected_pin(&self) -> Pin {
        Pin::from_raw(self.pin.load(Ordering::Acquire))
    }

    /// Record a new request; must run with interrupts masked
    fn begin(&self, pin: Pin) -> bool {
        let slot = self.slot.load(Ordering::Acquire);
        if slot & PENDING != 0 {
            return false;
        }
        self.pin.store(pin.raw(), Ordering::Release);
        self.slot
            .store((slot & RESULT_MASK) | PENDING, Ordering::Release);
        true
    }

    /// Take a ready result; must run with interrupts masked
    fn consume(&self) -> Option<u16> {
        let slot = self.slot.load(Ordering::Acquire);
        if slot & READY == 0 {
            return None;
        }
        self.slot.store(slot & !READY, Ordering::Release);
        Some((slot & RESULT_MASK) as u16)
    }
}

/// ADC subsystem
pub struct Adc<'s, A> {
    peripheral: A,
    state: &'s AdcChannelState,
    table: &'static [AnalogChannel],
    resolution_bits: u8,
    shift: u8,
    initialized: bool,
}

impl<'s, A: AdcPeripheral> Adc<'s, A> {
    /// Create the ADC subsystem
    ///
    /// Does not touch the hardware; call [`Adc::init`] before converting.
    pub fn new(
        peripheral: A,
        state: &'s AdcChannelState,
        profile: AnalogProfile,
        resolution_bits: u8,
    ) -> Result<Self, AdcError> {
        if !SUPPORTED_RESOLUTIONS.contains(&resolution_bits) {
            return Err(AdcError::UnsupportedResolution(resolution_bits));
        }
        Ok(Self {
            peripheral,
            state,
            table: profile.table(),
            resolution_bits,
            shift: 0,
            initialized: false,
        })
    }

    /// Configure the sampling resolution
    ///
    /// Runs once; later calls do nothing. Channel state is left untouched.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.peripheral.set_resolution(self.resolution_bits);
        let latched = self.peripheral.latched_bits(self.resolution_bits);
        self.shift = latched.saturating_sub(self.resolution_bits);
        self.initialized = true;
        debug!(
            "ADC initialized: {=u8}-bit ({=u8}-bit latched)",
            self.resolution_bits,
            latched
        );
    }

    /// Look up the analog input for a pin
    pub fn channel_for(&self, pin: Pin) -> Option<AnalogChannel> {
        self.table.iter().copied().find(|c| c.pin == pin)
    }

    /// Check if a pin can be sampled
    pub fn is_analog(&self, pin: Pin) -> bool {
        self.channel_for(pin).is_some()
    }

    /// Start a conversion on `pin`
    ///
    /// A request made while another conversion is pending is dropped
    /// without error; the channel keeps the first request's pin.
    pub fn start_conversion<I: InterruptControl>(
        &mut self,
        cs: &CriticalSection<I>,
        pin: Pin,
    ) -> Result<(), AdcError> {
        if !pin.is_connected() {
            return Err(AdcError::Unconnected);
        }
        if !self.initialized {
            return Err(AdcError::NotInitialized);
        }
        let channel = self.channel_for(pin).ok_or(AdcError::NotAnalog(pin))?;

        let state = self.state;
        let peripheral = &mut self.peripheral;
        let started = cs.with(|| {
            if !state.begin(pin) {
                return false;
            }
            peripheral.trigger(channel);
            true
        });

        if !started {
            trace!("ADC busy, request for {} ignored", pin);
        }
        Ok(())
    }

    /// Last latched result, scaled to the configured resolution
    ///
    /// Returns immediately, even if the newest request has not completed.
    pub fn get_result(&self) -> u16 {
        self.state.raw_result() >> self.shift
    }

    /// Take the result if a conversion has completed since the last take
    pub fn take_result<I: InterruptControl>(&self, cs: &CriticalSection<I>) -> Option<u16> {
        let state = self.state;
        cs.with(|| state.consume()).map(|raw| raw >> self.shift)
    }

    /// Check if the latest requested conversion has completed
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Check if a conversion is in flight
    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Pin of the most recently started conversion
    pub fn selected_pin(&self) -> Pin {
        self.state.selected_pin()
    }

    /// Configured resolution in bits
    pub fn resolution_bits(&self) -> u8 {
        self.resolution_bits
    }

    /// Largest value [`Adc::get_result`] can return
    pub fn max_value(&self) -> u16 {
        ((1u32 << self.resolution_bits) - 1) as u16
    }

    /// Convert a result at the configured resolution to millivolts
    pub fn to_millivolts(&self, raw: u16) -> u32 {
        let max = u64::from(self.max_value());
        let raw = u64::from(raw).min(max);
        ((raw * u64::from(self.peripheral.reference_mv()) + max / 2) / max) as u32
    }

    /// Get the underlying peripheral
    pub fn peripheral(&self) -> &A {
        &self.peripheral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAdc, MockInterrupts};

    const PA0: Pin = Pin::new(Port::A, 0);
    const PC3: Pin = Pin::new(Port::C, 3);
    const PF5: Pin = Pin::new(Port::F, 5);

    fn setup(state: &AdcChannelState) -> (Adc<'_, MockAdc>, CriticalSection<MockInterrupts>) {
        let mut adc = Adc::new(MockAdc::default(), state, AnalogProfile::Standard, 12).unwrap();
        adc.init();
        (adc, CriticalSection::new(MockInterrupts::new(true)))
    }

    #[test]
    fn test_conversion_completes() {
        let state = AdcChannelState::new();
        let (mut adc, cs) = setup(&state);

        adc.start_conversion(&cs, PA0).unwrap();
        assert!(adc.is_pending());
        assert!(!adc.is_ready());
        assert_eq!(adc.selected_pin(), PA0);
        assert_eq!(adc.peripheral().triggered.len(), 1);
        assert_eq!(adc.peripheral().triggered[0].channel, 0);

        state.on_conversion_complete(2048);
        assert!(adc.is_ready());
        assert!(!adc.is_pending());
        assert_eq!(adc.get_result(), 2048);

        // Interrupts restored after the critical section
        assert!(cs.interrupts_enabled());
    }

    #[test]
    fn test_stale_result_before_completion() {
        let state = AdcChannelState::new();
        let (mut adc, cs) = setup(&state);

        adc.start_conversion(&cs, PA0).unwrap();
        state.on_conversion_complete(100);

        adc.start_conversion(&cs, PC3).unwrap();
        assert!(!adc.is_ready());
        assert_eq!(adc.get_result(), 100, "prior value until the handler fires");

        state.on_conversion_complete(3000);
        assert_eq!(adc.get_result(), 3000);
    }

    #[test]
    fn test_busy_request_is_ignored() {
        let state = AdcChannelState::new();
        let (mut adc, cs) = setup(&state);

        adc.start_conversion(&cs, PA0).unwrap();
        assert_eq!(adc.start_conversion(&cs, PC3), Ok(()));

        assert_eq!(adc.selected_pin(), PA0);
        assert_eq!(adc.peripheral().triggered.len(), 1);

        state.on_conversion_complete(7);
        adc.start_conversion(&cs, PC3).unwrap();
        assert_eq!(adc.selected_pin(), PC3);
        assert_eq!(adc.peripheral().triggered.len(), 2);
    }

    #[test]
    fn test_take_result_once() {
        let state = AdcChannelState::new();
        let (mut adc, cs) = setup(&state);

        assert_eq!(adc.take_result(&cs), None);
        adc.start_conversion(&cs, PA0).unwrap();
        assert_eq!(adc.take_result(&cs), None);

        state.on_conversion_complete(1234);
        assert_eq!(adc.take_result(&cs), Some(1234));
        assert_eq!(adc.take_result(&cs), None);
        // Latched value stays readable
        assert_eq!(adc.get_result(), 1234);
    }

    #[test]
    fn test_rejects_non_analog_pins() {
        let state = AdcChannelState::new();
        let (mut adc, cs) = setup(&state);

        assert_eq!(adc.start_conversion(&cs, Pin::NC), Err(AdcError::Unconnected));
        assert_eq!(
            adc.start_conversion(&cs, PF5),
            Err(AdcError::NotAnalog(PF5))
        );
        assert!(!adc.is_pending());
        assert!(adc.peripheral().triggered.is_empty());
    }

    #[test]
    fn test_alternate_profile() {
        let state = AdcChannelState::new();
        let mut adc =
            Adc::new(MockAdc::default(), &state, AnalogProfile::Alternate, 12).unwrap();
        adc.init();
        let cs = CriticalSection::new(MockInterrupts::new(true));

        let channel = adc.channel_for(PF5).unwrap();
        assert_eq!(channel.unit, AdcUnit::Adc3);
        assert_eq!(channel.channel, 15);

        adc.start_conversion(&cs, PF5).unwrap();
        assert_eq!(adc.selected_pin(), PF5);
        assert!(!adc.is_analog(Pin::new(Port::A, 5)));
    }

    #[test]
    fn test_requires_init() {
        let state = AdcChannelState::new();
        let mut adc = Adc::new(MockAdc::default(), &state, AnalogProfile::Standard, 10).unwrap();
        let cs = CriticalSection::new(MockInterrupts::new(true));

        assert_eq!(
            adc.start_conversion(&cs, PA0),
            Err(AdcError::NotInitialized)
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        let state = AdcChannelState::new();
        state.on_conversion_complete(55);

        let mut adc = Adc::new(MockAdc::default(), &state, AnalogProfile::Standard, 10).unwrap();
        adc.init();
        adc.init();

        assert_eq!(adc.peripheral().resolution_calls, [10]);
        assert_eq!(adc.get_result(), 55, "init must not reset channel state");
        assert_eq!(adc.max_value(), 1023);
    }

    #[test]
    fn test_unsupported_resolution() {
        let state = AdcChannelState::new();
        assert!(matches!(
            Adc::new(MockAdc::default(), &state, AnalogProfile::Standard, 11),
            Err(AdcError::UnsupportedResolution(11))
        ));
    }

    #[test]
    fn test_wide_latch_is_scaled() {
        let state = AdcChannelState::new();
        let mut adc = Adc::new(
            MockAdc::latching(12),
            &state,
            AnalogProfile::Standard,
            10,
        )
        .unwrap();
        adc.init();

        state.on_conversion_complete(4095);
        assert_eq!(adc.get_result(), 1023);
    }

    #[test]
    fn test_millivolts() {
        let state = AdcChannelState::new();
        let (adc, _cs) = setup(&state);

        assert_eq!(adc.to_millivolts(0), 0);
        assert_eq!(adc.to_millivolts(4095), DEFAULT_REFERENCE_MV);
        assert_eq!(adc.to_millivolts(2048), 1650);
        assert_eq!(adc.to_millivolts(u16::MAX), DEFAULT_REFERENCE_MV, "clamped to full scale");
    }
}
