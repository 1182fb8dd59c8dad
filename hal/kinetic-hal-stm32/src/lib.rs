//! STM32F4 platform hooks for the Kinetic HAL
//!
//! Implements the `kinetic-hal` platform traits that are chip-wide rather
//! than board-wide:
//!
//! - [`PrimaskInterrupts`] - Critical sections via PRIMASK
//! - [`RccSystem`] - Reset flags from `RCC_CSR`, reboot via `SYSRESETREQ`
//! - [`CortexMMemory`] - Main stack pointer vs. end of static RAM
//! - [`serial::usart_config`] - Line settings for embassy's USART driver
//!
//! ADC and timer hooks depend on board wiring and live in the board
//! firmware; [`Stm32`] combines them with the hooks above.
//!
//! # Features
//!
//! - `stm32f407vg`, `stm32f446re` - Select the chip
//! - `defmt` - Enable debug formatting support
//!
//! # Usage
//!
//! ```ignore
//! static ADC_STATE: AdcChannelState = AdcChannelState::new();
//!
//! #[interrupt]
//! fn ADC() {
//!     let sample = pac::ADC1.dr().read().data();
//!     ADC_STATE.on_conversion_complete(sample);
//! }
//!
//! type Board = Stm32<BoardAdc, BoardTimers>;
//! let parts = HalParts::<Board> {
//!     interrupts: PrimaskInterrupts,
//!     adc: BoardAdc::new(),
//!     timers: BoardTimers::new(),
//!     system: RccSystem,
//!     memory: CortexMMemory::from_linker(),
//! };
//! let hal = Hal::init(&config, &ADC_STATE, parts)?;
//! ```

#![no_std]

use core::marker::PhantomData;

use kinetic_hal::adc::AdcPeripheral;
use kinetic_hal::hal::Platform;
use kinetic_hal::pwm::PwmTimers;

pub mod interrupt;
pub mod memory;
pub mod serial;
pub mod system;

pub use interrupt::PrimaskInterrupts;
pub use memory::CortexMMemory;
pub use system::RccSystem;

/// STM32F4 platform with board-supplied ADC and timer hooks
pub struct Stm32<A, T>(PhantomData<(A, T)>);

impl<A: AdcPeripheral, T: PwmTimers> Platform for Stm32<A, T> {
    type Interrupts = PrimaskInterrupts;
    type Adc = A;
    type Timers = T;
    type System = RccSystem;
    type Memory = CortexMMemory;
}
