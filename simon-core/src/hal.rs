//! Hardware Abstraction Layer for the Simon Says board

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use crate::types::{Symbol, NUM_SYMBOLS};

/// Millisecond duration used for display and power timings
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Duration(u64);

impl Duration {
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Clamp to the `u32` range accepted by `DelayNs::delay_ms`
    pub fn as_delay_ms(&self) -> u32 {
        u32::try_from(self.0).unwrap_or(u32::MAX)
    }
}

impl core::ops::Mul<u32> for Duration {
    type Output = Duration;

    fn mul(self, rhs: u32) -> Duration {
        Duration(self.0 * rhs as u64)
    }
}

impl core::ops::Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// Serial transmit or receive failed
    SerialError,
    /// Interrupt configuration failed, or no interrupt source is left
    InterruptError,
    /// Random source kept returning draws outside 1..=4
    RandomError,
    /// Session rejected a transition the controller had checked
    StateError,
}

#[cfg(any(test, feature = "std"))]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::SerialError => write!(f, "Serial operation failed"),
            HalError::InterruptError => write!(f, "Interrupt configuration failed"),
            HalError::RandomError => write!(f, "Random source out of range"),
            HalError::StateError => write!(f, "Session state out of sync"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for HalError {}

/// Byte-level serial link (UART)
pub trait SerialLink {
    /// Non-blocking read; `Ok(None)` when no byte is waiting
    fn read_byte(&mut self) -> Result<Option<u8>, HalError>;

    /// Blocking write of one byte
    fn write_byte(&mut self, byte: u8) -> Result<(), HalError>;

    /// Write a byte slice
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Drop everything currently buffered on the receive side
    fn discard_input(&mut self) -> Result<usize, HalError> {
        let mut dropped = 0;
        while self.read_byte()?.is_some() {
            dropped += 1;
        }
        Ok(dropped)
    }
}

/// One indicator (LED) per symbol, fire-and-forget
pub trait IndicatorBank {
    /// Light the indicator bound to `symbol`
    fn activate(&mut self, symbol: Symbol);

    /// Turn off the indicator bound to `symbol`
    fn deactivate(&mut self, symbol: Symbol);

    /// Turn every indicator off
    fn all_off(&mut self) {
        for symbol in Symbol::ALL {
            self.deactivate(symbol);
        }
    }
}

/// Source of game draws
pub trait RandomSource {
    /// Next draw in `1..=4`
    fn next_draw(&mut self) -> u8;
}

/// Raw analog noise sample used to seed the random source
pub trait NoiseSource {
    /// One conversion result; only the low bits carry useful entropy
    fn sample(&mut self) -> u16;
}

/// Power management: wake arming, core suspension and the hardware watchdog
pub trait PowerControl {
    /// Enable the receive-data interrupt as wake trigger
    fn arm_wake(&mut self) -> Result<(), HalError>;

    /// Disable the receive-data wake trigger
    fn disarm_wake(&mut self) -> Result<(), HalError>;

    /// Suspend the core until the next interrupt
    fn wait_for_interrupt(&mut self) -> Result<(), HalError>;

    /// Restart the hardware watchdog countdown
    fn feed_watchdog(&mut self) {}
}

/// Complete board interface
pub trait SimonHal {
    type Serial: SerialLink;
    type Indicators: IndicatorBank;
    type Random: RandomSource;
    type Delay: DelayNs;
    type Power: PowerControl;

    /// Initialize hardware
    fn initialize(&mut self) -> Result<(), HalError>;

    /// Access to the serial link
    fn serial(&mut self) -> &mut Self::Serial;

    /// Access to the LEDs
    fn indicators(&mut self) -> &mut Self::Indicators;

    /// Access to the random source
    fn random(&mut self) -> &mut Self::Random;

    /// Access to the blocking delay provider
    fn delay(&mut self) -> &mut Self::Delay;

    /// Access to power management
    fn power(&mut self) -> &mut Self::Power;
}

/// Indicator bank over four embedded-hal output pins, active high
pub struct PinIndicators<P> {
    pins: [P; NUM_SYMBOLS],
}

impl<P> PinIndicators<P>
where
    P: OutputPin,
{
    pub fn new(pins: [P; NUM_SYMBOLS]) -> Self {
        Self { pins }
    }

    /// Release the pins
    pub fn into_pins(self) -> [P; NUM_SYMBOLS] {
        self.pins
    }
}

impl<P> IndicatorBank for PinIndicators<P>
where
    P: OutputPin,
{
    fn activate(&mut self, symbol: Symbol) {
        self.pins[symbol.index()].set_high().ok();
    }

    fn deactivate(&mut self, symbol: Symbol) {
        self.pins[symbol.index()].set_low().ok();
    }
}
