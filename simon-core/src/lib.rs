#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # Simon Core
//!
//! Game logic for a Simon Says controller played over a serial line.
//! Contains the session state machine, the idle/sleep supervisor driven by a
//! periodic timer interrupt, and the command dispatcher that ties both to the
//! board's serial port, LEDs and noise source.

#[macro_use]
mod log;

pub mod types;
pub mod hal;
pub mod random;
pub mod console;
pub mod line;
pub mod fsm;
pub mod supervisor;
pub mod controller;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;


pub use types::*;
pub use fsm::*;
pub use supervisor::*;
pub use controller::*;
pub use hal::{*, Duration};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration for the stock board: 30 symbols, WASD keys
pub fn default_config() -> GameConfig {
    GameConfig {
        max_sequence: MAX_SEQUENCE,
        keys: ['W', 'A', 'S', 'D'],
        match_policy: MatchPolicy::Prefix,
        symbol_display: Duration::from_millis(450),
        sleep_grace: Duration::from_millis(1000),
        wake_settle: Duration::from_millis(500),
        self_test: true,
    }
}
