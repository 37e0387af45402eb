//! Test utilities for the game core: a scripted mock board
//!
//! The board's serial receive side and its interrupt source share one
//! [`script::Bus`]. Every `wait_for_interrupt` call delivers the next scripted
//! stimulus: one supervisor tick, or a burst of received bytes (which wakes
//! the supervisor if the wake trigger is armed). An exhausted script makes
//! `wait_for_interrupt` fail with [`HalError::InterruptError`], which is how
//! [`scenarios::drive`] knows a scenario is over.

use crate::hal::HalError;

pub mod script {
    //! Stimulus script shared by the mock serial port and power controller

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// One interrupt-level event
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Stimulus {
        /// `n` timer ticks, delivered one per wait
        Ticks(u32),
        /// Bytes arriving on the serial line
        Input(String),
    }

    /// Shared state behind the mock serial link and power controller
    #[derive(Debug, Default)]
    pub struct Bus {
        pub rx: VecDeque<u8>,
        pub tx: Vec<u8>,
        pub script: VecDeque<Stimulus>,
        pub wake_armed: bool,
        pub wake_arms: usize,
        pub ticks_delivered: u32,
        pub watchdog_feeds: usize,
    }

    pub type SharedBus = Rc<RefCell<Bus>>;

    pub fn shared() -> SharedBus {
        Rc::new(RefCell::new(Bus::default()))
    }
}

pub mod mocks {
    //! Mock implementations of the board traits

    use std::collections::VecDeque;

    use embedded_hal::delay::DelayNs;

    use super::script::{self, SharedBus, Stimulus};
    use crate::hal::{HalError, IndicatorBank, PowerControl, RandomSource, SerialLink, SimonHal};
    use crate::supervisor::IdleSupervisor;
    use crate::types::{Symbol, NUM_SYMBOLS};

    /// Serial link reading from the scripted bus and capturing writes
    pub struct MockSerial {
        bus: SharedBus,
    }

    impl MockSerial {
        pub fn new(bus: SharedBus) -> Self {
            Self { bus }
        }

        /// Serial link with its own bus, for tests without a board
        pub fn standalone() -> Self {
            Self::new(script::shared())
        }

        /// Queue bytes as if already received
        pub fn push_input(&self, text: &str) {
            self.bus.borrow_mut().rx.extend(text.bytes());
        }

        /// Everything written so far
        pub fn output(&self) -> String {
            String::from_utf8_lossy(&self.bus.borrow().tx).into_owned()
        }

        pub fn clear_output(&self) {
            self.bus.borrow_mut().tx.clear();
        }
    }

    impl SerialLink for MockSerial {
        fn read_byte(&mut self) -> Result<Option<u8>, HalError> {
            Ok(self.bus.borrow_mut().rx.pop_front())
        }

        fn write_byte(&mut self, byte: u8) -> Result<(), HalError> {
            self.bus.borrow_mut().tx.push(byte);
            Ok(())
        }
    }

    /// Power controller that delivers scripted interrupts
    pub struct MockPower<'a> {
        bus: SharedBus,
        supervisor: &'a IdleSupervisor,
    }

    impl<'a> MockPower<'a> {
        pub fn new(bus: SharedBus, supervisor: &'a IdleSupervisor) -> Self {
            Self { bus, supervisor }
        }

        pub fn wake_armed(&self) -> bool {
            self.bus.borrow().wake_armed
        }

        /// How many times the wake trigger was armed
        pub fn wake_arms(&self) -> usize {
            self.bus.borrow().wake_arms
        }

        pub fn ticks_delivered(&self) -> u32 {
            self.bus.borrow().ticks_delivered
        }

        pub fn watchdog_feeds(&self) -> usize {
            self.bus.borrow().watchdog_feeds
        }

        /// Stimuli not yet delivered
        pub fn remaining(&self) -> usize {
            self.bus.borrow().script.len()
        }
    }

    impl PowerControl for MockPower<'_> {
        fn arm_wake(&mut self) -> Result<(), HalError> {
            let mut bus = self.bus.borrow_mut();
            bus.wake_armed = true;
            bus.wake_arms += 1;
            // a byte already waiting raises the receive interrupt at once
            if !bus.rx.is_empty() {
                self.supervisor.on_wake();
            }
            Ok(())
        }

        fn disarm_wake(&mut self) -> Result<(), HalError> {
            self.bus.borrow_mut().wake_armed = false;
            Ok(())
        }

        fn wait_for_interrupt(&mut self) -> Result<(), HalError> {
            let mut bus = self.bus.borrow_mut();
            match bus.script.pop_front() {
                Some(Stimulus::Ticks(n)) => {
                    if n > 1 {
                        bus.script.push_front(Stimulus::Ticks(n - 1));
                    }
                    if n > 0 {
                        bus.ticks_delivered += 1;
                        self.supervisor.on_tick();
                    }
                    Ok(())
                }
                Some(Stimulus::Input(text)) => {
                    bus.rx.extend(text.bytes());
                    if bus.wake_armed {
                        self.supervisor.on_wake();
                    }
                    Ok(())
                }
                None => Err(HalError::InterruptError),
            }
        }

        fn feed_watchdog(&mut self) {
            self.bus.borrow_mut().watchdog_feeds += 1;
        }
    }

    /// LED change recorded by [`MockIndicators`]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum IndicatorEvent {
        On(Symbol),
        Off(Symbol),
    }

    /// Indicator bank recording every change
    #[derive(Debug, Default)]
    pub struct MockIndicators {
        lit: [bool; NUM_SYMBOLS],
        events: Vec<IndicatorEvent>,
    }

    impl MockIndicators {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn lit(&self) -> [bool; NUM_SYMBOLS] {
            self.lit
        }

        pub fn events(&self) -> &[IndicatorEvent] {
            &self.events
        }

        /// Times `symbol` was switched on
        pub fn activations(&self, symbol: Symbol) -> usize {
            self.events.iter().filter(|e| **e == IndicatorEvent::On(symbol)).count()
        }

        /// Symbols in the order they were switched on
        pub fn flashed(&self) -> Vec<Symbol> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    IndicatorEvent::On(symbol) => Some(*symbol),
                    IndicatorEvent::Off(_) => None,
                })
                .collect()
        }

        pub fn clear(&mut self) {
            self.events.clear();
        }
    }

    impl IndicatorBank for MockIndicators {
        fn activate(&mut self, symbol: Symbol) {
            self.lit[symbol.index()] = true;
            self.events.push(IndicatorEvent::On(symbol));
        }

        fn deactivate(&mut self, symbol: Symbol) {
            self.lit[symbol.index()] = false;
            self.events.push(IndicatorEvent::Off(symbol));
        }
    }

    /// Random source returning a fixed list of draws, then `1` forever
    #[derive(Debug, Default)]
    pub struct ScriptedRandom {
        draws: VecDeque<u8>,
    }

    impl ScriptedRandom {
        pub fn new(draws: &[u8]) -> Self {
            Self { draws: draws.iter().copied().collect() }
        }

        pub fn push(&mut self, draw: u8) {
            self.draws.push_back(draw);
        }

        pub fn remaining(&self) -> usize {
            self.draws.len()
        }
    }

    impl RandomSource for ScriptedRandom {
        fn next_draw(&mut self) -> u8 {
            self.draws.pop_front().unwrap_or(1)
        }
    }

    /// Delay that returns at once and accumulates the requested time
    #[derive(Debug, Default)]
    pub struct MockDelay {
        elapsed_ns: u64,
        calls: usize,
    }

    impl MockDelay {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn elapsed_ms(&self) -> u64 {
            self.elapsed_ns / 1_000_000
        }

        pub fn calls(&self) -> usize {
            self.calls
        }
    }

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.elapsed_ns += ns as u64;
            self.calls += 1;
        }

        fn delay_us(&mut self, us: u32) {
            self.elapsed_ns += us as u64 * 1_000;
            self.calls += 1;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.elapsed_ns += ms as u64 * 1_000_000;
            self.calls += 1;
        }
    }

    /// Complete mock board
    pub struct MockSimonHal<'a> {
        pub serial: MockSerial,
        pub indicators: MockIndicators,
        pub random: ScriptedRandom,
        pub delay: MockDelay,
        pub power: MockPower<'a>,
        bus: SharedBus,
        initialized: bool,
    }

    impl<'a> MockSimonHal<'a> {
        pub fn new(supervisor: &'a IdleSupervisor) -> Self {
            let bus = script::shared();
            Self {
                serial: MockSerial::new(bus.clone()),
                indicators: MockIndicators::new(),
                random: ScriptedRandom::default(),
                delay: MockDelay::new(),
                power: MockPower::new(bus.clone(), supervisor),
                bus,
                initialized: false,
            }
        }

        /// Queue random draws
        pub fn draws(mut self, draws: &[u8]) -> Self {
            for &draw in draws {
                self.random.push(draw);
            }
            self
        }

        /// Script a typed line, terminated with `\r`
        pub fn input(self, line: &str) -> Self {
            self.stimulus(Stimulus::Input(format!("{}\r", line)))
        }

        /// Script raw received bytes
        pub fn raw(self, bytes: &str) -> Self {
            self.stimulus(Stimulus::Input(bytes.to_string()))
        }

        /// Script `n` one-second ticks
        pub fn ticks(self, n: u32) -> Self {
            self.stimulus(Stimulus::Ticks(n))
        }

        pub fn stimulus(self, stimulus: Stimulus) -> Self {
            self.bus.borrow_mut().script.push_back(stimulus);
            self
        }

        /// Append to the script of a board already owned by a controller
        pub fn push_stimulus(&mut self, stimulus: Stimulus) {
            self.bus.borrow_mut().script.push_back(stimulus);
        }

        pub fn output(&self) -> String {
            self.serial.output()
        }

        pub fn clear_output(&self) {
            self.serial.clear_output();
        }

        pub fn is_initialized(&self) -> bool {
            self.initialized
        }
    }

    impl<'a> SimonHal for MockSimonHal<'a> {
        type Serial = MockSerial;
        type Indicators = MockIndicators;
        type Random = ScriptedRandom;
        type Delay = MockDelay;
        type Power = MockPower<'a>;

        fn initialize(&mut self) -> Result<(), HalError> {
            self.initialized = true;
            Ok(())
        }

        fn serial(&mut self) -> &mut Self::Serial {
            &mut self.serial
        }

        fn indicators(&mut self) -> &mut Self::Indicators {
            &mut self.indicators
        }

        fn random(&mut self) -> &mut Self::Random {
            &mut self.random
        }

        fn delay(&mut self) -> &mut Self::Delay {
            &mut self.delay
        }

        fn power(&mut self) -> &mut Self::Power {
            &mut self.power
        }
    }
}

pub mod scenarios {
    //! Helpers that run a controller against its script

    use super::HalError;
    use crate::controller::{Controller, StepOutcome};
    use crate::hal::SimonHal;

    /// Step until the script runs out, collecting every outcome
    ///
    /// Panics on any error other than the end of the script.
    pub fn drive<H: SimonHal>(controller: &mut Controller<'_, H>) -> Vec<StepOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match controller.step() {
                Ok(outcome) => outcomes.push(outcome),
                Err(HalError::InterruptError) => return outcomes,
                Err(e) => panic!("controller failed: {:?}", e),
            }
        }
    }

    /// Boot, then [`drive`]
    pub fn boot_and_drive<H: SimonHal>(controller: &mut Controller<'_, H>) -> Vec<StepOutcome> {
        if let Err(e) = controller.boot() {
            panic!("boot failed: {:?}", e);
        }
        drive(controller)
    }
}

pub use mocks::*;
pub use scenarios::*;
pub use script::Stimulus;
