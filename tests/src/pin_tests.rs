//! LED pin behaviour checked against embedded-hal-mock expectations

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};
use simon_core::test_utils::script::{self, SharedBus};
use simon_core::test_utils::{drive, MockPower, MockSerial, ScriptedRandom};
use simon_core::{
    default_config, Action, Controller, GameConfig, HalError, IdleSupervisor, IndicatorBank,
    PinIndicators, SimonHal, StepOutcome, Symbol,
};

/// Board whose LEDs are embedded-hal-mock pins
struct PinBoard<'a> {
    serial: MockSerial,
    indicators: PinIndicators<PinMock>,
    random: ScriptedRandom,
    delay: NoopDelay,
    power: MockPower<'a>,
}

impl<'a> PinBoard<'a> {
    fn new(supervisor: &'a IdleSupervisor, pins: [PinMock; 4], draws: &[u8]) -> (Self, SharedBus) {
        let bus = script::shared();
        let board = Self {
            serial: MockSerial::new(bus.clone()),
            indicators: PinIndicators::new(pins),
            random: ScriptedRandom::new(draws),
            delay: NoopDelay::new(),
            power: MockPower::new(bus.clone(), supervisor),
        };
        (board, bus)
    }
}

impl<'a> SimonHal for PinBoard<'a> {
    type Serial = MockSerial;
    type Indicators = PinIndicators<PinMock>;
    type Random = ScriptedRandom;
    type Delay = NoopDelay;
    type Power = MockPower<'a>;

    fn initialize(&mut self) -> Result<(), HalError> {
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

fn pulse() -> [PinTransaction; 2] {
    [PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)]
}

fn finish(indicators: PinIndicators<PinMock>) {
    for mut pin in indicators.into_pins() {
        pin.done();
    }
}

#[test]
fn test_indicator_bank_drives_pins() {
    let mut leds = PinIndicators::new([
        PinMock::new(&[]),
        PinMock::new(&pulse()),
        PinMock::new(&[]),
        PinMock::new(&[PinTransaction::set(PinState::Low)]),
    ]);

    leds.activate(Symbol::B);
    leds.deactivate(Symbol::B);
    leds.deactivate(Symbol::D);
    finish(leds);
}

#[test]
fn test_presentation_pulses_each_led_once_per_symbol() {
    let supervisor = IdleSupervisor::new();
    // sequence C then A: C pulses twice (rounds one and two), A once
    let pins = [
        PinMock::new(&pulse()),
        PinMock::new(&[]),
        PinMock::new(&[pulse(), pulse()].concat()),
        PinMock::new(&[]),
    ];
    let (board, bus) = PinBoard::new(&supervisor, pins, &[3, 1]);
    bus.borrow_mut().rx.extend(b"start\rS\r".iter().copied());

    let config = GameConfig { self_test: false, ..default_config() };
    let mut controller = Controller::new(board, &supervisor, config);
    let outcomes = drive(&mut controller);

    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0], StepOutcome::Line(Action::Started));
    assert_eq!(outcomes[3], StepOutcome::Presented { length: 2 });
    finish(controller.into_hal().indicators);
}

#[test]
fn test_self_test_sequence() {
    let supervisor = IdleSupervisor::new();
    // all_off at boot, then 5 forward + 5 backward chases, then 5 flashes
    let mut expected = vec![PinTransaction::set(PinState::Low)];
    for _ in 0..15 {
        expected.extend_from_slice(&pulse());
    }
    let pins = [
        PinMock::new(&expected),
        PinMock::new(&expected),
        PinMock::new(&expected),
        PinMock::new(&expected),
    ];
    let (board, _bus) = PinBoard::new(&supervisor, pins, &[]);

    let mut controller = Controller::new(board, &supervisor, default_config());
    assert!(controller.boot().is_ok());
    finish(controller.into_hal().indicators);
}
