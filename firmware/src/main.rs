#![no_std]
#![no_main]

// Logging support
#[cfg(feature = "defmt")]
use defmt::{info, warn};
#[cfg(feature = "defmt")]
use defmt_rtt as _;
use panic_halt as _;

// Define simple logging macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

use core::convert::Infallible;
use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use riscv_rt::entry;
use simon_core::random::NoiseRandom;
use simon_core::{
    default_config, Controller, HalError, IdleSupervisor, NoiseSource, PinIndicators,
    PowerControl, SerialLink, SimonHal,
};

// Critical section implementation for RISC-V
struct RiscvCriticalSection;
critical_section::set_impl!(RiscvCriticalSection);

unsafe impl critical_section::Impl for RiscvCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let mstatus = riscv::register::mstatus::read();
        riscv::register::mstatus::clear_mie();
        mstatus.mie() as u8
    }

    unsafe fn release(was_enabled: critical_section::RawRestoreState) {
        if was_enabled != 0 {
            riscv::register::mstatus::set_mie();
        }
    }
}

// ========================================
// CH32V003 Hardware Definitions
// ========================================

/// Core clock after reset configuration (HSI 24 MHz)
const HCLK_HZ: u32 = 24_000_000;
const BAUD: u32 = 115_200;

/// CH32V003 Memory Map and Register Base Addresses
const RCC_BASE: u32 = 0x4002_1000;
const GPIOC_BASE: u32 = 0x4001_1000;
const GPIOD_BASE: u32 = 0x4001_1400;
const GPIOA_BASE: u32 = 0x4001_0800;
const USART1_BASE: u32 = 0x4001_3800;
const ADC1_BASE: u32 = 0x4001_2400;
const IWDG_BASE: u32 = 0x4000_3000;
const PFIC_BASE: u32 = 0xE000_E000;
const SYSTICK_BASE: u32 = 0xE000_F000;

/// RCC Register offsets
const RCC_CFGR0: u32 = 0x04;    // Clock configuration register
const RCC_APB2PCENR: u32 = 0x18; // APB2 peripheral clock enable register
const RCC_RSTSCKR: u32 = 0x24;  // Reset status and clock control register

/// GPIO Register offsets
const GPIO_CFGLR: u32 = 0x00;  // Configuration Register Low
const GPIO_BSHR: u32 = 0x10;   // Bit Set/Reset Register

/// USART Register offsets
const USART_STATR: u32 = 0x00;
const USART_DATAR: u32 = 0x04;
const USART_BRR: u32 = 0x08;
const USART_CTLR1: u32 = 0x0C;

const USART_STATR_RXNE: u32 = 1 << 5;
const USART_STATR_TXE: u32 = 1 << 7;
const USART_CTLR1_RE: u32 = 1 << 2;
const USART_CTLR1_TE: u32 = 1 << 3;
const USART_CTLR1_RXNEIE: u32 = 1 << 5;
const USART_CTLR1_UE: u32 = 1 << 13;

/// ADC Register offsets
const ADC_STATR: u32 = 0x00;
const ADC_CTLR2: u32 = 0x08;
const ADC_SAMPTR2: u32 = 0x10;
const ADC_RSQR3: u32 = 0x34;
const ADC_RDATAR: u32 = 0x4C;

const ADC_STATR_EOC: u32 = 1 << 1;
const ADC_CTLR2_ADON: u32 = 1 << 0;
const ADC_CTLR2_EXTTRIG: u32 = 1 << 20;
const ADC_CTLR2_EXTSEL_SWSTART: u32 = 0b111 << 17;
const ADC_CTLR2_SWSTART: u32 = 1 << 22;

/// IWDG Register offsets and keys
const IWDG_CTLR: u32 = 0x00;
const IWDG_PSCR: u32 = 0x04;
const IWDG_RLDR: u32 = 0x08;
const IWDG_KEY_FEED: u32 = 0xAAAA;
const IWDG_KEY_UNLOCK: u32 = 0x5555;
const IWDG_KEY_START: u32 = 0xCCCC;

/// PFIC interrupt enable registers
const PFIC_IENR1: u32 = 0x100;  // Interrupts 0-31
const PFIC_IENR2: u32 = 0x104;  // Interrupts 32-63
const IRQ_SYSTICK: u32 = 12;
const IRQ_USART1: u32 = 32;

/// SysTick Register offsets
const STK_CTLR: u32 = 0x00;
const STK_SR: u32 = 0x04;
const STK_CNTL: u32 = 0x08;
const STK_CMPLR: u32 = 0x10;

/// LED pins PC0..PC3, one per symbol
const LED_PINS: [u8; 4] = [0, 1, 2, 3];
/// Floating ADC input used as noise source (PA2, channel 0)
const NOISE_CHANNEL: u32 = 0;

#[inline(always)]
fn reg_read(addr: u32) -> u32 {
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

#[inline(always)]
fn reg_write(addr: u32, value: u32) {
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

#[inline(always)]
fn reg_modify(addr: u32, f: impl FnOnce(u32) -> u32) {
    reg_write(addr, f(reg_read(addr)));
}

// ========================================
// Global state shared with interrupt handlers
// ========================================

/// System tick counter in ms (updated by SysTick interrupt)
static SYSTEM_TICK_MS: AtomicU32 = AtomicU32::new(0);

/// Inactivity supervisor: ticked by SysTick, woken by USART1 receive
static SUPERVISOR: IdleSupervisor = IdleSupervisor::new();

const TICK_PERIOD_MS: u32 = 1000;

// ========================================
// Board drivers
// ========================================

/// USART1 on PD5 (TX) / PD6 (RX), polled
struct Usart1;

impl SerialLink for Usart1 {
    fn read_byte(&mut self) -> Result<Option<u8>, HalError> {
        if reg_read(USART1_BASE + USART_STATR) & USART_STATR_RXNE != 0 {
            Ok(Some(reg_read(USART1_BASE + USART_DATAR) as u8))
        } else {
            Ok(None)
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), HalError> {
        while reg_read(USART1_BASE + USART_STATR) & USART_STATR_TXE == 0 {}
        reg_write(USART1_BASE + USART_DATAR, byte as u32);
        Ok(())
    }
}

/// Push-pull output via the BSHR register
struct GpioOut {
    port: u32,
    pin: u8,
}

impl ErrorType for GpioOut {
    type Error = Infallible;
}

impl OutputPin for GpioOut {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        reg_write(self.port + GPIO_BSHR, 1 << (self.pin + 16));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        reg_write(self.port + GPIO_BSHR, 1 << self.pin);
        Ok(())
    }
}

/// Single software-triggered conversion of the floating noise pin
struct AdcNoise;

impl NoiseSource for AdcNoise {
    fn sample(&mut self) -> u16 {
        reg_modify(ADC1_BASE + ADC_CTLR2, |v| v | ADC_CTLR2_SWSTART);
        while reg_read(ADC1_BASE + ADC_STATR) & ADC_STATR_EOC == 0 {}
        reg_read(ADC1_BASE + ADC_RDATAR) as u16
    }
}

/// Blocking delay on the SysTick millisecond counter
struct SysTickDelay;

impl DelayNs for SysTickDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (ns as u64 * (HCLK_HZ / 1_000_000) as u64 / 1000) as u32;
        riscv::asm::delay(cycles);
    }

    fn delay_ms(&mut self, ms: u32) {
        let start = SYSTEM_TICK_MS.load(Ordering::Relaxed);
        while SYSTEM_TICK_MS.load(Ordering::Relaxed).wrapping_sub(start) < ms {
            feed_iwdg();
            unsafe { riscv::asm::wfi(); }
        }
    }
}

fn feed_iwdg() {
    reg_write(IWDG_BASE + IWDG_CTLR, IWDG_KEY_FEED);
}

/// Wake arming on USART1 RXNE, WFI, and the independent watchdog
struct Ch32Power;

impl PowerControl for Ch32Power {
    fn arm_wake(&mut self) -> Result<(), HalError> {
        // a byte already in DATAR fires the interrupt as soon as this is set
        reg_modify(USART1_BASE + USART_CTLR1, |v| v | USART_CTLR1_RXNEIE);
        Ok(())
    }

    fn disarm_wake(&mut self) -> Result<(), HalError> {
        reg_modify(USART1_BASE + USART_CTLR1, |v| v & !USART_CTLR1_RXNEIE);
        Ok(())
    }

    fn wait_for_interrupt(&mut self) -> Result<(), HalError> {
        unsafe { riscv::asm::wfi(); }
        Ok(())
    }

    fn feed_watchdog(&mut self) {
        feed_iwdg();
    }
}

/// CH32V003 Simon board
struct Ch32v003SimonHal {
    serial: Usart1,
    indicators: PinIndicators<GpioOut>,
    random: NoiseRandom<AdcNoise>,
    delay: SysTickDelay,
    power: Ch32Power,
}

impl Ch32v003SimonHal {
    fn new() -> Self {
        Self {
            serial: Usart1,
            indicators: PinIndicators::new(LED_PINS.map(|pin| GpioOut { port: GPIOC_BASE, pin })),
            random: NoiseRandom::new(AdcNoise),
            delay: SysTickDelay,
            power: Ch32Power,
        }
    }
}

impl SimonHal for Ch32v003SimonHal {
    type Serial = Usart1;
    type Indicators = PinIndicators<GpioOut>;
    type Random = NoiseRandom<AdcNoise>;
    type Delay = SysTickDelay;
    type Power = Ch32Power;

    fn initialize(&mut self) -> Result<(), HalError> {
        hardware_init();
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

// ========================================
// Hardware initialization
// ========================================

fn hardware_init() {
    enable_peripheral_clocks();
    configure_gpio_pins();
    configure_usart1();
    configure_adc();
    configure_systick();
    configure_iwdg();

    unsafe { riscv::register::mstatus::set_mie(); }
    info!("hardware initialization complete");
}

/// Enable required peripheral clocks
fn enable_peripheral_clocks() {
    // Bit 0 = AFIO, Bit 2 = GPIOA, Bit 4 = GPIOC, Bit 5 = GPIOD, Bit 9 = ADC1, Bit 14 = USART1
    reg_modify(RCC_BASE + RCC_APB2PCENR, |v| {
        v | (1 << 0) | (1 << 2) | (1 << 4) | (1 << 5) | (1 << 9) | (1 << 14)
    });
    // ADC clock = HCLK / 8
    reg_modify(RCC_BASE + RCC_CFGR0, |v| (v & !(0x1F << 11)) | (0b10011 << 11));
}

fn configure_gpio_pins() {
    // PC0..PC3: MODE=01 (10MHz output), CNF=00 (push-pull)
    reg_modify(GPIOC_BASE + GPIO_CFGLR, |mut cfg| {
        for pin in LED_PINS {
            let shift = pin as u32 * 4;
            cfg = (cfg & !(0xF << shift)) | (0x1 << shift);
        }
        cfg
    });

    // PD5: TX, MODE=01 CNF=10 (AF push-pull); PD6: RX, CNF=01 (floating input)
    reg_modify(GPIOD_BASE + GPIO_CFGLR, |cfg| {
        let cfg = (cfg & !(0xF << 20)) | (0x9 << 20);
        (cfg & !(0xF << 24)) | (0x4 << 24)
    });

    // PA2: analog input for the noise source
    reg_modify(GPIOA_BASE + GPIO_CFGLR, |cfg| cfg & !(0xF << 8));
}

fn configure_usart1() {
    reg_write(USART1_BASE + USART_BRR, HCLK_HZ / BAUD);
    reg_write(
        USART1_BASE + USART_CTLR1,
        USART_CTLR1_UE | USART_CTLR1_TE | USART_CTLR1_RE,
    );
    reg_modify(PFIC_BASE + PFIC_IENR2, |v| v | (1 << (IRQ_USART1 - 32)));
}

fn configure_adc() {
    reg_write(ADC1_BASE + ADC_RSQR3, NOISE_CHANNEL);
    // shortest sample time keeps the most noise
    reg_write(ADC1_BASE + ADC_SAMPTR2, 0);
    reg_write(
        ADC1_BASE + ADC_CTLR2,
        ADC_CTLR2_ADON | ADC_CTLR2_EXTTRIG | ADC_CTLR2_EXTSEL_SWSTART,
    );
}

/// Configure SysTick for 1ms interrupts
fn configure_systick() {
    reg_write(SYSTICK_BASE + STK_SR, 0);
    reg_write(SYSTICK_BASE + STK_CMPLR, HCLK_HZ / 1000 - 1);
    reg_write(SYSTICK_BASE + STK_CNTL, 0);
    // STE | STIE | STCLK (HCLK) | STRE (auto reload)
    reg_write(SYSTICK_BASE + STK_CTLR, 0xF);
    reg_modify(PFIC_BASE + PFIC_IENR1, |v| v | (1 << IRQ_SYSTICK));
}

/// Independent watchdog, about 4 s at LSI/128
fn configure_iwdg() {
    reg_modify(RCC_BASE + RCC_RSTSCKR, |v| v | 1);
    reg_write(IWDG_BASE + IWDG_CTLR, IWDG_KEY_UNLOCK);
    reg_write(IWDG_BASE + IWDG_PSCR, 5);
    reg_write(IWDG_BASE + IWDG_RLDR, 4095);
    reg_write(IWDG_BASE + IWDG_CTLR, IWDG_KEY_START);
}

#[entry]
fn main() -> ! {
    let mut controller = Controller::new(Ch32v003SimonHal::new(), &SUPERVISOR, default_config());

    info!("CH32V003 Simon Says");

    if let Err(e) = controller.run() {
        warn!("controller stopped: {}", e);
    }

    // stop feeding: the watchdog resets the MCU
    loop {
        unsafe { riscv::asm::wfi(); }
    }
}

// ========================================
// Interrupt Handlers
// ========================================

/// SysTick: 1ms counter, supervisor tick once per second
#[no_mangle]
extern "C" fn SysTick() {
    reg_write(SYSTICK_BASE + STK_SR, 0);

    let now = SYSTEM_TICK_MS.load(Ordering::Relaxed).wrapping_add(1);
    SYSTEM_TICK_MS.store(now, Ordering::Release);

    if now % TICK_PERIOD_MS == 0 {
        SUPERVISOR.on_tick();
    }
}

/// USART1: only enabled while sleeping, wakes the supervisor
#[no_mangle]
extern "C" fn USART1_IRQHandler() {
    // leave the byte in DATAR, the main loop discards it after waking
    reg_modify(USART1_BASE + USART_CTLR1, |v| v & !USART_CTLR1_RXNEIE);
    SUPERVISOR.on_wake();
}
