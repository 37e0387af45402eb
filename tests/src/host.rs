//! Host board: the game on OS threads
//!
//! The controller runs on its own thread exactly as on the MCU. Interrupts are
//! simulated by other threads and tokio tasks calling into the shared
//! supervisor: a ticker task calls `on_tick`, and every received byte calls
//! `on_wake` while the wake trigger is armed. The supervisor's critical
//! sections map to a global mutex through the `critical-section/std` impl.

use std::convert::Infallible;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use simon_core::random::NoiseRandom;
use simon_core::{
    HalError, IdleSupervisor, NoiseSource, PinIndicators, PowerControl, RandomSource, SerialLink,
    SimonHal, NUM_SYMBOLS,
};

/// Longest a simulated `wfi` blocks before returning spuriously
const WFI_TIMEOUT: Duration = Duration::from_millis(100);

/// State shared between the board and its interrupt sources
struct Link {
    supervisor: &'static IdleSupervisor,
    interrupts: Mutex<u64>,
    raised: Condvar,
    wake_armed: AtomicBool,
    pending_rx: AtomicUsize,
    shutdown: AtomicBool,
    output: Mutex<Vec<u8>>,
    leds: Mutex<[bool; NUM_SYMBOLS]>,
    watchdog_feeds: AtomicUsize,
    mirror_stdout: bool,
}

impl Link {
    fn raise(&self) {
        if let Ok(mut count) = self.interrupts.lock() {
            *count += 1;
        }
        self.raised.notify_all();
    }
}

/// Serial port over an mpsc channel, writes captured (and optionally echoed to stdout)
pub struct HostSerial {
    link: Arc<Link>,
    rx: Receiver<u8>,
}

impl SerialLink for HostSerial {
    fn read_byte(&mut self) -> Result<Option<u8>, HalError> {
        match self.rx.try_recv() {
            Ok(byte) => {
                self.link.pending_rx.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(byte))
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), HalError> {
        self.write_bytes(&[byte])
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        self.link
            .output
            .lock()
            .map_err(|_| HalError::SerialError)?
            .extend_from_slice(bytes);
        if self.link.mirror_stdout {
            let mut stdout = std::io::stdout();
            stdout.write_all(bytes).map_err(|_| HalError::SerialError)?;
            stdout.flush().map_err(|_| HalError::SerialError)?;
        }
        Ok(())
    }
}

/// One LED, as an embedded-hal output pin
pub struct HostLed {
    link: Arc<Link>,
    index: usize,
}

impl ErrorType for HostLed {
    type Error = Infallible;
}

impl OutputPin for HostLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if let Ok(mut leds) = self.link.leds.lock() {
            leds[self.index] = false;
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if let Ok(mut leds) = self.link.leds.lock() {
            leds[self.index] = true;
        }
        Ok(())
    }
}

/// Noise from the OS random generator, standing in for the floating ADC pin
pub struct HostNoise;

impl NoiseSource for HostNoise {
    fn sample(&mut self) -> u16 {
        rand::random::<u16>()
    }
}

/// Real-time delay, optionally scaled down for tests
pub struct HostDelay {
    divisor: u32,
}

impl DelayNs for HostDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos((ns / self.divisor.max(1)) as u64));
    }
}

/// Power control: `wfi` parks on a condition variable until an interrupt is raised
pub struct HostPower {
    link: Arc<Link>,
    seen: u64,
}

impl PowerControl for HostPower {
    fn arm_wake(&mut self) -> Result<(), HalError> {
        self.link.wake_armed.store(true, Ordering::SeqCst);
        // a byte already waiting raises the receive interrupt at once
        if self.link.pending_rx.load(Ordering::SeqCst) > 0 {
            self.link.supervisor.on_wake();
        }
        Ok(())
    }

    fn disarm_wake(&mut self) -> Result<(), HalError> {
        self.link.wake_armed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn wait_for_interrupt(&mut self) -> Result<(), HalError> {
        let count = self.link.interrupts.lock().map_err(|_| HalError::InterruptError)?;
        let (count, _) = self
            .link
            .raised
            .wait_timeout_while(count, WFI_TIMEOUT, |count| {
                *count == self.seen && !self.link.shutdown.load(Ordering::SeqCst)
            })
            .map_err(|_| HalError::InterruptError)?;
        self.seen = *count;

        if self.link.shutdown.load(Ordering::SeqCst) {
            return Err(HalError::InterruptError);
        }
        Ok(())
    }

    fn feed_watchdog(&mut self) {
        self.link.watchdog_feeds.fetch_add(1, Ordering::Relaxed);
    }
}

/// Complete host board
pub struct HostBoard<R = NoiseRandom<HostNoise>> {
    serial: HostSerial,
    indicators: PinIndicators<HostLed>,
    random: R,
    delay: HostDelay,
    power: HostPower,
}

impl<R: RandomSource> SimonHal for HostBoard<R> {
    type Serial = HostSerial;
    type Indicators = PinIndicators<HostLed>;
    type Random = R;
    type Delay = HostDelay;
    type Power = HostPower;

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

/// Handle for the interrupt side and for inspecting the board
#[derive(Clone)]
pub struct HostHandle {
    link: Arc<Link>,
    input: Sender<u8>,
}

impl HostHandle {
    /// Bytes arriving on the serial line
    pub fn send(&self, text: &str) {
        for byte in text.bytes() {
            // counted before it can be received, so the reader never underflows
            self.link.pending_rx.fetch_add(1, Ordering::SeqCst);
            if self.input.send(byte).is_err() {
                self.link.pending_rx.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        }
        if self.link.wake_armed.load(Ordering::SeqCst) {
            self.link.supervisor.on_wake();
        }
        self.link.raise();
    }

    /// A typed line, terminated with `\r`
    pub fn send_line(&self, line: &str) {
        self.send(&format!("{}\r", line));
    }

    /// One timer interrupt
    pub fn tick(&self) {
        self.link.supervisor.on_tick();
        self.link.raise();
    }

    /// Tick every `period` until shutdown
    pub fn spawn_ticker(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;
            while !handle.is_shutdown() {
                interval.tick().await;
                handle.tick();
            }
        })
    }

    /// Stop the board: the next `wfi` fails and the controller returns
    pub fn shutdown(&self) {
        self.link.shutdown.store(true, Ordering::SeqCst);
        self.link.raise();
    }

    pub fn is_shutdown(&self) -> bool {
        self.link.shutdown.load(Ordering::SeqCst)
    }

    pub fn output(&self) -> String {
        self.link
            .output
            .lock()
            .map(|out| String::from_utf8_lossy(&out).into_owned())
            .unwrap_or_default()
    }

    pub fn leds(&self) -> [bool; NUM_SYMBOLS] {
        self.link.leds.lock().map(|leds| *leds).unwrap_or_default()
    }

    /// Bytes sent but not yet read by the board
    pub fn pending_rx(&self) -> usize {
        self.link.pending_rx.load(Ordering::SeqCst)
    }

    pub fn watchdog_feeds(&self) -> usize {
        self.link.watchdog_feeds.load(Ordering::Relaxed)
    }

    pub fn supervisor(&self) -> &'static IdleSupervisor {
        self.link.supervisor
    }

    /// Poll the captured output until it contains `needle`
    pub async fn wait_for_output(&self, needle: &str, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            if self.output().contains(needle) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Board options
#[derive(Copy, Clone, Debug)]
pub struct HostOptions {
    /// Echo everything written to the serial port on stdout
    pub mirror_stdout: bool,
    /// Divide every delay by this factor
    pub delay_divisor: u32,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self { mirror_stdout: false, delay_divisor: 1 }
    }
}

/// Board with noise-seeded draws
pub fn board(
    supervisor: &'static IdleSupervisor,
    options: HostOptions,
) -> (HostBoard, HostHandle) {
    board_with_random(supervisor, options, NoiseRandom::new(HostNoise))
}

/// Board with a caller-provided random source
pub fn board_with_random<R: RandomSource>(
    supervisor: &'static IdleSupervisor,
    options: HostOptions,
    random: R,
) -> (HostBoard<R>, HostHandle) {
    let link = Arc::new(Link {
        supervisor,
        interrupts: Mutex::new(0),
        raised: Condvar::new(),
        wake_armed: AtomicBool::new(false),
        pending_rx: AtomicUsize::new(0),
        shutdown: AtomicBool::new(false),
        output: Mutex::new(Vec::new()),
        leds: Mutex::new([false; NUM_SYMBOLS]),
        watchdog_feeds: AtomicUsize::new(0),
        mirror_stdout: options.mirror_stdout,
    });
    let (tx, rx) = mpsc::channel();

    let leds = [0, 1, 2, 3].map(|index| HostLed { link: link.clone(), index });
    let board = HostBoard {
        serial: HostSerial { link: link.clone(), rx },
        indicators: PinIndicators::new(leds),
        random,
        delay: HostDelay { divisor: options.delay_divisor },
        power: HostPower { link: link.clone(), seen: 0 },
    };
    (board, HostHandle { link, input: tx })
}

/// Supervisor for one board, living for the rest of the process
pub fn leak_supervisor(supervisor: IdleSupervisor) -> &'static IdleSupervisor {
    Box::leak(Box::new(supervisor))
}
