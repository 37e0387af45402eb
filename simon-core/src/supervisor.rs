//! Idle/sleep supervisor shared between the timer interrupt and the main loop
//!
//! The timer handler calls [`IdleSupervisor::on_tick`] once per second, the
//! receive-data handler calls [`IdleSupervisor::on_wake`], and the main loop
//! resets the counter on every completed line and collects posted events with
//! [`IdleSupervisor::take_event`]. All state lives behind a
//! `critical_section::Mutex`, so a `static` supervisor is safe to share with
//! interrupt handlers on single-core targets and with threads on hosts.

use core::cell::Cell;

use critical_section::Mutex;

/// Seconds without input before the warning notice
pub const DEFAULT_WARN_TICKS: u32 = 15;

/// Seconds without input before sleep
pub const DEFAULT_SLEEP_TICKS: u32 = 30;

/// Event posted by interrupt context for the main loop
///
/// Only one event is held at a time. When a new event arrives before the
/// previous one was taken, the higher-priority one is kept: `Wake` beats
/// `SleepDue`, which beats `Warning`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdleEvent {
    /// Warning threshold reached
    Warning,
    /// Sleep threshold reached
    SleepDue,
    /// Input arrived while sleeping
    Wake,
}

/// Copy of the supervisor state at one instant
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdleState {
    /// Seconds since the last completed line
    pub ticks: u32,
    /// Set by the main loop before suspending, cleared by a wake
    pub sleeping: bool,
    /// Event waiting for the main loop
    pub pending: Option<IdleEvent>,
}

impl IdleState {
    const fn new() -> Self {
        Self { ticks: 0, sleeping: false, pending: None }
    }

    fn post(&mut self, event: IdleEvent) {
        self.pending = match self.pending {
            Some(current) if current > event => Some(current),
            _ => Some(event),
        };
    }
}

/// Error returned for unusable thresholds
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThresholdError {
    /// Warning must come strictly before sleep, and both must be nonzero
    Ordering { warn: u32, sleep: u32 },
}

/// Inactivity counter and sleep flag
pub struct IdleSupervisor {
    warn_ticks: u32,
    sleep_ticks: u32,
    state: Mutex<Cell<IdleState>>,
}

impl IdleSupervisor {
    /// Supervisor with the 15 s warning and 30 s sleep thresholds
    pub const fn new() -> Self {
        Self::with_thresholds(DEFAULT_WARN_TICKS, DEFAULT_SLEEP_TICKS)
    }

    /// Supervisor with custom thresholds, unchecked
    ///
    /// Usable in `static` initializers. Prefer
    /// [`IdleSupervisor::try_with_thresholds`] for runtime values.
    pub const fn with_thresholds(warn_ticks: u32, sleep_ticks: u32) -> Self {
        Self {
            warn_ticks,
            sleep_ticks,
            state: Mutex::new(Cell::new(IdleState::new())),
        }
    }

    /// Supervisor with validated thresholds: `0 < warn < sleep`
    pub fn try_with_thresholds(warn_ticks: u32, sleep_ticks: u32) -> Result<Self, ThresholdError> {
        if warn_ticks == 0 || warn_ticks >= sleep_ticks {
            return Err(ThresholdError::Ordering { warn: warn_ticks, sleep: sleep_ticks });
        }
        Ok(Self::with_thresholds(warn_ticks, sleep_ticks))
    }

    pub fn warn_ticks(&self) -> u32 {
        self.warn_ticks
    }

    pub fn sleep_ticks(&self) -> u32 {
        self.sleep_ticks
    }

    fn update<R>(&self, f: impl FnOnce(&mut IdleState) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }

    /// Timer tick, called from interrupt context once per second
    ///
    /// Returns the event posted by this tick, if any.
    pub fn on_tick(&self) -> Option<IdleEvent> {
        let (warn, sleep) = (self.warn_ticks, self.sleep_ticks);
        self.update(|state| {
            state.ticks = state.ticks.saturating_add(1);
            if state.ticks < sleep {
                if state.ticks == warn && !state.sleeping {
                    state.post(IdleEvent::Warning);
                    return Some(IdleEvent::Warning);
                }
                None
            } else {
                state.ticks = 0;
                if state.sleeping {
                    None
                } else {
                    state.post(IdleEvent::SleepDue);
                    Some(IdleEvent::SleepDue)
                }
            }
        })
    }

    /// Receive interrupt while the wake trigger is armed
    ///
    /// Idempotent: a second call before the main loop runs changes nothing.
    pub fn on_wake(&self) {
        self.update(|state| {
            state.sleeping = false;
            state.ticks = 0;
            state.post(IdleEvent::Wake);
        });
    }

    /// A line was completed: restart the inactivity count
    ///
    /// Pending warning/sleep events are stale once input arrives; a pending
    /// wake is kept.
    pub fn reset_idle(&self) {
        self.update(|state| {
            state.ticks = 0;
            if state.pending != Some(IdleEvent::Wake) {
                state.pending = None;
            }
        });
    }

    /// Main loop is about to suspend
    pub fn enter_sleep(&self) {
        self.update(|state| {
            state.sleeping = true;
            state.ticks = 0;
        });
    }

    pub fn is_sleeping(&self) -> bool {
        self.snapshot().sleeping
    }

    /// Seconds since the last completed line
    pub fn ticks(&self) -> u32 {
        self.snapshot().ticks
    }

    /// Remove and return the pending event
    pub fn take_event(&self) -> Option<IdleEvent> {
        self.update(|state| state.pending.take())
    }

    pub fn snapshot(&self) -> IdleState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }
}

impl Default for IdleSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
