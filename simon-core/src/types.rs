//! Core data types for the Simon Says game

use crate::hal::Duration;

/// Hard cap on the secret sequence length
pub const MAX_SEQUENCE: usize = 30;

/// Number of distinct symbols (and LEDs)
pub const NUM_SYMBOLS: usize = 4;

/// Serial line buffer size, terminator included
pub const LINE_CAPACITY: usize = 50;

/// Game symbols, one per LED
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Symbol {
    A,
    B,
    C,
    D,
}

impl Symbol {
    /// All symbols in draw order
    pub const ALL: [Symbol; NUM_SYMBOLS] = [Symbol::A, Symbol::B, Symbol::C, Symbol::D];

    /// Map a random draw in `1..=4` to a symbol
    pub const fn from_draw(draw: u8) -> Option<Symbol> {
        match draw {
            1 => Some(Symbol::A),
            2 => Some(Symbol::B),
            3 => Some(Symbol::C),
            4 => Some(Symbol::D),
            _ => None,
        }
    }

    /// Zero-based index, also the LED slot
    pub const fn index(&self) -> usize {
        match self {
            Symbol::A => 0,
            Symbol::B => 1,
            Symbol::C => 2,
            Symbol::D => 3,
        }
    }
}

/// Whose turn it is inside a running game
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Turn {
    /// Simon extends and plays back the sequence
    Simon,
    /// The player types the sequence back
    Player,
}

/// Coarse session phase
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    NotStarted,
    InProgress,
    /// "quit" was typed; waiting for yes/no
    AwaitingQuitConfirm,
}

/// How a guess is compared with the secret sequence
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MatchPolicy {
    /// The first `len(sequence)` characters must match; trailing input is ignored
    Prefix,
    /// The guess must have exactly the sequence's length
    Exact,
}

/// Result of a player's turn or a forced end of game
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurnResult {
    /// Guess matched, Simon plays again
    Matched { score: u32 },
    /// Sequence reached its cap and was matched
    Won { score: u32 },
    /// Guess did not match
    Lost { score: u32 },
    /// Player typed "quit" as the guess
    Quit,
}

impl TurnResult {
    /// Returns true if the session was reset by this result
    pub const fn ends_game(&self) -> bool {
        match self {
            TurnResult::Matched { .. } => false,
            TurnResult::Won { .. } | TurnResult::Lost { .. } | TurnResult::Quit => true,
        }
    }
}

/// Game configuration parameters
#[derive(Copy, Clone, Debug)]
pub struct GameConfig {
    /// Sequence length that wins the game (1..=MAX_SEQUENCE)
    pub max_sequence: usize,
    /// Expected guess character for each symbol, in `Symbol::ALL` order
    pub keys: [char; NUM_SYMBOLS],
    /// Guess comparison rule
    pub match_policy: MatchPolicy,
    /// How long each symbol (and its placeholder) stays on screen
    pub symbol_display: Duration,
    /// Pause between the sleep notice and suspending
    pub sleep_grace: Duration,
    /// Pause after waking before stale input is discarded
    pub wake_settle: Duration,
    /// Run the LED chase at boot
    pub self_test: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        crate::default_config()
    }
}

impl GameConfig {
    /// Create a new configuration with validation
    pub fn new(
        max_sequence: usize,
        keys: [char; NUM_SYMBOLS],
        match_policy: MatchPolicy,
        symbol_display_ms: u64,
    ) -> Result<Self, &'static str> {
        if max_sequence == 0 || max_sequence > MAX_SEQUENCE {
            return Err("Sequence length must be between 1 and 30");
        }
        if keys.iter().any(|k| !k.is_ascii_graphic()) {
            return Err("Keys must be printable ASCII");
        }
        for (i, a) in keys.iter().enumerate() {
            if keys[i + 1..].iter().any(|b| a.eq_ignore_ascii_case(b)) {
                return Err("Keys must be distinct ignoring case");
            }
        }
        if symbol_display_ms > 5000 {
            return Err("Symbol display must be <= 5000ms");
        }

        Ok(Self {
            max_sequence,
            keys,
            match_policy,
            symbol_display: Duration::from_millis(symbol_display_ms),
            ..crate::default_config()
        })
    }

    /// Guess character for a symbol
    pub fn key(&self, symbol: Symbol) -> char {
        self.keys[symbol.index()]
    }
}
