//! Game session state machine

use heapless::{String, Vec};

use crate::hal::RandomSource;
use crate::line::matches_keyword;
use crate::types::{GameConfig, MatchPolicy, Phase, Symbol, Turn, TurnResult, MAX_SEQUENCE};

/// Session operation errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    /// `start` while a game is running
    AlreadyStarted,
    /// Game operation with no game running
    NotInProgress,
    /// Simon's turn requested during the player's turn
    NotSimonsTurn,
    /// Guess submitted during Simon's turn
    NotPlayersTurn,
    /// Sequence already at its cap
    CapacityExceeded,
    /// Random source returned a value outside `1..=4`
    DrawOutOfRange(u8),
    /// Quit answer with no quit pending
    NoQuitPending,
}

#[cfg(any(test, feature = "std"))]
impl core::fmt::Display for SessionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SessionError::AlreadyStarted => write!(f, "A game is already in progress"),
            SessionError::NotInProgress => write!(f, "No game in progress"),
            SessionError::NotSimonsTurn => write!(f, "Not Simon's turn"),
            SessionError::NotPlayersTurn => write!(f, "Not the player's turn"),
            SessionError::CapacityExceeded => write!(f, "Sequence is full"),
            SessionError::DrawOutOfRange(d) => write!(f, "Draw {} out of range", d),
            SessionError::NoQuitPending => write!(f, "No quit pending"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for SessionError {}

/// Answer to the quit confirmation prompt
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QuitAnswer {
    Yes,
    No,
    /// Anything other than yes/no
    Other,
}

/// Outcome of answering the quit prompt
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QuitOutcome {
    /// Session reset
    Quit,
    /// Back to the phase before the prompt
    Cancelled,
    /// Still waiting for yes/no
    Reprompt,
}

/// Secret sequence, score, turn and phase of one game
#[derive(Clone, Debug)]
pub struct Session {
    sequence: Vec<Symbol, MAX_SEQUENCE>,
    score: u32,
    turn: Turn,
    phase: Phase,
    /// Phase to restore when a quit is cancelled
    before_quit: Phase,
    limit: usize,
    keys: [char; 4],
    policy: MatchPolicy,
}

impl Session {
    /// Create an idle session
    pub fn new(config: &GameConfig) -> Self {
        Self {
            sequence: Vec::new(),
            score: 0,
            turn: Turn::Simon,
            phase: Phase::NotStarted,
            before_quit: Phase::NotStarted,
            limit: config.max_sequence.clamp(1, MAX_SEQUENCE),
            keys: config.keys,
            policy: config.match_policy,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Symbols drawn so far
    pub fn sequence(&self) -> &[Symbol] {
        &self.sequence
    }

    /// Index of the newest symbol, -1 when empty
    pub fn current_index(&self) -> isize {
        self.sequence.len() as isize - 1
    }

    /// True while a yes/no answer is expected
    pub fn pending_quit(&self) -> bool {
        self.phase == Phase::AwaitingQuitConfirm
    }

    /// True when a game is running, including while a quit is pending mid-game
    pub fn in_game(&self) -> bool {
        match self.phase {
            Phase::InProgress => true,
            Phase::AwaitingQuitConfirm => self.before_quit == Phase::InProgress,
            Phase::NotStarted => false,
        }
    }

    /// True when Simon should play next
    pub fn simon_to_play(&self) -> bool {
        self.phase == Phase::InProgress && self.turn == Turn::Simon
    }

    /// True when a guess is expected
    pub fn awaiting_guess(&self) -> bool {
        self.phase == Phase::InProgress && self.turn == Turn::Player
    }

    /// Guess character for a symbol
    pub fn key(&self, symbol: Symbol) -> char {
        self.keys[symbol.index()]
    }

    /// Sequence rendered with the configured keys
    pub fn sequence_text(&self) -> String<MAX_SEQUENCE> {
        let mut text = String::new();
        for &symbol in &self.sequence {
            // capacity equals the sequence capacity
            let _ = text.push(self.key(symbol));
        }
        text
    }

    /// Begin a new game
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        self.phase = Phase::InProgress;
        self.turn = Turn::Simon;
        info!("game started");
        Ok(())
    }

    /// Draw and append one symbol, returning the full sequence to present
    ///
    /// The turn stays with Simon until [`Session::presentation_done`] is called.
    pub fn simon_turn<R: RandomSource>(&mut self, random: &mut R) -> Result<&[Symbol], SessionError> {
        if self.phase != Phase::InProgress {
            return Err(SessionError::NotInProgress);
        }
        if self.turn != Turn::Simon {
            return Err(SessionError::NotSimonsTurn);
        }
        if self.sequence.len() >= self.limit {
            return Err(SessionError::CapacityExceeded);
        }

        let draw = random.next_draw();
        let symbol = Symbol::from_draw(draw).ok_or(SessionError::DrawOutOfRange(draw))?;
        self.sequence.push(symbol).map_err(|_| SessionError::CapacityExceeded)?;
        debug!("simon drew {} at {}", symbol, self.current_index());

        Ok(&self.sequence)
    }

    /// Playback finished, hand the turn to the player
    pub fn presentation_done(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::InProgress {
            return Err(SessionError::NotInProgress);
        }
        if self.turn != Turn::Simon {
            return Err(SessionError::NotSimonsTurn);
        }
        self.turn = Turn::Player;
        Ok(())
    }

    /// Sequence is full without a pending guess: end the game as a win
    pub fn force_win(&mut self) -> TurnResult {
        let score = self.score;
        info!("sequence full, forced win with score {}", score);
        self.reset();
        TurnResult::Won { score }
    }

    /// Check a guess against the sequence
    pub fn player_turn(&mut self, guess: &str) -> Result<TurnResult, SessionError> {
        if self.phase != Phase::InProgress {
            return Err(SessionError::NotInProgress);
        }
        if self.turn != Turn::Player {
            return Err(SessionError::NotPlayersTurn);
        }

        if matches_keyword(guess, "quit") {
            info!("player quit from guess prompt");
            self.reset();
            return Ok(TurnResult::Quit);
        }

        if self.guess_matches(guess) {
            self.score += 1;
            if self.sequence.len() >= self.limit {
                let score = self.score;
                info!("player won with score {}", score);
                self.reset();
                return Ok(TurnResult::Won { score });
            }
            self.turn = Turn::Simon;
            Ok(TurnResult::Matched { score: self.score })
        } else {
            let score = self.score;
            info!("player lost with score {}", score);
            self.reset();
            Ok(TurnResult::Lost { score })
        }
    }

    /// "quit" typed: ask for confirmation
    pub fn request_quit(&mut self) {
        if self.phase != Phase::AwaitingQuitConfirm {
            self.before_quit = self.phase;
            self.phase = Phase::AwaitingQuitConfirm;
        }
    }

    /// Resolve a pending quit
    pub fn confirm_quit(&mut self, answer: QuitAnswer) -> Result<QuitOutcome, SessionError> {
        if self.phase != Phase::AwaitingQuitConfirm {
            return Err(SessionError::NoQuitPending);
        }
        match answer {
            QuitAnswer::Yes => {
                self.reset();
                Ok(QuitOutcome::Quit)
            }
            QuitAnswer::No => {
                self.phase = self.before_quit;
                Ok(QuitOutcome::Cancelled)
            }
            QuitAnswer::Other => Ok(QuitOutcome::Reprompt),
        }
    }

    /// Back to `NotStarted` with an empty sequence and zero score
    pub fn reset(&mut self) {
        self.sequence.clear();
        self.score = 0;
        self.turn = Turn::Simon;
        self.phase = Phase::NotStarted;
        self.before_quit = Phase::NotStarted;
    }

    fn guess_matches(&self, guess: &str) -> bool {
        let guess = guess.as_bytes();
        let len = self.sequence.len();
        let long_enough = match self.policy {
            MatchPolicy::Prefix => guess.len() >= len,
            MatchPolicy::Exact => guess.len() == len,
        };
        long_enough
            && self
                .sequence
                .iter()
                .zip(guess)
                .all(|(&symbol, &typed)| (typed as char).eq_ignore_ascii_case(&self.key(symbol)))
    }
}
