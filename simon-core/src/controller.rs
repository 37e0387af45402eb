//! Command dispatcher and main control loop

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::console::{Color, Console};
use crate::fsm::{QuitAnswer, QuitOutcome, Session, SessionError};
use crate::hal::{HalError, IndicatorBank, PowerControl, SerialLink, SimonHal};
use crate::line::{matches_keyword, InputLine, LineReader, LineStatus};
use crate::supervisor::{IdleEvent, IdleSupervisor};
use crate::types::{GameConfig, Phase, Symbol, TurnResult, MAX_SEQUENCE};

const RESUME_BANNER: &str = "Sleep-Cycle Ended: Welcome back to Simon-Says!";
const TURN_PROMPT: &str = "Its your turn! What did Simon say?";
const QUIT_PROMPT: &str = "Are you sure you want to quit? (yes/no)";
const QUIT_REPROMPT: &str = "Do you still want to quit? (Enter 'yes' or 'no'):";

/// Attempts at getting an in-range draw before giving up
const DRAW_ATTEMPTS: usize = 4;

/// Chase step of the boot LED test, in ms
const CHASE_STEP_MS: u32 = 80;
/// On/off time of the boot all-LED flash, in ms
const FLASH_STEP_MS: u32 = 60;
const SELF_TEST_ROUNDS: usize = 5;

/// One input line classified against the command set
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Command<'a> {
    Help,
    Start,
    Quit,
    Yes,
    No,
    /// Anything else: a guess or free text
    Text(&'a str),
}

impl<'a> Command<'a> {
    /// Classify a line, case-insensitively
    pub fn parse(input: &'a str) -> Self {
        if matches_keyword(input, "help") {
            Command::Help
        } else if matches_keyword(input, "start") {
            Command::Start
        } else if matches_keyword(input, "quit") {
            Command::Quit
        } else if matches_keyword(input, "yes") {
            Command::Yes
        } else if matches_keyword(input, "no") {
            Command::No
        } else {
            Command::Text(input)
        }
    }
}

/// What the dispatcher did with one line
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Help text printed
    Help,
    /// New game started
    Started,
    /// `start` while a game was running
    AlreadyStarted,
    /// Free text echoed back outside a game
    Echo,
    /// Quit confirmation requested
    QuitPrompt,
    /// Answer was neither yes nor no
    QuitReprompt,
    /// Quit confirmed, session reset
    QuitConfirmed,
    /// Quit cancelled, prior phase restored
    QuitCancelled,
    /// Line judged as a guess
    Turn(TurnResult),
}

/// Result of one main-loop iteration
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepOutcome {
    /// Simon extended and played back the sequence
    Presented { length: usize },
    /// Simon could not extend a full sequence; the game ended
    Finished(TurnResult),
    /// A line was read and dispatched
    Line(Action),
    /// The loop restarted after a sleep cycle
    Resumed,
}

/// Result of waiting for a line
enum LineEvent {
    Line(InputLine),
    Resumed,
}

/// Game controller: owns the board and the session, shares the supervisor
/// with the interrupt handlers
pub struct Controller<'a, H: SimonHal> {
    hal: H,
    supervisor: &'a IdleSupervisor,
    config: GameConfig,
    session: Session,
    reader: LineReader,
}

impl<'a, H: SimonHal> Controller<'a, H> {
    pub fn new(hal: H, supervisor: &'a IdleSupervisor, config: GameConfig) -> Self {
        Self {
            session: Session::new(&config),
            hal,
            supervisor,
            config,
            reader: LineReader::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &IdleSupervisor {
        self.supervisor
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    /// Release the board
    pub fn into_hal(self) -> H {
        self.hal
    }

    /// Initialize hardware, run the LED self-test and print the welcome banner
    pub fn boot(&mut self) -> Result<(), HalError> {
        self.hal.initialize()?;
        self.hal.indicators().all_off();

        if self.config.self_test {
            self.self_test();
        }

        let mut console = Console::new(self.hal.serial());
        console.line("")?;
        console.colored(Color::Pink, "Welcome to A Game of Simon-Says!")?;
        console.colored(Color::Yellow, "Type Help for a list of all commands.")?;
        console.colored(Color::Green, "Type Start to begin...")?;

        self.supervisor.reset_idle();
        info!("controller booted");
        Ok(())
    }

    /// Boot, then loop forever; returns only on a hardware error
    pub fn run(&mut self) -> Result<Infallible, HalError> {
        self.boot()?;
        loop {
            self.step()?;
        }
    }

    /// One iteration of the main loop
    ///
    /// On Simon's turn the sequence is extended and played back. Otherwise a
    /// line is read and dispatched; a sleep cycle during the read restarts the
    /// loop with [`StepOutcome::Resumed`] and leaves the session untouched.
    pub fn step(&mut self) -> Result<StepOutcome, HalError> {
        if self.session.simon_to_play() {
            return self.simon_plays();
        }

        match self.read_line()? {
            LineEvent::Resumed => {
                self.resume_banner()?;
                Ok(StepOutcome::Resumed)
            }
            LineEvent::Line(line) => Ok(StepOutcome::Line(self.dispatch(line.as_str())?)),
        }
    }

    /// Route one complete line
    pub fn dispatch(&mut self, input: &str) -> Result<Action, HalError> {
        let command = Command::parse(input);

        if self.session.pending_quit() {
            return self.answer_quit(command);
        }

        match command {
            Command::Help => {
                self.print_help()?;
                Ok(Action::Help)
            }
            Command::Quit => {
                self.session.request_quit();
                Console::new(self.hal.serial()).colored(Color::Red, QUIT_PROMPT)?;
                Ok(Action::QuitPrompt)
            }
            Command::Start if self.session.phase() == Phase::NotStarted => {
                self.session.start().map_err(session_fault)?;
                Console::new(self.hal.serial()).line("Game starting!")?;
                Ok(Action::Started)
            }
            Command::Start => {
                Console::new(self.hal.serial()).line("A game is already in progress.")?;
                Ok(Action::AlreadyStarted)
            }
            _ if self.session.awaiting_guess() => self.guess(input),
            _ => {
                Console::new(self.hal.serial()).println(format_args!("You typed in '{}'", input))?;
                Ok(Action::Echo)
            }
        }
    }

    fn answer_quit(&mut self, command: Command<'_>) -> Result<Action, HalError> {
        let answer = match command {
            Command::Quit => {
                Console::new(self.hal.serial()).colored(Color::Red, QUIT_PROMPT)?;
                return Ok(Action::QuitPrompt);
            }
            Command::Yes => QuitAnswer::Yes,
            Command::No => QuitAnswer::No,
            _ => QuitAnswer::Other,
        };

        let mut console = Console::new(self.hal.serial());
        match self.session.confirm_quit(answer).map_err(session_fault)? {
            QuitOutcome::Quit => {
                console.colored(Color::Yellow, "You've quit. Game resetting!")?;
                info!("quit confirmed");
                Ok(Action::QuitConfirmed)
            }
            QuitOutcome::Cancelled => {
                console.colored(Color::Green, "Not Quitting.")?;
                if self.session.awaiting_guess() {
                    console.line(TURN_PROMPT)?;
                }
                Ok(Action::QuitCancelled)
            }
            QuitOutcome::Reprompt => {
                console.colored(Color::Red, QUIT_REPROMPT)?;
                Ok(Action::QuitReprompt)
            }
        }
    }

    fn guess(&mut self, input: &str) -> Result<Action, HalError> {
        let said = self.session.sequence_text();
        let result = self.session.player_turn(input).map_err(session_fault)?;

        let mut console = Console::new(self.hal.serial());
        match result {
            TurnResult::Matched { .. } => {
                console.println(format_args!("Simon: {} You: {}", said, input))?;
                console.line("That matched! Great Job. Get ready to go again...")?;
            }
            TurnResult::Won { .. } => {
                console.println(format_args!("Simon: {} You: {}", said, input))?;
                console.line("That matched! Simon gives up! YOU WON!")?;
            }
            TurnResult::Lost { score } => {
                console.color(Color::Yellow)?;
                console.println(format_args!(
                    "That didn't match. YOU LOST! Your final score was: {}",
                    score
                ))?;
                console.color(Color::Normal)?;
            }
            TurnResult::Quit => {
                console.line("Game over: You quit!")?;
            }
        }
        Ok(Action::Turn(result))
    }

    fn simon_plays(&mut self) -> Result<StepOutcome, HalError> {
        let mut attempts = 0;
        let length = loop {
            match self.session.simon_turn(self.hal.random()) {
                Ok(sequence) => break sequence.len(),
                Err(SessionError::CapacityExceeded) => {
                    let result = self.session.force_win();
                    Console::new(self.hal.serial()).line("Simon gives up! YOU WON!")?;
                    return Ok(StepOutcome::Finished(result));
                }
                Err(SessionError::DrawOutOfRange(draw)) if attempts + 1 < DRAW_ATTEMPTS => {
                    warn!("random source returned {}, drawing again", draw);
                    attempts += 1;
                }
                Err(SessionError::DrawOutOfRange(draw)) => {
                    warn!("random source returned {} {} times", draw, DRAW_ATTEMPTS);
                    return Err(HalError::RandomError);
                }
                Err(e) => return Err(session_fault(e)),
            }
        };

        self.present()?;
        self.session.presentation_done().map_err(session_fault)?;
        // the player's inactivity window starts at the prompt
        self.supervisor.reset_idle();
        Ok(StepOutcome::Presented { length })
    }

    /// Play back the whole sequence: placeholder, symbol with its LED, erase
    fn present(&mut self) -> Result<(), HalError> {
        let hold = self.config.symbol_display.as_delay_ms();
        let sequence: Vec<Symbol, MAX_SEQUENCE> = self.session.sequence().iter().copied().collect();

        Console::new(self.hal.serial()).text("Simon Says: ")?;
        for symbol in sequence {
            self.hal.power().feed_watchdog();
            {
                let mut console = Console::new(self.hal.serial());
                console.color(Color::Green)?;
                console.text("?")?;
            }
            self.hal.delay().delay_ms(hold);
            {
                let mut console = Console::new(self.hal.serial());
                console.text("\x08")?;
                console.color(Color::Yellow)?;
                console.print(format_args!("{}", self.session.key(symbol)))?;
            }
            self.hal.indicators().activate(symbol);
            self.hal.delay().delay_ms(hold);
            self.hal.indicators().deactivate(symbol);
            {
                let mut console = Console::new(self.hal.serial());
                console.color(Color::Normal)?;
                console.text("\x08 ")?;
            }
        }

        let mut console = Console::new(self.hal.serial());
        console.line("")?;
        console.line(TURN_PROMPT)
    }

    /// Block until a line completes, serving supervisor events meanwhile
    fn read_line(&mut self) -> Result<LineEvent, HalError> {
        loop {
            self.hal.power().feed_watchdog();

            match self.supervisor.take_event() {
                Some(IdleEvent::Warning) => self.idle_warning()?,
                Some(IdleEvent::SleepDue) => {
                    self.sleep()?;
                    return Ok(LineEvent::Resumed);
                }
                // stale wake from a previous cycle
                Some(IdleEvent::Wake) | None => {}
            }

            let Some(byte) = self.hal.serial().read_byte()? else {
                self.hal.power().wait_for_interrupt()?;
                continue;
            };

            if byte != b'\r' && byte != b'\n' {
                self.hal.serial().write_byte(byte)?;
            }

            if let LineStatus::Complete(line) = self.reader.push(byte) {
                self.hal.serial().write_bytes(b"\r\n")?;
                self.supervisor.reset_idle();
                trace!("line complete, {} bytes", line.len());
                return Ok(LineEvent::Line(line));
            }
        }
    }

    fn idle_warning(&mut self) -> Result<(), HalError> {
        let warn = self.supervisor.warn_ticks();
        let remaining = self.supervisor.sleep_ticks().saturating_sub(warn);
        info!("idle for {}s", warn);
        Console::new(self.hal.serial()).println(format_args!(
            "-- Note: No input received for {}s. SleepMode in t-minus {}s --",
            warn, remaining
        ))
    }

    /// Suspend until inbound data wakes the board
    fn sleep(&mut self) -> Result<(), HalError> {
        Console::new(self.hal.serial()).line("Sleep mode activated. Hit enter to wake.")?;
        self.hal.delay().delay_ms(self.config.sleep_grace.as_delay_ms());

        info!("entering sleep");
        self.supervisor.enter_sleep();
        self.hal.power().arm_wake()?;
        while self.supervisor.is_sleeping() {
            self.hal.power().feed_watchdog();
            self.hal.power().wait_for_interrupt()?;
        }
        self.hal.power().disarm_wake()?;

        self.hal.delay().delay_ms(self.config.wake_settle.as_delay_ms());
        let dropped = self.hal.serial().discard_input()?;
        self.reader.clear();
        self.supervisor.take_event();
        self.supervisor.reset_idle();
        info!("woke, discarded {} bytes", dropped);
        Ok(())
    }

    fn resume_banner(&mut self) -> Result<(), HalError> {
        let mut console = Console::new(self.hal.serial());
        console.colored(Color::Pink, RESUME_BANNER)?;
        if self.session.in_game() {
            console.colored(Color::Cyan, "Your game has resumed")?;
        }
        if self.session.pending_quit() {
            console.colored(Color::Red, QUIT_REPROMPT)?;
        } else if self.session.awaiting_guess() {
            console.line(TURN_PROMPT)?;
        }
        Ok(())
    }

    fn print_help(&mut self) -> Result<(), HalError> {
        let max = self.config.max_sequence;
        let mut console = Console::new(self.hal.serial());
        console.line("")?;
        console.color(Color::Red)?;
        console.line("\t-:[ SIMON SAYS UART HELP ]:-\t")?;
        console.line("")?;
        console.color(Color::Blue)?;
        console.line("\t-< How To Play >-\t")?;
        console.line("\t------------------------------------\t")?;
        console.line("\tSimon(CPU) will randomly select a single symbol,")?;
        console.line("\tand add it to a list each round.")?;
        console.line("\tThe player(You) must then type in Simon's growing")?;
        console.line("\tlist of symbols, in order, each round.")?;
        console.line("\tIf the player fails, they are eliminated.")?;
        console.println(format_args!("\tIf the player can recreate a list of {} symbols, they win!", max))?;
        console.line("\t------------------------------------\t")?;
        console.line("")?;
        console.color(Color::Yellow)?;
        console.line("\t-=({  Commands  })=-\t")?;
        console.line("\t------------------------------------\t")?;
        console.line("\tHelp - displays this help text")?;
        console.line("\tQuit - exits the game completely after a confirmation")?;
        console.line("\tStart - begins a new game with Simon, if one is not in progress")?;
        console.line("\t------------------------------------\t")?;
        console.color(Color::Normal)
    }

    /// LED chase forward, backward, then all-flash
    fn self_test(&mut self) {
        for _ in 0..SELF_TEST_ROUNDS {
            for symbol in Symbol::ALL {
                self.blink(symbol, CHASE_STEP_MS);
            }
        }
        for _ in 0..SELF_TEST_ROUNDS {
            for symbol in Symbol::ALL.into_iter().rev() {
                self.blink(symbol, CHASE_STEP_MS);
            }
        }
        for _ in 0..SELF_TEST_ROUNDS {
            self.hal.power().feed_watchdog();
            for symbol in Symbol::ALL {
                self.hal.indicators().activate(symbol);
            }
            self.hal.delay().delay_ms(FLASH_STEP_MS);
            self.hal.indicators().all_off();
            self.hal.delay().delay_ms(FLASH_STEP_MS);
        }
    }

    fn blink(&mut self, symbol: Symbol, ms: u32) {
        self.hal.power().feed_watchdog();
        self.hal.indicators().activate(symbol);
        self.hal.delay().delay_ms(ms);
        self.hal.indicators().deactivate(symbol);
    }
}

/// Session errors the controller's own guards rule out
fn session_fault(error: SessionError) -> HalError {
    warn!("unexpected session error: {}", error);
    HalError::StateError
}
