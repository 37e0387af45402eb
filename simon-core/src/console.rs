//! Text output over the serial link: CRLF lines and ANSI colors

use core::fmt;

use crate::hal::{HalError, SerialLink};

/// ANSI foreground colors used by the game
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Color {
    Normal,
    Red,
    Green,
    Yellow,
    Blue,
    Pink,
    Cyan,
}

impl Color {
    /// Escape sequence selecting this color
    pub const fn code(&self) -> &'static str {
        match self {
            Color::Normal => "\x1B[0m",
            Color::Red => "\x1B[31m",
            Color::Green => "\x1B[32m",
            Color::Yellow => "\x1B[33m",
            Color::Blue => "\x1B[34m",
            Color::Pink => "\x1B[35m",
            Color::Cyan => "\x1B[36m",
        }
    }
}

/// Borrowed writer over a serial link
pub struct Console<'a, S: SerialLink> {
    serial: &'a mut S,
}

impl<'a, S: SerialLink> Console<'a, S> {
    pub fn new(serial: &'a mut S) -> Self {
        Self { serial }
    }

    /// Raw text, no line ending
    pub fn text(&mut self, text: &str) -> Result<(), HalError> {
        self.serial.write_bytes(text.as_bytes())
    }

    /// Text followed by CRLF
    pub fn line(&mut self, text: &str) -> Result<(), HalError> {
        self.text(text)?;
        self.text("\r\n")
    }

    /// Switch color without printing anything else
    pub fn color(&mut self, color: Color) -> Result<(), HalError> {
        self.text(color.code())
    }

    /// A whole line in `color`, color reset afterwards
    pub fn colored(&mut self, color: Color, text: &str) -> Result<(), HalError> {
        self.color(color)?;
        self.line(text)?;
        self.color(Color::Normal)
    }

    /// Formatted text, no line ending
    pub fn print(&mut self, args: fmt::Arguments<'_>) -> Result<(), HalError> {
        fmt::Write::write_fmt(self, args).map_err(|_| HalError::SerialError)
    }

    /// Formatted text followed by CRLF
    pub fn println(&mut self, args: fmt::Arguments<'_>) -> Result<(), HalError> {
        self.print(args)?;
        self.text("\r\n")
    }
}

impl<S: SerialLink> fmt::Write for Console<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.serial.write_bytes(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
