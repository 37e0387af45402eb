//! Line assembly for serial input and the shared keyword comparison

use heapless::String;

use crate::types::LINE_CAPACITY;

/// Usable characters in one line; the last buffer slot is the terminator
pub const LINE_CHARS: usize = LINE_CAPACITY - 1;

/// Case-insensitive exact comparison used for every command and guess check
pub fn matches_keyword(input: &str, keyword: &str) -> bool {
    input.eq_ignore_ascii_case(keyword)
}

/// One received line, without its terminator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputLine {
    text: String<LINE_CHARS>,
    truncated: bool,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    /// True when input ran past the buffer and was cut
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<&str> for InputLine {
    fn from(text: &str) -> Self {
        let mut line = InputLine::new();
        for c in text.chars() {
            if line.text.push(c).is_err() {
                line.truncated = true;
                break;
            }
        }
        line
    }
}

/// Progress of the line being assembled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineStatus {
    /// More bytes needed
    Pending,
    /// Terminator seen, or buffer full
    Complete(InputLine),
}

/// Accumulates bytes into lines terminated by `\r` or `\n`
///
/// Bytes past the buffer of an overlong line are dropped; the truncated line
/// is delivered when its terminator arrives.
#[derive(Debug, Default)]
pub struct LineReader {
    current: InputLine,
    after_cr: bool,
    discarding: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            current: InputLine { text: String::new(), truncated: false },
            after_cr: false,
            discarding: false,
        }
    }

    /// Feed one received byte
    pub fn push(&mut self, byte: u8) -> LineStatus {
        let after_cr = core::mem::replace(&mut self.after_cr, byte == b'\r');

        match byte {
            // second half of a CRLF pair
            b'\n' if after_cr => LineStatus::Pending,
            b'\r' | b'\n' => {
                self.discarding = false;
                LineStatus::Complete(self.take())
            }
            _ if self.discarding => LineStatus::Pending,
            _ => {
                let c = if byte.is_ascii() { byte as char } else { '?' };
                if self.current.text.push(c).is_err() {
                    warn!("input line exceeds {} bytes, truncated", LINE_CAPACITY);
                    self.current.truncated = true;
                    self.discarding = true;
                }
                LineStatus::Pending
            }
        }
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.current = InputLine::new();
        self.after_cr = false;
        self.discarding = false;
    }

    /// True while the tail of an overlong line is being dropped
    pub fn discarding(&self) -> bool {
        self.discarding
    }

    /// Bytes collected so far
    pub fn pending(&self) -> &str {
        self.current.as_str()
    }

    fn take(&mut self) -> InputLine {
        core::mem::take(&mut self.current)
    }
}
