// Line-oriented tuning commands assembled one byte at a time
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! A command is one line of the form `<TAG><NUMBER>`, terminated by `\n` or `\r`:
//!
//! | Tag | Effect                                                  |
//! |-----|---------------------------------------------------------|
//! | `S` | setpoint, truncated and clamped to the sensor range     |
//! | `P` | proportional gain                                       |
//! | `I` | integral gain                                           |
//! | `D` | derivative gain                                         |
//!
//! Any other tag is accepted and ignored. Numbers that do not parse apply as zero.

use embedded_io::{Read, ReadReady};
use heapless::Vec;
use log::warn;
use num_traits::float::FloatCore;

use crate::pid::{cast, ControllerConfig};

/// Bytes of number text kept per line. Anything past this is dropped until the terminator.
pub const DEFAULT_LINE_CAPACITY: usize = 16;

/// A completed command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command<F> {
    /// `S`: new setpoint, before truncation and clamping.
    Setpoint(F),
    /// `P`: new proportional gain.
    Kp(F),
    /// `I`: new integral gain.
    Ki(F),
    /// `D`: new derivative gain.
    Kd(F),
    /// A line whose tag selects nothing.
    Unknown {
        /// The first byte of the line.
        tag: u8,
        /// The parsed number, for diagnostics.
        value: F,
    },
}

impl<F: FloatCore> Command<F> {
    /// Builds the command selected by `tag`. Non-finite values are replaced by zero.
    pub fn from_tag(tag: u8, value: F) -> Self {
        let value = if value.is_finite() { value } else { F::zero() };
        match tag {
            b'S' => Command::Setpoint(value),
            b'P' => Command::Kp(value),
            b'I' => Command::Ki(value),
            b'D' => Command::Kd(value),
            tag => Command::Unknown { tag, value },
        }
    }

    /// Returns the tag byte of the line this command came from.
    pub fn tag(&self) -> u8 {
        match self {
            Command::Setpoint(_) => b'S',
            Command::Kp(_) => b'P',
            Command::Ki(_) => b'I',
            Command::Kd(_) => b'D',
            Command::Unknown { tag, .. } => *tag,
        }
    }

    /// Returns the number carried by the command.
    pub fn value(&self) -> F {
        match *self {
            Command::Setpoint(v) | Command::Kp(v) | Command::Ki(v) | Command::Kd(v) => v,
            Command::Unknown { value, .. } => value,
        }
    }

    /// Applies the command to `config`.
    ///
    /// # Returns
    /// `true` if a field was written, `false` for [`Command::Unknown`].
    pub fn apply(&self, config: &mut ControllerConfig<F>) -> bool {
        let value = self.value();
        let finite = if value.is_finite() { value } else { F::zero() };
        let written = match self {
            Command::Setpoint(_) => {
                config.set_setpoint(finite);
                Ok(())
            }
            Command::Kp(_) => config.set_kp(finite),
            Command::Ki(_) => config.set_ki(finite),
            Command::Kd(_) => config.set_kd(finite),
            Command::Unknown { .. } => return false,
        };
        written.is_ok()
    }
}

/// Where the interpreter is within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Waiting for the tag byte of the next line.
    Idle,
    /// Tag received; accumulating number text until a terminator.
    Collecting,
}

/// Assembles [`Command`]s from a byte stream without ever blocking.
///
/// ```
/// use pid_loop::command::{Command, CommandInterpreter};
///
/// let mut interpreter = CommandInterpreter::<16>::new();
/// let mut parsed = None;
/// for &byte in b"P0.6\n" {
///     parsed = interpreter.push::<f32>(byte).or(parsed);
/// }
/// assert_eq!(parsed, Some(Command::Kp(0.6)));
/// ```
#[derive(Debug, Clone)]
pub struct CommandInterpreter<const N: usize = DEFAULT_LINE_CAPACITY> {
    state: ParserState,
    tag: u8,
    text: Vec<u8, N>,
    dropped: u16,
}

impl<const N: usize> Default for CommandInterpreter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CommandInterpreter<N> {
    /// Creates an idle interpreter with an empty line buffer.
    pub const fn new() -> Self {
        Self {
            state: ParserState::Idle,
            tag: 0,
            text: Vec::new(),
            dropped: 0,
        }
    }

    /// Returns whether a line is partially assembled.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Returns the number text collected so far on the current line.
    pub fn pending(&self) -> &[u8] {
        &self.text
    }

    /// Returns how many bytes of the current line did not fit. Saturates at `u16::MAX`.
    pub fn dropped(&self) -> u16 {
        self.dropped
    }

    /// Feeds one byte.
    ///
    /// # Returns
    /// The completed command when `byte` terminates a line, `None` otherwise.
    pub fn push<F: FloatCore>(&mut self, byte: u8) -> Option<Command<F>> {
        let terminator = matches!(byte, b'\n' | b'\r');
        match self.state {
            // A stray terminator, e.g. the `\n` of a `\r\n` pair
            ParserState::Idle if terminator => None,
            ParserState::Idle => {
                self.tag = byte;
                self.state = ParserState::Collecting;
                None
            }
            ParserState::Collecting if terminator => Some(self.finish()),
            ParserState::Collecting => {
                if self.text.push(byte).is_err() {
                    self.dropped = self.dropped.saturating_add(1);
                }
                None
            }
        }
    }

    /// Reads at most one byte from `serial`, if one is already waiting, and feeds it.
    ///
    /// # Returns
    /// - `Ok(Some(command))` if that byte completed a line.
    /// - `Ok(None)` if nothing was waiting or the line is still incomplete.
    /// - `Err(e)` if the transport failed.
    pub fn poll<F, R>(&mut self, serial: &mut R) -> Result<Option<Command<F>>, R::Error>
    where
        F: FloatCore,
        R: Read + ReadReady,
    {
        if !serial.read_ready()? {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        if serial.read(&mut byte)? == 0 {
            return Ok(None);
        }
        Ok(self.push(byte[0]))
    }

    fn finish<F: FloatCore>(&mut self) -> Command<F> {
        if self.dropped > 0 {
            warn!(
                "command line longer than {} bytes, dropped {} trailing bytes",
                N, self.dropped
            );
        }
        let command = Command::from_tag(self.tag, cast(parse_number(&self.text)));
        self.text.clear();
        self.dropped = 0;
        self.state = ParserState::Idle;
        command
    }
}

/// Parses the longest decimal prefix of `text` the way C's `atof` does.
///
/// Leading whitespace is skipped, then an optional sign, digits with an optional fractional part,
/// and an optional exponent are consumed. Trailing garbage is ignored. Returns zero if no digits
/// are found or the value overflows.
///
/// ```
/// use pid_loop::command::parse_number;
///
/// assert_eq!(parse_number(b"1.25"), 1.25);
/// assert_eq!(parse_number(b" -3e2x"), -300.0);
/// assert_eq!(parse_number(b"abc"), 0.0);
/// ```
pub fn parse_number(text: &[u8]) -> f64 {
    let start = text
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(text.len());
    let bytes = &text[start..];

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    core::str::from_utf8(&bytes[..end])
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
