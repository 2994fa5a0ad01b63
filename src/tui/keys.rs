//! Raw terminal bytes → crossterm `KeyEvent`s.
//!
//! Over SSH there is no local tty for crossterm to read from, so the byte
//! stream the client sends on the channel is decoded here. Covers printable
//! UTF-8, C0 control keys, CSI (`ESC [`) and SS3 (`ESC O`) sequences for
//! arrows/home/end/delete/paging, and `ESC <char>` as Alt+char.
//!
//! Input may be split across `data` packets at any byte. Incomplete UTF-8 or
//! escape sequences are held until the next `feed`. A lone ESC at the end of
//! a packet is reported as the Esc key straight away.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Longest CSI sequence we are willing to buffer before giving up on it.
const MAX_CSI_LEN: usize = 16;

#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Vec<u8>,
    /// Previous key was a CR; a following LF belongs to the same Enter.
    after_cr: bool,
}

enum Parsed {
    Key(KeyEvent, usize),
    Skip(usize),
    Incomplete,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<KeyEvent> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(data);

        let mut events = Vec::new();
        let mut i = 0;
        while i < buf.len() {
            if self.after_cr && buf[i] == b'\n' {
                self.after_cr = false;
                i += 1;
                continue;
            }
            self.after_cr = buf[i] == b'\r';
            match parse_one(&buf[i..]) {
                Parsed::Key(event, used) => {
                    events.push(event);
                    i += used;
                }
                Parsed::Skip(used) => i += used,
                Parsed::Incomplete => break,
            }
        }
        self.pending = buf.split_off(i);
        events
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn parse_one(bytes: &[u8]) -> Parsed {
    match bytes[0] {
        0x1b => parse_escape(bytes),
        b'\r' | b'\n' => Parsed::Key(key(KeyCode::Enter), 1),
        0x7f | 0x08 => Parsed::Key(key(KeyCode::Backspace), 1),
        b'\t' => Parsed::Key(key(KeyCode::Tab), 1),
        c @ 0x01..=0x1a => {
            let letter = char::from(b'a' + c - 1);
            Parsed::Key(KeyEvent::new(KeyCode::Char(letter), KeyModifiers::CONTROL), 1)
        }
        0x00 | 0x1c..=0x1f => Parsed::Skip(1),
        _ => match parse_char(bytes) {
            Some(Ok((c, used))) => Parsed::Key(key(KeyCode::Char(c)), used),
            Some(Err(skip)) => Parsed::Skip(skip),
            None => Parsed::Incomplete,
        },
    }
}

/// Decode one UTF-8 character. `None` = need more bytes, `Err(n)` = skip n invalid bytes.
fn parse_char(bytes: &[u8]) -> Option<Result<(char, usize), usize>> {
    let len = match bytes[0] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return Some(Err(1)),
    };
    if bytes.len() < len {
        return None;
    }
    match std::str::from_utf8(&bytes[..len]) {
        Ok(s) => s.chars().next().map(|c| Ok((c, len))),
        Err(_) => Some(Err(1)),
    }
}

fn parse_escape(bytes: &[u8]) -> Parsed {
    let Some(&next) = bytes.get(1) else {
        return Parsed::Key(key(KeyCode::Esc), 1);
    };
    match next {
        b'[' => parse_csi(bytes),
        b'O' => match bytes.get(2) {
            None => Parsed::Incomplete,
            Some(&b) => match cursor_key(b) {
                Some(code) => Parsed::Key(key(code), 3),
                None => Parsed::Skip(3),
            },
        },
        0x1b => Parsed::Key(key(KeyCode::Esc), 1),
        _ => match parse_char(&bytes[1..]) {
            Some(Ok((c, used))) => {
                Parsed::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::ALT), 1 + used)
            }
            Some(Err(_)) => Parsed::Key(key(KeyCode::Esc), 1),
            None => Parsed::Incomplete,
        },
    }
}

fn parse_csi(bytes: &[u8]) -> Parsed {
    let Some(offset) = bytes[2..].iter().position(|b| (0x40..=0x7e).contains(b)) else {
        return if bytes.len() > MAX_CSI_LEN {
            Parsed::Skip(bytes.len())
        } else {
            Parsed::Incomplete
        };
    };
    let end = 2 + offset;
    let used = end + 1;
    let params: Vec<u16> = std::str::from_utf8(&bytes[2..end])
        .unwrap_or("")
        .split(';')
        .map(|p| p.parse().unwrap_or(0))
        .collect();
    let modifiers = params.get(1).map_or(KeyModifiers::NONE, |&m| modifier_bits(m));

    let code = match bytes[end] {
        b'~' => match params.first().copied().unwrap_or(0) {
            1 | 7 => Some(KeyCode::Home),
            2 => Some(KeyCode::Insert),
            3 => Some(KeyCode::Delete),
            4 | 8 => Some(KeyCode::End),
            5 => Some(KeyCode::PageUp),
            6 => Some(KeyCode::PageDown),
            _ => None,
        },
        b'Z' => Some(KeyCode::BackTab),
        b => cursor_key(b),
    };
    match code {
        Some(code) => Parsed::Key(KeyEvent::new(code, modifiers), used),
        None => Parsed::Skip(used),
    }
}

fn cursor_key(b: u8) -> Option<KeyCode> {
    match b {
        b'A' => Some(KeyCode::Up),
        b'B' => Some(KeyCode::Down),
        b'C' => Some(KeyCode::Right),
        b'D' => Some(KeyCode::Left),
        b'H' => Some(KeyCode::Home),
        b'F' => Some(KeyCode::End),
        _ => None,
    }
}

/// xterm modifier parameter: value - 1 is a bitmask of shift/alt/ctrl.
fn modifier_bits(param: u16) -> KeyModifiers {
    let bits = param.saturating_sub(1);
    let mut modifiers = KeyModifiers::NONE;
    if bits & 1 != 0 {
        modifiers |= KeyModifiers::SHIFT;
    }
    if bits & 2 != 0 {
        modifiers |= KeyModifiers::ALT;
    }
    if bits & 4 != 0 {
        modifiers |= KeyModifiers::CONTROL;
    }
    modifiers
}
