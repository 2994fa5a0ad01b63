//! # Line Input
//!
//! The single-line text field the password is typed into. It owns the value
//! and a cursor; rendering lives in the TUI `InputBox` component.
//!
//! The cursor is a *character* index, not a byte offset, so multi-byte input
//! never lands the cursor inside a code point.

/// Default maximum number of characters accepted.
pub const DEFAULT_CHAR_LIMIT: usize = 20;
/// Text shown while the field is empty.
pub const DEFAULT_PLACEHOLDER: &str = "Codeword";

/// Editing commands understood by [`LineInput::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    /// Drop everything typed so far (Ctrl+U).
    Clear,
}

#[derive(Debug, Clone)]
pub struct LineInput {
    value: Vec<char>,
    cursor: usize,
    pub placeholder: String,
    /// Zero means unlimited.
    pub char_limit: usize,
}

impl Default for LineInput {
    fn default() -> Self {
        Self::new(DEFAULT_CHAR_LIMIT)
    }
}

impl LineInput {
    pub fn new(char_limit: usize) -> Self {
        Self {
            value: Vec::new(),
            cursor: 0,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            char_limit,
        }
    }

    /// Insert a character at the cursor.
    ///
    /// Returns `false` when the character was refused (control character or
    /// the field is full).
    pub fn insert(&mut self, c: char) -> bool {
        if c.is_control() {
            return false;
        }
        if self.char_limit > 0 && self.value.len() >= self.char_limit {
            return false;
        }
        self.value.insert(self.cursor, c);
        self.cursor += 1;
        true
    }

    /// Apply an editing command. Returns `true` if anything changed.
    pub fn apply(&mut self, command: EditCommand) -> bool {
        match command {
            EditCommand::Backspace => {
                if self.cursor == 0 {
                    return false;
                }
                self.cursor -= 1;
                self.value.remove(self.cursor);
                true
            }
            EditCommand::Delete => {
                if self.cursor >= self.value.len() {
                    return false;
                }
                self.value.remove(self.cursor);
                true
            }
            EditCommand::Left => {
                let moved = self.cursor > 0;
                self.cursor = self.cursor.saturating_sub(1);
                moved
            }
            EditCommand::Right => {
                let moved = self.cursor < self.value.len();
                if moved {
                    self.cursor += 1;
                }
                moved
            }
            EditCommand::Home => {
                let moved = self.cursor != 0;
                self.cursor = 0;
                moved
            }
            EditCommand::End => {
                let moved = self.cursor != self.value.len();
                self.cursor = self.value.len();
                moved
            }
            EditCommand::Clear => {
                let changed = !self.value.is_empty();
                self.clear();
                changed
            }
        }
    }

    pub fn value(&self) -> String {
        self.value.iter().collect()
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Number of characters typed.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Cursor position in characters (0..=len).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn chars(&self) -> &[char] {
        &self.value
    }
}
