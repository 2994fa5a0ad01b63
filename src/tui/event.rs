use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::core::action::Action;
use crate::core::input::EditCommand;

/// TUI-specific input events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuiEvent {
    // Core actions (passed to core::update)
    Quit,
    Submit,
    Resize(u16, u16),
    InputChar(char),
    Backspace,
    Delete,
    CursorLeft,
    CursorRight,
    CursorHome, // Home - top of the CV once authenticated
    CursorEnd,  // End - bottom of the CV once authenticated
    ClearLine,  // Ctrl+U

    // TUI-local events (handled by the CV page)
    ScrollUp,
    ScrollDown,
    ScrollPageUp,
    ScrollPageDown,
}

/// Map a decoded key press to a `TuiEvent`.
pub fn from_key(key_event: KeyEvent) -> Option<TuiEvent> {
    log::trace!("Key event: {:?} with modifiers {:?}", key_event.code, key_event.modifiers);
    match (key_event.modifiers, key_event.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(TuiEvent::Quit),
        (KeyModifiers::CONTROL, KeyCode::Char('u')) => Some(TuiEvent::ClearLine),
        // Other control and alt chords are not bound.
        (m, KeyCode::Char(_)) if m.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => None,
        (_, KeyCode::Char(c)) => Some(TuiEvent::InputChar(c)),
        (_, KeyCode::Backspace) => Some(TuiEvent::Backspace),
        (_, KeyCode::Delete) => Some(TuiEvent::Delete),
        (_, KeyCode::Enter) => Some(TuiEvent::Submit),
        (_, KeyCode::Esc) => Some(TuiEvent::Quit),
        (_, KeyCode::Left) => Some(TuiEvent::CursorLeft),
        (_, KeyCode::Right) => Some(TuiEvent::CursorRight),
        (_, KeyCode::Home) => Some(TuiEvent::CursorHome),
        (_, KeyCode::End) => Some(TuiEvent::CursorEnd),
        (_, KeyCode::Up) => Some(TuiEvent::ScrollUp),
        (_, KeyCode::Down) => Some(TuiEvent::ScrollDown),
        (_, KeyCode::PageUp) => Some(TuiEvent::ScrollPageUp),
        (_, KeyCode::PageDown) => Some(TuiEvent::ScrollPageDown),
        _ => None,
    }
}

impl TuiEvent {
    /// The core action for this event, or `None` for view-only events.
    pub fn to_action(self) -> Option<Action> {
        match self {
            TuiEvent::Quit => Some(Action::Quit),
            TuiEvent::Submit => Some(Action::Submit),
            TuiEvent::Resize(width, height) => Some(Action::Resize { width, height }),
            TuiEvent::InputChar(c) => Some(Action::Key(c)),
            TuiEvent::Backspace => Some(Action::Edit(EditCommand::Backspace)),
            TuiEvent::Delete => Some(Action::Edit(EditCommand::Delete)),
            TuiEvent::CursorLeft => Some(Action::Edit(EditCommand::Left)),
            TuiEvent::CursorRight => Some(Action::Edit(EditCommand::Right)),
            TuiEvent::CursorHome => Some(Action::Edit(EditCommand::Home)),
            TuiEvent::CursorEnd => Some(Action::Edit(EditCommand::End)),
            TuiEvent::ClearLine => Some(Action::Edit(EditCommand::Clear)),
            TuiEvent::ScrollUp
            | TuiEvent::ScrollDown
            | TuiEvent::ScrollPageUp
            | TuiEvent::ScrollPageDown => None,
        }
    }
}
