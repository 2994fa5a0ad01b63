//! # Actions
//!
//! Everything that can happen in a session becomes an `Action`.
//! User presses Enter? That's `Action::Submit`.
//! Client resizes the window? That's `Action::Resize { .. }`.
//!
//! The `update()` function takes the current state and an action, mutates the
//! state and returns an `Effect` telling the caller what to do next. The only
//! outside call is the credential check, behind the `Verifier` trait.
//!
//! ```text
//! Session + Action  →  update()  →  Session' + Effect
//! ```

use log::{debug, info, warn};

use crate::core::input::EditCommand;
use crate::core::state::{AuthState, Session, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Resize { width: u16, height: u16 },
    /// A printable character typed by the user.
    Key(char),
    /// Text-field editing (backspace, cursor moves, clear).
    Edit(EditCommand),
    /// Enter pressed.
    Submit,
    /// Ctrl+C / Esc.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing visible changed.
    None,
    /// State changed; draw a new frame.
    Redraw,
    /// End the session.
    Quit,
}

pub fn update(session: &mut Session, action: Action) -> Effect {
    match action {
        Action::Resize { width, height } => {
            session.viewport = Viewport::new(width, height);
            Effect::Redraw
        }
        Action::Key(c) => {
            if session.is_authenticated() {
                // The CV page has no text field; `q` leaves.
                return if c == 'q' { Effect::Quit } else { Effect::None };
            }
            if session.input.insert(c) {
                Effect::Redraw
            } else {
                Effect::None
            }
        }
        Action::Edit(command) => {
            if session.is_authenticated() {
                return Effect::None;
            }
            if session.input.apply(command) {
                Effect::Redraw
            } else {
                Effect::None
            }
        }
        Action::Submit => submit(session),
        Action::Quit => Effect::Quit,
    }
}

fn submit(session: &mut Session) -> Effect {
    if session.is_authenticated() {
        return Effect::None;
    }

    session.attempt_made = true;
    session.attempts += 1;

    let attempt = session.input.value();
    let matched = match session.verifier().verify(&attempt) {
        Ok(matched) => matched,
        Err(e) => {
            warn!("Credential check errored, counting as failed attempt: {}", e);
            false
        }
    };

    if matched {
        info!("Session authenticated after {} attempt(s)", session.attempts);
        session.auth = AuthState::Authenticated;
    } else {
        debug!("Incorrect password (attempt {})", session.attempts);
        session.auth = AuthState::AuthFailed;
    }
    // Never leave a password on screen, right or wrong.
    session.input.clear();

    Effect::Redraw
}
