//! # Session State
//!
//! Core state for one connected terminal session. Domain logic only, no
//! TUI types. Presentation state (scroll offsets) lives in the `tui` module.
//!
//! ```text
//! Session
//! ├── verifier: Arc<dyn Verifier>   // shared, immutable credential check
//! ├── term: String                  // client terminal type, e.g. "xterm-256color"
//! ├── viewport: Viewport            // changes on resize only
//! ├── auth: AuthState               // Unauthenticated → AuthFailed → Authenticated
//! ├── input: LineInput              // password being typed
//! ├── attempt_made: bool            // any submit yet?
//! └── attempts: u32                 // submit counter (diagnostics)
//! ```
//!
//! State changes only happen through `update(session, action)` in action.rs.

use std::fmt;
use std::sync::Arc;

use crate::core::credential::Verifier;
use crate::core::input::LineInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// Still unauthenticated, but the last submit was wrong. Retry is allowed.
    AuthFailed,
    /// Terminal state: never left for the rest of the session.
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(self) -> bool {
        self == AuthState::Authenticated
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::AuthFailed => "auth-failed",
            AuthState::Authenticated => "authenticated",
        };
        f.write_str(label)
    }
}

/// Terminal geometry in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

pub struct Session {
    verifier: Arc<dyn Verifier>,
    pub term: String,
    pub viewport: Viewport,
    pub(crate) auth: AuthState,
    pub input: LineInput,
    pub(crate) attempt_made: bool,
    pub(crate) attempts: u32,
}

impl Session {
    pub fn new(
        verifier: Arc<dyn Verifier>,
        term: impl Into<String>,
        viewport: Viewport,
        input: LineInput,
    ) -> Self {
        Self {
            verifier,
            term: term.into(),
            viewport,
            auth: AuthState::Unauthenticated,
            input,
            attempt_made: false,
            attempts: 0,
        }
    }

    pub fn auth(&self) -> AuthState {
        self.auth
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn attempt_made(&self) -> bool {
        self.attempt_made
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn verifier(&self) -> &dyn Verifier {
        self.verifier.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Input value deliberately omitted: it is a password.
        f.debug_struct("Session")
            .field("term", &self.term)
            .field("viewport", &self.viewport)
            .field("auth", &self.auth)
            .field("input_len", &self.input.len())
            .field("attempt_made", &self.attempt_made)
            .field("attempts", &self.attempts)
            .finish()
    }
}
