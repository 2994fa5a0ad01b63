//! # Core Session Logic
//!
//! The password gate as a plain state machine. It knows nothing about SSH,
//! ratatui or crossterm.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Session (state)      │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │  • Verifier (secret)    │
//!                    └───────────┬─────────────┘
//!                                │
//!                    ┌───────────┴───────────┐
//!                    ▼                       ▼
//!             ┌────────────┐          ┌────────────┐
//!             │    TUI     │          │    SSH     │
//!             │  (frames,  │◄─────────│ (channels, │
//!             │   keys)    │          │  sessions) │
//!             └────────────┘          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: the per-connection `Session`
//! - [`action`]: the `Action` enum and `update()`
//! - [`credential`]: the hashed secret behind the `Verifier` trait
//! - [`input`]: the password text field
//! - [`config`]: settings file, env and CLI resolution

pub mod action;
pub mod config;
pub mod credential;
pub mod input;
pub mod state;
