//! # SSH Adapter
//!
//! russh plumbing: host key loading, the per-connection `Handler`, and the
//! per-channel session task that drives the TUI.

pub mod handler;
pub mod keys;
pub mod session;
