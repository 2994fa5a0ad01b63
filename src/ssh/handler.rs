//! Per-connection russh handler.
//!
//! Transport auth lets everyone in (`none` or any public key): the real gate
//! is the in-app password. Each session channel needs a PTY; without one the
//! request is declined with exit status 1. With one, a session task is
//! spawned and the channel's input bytes are decoded and forwarded to it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use russh::server::{Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::state::Viewport;
use crate::ssh::session::{
    self, ChannelSink, PtyInfo, SessionContext, SessionCounter, SessionError, SessionTask,
};
use crate::tui::event::{self, TuiEvent};
use crate::tui::keys::KeyDecoder;

/// Maximum session channels per SSH connection.
pub const MAX_CHANNELS_PER_CONNECTION: usize = 4;
/// Queued input events per session.
pub const EVENT_QUEUE: usize = 256;
/// Queue slots only Submit, Quit and Resize may use.
pub const CONTROL_HEADROOM: usize = 16;
/// Upper bound on the terminal size we allocate frame buffers for.
const MAX_COLS: u16 = 512;
const MAX_ROWS: u16 = 256;

pub const NO_PTY_MESSAGE: &str = "No active terminal, skipping. Connect with `ssh -t`.\r\n";

#[derive(Default)]
struct ChannelState {
    pty: Option<PtyInfo>,
    decoder: KeyDecoder,
    /// Set once the session task is running.
    events: Option<mpsc::Sender<TuiEvent>>,
}

pub struct SshHandler {
    ctx: Arc<SessionContext>,
    conn_id: String,
    peer: SocketAddr,
    shutdown: CancellationToken,
    sessions: SessionCounter,
    channels: HashMap<ChannelId, ChannelState>,
}

impl SshHandler {
    pub fn new(
        ctx: Arc<SessionContext>,
        conn_id: String,
        peer: SocketAddr,
        shutdown: CancellationToken,
        sessions: SessionCounter,
    ) -> Self {
        Self {
            ctx,
            conn_id,
            peer,
            shutdown,
            sessions,
            channels: HashMap::new(),
        }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    fn would_accept_new_channel(&self) -> bool {
        self.channels.len() < MAX_CHANNELS_PER_CONNECTION
    }

    /// Refuse an interactive request that has no terminal behind it.
    fn decline(&mut self, channel: ChannelId, request: &str, session: &mut Session) {
        warn!(
            "[{}] {} request without a PTY from {}, declining",
            self.conn_id, request, self.peer
        );
        let _ = session.channel_success(channel);
        let _ = session.data(channel, CryptoVec::from_slice(NO_PTY_MESSAGE.as_bytes()));
        let _ = session.exit_status_request(channel, 1);
        let _ = session.eof(channel);
        let _ = session.close(channel);
        self.channels.remove(&channel);
    }

    fn forward(&mut self, channel: ChannelId, event: TuiEvent) {
        let Some(sender) = self.channels.get(&channel).and_then(|s| s.events.as_ref()) else {
            return;
        };
        if queue_event(sender, event) == Queued::Dropped {
            warn!("[{}] Input queue full, dropping {:?}", self.conn_id, event);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queued {
    Sent,
    Dropped,
    /// The session is gone; the channel is closing.
    Closed,
}

/// Queue an event without waiting. The handler runs inside the connection
/// loop that also flushes the session's output, so it must never block on
/// the session. Typing and scrolling give way once the queue is down to
/// `CONTROL_HEADROOM` free slots; control events can still use them.
pub fn queue_event(sender: &mpsc::Sender<TuiEvent>, event: TuiEvent) -> Queued {
    let control = matches!(event, TuiEvent::Submit | TuiEvent::Quit | TuiEvent::Resize(..));
    if sender.is_closed() {
        return Queued::Closed;
    }
    if !control && sender.capacity() <= CONTROL_HEADROOM {
        return Queued::Dropped;
    }
    match sender.try_send(event) {
        Ok(()) => Queued::Sent,
        Err(mpsc::error::TrySendError::Full(_)) => Queued::Dropped,
        Err(mpsc::error::TrySendError::Closed(_)) => Queued::Closed,
    }
}

/// Clamp a client-reported size; zero means "unknown" and gets the default.
pub fn pty_viewport(cols: u32, rows: u32) -> Viewport {
    let default = Viewport::default();
    let clamp = |value: u32, max: u16, fallback: u16| match value {
        0 => fallback,
        v => u16::try_from(v).unwrap_or(u16::MAX).min(max),
    };
    Viewport::new(
        clamp(cols, MAX_COLS, default.width),
        clamp(rows, MAX_ROWS, default.height),
    )
}

impl russh::server::Handler for SshHandler {
    type Error = SessionError;

    async fn auth_none(&mut self, user: &str) -> Result<Auth, Self::Error> {
        debug!("[{}] auth none: user={}", self.conn_id, user);
        Ok(Auth::Accept)
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        _public_key: &russh::keys::PublicKey,
    ) -> Result<Auth, Self::Error> {
        debug!("[{}] auth publickey: user={}", self.conn_id, user);
        Ok(Auth::Accept)
    }

    async fn auth_password(&mut self, user: &str, _password: &str) -> Result<Auth, Self::Error> {
        debug!("[{}] auth password rejected: user={}", self.conn_id, user);
        Ok(Auth::Reject {
            proceed_with_methods: None,
            partial_success: false,
        })
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if !self.would_accept_new_channel() {
            warn!(
                "[{}] Max channels per connection ({}) reached",
                self.conn_id, MAX_CHANNELS_PER_CONNECTION
            );
            return Ok(false);
        }
        self.channels.insert(channel.id(), ChannelState::default());
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(russh::Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let Some(state) = self.channels.get_mut(&channel) else {
            let _ = session.channel_failure(channel);
            return Ok(());
        };
        state.pty = Some(PtyInfo {
            term: term.to_string(),
            viewport: pty_viewport(col_width, row_height),
        });
        let _ = session.channel_success(channel);
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let Some(state) = self.channels.get_mut(&channel) else {
            let _ = session.channel_failure(channel);
            return Ok(());
        };
        if state.events.is_some() {
            let _ = session.channel_failure(channel);
            return Ok(());
        }
        let Some(pty) = state.pty.clone() else {
            self.decline(channel, "shell", session);
            return Ok(());
        };

        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        state.events = Some(tx);
        let _ = session.channel_success(channel);

        info!(
            "[{}] Session started: peer={} term={} size={}x{}",
            self.conn_id, self.peer, pty.term, pty.viewport.width, pty.viewport.height
        );
        session::spawn(SessionTask {
            ctx: self.ctx.clone(),
            pty,
            sink: ChannelSink::new(session.handle(), channel),
            events: rx,
            cancel: self.shutdown.child_token(),
            guard: self.sessions.enter(),
            conn_id: self.conn_id.clone(),
        });
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        _data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.decline(channel, "exec", session);
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        debug!("[{}] subsystem {} requested", self.conn_id, name);
        self.decline(channel, "subsystem", session);
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let Some(state) = self.channels.get_mut(&channel) else {
            return Ok(());
        };
        if state.events.is_none() {
            return Ok(());
        }
        let events: Vec<TuiEvent> = state
            .decoder
            .feed(data)
            .into_iter()
            .filter_map(event::from_key)
            .collect();
        for ev in events {
            self.forward(channel, ev);
        }
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let viewport = pty_viewport(col_width, row_height);
        if let Some(pty) = self.channels.get_mut(&channel).and_then(|s| s.pty.as_mut()) {
            pty.viewport = viewport;
        }
        self.forward(channel, TuiEvent::Resize(viewport.width, viewport.height));
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        // Dropping the sender ends the session task.
        self.channels.remove(&channel);
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.channels.remove(&channel);
        Ok(())
    }
}
