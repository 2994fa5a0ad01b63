//! # Session Task
//!
//! One task per interactive channel. It owns the `Session`, the view state
//! and the off-screen terminal, and it is the only writer to its channel.
//!
//! ```text
//! handler ──TuiEvent──► run() ──frame bytes──► FrameSink ──► client
//!                         ▲
//!          cancel token ──┘ (shutdown), idle timer, Quit, disconnect
//! ```
//!
//! Events are handled strictly in arrival order and each frame is written
//! before the next event is read. A supervisor task awaits the session task
//! so a panic or error there ends only this channel.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use russh::server::Handle;
use russh::{ChannelId, CryptoVec};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::action::Effect;
use crate::core::credential::Verifier;
use crate::core::input::LineInput;
use crate::core::state::{Session, Viewport};
use crate::tui::content::Pages;
use crate::tui::event::TuiEvent;
use crate::tui::render::Theme;
use crate::tui::{SessionTerminal, ViewState, dispatch};

pub const SHUTDOWN_MESSAGE: &str = "Server is shutting down. Bye!\r\n";
pub const IDLE_MESSAGE: &str = "Session closed after being idle for too long.\r\n";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum SessionError {
    Ssh(russh::Error),
    Io(io::Error),
    /// The client went away while we were writing.
    ChannelClosed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Ssh(e) => write!(f, "SSH error: {}", e),
            SessionError::Io(e) => write!(f, "terminal I/O error: {}", e),
            SessionError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Ssh(e) => Some(e),
            SessionError::Io(e) => Some(e),
            SessionError::ChannelClosed => None,
        }
    }
}

impl From<russh::Error> for SessionError {
    fn from(e: russh::Error) -> Self {
        SessionError::Ssh(e)
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        SessionError::Io(e)
    }
}

// ============================================================================
// Shared per-server context
// ============================================================================

/// Read-only values every session needs. Shared by `Arc`.
pub struct SessionContext {
    pub verifier: Arc<dyn Verifier>,
    pub pages: Arc<Pages>,
    pub theme: Theme,
    pub mask_input: bool,
    pub char_limit: usize,
    /// `None` disables the idle timeout.
    pub idle_timeout: Option<Duration>,
}

/// Terminal details from the client's `pty-req`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyInfo {
    pub term: String,
    pub viewport: Viewport,
}

// ============================================================================
// Output
// ============================================================================

/// Where a session's output goes.
#[async_trait]
pub trait FrameSink: Send {
    async fn write(&mut self, bytes: Vec<u8>) -> Result<(), SessionError>;
    async fn exit_status(&mut self, status: u32) -> Result<(), SessionError>;
    /// Send EOF and close the channel.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// `FrameSink` over a russh connection handle.
#[derive(Clone)]
pub struct ChannelSink {
    handle: Handle,
    channel: ChannelId,
}

impl ChannelSink {
    pub fn new(handle: Handle, channel: ChannelId) -> Self {
        Self { handle, channel }
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn write(&mut self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.handle
            .data(self.channel, CryptoVec::from_slice(&bytes))
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    async fn exit_status(&mut self, status: u32) -> Result<(), SessionError> {
        self.handle
            .exit_status_request(self.channel, status)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        // EOF may fail if the client already closed; closing still matters.
        let _ = self.handle.eof(self.channel).await;
        self.handle
            .close(self.channel)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }
}

// ============================================================================
// Session loop
// ============================================================================

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    Disconnected,
    IdleTimeout,
    Shutdown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionEnd::Quit => "quit",
            SessionEnd::Disconnected => "disconnected",
            SessionEnd::IdleTimeout => "idle timeout",
            SessionEnd::Shutdown => "server shutdown",
        };
        f.write_str(label)
    }
}

async fn idle(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

async fn write_frame<S: FrameSink>(sink: &mut S, bytes: Vec<u8>) -> Result<(), SessionError> {
    if bytes.is_empty() {
        return Ok(());
    }
    sink.write(bytes).await
}

/// Drive one session until it quits, disconnects, idles out or is cancelled.
pub async fn run<S: FrameSink>(
    ctx: &SessionContext,
    pty: PtyInfo,
    sink: &mut S,
    mut events: mpsc::Receiver<TuiEvent>,
    cancel: CancellationToken,
) -> Result<SessionEnd, SessionError> {
    let input = LineInput::new(ctx.char_limit);
    let mut session = Session::new(ctx.verifier.clone(), pty.term, pty.viewport, input);
    let mut view = ViewState::new(ctx.pages.clone(), ctx.theme, ctx.mask_input);
    let mut terminal = SessionTerminal::new(session.viewport)?;

    write_frame(sink, terminal.open()?).await?;
    write_frame(sink, terminal.draw(&session, &mut view)?).await?;

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break SessionEnd::Shutdown,
            event = events.recv() => event,
            _ = idle(ctx.idle_timeout) => break SessionEnd::IdleTimeout,
        };
        let Some(event) = next else {
            break SessionEnd::Disconnected;
        };

        if let TuiEvent::Resize(width, height) = event {
            terminal.resize(Viewport::new(width, height))?;
        }
        match dispatch(&mut session, &mut view, event) {
            Effect::Quit => break SessionEnd::Quit,
            Effect::Redraw => write_frame(sink, terminal.draw(&session, &mut view)?).await?,
            Effect::None => {}
        }
    };
    debug!("Session finished: {:?}, auth={}", end, session.auth());

    if end == SessionEnd::Disconnected {
        // The client may only have sent EOF; make sure the channel goes away.
        let _ = sink.close().await;
        return Ok(end);
    }

    let mut goodbye = terminal.close()?;
    match end {
        SessionEnd::Shutdown => goodbye.extend_from_slice(SHUTDOWN_MESSAGE.as_bytes()),
        SessionEnd::IdleTimeout => goodbye.extend_from_slice(IDLE_MESSAGE.as_bytes()),
        _ => {}
    }
    write_frame(sink, goodbye).await?;
    sink.exit_status(0).await?;
    sink.close().await?;
    Ok(end)
}

// ============================================================================
// Supervision
// ============================================================================

/// Number of live session tasks, with a wait for "none left".
#[derive(Clone, Default)]
pub struct SessionCounter {
    inner: Arc<CounterInner>,
}

#[derive(Default)]
struct CounterInner {
    active: AtomicUsize,
    idle: Notify,
}

/// Decrements the counter on drop, including on panic unwinding.
pub struct SessionGuard {
    inner: Arc<CounterInner>,
}

impl SessionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> SessionGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        SessionGuard { inner: self.inner.clone() }
    }

    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Resolves once no session is live.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Everything a session task needs, moved into it on spawn.
pub struct SessionTask<S> {
    pub ctx: Arc<SessionContext>,
    pub pty: PtyInfo,
    pub sink: S,
    pub events: mpsc::Receiver<TuiEvent>,
    pub cancel: CancellationToken,
    pub guard: SessionGuard,
    pub conn_id: String,
}

/// Spawn the session and a supervisor that logs how it ended and closes the
/// channel if the session died without doing so.
pub fn spawn<S>(task: SessionTask<S>) -> JoinHandle<()>
where
    S: FrameSink + Clone + 'static,
{
    let SessionTask { ctx, pty, sink, events, cancel, guard, conn_id } = task;
    let mut fallback = sink.clone();

    let session = tokio::spawn(async move {
        let mut sink = sink;
        run(&ctx, pty, &mut sink, events, cancel).await
    });

    tokio::spawn(async move {
        let _guard = guard;
        let started = Instant::now();
        match session.await {
            Ok(Ok(end)) => {
                info!("[{}] Session ended ({}) after {:.1?}", conn_id, end, started.elapsed());
            }
            Ok(Err(SessionError::ChannelClosed)) => {
                info!("[{}] Session ended (client gone) after {:.1?}", conn_id, started.elapsed());
            }
            Ok(Err(e)) => {
                warn!("[{}] Session failed: {}", conn_id, e);
                let _ = fallback.close().await;
            }
            Err(e) if e.is_panic() => {
                error!("[{}] Session task panicked; closing its channel", conn_id);
                let _ = fallback.close().await;
            }
            Err(e) => {
                warn!("[{}] Session task cancelled: {}", conn_id, e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSink, SinkRecord, test_verifier};

    fn context(idle_timeout: Option<Duration>) -> SessionContext {
        SessionContext {
            verifier: test_verifier("hunter2"),
            pages: Arc::new(Pages::render(Theme::Dark)),
            theme: Theme::Dark,
            mask_input: true,
            char_limit: 20,
            idle_timeout,
        }
    }

    fn pty() -> PtyInfo {
        PtyInfo {
            term: "xterm-256color".to_string(),
            viewport: Viewport::default(),
        }
    }

    fn typed(text: &str) -> Vec<TuiEvent> {
        text.chars().map(TuiEvent::InputChar).collect()
    }

    /// Feed `events` then close the queue; returns the session result and sink.
    async fn drive(events: Vec<TuiEvent>) -> (SessionEnd, RecordingSink) {
        let ctx = context(None);
        let (tx, rx) = mpsc::channel(64);
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);
        let mut sink = RecordingSink::new();
        let end = run(&ctx, pty(), &mut sink, rx, CancellationToken::new())
            .await
            .unwrap();
        (end, sink)
    }

    #[tokio::test]
    async fn test_successful_login_shows_cv_then_quit() {
        let mut events = typed("hunter2");
        events.push(TuiEvent::Submit);
        events.push(TuiEvent::InputChar('q'));

        let (end, sink) = drive(events).await;
        assert_eq!(end, SessionEnd::Quit);
        let out = sink.output();
        assert!(out.contains("Experience"));
        assert!(!out.contains("Incorrect password"));
        assert!(!out.contains("hunter2"), "password must never be echoed");
        assert!(out.contains("\x1b[?1049l"), "alternate screen left on exit");

        let records = sink.records();
        let n = records.len();
        assert_eq!(records[n - 2], SinkRecord::ExitStatus(0));
        assert_eq!(records[n - 1], SinkRecord::Close);
    }

    #[tokio::test]
    async fn test_wrong_password_shows_notice() {
        let mut events = typed("wrong");
        events.push(TuiEvent::Submit);
        events.push(TuiEvent::Quit);

        let (end, sink) = drive(events).await;
        assert_eq!(end, SessionEnd::Quit);
        assert!(sink.output().contains("Incorrect password"));
        assert!(!sink.output().contains("Experience"));
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let mut events = typed("wrong");
        events.push(TuiEvent::Submit);
        events.extend(typed("hunter2"));
        events.push(TuiEvent::Submit);
        events.push(TuiEvent::Quit);

        let (_, sink) = drive(events).await;
        assert!(sink.output().contains("Experience"));
    }

    #[tokio::test]
    async fn test_q_before_auth_does_not_quit() {
        let (end, sink) = drive(typed("q")).await;
        assert_eq!(end, SessionEnd::Disconnected);
        assert!(sink.closed());
        assert!(!sink.records().iter().any(|r| matches!(r, SinkRecord::ExitStatus(_))));
    }

    #[tokio::test]
    async fn test_resize_redraws_at_new_size() {
        let (end, sink) = drive(vec![TuiEvent::Resize(120, 40), TuiEvent::Quit]).await;
        assert_eq!(end, SessionEnd::Quit);
        // Three writes before the goodbye: open, first frame, resized frame.
        let frames = sink
            .records()
            .iter()
            .filter(|r| matches!(r, SinkRecord::Frame(_)))
            .count();
        assert_eq!(frames, 4);
    }

    #[tokio::test]
    async fn test_cancel_says_goodbye() {
        let ctx = context(None);
        let (_tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = RecordingSink::new();

        let end = run(&ctx, pty(), &mut sink, rx, cancel).await.unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
        assert!(sink.output().contains(SHUTDOWN_MESSAGE));
        assert!(sink.closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ends_session() {
        let ctx = context(Some(Duration::from_secs(30)));
        let (_tx, rx) = mpsc::channel(8);
        let mut sink = RecordingSink::new();

        let end = run(&ctx, pty(), &mut sink, rx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(end, SessionEnd::IdleTimeout);
        assert!(sink.output().contains(IDLE_MESSAGE));
    }

    #[tokio::test]
    async fn test_sessions_run_independently() {
        let ctx = Arc::new(context(None));
        let (tx_a, rx_a) = mpsc::channel(64);
        let (tx_b, rx_b) = mpsc::channel(64);
        let mut sink_a = RecordingSink::new();
        let mut sink_b = RecordingSink::new();

        for e in typed("hunter2").into_iter().chain([TuiEvent::Submit, TuiEvent::Quit]) {
            tx_a.send(e).await.unwrap();
        }
        for e in typed("nope").into_iter().chain([TuiEvent::Submit, TuiEvent::Quit]) {
            tx_b.send(e).await.unwrap();
        }

        let (a, b) = tokio::join!(
            run(&ctx, pty(), &mut sink_a, rx_a, CancellationToken::new()),
            run(&ctx, pty(), &mut sink_b, rx_b, CancellationToken::new()),
        );
        assert_eq!(a.unwrap(), SessionEnd::Quit);
        assert_eq!(b.unwrap(), SessionEnd::Quit);
        assert!(sink_a.output().contains("Experience"));
        assert!(!sink_b.output().contains("Experience"));
        assert!(sink_b.output().contains("Incorrect password"));
    }

    #[derive(Clone, Default)]
    struct PanickingSink {
        inner: RecordingSink,
    }

    #[async_trait]
    impl FrameSink for PanickingSink {
        async fn write(&mut self, _bytes: Vec<u8>) -> Result<(), SessionError> {
            panic!("sink exploded");
        }

        async fn exit_status(&mut self, status: u32) -> Result<(), SessionError> {
            self.inner.exit_status(status).await
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_supervisor_contains_panic() {
        let counter = SessionCounter::new();
        let sink = PanickingSink::default();
        let (_tx, rx) = mpsc::channel(8);

        let supervisor = spawn(SessionTask {
            ctx: Arc::new(context(None)),
            pty: pty(),
            sink: sink.clone(),
            events: rx,
            cancel: CancellationToken::new(),
            guard: counter.enter(),
            conn_id: "test".to_string(),
        });

        supervisor.await.unwrap();
        assert!(sink.inner.closed(), "channel closed after the panic");
        assert_eq!(counter.active(), 0);
    }

    #[tokio::test]
    async fn test_counter_wait_idle() {
        let counter = SessionCounter::new();
        counter.wait_idle().await;

        let guard = counter.enter();
        assert_eq!(counter.active(), 1);
        let waiter = tokio::spawn({
            let counter = counter.clone();
            async move { counter.wait_idle().await }
        });
        drop(guard);
        waiter.await.unwrap();
        assert_eq!(counter.active(), 0);
    }
}
