//! # Server Lifecycle
//!
//! ```text
//! bind() ── host key + listener (both fatal on failure)
//!   │
//! serve(token) ── accept loop ──► one task per connection (JoinSet)
//!   │                                 └─► russh session ──► session tasks
//!   ▼ token cancelled
//! stop accepting ─► sessions say goodbye ─► wait up to grace ─► abort rest
//! ```

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use russh::{Disconnect, MethodKind, MethodSet};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::config::ResolvedConfig;
use crate::core::credential::Verifier;
use crate::ssh::handler::SshHandler;
use crate::ssh::keys::{HostKeyError, load_host_key};
use crate::ssh::session::{SessionContext, SessionCounter, SessionError};
use crate::tui::content::Pages;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum ServerError {
    HostKey(HostKeyError),
    Bind(String, io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::HostKey(e) => write!(f, "{}", e),
            ServerError::Bind(addr, e) => write!(f, "cannot listen on {}: {}", addr, e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::HostKey(e) => Some(e),
            ServerError::Bind(_, e) => Some(e),
        }
    }
}

impl From<HostKeyError> for ServerError {
    fn from(e: HostKeyError) -> Self {
        ServerError::HostKey(e)
    }
}

pub struct Server {
    listener: TcpListener,
    ssh_config: Arc<russh::server::Config>,
    ctx: Arc<SessionContext>,
    grace: Duration,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Load the host key and bind the listening socket.
    pub async fn bind(
        settings: &ResolvedConfig,
        verifier: Arc<dyn Verifier>,
    ) -> Result<Self, ServerError> {
        let host_key = load_host_key(&settings.host_key_path)?;
        info!("Loaded host key from {}", settings.host_key_path.display());

        let mut ssh_config = russh::server::Config::default();
        ssh_config.keys.push(host_key);
        ssh_config.methods = MethodSet::from([MethodKind::None, MethodKind::PublicKey].as_slice());
        ssh_config.auth_rejection_time = Duration::from_secs(1);
        ssh_config.auth_rejection_time_initial = Some(Duration::from_secs(0));

        let addr = settings.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind(addr.clone(), e))?;

        let ctx = SessionContext {
            verifier,
            pages: Arc::new(Pages::render(settings.theme)),
            theme: settings.theme,
            mask_input: settings.mask_input,
            char_limit: settings.char_limit,
            idle_timeout: match settings.idle_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        };

        Ok(Self {
            listener,
            ssh_config: Arc::new(ssh_config),
            ctx: Arc::new(ctx),
            grace: Duration::from_secs(settings.shutdown_grace_secs),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled, then drain.
    pub async fn serve(self, shutdown: CancellationToken) {
        let Server { listener, ssh_config, ctx, grace } = self;
        match listener.local_addr() {
            Ok(addr) => info!("Starting SSH server on {}", addr),
            Err(_) => info!("Starting SSH server"),
        }

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let conn_id = Uuid::new_v4().simple().to_string()[..8].to_string();
                        info!("[{}] Connection from {}", conn_id, peer);
                        connections.spawn(serve_connection(
                            ssh_config.clone(),
                            ctx.clone(),
                            socket,
                            peer,
                            conn_id,
                            shutdown.child_token(),
                        ));
                    }
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_join(finished);
                }
            }
        }

        drop(listener);
        info!(
            "Stopping SSH server, draining {} connection(s) (grace {:?})",
            connections.len(),
            grace
        );

        let drained = tokio::time::timeout(grace, async {
            while let Some(finished) = connections.join_next().await {
                log_join(finished);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "Grace period over, aborting {} connection(s)",
                connections.len()
            );
            connections.abort_all();
            while let Some(finished) = connections.join_next().await {
                log_join(finished);
            }
        }
        info!("Shutdown complete");
    }
}

fn log_join(finished: Result<(), tokio::task::JoinError>) {
    match finished {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!("Connection task panicked: {}", e),
        Err(e) => debug!("Connection task aborted: {}", e),
    }
}

async fn serve_connection(
    ssh_config: Arc<russh::server::Config>,
    ctx: Arc<SessionContext>,
    socket: TcpStream,
    peer: SocketAddr,
    conn_id: String,
    shutdown: CancellationToken,
) {
    let started = Instant::now();
    let _ = socket.set_nodelay(true);
    match run_connection(ssh_config, ctx, socket, peer, conn_id.clone(), shutdown).await {
        Ok(()) => info!("[{}] Connection closed after {:.1?}", conn_id, started.elapsed()),
        Err(e) => info!(
            "[{}] Connection ended with error after {:.1?}: {}",
            conn_id,
            started.elapsed(),
            e
        ),
    }
}

async fn run_connection(
    ssh_config: Arc<russh::server::Config>,
    ctx: Arc<SessionContext>,
    socket: TcpStream,
    peer: SocketAddr,
    conn_id: String,
    shutdown: CancellationToken,
) -> Result<(), SessionError> {
    let sessions = SessionCounter::new();
    let handler = SshHandler::new(ctx, conn_id, peer, shutdown.clone(), sessions.clone());

    let mut running = tokio::select! {
        started = russh::server::run_stream(ssh_config, socket, handler) => started?,
        _ = shutdown.cancelled() => return Ok(()),
    };
    let hang_up = HangUpOnDrop::new(running.handle());

    let result = tokio::select! {
        result = &mut running => result,
        _ = shutdown.cancelled() => {
            // Sessions share the token: let them say goodbye first.
            sessions.wait_idle().await;
            let _ = running
                .handle()
                .disconnect(Disconnect::ByApplication, hang_up_reason(), "en".to_string())
                .await;
            running.await
        }
    };
    hang_up.defuse();
    result
}

fn hang_up_reason() -> String {
    "server shutting down".to_string()
}

/// russh drives each connection on a task of its own, which outlives this
/// one. If this task is aborted at the end of the grace period, tell that
/// loop to disconnect; its session tasks then end with it.
struct HangUpOnDrop {
    handle: Option<russh::server::Handle>,
}

impl HangUpOnDrop {
    fn new(handle: russh::server::Handle) -> Self {
        Self { handle: Some(handle) }
    }

    fn defuse(mut self) {
        self.handle = None;
    }
}

impl Drop for HangUpOnDrop {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, hang_up_reason(), "en".to_string())
                    .await;
            });
        }
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, initiating graceful shutdown"),
        _ = terminate => info!("SIGTERM received, initiating graceful shutdown"),
    }
}
