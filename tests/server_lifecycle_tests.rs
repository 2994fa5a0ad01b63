use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use russh::keys::{Algorithm, PrivateKey};
use termcv::core::config::ResolvedConfig;
use termcv::core::credential::{Argon2Verifier, Verifier};
use russh::ChannelMsg;
use russh::client::Msg;
use termcv::server::{Server, ServerError};
use termcv::ssh::handler::NO_PTY_MESSAGE;
use termcv::ssh::keys::HostKeyError;
use termcv::ssh::session::SHUTDOWN_MESSAGE;
use termcv::tui::render::Theme;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helper Functions
// ============================================================================

fn write_host_key() -> PathBuf {
    let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
    let mut pem = Vec::new();
    russh::keys::encode_pkcs8_pem(&key, &mut pem).unwrap();
    let path = std::env::temp_dir().join(format!("termcv-it-key-{}", uuid::Uuid::new_v4()));
    std::fs::write(&path, pem).unwrap();
    path
}

fn settings(host_key_path: PathBuf) -> ResolvedConfig {
    ResolvedConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        host_key_path,
        shutdown_grace_secs: 2,
        idle_timeout_secs: 0,
        theme: Theme::Dark,
        char_limit: 20,
        mask_input: true,
    }
}

fn verifier() -> Arc<dyn Verifier> {
    Arc::new(Argon2Verifier::with_params("hunter2", 1024, 1, 1).unwrap())
}

/// Read the server's SSH identification line.
async fn read_banner(stream: &mut TcpStream) -> String {
    let mut buf = [0u8; 64];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server sent nothing")
        .unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

struct Running {
    addr: std::net::SocketAddr,
    shutdown: CancellationToken,
    serving: JoinHandle<()>,
    key: PathBuf,
}

async fn start(grace_secs: u64) -> Running {
    let key = write_host_key();
    let mut config = settings(key.clone());
    config.shutdown_grace_secs = grace_secs;
    let server = assert_ok!(Server::bind(&config, verifier()).await);
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let serving = tokio::spawn(server.serve(shutdown.clone()));
    Running { addr, shutdown, serving, key }
}

struct Client;

impl russh::client::Handler for Client {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

async fn connect(addr: std::net::SocketAddr) -> russh::client::Handle<Client> {
    let config = Arc::new(russh::client::Config::default());
    let mut handle = russh::client::connect(config, format!("{}", addr), Client)
        .await
        .unwrap();
    let auth = handle.authenticate_none("visitor").await.unwrap();
    assert!(auth.success(), "transport auth should let everyone in");
    handle
}

async fn open_pty_shell(handle: &russh::client::Handle<Client>) -> russh::Channel<Msg> {
    let channel = handle.channel_open_session().await.unwrap();
    channel
        .request_pty(true, "xterm-256color", 80, 24, 0, 0, &[])
        .await
        .unwrap();
    channel.request_shell(true).await.unwrap();
    channel
}

/// Everything the client saw on one channel.
#[derive(Debug, Default)]
struct Transcript {
    text: String,
    exit_status: Option<u32>,
    eof: bool,
    closed: bool,
}

impl Transcript {
    /// Read until `done` holds, the channel ends, or five seconds pass.
    async fn read_until(
        &mut self,
        channel: &mut russh::Channel<Msg>,
        done: impl Fn(&Transcript) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(self) && !self.closed {
            match tokio::time::timeout_at(deadline, channel.wait()).await {
                Ok(Some(ChannelMsg::Data { data })) => {
                    self.text.push_str(&String::from_utf8_lossy(&data));
                }
                Ok(Some(ChannelMsg::ExitStatus { exit_status })) => {
                    self.exit_status = Some(exit_status);
                }
                Ok(Some(ChannelMsg::Eof)) => self.eof = true,
                Ok(Some(ChannelMsg::Close)) | Ok(None) => self.closed = true,
                Ok(Some(_)) => {}
                Err(_) => break,
            }
        }
    }
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_missing_host_key_is_fatal() {
    let path = std::env::temp_dir().join("termcv-it-definitely-missing");
    let err = assert_err!(Server::bind(&settings(path), verifier()).await);
    assert!(matches!(err, ServerError::HostKey(HostKeyError::Missing(_))));
}

#[tokio::test]
async fn test_port_in_use_is_fatal() {
    let key = write_host_key();
    let first = Server::bind(&settings(key.clone()), verifier()).await.unwrap();
    let mut taken = settings(key.clone());
    taken.port = first.local_addr().unwrap().port();

    let err = assert_err!(Server::bind(&taken, verifier()).await);
    assert!(matches!(err, ServerError::Bind(..)));
    std::fs::remove_file(key).ok();
}

// ============================================================================
// Serving and shutdown
// ============================================================================

#[tokio::test]
async fn test_serves_ssh_and_shuts_down() {
    let key = write_host_key();
    let server = assert_ok!(Server::bind(&settings(key.clone()), verifier()).await);
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let serving = tokio::spawn(server.serve(shutdown.clone()));

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert!(read_banner(&mut client).await.starts_with("SSH-2.0-"));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("shutdown did not finish")
        .unwrap();

    assert!(TcpStream::connect(addr).await.is_err(), "listener closed after shutdown");
    std::fs::remove_file(key).ok();
}

#[tokio::test]
async fn test_bad_client_does_not_stop_accepting() {
    let key = write_host_key();
    let server = assert_ok!(Server::bind(&settings(key.clone()), verifier()).await);
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let serving = tokio::spawn(server.serve(shutdown.clone()));

    let mut bad = TcpStream::connect(addr).await.unwrap();
    read_banner(&mut bad).await;
    bad.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    drop(bad);

    let mut good = TcpStream::connect(addr).await.unwrap();
    assert!(read_banner(&mut good).await.starts_with("SSH-"));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("shutdown did not finish")
        .unwrap();
    std::fs::remove_file(key).ok();
}

#[tokio::test]
async fn test_shutdown_does_not_wait_on_silent_clients() {
    let key = write_host_key();
    let mut config = settings(key.clone());
    config.shutdown_grace_secs = 30;
    let server = Server::bind(&config, verifier()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let serving = tokio::spawn(server.serve(shutdown.clone()));

    // Connected but never speaks SSH.
    let mut idle = TcpStream::connect(addr).await.unwrap();
    read_banner(&mut idle).await;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("shutdown waited for the full grace period")
        .unwrap();
    std::fs::remove_file(key).ok();
}

// ============================================================================
// Sessions over a real SSH client
// ============================================================================

#[tokio::test]
async fn test_shell_without_pty_is_declined_then_pty_login_works() {
    let server = start(2).await;

    let declined = connect(server.addr).await;
    let mut channel = declined.channel_open_session().await.unwrap();
    channel.request_shell(true).await.unwrap();
    let mut transcript = Transcript::default();
    transcript.read_until(&mut channel, |t| t.closed).await;

    assert_eq!(transcript.text, NO_PTY_MESSAGE);
    assert_eq!(transcript.exit_status, Some(1));
    assert!(transcript.eof);
    assert!(!declined.is_closed(), "declining a channel keeps the connection");

    let visitor = connect(server.addr).await;
    let mut channel = open_pty_shell(&visitor).await;
    let mut transcript = Transcript::default();
    transcript
        .read_until(&mut channel, |t| t.text.contains("(Press enter to continue)"))
        .await;
    assert!(transcript.text.contains("Hire Me"));

    channel.data(&b"nope\r"[..]).await.unwrap();
    transcript
        .read_until(&mut channel, |t| t.text.contains("Incorrect password"))
        .await;
    assert!(transcript.text.contains("Incorrect password"));

    channel.data(&b"hunter2\r"[..]).await.unwrap();
    transcript
        .read_until(&mut channel, |t| t.text.contains("Experience"))
        .await;
    assert!(transcript.text.contains("Experience"), "CV not shown after login");
    assert!(!transcript.text.contains("hunter2"), "password echoed in clear");

    channel.data(&b"q"[..]).await.unwrap();
    transcript.read_until(&mut channel, |t| t.closed).await;
    assert_eq!(transcript.exit_status, Some(0));

    server.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server.serving)
        .await
        .expect("shutdown did not finish")
        .unwrap();
    std::fs::remove_file(server.key).ok();
}

#[tokio::test]
async fn test_shutdown_mid_login_says_goodbye() {
    let server = start(2).await;

    let visitor = connect(server.addr).await;
    let mut channel = open_pty_shell(&visitor).await;
    let mut transcript = Transcript::default();
    transcript
        .read_until(&mut channel, |t| t.text.contains("(Press enter to continue)"))
        .await;

    channel.data(&b"hun"[..]).await.unwrap();
    transcript
        .read_until(&mut channel, |t| t.text.matches('•').count() >= 3)
        .await;

    let started = Instant::now();
    server.shutdown.cancel();
    transcript.read_until(&mut channel, |t| t.closed).await;
    assert!(transcript.text.contains(SHUTDOWN_MESSAGE.trim_end()));
    assert_eq!(transcript.exit_status, Some(0));

    tokio::time::timeout(Duration::from_secs(5), server.serving)
        .await
        .expect("shutdown did not finish")
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2), "shutdown used up the grace period");
    assert!(TcpStream::connect(server.addr).await.is_err(), "listener closed after shutdown");
    std::fs::remove_file(server.key).ok();
}

#[tokio::test]
async fn test_connections_left_after_grace_are_disconnected() {
    let server = start(0).await;

    let visitor = connect(server.addr).await;
    let mut channel = open_pty_shell(&visitor).await;
    let mut transcript = Transcript::default();
    transcript
        .read_until(&mut channel, |t| t.text.contains("(Press enter to continue)"))
        .await;

    server.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server.serving)
        .await
        .expect("shutdown did not finish")
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !visitor.is_closed() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(visitor.is_closed(), "connection outlived the server");
    std::fs::remove_file(server.key).ok();
}
