use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use tokio_util::sync::CancellationToken;

use termcv::core::config::{self, CliOverrides};
use termcv::core::credential::Argon2Verifier;
use termcv::server::{self, Server};
use termcv::tui::render::Theme;

#[derive(Parser)]
#[command(name = "termcv", about = "A password-gated CV served over SSH")]
struct Args {
    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the SSH host private key
    #[arg(long)]
    host_key: Option<PathBuf>,

    /// Config file (default: ~/.termcv/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Color theme for rendered pages
    #[arg(long, value_enum)]
    theme: Option<Theme>,

    /// Log level for stderr and the log file
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(level: LevelFilter, log_file: Option<&PathBuf>) {
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        match File::create(path) {
            Ok(file) => loggers.push(WriteLogger::new(level, log_config, file)),
            Err(e) => eprintln!("Cannot open log file {}: {}", path.display(), e),
        }
    }
    let _ = CombinedLogger::init(loggers);
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();
    init_logging(args.log_level, args.log_file.as_ref());

    let file_config = match config::load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let cli = CliOverrides {
        host: args.host,
        port: args.port,
        host_key_path: args.host_key,
        theme: args.theme,
    };
    let mut settings = match config::resolve(&file_config, &cli) {
        Ok(s) => s,
        Err(e) => {
            error!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let secret = match config::read_secret() {
        Ok(s) => s,
        Err(e) => {
            error!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    settings.char_limit = config::fit_char_limit(settings.char_limit, &secret);

    // Hash once here; sessions only ever verify.
    let verifier = match Argon2Verifier::from_secret(&secret) {
        Ok(v) => Arc::new(v),
        Err(e) => {
            error!("Credential error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    drop(secret);

    let server = match Server::bind(&settings, verifier).await {
        Ok(s) => s,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            server::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    server.serve(shutdown).await;
    info!("Bye");
    ExitCode::SUCCESS
}
