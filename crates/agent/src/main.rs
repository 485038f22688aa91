// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use bb_auth::config::Config;
use bb_auth::polkit;

#[derive(Parser)]
#[command(name = "bb-auth", version, about = "Per-user authentication broker daemon.")]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// One-shot health check; exit 0 iff the daemon answers pong.
    #[arg(long)]
    ping: bool,

    /// Dequeue one pending event and print it as JSON.
    #[arg(long)]
    next: bool,

    /// Respond to a session; the password is read from stdin.
    #[arg(long, value_name = "COOKIE")]
    respond: Option<String>,

    /// Cancel a session.
    #[arg(long, value_name = "COOKIE")]
    cancel: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let socket = cli.config.socket_path();

    if cli.ping {
        std::process::exit(bb_auth::client::ping(&socket));
    }
    if cli.next {
        std::process::exit(bb_auth::client::next(&socket));
    }
    if let Some(ref cookie) = cli.respond {
        std::process::exit(bb_auth::client::respond(&socket, cookie));
    }
    if let Some(ref cookie) = cli.cancel {
        std::process::exit(bb_auth::client::cancel(&socket, cookie));
    }

    cli.config.init_tracing();

    let shutdown = CancellationToken::new();

    // Signal handler: first signal drains, second forces exit.
    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => info!("received SIGTERM"),
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => info!("received SIGINT"),
            }
            sd.cancel();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => info!("received SIGTERM again, forcing exit"),
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => info!("received SIGINT again, forcing exit"),
            }
            std::process::exit(130);
        });
    }

    // The polkit DBus glue attaches through this bridge; without glue the
    // command stream is drained so completions never back up.
    let (link, mut glue) = polkit::polkit_link(64);
    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sd.cancelled() => break,
                    command = glue.commands.recv() => match command {
                        Some(command) => tracing::debug!(?command, "polkit command (no agent glue attached)"),
                        None => break,
                    }
                }
            }
        });
    }

    if let Err(e) = bb_auth::daemon::run(cli.config.daemon_options(), link, shutdown).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
