// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use bb_auth_pinentry::session::{PinentrySession, SocketTransport};

#[derive(Parser)]
#[command(
    name = "bb-auth-pinentry",
    version,
    about = "Assuan pinentry front-end for the bb-auth daemon."
)]
struct Cli {
    /// Override the control socket path.
    #[arg(long, env = "BB_AUTH_SOCKET")]
    socket: Option<std::path::PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    // The protocol owns stdout; logs go to stderr only.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let socket = cli.socket.unwrap_or_else(bb_auth::paths::default_socket_path);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut session =
        PinentrySession::new(stdin.lock(), stdout.lock(), SocketTransport::new(socket));

    if let Err(e) = session.run() {
        error!("pinentry session failed: {e:#}");
        std::process::exit(1);
    }
}
