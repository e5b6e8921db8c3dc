use std::process::ExitCode;
use std::sync::Arc;

use api_gate::config::Args;
use api_gate::handlers::router;
use api_gate::logging;
use api_gate::state::AppState;
use api_gate::worker::sweep_worker;
use clap::Parser;
use tokio::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // parse cli arguments
    let args = Args::parse();

    if let Err(e) = logging::init(args.audit_log.as_deref()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let state = match AppState::from_args(&args) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.sweep_interval > 0 {
        let every = Duration::from_secs(args.sweep_interval);
        tokio::spawn(sweep_worker(Arc::clone(&state), every));
    }

    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Cannot bind {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Gate running on http://localhost:{}", args.port);
    info!("Credential header: {}", args.header);
    info!(
        "Rate limit: {} requests per {} seconds, block after {} violation(s)",
        args.rate_limit, args.time_window, args.alert_threshold
    );
    match args.block_duration {
        Some(secs) => info!("Blocks expire after {secs} seconds"),
        None => info!("Blocks last until restart"),
    }

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
