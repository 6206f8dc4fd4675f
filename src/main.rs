use std::process::ExitCode;

use cabsync::{start_server, Config};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "cabsync=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt().with_env_filter(filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Environment misconfigured: {err}");
            return ExitCode::FAILURE;
        }
    };

    match start_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
