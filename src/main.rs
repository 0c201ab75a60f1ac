use std::process::ExitCode;

use tollgate::{Config, LogFormat, Server, routes};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            // No subscriber yet: the log format itself comes from the config.
            eprintln!("tollgate: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(config: Config) -> Result<(), tollgate::Error> {
    let registry = config.load_registry()?;
    info!(
        keys = registry.len(),
        timeout_secs = config.pipeline.request_timeout.as_secs(),
        max_body_bytes = config.pipeline.max_body_bytes,
        trust_proxy_headers = config.pipeline.trust_proxy_headers,
        "configuration loaded",
    );

    let app = routes::app(registry, &config.pipeline);
    Server::bind(config.addr)
        .max_body_bytes(config.pipeline.max_body_bytes)
        .body_timeout(config.pipeline.request_timeout)
        .serve(app)
        .await
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "tollgate=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}
