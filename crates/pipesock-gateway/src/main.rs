use clap::Parser;
use pipesock_core::PipesockConfig;
use pipesock_hub::{Hub, HubConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};

mod app;
mod cli;
mod http;
mod source;
mod ws;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // stdout belongs to pass-through output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipesock_gateway=info,pipesock_hub=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // load config: --config > PIPESOCK_CONFIG env > ~/.pipesock/pipesock.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("PIPESOCK_CONFIG").ok());
    let config = PipesockConfig::load_with(config_path.as_deref(), cli.overrides())?;

    let view_dir = config.view.resolve_dir()?;
    if !view_dir.is_dir() {
        warn!(path = %view_dir.display(), "view directory does not exist, / will return 404");
    }

    let hub = Hub::spawn(HubConfig::from(&config.hub));

    let pass_through = config.source.pass_through;
    let source_hub = hub.clone();
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        let echo = pass_through.then(tokio::io::stdout);
        let stats = source::run(stdin, echo, source_hub).await;
        info!(
            forwarded = stats.forwarded,
            skipped = stats.skipped,
            "input source finished"
        );
    });

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("PIPESOCK_GIT_SHA"),
        delay_ms = config.hub.delay_ms,
        history = config.hub.buffer_size,
        view = %view_dir.display(),
        "pipesock listening on {}",
        addr
    );

    let state = Arc::new(app::AppState::new(config, hub, view_dir));
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
