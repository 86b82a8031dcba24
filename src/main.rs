//! Newsdeck — Binary Entrypoint
//! Boots the feed engine, wires the stream transport, and runs until Ctrl-C.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsdeck::{ClientConfig, FeedEngine, HttpPostsGateway, SseClient};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsdeck=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ClientConfig::load_default()?;
    tracing::info!(base_url = %cfg.base_url, feeds = cfg.categories.len(), "starting newsdeck");

    let gateway = Arc::new(HttpPostsGateway::new(cfg.base_url.clone()));
    let (engine, handle) = FeedEngine::new(&cfg, gateway);

    let stream = SseClient::new();
    engine.attach_stream(&stream);
    stream.connect(&format!("{}/notifications", cfg.base_url));

    for tag in &cfg.categories {
        handle.fetch_initial(tag);
    }

    tokio::select! {
        _ = engine.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            stream.disconnect();
        }
    }
    Ok(())
}
