use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use docqa_rag::{QueryService, ServiceContext};
use docqa_server::cli::ServeCli;
use docqa_server::server::{AppState, bind, serve};
use docqa_server::telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ServeCli::parse();
    init_tracing(cli.log.log_format);

    let config = cli.rag_config()?;
    let embedder = cli.embedder.embedder()?;
    let generator = cli.generator();
    let index_dir = cli.embedder.index_dir.clone();

    // Accept connections while the index loads; /health reports "loading".
    let service = Arc::new(QueryService::new());
    let listener = bind(&cli.server_config()).await?;
    let server = tokio::spawn(serve(listener, AppState::new(service.clone())));

    info!(index_dir = %index_dir.display(), "loading index");
    let context = tokio::task::spawn_blocking(move || {
        ServiceContext::load(&index_dir, embedder, generator, config)
    })
    .await
    .context("index loading task panicked")?
    .context("failed to load index; run docqa-index first")?;
    service.initialize(context)?;

    server.await.context("server task panicked")?
}
