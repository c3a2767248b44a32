use anyhow::Context;
use clap::Parser;
use docqa_rag::{DirectoryLoader, DocumentLoader, IndexBuilder, RecursiveChunker};
use docqa_server::cli::IndexCli;
use docqa_server::telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = IndexCli::parse();
    init_tracing(cli.log.log_format);

    let config = cli.rag_config()?;
    let chunker = RecursiveChunker::from_config(&config)?;
    let embedder = cli.embedder.embedder()?;

    let documents = DirectoryLoader::new(&cli.data_dir)
        .with_extensions(cli.extensions.iter().map(|ext| ext.trim_start_matches('.')))
        .with_pdftotext(&cli.pdftotext)
        .load()
        .with_context(|| format!("failed to load documents from {}", cli.data_dir.display()))?;

    let builder = IndexBuilder::from_config(embedder, &cli.embedder.index_dir, &config);
    let index = builder
        .build_from_documents(&chunker, &documents)
        .await
        .context("index build failed; any previous index was left untouched")?;

    info!(
        documents = documents.len(),
        entries = index.len(),
        location = %builder.location().display(),
        "index written"
    );
    Ok(())
}
