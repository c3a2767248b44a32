//! End-to-end behaviour of the query service over a persisted index.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FailingGenerator, HashEmbedder, SlowEmbedder, SlowGenerator, StubGenerator};
use docqa_rag::{
    Document, Generator, IndexBuilder, QueryService, RagConfig, RagError, RecursiveChunker,
    ServiceContext,
};

async fn build_index(location: &std::path::Path, embedder: Arc<HashEmbedder>, docs: &[Document]) {
    let chunker = RecursiveChunker::new(1000, 200).unwrap();
    IndexBuilder::new(embedder, location).build_from_documents(&chunker, docs).await.unwrap();
}

fn context(
    location: &std::path::Path,
    embedder: Arc<HashEmbedder>,
    generator: Arc<dyn Generator>,
    config: RagConfig,
) -> ServiceContext {
    ServiceContext::load(location, embedder, generator, config).unwrap()
}

#[tokio::test]
async fn answers_from_a_single_chunk_corpus() {
    let temp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(16));
    let docs = [Document::new("france", "data/france.txt", "Paris is the capital of France.")];
    build_index(temp.path(), embedder.clone(), &docs).await;

    let generator = Arc::new(StubGenerator::new("Paris"));
    let service = QueryService::ready(context(
        temp.path(),
        embedder,
        generator.clone(),
        RagConfig::default(),
    ));

    let question = "What is the capital of France?";
    let answer = service.ask(question).await.unwrap();
    assert_eq!(answer.answer, "Paris");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].chunk.text, "Paris is the capital of France.");

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Paris is the capital of France."));
    assert!(prompt.contains(question));
}

#[tokio::test]
async fn sources_never_exceed_top_k() {
    let temp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(16));
    let docs: Vec<Document> = (0..6)
        .map(|i| Document::new(format!("d{i}"), format!("d{i}.txt"), format!("Fact number {i}.")))
        .collect();
    build_index(temp.path(), embedder.clone(), &docs).await;

    let config = RagConfig::builder().top_k(2).build().unwrap();
    let service = QueryService::ready(context(
        temp.path(),
        embedder,
        Arc::new(StubGenerator::new("ok")),
        config,
    ));

    let answer = service.ask("Which fact?").await.unwrap();
    assert_eq!(answer.sources.len(), 2);
    assert!(answer.sources[0].score >= answer.sources[1].score);
}

#[tokio::test]
async fn asking_before_initialization_is_not_ready() {
    let service = QueryService::new();
    assert!(!service.is_ready());
    let err = service.ask("anything").await.unwrap_err();
    assert!(matches!(err, RagError::ServiceNotReady));
}

#[tokio::test]
async fn initialization_happens_once() {
    let temp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(8));
    let docs = [Document::new("a", "a.txt", "Some text.")];
    build_index(temp.path(), embedder.clone(), &docs).await;

    let service = QueryService::new();
    let generator: Arc<dyn Generator> = Arc::new(StubGenerator::new("ok"));
    service
        .initialize(context(temp.path(), embedder.clone(), generator.clone(), RagConfig::default()))
        .unwrap();
    assert!(service.is_ready());

    let err = service
        .initialize(context(temp.path(), embedder, generator, RagConfig::default()))
        .unwrap_err();
    assert!(matches!(err, RagError::ConfigurationError(_)));
}

#[tokio::test]
async fn generation_failure_is_scoped_to_the_request() {
    let temp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(8));
    let docs = [Document::new("a", "a.txt", "Some text.")];
    build_index(temp.path(), embedder.clone(), &docs).await;

    let service = QueryService::ready(context(
        temp.path(),
        embedder,
        Arc::new(FailingGenerator),
        RagConfig::default(),
    ));

    let err = service.ask("first").await.unwrap_err();
    assert!(matches!(err, RagError::GenerationError { .. }));
    assert!(err.is_request_scoped());

    // The service keeps serving after a failed request.
    let err = service.ask("second").await.unwrap_err();
    assert!(matches!(err, RagError::GenerationError { .. }));
    assert!(service.is_ready());
}

#[tokio::test(start_paused = true)]
async fn slow_generation_times_out() {
    let temp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(8));
    let docs = [Document::new("a", "a.txt", "Some text.")];
    build_index(temp.path(), embedder.clone(), &docs).await;

    let config = RagConfig::builder().request_timeout(Duration::from_secs(1)).build().unwrap();
    let service =
        QueryService::ready(context(temp.path(), embedder, Arc::new(SlowGenerator), config));

    let err = service.ask("hello?").await.unwrap_err();
    match err {
        RagError::Timeout { stage, after } => {
            assert_eq!(stage, "generation");
            assert_eq!(after, Duration::from_secs(1));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn slow_embedding_times_out() {
    let temp = tempfile::tempdir().unwrap();
    let docs = [Document::new("a", "a.txt", "Some text.")];
    build_index(temp.path(), Arc::new(HashEmbedder::new(8)), &docs).await;

    let config = RagConfig::builder().request_timeout(Duration::from_secs(1)).build().unwrap();
    let generator = Arc::new(StubGenerator::new("never"));
    let service = QueryService::ready(
        ServiceContext::load(
            temp.path(),
            Arc::new(SlowEmbedder { dimensions: 8 }),
            generator.clone(),
            config,
        )
        .unwrap(),
    );

    let err = service.ask("hello?").await.unwrap_err();
    assert!(matches!(err, RagError::Timeout { stage: "embedding", .. }), "{err:?}");
    assert!(err.is_request_scoped());
    assert!(generator.last_prompt().is_none());
}

#[tokio::test]
async fn concurrent_questions_are_answered_independently() {
    let temp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(16));
    let docs = [
        Document::new("france", "france.txt", "Paris is the capital of France."),
        Document::new("japan", "japan.txt", "Tokyo is the capital of Japan."),
    ];
    build_index(temp.path(), embedder.clone(), &docs).await;

    let generator = Arc::new(StubGenerator::new("ok"));
    let service =
        QueryService::ready(context(temp.path(), embedder, generator.clone(), RagConfig::default()));

    let (a, b, c) = tokio::join!(
        service.ask("What is the capital of France?"),
        service.ask("What is the capital of Japan?"),
        service.ask("Which cities are capitals?"),
    );
    let answers = [a.unwrap(), b.unwrap(), c.unwrap()];

    let ids: std::collections::HashSet<_> = answers.iter().map(|a| a.request_id).collect();
    assert_eq!(ids.len(), 3);
    assert!(answers.iter().all(|a| a.answer == "ok" && !a.sources.is_empty()));

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 3);
    for question in ["France?", "Japan?", "capitals?"] {
        assert_eq!(prompts.iter().filter(|p| p.contains(question)).count(), 1);
    }
}

#[tokio::test]
async fn context_refuses_an_index_built_by_another_embedder() {
    let temp = tempfile::tempdir().unwrap();
    let docs = [Document::new("a", "a.txt", "Some text.")];
    build_index(temp.path(), Arc::new(HashEmbedder::new(8)), &docs).await;

    let result = ServiceContext::load(
        temp.path(),
        Arc::new(HashEmbedder::named(8, "test:other")),
        Arc::new(StubGenerator::new("ok")),
        RagConfig::default(),
    );
    assert!(matches!(result, Err(RagError::EmbedderMismatch { .. })));
}

#[tokio::test]
async fn missing_index_fails_startup() {
    let temp = tempfile::tempdir().unwrap();
    let result = ServiceContext::load(
        temp.path().join("faiss_index"),
        Arc::new(HashEmbedder::new(8)),
        Arc::new(StubGenerator::new("ok")),
        RagConfig::default(),
    );
    assert!(matches!(result, Err(RagError::IndexNotFound { .. })));
}
