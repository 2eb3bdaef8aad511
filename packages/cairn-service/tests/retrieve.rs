use std::{
	collections::HashSet,
	env, fs,
	path::PathBuf,
	sync::Arc,
	time::{SystemTime, UNIX_EPOCH},
};

use time::{Date, macros::date};

use cairn_config::{Config, EmbeddingProviderConfig};
use cairn_domain::Chunk;
use cairn_service::{
	BoxFuture, CairnService, CollectionResult, EmbeddingProvider, Error, Providers,
	RetrieveRequest, RetrieverKind,
};
use cairn_storage::{Collection, CorpusVectors, Hit, VectorSearch};
use cairn_testkit::{
	CorpusBuilder, FailingReranker, FlakyEmbedder, HashEmbedder, OverlapReranker,
};

struct WithoutStoredVectors(Arc<dyn VectorSearch>);
impl VectorSearch for WithoutStoredVectors {
	fn search(&self, query: &[f32], k: usize) -> cairn_storage::Result<Vec<Hit>> {
		self.0.search(query, k)
	}
}

struct ConstantEmbedder;
impl EmbeddingProvider for ConstantEmbedder {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect()) })
	}
}

const REFERENCE: Date = date!(2024 - 01 - 01);
const DUPLICATE: &str = "Emira deliveries began in 2022 across Europe and the UK.";

fn corpus() -> CorpusBuilder {
	CorpusBuilder::new()
		.document("lotus", &[
			"Lotus Emira is the last petrol sports car from Lotus, built in Hethel.",
			"The Emira uses a bonded aluminium chassis shared with the Evora.",
			"Power comes from a supercharged V6 or a turbocharged four cylinder.",
		])
		.summary("lotus", "Lotus Emira overview")
		.dated_all("lotus", date!(2023 - 06 - 01))
		.bundle("prices", &[
			"Emira trim | price",
			"Emira V6 First Edition | 86,000 pounds",
			"Emira i4 First Edition | 81,000 pounds",
		])
		.dated_all("prices", date!(2023 - 11 - 01))
		.chunk("eletre", "The Eletre is an electric hyper SUV built in Wuhan.")
		.dated(date!(2023 - 09 - 01))
		.chunk("dup-a", DUPLICATE)
		.chunk("dup-b", DUPLICATE)
}

fn providers() -> Providers {
	Providers::new(Arc::new(HashEmbedder::default()), Arc::new(OverlapReranker))
}

fn service_with(cfg: Config, builder: CorpusBuilder, providers: Providers) -> CairnService {
	let collection = builder
		.collection("lotus", &HashEmbedder::default(), &cfg)
		.expect("Failed to build test collection.");

	CairnService::with_providers(cfg, vec![collection], providers)
}

fn service() -> CairnService {
	service_with(cairn_testkit::test_config(), corpus(), providers())
}

fn only(mut collections: Vec<CollectionResult>) -> CollectionResult {
	assert_eq!(collections.len(), 1, "Expected a single collection result.");

	collections.remove(0)
}

fn selected_doc_ids(result: &CollectionResult) -> Vec<String> {
	result.bundles.iter().flat_map(|bundle| bundle.doc_ids.iter().cloned()).collect()
}

#[tokio::test]
async fn empty_corpus_returns_no_bundles() {
	let service =
		service_with(cairn_testkit::test_config(), CorpusBuilder::new(), providers());
	let response = service
		.retrieve(RetrieveRequest::new("Emira price", REFERENCE))
		.await
		.expect("Empty corpus must not fail.");
	let result = only(response.collections);

	assert!(result.bundles.is_empty());
	assert_eq!(result.candidates, 0);
}

#[tokio::test]
async fn zero_budget_returns_no_bundles() {
	let mut req = RetrieveRequest::new("Emira price", REFERENCE);

	req.budget = Some(0);

	let result = only(service().retrieve(req).await.expect("Retrieval failed.").collections);

	assert!(result.candidates > 0);
	assert!(result.bundles.is_empty());
}

#[tokio::test]
async fn selection_respects_budget_and_bundle_atomicity() {
	for budget in [2, 3, 5] {
		let mut req = RetrieveRequest::new("Emira First Edition price", REFERENCE);

		req.budget = Some(budget);
		req.top_k = Some(10);

		let result = only(service().retrieve(req).await.expect("Retrieval failed.").collections);
		let doc_ids = selected_doc_ids(&result);
		let rows = doc_ids.iter().filter(|doc_id| doc_id.starts_with("prices-")).count();

		assert!(doc_ids.len() <= budget as usize, "Budget {budget} exceeded: {doc_ids:?}");
		assert!(rows == 0 || rows == 3, "Partial bundle selected: {doc_ids:?}");

		if budget < 3 {
			assert_eq!(rows, 0);
		}
	}
}

#[tokio::test]
async fn selected_chunks_are_unique_across_bundles_and_variants() {
	let mut req = RetrieveRequest::new("Emira chassis", REFERENCE);

	req.variants = vec!["aluminium chassis Evora".to_string(), "Emira chassis".to_string()];
	req.top_k = Some(10);
	req.budget = Some(20);

	let result = only(service().retrieve(req).await.expect("Retrieval failed.").collections);
	let doc_ids = selected_doc_ids(&result);
	let unique: HashSet<&String> = doc_ids.iter().collect();

	assert_eq!(unique.len(), doc_ids.len());
	assert!(result.failures.is_empty());
}

#[tokio::test]
async fn near_duplicates_are_filtered_by_the_diversity_threshold() {
	let mut strict = RetrieveRequest::new("Emira deliveries Europe", REFERENCE);

	strict.top_k = Some(10);
	strict.budget = Some(20);
	strict.diversity_threshold = Some(0.9);

	let mut relaxed = strict.clone();

	relaxed.diversity_threshold = Some(1.0);

	let service = service();
	let strict = only(service.retrieve(strict).await.expect("Retrieval failed.").collections);
	let relaxed = only(service.retrieve(relaxed).await.expect("Retrieval failed.").collections);
	let count_dups = |result: &CollectionResult| {
		selected_doc_ids(result).iter().filter(|doc_id| doc_id.starts_with("dup-")).count()
	};

	assert_eq!(count_dups(&strict), 1);
	assert_eq!(count_dups(&relaxed), 2);
}

#[tokio::test]
async fn bundles_are_ordered_most_relevant_last_with_explain() {
	let mut req = RetrieveRequest::new("Emira V6 First Edition price", REFERENCE);

	req.top_k = Some(10);
	req.budget = Some(20);

	let result = only(service().retrieve(req).await.expect("Retrieval failed.").collections);
	let bundles = &result.bundles;

	assert!(!bundles.is_empty());

	for (position, bundle) in bundles.iter().enumerate() {
		let explain = &bundle.explain;

		assert_eq!(explain.selection_rank as usize, bundles.len() - position);
		assert!((0.0..=1.0).contains(&explain.recency));
		assert!((explain.combined - (explain.relevance + explain.recency)).abs() < 1e-6);
	}
	for pair in bundles.windows(2) {
		assert!(pair[0].explain.combined <= pair[1].explain.combined);
	}

	let last = bundles.last().expect("At least one bundle.");

	assert_eq!(last.doc_ids, vec!["prices-0", "prices-1", "prices-2"]);
	assert_eq!(last.date_published, Some(date!(2023 - 11 - 01)));
	assert_eq!(
		last.content,
		"Emira trim | price Emira V6 First Edition | 86,000 pounds Emira i4 First Edition | 81,000 pounds"
	);
}

#[tokio::test]
async fn failed_variant_is_reported_and_retrieval_continues() {
	let embedder = FlakyEmbedder::new(["broken variant"]);
	let providers = Providers::new(Arc::new(embedder), Arc::new(OverlapReranker));
	let service = service_with(cairn_testkit::test_config(), corpus(), providers);
	let mut req = RetrieveRequest::new("Emira chassis", REFERENCE);

	req.variants = vec!["broken variant".to_string()];

	let result = only(service.retrieve(req).await.expect("Retrieval failed.").collections);

	assert_eq!(result.failures.len(), 1);
	assert_eq!(result.failures[0].source, RetrieverKind::Dense);
	assert_eq!(result.failures[0].variant, Some(1));
	assert!(!result.bundles.is_empty());
}

#[tokio::test]
async fn failed_diversity_embedding_skips_the_filter() {
	let providers =
		Providers::new(Arc::new(FlakyEmbedder::new([DUPLICATE])), Arc::new(OverlapReranker));
	let mut service = service_with(cairn_testkit::test_config(), corpus(), providers);
	let collection = &mut service.collections[0];

	collection.dense = Arc::new(WithoutStoredVectors(collection.dense.clone()));

	let mut req = RetrieveRequest::new("Emira deliveries Europe", REFERENCE);

	req.top_k = Some(10);
	req.budget = Some(20);
	req.diversity_threshold = Some(0.9);

	let result = only(service.retrieve(req).await.expect("Retrieval failed.").collections);
	let dups =
		selected_doc_ids(&result).iter().filter(|doc_id| doc_id.starts_with("dup-")).count();

	assert!(result.failures.is_empty());
	assert_eq!(dups, 2);
}

#[tokio::test]
async fn rerank_failure_fails_the_request() {
	let providers =
		Providers::new(Arc::new(HashEmbedder::default()), Arc::new(FailingReranker));
	let service = service_with(cairn_testkit::test_config(), corpus(), providers);
	let err = service
		.retrieve(RetrieveRequest::new("Emira chassis", REFERENCE))
		.await
		.expect_err("Expected a provider error.");

	assert!(matches!(err, Error::Provider { .. }), "Unexpected error: {err}");
}

#[tokio::test]
async fn rerank_failure_in_any_collection_fails_the_whole_request() {
	let cfg = cairn_testkit::test_config();
	let embedder = HashEmbedder::default();
	let collections = ["lotus", "archive"]
		.into_iter()
		.map(|name| corpus().collection(name, &embedder, &cfg))
		.collect::<cairn_testkit::Result<Vec<_>>>()
		.expect("Failed to build test collections.");
	let providers = Providers::new(Arc::new(HashEmbedder::default()), Arc::new(FailingReranker));
	let service = CairnService::with_providers(cfg, collections, providers);
	let err = service
		.retrieve(RetrieveRequest::new("Emira chassis", REFERENCE))
		.await
		.expect_err("No partial response is returned for the other collection.");

	assert!(matches!(err, Error::Provider { .. }), "Unexpected error: {err}");
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
	let service = service();
	let mut blank = RetrieveRequest::new("   ", REFERENCE);
	let mut zero_k = RetrieveRequest::new("Emira", REFERENCE);
	let mut diversity = RetrieveRequest::new("Emira", REFERENCE);
	let mut unknown = RetrieveRequest::new("Emira", REFERENCE);

	blank.variants = vec!["Emira".to_string()];
	zero_k.top_k = Some(0);
	diversity.diversity_threshold = Some(1.5);
	unknown.collection = Some("missing".to_string());

	for req in [blank, zero_k, diversity] {
		let err = service.retrieve(req).await.expect_err("Expected an invalid request.");

		assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err}");
	}

	let err = service.retrieve(unknown).await.expect_err("Expected a missing collection.");

	assert!(matches!(err, Error::NotFound { .. }), "Unexpected error: {err}");
}

#[tokio::test]
async fn collections_with_zero_top_k_are_skipped() {
	let mut cfg = cairn_testkit::test_config();

	cfg.collections.push(cairn_config::Collection {
		name: "archive".to_string(),
		path: PathBuf::from("archive.jsonl"),
		top_k: Some(0),
	});

	let embedder = HashEmbedder::default();
	let lotus = corpus().collection("lotus", &embedder, &cfg).expect("Failed to build lotus.");
	let archive = corpus().collection("archive", &embedder, &cfg).expect("Failed to build archive.");
	let service = CairnService::with_providers(cfg, vec![lotus, archive], providers());
	let response = service
		.retrieve(RetrieveRequest::new("Emira chassis", REFERENCE))
		.await
		.expect("Retrieval failed.");
	let names: Vec<&str> =
		response.collections.iter().map(|result| result.collection.as_str()).collect();

	assert_eq!(names, vec!["lotus"]);
}

#[tokio::test]
async fn load_embeds_missing_vectors_and_summaries() {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let path = env::temp_dir().join(format!("cairn_load_{nanos}_{}.jsonl", std::process::id()));

	corpus().write_snapshot(&path).expect("Failed to write snapshot.");

	let mut cfg = cairn_testkit::test_config();

	cfg.collections.push(cairn_config::Collection {
		name: "lotus".to_string(),
		path: path.clone(),
		top_k: None,
	});

	let result = CairnService::load(cfg, providers()).await;

	fs::remove_file(&path).expect("Failed to remove snapshot.");

	let service = result.expect("Load failed.");
	let collection = service.collection("lotus").expect("Collection must be loaded.");

	assert_eq!(collection.catalog.len(), 9);
	assert_eq!(collection.summaries.len(), 1);
	assert_eq!(collection.catalog.bundle_members("prices").len(), 3);

	let response = service
		.retrieve(RetrieveRequest::new("Emira chassis", REFERENCE))
		.await
		.expect("Retrieval failed.");
	let rendered = cairn_service::render_context(&only(response.collections).bundles, 0);

	assert!(rendered.text.lines().all(|line| line.starts_with("From ")));
	assert!(rendered.bundles > 0);
}

#[tokio::test]
async fn adjacency_bundle_follows_the_chain_not_the_storage_order() {
	// Stored as c, a, b; linked a -> b -> c.
	let parts = [
		("c", "third part of the story"),
		("a", "first part of the story"),
		("b", "second part of the story"),
	];
	let mut chunks: Vec<Chunk> =
		parts.iter().map(|(doc_id, content)| Chunk::new(*doc_id, *content)).collect();

	chunks[1].next_chunk_id = Some("b".to_string());
	chunks[2].prev_chunk_id = Some("a".to_string());
	chunks[2].next_chunk_id = Some("c".to_string());
	chunks[0].prev_chunk_id = Some("b".to_string());

	let vectors = CorpusVectors { dim: 2, chunks: vec![vec![1.0, 0.0]; 3], summaries: Vec::new() };
	let collection = Collection::in_memory("story", chunks, vectors, 1.2, 0.75)
		.expect("Failed to build test collection.");
	let service = CairnService::with_providers(
		cairn_testkit::test_config(),
		vec![collection],
		Providers::new(Arc::new(ConstantEmbedder), Arc::new(OverlapReranker)),
	);
	let mut req = RetrieveRequest::new("story", REFERENCE);

	req.top_k = Some(1);
	req.budget = Some(3);

	let result = only(service.retrieve(req).await.expect("Retrieval failed.").collections);

	assert_eq!(result.bundles.len(), 1);
	assert_eq!(result.bundles[0].doc_ids, vec!["a", "b", "c"]);
	assert_eq!(
		result.bundles[0].content,
		"first part of the story second part of the story third part of the story"
	);
}
