mod error;

pub use error::{Error, Result};

use std::{collections::HashSet, fs, path::Path};

use time::Date;

use cairn_config::{
	Config, EmbeddingProviderConfig, ProviderConfig, Providers as ProviderConfigs, Ranking,
	Retrieval, Selection, Service,
};
use cairn_domain::{Chunk, text};
use cairn_service::{BoxFuture, EmbeddingProvider, RerankProvider};
use cairn_storage::{Catalog, ChunkRecord, Collection, CorpusVectors};

pub const TEST_DIM: usize = 64;

/// A config with default retrieval settings and providers that never leave the process.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "debug".to_string() },
		providers: ProviderConfigs {
			embedding: EmbeddingProviderConfig {
				provider_id: "testkit".to_string(),
				api_base: "http://127.0.0.1".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "hashing".to_string(),
				dimensions: TEST_DIM as u32,
				timeout_ms: 1_000,
				default_headers: Default::default(),
			},
			rerank: ProviderConfig {
				provider_id: "testkit".to_string(),
				api_base: "http://127.0.0.1".to_string(),
				api_key: "test-key".to_string(),
				path: "/rerank".to_string(),
				model: "overlap".to_string(),
				timeout_ms: 1_000,
				default_headers: Default::default(),
			},
		},
		retrieval: Retrieval::default(),
		ranking: Ranking::default(),
		selection: Selection::default(),
		collections: Vec::new(),
	}
}

/// Bag-of-words embedder: each lexical term adds one to a hashed bucket.
#[derive(Clone, Copy, Debug)]
pub struct HashEmbedder {
	dim: usize,
}
impl HashEmbedder {
	pub fn new(dim: usize) -> Self {
		Self { dim: dim.max(1) }
	}

	pub fn embed_text(&self, text: &str) -> Vec<f32> {
		let mut vec = vec![0.0; self.dim];

		for term in text::lexical_terms(text) {
			vec[(fnv1a(term.as_bytes()) % self.dim as u64) as usize] += 1.0;
		}

		cairn_domain::vector::normalized(vec)
	}
}
impl Default for HashEmbedder {
	fn default() -> Self {
		Self::new(TEST_DIM)
	}
}
impl EmbeddingProvider for HashEmbedder {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			let vectors: Vec<Vec<f32>> = texts.iter().map(|text| self.embed_text(text)).collect();

			Ok(vectors)
		})
	}
}

/// A [`HashEmbedder`] that fails any call containing one of the given texts.
#[derive(Clone, Debug, Default)]
pub struct FlakyEmbedder {
	inner: HashEmbedder,
	fail_on: HashSet<String>,
}
impl FlakyEmbedder {
	pub fn new<I, S>(fail_on: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			inner: HashEmbedder::default(),
			fail_on: fail_on.into_iter().map(Into::into).collect(),
		}
	}
}
impl EmbeddingProvider for FlakyEmbedder {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<Vec<f32>>>> {
		if let Some(text) = texts.iter().find(|text| self.fail_on.contains(*text)) {
			let message = format!("Embedding refused for {text:?}.");

			return Box::pin(async move {
				Err(cairn_providers::Error::InvalidResponse { message })
			});
		}

		self.inner.embed(cfg, texts)
	}
}

/// Scores a document by the share of distinct query terms it contains.
#[derive(Clone, Copy, Debug, Default)]
pub struct OverlapReranker;
impl OverlapReranker {
	pub fn score(query: &str, doc: &str) -> f32 {
		let query_terms: HashSet<String> = text::lexical_terms(query).into_iter().collect();

		if query_terms.is_empty() {
			return 0.0;
		}

		let doc_terms: HashSet<String> = text::lexical_terms(doc).into_iter().collect();
		let matched = query_terms.iter().filter(|term| doc_terms.contains(*term)).count();

		matched as f32 / query_terms.len() as f32
	}
}
impl RerankProvider for OverlapReranker {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<f32>>> {
		Box::pin(async move {
			let scores: Vec<f32> = docs.iter().map(|doc| Self::score(query, doc)).collect();

			Ok(scores)
		})
	}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FailingReranker;
impl RerankProvider for FailingReranker {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<f32>>> {
		Box::pin(async move {
			Err(cairn_providers::Error::InvalidResponse {
				message: "Rerank provider is unavailable.".to_string(),
			})
		})
	}
}

/// Fluent builder for small corpora.
#[derive(Clone, Debug, Default)]
pub struct CorpusBuilder {
	chunks: Vec<Chunk>,
}
impl CorpusBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn chunk(mut self, doc_id: &str, content: &str) -> Self {
		self.chunks.push(Chunk::new(doc_id, content));

		self
	}

	/// Adds `contents` as consecutive chunks `{prefix}-0`, `{prefix}-1`, ... linked through
	/// `prev_chunk_id`/`next_chunk_id`.
	pub fn document(mut self, prefix: &str, contents: &[&str]) -> Self {
		for (i, content) in contents.iter().enumerate() {
			let mut chunk = Chunk::new(format!("{prefix}-{i}"), *content);

			chunk.prev_chunk_id = i.checked_sub(1).map(|prev| format!("{prefix}-{prev}"));
			chunk.next_chunk_id = (i + 1 < contents.len()).then(|| format!("{prefix}-{}", i + 1));

			self.chunks.push(chunk);
		}

		self
	}

	/// Adds `rows` as chunks `{bundle_id}-0`, `{bundle_id}-1`, ... sharing one bundle.
	pub fn bundle(mut self, bundle_id: &str, rows: &[&str]) -> Self {
		for (i, row) in rows.iter().enumerate() {
			let mut chunk = Chunk::new(format!("{bundle_id}-{i}"), *row);

			chunk.bundle_id = Some(bundle_id.to_string());

			self.chunks.push(chunk);
		}

		self
	}

	/// Dates the most recently added chunk.
	pub fn dated(mut self, date: Date) -> Self {
		if let Some(chunk) = self.chunks.last_mut() {
			chunk.date_published = Some(date);
		}

		self
	}

	/// Dates every chunk whose id starts with `prefix`.
	pub fn dated_all(mut self, prefix: &str, date: Date) -> Self {
		for chunk in self.chunks.iter_mut().filter(|chunk| chunk.doc_id.starts_with(prefix)) {
			chunk.date_published = Some(date);
		}

		self
	}

	/// Attaches `summary` to every chunk whose id starts with `prefix`.
	pub fn summary(mut self, prefix: &str, summary: &str) -> Self {
		for chunk in self.chunks.iter_mut().filter(|chunk| chunk.doc_id.starts_with(prefix)) {
			chunk.title_summary = Some(summary.to_string());
		}

		self
	}

	pub fn build(self) -> Vec<Chunk> {
		self.chunks
	}

	/// Indexes the corpus in memory with vectors from `embedder`.
	pub fn collection(
		self,
		name: &str,
		embedder: &HashEmbedder,
		cfg: &Config,
	) -> Result<Collection> {
		let catalog = Catalog::build(&self.chunks)?;
		let chunks = self.chunks.iter().map(|chunk| embedder.embed_text(&chunk.content)).collect();
		let summaries =
			catalog.summaries().iter().map(|summary| embedder.embed_text(summary)).collect();
		let vectors =
			CorpusVectors { dim: cfg.providers.embedding.dimensions as usize, chunks, summaries };
		let lexical = &cfg.retrieval.lexical;

		Ok(Collection::with_catalog(name, catalog, self.chunks, vectors, lexical.k1, lexical.b)?)
	}

	/// Writes the corpus as a JSONL snapshot without stored embeddings.
	pub fn write_snapshot(&self, path: &Path) -> Result<()> {
		let mut out = String::new();

		for chunk in &self.chunks {
			let record = ChunkRecord { chunk: chunk.clone(), embedding: None };
			let line = serde_json::to_string(&record).map_err(|err| {
				Error::Message(format!("Failed to encode {}: {err}.", chunk.doc_id))
			})?;

			out.push_str(&line);
			out.push('\n');
		}

		fs::write(path, out)
			.map_err(|err| Error::Message(format!("Failed to write snapshot {path:?}: {err}.")))
	}
}

fn fnv1a(bytes: &[u8]) -> u64 {
	let mut hash: u64 = 0xcbf2_9ce4_8422_2325;

	for byte in bytes {
		hash ^= u64::from(*byte);
		hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
	}

	hash
}
