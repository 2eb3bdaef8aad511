pub mod context;
pub mod expand;
pub mod fusion;
pub mod load;
pub mod rerank;
pub mod retrieve;
pub mod select;

mod error;

pub use context::{RenderedContext, render_context};
pub use error::{Error, Result};
pub use fusion::{Candidate, RetrieverKind, SourceFailure};
pub use rerank::ScoredCandidate;
pub use retrieve::{
	BundleExplain, CollectionResult, RetrieveRequest, RetrieveResponse, RetrievedBundle,
	RetrievedChunk,
};

use std::{future::Future, pin::Pin, sync::Arc};

use cairn_config::{Config, EmbeddingProviderConfig, ProviderConfig};
use cairn_providers::{embedding, rerank as rerank_provider};
use cairn_storage::Collection;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	/// One relevance score per document, aligned with `docs`.
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<f32>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider }
	}
}

/// Retrieval over a set of named, read-only collections.
///
/// The service holds no per-request state; share it behind an `Arc` to serve concurrent
/// requests.
pub struct CairnService {
	pub cfg: Config,
	pub collections: Vec<Collection>,
	pub providers: Providers,
}
impl CairnService {
	pub fn new(cfg: Config, collections: Vec<Collection>) -> Self {
		Self { cfg, collections, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, collections: Vec<Collection>, providers: Providers) -> Self {
		Self { cfg, collections, providers }
	}

	pub fn collection(&self, name: &str) -> Option<&Collection> {
		self.collections.iter().find(|collection| collection.name == name)
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, cairn_providers::Result<Vec<f32>>> {
		Box::pin(rerank_provider::rerank(cfg, query, docs))
	}
}
