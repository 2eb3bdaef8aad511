use std::sync::Arc;

use crate::{
	Bm25Index, Catalog, ChunkStore, Error, FlatIndex, MemoryStore, Result, SummaryIndex,
	TermSearch, VectorSearch,
};
use cairn_domain::Chunk;

/// Embeddings for one corpus, aligned with its snapshot order.
#[derive(Debug, Default)]
pub struct CorpusVectors {
	pub dim: usize,
	/// One vector per chunk, in snapshot order.
	pub chunks: Vec<Vec<f32>>,
	/// One vector per distinct title summary, in [`Catalog::summaries`] order.
	pub summaries: Vec<Vec<f32>>,
}

/// A named corpus with its read-only indices. Index slots match catalog slots.
pub struct Collection {
	pub name: String,
	pub catalog: Catalog,
	pub store: Arc<dyn ChunkStore>,
	pub dense: Arc<dyn VectorSearch>,
	pub summaries: SummaryIndex,
	pub lexical: Arc<dyn TermSearch>,
}
impl Collection {
	/// Builds the in-memory indices over `chunks`.
	pub fn in_memory(
		name: impl Into<String>,
		chunks: Vec<Chunk>,
		vectors: CorpusVectors,
		k1: f32,
		b: f32,
	) -> Result<Self> {
		let catalog = Catalog::build(&chunks)?;

		Self::with_catalog(name, catalog, chunks, vectors, k1, b)
	}

	/// Like [`Collection::in_memory`] for a catalog already built from `chunks`.
	pub fn with_catalog(
		name: impl Into<String>,
		catalog: Catalog,
		chunks: Vec<Chunk>,
		vectors: CorpusVectors,
		k1: f32,
		b: f32,
	) -> Result<Self> {
		let name = name.into();

		if vectors.chunks.len() != chunks.len() {
			return Err(Error::InvalidArgument(format!(
				"Collection {name} has {} chunks but {} chunk vectors.",
				chunks.len(),
				vectors.chunks.len()
			)));
		}

		let mut dense = FlatIndex::new(vectors.dim);

		for vec in vectors.chunks {
			dense.push(vec)?;
		}

		let summaries = SummaryIndex::build(&catalog, vectors.dim, vectors.summaries)?;
		let lexical = Bm25Index::build(chunks.iter().map(|chunk| chunk.content.as_str()), k1, b);

		tracing::info!(
			collection = %name,
			chunks = catalog.len(),
			summaries = summaries.len(),
			"Collection indexed."
		);

		Ok(Self {
			name,
			catalog,
			store: Arc::new(MemoryStore::new(chunks)),
			dense: Arc::new(dense),
			summaries,
			lexical: Arc::new(lexical),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_misaligned_vectors() {
		let chunks = vec![Chunk::new("a", "alpha"), Chunk::new("b", "beta")];
		let vectors = CorpusVectors { dim: 2, chunks: vec![vec![1.0, 0.0]], summaries: Vec::new() };
		let result = Collection::in_memory("docs", chunks, vectors, 1.2, 0.75);

		assert!(matches!(result, Err(Error::InvalidArgument(_))));
	}
}
