use std::collections::HashMap;

use crate::Result;
use cairn_domain::Chunk;

/// Read-only access to chunk content and metadata.
///
/// Lookups are unordered and may omit identifiers that do not resolve; callers index the
/// result by `doc_id`.
pub trait ChunkStore
where
	Self: Send + Sync,
{
	fn get_chunks(&self, doc_ids: &[String]) -> Result<HashMap<String, Chunk>>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
	chunks: HashMap<String, Chunk>,
}
impl MemoryStore {
	pub fn new(chunks: impl IntoIterator<Item = Chunk>) -> Self {
		Self { chunks: chunks.into_iter().map(|chunk| (chunk.doc_id.clone(), chunk)).collect() }
	}

	pub fn len(&self) -> usize {
		self.chunks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}
}
impl ChunkStore for MemoryStore {
	fn get_chunks(&self, doc_ids: &[String]) -> Result<HashMap<String, Chunk>> {
		Ok(doc_ids
			.iter()
			.filter_map(|doc_id| self.chunks.get(doc_id).map(|chunk| (doc_id.clone(), chunk.clone())))
			.collect())
	}
}
