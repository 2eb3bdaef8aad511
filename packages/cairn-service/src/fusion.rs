use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{EmbeddingProvider, expand};
use cairn_config::{EmbeddingProviderConfig, Expansion};
use cairn_domain::Chunk;
use cairn_storage::{Collection, Hit, Slot, SummaryIndex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverKind {
	Dense,
	Summary,
	Lexical,
}
impl RetrieverKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Dense => "dense",
			Self::Summary => "summary",
			Self::Lexical => "lexical",
		}
	}
}

/// A chunk surfaced by one retriever during a single fusion pass.
#[derive(Clone, Debug)]
pub struct Candidate {
	pub slot: Slot,
	pub chunk: Chunk,
	pub retriever: RetrieverKind,
	/// Per-pass grouping id, unrelated to the corpus `bundle_id`.
	pub group: u32,
	/// Emission order within the pass. Members of a group keep the order the expander gave them.
	pub position: usize,
}

/// A retriever or collaborator call that failed for one source of a pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceFailure {
	pub source: RetrieverKind,
	/// Index into the query list (0 is the primary question); `None` for query-independent
	/// steps.
	pub variant: Option<usize>,
	pub message: String,
}

#[derive(Debug)]
pub struct FusionParams<'a> {
	pub top_k: usize,
	pub dense_candidates: usize,
	pub summary_top_k: usize,
	/// Zero ranks the whole corpus.
	pub lexical_candidates: usize,
	pub expansion: &'a Expansion,
}

#[derive(Debug, Default)]
pub struct FusionOutcome {
	pub candidates: Vec<Candidate>,
	pub failures: Vec<SourceFailure>,
}

/// One fusion pass over a collection. The `seen` set spans every source and variant.
pub struct FusionPass<'a> {
	collection: &'a Collection,
	seen: HashSet<Slot>,
	next_group: u32,
	outcome: FusionOutcome,
}
impl<'a> FusionPass<'a> {
	pub fn new(collection: &'a Collection) -> Self {
		Self { collection, seen: HashSet::new(), next_group: 0, outcome: FusionOutcome::default() }
	}

	/// Runs dense retrieval for every query, then summary and lexical retrieval for the primary
	/// query. `queries[0]` is the primary question.
	pub async fn run(
		mut self,
		embedding: &dyn EmbeddingProvider,
		embedding_cfg: &EmbeddingProviderConfig,
		queries: &[String],
		params: &FusionParams<'_>,
	) -> FusionOutcome {
		let Some(primary) = queries.first() else { return self.outcome };

		if self.collection.catalog.is_empty() {
			return self.outcome;
		}

		let mut primary_vec = None;

		for (variant, query) in queries.iter().enumerate() {
			let vec = match embed_query(embedding, embedding_cfg, query).await {
				Ok(vec) => vec,
				Err(message) => {
					self.fail(RetrieverKind::Dense, Some(variant), message);

					continue;
				},
			};

			self.dense(variant, &vec, params);

			if variant == 0 {
				primary_vec = Some(vec);
			}
		}

		match primary_vec {
			Some(vec) => self.summary(&vec, params),
			None => self.fail(
				RetrieverKind::Summary,
				None,
				"Primary query embedding is unavailable.".to_string(),
			),
		}

		self.lexical(primary, params);

		tracing::debug!(
			collection = %self.collection.name,
			candidates = self.outcome.candidates.len(),
			groups = self.next_group,
			failures = self.outcome.failures.len(),
			"Fusion pass finished."
		);

		self.outcome
	}

	fn dense(&mut self, variant: usize, vec: &[f32], params: &FusionParams<'_>) {
		let fetch = params.dense_candidates.max(params.top_k);
		let hits = match self.collection.dense.search(vec, fetch) {
			Ok(hits) => hits,
			Err(err) => {
				self.fail(RetrieverKind::Dense, Some(variant), err.to_string());

				return;
			},
		};
		let scores: HashMap<Slot, f32> = hits.iter().map(|hit| (hit.slot, hit.score)).collect();

		for hit in hits.iter().take(params.top_k) {
			if self.seen.contains(&hit.slot) {
				continue;
			}

			let members = expand::expand(
				&self.collection.catalog,
				hit.slot,
				hit.score,
				&scores,
				&self.seen,
				params.expansion,
			);

			tracing::debug!(
				variant,
				doc_id = self.collection.catalog.doc_id(hit.slot).unwrap_or_default(),
				score = hit.score,
				members = members.len(),
				"Dense seed expanded."
			);

			self.push_group(RetrieverKind::Dense, Some(variant), members);
		}
	}

	fn summary(&mut self, vec: &[f32], params: &FusionParams<'_>) {
		let hits = match self.collection.summaries.search(vec, params.summary_top_k) {
			Ok(hits) => hits,
			Err(err) => {
				self.fail(RetrieverKind::Summary, None, err.to_string());

				return;
			},
		};

		for (slot, _) in SummaryIndex::fan_out(&self.collection.catalog, &hits) {
			if self.seen.contains(&slot) {
				continue;
			}

			let members = expand::bundle_group(&self.collection.catalog, slot);

			self.push_group(RetrieverKind::Summary, None, members);
		}
	}

	fn lexical(&mut self, query: &str, params: &FusionParams<'_>) {
		let fetch = match params.lexical_candidates {
			0 => self.collection.catalog.len(),
			n => n,
		};
		let hits: Vec<Hit> = match self.collection.lexical.search(query, fetch) {
			Ok(hits) => hits,
			Err(err) => {
				self.fail(RetrieverKind::Lexical, None, err.to_string());

				return;
			},
		};

		for hit in hits.iter().take(params.top_k) {
			if self.seen.contains(&hit.slot) {
				continue;
			}

			let members = expand::bundle_group(&self.collection.catalog, hit.slot);

			self.push_group(RetrieverKind::Lexical, None, members);
		}
	}

	fn push_group(&mut self, retriever: RetrieverKind, variant: Option<usize>, members: Vec<Slot>) {
		let members: Vec<Slot> =
			members.into_iter().filter(|slot| self.seen.insert(*slot)).collect();

		if members.is_empty() {
			return;
		}

		let collection = self.collection;
		let catalog = &collection.catalog;
		let doc_ids: Vec<String> = members
			.iter()
			.filter_map(|slot| catalog.doc_id(*slot).map(str::to_string))
			.collect();
		let mut chunks = match collection.store.get_chunks(&doc_ids) {
			Ok(chunks) => chunks,
			Err(err) => {
				self.fail(retriever, variant, err.to_string());

				return;
			},
		};
		let group = self.next_group;
		let mut pushed = false;

		for slot in members {
			let Some(doc_id) = catalog.doc_id(slot) else { continue };
			let Some(chunk) = chunks.remove(doc_id) else {
				tracing::warn!(
					collection = %collection.name,
					doc_id,
					source = retriever.as_str(),
					"Bundle member is missing from the chunk store; dropping it."
				);

				continue;
			};

			let position = self.outcome.candidates.len();

			self.outcome.candidates.push(Candidate { slot, chunk, retriever, group, position });

			pushed = true;
		}

		if pushed {
			self.next_group += 1;
		}
	}

	fn fail(&mut self, source: RetrieverKind, variant: Option<usize>, message: String) {
		tracing::warn!(
			collection = %self.collection.name,
			source = source.as_str(),
			variant,
			error = %message,
			"Retrieval source failed; continuing with the remaining sources."
		);

		self.outcome.failures.push(SourceFailure { source, variant, message });
	}
}

async fn embed_query(
	embedding: &dyn EmbeddingProvider,
	cfg: &EmbeddingProviderConfig,
	query: &str,
) -> Result<Vec<f32>, String> {
	let texts = [query.to_string()];
	let vectors = embedding.embed(cfg, &texts).await.map_err(|err| err.to_string())?;

	vectors.into_iter().next().ok_or_else(|| "Embedding provider returned no vectors.".to_string())
}
