use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::{
	CairnService, Error, Result, RetrieverKind, ScoredCandidate, SourceFailure,
	fusion::{FusionParams, FusionPass},
	rerank::{self, RerankParams},
	select::{self, SelectParams},
};
use cairn_domain::{date_format, recency};
use cairn_storage::{Collection, Slot};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RetrieveRequest {
	pub question: String,
	/// Alternate phrasings of the question, searched densely after it.
	#[serde(default)]
	pub variants: Vec<String>,
	#[serde(with = "date_format")]
	pub reference_date: Date,
	/// Restricts retrieval to one collection.
	#[serde(default)]
	pub collection: Option<String>,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub budget: Option<u32>,
	#[serde(default)]
	pub diversity_threshold: Option<f32>,
}
impl RetrieveRequest {
	pub fn new(question: impl Into<String>, reference_date: Date) -> Self {
		Self {
			question: question.into(),
			variants: Vec::new(),
			reference_date,
			collection: None,
			top_k: None,
			budget: None,
			diversity_threshold: None,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct RetrieveResponse {
	pub request_id: Uuid,
	pub collections: Vec<CollectionResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CollectionResult {
	pub collection: String,
	pub top_k: u32,
	/// Number of fused candidates before selection.
	pub candidates: usize,
	/// Selected bundles, most relevant last.
	pub bundles: Vec<RetrievedBundle>,
	pub failures: Vec<SourceFailure>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RetrievedBundle {
	pub group: u32,
	/// Member contents joined by a single space.
	pub content: String,
	pub retrievers: Vec<RetrieverKind>,
	pub doc_ids: Vec<String>,
	/// Most recent publication date among the members.
	#[serde(with = "date_format::option")]
	pub date_published: Option<Date>,
	pub members: Vec<RetrievedChunk>,
	pub explain: BundleExplain,
}

#[derive(Clone, Debug, Serialize)]
pub struct RetrievedChunk {
	pub doc_id: String,
	pub page: Option<u32>,
	#[serde(with = "date_format::option")]
	pub date_published: Option<Date>,
}

/// Scores of the member a bundle was selected through.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BundleExplain {
	pub relevance: f32,
	pub recency: f32,
	pub combined: f32,
	/// 1 for the most relevant accepted bundle.
	pub selection_rank: u32,
}

impl CairnService {
	pub async fn retrieve(&self, req: RetrieveRequest) -> Result<RetrieveResponse> {
		let request_id = Uuid::new_v4();
		let queries = self.validate_request(&req)?;
		let targets: Vec<&Collection> = match req.collection.as_deref() {
			Some(name) => vec![self.collection(name).ok_or_else(|| Error::NotFound {
				message: format!("Collection {name} is not loaded."),
			})?],
			None => self.collections.iter().collect(),
		};
		let mut collections = Vec::with_capacity(targets.len());

		for collection in targets {
			let top_k = self.resolve_top_k(&req, &collection.name);

			if top_k == 0 {
				tracing::debug!(%request_id, collection = %collection.name, "Collection skipped.");

				continue;
			}

			collections.push(self.retrieve_collection(&req, &queries, collection, top_k).await?);
		}

		tracing::info!(
			%request_id,
			collections = collections.len(),
			bundles = collections.iter().map(|result| result.bundles.len()).sum::<usize>(),
			"Retrieval finished."
		);

		Ok(RetrieveResponse { request_id, collections })
	}

	fn validate_request(&self, req: &RetrieveRequest) -> Result<Vec<String>> {
		let question = req.question.trim();

		if question.is_empty() {
			return Err(Error::InvalidRequest {
				message: "question must be non-empty.".to_string(),
			});
		}
		if req.top_k == Some(0) {
			return Err(Error::InvalidRequest {
				message: "top_k must be greater than zero.".to_string(),
			});
		}
		if let Some(threshold) = req.diversity_threshold {
			cairn_config::validate_diversity_threshold(threshold)?;
		}

		let mut queries = vec![question.to_string()];

		queries.extend(
			req.variants
				.iter()
				.map(|variant| variant.trim())
				.filter(|variant| !variant.is_empty())
				.map(str::to_string),
		);

		Ok(queries)
	}

	fn resolve_top_k(&self, req: &RetrieveRequest, collection: &str) -> u32 {
		if let Some(top_k) = req.top_k {
			return top_k;
		}

		self.cfg
			.collections
			.iter()
			.find(|cfg| cfg.name == collection)
			.and_then(|cfg| cfg.top_k)
			.unwrap_or(self.cfg.retrieval.top_k)
	}

	async fn retrieve_collection(
		&self,
		req: &RetrieveRequest,
		queries: &[String],
		collection: &Collection,
		top_k: u32,
	) -> Result<CollectionResult> {
		let retrieval = &self.cfg.retrieval;
		let fusion = FusionPass::new(collection)
			.run(
				self.providers.embedding.as_ref(),
				&self.cfg.providers.embedding,
				queries,
				&FusionParams {
					top_k: top_k as usize,
					dense_candidates: retrieval.dense_candidates as usize,
					summary_top_k: retrieval.summary_top_k as usize,
					lexical_candidates: retrieval.lexical_candidates as usize,
					expansion: &retrieval.expansion,
				},
			)
			.await;
		let candidates = fusion.candidates.len();
		let scored = rerank::score_candidates(
			self.providers.rerank.as_ref(),
			&self.cfg.providers.rerank,
			&queries[0],
			fusion.candidates,
			RerankParams {
				batch_size: self.cfg.ranking.rerank_batch_size as usize,
				reference_date: req.reference_date,
				recency_window_days: self.cfg.ranking.recency_window_days,
			},
		)
		.await?;
		let vectors = self.diversity_vectors(collection, &scored).await;
		let params = SelectParams {
			budget: req.budget.unwrap_or(self.cfg.selection.budget) as usize,
			diversity_threshold: req
				.diversity_threshold
				.unwrap_or(self.cfg.selection.diversity_threshold),
		};
		let selected = select::select(&scored, params, &vectors);
		let bundles = assemble_bundles(&scored, &selected);

		tracing::debug!(
			collection = %collection.name,
			top_k,
			candidates,
			selected = bundles.len(),
			"Collection retrieval finished."
		);

		Ok(CollectionResult {
			collection: collection.name.clone(),
			top_k,
			candidates,
			bundles,
			failures: fusion.failures,
		})
	}

	/// Content vectors for the diversity filter.
	///
	/// Stored index vectors are reused. Missing ones are embedded in one call; if that call
	/// fails those chunks are left out of the similarity check.
	async fn diversity_vectors(
		&self,
		collection: &Collection,
		scored: &[ScoredCandidate],
	) -> HashMap<Slot, Vec<f32>> {
		let mut vectors = HashMap::with_capacity(scored.len());
		let mut missing = Vec::new();

		for item in scored {
			match collection.dense.vector(item.candidate.slot) {
				Some(vec) => {
					vectors.insert(item.candidate.slot, vec.to_vec());
				},
				None => missing.push(item),
			}
		}

		if missing.is_empty() {
			return vectors;
		}

		let texts: Vec<String> =
			missing.iter().map(|item| item.candidate.chunk.content.clone()).collect();

		match self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await {
			Ok(embedded) if embedded.len() == missing.len() => {
				for (item, vec) in missing.into_iter().zip(embedded) {
					vectors.insert(item.candidate.slot, vec);
				}
			},
			Ok(embedded) => tracing::warn!(
				collection = %collection.name,
				expected = missing.len(),
				actual = embedded.len(),
				"Diversity embedding count mismatch; skipping the filter for those chunks."
			),
			Err(err) => tracing::warn!(
				collection = %collection.name,
				error = %err,
				"Diversity embedding failed; skipping the filter for those chunks."
			),
		}

		vectors
	}
}

fn assemble_bundles(scored: &[ScoredCandidate], selected: &[u32]) -> Vec<RetrievedBundle> {
	let total = selected.len();

	selected
		.iter()
		.enumerate()
		.filter_map(|(position, group)| {
			// `selected` lists the best group last.
			let rank = (total - position) as u32;

			assemble_bundle(scored, *group, rank)
		})
		.collect()
}

fn assemble_bundle(scored: &[ScoredCandidate], group: u32, rank: u32) -> Option<RetrievedBundle> {
	let best = scored.iter().find(|item| item.candidate.group == group)?;
	let mut members: Vec<&ScoredCandidate> =
		scored.iter().filter(|item| item.candidate.group == group).collect();

	// Members keep fusion order, which follows the prev/next chain for adjacency runs.
	members.sort_by_key(|item| item.candidate.position);

	let mut retrievers = Vec::new();

	for item in &members {
		if !retrievers.contains(&item.candidate.retriever) {
			retrievers.push(item.candidate.retriever);
		}
	}

	let content = members
		.iter()
		.map(|item| item.candidate.chunk.content.as_str())
		.collect::<Vec<_>>()
		.join(" ");

	Some(RetrievedBundle {
		group,
		content,
		retrievers,
		doc_ids: members.iter().map(|item| item.candidate.chunk.doc_id.clone()).collect(),
		date_published: recency::most_recent(
			members.iter().map(|item| item.candidate.chunk.date_published),
		),
		members: members
			.iter()
			.map(|item| RetrievedChunk {
				doc_id: item.candidate.chunk.doc_id.clone(),
				page: item.candidate.chunk.page,
				date_published: item.candidate.chunk.date_published,
			})
			.collect(),
		explain: BundleExplain {
			relevance: best.relevance,
			recency: best.recency,
			combined: best.combined,
			selection_rank: rank,
		},
	})
}
