use time::Date;

use crate::{Candidate, Error, RerankProvider, Result};
use cairn_config::ProviderConfig;
use cairn_domain::{recency, vector};

#[derive(Clone, Debug)]
pub struct ScoredCandidate {
	pub candidate: Candidate,
	pub relevance: f32,
	pub recency: f32,
	pub combined: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct RerankParams {
	pub batch_size: usize,
	pub reference_date: Date,
	pub recency_window_days: f32,
}

/// Scores every candidate against `query` and orders them by `relevance + recency`, best first.
///
/// Documents go to the scorer in fixed-size batches; equal combined scores keep fusion order.
/// Any scorer failure fails the whole call.
pub async fn score_candidates(
	provider: &dyn RerankProvider,
	cfg: &ProviderConfig,
	query: &str,
	candidates: Vec<Candidate>,
	params: RerankParams,
) -> Result<Vec<ScoredCandidate>> {
	if candidates.is_empty() {
		return Ok(Vec::new());
	}

	let docs: Vec<String> = candidates.iter().map(|c| c.chunk.content.clone()).collect();
	let mut relevance = Vec::with_capacity(docs.len());

	for batch in docs.chunks(params.batch_size.max(1)) {
		let scores = provider.rerank(cfg, query, batch).await?;

		if scores.len() != batch.len() {
			return Err(Error::Provider {
				message: format!(
					"Rerank provider returned {} scores for {} documents.",
					scores.len(),
					batch.len()
				),
			});
		}

		relevance.extend(scores);
	}

	let mut scored: Vec<ScoredCandidate> = candidates
		.into_iter()
		.zip(relevance)
		.map(|(candidate, relevance)| {
			let recency = recency::recency_score(
				params.reference_date,
				candidate.chunk.date_published,
				params.recency_window_days,
			);

			ScoredCandidate { candidate, relevance, recency, combined: relevance + recency }
		})
		.collect();

	scored.sort_by(|a, b| vector::cmp_f32_desc(a.combined, b.combined));

	Ok(scored)
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use time::macros::date;

	use super::*;
	use crate::{BoxFuture, RetrieverKind};
	use cairn_domain::Chunk;

	/// Scores a document by its length and records batch sizes.
	#[derive(Default)]
	struct LengthReranker {
		batches: Mutex<Vec<usize>>,
	}
	impl RerankProvider for LengthReranker {
		fn rerank<'a>(
			&'a self,
			_cfg: &'a ProviderConfig,
			_query: &'a str,
			docs: &'a [String],
		) -> BoxFuture<'a, cairn_providers::Result<Vec<f32>>> {
			self.batches.lock().unwrap_or_else(|err| err.into_inner()).push(docs.len());

			Box::pin(async move {
				let scores: Vec<f32> = docs.iter().map(|doc| doc.len() as f32 / 100.0).collect();

				Ok(scores)
			})
		}
	}

	struct ShortReranker;
	impl RerankProvider for ShortReranker {
		fn rerank<'a>(
			&'a self,
			_cfg: &'a ProviderConfig,
			_query: &'a str,
			_docs: &'a [String],
		) -> BoxFuture<'a, cairn_providers::Result<Vec<f32>>> {
			Box::pin(async move { Ok(vec![0.5_f32]) })
		}
	}

	fn cfg() -> ProviderConfig {
		ProviderConfig {
			provider_id: "test".to_string(),
			api_base: "http://localhost".to_string(),
			api_key: "key".to_string(),
			path: "/".to_string(),
			model: "length".to_string(),
			timeout_ms: 1_000,
			default_headers: Default::default(),
		}
	}

	fn candidate(slot: usize, content: &str, date: Option<Date>) -> Candidate {
		let mut chunk = Chunk::new(format!("c{slot}"), content);

		chunk.date_published = date;

		Candidate {
			slot,
			chunk,
			retriever: RetrieverKind::Dense,
			group: slot as u32,
			position: slot,
		}
	}

	fn params(batch_size: usize) -> RerankParams {
		RerankParams {
			batch_size,
			reference_date: date!(2024 - 01 - 01),
			recency_window_days: 365.0,
		}
	}

	#[tokio::test]
	async fn batching_does_not_change_scores() {
		let contents = ["a", "bbb", "cc", "dddd", "e"];
		let build = || {
			contents.iter().enumerate().map(|(i, text)| candidate(i, text, None)).collect::<Vec<_>>()
		};
		let provider = LengthReranker::default();
		let batched = score_candidates(&provider, &cfg(), "q", build(), params(2))
			.await
			.expect("scoring failed");
		let whole = score_candidates(&provider, &cfg(), "q", build(), params(64))
			.await
			.expect("scoring failed");
		let batches = provider.batches.lock().unwrap_or_else(|err| err.into_inner()).clone();

		assert_eq!(batches, vec![2, 2, 1, 5]);

		for (lhs, rhs) in batched.iter().zip(whole.iter()) {
			assert_eq!(lhs.candidate.slot, rhs.candidate.slot);
			assert_eq!(lhs.relevance, rhs.relevance);
		}
	}

	#[tokio::test]
	async fn recency_breaks_relevance_ties_and_equal_scores_stay_stable() {
		let candidates = vec![
			candidate(0, "same", None),
			candidate(1, "same", Some(date!(2023 - 12 - 01))),
			candidate(2, "same", None),
		];
		let scored = score_candidates(&LengthReranker::default(), &cfg(), "q", candidates, params(8))
			.await
			.expect("scoring failed");
		let order: Vec<usize> = scored.iter().map(|s| s.candidate.slot).collect();

		assert_eq!(order, vec![1, 0, 2]);
		assert!(scored[0].recency > 0.0 && scored[0].recency <= 1.0);
		assert_eq!(scored[1].recency, 0.0);
		assert_eq!(scored[0].combined, scored[0].relevance + scored[0].recency);
	}

	#[tokio::test]
	async fn short_score_lists_are_provider_errors() {
		let candidates = vec![candidate(0, "a", None), candidate(1, "b", None)];
		let err = score_candidates(&ShortReranker, &cfg(), "q", candidates, params(8))
			.await
			.expect_err("expected provider error");

		assert!(matches!(err, Error::Provider { .. }));
	}
}
