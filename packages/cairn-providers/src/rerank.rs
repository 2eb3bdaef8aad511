use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use cairn_config::ProviderConfig;

/// Scores every document against `query`. Scores are aligned with `docs` by position.
pub async fn rerank(cfg: &ProviderConfig, query: &str, docs: &[String]) -> Result<Vec<f32>> {
	if docs.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "query": query, "documents": docs });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json, docs.len())
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<f32>> {
	let results = json.get("results").or_else(|| json.get("data")).and_then(|v| v.as_array());
	let Some(results) = results else {
		return Err(Error::InvalidResponse {
			message: "Rerank response is missing results array.".to_string(),
		});
	};
	let mut scores: Vec<Option<f32>> = vec![None; doc_count];

	for item in results {
		let index = item.get("index").and_then(|v| v.as_u64()).ok_or_else(|| {
			Error::InvalidResponse { message: "Rerank result missing index.".to_string() }
		})? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| Error::InvalidResponse {
				message: "Rerank result missing score.".to_string(),
			})? as f32;

		if let Some(slot) = scores.get_mut(index) {
			*slot = Some(score);
		}
	}

	// Every document must come back with a score.
	scores
		.into_iter()
		.enumerate()
		.map(|(index, score)| {
			score.ok_or_else(|| Error::InvalidResponse {
				message: format!("Rerank response has no score for document {index}."),
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aligns_scores_by_index() {
		let json = serde_json::json!({
			"results": [
				{ "index": 1, "relevance_score": 0.2 },
				{ "index": 0, "relevance_score": 0.9 }
			]
		});
		let scores = parse_rerank_response(json, 2).expect("parse failed");

		assert_eq!(scores, vec![0.9, 0.2]);
	}

	#[test]
	fn accepts_data_and_score_aliases() {
		let json = serde_json::json!({ "data": [{ "index": 0, "score": -1.5 }] });

		assert_eq!(parse_rerank_response(json, 1).expect("parse failed"), vec![-1.5]);
	}

	#[test]
	fn rejects_missing_scores() {
		let json = serde_json::json!({ "results": [{ "index": 0, "relevance_score": 0.4 }] });

		assert!(parse_rerank_response(json, 2).is_err());
	}
}
