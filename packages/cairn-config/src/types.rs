use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub selection: Selection,
	#[serde(default)]
	pub collections: Vec<Collection>,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	/// Seeds taken from each dense variant and from the lexical ranking.
	pub top_k: u32,
	/// Dense results fetched per variant to build the expansion score map.
	pub dense_candidates: u32,
	pub summary_top_k: u32,
	/// Zero ranks the whole corpus.
	pub lexical_candidates: u32,
	pub expansion: Expansion,
	pub lexical: Lexical,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_k: 5,
			dense_candidates: 2_048,
			summary_top_k: 5,
			lexical_candidates: 0,
			expansion: Expansion::default(),
			lexical: Lexical::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Expansion {
	/// The seed must score strictly above this before any neighbor is considered.
	pub high_threshold: f32,
	/// A neighbor must score strictly above this to join the bundle.
	pub low_threshold: f32,
	pub max_bundle_size: u32,
}
impl Default for Expansion {
	fn default() -> Self {
		Self { high_threshold: 0.72, low_threshold: 0.66, max_bundle_size: 4 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Lexical {
	pub k1: f32,
	pub b: f32,
}
impl Default for Lexical {
	fn default() -> Self {
		Self { k1: 1.2, b: 0.75 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub rerank_batch_size: u32,
	pub recency_window_days: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self { rerank_batch_size: 8, recency_window_days: 365.0 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Selection {
	/// Maximum number of chunks across all selected bundles.
	pub budget: u32,
	/// Bundles whose nearest selected chunk is more similar than this are skipped.
	pub diversity_threshold: f32,
	/// Rendered context drops bundles with fewer characters than this.
	pub min_bundle_chars: u32,
}
impl Default for Selection {
	fn default() -> Self {
		Self { budget: 5, diversity_threshold: 0.9, min_bundle_chars: 50 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Collection {
	pub name: String,
	pub path: PathBuf,
	/// Overrides `retrieval.top_k`. A value of zero disables the collection.
	pub top_k: Option<u32>,
}
