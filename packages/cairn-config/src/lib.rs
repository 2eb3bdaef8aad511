mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Collection, Config, EmbeddingProviderConfig, Expansion, Lexical, ProviderConfig, Providers,
	Ranking, Retrieval, Selection, Service,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg, path);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("rerank", &cfg.providers.rerank.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.dense_candidates < cfg.retrieval.top_k {
		return Err(Error::Validation {
			message: "retrieval.dense_candidates must be at least retrieval.top_k.".to_string(),
		});
	}

	validate_expansion(&cfg.retrieval.expansion)?;

	let lexical = &cfg.retrieval.lexical;

	if !lexical.k1.is_finite() || lexical.k1 < 0.0 {
		return Err(Error::Validation {
			message: "retrieval.lexical.k1 must be a finite number, zero or greater.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&lexical.b) {
		return Err(Error::Validation {
			message: "retrieval.lexical.b must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.ranking.rerank_batch_size == 0 {
		return Err(Error::Validation {
			message: "ranking.rerank_batch_size must be greater than zero.".to_string(),
		});
	}
	if !cfg.ranking.recency_window_days.is_finite() || cfg.ranking.recency_window_days <= 0.0 {
		return Err(Error::Validation {
			message: "ranking.recency_window_days must be a finite number greater than zero."
				.to_string(),
		});
	}

	validate_diversity_threshold(cfg.selection.diversity_threshold)?;

	let mut names = HashSet::new();

	for collection in &cfg.collections {
		if collection.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "collections.name must be non-empty.".to_string(),
			});
		}
		if !names.insert(collection.name.as_str()) {
			return Err(Error::Validation {
				message: format!("Collection {} is declared more than once.", collection.name),
			});
		}
		if collection.path.as_os_str().is_empty() {
			return Err(Error::Validation {
				message: format!("Collection {} must declare a path.", collection.name),
			});
		}
	}

	Ok(())
}

pub fn validate_expansion(expansion: &Expansion) -> Result<()> {
	if !expansion.high_threshold.is_finite() || !expansion.low_threshold.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.expansion thresholds must be finite numbers.".to_string(),
		});
	}
	if expansion.low_threshold > expansion.high_threshold {
		return Err(Error::Validation {
			message:
				"retrieval.expansion.low_threshold must not exceed retrieval.expansion.high_threshold."
					.to_string(),
		});
	}
	if expansion.max_bundle_size == 0 {
		return Err(Error::Validation {
			message: "retrieval.expansion.max_bundle_size must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

pub fn validate_diversity_threshold(threshold: f32) -> Result<()> {
	if !threshold.is_finite() {
		return Err(Error::Validation {
			message: "selection.diversity_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&threshold) {
		return Err(Error::Validation {
			message: "selection.diversity_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config, path: &Path) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();

	// Relative corpus paths are resolved against the config file's directory.
	let Some(base) = path.parent() else { return };

	for collection in &mut cfg.collections {
		if collection.path.is_relative() && !collection.path.as_os_str().is_empty() {
			collection.path = base.join(&collection.path);
		}
	}
}
