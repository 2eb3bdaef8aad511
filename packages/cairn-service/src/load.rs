use cairn_config::Config;
use cairn_storage::{Catalog, ChunkRecord, Collection, CorpusVectors};

use crate::{CairnService, Error, Providers, Result};

const EMBED_BATCH_SIZE: usize = 64;

impl CairnService {
	/// Reads every configured collection snapshot and builds its indices.
	pub async fn load(cfg: Config, providers: Providers) -> Result<Self> {
		let mut collections = Vec::with_capacity(cfg.collections.len());

		for collection_cfg in &cfg.collections {
			let records = cairn_storage::read_jsonl(&collection_cfg.path)?;

			collections.push(load_collection(&cfg, &providers, &collection_cfg.name, records).await?);
		}

		Ok(Self::with_providers(cfg, collections, providers))
	}
}

/// Builds a collection from snapshot records.
///
/// Records without a stored embedding and every distinct title summary are embedded here.
pub async fn load_collection(
	cfg: &Config,
	providers: &Providers,
	name: &str,
	records: Vec<ChunkRecord>,
) -> Result<Collection> {
	let dim = cfg.providers.embedding.dimensions as usize;
	let mut chunks = Vec::with_capacity(records.len());
	let mut stored = Vec::with_capacity(records.len());

	for record in records {
		chunks.push(record.chunk);
		stored.push(record.embedding);
	}

	let catalog = Catalog::build(&chunks)?;
	let missing: Vec<usize> =
		stored.iter().enumerate().filter(|(_, vec)| vec.is_none()).map(|(i, _)| i).collect();
	let missing_texts: Vec<String> = missing.iter().map(|i| chunks[*i].content.clone()).collect();
	let embedded = embed_batched(cfg, providers, &missing_texts).await?;

	for (index, vec) in missing.into_iter().zip(embedded) {
		stored[index] = Some(vec);
	}

	let chunk_vectors = stored
		.into_iter()
		.enumerate()
		.map(|(i, vec)| {
			vec.ok_or_else(|| Error::Provider {
				message: format!("No embedding for chunk {}.", chunks[i].doc_id),
			})
		})
		.collect::<Result<Vec<_>>>()?;
	let summaries = embed_batched(cfg, providers, catalog.summaries()).await?;

	tracing::info!(
		collection = name,
		chunks = chunks.len(),
		embedded = missing_texts.len(),
		summaries = summaries.len(),
		"Collection snapshot loaded."
	);

	let vectors = CorpusVectors { dim, chunks: chunk_vectors, summaries };
	let lexical = &cfg.retrieval.lexical;

	Ok(Collection::with_catalog(name, catalog, chunks, vectors, lexical.k1, lexical.b)?)
}

async fn embed_batched(
	cfg: &Config,
	providers: &Providers,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let mut out = Vec::with_capacity(texts.len());

	for batch in texts.chunks(EMBED_BATCH_SIZE) {
		let vectors = providers.embedding.embed(&cfg.providers.embedding, batch).await?;

		if vectors.len() != batch.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					vectors.len(),
					batch.len()
				),
			});
		}

		out.extend(vectors);
	}

	Ok(out)
}
