use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use cairn_domain::Chunk;

/// One line of a JSONL corpus snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
	#[serde(flatten)]
	pub chunk: Chunk,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub embedding: Option<Vec<f32>>,
}

pub fn read_jsonl(path: &Path) -> Result<Vec<ChunkRecord>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadSnapshot { path: path.to_path_buf(), source: err })?;

	parse_jsonl(path, &raw)
}

pub fn parse_jsonl(path: &Path, raw: &str) -> Result<Vec<ChunkRecord>> {
	let mut records = Vec::new();

	for (index, line) in raw.lines().enumerate() {
		if line.trim().is_empty() {
			continue;
		}

		let record = serde_json::from_str(line).map_err(|err| Error::ParseRecord {
			path: path.to_path_buf(),
			line: index + 1,
			source: err,
		})?;

		records.push(record);
	}

	Ok(records)
}
