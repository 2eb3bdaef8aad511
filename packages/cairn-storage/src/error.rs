use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read corpus snapshot at {path:?}.")]
	ReadSnapshot { path: PathBuf, source: std::io::Error },
	#[error("Invalid corpus record at {path:?} line {line}.")]
	ParseRecord { path: PathBuf, line: usize, source: serde_json::Error },
	#[error("Duplicate doc_id: {0}")]
	DuplicateDocId(String),
	#[error("Vector dimension mismatch: expected {expected}, got {actual}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}
