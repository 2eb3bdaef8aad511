pub mod catalog;
pub mod collection;
pub mod dense;
pub mod lexical;
pub mod models;
pub mod store;
pub mod summary;

mod error;

pub use catalog::{Catalog, ChunkEntry, Slot};
pub use collection::{Collection, CorpusVectors};
pub use dense::{FlatIndex, Hit, VectorSearch};
pub use error::Error;
pub use lexical::{Bm25Index, TermSearch};
pub use models::{ChunkRecord, parse_jsonl, read_jsonl};
pub use store::{ChunkStore, MemoryStore};
pub use summary::{SummaryHit, SummaryIndex};

pub type Result<T, E = Error> = std::result::Result<T, E>;
