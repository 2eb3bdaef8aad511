pub mod chunk;
pub mod recency;
pub mod text;
pub mod vector;

pub use chunk::{Chunk, date_format};
