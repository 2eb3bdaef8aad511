use crate::{Catalog, FlatIndex, Result, Slot, VectorSearch};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SummaryHit {
	/// Position of the summary in [`Catalog::summaries`].
	pub index: usize,
	pub score: f32,
}

/// Dense index over the distinct title summaries of a corpus.
///
/// Row `i` of the index holds the embedding of `catalog.summaries()[i]`, so a hit fans out
/// through [`Catalog::summary_members`].
#[derive(Debug)]
pub struct SummaryIndex {
	index: FlatIndex,
}
impl SummaryIndex {
	pub fn new(dim: usize) -> Self {
		Self { index: FlatIndex::new(dim) }
	}

	/// `vectors` must follow the order of `catalog.summaries()`.
	pub fn build(catalog: &Catalog, dim: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
		if vectors.len() != catalog.summaries().len() {
			return Err(crate::Error::InvalidArgument(format!(
				"Expected {} summary vectors, got {}.",
				catalog.summaries().len(),
				vectors.len()
			)));
		}

		let mut index = FlatIndex::new(dim);

		for vec in vectors {
			index.push(vec)?;
		}

		Ok(Self { index })
	}

	pub fn len(&self) -> usize {
		self.index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.index.is_empty()
	}

	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SummaryHit>> {
		if self.index.is_empty() {
			return Ok(Vec::new());
		}

		Ok(self
			.index
			.search(query, k)?
			.into_iter()
			.map(|hit| SummaryHit { index: hit.slot, score: hit.score })
			.collect())
	}

	/// Chunk slots for every hit, each inheriting the summary score, in hit order.
	pub fn fan_out(catalog: &Catalog, hits: &[SummaryHit]) -> Vec<(Slot, f32)> {
		hits.iter()
			.flat_map(|hit| {
				catalog.summary_members(hit.index).iter().map(move |slot| (*slot, hit.score))
			})
			.collect()
	}
}
