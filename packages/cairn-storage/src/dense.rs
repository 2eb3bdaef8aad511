use crate::{Error, Result, Slot};
use cairn_domain::vector;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
	pub slot: Slot,
	pub score: f32,
}

/// Nearest-neighbor search over L2-normalized vectors.
pub trait VectorSearch
where
	Self: Send + Sync,
{
	/// Returns at most `k` hits by descending inner product. Equal scores keep insertion order.
	fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>>;

	/// Stored vector for `slot`, when the backend keeps one in memory.
	fn vector(&self, _slot: Slot) -> Option<&[f32]> {
		None
	}
}

/// Exhaustive inner-product index. Slot `i` is the `i`-th vector pushed.
#[derive(Debug)]
pub struct FlatIndex {
	dim: usize,
	vectors: Vec<Vec<f32>>,
}
impl FlatIndex {
	pub fn new(dim: usize) -> Self {
		Self { dim, vectors: Vec::new() }
	}

	pub fn len(&self) -> usize {
		self.vectors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vectors.is_empty()
	}

	pub fn push(&mut self, vec: Vec<f32>) -> Result<Slot> {
		self.check_dim(vec.len())?;
		self.vectors.push(vector::normalized(vec));

		Ok(self.vectors.len() - 1)
	}

	fn check_dim(&self, actual: usize) -> Result<()> {
		if actual != self.dim {
			return Err(Error::DimensionMismatch { expected: self.dim, actual });
		}

		Ok(())
	}
}
impl VectorSearch for FlatIndex {
	fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
		self.check_dim(query.len())?;

		if k == 0 {
			return Ok(Vec::new());
		}

		let query = vector::normalized(query.to_vec());
		let mut hits: Vec<Hit> = self
			.vectors
			.iter()
			.enumerate()
			.map(|(slot, vec)| Hit { slot, score: vector::dot(&query, vec) })
			.collect();

		// `sort_by` is stable, so ties stay in slot order.
		hits.sort_by(|a, b| vector::cmp_f32_desc(a.score, b.score));
		hits.truncate(k);

		Ok(hits)
	}

	fn vector(&self, slot: Slot) -> Option<&[f32]> {
		self.vectors.get(slot).map(Vec::as_slice)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn index(vectors: &[[f32; 2]]) -> FlatIndex {
		let mut index = FlatIndex::new(2);

		for vec in vectors {
			index.push(vec.to_vec()).expect("push failed");
		}

		index
	}

	#[test]
	fn ranks_by_normalized_inner_product() {
		let index = index(&[[0.0, 3.0], [2.0, 0.0], [1.0, 1.0]]);
		let hits = index.search(&[5.0, 0.0], 2).expect("search failed");
		let slots: Vec<Slot> = hits.iter().map(|hit| hit.slot).collect();

		assert_eq!(slots, vec![1, 2]);
		assert!((hits[0].score - 1.0).abs() < 1e-6);
	}

	#[test]
	fn ties_keep_insertion_order() {
		let index = index(&[[1.0, 0.0], [0.0, 1.0], [2.0, 0.0]]);
		let hits = index.search(&[1.0, 0.0], 3).expect("search failed");
		let slots: Vec<Slot> = hits.iter().map(|hit| hit.slot).collect();

		assert_eq!(slots, vec![0, 2, 1]);
	}

	#[test]
	fn rejects_wrong_dimensions() {
		let mut index = index(&[[1.0, 0.0]]);

		assert!(matches!(
			index.push(vec![1.0, 0.0, 0.0]),
			Err(Error::DimensionMismatch { expected: 2, actual: 3 })
		));
		assert!(index.search(&[1.0], 1).is_err());
	}

	#[test]
	fn zero_k_returns_nothing() {
		let index = index(&[[1.0, 0.0]]);

		assert!(index.search(&[1.0, 0.0], 0).expect("search failed").is_empty());
	}
}
