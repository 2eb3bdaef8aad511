use std::collections::{HashMap, HashSet};

use crate::{Hit, Result, Slot};
use cairn_domain::{text, vector};

/// Term-statistics search over chunk content.
pub trait TermSearch
where
	Self: Send + Sync,
{
	/// Returns at most `k` hits with a positive score, best first. Equal scores keep slot order.
	fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>>;
}

/// In-memory BM25 index with `idf = ln((n - df + 0.5) / (df + 0.5) + 1)`.
#[derive(Debug)]
pub struct Bm25Index {
	k1: f32,
	b: f32,
	postings: HashMap<String, Vec<(Slot, u32)>>,
	doc_lens: Vec<u32>,
	avg_doc_len: f32,
}
impl Bm25Index {
	pub fn build<'a, I>(documents: I, k1: f32, b: f32) -> Self
	where
		I: IntoIterator<Item = &'a str>,
	{
		let mut postings: HashMap<String, Vec<(Slot, u32)>> = HashMap::new();
		let mut doc_lens = Vec::new();

		for (slot, document) in documents.into_iter().enumerate() {
			let terms = text::lexical_terms(document);
			let mut counts: HashMap<String, u32> = HashMap::new();

			doc_lens.push(terms.len() as u32);

			for term in terms {
				*counts.entry(term).or_default() += 1;
			}
			for (term, tf) in counts {
				postings.entry(term).or_default().push((slot, tf));
			}
		}

		let total: u64 = doc_lens.iter().map(|len| u64::from(*len)).sum();
		let avg_doc_len =
			if doc_lens.is_empty() { 0.0 } else { total as f32 / doc_lens.len() as f32 };

		Self { k1, b, postings, doc_lens, avg_doc_len }
	}

	pub fn len(&self) -> usize {
		self.doc_lens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.doc_lens.is_empty()
	}

	fn term_score(&self, tf: u32, df: usize, doc_len: u32) -> f32 {
		let n = self.doc_lens.len() as f32;
		let df = df as f32;
		let tf = tf as f32;
		let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
		let norm = if self.avg_doc_len > 0.0 {
			1.0 - self.b + self.b * doc_len as f32 / self.avg_doc_len
		} else {
			1.0
		};

		idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm)
	}
}
impl TermSearch for Bm25Index {
	fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
		if k == 0 || self.is_empty() {
			return Ok(Vec::new());
		}

		let mut scores = vec![0.0_f32; self.doc_lens.len()];
		let mut seen_terms = HashSet::new();

		for term in text::lexical_terms(query) {
			if !seen_terms.insert(term.clone()) {
				continue;
			}

			let Some(postings) = self.postings.get(&term) else { continue };

			for (slot, tf) in postings {
				scores[*slot] += self.term_score(*tf, postings.len(), self.doc_lens[*slot]);
			}
		}

		let mut hits: Vec<Hit> = scores
			.into_iter()
			.enumerate()
			.filter(|(_, score)| *score > 0.0)
			.map(|(slot, score)| Hit { slot, score })
			.collect();

		hits.sort_by(|a, b| vector::cmp_f32_desc(a.score, b.score));
		hits.truncate(k);

		Ok(hits)
	}
}
