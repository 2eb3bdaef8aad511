use std::collections::{HashMap, HashSet};

use crate::ScoredCandidate;
use cairn_domain::vector;
use cairn_storage::Slot;

#[derive(Clone, Copy, Debug)]
pub struct SelectParams {
	/// Maximum number of chunks across all accepted groups.
	pub budget: usize,
	pub diversity_threshold: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
	Budget,
	Redundant,
}

/// Greedy bundle-atomic selection over candidates sorted best first.
///
/// Each group is considered once, at its best-scoring member. A group is skipped when its size
/// would push the total past the budget, or when any of its chunks is more similar than the
/// diversity threshold to an already accepted chunk. Chunks without a vector in `vectors` are
/// exempt from the similarity check.
///
/// Returns the accepted group ids with the most relevant group last.
pub fn select(
	scored: &[ScoredCandidate],
	params: SelectParams,
	vectors: &HashMap<Slot, Vec<f32>>,
) -> Vec<u32> {
	let mut members: HashMap<u32, Vec<Slot>> = HashMap::new();

	for item in scored {
		members.entry(item.candidate.group).or_default().push(item.candidate.slot);
	}

	let mut considered = HashSet::new();
	let mut accepted = Vec::new();
	let mut accepted_slots: Vec<Slot> = Vec::new();
	let mut total = 0_usize;

	for item in scored {
		let group = item.candidate.group;

		if !considered.insert(group) {
			continue;
		}

		let slots = members.get(&group).map(Vec::as_slice).unwrap_or(&[]);
		let skip = if total + slots.len() > params.budget {
			Some(SkipReason::Budget)
		} else if max_similarity(slots, &accepted_slots, vectors)
			.is_some_and(|similarity| similarity > params.diversity_threshold)
		{
			Some(SkipReason::Redundant)
		} else {
			None
		};

		if let Some(reason) = skip {
			tracing::debug!(
				group,
				doc_id = %item.candidate.chunk.doc_id,
				combined = item.combined,
				reason = ?reason,
				"Bundle skipped during selection."
			);

			continue;
		}

		total += slots.len();

		accepted.push(group);
		accepted_slots.extend_from_slice(slots);
	}

	accepted.reverse();

	accepted
}

fn max_similarity(
	slots: &[Slot],
	accepted: &[Slot],
	vectors: &HashMap<Slot, Vec<f32>>,
) -> Option<f32> {
	let mut best: Option<f32> = None;

	for slot in slots {
		let Some(lhs) = vectors.get(slot) else { continue };

		for other in accepted {
			let Some(rhs) = vectors.get(other) else { continue };
			let Some(similarity) = vector::cosine_similarity(lhs, rhs) else { continue };

			if best.map(|value| similarity > value).unwrap_or(true) {
				best = Some(similarity);
			}
		}
	}

	best
}
