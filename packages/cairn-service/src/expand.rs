use std::collections::{HashMap, HashSet, VecDeque};

use cairn_config::Expansion;
use cairn_storage::{Catalog, Slot};

/// The atomic group a chunk belongs to: its whole `bundle_id` group in document order, or the
/// chunk alone.
pub fn bundle_group(catalog: &Catalog, slot: Slot) -> Vec<Slot> {
	match catalog.entry(slot).and_then(|entry| entry.bundle_id.as_deref()) {
		Some(bundle_id) => catalog.bundle_members(bundle_id).to_vec(),
		None => vec![slot],
	}
}

/// Grows a neighborhood around `seed` from the originating index's score map.
///
/// Chunks with a `bundle_id` return their bundle unchanged. Otherwise, while the seed scores
/// above `high_threshold`, the walk extends from both ends of the current run through
/// `prev`/`next` links, taking a neighbor only when it scores above `low_threshold`, is not
/// bundled, and is neither in the run nor in `seen`. The run never exceeds `max_bundle_size`.
pub fn expand(
	catalog: &Catalog,
	seed: Slot,
	seed_score: f32,
	scores: &HashMap<Slot, f32>,
	seen: &HashSet<Slot>,
	params: &Expansion,
) -> Vec<Slot> {
	if catalog.entry(seed).and_then(|entry| entry.bundle_id.as_ref()).is_some() {
		return bundle_group(catalog, seed);
	}

	let max_size = params.max_bundle_size.max(1) as usize;
	let mut run = VecDeque::from([seed]);

	if seed_score <= params.high_threshold {
		return run.into();
	}

	while run.len() < max_size {
		let mut extended = false;
		let front = run.front().copied().unwrap_or(seed);

		if let Some(prev) = catalog.entry(front).and_then(|entry| entry.prev)
			&& admits(catalog, prev, &run, scores, seen, params.low_threshold)
		{
			run.push_front(prev);

			extended = true;
		}

		if run.len() >= max_size {
			break;
		}

		let back = run.back().copied().unwrap_or(seed);

		if let Some(next) = catalog.entry(back).and_then(|entry| entry.next)
			&& admits(catalog, next, &run, scores, seen, params.low_threshold)
		{
			run.push_back(next);

			extended = true;
		}

		if !extended {
			break;
		}
	}

	run.into()
}

fn admits(
	catalog: &Catalog,
	neighbor: Slot,
	run: &VecDeque<Slot>,
	scores: &HashMap<Slot, f32>,
	seen: &HashSet<Slot>,
	low_threshold: f32,
) -> bool {
	if run.contains(&neighbor) || seen.contains(&neighbor) {
		return false;
	}
	// Bundled chunks only ever travel with their whole bundle.
	if catalog.entry(neighbor).and_then(|entry| entry.bundle_id.as_ref()).is_some() {
		return false;
	}

	scores.get(&neighbor).is_some_and(|score| *score > low_threshold)
}
