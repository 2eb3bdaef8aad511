use std::collections::HashMap;

use time::Date;

use crate::{Error, Result};
use cairn_domain::Chunk;

/// Position of a chunk in the catalog arena. Slots follow snapshot (document) order.
pub type Slot = usize;

#[derive(Clone, Debug)]
pub struct ChunkEntry {
	pub doc_id: String,
	pub prev: Option<Slot>,
	pub next: Option<Slot>,
	pub bundle_id: Option<String>,
	pub title_summary: Option<String>,
	pub date_published: Option<Date>,
}

/// Read-only chunk metadata with adjacency resolved to arena slots.
#[derive(Debug, Default)]
pub struct Catalog {
	entries: Vec<ChunkEntry>,
	by_doc_id: HashMap<String, Slot>,
	bundles: HashMap<String, Vec<Slot>>,
	summaries: Vec<String>,
	summary_members: Vec<Vec<Slot>>,
}
impl Catalog {
	pub fn build<'a, I>(chunks: I) -> Result<Self>
	where
		I: IntoIterator<Item = &'a Chunk>,
	{
		let chunks: Vec<&Chunk> = chunks.into_iter().collect();
		let mut by_doc_id = HashMap::with_capacity(chunks.len());

		for (slot, chunk) in chunks.iter().enumerate() {
			if by_doc_id.insert(chunk.doc_id.clone(), slot).is_some() {
				return Err(Error::DuplicateDocId(chunk.doc_id.clone()));
			}
		}

		let mut entries = Vec::with_capacity(chunks.len());
		let mut bundles: HashMap<String, Vec<Slot>> = HashMap::new();
		let mut summary_slots: HashMap<String, usize> = HashMap::new();
		let mut summaries = Vec::new();
		let mut summary_members: Vec<Vec<Slot>> = Vec::new();

		for (slot, chunk) in chunks.iter().enumerate() {
			let prev = resolve_neighbor(&by_doc_id, chunk, chunk.prev_chunk_id.as_deref(), "prev");
			let next = resolve_neighbor(&by_doc_id, chunk, chunk.next_chunk_id.as_deref(), "next");

			if let Some(bundle_id) = chunk.bundle_id.as_ref() {
				bundles.entry(bundle_id.clone()).or_default().push(slot);
			}
			if let Some(summary) = chunk.title_summary.as_ref() {
				let index = *summary_slots.entry(summary.clone()).or_insert_with(|| {
					summaries.push(summary.clone());
					summary_members.push(Vec::new());

					summaries.len() - 1
				});

				summary_members[index].push(slot);
			}

			entries.push(ChunkEntry {
				doc_id: chunk.doc_id.clone(),
				prev,
				next,
				bundle_id: chunk.bundle_id.clone(),
				title_summary: chunk.title_summary.clone(),
				date_published: chunk.date_published,
			});
		}

		Ok(Self { entries, by_doc_id, bundles, summaries, summary_members })
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn slot(&self, doc_id: &str) -> Option<Slot> {
		self.by_doc_id.get(doc_id).copied()
	}

	pub fn entry(&self, slot: Slot) -> Option<&ChunkEntry> {
		self.entries.get(slot)
	}

	pub fn doc_id(&self, slot: Slot) -> Option<&str> {
		self.entries.get(slot).map(|entry| entry.doc_id.as_str())
	}

	/// Every slot sharing `bundle_id`, in document order.
	pub fn bundle_members(&self, bundle_id: &str) -> &[Slot] {
		self.bundles.get(bundle_id).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Distinct non-empty title summaries in first-seen order.
	pub fn summaries(&self) -> &[String] {
		&self.summaries
	}

	pub fn summary_members(&self, summary: usize) -> &[Slot] {
		self.summary_members.get(summary).map(Vec::as_slice).unwrap_or(&[])
	}
}

fn resolve_neighbor(
	by_doc_id: &HashMap<String, Slot>,
	chunk: &Chunk,
	neighbor: Option<&str>,
	direction: &'static str,
) -> Option<Slot> {
	let neighbor = neighbor?;
	let slot = by_doc_id.get(neighbor).copied();

	if slot.is_none() {
		tracing::warn!(
			doc_id = %chunk.doc_id,
			neighbor,
			direction,
			"Adjacent chunk does not resolve; treating the link as empty."
		);
	}

	slot
}

#[cfg(test)]
mod tests {
	use super::*;

	fn linked(doc_id: &str, prev: Option<&str>, next: Option<&str>) -> Chunk {
		let mut chunk = Chunk::new(doc_id, format!("content of {doc_id}"));

		chunk.prev_chunk_id = prev.map(str::to_string);
		chunk.next_chunk_id = next.map(str::to_string);

		chunk
	}

	#[test]
	fn resolves_adjacency_to_slots() {
		let chunks = vec![
			linked("a", None, Some("b")),
			linked("b", Some("a"), Some("c")),
			linked("c", Some("b"), None),
		];
		let catalog = Catalog::build(&chunks).expect("build failed");
		let b = catalog.slot("b").expect("slot");

		assert_eq!(catalog.entry(b).and_then(|entry| entry.prev), catalog.slot("a"));
		assert_eq!(catalog.entry(b).and_then(|entry| entry.next), catalog.slot("c"));
	}

	#[test]
	fn unresolved_neighbors_become_empty() {
		let chunks = vec![linked("a", Some("ghost"), Some("b")), linked("b", Some("a"), None)];
		let catalog = Catalog::build(&chunks).expect("build failed");
		let entry = catalog.entry(0).expect("entry");

		assert_eq!(entry.prev, None);
		assert_eq!(entry.next, Some(1));
	}

	#[test]
	fn rejects_duplicate_doc_ids() {
		let chunks = vec![Chunk::new("dup", "one"), Chunk::new("dup", "two")];

		assert!(matches!(Catalog::build(&chunks), Err(Error::DuplicateDocId(id)) if id == "dup"));
	}

	#[test]
	fn groups_bundles_and_summaries_in_document_order() {
		let mut chunks: Vec<Chunk> =
			["r0", "x", "r1", "r2"].iter().map(|id| Chunk::new(*id, "row")).collect();

		for index in [0, 2, 3] {
			chunks[index].bundle_id = Some("table".to_string());
		}

		chunks[1].title_summary = Some("Overview".to_string());
		chunks[3].title_summary = Some("Overview".to_string());

		let catalog = Catalog::build(&chunks).expect("build failed");

		assert_eq!(catalog.bundle_members("table"), &[0, 2, 3]);
		assert!(catalog.bundle_members("missing").is_empty());
		assert_eq!(catalog.summaries(), &["Overview".to_string()]);
		assert_eq!(catalog.summary_members(0), &[1, 3]);
	}
}
