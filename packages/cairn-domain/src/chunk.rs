use serde::{Deserialize, Serialize};
use time::Date;

/// The smallest retrievable unit of text.
///
/// `prev_chunk_id` and `next_chunk_id` are lookups into the same corpus, never owning links.
/// Chunks sharing a `bundle_id` are always retrieved or dropped together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	pub doc_id: String,
	#[serde(default, alias = "page_content")]
	pub content: String,
	#[serde(default)]
	pub page: Option<u32>,
	#[serde(default, deserialize_with = "empty_as_none")]
	pub prev_chunk_id: Option<String>,
	#[serde(default, deserialize_with = "empty_as_none")]
	pub next_chunk_id: Option<String>,
	#[serde(default, deserialize_with = "bundle_id_as_string")]
	pub bundle_id: Option<String>,
	#[serde(default, deserialize_with = "empty_as_none")]
	pub title_summary: Option<String>,
	#[serde(default, with = "date_format::option")]
	pub date_published: Option<Date>,
}
impl Chunk {
	pub fn new(doc_id: impl Into<String>, content: impl Into<String>) -> Self {
		Self {
			doc_id: doc_id.into(),
			content: content.into(),
			page: None,
			prev_chunk_id: None,
			next_chunk_id: None,
			bundle_id: None,
			title_summary: None,
			date_published: None,
		}
	}
}

/// `YYYY-MM-DD` calendar dates.
pub mod date_format {
	use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
	use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

	pub const FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

	pub fn parse(raw: &str) -> Result<Date, time::error::Parse> {
		Date::parse(raw.trim(), FORMAT)
	}

	pub fn format(date: Date) -> Result<String, time::error::Format> {
		date.format(FORMAT)
	}

	pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let text = format(*date).map_err(S::Error::custom)?;

		serializer.serialize_str(&text)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		parse(&raw).map_err(D::Error::custom)
	}

	pub mod option {
		use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
		use time::Date;

		use super::parse;

		pub fn serialize<S>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			match date {
				Some(date) => super::serialize(date, serializer),
				None => serializer.serialize_none(),
			}
		}

		/// Empty strings and nulls both mean "undated".
		pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
		where
			D: Deserializer<'de>,
		{
			let raw: Option<String> = Option::deserialize(deserializer)?;

			match raw.as_deref().map(str::trim) {
				None | Some("") => Ok(None),
				Some(text) => parse(text).map(Some).map_err(D::Error::custom),
			}
		}
	}
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let raw: Option<String> = Option::deserialize(deserializer)?;

	Ok(raw.filter(|value| !value.trim().is_empty()))
}

// Snapshots written by the ingestion pipeline store bundle ids as integers.
fn bundle_id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum RawBundleId {
		Int(i64),
		Text(String),
	}

	let raw: Option<RawBundleId> = Option::deserialize(deserializer)?;

	Ok(match raw {
		Some(RawBundleId::Int(value)) => Some(value.to_string()),
		Some(RawBundleId::Text(value)) if !value.trim().is_empty() => Some(value),
		_ => None,
	})
}
