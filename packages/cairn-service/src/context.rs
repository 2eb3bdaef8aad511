use serde::Serialize;
use time::Date;

use crate::RetrievedBundle;
use cairn_domain::{date_format, recency};

const UNDATED: &str = "an unknown date";

#[derive(Clone, Debug, Default, Serialize)]
pub struct RenderedContext {
	pub text: String,
	/// Most recent publication date among the rendered bundles.
	#[serde(with = "date_format::option")]
	pub most_recent: Option<Date>,
	pub bundles: usize,
}

/// Renders bundles in the given order as `From <date>: <content>` lines.
///
/// Bundles whose content is shorter than `min_chars` characters are left out.
pub fn render_context(bundles: &[RetrievedBundle], min_chars: usize) -> RenderedContext {
	let mut out = RenderedContext::default();
	let mut dates = Vec::new();

	for bundle in bundles {
		if bundle.content.chars().count() < min_chars {
			tracing::debug!(group = bundle.group, "Bundle is too short to render.");

			continue;
		}

		let date = bundle.date_published.and_then(|date| date_format::format(date).ok());

		out.text.push_str(&format!(
			"From {}: {}\n",
			date.as_deref().unwrap_or(UNDATED),
			bundle.content
		));

		dates.push(bundle.date_published);

		out.bundles += 1;
	}

	out.most_recent = recency::most_recent(dates);

	out
}
