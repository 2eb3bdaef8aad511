use unicode_normalization::UnicodeNormalization;
use unicode_script::{Script, UnicodeScript};
use unicode_segmentation::UnicodeSegmentation;

/// Splits text into lexical terms for term-statistics ranking.
///
/// Text is NFKC-folded and lowercased, then split on Unicode word boundaries. Word boundaries
/// leave every Han ideograph as its own word, so runs of adjacent ideographs additionally emit
/// their bigrams to keep some phrase locality.
pub fn lexical_terms(text: &str) -> Vec<String> {
	let normalized: String = text.nfkc().collect::<String>().to_lowercase();
	let mut out = Vec::new();
	let mut prev_ideograph: Option<char> = None;

	for segment in normalized.split_word_bounds() {
		let mut chars = segment.chars();
		let single = match (chars.next(), chars.next()) {
			(Some(ch), None) => Some(ch),
			_ => None,
		};

		if let Some(ch) = single.filter(|ch| is_ideograph(*ch)) {
			if let Some(prev) = prev_ideograph {
				out.push(format!("{prev}{ch}"));
			}

			out.push(ch.to_string());

			prev_ideograph = Some(ch);

			continue;
		}

		prev_ideograph = None;

		if segment.chars().any(char::is_alphanumeric) {
			out.push(segment.to_string());
		}
	}

	out
}

fn is_ideograph(ch: char) -> bool {
	matches!(ch.script(), Script::Han)
}
