use time::Date;

pub const DEFAULT_WINDOW_DAYS: f32 = 365.0;

/// Linear decay from 1.0 on the reference date to 0.0 at `window_days` away, in either
/// direction. Undated chunks score 0.0.
pub fn recency_score(reference: Date, published: Option<Date>, window_days: f32) -> f32 {
	let Some(published) = published else { return 0.0 };

	if !(window_days > 0.0) {
		return 0.0;
	}

	let distance_days = (reference - published).whole_days().unsigned_abs() as f32;

	(1.0 - distance_days / window_days).clamp(0.0, 1.0)
}

pub fn most_recent<I>(dates: I) -> Option<Date>
where
	I: IntoIterator<Item = Option<Date>>,
{
	dates.into_iter().flatten().max()
}
