use std::cmp::Ordering;

/// Scales `vec` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
	let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm <= f32::EPSILON {
		return;
	}

	for value in vec.iter_mut() {
		*value /= norm;
	}
}

pub fn normalized(mut vec: Vec<f32>) -> Vec<f32> {
	l2_normalize(&mut vec);

	vec
}

pub fn dot(lhs: &[f32], rhs: &[f32]) -> f32 {
	lhs.iter().zip(rhs.iter()).map(|(l, r)| l * r).sum()
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}

/// Descending order for scores. NaN sorts last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
