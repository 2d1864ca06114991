use crate::model::FaqEntry;

/// Squared Euclidean distance, the default metric of the Chroma `l2` space.
/// Mismatched, empty or all-zero vectors are treated as infinitely far apart.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() || is_zero(a) || is_zero(b) {
        return f32::INFINITY;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

pub(crate) fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

pub fn nearest_k<'a>(
    query_embedding: &[f32],
    entries: &'a [FaqEntry],
    k: usize,
) -> Vec<(&'a FaqEntry, f32)> {
    let mut scored: Vec<(&FaqEntry, f32)> = entries
        .iter()
        .map(|entry| (entry, squared_l2(query_embedding, &entry.embedding)))
        .collect();

    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.into_iter().take(k).collect()
}

pub fn nearest<'a>(
    query_embedding: &[f32],
    entries: &'a [FaqEntry],
) -> Option<(&'a FaqEntry, f32)> {
    nearest_k(query_embedding, entries, 1).into_iter().next()
}
