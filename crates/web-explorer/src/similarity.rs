//! Title-embedding similarity used for state equivalence.

/// Compute cosine similarity between two vectors.
///
/// Mismatched lengths, empty vectors, and zero vectors have similarity 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Index and similarity of the first embedding scoring at least `threshold`.
pub fn first_match<'a, I>(query: &[f32], candidates: I, threshold: f32) -> Option<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, emb)| (i, cosine_similarity(query, emb)))
        .find(|(_, sim)| *sim >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let a = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let sim = cosine_similarity(&[1.0, 2.0], &[10.0, 20.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_first_match_respects_order_and_threshold() {
        let stored: Vec<Vec<f32>> = vec![vec![0.0, 1.0], vec![1.0, 0.05], vec![1.0, 0.0]];
        let hit = first_match(&[1.0, 0.0], stored.iter().map(Vec::as_slice), 0.92);
        assert_eq!(hit.map(|(i, _)| i), Some(1));

        let miss = first_match(&[0.0, -1.0], stored.iter().map(Vec::as_slice), 0.5);
        assert!(miss.is_none());
    }
}
