//! Ranking quality metrics. Gains are the raw graded labels.

/// DCG@k of relevance labels given in ranked order.
pub fn dcg_at_k(relevances: &[f64], k: usize) -> f64 {
    relevances
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, &rel)| {
            let rank = i as f64 + 2.0; // log2(i+2) because i is 0-indexed
            rel / rank.log2()
        })
        .sum()
}

/// nDCG@k of relevance labels given in ranked order.
///
/// The ideal ordering is the same labels sorted descending. A list with no
/// positive label scores 0.
pub fn ndcg_at_k(relevances: &[f64], k: usize) -> f64 {
    let dcg = dcg_at_k(relevances, k);
    let mut ideal = relevances.to_vec();
    ideal.sort_by(|a, b| b.total_cmp(a));
    let idcg = dcg_at_k(&ideal, k);
    if idcg < 1e-10 {
        0.0
    } else {
        dcg / idcg
    }
}

/// nDCG@k of one group ranked by `scores` (descending, ties keep input order).
pub fn ndcg_for_scores(labels: &[f32], scores: &[f32], k: usize) -> f64 {
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    let ranked: Vec<f64> = order.iter().map(|&i| labels[i] as f64).collect();
    ndcg_at_k(&ranked, k)
}
