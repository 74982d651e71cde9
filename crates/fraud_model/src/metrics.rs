//! Ranking metrics.

/// Area under the ROC curve.
///
/// Computed as the Mann-Whitney U statistic over score ranks, with tied
/// scores given their average rank. Returns `None` when either class is
/// absent, since the curve is undefined.
#[must_use]
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    let n = scores.len().min(labels.len());
    let positives = labels.iter().take(n).filter(|&&l| l == 1).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based average rank of the tie group [start, end)
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            if labels[i] == 1 {
                positive_rank_sum += rank;
            }
        }
        start = end;
    }

    let pos = positives as f64;
    let u = positive_rank_sum - pos * (pos + 1.0) / 2.0;
    Some(u / (pos * negatives as f64))
}

/// Arithmetic mean, or `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}
