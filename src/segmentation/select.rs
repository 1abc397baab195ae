//! Candidate selection over a [`PredictionBatch`].

use super::types::PredictionBatch;
use ndarray::Array2;

/// Number of foreground pixels in a mask
pub fn mask_area(mask: &Array2<bool>) -> usize {
    mask.iter().filter(|&&px| px).count()
}

/// Candidate indices ordered from highest to lowest score.
///
/// Equal scores come out highest index first: the order is an ascending
/// stable sort, reversed. NaN sorts above every number.
pub fn order_by_score(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    order.reverse();
    order
}

/// Index of the first maximum score
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, score) in scores.iter().enumerate() {
        match best {
            Some(b) if score.total_cmp(&scores[b]).is_le() => {}
            _ => best = Some(i),
        }
    }
    best
}

/// First-pass selection: the highest scoring candidate whose area exceeds
/// `min_area`, or `None` when no candidate qualifies.
pub fn select_first_pass(batch: &PredictionBatch, min_area: usize) -> Option<usize> {
    let selected = order_by_score(batch.scores())
        .into_iter()
        .find(|&i| mask_area(&batch.masks()[i]) > min_area);

    match selected {
        Some(i) => tracing::debug!(
            "First pass picked candidate {} (score {:.3})",
            i,
            batch.scores()[i]
        ),
        None => tracing::debug!("No first pass candidate exceeds min area {}", min_area),
    }
    selected
}

/// Second-pass selection: the highest scoring candidate by default,
/// replaced by the first candidate in score order whose area exceeds
/// `min_area`.
pub fn select_second_pass(batch: &PredictionBatch, min_area: usize) -> usize {
    let order = order_by_score(batch.scores());
    let mut selected = order[0];
    if let Some(&i) = order
        .iter()
        .find(|&&i| mask_area(&batch.masks()[i]) > min_area)
    {
        selected = i;
    }

    tracing::debug!(
        "Second pass picked candidate {} (score {:.3})",
        selected,
        batch.scores()[selected]
    );
    selected
}
