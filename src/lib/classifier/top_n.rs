use super::Label;
use crate::error::{PipelineError, Result};

/// Value written over a consumed maximum so it is not picked again.
pub const CONSUMED: f32 = 0.0;

/// Index of the largest value, the lowest index wins ties.
fn argmax(scores: &[f32]) -> Option<usize> {
    let (mut best, mut candidate) = (0, *scores.first()?);
    for (index, &value) in scores.iter().enumerate().skip(1) {
        if value > candidate {
            candidate = value;
            best = index;
        }
    }
    Some(best)
}

/// Returns the `n` best scoring labels in descending confidence order.
///
/// This is destructive: every selected position of `scores` is overwritten
/// with [`CONSUMED`]. Pass a buffer you no longer need, or a copy.
///
/// Because the sentinel is zero, an output of raw logits where every
/// remaining value is negative picks the already consumed positions again.
/// Feed probabilities when that matters.
pub fn extract_top_n(scores: &mut [f32], labels: &[String], n: usize) -> Result<Vec<Label>> {
    if labels.len() != scores.len() {
        return Err(PipelineError::LabelCountMismatch {
            labels: labels.len(),
            output_len: scores.len(),
        });
    }
    if n > scores.len() {
        return Err(PipelineError::InvalidTopN {
            n,
            output_len: scores.len(),
        });
    }

    let mut top = Vec::with_capacity(n);
    for _ in 0..n {
        let Some(index) = argmax(scores) else {
            break;
        };
        top.push(Label {
            confidence: scores[index],
            class_name: labels[index].clone(),
        });
        scores[index] = CONSUMED;
    }

    Ok(top)
}
