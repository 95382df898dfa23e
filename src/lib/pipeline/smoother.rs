//! Exponential moving average over per-stage hand-off latencies.
//!
//! Consecutive frames do not necessarily traverse the same number of stages,
//! so the filter state is a variable-length vector:
//!
//! - entries present in both the state and the new frame are blended,
//! - entries only present in the new frame are seeded with the raw delta,
//! - entries only present in the state are dropped; the state always ends up
//!   with exactly as many entries as the frame that was just reported.

use std::marker::PhantomData;

use super::{agent::Agent, token::Token};
use crate::{
    pipeline::token::MetaData,
    report::{exit_time_deltas, LatencyReport, LatencyRow},
};

#[derive(Debug, Clone)]
pub struct LatencySmoother<T> {
    smoothed: Vec<f32>,
    discount: f32,
    _payload: PhantomData<fn(T)>,
}

impl<T> LatencySmoother<T> {
    /// # Panics
    /// If `discount` is outside `(0, 1)`.
    pub fn new(discount: f32) -> Self {
        assert!(
            discount > 0.0 && discount < 1.0,
            "Latency discount must be inside (0, 1), got {discount}"
        );

        Self {
            smoothed: Vec::new(),
            discount,
            _payload: PhantomData,
        }
    }

    pub fn discount(&self) -> f32 {
        self.discount
    }

    /// Feeds one frame history and returns the smoothed report for it.
    pub fn update(&mut self, meta: &MetaData) -> LatencyReport {
        let deltas: Vec<f32> = exit_time_deltas(meta)
            .into_iter()
            .map(|delta| delta as f32)
            .collect();

        self.update_with_deltas(&deltas);

        let rows = meta
            .tags()
            .iter()
            .zip(meta.threads())
            .zip(&self.smoothed)
            .map(|((tag, thread), smoothed_ms)| LatencyRow {
                label: format!("{tag} {thread}"),
                smoothed_ms: *smoothed_ms,
            })
            .collect();

        LatencyReport { rows }
    }

    fn update_with_deltas(&mut self, deltas: &[f32]) {
        let overlap = self.smoothed.len().min(deltas.len());

        let mut filtered: Vec<f32> = self.smoothed[..overlap]
            .iter()
            .zip(&deltas[..overlap])
            .map(|(previous, delta)| previous * self.discount + delta * (1.0 - self.discount))
            .collect();
        filtered.extend_from_slice(&deltas[overlap..]);

        self.smoothed = filtered;
    }
}

impl<T> Agent for LatencySmoother<T> {
    type Input = Token<T>;
    type Output = (T, LatencyReport);
    type State = Vec<f32>;

    fn apply(&mut self, input: Token<T>) -> (T, LatencyReport) {
        let report = self.update(input.meta());
        (input.into_value(), report)
    }

    fn state(&self) -> &Vec<f32> {
        &self.smoothed
    }

    fn finish(self) -> Vec<f32> {
        self.smoothed
    }
}
