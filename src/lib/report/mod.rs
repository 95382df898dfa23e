//! Human-readable views over the instrumentation history.

use std::{collections::HashMap, fmt};

use serde::Serialize;

use crate::pipeline::token::MetaData;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyRow {
    /// Stage tag and execution context, separated by a space
    pub label: String,
    pub smoothed_ms: f32,
}

/// One row per recorded stage, in stage order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyReport {
    pub rows: Vec<LatencyRow>,
}

impl LatencyReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of the smoothed hand-off deltas, the end to end latency estimate.
    pub fn total_ms(&self) -> f32 {
        self.rows.iter().map(|row| row.smoothed_ms).sum()
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{:<20} {:>12.2} ms", row.label, row.smoothed_ms)?;
        }
        Ok(())
    }
}

/// First order difference of the stage exit times. The source has no
/// predecessor, so its delta is zero.
pub fn exit_time_deltas(meta: &MetaData) -> Vec<u64> {
    let exits = meta.exit_times();
    if exits.is_empty() {
        return Vec::new();
    }

    std::iter::once(0)
        .chain(exits.windows(2).map(|pair| pair[1].saturating_sub(pair[0])))
        .collect()
}

/// Detailed per-frame table: absolute times are relative to `epoch_ms`.
pub fn frame_timeline(meta: &MetaData, epoch_ms: u64) -> String {
    let handoffs = exit_time_deltas(meta);
    let mut timeline = String::from("--- NEW FRAME ---\n");

    if let Some(first_entry) = meta.entry_times().first() {
        timeline.push_str(&format!(
            "epoch: {:6}\n",
            first_entry.saturating_sub(epoch_ms)
        ));
    }

    for ((tag, thread, entry, exit), handoff) in meta.stages().zip(handoffs) {
        timeline.push_str(&format!(
            "{tag:>15} thread: {thread:>30} | entry: {:6} | exit: {:6} | stage: {:6} | handoff: {handoff:6}\n",
            entry.saturating_sub(epoch_ms),
            exit.saturating_sub(epoch_ms),
            exit.saturating_sub(entry),
        ));
    }

    timeline
}

/// Sums the stage durations per execution context and returns the busiest
/// one plus a 5% margin.
///
/// Feeding frames no faster than this keeps every single-threaded context
/// from accumulating work.
pub fn busiest_thread_latency_ms(meta: &MetaData) -> u64 {
    let mut per_thread: HashMap<&str, u64> = HashMap::new();
    for (_, thread, entry, exit) in meta.stages() {
        *per_thread.entry(thread).or_default() += exit.saturating_sub(entry);
    }

    let busiest = per_thread.values().copied().max().unwrap_or_default();
    (busiest as f64 * 1.05) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::token::Token;

    fn sample_meta() -> MetaData {
        let token = Token::source("source", ());
        let (entered, ()) = token.extract();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let token = entered.combine("work", ());
        token.meta().clone()
    }

    #[test]
    fn deltas_start_at_zero() {
        let meta = sample_meta();
        let deltas = exit_time_deltas(&meta);

        assert_eq!(deltas.len(), meta.len());
        assert_eq!(deltas[0], 0);
        assert!(deltas[1] >= 10);
    }

    #[test]
    fn timeline_has_one_line_per_stage() {
        let meta = sample_meta();
        let timeline = frame_timeline(&meta, 0);

        assert!(timeline.starts_with("--- NEW FRAME ---"));
        assert_eq!(timeline.lines().filter(|line| line.contains("handoff")).count(), 2);
    }

    #[test]
    fn busiest_thread_adds_margin() {
        let meta = sample_meta();
        let busiest = busiest_thread_latency_ms(&meta);

        let work = meta.exit_times()[1] - meta.entry_times()[1];
        assert!(busiest >= work);
    }

    #[test]
    fn table_formatting() {
        let report = LatencyReport {
            rows: vec![
                LatencyRow {
                    label: "source main".into(),
                    smoothed_ms: 0.0,
                },
                LatencyRow {
                    label: "infer worker".into(),
                    smoothed_ms: 51.256,
                },
            ],
        };

        let table = report.to_string();
        assert_eq!(
            table,
            format!("{:<20} {:>12} ms\n{:<20} {:>12} ms\n", "source main", "0.00", "infer worker", "51.26")
        );
        assert!((report.total_ms() - 51.256).abs() < 1e-4);
    }
}
