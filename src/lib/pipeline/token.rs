//! Payload plus append-only instrumentation history.
//!
//! A [`Token`] is created once by [`Token::source`] and then moved, never shared
//! mutably, from stage to stage. Every stage goes through the same separator /
//! combiner pair: [`Token::extract`] stamps the entry time and hands out the raw
//! value, [`Entered::combine`] stamps the exit time and appends exactly one
//! history entry. A transform that fails simply drops the [`Entered`] half, so
//! failed stages never show up as completed.

use super::clock;

/// Per-stage history, index aligned across all four sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaData {
    tags: Vec<String>,
    threads: Vec<String>,
    entry_times: Vec<u64>,
    exit_times: Vec<u64>,
}

impl MetaData {
    fn push(&mut self, tag: &str, thread: String, entry_time: u64, exit_time: u64) {
        self.tags.push(tag.to_string());
        self.threads.push(thread);
        self.entry_times.push(entry_time);
        self.exit_times.push(exit_time);
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn threads(&self) -> &[String] {
        &self.threads
    }

    pub fn entry_times(&self) -> &[u64] {
        &self.entry_times
    }

    pub fn exit_times(&self) -> &[u64] {
        &self.exit_times
    }

    /// Number of stages recorded so far.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        let len = self.tags.len();
        self.threads.len() == len && self.entry_times.len() == len && self.exit_times.len() == len
    }

    /// Iterates over `(tag, thread, entry, exit)` tuples in stage order.
    pub fn stages(&self) -> impl Iterator<Item = (&str, &str, u64, u64)> + '_ {
        self.tags
            .iter()
            .zip(&self.threads)
            .zip(self.entry_times.iter().zip(&self.exit_times))
            .map(|((tag, thread), (entry, exit))| (tag.as_str(), thread.as_str(), *entry, *exit))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<T> {
    value: T,
    meta: MetaData,
}

/// The history half of a token whose value is currently inside a transform.
#[derive(Debug)]
#[must_use = "dropping an Entered discards the token history"]
pub struct Entered {
    meta: MetaData,
    entry_time: u64,
}

impl<T> Token<T> {
    /// Wraps a raw value into the first token of a frame.
    ///
    /// The source stage has no measurable duration of its own: entry and exit
    /// are the same instant, the arrival time.
    pub fn source(tag: &str, value: T) -> Self {
        let now = clock::now_ms();
        let mut meta = MetaData::default();
        meta.push(tag, clock::current_thread_label(), now, now);

        Self { value, meta }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn meta(&self) -> &MetaData {
        &self.meta
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn into_parts(self) -> (T, MetaData) {
        (self.value, self.meta)
    }

    /// Separates the value from its history, recording the stage entry time.
    pub fn extract(self) -> (Entered, T) {
        let entered = Entered {
            meta: self.meta,
            entry_time: clock::now_ms(),
        };
        (entered, self.value)
    }
}

impl Entered {
    /// Re-wraps a stage result, appending `tag` with the exit time and the
    /// execution context the stage finished on.
    pub fn combine<U>(self, tag: &str, value: U) -> Token<U> {
        let Entered {
            mut meta,
            entry_time,
        } = self;
        let exit_time = clock::now_ms();
        meta.push(tag, clock::current_thread_label(), entry_time, exit_time);

        Token { value, meta }
    }

    pub fn meta(&self) -> &MetaData {
        &self.meta
    }
}
