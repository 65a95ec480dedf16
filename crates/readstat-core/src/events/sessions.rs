//! Reading session stitching.
//!
//! The firmware logs the start and end timestamps of reading sessions as
//! two separate arrays on two separate event rows. Sessions are rebuilt by
//! pairing the arrays by index.

use super::{DomainEvent, ReadingSession};
use std::collections::BTreeMap;
use tracing::trace;

/// Pairs start and end timestamps by position.
///
/// No timestamp correlation happens: the `i`-th start belongs to the
/// `i`-th end, and surplus entries on the longer side are dropped.
pub fn pair_sessions(starts: &[i64], ends: &[i64]) -> Vec<ReadingSession> {
    starts
        .iter()
        .zip(ends)
        .map(|(&start, &end)| ReadingSession::new(start, end))
        .collect()
}

/// Start and end timestamp buffers for one reconstruction call
#[derive(Debug, Default)]
pub struct SessionAccumulator {
    starts: BTreeMap<String, Vec<i64>>,
    ends: BTreeMap<String, Vec<i64>>,
}

impl SessionAccumulator {
    /// Creates empty buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends start timestamps for `book_id`
    pub fn add_starts(&mut self, book_id: &str, timestamps: impl IntoIterator<Item = i64>) {
        self.starts
            .entry(book_id.to_string())
            .or_default()
            .extend(timestamps);
    }

    /// Appends end timestamps for `book_id`
    pub fn add_ends(&mut self, book_id: &str, timestamps: impl IntoIterator<Item = i64>) {
        self.ends
            .entry(book_id.to_string())
            .or_default()
            .extend(timestamps);
    }

    /// Emits one `Read` event per book with both buffers populated, keeping
    /// only sessions of at least `min_secs` seconds.
    ///
    /// Events come out in book ID order. A book whose sessions are all too
    /// short still gets an event, with no sessions.
    pub fn finish(self, min_secs: i64) -> Vec<DomainEvent> {
        let Self { starts, mut ends } = self;

        starts
            .into_iter()
            .filter_map(|(book_id, book_starts)| {
                let book_ends = ends.remove(&book_id)?;
                if book_starts.len() != book_ends.len() {
                    trace!(
                        "Pairing {} starts with {} ends for {}",
                        book_starts.len(),
                        book_ends.len(),
                        book_id
                    );
                }

                let sessions = pair_sessions(&book_starts, &book_ends)
                    .into_iter()
                    .filter(|s| s.is_valid(min_secs))
                    .collect();
                Some(DomainEvent::Read { book_id, sessions })
            })
            .collect()
    }
}
