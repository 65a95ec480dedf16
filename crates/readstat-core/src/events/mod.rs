//! Domain events reconstructed from event rows.
//!
//! ## Event Model
//!
//! Progress milestones and finishing are point events carrying the row's
//! last-occurrence timestamp. Reading is recorded as [`DomainEvent::Read`]
//! carrying one or more [`ReadingSession`]s, either stitched from the
//! start/end timestamp arrays of books or taken from the duration on an
//! article's session row.

mod reconstructor;
mod sessions;

use chrono::{DateTime, Utc};
use std::fmt;

pub use reconstructor::{build_events, EventReconstructor};
pub use sessions::{pair_sessions, SessionAccumulator};

/// A bounded interval of active reading, in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingSession {
    /// Start, epoch seconds
    pub start: i64,
    /// End, epoch seconds
    pub end: i64,
}

impl ReadingSession {
    /// Creates a session from start and end epoch seconds
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Length in seconds; negative when the end precedes the start.
    ///
    /// Saturates at the `i64` bounds.
    pub fn duration_secs(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the session lasts at least `min_secs`.
    ///
    /// A session whose length does not fit in an `i64` is never valid.
    pub fn is_valid(&self, min_secs: i64) -> bool {
        self.end
            .checked_sub(self.start)
            .is_some_and(|secs| secs >= min_secs)
    }

    /// Start as a UTC instant
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.start, 0)
    }

    /// End as a UTC instant
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.end, 0)
    }
}

/// Kind of a [`DomainEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Reached 25%
    Progress25,
    /// Reached 50%
    Progress50,
    /// Reached 75%
    Progress75,
    /// Finished
    Finished,
    /// Read for one or more sessions
    Read,
}

impl EventKind {
    /// Stable name used by persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Progress25 => "25%",
            EventKind::Progress50 => "50%",
            EventKind::Progress75 => "75%",
            EventKind::Finished => "Finish",
            EventKind::Read => "Read",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reading event for one book or article
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// Reached 25%
    Progress25 {
        /// Book or article ID
        book_id: String,
        /// Epoch seconds
        timestamp: i64,
    },
    /// Reached 50%
    Progress50 {
        /// Book or article ID
        book_id: String,
        /// Epoch seconds
        timestamp: i64,
    },
    /// Reached 75%
    Progress75 {
        /// Book or article ID
        book_id: String,
        /// Epoch seconds
        timestamp: i64,
    },
    /// Finished
    Finished {
        /// Book or article ID
        book_id: String,
        /// Epoch seconds
        timestamp: i64,
    },
    /// Read for the given sessions
    Read {
        /// Book or article ID
        book_id: String,
        /// Sessions that met the minimum duration
        sessions: Vec<ReadingSession>,
    },
}

impl DomainEvent {
    /// Book or article the event belongs to
    pub fn book_id(&self) -> &str {
        match self {
            DomainEvent::Progress25 { book_id, .. }
            | DomainEvent::Progress50 { book_id, .. }
            | DomainEvent::Progress75 { book_id, .. }
            | DomainEvent::Finished { book_id, .. }
            | DomainEvent::Read { book_id, .. } => book_id,
        }
    }

    /// Kind of event
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::Progress25 { .. } => EventKind::Progress25,
            DomainEvent::Progress50 { .. } => EventKind::Progress50,
            DomainEvent::Progress75 { .. } => EventKind::Progress75,
            DomainEvent::Finished { .. } => EventKind::Finished,
            DomainEvent::Read { .. } => EventKind::Read,
        }
    }

    /// Timestamp of point events; `None` for `Read`
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            DomainEvent::Progress25 { timestamp, .. }
            | DomainEvent::Progress50 { timestamp, .. }
            | DomainEvent::Progress75 { timestamp, .. }
            | DomainEvent::Finished { timestamp, .. } => Some(*timestamp),
            DomainEvent::Read { .. } => None,
        }
    }

    /// Sessions of a `Read` event; empty otherwise
    pub fn sessions(&self) -> &[ReadingSession] {
        match self {
            DomainEvent::Read { sessions, .. } => sessions,
            _ => &[],
        }
    }

    /// Earliest time the event covers, for chronological sorting
    pub fn sort_key(&self) -> Option<i64> {
        self.timestamp()
            .or_else(|| self.sessions().iter().map(|s| s.start).min())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let finished = DomainEvent::Finished {
            book_id: "b.epub".into(),
            timestamp: 42,
        };
        assert_eq!(finished.book_id(), "b.epub");
        assert_eq!(finished.kind().to_string(), "Finish");
        assert_eq!(finished.timestamp(), Some(42));
        assert!(finished.sessions().is_empty());

        let read = DomainEvent::Read {
            book_id: "b.epub".into(),
            sessions: vec![ReadingSession::new(500, 560), ReadingSession::new(100, 160)],
        };
        assert_eq!(read.timestamp(), None);
        assert_eq!(read.sort_key(), Some(100));
    }

    #[test]
    fn test_session_times() {
        let session = ReadingSession::new(1_702_986_120, 1_702_986_180);
        assert_eq!(session.duration_secs(), 60);
        assert_eq!(
            session.start_time().unwrap().to_rfc3339(),
            "2023-12-19T11:42:00+00:00"
        );
    }
}
