//! Event row dispatch.

use super::{DomainEvent, ReadingSession, SessionAccumulator};
use crate::config::ReconstructorConfig;
use crate::content::split_content_id;
use crate::error::Result;
use crate::row::EventRow;
use crate::variant::{BlobDecoder, Variant, VariantMap};
use tracing::{debug, trace, warn};

/// Builds an ordered [`DomainEvent`] sequence from event rows
#[derive(Debug, Clone, Default)]
pub struct EventReconstructor {
    config: ReconstructorConfig,
}

impl EventReconstructor {
    /// Creates a new reconstructor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new reconstructor with custom configuration
    pub fn with_config(config: ReconstructorConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration
    pub fn config(&self) -> &ReconstructorConfig {
        &self.config
    }

    /// Builds events from `rows`, decoding blobs through `decoder`.
    ///
    /// Point events appear in row order, followed by one stitched `Read`
    /// event per book in book ID order. Row errors abort the build, as do
    /// decoder errors that are not blob errors; a blob that fails to decode
    /// is only dropped.
    pub fn build<I, D>(&self, rows: I, decoder: &D) -> Result<Vec<DomainEvent>>
    where
        I: IntoIterator<Item = Result<EventRow>>,
        D: BlobDecoder + ?Sized,
    {
        let mut events = Vec::new();
        let mut sessions = SessionAccumulator::new();
        let mut row_count = 0usize;

        for row in rows {
            let row = row?;
            row_count += 1;
            self.dispatch(&row, decoder, &mut events, &mut sessions)?;
        }

        let row_events = events.len();
        events.extend(sessions.finish(self.config.min_session_secs));

        debug!(
            "Built {} events ({} from rows, {} stitched) from {} rows",
            events.len(),
            row_events,
            events.len() - row_events,
            row_count
        );
        Ok(events)
    }

    fn dispatch<D>(
        &self,
        row: &EventRow,
        decoder: &D,
        events: &mut Vec<DomainEvent>,
        sessions: &mut SessionAccumulator,
    ) -> Result<()>
    where
        D: BlobDecoder + ?Sized,
    {
        let key = split_content_id(&row.content_id);
        let book_id = key.book_id;
        if book_id.is_empty() {
            trace!("Skipping event without book ID: {}", row.content_id);
            return Ok(());
        }
        if self.config.is_ignored_asset(&book_id) {
            trace!("Skipping event on asset {}", book_id);
            return Ok(());
        }

        let codes = &self.config.codes;
        let timestamp = row.last_occurrence;

        match row.event_type {
            code if code == codes.progress_25 => {
                events.push(DomainEvent::Progress25 { book_id, timestamp })
            }
            code if code == codes.progress_50 => {
                events.push(DomainEvent::Progress50 { book_id, timestamp })
            }
            code if code == codes.progress_75 => {
                events.push(DomainEvent::Progress75 { book_id, timestamp })
            }
            code if code == codes.finished => {
                events.push(DomainEvent::Finished { book_id, timestamp })
            }
            code if code == codes.read_start => {
                let extra = self.decode_extra(row, decoder)?;
                if let Some(stamps) = self.timestamps(&extra, &book_id) {
                    trace!("{} start timestamps for {}", stamps.len(), book_id);
                    sessions.add_starts(&book_id, stamps);
                }
            }
            code if code == codes.read_end => {
                let extra = self.decode_extra(row, decoder)?;
                if let Some(stamps) = self.timestamps(&extra, &book_id) {
                    trace!("{} end timestamps for {}", stamps.len(), book_id);
                    sessions.add_ends(&book_id, stamps);
                }
            }
            code if code == codes.session => {
                let extra = self.decode_extra(row, decoder)?;
                if let Some(session) = self.article_session(&extra, timestamp) {
                    events.push(DomainEvent::Read {
                        book_id,
                        sessions: vec![session],
                    });
                }
            }
            other => trace!("Ignoring event type {} on {}", other, book_id),
        }
        Ok(())
    }

    /// Decodes the row's blob.
    ///
    /// A blob that fails to decode counts as an empty map; any other
    /// decoder error is returned.
    fn decode_extra<D>(&self, row: &EventRow, decoder: &D) -> Result<VariantMap>
    where
        D: BlobDecoder + ?Sized,
    {
        if row.extra_data.is_empty() {
            return Ok(VariantMap::new());
        }
        match decoder.decode_map(&row.extra_data) {
            Ok(map) => Ok(map),
            Err(e) if e.is_blob_error() => {
                warn!(
                    "Ignoring undecodable extra data on event {} for {}: {}",
                    row.event_type, row.content_id, e
                );
                Ok(VariantMap::new())
            }
            Err(e) => Err(e),
        }
    }

    /// The timestamp list, if the field is a list of integers.
    ///
    /// A single non-integer entry rejects the whole list, since pairing
    /// is by position.
    fn timestamps(&self, extra: &VariantMap, book_id: &str) -> Option<Vec<i64>> {
        let list = extra.get(&self.config.timestamps_key)?.as_list()?;
        let stamps = list.iter().map(Variant::as_i64).collect::<Option<Vec<_>>>();
        if stamps.is_none() {
            warn!("Ignoring timestamp list with non-integer entries for {}", book_id);
        }
        stamps
    }

    /// A session starting at `timestamp` for article rows whose duration
    /// exceeds the minimum
    fn article_session(&self, extra: &VariantMap, timestamp: i64) -> Option<ReadingSession> {
        let content_type = extra.get(&self.config.content_type_key)?.as_str_lossy()?;
        if content_type.trim_end_matches('\0') != self.config.article_mime {
            return None;
        }

        let duration = extra.get(&self.config.reading_seconds_key)?.as_i64()?;
        if duration <= self.config.min_session_secs {
            return None;
        }
        let Some(end) = timestamp.checked_add(duration) else {
            trace!("Session of {}s from {} overflows", duration, timestamp);
            return None;
        };
        Some(ReadingSession::new(timestamp, end))
    }
}

/// Builds events with the default configuration
pub fn build_events<I, D>(rows: I, decoder: &D) -> Result<Vec<DomainEvent>>
where
    I: IntoIterator<Item = Result<EventRow>>,
    D: BlobDecoder + ?Sized,
{
    EventReconstructor::new().build(rows, decoder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EventCodes, ARTICLE_MIME};
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    /// Decoder that hands out a fixed map for non-empty blobs, or fails on
    /// a blob starting with 0xFF
    struct FixedDecoder(VariantMap);

    impl BlobDecoder for FixedDecoder {
        fn decode_map(&self, blob: &[u8]) -> Result<VariantMap> {
            if blob.first() == Some(&0xFF) {
                return Err(Error::truncated(0, 4, blob.len()));
            }
            Ok(self.0.clone())
        }
    }

    fn row(event_type: i64, last: i64, content_id: &str) -> EventRow {
        EventRow {
            event_type,
            first_occurrence: last,
            last_occurrence: last,
            extra_data: vec![0x00],
            content_id: content_id.to_string(),
        }
    }

    fn timestamps(values: &[u32]) -> VariantMap {
        let mut map = VariantMap::new();
        map.insert(
            "eventTimestamps".into(),
            Variant::List(values.iter().map(|&v| Variant::UInt32(v)).collect()),
        );
        map
    }

    #[test]
    fn test_point_events_in_row_order() {
        let codes = EventCodes::default();
        let rows = vec![
            Ok(row(codes.progress_50, 20, "/mnt/onboard/b.epub")),
            Ok(row(codes.progress_25, 10, "/mnt/onboard/b.epub!!ch1")),
            Ok(row(codes.progress_75, 30, "b.epub")),
            Ok(row(codes.finished, 40, "b.epub")),
        ];
        let events = build_events(rows, &FixedDecoder(VariantMap::new())).unwrap();

        assert_eq!(
            events,
            vec![
                DomainEvent::Progress50 { book_id: "b.epub".into(), timestamp: 20 },
                DomainEvent::Progress25 { book_id: "b.epub".into(), timestamp: 10 },
                DomainEvent::Progress75 { book_id: "b.epub".into(), timestamp: 30 },
                DomainEvent::Finished { book_id: "b.epub".into(), timestamp: 40 },
            ]
        );
    }

    #[test]
    fn test_unknown_code_is_ignored() {
        let rows = vec![Ok(row(9999, 10, "b.epub"))];
        let events = build_events(rows, &FixedDecoder(VariantMap::new())).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_asset_and_empty_ids_skipped() {
        let codes = EventCodes::default();
        let rows = vec![
            Ok(row(codes.finished, 10, "b.epub!!images/cover.jpg")),
            Ok(row(codes.finished, 10, "/mnt/onboard/cover.png")),
            Ok(row(codes.finished, 10, "!!orphan")),
        ];
        let events = build_events(rows, &FixedDecoder(VariantMap::new())).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].book_id(), "b.epub");
    }

    #[test]
    fn test_stitched_sessions_after_row_events() {
        let codes = EventCodes::default();
        let start = FixedDecoder(timestamps(&[100, 500]));
        let end = FixedDecoder(timestamps(&[110, 560]));
        let reconstructor = EventReconstructor::with_config(ReconstructorConfig::new());

        // one decoder per row kind, routed by a small adapter
        struct ByType<'a> {
            start: &'a FixedDecoder,
            end: &'a FixedDecoder,
        }
        impl BlobDecoder for ByType<'_> {
            fn decode_map(&self, blob: &[u8]) -> Result<VariantMap> {
                match blob {
                    [1] => self.start.decode_map(blob),
                    _ => self.end.decode_map(blob),
                }
            }
        }

        let mut start_row = row(codes.read_start, 600, "b.epub");
        start_row.extra_data = vec![1];
        let mut end_row = row(codes.read_end, 600, "b.epub");
        end_row.extra_data = vec![2];

        let rows = vec![
            Ok(start_row),
            Ok(row(codes.finished, 700, "b.epub")),
            Ok(end_row),
        ];
        let events = reconstructor
            .build(rows, &ByType { start: &start, end: &end })
            .unwrap();

        assert_eq!(
            events,
            vec![
                DomainEvent::Finished { book_id: "b.epub".into(), timestamp: 700 },
                DomainEvent::Read {
                    book_id: "b.epub".into(),
                    sessions: vec![ReadingSession::new(500, 560)],
                },
            ]
        );
    }

    #[test]
    fn test_blob_error_is_not_fatal() {
        let codes = EventCodes::default();
        let mut bad = row(codes.read_start, 10, "b.epub");
        bad.extra_data = vec![0xFF];
        let rows = vec![Ok(bad), Ok(row(codes.finished, 20, "b.epub"))];

        let events = build_events(rows, &FixedDecoder(timestamps(&[1]))).unwrap();
        assert_eq!(
            events,
            vec![DomainEvent::Finished { book_id: "b.epub".into(), timestamp: 20 }]
        );
    }

    struct FailingDecoder(fn() -> Error);

    impl BlobDecoder for FailingDecoder {
        fn decode_map(&self, _blob: &[u8]) -> Result<VariantMap> {
            Err((self.0)())
        }
    }

    #[test]
    fn test_non_blob_decoder_error_is_fatal() {
        let codes = EventCodes::default();
        let rows = vec![Ok(row(codes.read_start, 10, "b.epub"))];
        let decoder = FailingDecoder(|| Error::column_type("ExtraData", "blob", "text"));

        let err = build_events(rows, &decoder).unwrap_err();
        assert!(matches!(err, Error::ColumnType { column: "ExtraData", .. }));
    }

    #[test]
    fn test_blob_decoder_error_is_not_fatal() {
        let codes = EventCodes::default();
        let rows = vec![Ok(row(codes.session, 10, "4242"))];
        let decoder = FailingDecoder(|| Error::unsupported_type(19, 0));
        assert!(build_events(rows, &decoder).unwrap().is_empty());
    }

    #[test]
    fn test_non_integer_timestamp_rejects_list() {
        let codes = EventCodes::default();
        let mut starts = VariantMap::new();
        starts.insert(
            "eventTimestamps".into(),
            Variant::List(vec![Variant::UInt32(100), Variant::Null, Variant::UInt32(500)]),
        );
        let start = FixedDecoder(starts);
        let end = FixedDecoder(timestamps(&[160, 560]));

        struct ByType<'a> {
            start: &'a FixedDecoder,
            end: &'a FixedDecoder,
        }
        impl BlobDecoder for ByType<'_> {
            fn decode_map(&self, blob: &[u8]) -> Result<VariantMap> {
                match blob {
                    [1] => self.start.decode_map(blob),
                    _ => self.end.decode_map(blob),
                }
            }
        }

        let mut start_row = row(codes.read_start, 600, "b.epub");
        start_row.extra_data = vec![1];
        let mut end_row = row(codes.read_end, 600, "b.epub");
        end_row.extra_data = vec![2];

        // without the start list, no pairing happens at all
        let events = build_events(
            vec![Ok(start_row), Ok(end_row)],
            &ByType { start: &start, end: &end },
        )
        .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_row_error_is_fatal() {
        let rows = vec![
            Ok(row(EventCodes::default().finished, 20, "b.epub")),
            Err(Error::invalid_timestamp("LastOccurrence", "never")),
        ];
        let err = build_events(rows, &FixedDecoder(VariantMap::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp { .. }));
    }

    fn article_extra(content_type: Variant, seconds: i32) -> VariantMap {
        let mut map = VariantMap::new();
        map.insert("ContentType".into(), content_type);
        map.insert("ExtraDataReadingSeconds".into(), Variant::Int32(seconds));
        map
    }

    #[test]
    fn test_article_session() {
        let codes = EventCodes::default();
        let extra = article_extra(Variant::ByteArray(ARTICLE_MIME.as_bytes().to_vec()), 120);
        let rows = vec![Ok(row(codes.session, 1_000, "4242"))];

        let events = build_events(rows, &FixedDecoder(extra)).unwrap();
        assert_eq!(
            events,
            vec![DomainEvent::Read {
                book_id: "4242".into(),
                sessions: vec![ReadingSession::new(1_000, 1_120)],
            }]
        );
    }

    #[test]
    fn test_article_session_rejected() {
        let codes = EventCodes::default();
        let cases = [
            article_extra(Variant::String(ARTICLE_MIME.into()), 30),
            article_extra(Variant::String("application/epub+zip".into()), 600),
            article_extra(Variant::UInt32(6), 600),
        ];
        for extra in cases {
            let rows = vec![Ok(row(codes.session, 1_000, "4242"))];
            let events = build_events(rows, &FixedDecoder(extra)).unwrap();
            assert!(events.is_empty());
        }
    }

    #[test]
    fn test_article_session_end_overflow_skipped() {
        let codes = EventCodes::default();
        let mut extra = article_extra(Variant::String(ARTICLE_MIME.into()), 0);
        extra.insert("ExtraDataReadingSeconds".into(), Variant::Int64(i64::MAX));
        let rows = vec![
            Ok(row(codes.session, 1_700_000_000, "4242")),
            Ok(row(codes.finished, 1_700_000_100, "4242")),
        ];

        let events = build_events(rows, &FixedDecoder(extra)).unwrap();
        assert_eq!(
            events,
            vec![DomainEvent::Finished { book_id: "4242".into(), timestamp: 1_700_000_100 }]
        );
    }
}
