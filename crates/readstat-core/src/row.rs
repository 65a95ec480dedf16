//! Typed rows from the device database.
//!
//! The row source hands over positional tuples of loosely typed columns.
//! [`ContentRow`] and [`EventRow`] fix the meaning of each position and
//! convert the columns, failing with a row error when a column holds the
//! wrong type. Row errors are fatal to the catalog or event build that
//! consumes them.

use crate::error::{Error, Result};
use chrono::NaiveDateTime;

/// Timestamp layout written by the firmware, fraction optional
const DEVICE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single column value as produced by the row source
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// SQL NULL
    Null,
    /// Integer storage class
    Integer(i64),
    /// Floating point storage class
    Real(f64),
    /// Text storage class
    Text(String),
    /// Blob storage class
    Blob(Vec<u8>),
}

impl ColumnValue {
    /// Returns the storage class name, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Null => "null",
            ColumnValue::Integer(_) => "integer",
            ColumnValue::Real(_) => "real",
            ColumnValue::Text(_) => "text",
            ColumnValue::Blob(_) => "blob",
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Integer(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl From<Vec<u8>> for ColumnValue {
    fn from(v: Vec<u8>) -> Self {
        ColumnValue::Blob(v)
    }
}

/// Positional access to a row's columns by name
struct Columns<'a> {
    values: &'a [ColumnValue],
    names: &'static [&'static str],
}

impl<'a> Columns<'a> {
    fn get(&self, index: usize) -> Result<(&'static str, &'a ColumnValue)> {
        let column = self.names[index];
        self.values
            .get(index)
            .map(|value| (column, value))
            .ok_or(Error::MissingColumn {
                column,
                width: self.values.len(),
            })
    }

    /// Text column; NULL reads as empty
    fn text(&self, index: usize) -> Result<String> {
        match self.get(index)? {
            (_, ColumnValue::Text(s)) => Ok(s.clone()),
            (_, ColumnValue::Null) => Ok(String::new()),
            (column, other) => Err(Error::column_type(column, "text", other.type_name())),
        }
    }

    /// Integer column; NULL reads as zero
    fn integer(&self, index: usize) -> Result<i64> {
        match self.get(index)? {
            (_, ColumnValue::Integer(v)) => Ok(*v),
            (_, ColumnValue::Null) => Ok(0),
            (column, other) => Err(Error::column_type(column, "integer", other.type_name())),
        }
    }

    /// Blob column; NULL reads as empty
    fn blob(&self, index: usize) -> Result<Vec<u8>> {
        match self.get(index)? {
            (_, ColumnValue::Blob(b)) => Ok(b.clone()),
            (_, ColumnValue::Null) => Ok(Vec::new()),
            (column, other) => Err(Error::column_type(column, "blob", other.type_name())),
        }
    }

    /// Epoch seconds, from an integer or a device timestamp string
    fn timestamp(&self, index: usize) -> Result<i64> {
        match self.get(index)? {
            (_, ColumnValue::Integer(v)) => Ok(*v),
            (column, ColumnValue::Text(s)) => parse_device_time(s)
                .ok_or_else(|| Error::invalid_timestamp(column, s.as_str())),
            (column, other) => Err(Error::column_type(column, "timestamp", other.type_name())),
        }
    }
}

/// Parses a device timestamp such as `2023-12-19T11:42:00.000` as UTC
/// epoch seconds. A trailing `Z` is accepted.
pub fn parse_device_time(value: &str) -> Option<i64> {
    let value = value.trim();
    let value = value.strip_suffix('Z').unwrap_or(value);
    NaiveDateTime::parse_from_str(value, DEVICE_TIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// A row describing a book, a book part or an article
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentRow {
    /// Content ID: a file path with optional part marker, or an article ID
    pub content_id: String,
    /// Firmware content type code
    pub content_type: i64,
    /// MIME type
    pub mime_type: String,
    /// Title
    pub title: String,
    /// Author
    pub author: String,
    /// Firmware read status code
    pub read_status: i64,
    /// Word count of this row's part
    pub word_count: i64,
    /// Percent read, 0 to 100
    pub percent_read: i64,
    /// Source URL, empty for local books
    pub url: String,
}

impl ContentRow {
    /// Column names in positional order
    pub const COLUMNS: [&'static str; 9] = [
        "ContentID",
        "ContentType",
        "MimeType",
        "Title",
        "Attribution",
        "ReadStatus",
        "WordCount",
        "___PercentRead",
        "Url",
    ];
}

impl TryFrom<&[ColumnValue]> for ContentRow {
    type Error = Error;

    fn try_from(values: &[ColumnValue]) -> Result<Self> {
        let cols = Columns {
            values,
            names: &Self::COLUMNS,
        };
        Ok(Self {
            content_id: cols.text(0)?,
            content_type: cols.integer(1)?,
            mime_type: cols.text(2)?,
            title: cols.text(3)?,
            author: cols.text(4)?,
            read_status: cols.integer(5)?,
            word_count: cols.integer(6)?,
            percent_read: cols.integer(7)?,
            url: cols.text(8)?,
        })
    }
}

/// A row describing a logged reading interaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRow {
    /// Firmware event type code
    pub event_type: i64,
    /// First occurrence, epoch seconds
    pub first_occurrence: i64,
    /// Last occurrence, epoch seconds
    pub last_occurrence: i64,
    /// Serialized variant map with extra event data
    pub extra_data: Vec<u8>,
    /// Content ID the event refers to
    pub content_id: String,
}

impl EventRow {
    /// Column names in positional order
    pub const COLUMNS: [&'static str; 5] = [
        "EventType",
        "FirstOccurrence",
        "LastOccurrence",
        "ExtraData",
        "ContentID",
    ];
}

impl TryFrom<&[ColumnValue]> for EventRow {
    type Error = Error;

    fn try_from(values: &[ColumnValue]) -> Result<Self> {
        let cols = Columns {
            values,
            names: &Self::COLUMNS,
        };
        Ok(Self {
            event_type: cols.integer(0)?,
            first_occurrence: cols.timestamp(1)?,
            last_occurrence: cols.timestamp(2)?,
            extra_data: cols.blob(3)?,
            content_id: cols.text(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_device_time() {
        assert_eq!(parse_device_time("2023-12-19T11:42:00.000"), Some(1_702_986_120));
        assert_eq!(parse_device_time("2023-12-19T11:42:00Z"), Some(1_702_986_120));
        assert_eq!(parse_device_time("19/12/2023"), None);
    }

    #[test]
    fn test_content_row_from_columns() {
        let values = vec![
            ColumnValue::from("/mnt/onboard/b.epub"),
            ColumnValue::Integer(6),
            ColumnValue::from("application/epub+zip"),
            ColumnValue::from("Title"),
            ColumnValue::Null,
            ColumnValue::Integer(2),
            ColumnValue::Integer(0),
            ColumnValue::Integer(100),
            ColumnValue::Null,
        ];
        let row = ContentRow::try_from(values.as_slice()).unwrap();
        assert_eq!(row.content_id, "/mnt/onboard/b.epub");
        assert_eq!(row.author, "");
        assert_eq!(row.read_status, 2);
        assert_eq!(row.url, "");
    }

    #[test]
    fn test_event_row_from_columns() {
        let values = vec![
            ColumnValue::Integer(5),
            ColumnValue::from("2023-12-19T11:00:00.000"),
            ColumnValue::Integer(1_702_986_120),
            ColumnValue::Null,
            ColumnValue::from("b.epub"),
        ];
        let row = EventRow::try_from(values.as_slice()).unwrap();
        assert_eq!(row.first_occurrence, 1_702_983_600);
        assert_eq!(row.last_occurrence, 1_702_986_120);
        assert!(row.extra_data.is_empty());
    }

    #[test]
    fn test_wrong_column_type() {
        let values = vec![ColumnValue::from("five")];
        let err = EventRow::try_from(values.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            Error::ColumnType {
                column: "EventType",
                expected: "integer",
                found: "text"
            }
        ));
    }

    #[test]
    fn test_missing_column() {
        let values = vec![ColumnValue::Integer(5), ColumnValue::Integer(0)];
        let err = EventRow::try_from(values.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingColumn {
                column: "LastOccurrence",
                width: 2
            }
        ));
    }

    #[test]
    fn test_invalid_timestamp() {
        let values = vec![ColumnValue::Integer(5), ColumnValue::from("yesterday")];
        let err = EventRow::try_from(values.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp { column: "FirstOccurrence", .. }));
    }
}
