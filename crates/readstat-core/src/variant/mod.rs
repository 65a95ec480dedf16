//! Variant wire format decoding.
//!
//! The device firmware stores extra event data as a serialized map of
//! string keys to self-describing values. Each value is a variant:
//!
//! - A big-endian `u32` type tag
//! - A one-byte null flag
//! - The payload, absent when the null flag is set
//!
//! Strings are UTF-16BE with a `u32` byte length. Lists and maps carry a
//! `u32` element count followed by their elements. A length of
//! `0xFFFF_FFFF` on a string or byte array marks an empty value with no
//! payload.
//!
//! Only the subset of types the firmware actually writes is modeled.
//! Anything else fails with [`Error::UnsupportedVariantType`] rather than
//! guessing at a payload size.
//!
//! ## Extensibility
//!
//! The [`BlobDecoder`] trait is the seam the event reconstructor decodes
//! through, so tests and callers can substitute their own decoding.

mod calendar;
mod reader;

use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::trace;

pub use calendar::{date_from_julian_day, julian_day_to_ymd};
pub use reader::{VariantReader, NULL_LENGTH};

/// A decoded string-keyed map. Later duplicate keys overwrite earlier ones.
pub type VariantMap = BTreeMap<String, Variant>;

/// Variant type tags understood by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VariantType {
    /// One-byte boolean
    Bool = 1,
    /// Signed 32-bit integer
    Int = 2,
    /// Unsigned 32-bit integer
    UInt = 3,
    /// Signed 64-bit integer
    LongLong = 4,
    /// Unsigned 64-bit integer
    ULongLong = 5,
    /// IEEE 754 double
    Double = 6,
    /// Character, read as a single unsigned byte
    QChar = 7,
    /// String-keyed map
    Map = 8,
    /// Heterogeneous list
    List = 9,
    /// UTF-16BE string
    String = 10,
    /// List of strings
    StringList = 11,
    /// Length-prefixed bytes
    ByteArray = 12,
    /// Packed bits
    BitArray = 13,
    /// Julian day
    Date = 14,
    /// Milliseconds since midnight
    Time = 15,
    /// Date, time and zone flag
    DateTime = 16,
    /// URL encoded as a string
    Url = 17,
    /// Signed 16-bit integer
    Short = 33,
    /// Unsigned byte
    Char = 34,
    /// Unsigned 16-bit integer
    UShort = 36,
    /// IEEE 754 single
    Float = 38,
    /// Signed byte
    SChar = 40,
}

impl VariantType {
    /// Looks up a raw tag, returning `None` for unmodeled types
    pub fn from_tag(tag: u32) -> Option<Self> {
        let ty = match tag {
            1 => Self::Bool,
            2 => Self::Int,
            3 => Self::UInt,
            4 => Self::LongLong,
            5 => Self::ULongLong,
            6 => Self::Double,
            7 => Self::QChar,
            8 => Self::Map,
            9 => Self::List,
            10 => Self::String,
            11 => Self::StringList,
            12 => Self::ByteArray,
            13 => Self::BitArray,
            14 => Self::Date,
            15 => Self::Time,
            16 => Self::DateTime,
            17 => Self::Url,
            33 => Self::Short,
            34 => Self::Char,
            36 => Self::UShort,
            38 => Self::Float,
            40 => Self::SChar,
            _ => return None,
        };
        Some(ty)
    }

    /// Returns the wire tag
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// Zone flag of a serialized date-time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// Wall-clock time in the reader's local zone
    Local,
    /// Coordinated universal time
    Utc,
}

/// A date-time as written on the wire: civil time plus a zone flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedDateTime {
    /// Civil date and time of day
    pub civil: NaiveDateTime,
    /// Zone the civil time is expressed in
    pub spec: TimeSpec,
}

impl ZonedDateTime {
    /// Resolves to an instant.
    ///
    /// Local times that fall into a DST gap have no instant and yield `None`;
    /// ambiguous local times resolve to the earlier instant.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self.spec {
            TimeSpec::Utc => Some(self.civil.and_utc()),
            TimeSpec::Local => Local
                .from_local_datetime(&self.civil)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// A decoded variant value
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// Null flag was set
    Null,
    /// Boolean
    Bool(bool),
    /// Signed byte
    Int8(i8),
    /// Signed 16-bit integer
    Int16(i16),
    /// Signed 32-bit integer
    Int32(i32),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned byte (also used for characters)
    UInt8(u8),
    /// Unsigned 16-bit integer
    UInt16(u16),
    /// Unsigned 32-bit integer
    UInt32(u32),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// Single-precision float
    Float32(f32),
    /// Double-precision float
    Float64(f64),
    /// Text
    String(String),
    /// Raw bytes
    ByteArray(Vec<u8>),
    /// Ordered bits
    BitArray(Vec<bool>),
    /// Calendar date
    Date(NaiveDate),
    /// Time since midnight
    Time(Duration),
    /// Date and time with zone flag
    DateTime(ZonedDateTime),
    /// URL, `None` when the encoded string was empty
    Url(Option<url::Url>),
    /// Ordered values
    List(Vec<Variant>),
    /// String-keyed values
    Map(VariantMap),
}

impl Variant {
    /// Returns true for [`Variant::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// Returns any integer variant widened to `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Variant::Int8(v) => Some(v.into()),
            Variant::Int16(v) => Some(v.into()),
            Variant::Int32(v) => Some(v.into()),
            Variant::Int64(v) => Some(v),
            Variant::UInt8(v) => Some(v.into()),
            Variant::UInt16(v) => Some(v.into()),
            Variant::UInt32(v) => Some(v.into()),
            Variant::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the text of a string, or of a byte array read as UTF-8
    pub fn as_str_lossy(&self) -> Option<Cow<'_, str>> {
        match self {
            Variant::String(s) => Some(Cow::Borrowed(s.as_str())),
            Variant::ByteArray(b) => Some(String::from_utf8_lossy(b)),
            _ => None,
        }
    }

    /// Returns the elements of a list
    pub fn as_list(&self) -> Option<&[Variant]> {
        match self {
            Variant::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries of a map
    pub fn as_map(&self) -> Option<&VariantMap> {
        match self {
            Variant::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => write!(f, "null"),
            Variant::Bool(v) => write!(f, "{}", v),
            Variant::Int8(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt8(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float32(v) => write!(f, "{}", v),
            Variant::Float64(v) => write!(f, "{}", v),
            Variant::String(s) => write!(f, "{:?}", s),
            Variant::ByteArray(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Variant::BitArray(bits) => {
                for &bit in bits {
                    write!(f, "{}", if bit { '1' } else { '0' })?;
                }
                Ok(())
            }
            Variant::Date(date) => write!(f, "{}", date),
            Variant::Time(time) => write!(f, "{}ms", time.as_millis()),
            Variant::DateTime(dt) => match dt.spec {
                TimeSpec::Utc => write!(f, "{}Z", dt.civil),
                TimeSpec::Local => write!(f, "{}", dt.civil),
            },
            Variant::Url(Some(url)) => write!(f, "{}", url),
            Variant::Url(None) => write!(f, "null"),
            Variant::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Variant::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Trait for decoding an opaque blob column into a variant map
pub trait BlobDecoder {
    /// Decode `blob` as a string-keyed variant map
    fn decode_map(&self, blob: &[u8]) -> Result<VariantMap>;
}

/// Decoder for the firmware's big-endian variant serialization
#[derive(Debug, Clone, Default)]
pub struct VariantDecoder {
    config: DecoderConfig,
}

impl VariantDecoder {
    /// Creates a new decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new decoder with custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Opens a fresh reader over `data`
    pub fn reader<'a>(&self, data: &'a [u8]) -> VariantReader<&'a [u8]> {
        VariantReader::with_config(data, self.config.clone())
    }

    /// Decodes a single variant, returning its raw tag and value
    pub fn decode_variant(&self, data: &[u8]) -> Result<(u32, Variant)> {
        self.reader(data).read_variant()
    }
}

impl BlobDecoder for VariantDecoder {
    fn decode_map(&self, blob: &[u8]) -> Result<VariantMap> {
        let mut reader = self.reader(blob);
        let map = reader.read_map()?;
        if reader.remaining() > 0 {
            trace!("{} trailing bytes after map", reader.remaining());
        }
        Ok(map)
    }
}

/// Returns an error for `tag` if the decoder does not model it
pub(crate) fn check_tag(tag: u32, offset: usize) -> Result<VariantType> {
    VariantType::from_tag(tag).ok_or_else(|| Error::unsupported_type(tag, offset))
}
