//! Forward-only reader over a variant stream.

use super::{calendar, check_tag, TimeSpec, Variant, VariantMap, VariantType, ZonedDateTime};
use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use bytes::Buf;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::time::Duration;

/// Length value marking an empty string or byte array with no payload
pub const NULL_LENGTH: u32 = 0xFFFF_FFFF;

/// Smallest encoding of a list element: type tag plus null flag
const MIN_VARIANT_LEN: usize = 5;

/// Smallest encoding of a map entry: empty key plus a null variant
const MIN_ENTRY_LEN: usize = 4 + MIN_VARIANT_LEN;

/// Smallest encoding of a string list element
const MIN_STRING_LEN: usize = 4;

/// Reads variant values from a big-endian buffer.
///
/// Every read checks the remaining length before touching the buffer, so a
/// short stream fails with [`Error::StreamTruncated`] and never panics.
#[derive(Debug)]
pub struct VariantReader<B> {
    buf: B,
    offset: usize,
    depth: usize,
    config: DecoderConfig,
}

impl<B: Buf> VariantReader<B> {
    /// Creates a new reader with default configuration
    pub fn new(buf: B) -> Self {
        Self::with_config(buf, DecoderConfig::default())
    }

    /// Creates a new reader with custom configuration
    pub fn with_config(buf: B, config: DecoderConfig) -> Self {
        Self {
            buf,
            offset: 0,
            depth: 0,
            config,
        }
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left unread
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(Error::truncated(self.offset, needed, remaining));
        }
        Ok(())
    }

    fn advance_offset(&mut self, n: usize) {
        self.offset += n;
    }

    /// Reads a one-byte boolean; any nonzero byte is true
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        self.advance_offset(1);
        Ok(self.buf.get_i8())
    }

    /// Reads a big-endian `i16`
    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        self.advance_offset(2);
        Ok(self.buf.get_i16())
    }

    /// Reads a big-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        self.advance_offset(4);
        Ok(self.buf.get_i32())
    }

    /// Reads a big-endian `i64`
    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        self.advance_offset(8);
        Ok(self.buf.get_i64())
    }

    /// Reads an unsigned byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        self.advance_offset(1);
        Ok(self.buf.get_u8())
    }

    /// Reads a big-endian `u16`
    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        self.advance_offset(2);
        Ok(self.buf.get_u16())
    }

    /// Reads a big-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        self.advance_offset(4);
        Ok(self.buf.get_u32())
    }

    /// Reads a big-endian `u64`
    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        self.advance_offset(8);
        Ok(self.buf.get_u64())
    }

    /// Reads a big-endian IEEE 754 single
    pub fn read_f32(&mut self) -> Result<f32> {
        self.ensure(4)?;
        self.advance_offset(4);
        Ok(self.buf.get_f32())
    }

    /// Reads a big-endian IEEE 754 double
    pub fn read_f64(&mut self) -> Result<f64> {
        self.ensure(8)?;
        self.advance_offset(8);
        Ok(self.buf.get_f64())
    }

    fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure(len)?;
        let mut out = vec![0u8; len];
        self.buf.copy_to_slice(&mut out);
        self.advance_offset(len);
        Ok(out)
    }

    /// Reads an element count, rejecting counts above the configured bound.
    ///
    /// Returns the count and a capacity hint limited to what the rest of the
    /// buffer could hold at `min_len` bytes per element. A count within the
    /// bound but beyond the buffer fails later with `StreamTruncated`.
    fn read_count(&mut self, min_len: usize, what: &str) -> Result<(usize, usize)> {
        let start = self.offset;
        let count = self.read_u32()?;
        if count > self.config.max_container_len {
            return Err(Error::malformed(
                start,
                format!(
                    "{} of {} elements exceeds the limit of {}",
                    what, count, self.config.max_container_len
                ),
            ));
        }
        let count = count as usize;
        Ok((count, count.min(self.buf.remaining() / min_len)))
    }

    fn enter(&mut self, start: usize) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(Error::malformed(
                start,
                format!("nesting deeper than {} containers", self.config.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Reads a UTF-16BE string with a byte-length prefix.
    ///
    /// The [`NULL_LENGTH`] sentinel yields an empty string. Unpaired
    /// surrogates decode to U+FFFD.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        let len = self.read_u32()?;
        if len == NULL_LENGTH {
            return Ok(String::new());
        }
        if len % 2 != 0 {
            return Err(Error::malformed(
                start,
                format!("odd byte length {} for a UTF-16 string", len),
            ));
        }

        let len = len as usize;
        self.ensure(len)?;
        let units: Vec<u16> = (0..len / 2).map(|_| self.buf.get_u16()).collect();
        self.advance_offset(len);

        Ok(char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }

    /// Reads a length-prefixed byte array; the sentinel yields an empty array
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()?;
        if len == NULL_LENGTH {
            return Ok(Vec::new());
        }
        self.read_raw(len as usize)
    }

    /// Reads a bit count and the packed bytes, most significant bit first
    pub fn read_bit_array(&mut self) -> Result<Vec<bool>> {
        let bit_count = self.read_u32()? as usize;
        let byte_count = bit_count.div_ceil(8);
        let packed = self.read_raw(byte_count)?;

        Ok((0..bit_count)
            .map(|i| (packed[i / 8] >> (7 - i % 8)) & 1 == 1)
            .collect())
    }

    /// Reads a Julian day number as a calendar date
    pub fn read_date(&mut self) -> Result<NaiveDate> {
        let julian_day = self.read_u32()?;
        calendar::date_from_julian_day(julian_day)
    }

    /// Reads milliseconds since midnight
    pub fn read_time(&mut self) -> Result<Duration> {
        let millis = self.read_u32()?;
        Ok(Duration::from_millis(u64::from(millis)))
    }

    /// Reads a date, a time and a zone flag (0 = local, otherwise UTC)
    pub fn read_date_time(&mut self) -> Result<ZonedDateTime> {
        let start = self.offset;
        let date = self.read_date()?;
        let millis = self.read_u32()?;
        let spec = if self.read_u8()? == 0 {
            TimeSpec::Local
        } else {
            TimeSpec::Utc
        };

        let civil = date
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight: NaiveDateTime| {
                midnight.checked_add_signed(TimeDelta::milliseconds(i64::from(millis)))
            })
            .ok_or_else(|| Error::malformed(start, "date-time outside the representable range"))?;

        Ok(ZonedDateTime { civil, spec })
    }

    /// Reads a URL; an empty string means no URL
    pub fn read_url(&mut self) -> Result<Option<url::Url>> {
        let value = self.read_string()?;
        if value.is_empty() {
            return Ok(None);
        }
        url::Url::parse(&value)
            .map(Some)
            .map_err(|source| Error::InvalidUrl { value, source })
    }

    /// Reads a count followed by that many variants
    pub fn read_list(&mut self) -> Result<Vec<Variant>> {
        let start = self.offset;
        let (count, capacity) = self.read_count(MIN_VARIANT_LEN, "list")?;
        self.enter(start)?;

        let mut items = Vec::with_capacity(capacity);
        for _ in 0..count {
            let (_, value) = self.read_variant()?;
            items.push(value);
        }

        self.leave();
        Ok(items)
    }

    /// Reads a count followed by that many strings
    pub fn read_string_list(&mut self) -> Result<Vec<String>> {
        let (count, capacity) = self.read_count(MIN_STRING_LEN, "string list")?;
        let mut items = Vec::with_capacity(capacity);
        for _ in 0..count {
            items.push(self.read_string()?);
        }
        Ok(items)
    }

    /// Reads a count followed by that many string keys and variant values.
    ///
    /// A repeated key keeps the later value.
    pub fn read_map(&mut self) -> Result<VariantMap> {
        let start = self.offset;
        let (count, _) = self.read_count(MIN_ENTRY_LEN, "map")?;
        self.enter(start)?;

        let mut map = VariantMap::new();
        for _ in 0..count {
            let key = self.read_string()?;
            let (_, value) = self.read_variant()?;
            map.insert(key, value);
        }

        self.leave();
        Ok(map)
    }

    /// Reads a type tag, a null flag and, unless null, the typed payload.
    ///
    /// Returns the raw tag alongside the value. A null variant is accepted
    /// for any tag, since no payload needs to be interpreted.
    pub fn read_variant(&mut self) -> Result<(u32, Variant)> {
        let start = self.offset;
        let tag = self.read_u32()?;
        if self.read_bool()? {
            return Ok((tag, Variant::Null));
        }

        let value = match check_tag(tag, start)? {
            VariantType::Bool => Variant::Bool(self.read_bool()?),
            VariantType::Int => Variant::Int32(self.read_i32()?),
            VariantType::UInt => Variant::UInt32(self.read_u32()?),
            VariantType::LongLong => Variant::Int64(self.read_i64()?),
            VariantType::ULongLong => Variant::UInt64(self.read_u64()?),
            VariantType::Double => Variant::Float64(self.read_f64()?),
            VariantType::Float => Variant::Float32(self.read_f32()?),
            VariantType::QChar | VariantType::Char => Variant::UInt8(self.read_u8()?),
            VariantType::SChar => Variant::Int8(self.read_i8()?),
            VariantType::Short => Variant::Int16(self.read_i16()?),
            VariantType::UShort => Variant::UInt16(self.read_u16()?),
            VariantType::Map => Variant::Map(self.read_map()?),
            VariantType::List => Variant::List(self.read_list()?),
            VariantType::String => Variant::String(self.read_string()?),
            VariantType::StringList => Variant::List(
                self.read_string_list()?
                    .into_iter()
                    .map(Variant::String)
                    .collect(),
            ),
            VariantType::ByteArray => Variant::ByteArray(self.read_byte_array()?),
            VariantType::BitArray => Variant::BitArray(self.read_bit_array()?),
            VariantType::Date => Variant::Date(self.read_date()?),
            VariantType::Time => Variant::Time(self.read_time()?),
            VariantType::DateTime => Variant::DateTime(self.read_date_time()?),
            VariantType::Url => Variant::Url(self.read_url()?),
        };

        Ok((tag, value))
    }
}
