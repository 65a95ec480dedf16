//! Wire-level decoding through the public API.

use pretty_assertions::assert_eq;
use readstat_core::variant::{TimeSpec, VariantType};
use readstat_core::{BlobDecoder, Error, Variant, VariantDecoder, VariantMap, VariantReader};

/// Extra data blob captured from a device's event table
const FIRMWARE_BLOB: &str = "0000000400000010005600690065007700540079007000650000000a00000000060054004f00430000003000450078007400720061004400610074006100520065006100640069006e006700530065007300730069006f006e00730000000200000000030000002e00450078007400720061004400610074006100520065006100640069006e0067005300650063006f006e0064007300000002000000000a00000028004500780074007200610044006100740061004400610074006500430072006500610074006500640000000a00000000280032003000310039002d00310031002d00320035005400300031003a00310037003a00310034005a";

/// Minimal big-endian encoder for building test blobs
#[derive(Default)]
struct Wire(Vec<u8>);

impl Wire {
    fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_be_bytes());
        self
    }

    fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }

    fn string(self, s: &str) -> Self {
        let units: Vec<u16> = s.encode_utf16().collect();
        let mut w = self.u32((units.len() * 2) as u32);
        for unit in units {
            w.0.extend_from_slice(&unit.to_be_bytes());
        }
        w
    }

    fn tag(self, ty: VariantType) -> Self {
        self.u32(ty.tag()).u8(0)
    }
}

#[test]
fn firmware_blob_decodes_fully() {
    let blob = hex::decode(FIRMWARE_BLOB).unwrap();
    let mut reader = VariantReader::new(&blob[..]);
    let map = reader.read_map().unwrap();

    let mut expected = VariantMap::new();
    expected.insert("ViewType".into(), Variant::String("TOC".into()));
    expected.insert("ExtraDataReadingSessions".into(), Variant::Int32(3));
    expected.insert("ExtraDataReadingSeconds".into(), Variant::Int32(10));
    expected.insert(
        "ExtraDataDateCreated".into(),
        Variant::String("2019-11-25T01:17:14Z".into()),
    );

    assert_eq!(map, expected);
    assert_eq!(reader.remaining(), 0);
    assert_eq!(reader.offset(), blob.len());
}

#[test]
fn decoding_is_deterministic() {
    let blob = hex::decode(FIRMWARE_BLOB).unwrap();
    let decoder = VariantDecoder::new();
    assert_eq!(
        decoder.decode_map(&blob).unwrap(),
        decoder.decode_map(&blob).unwrap()
    );
}

#[test]
fn truncated_firmware_blob_fails() {
    let blob = hex::decode(FIRMWARE_BLOB).unwrap();
    let err = VariantDecoder::new()
        .decode_map(&blob[..blob.len() - 3])
        .unwrap_err();
    assert!(matches!(err, Error::StreamTruncated { .. }));
}

#[test]
fn nested_containers() {
    let blob = Wire::default()
        .u32(2)
        .string("eventTimestamps")
        .tag(VariantType::List)
        .u32(2)
        .tag(VariantType::UInt)
        .u32(1_700_000_000)
        .tag(VariantType::UInt)
        .u32(1_700_000_600)
        .string("inner")
        .tag(VariantType::Map)
        .u32(1)
        .string("tags")
        .tag(VariantType::StringList)
        .u32(2)
        .string("a")
        .u32(0xFFFF_FFFF)
        .0;

    let mut reader = VariantReader::new(&blob[..]);
    let map = reader.read_map().unwrap();
    assert_eq!(reader.remaining(), 0);

    let stamps: Vec<i64> = map["eventTimestamps"]
        .as_list()
        .unwrap()
        .iter()
        .filter_map(Variant::as_i64)
        .collect();
    assert_eq!(stamps, vec![1_700_000_000, 1_700_000_600]);

    let inner = map["inner"].as_map().unwrap();
    assert_eq!(
        inner["tags"],
        Variant::List(vec![Variant::String("a".into()), Variant::String(String::new())])
    );
}

#[test]
fn date_variant_reference_epoch() {
    let blob = Wire::default().tag(VariantType::Date).u32(2_451_545).0;
    let (tag, value) = VariantDecoder::new().decode_variant(&blob).unwrap();
    assert_eq!(tag, 14);
    assert_eq!(value.to_string(), "2000-01-01");
}

#[test]
fn date_time_variant_local() {
    let blob = Wire::default()
        .tag(VariantType::DateTime)
        .u32(2_460_298)
        .u32(43_200_000)
        .u8(0)
        .0;
    let (_, value) = VariantDecoder::new().decode_variant(&blob).unwrap();
    let Variant::DateTime(dt) = value else {
        panic!("expected a date-time");
    };
    assert_eq!(dt.spec, TimeSpec::Local);
    assert_eq!(dt.civil.to_string(), "2023-12-19 12:00:00");
}

#[test]
fn string_sentinel_consumes_nothing_more() {
    let blob = Wire::default()
        .tag(VariantType::String)
        .u32(0xFFFF_FFFF)
        .tag(VariantType::Bool)
        .u8(1)
        .0;
    let mut reader = VariantReader::new(&blob[..]);
    assert_eq!(reader.read_variant().unwrap(), (10, Variant::String(String::new())));
    assert_eq!(reader.read_variant().unwrap(), (1, Variant::Bool(true)));
    assert_eq!(reader.remaining(), 0);
}

#[test]
fn unsupported_tag_reports_raw_tag() {
    // a rectangle variant inside a map
    let blob = Wire::default().u32(1).string("r").u32(19).u8(0).u32(0).0;
    let err = VariantDecoder::new().decode_map(&blob).unwrap_err();
    assert!(matches!(err, Error::UnsupportedVariantType { tag: 19, .. }));
}

#[test]
fn implausible_map_count_is_malformed() {
    let blob = Wire::default().u32(0x4000_0000).string("k").0;
    let err = VariantDecoder::new().decode_map(&blob).unwrap_err();
    assert!(matches!(err, Error::MalformedContainer { offset: 0, .. }));
}
