//! Content ID splitting.
//!
//! Book content IDs are file paths that may carry a part marker followed by
//! the path of a part inside the book. Firmware generations use different
//! markers, and some markers are substrings of others, so they are tried
//! in a fixed priority order and the first hit wins.

/// Scheme prefix on content IDs of sideloaded files
const FILE_SCHEME: &str = "file://";

/// Mount point of the reader's user storage
pub const DEVICE_MOUNT_PREFIX: &str = "/mnt/onboard/";

/// How a part marker divides a content ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Marker belongs to neither side
    Discard,
    /// Marker names the container directory of the part and is kept on the
    /// part ID as a leading path segment
    Directory,
}

/// A part marker and how it splits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartMarker {
    /// Upper-case marker text, matched case-insensitively
    pub marker: &'static str,
    /// Split behaviour
    pub strategy: SplitStrategy,
}

/// Part markers in priority order
pub const PART_MARKERS: &[PartMarker] = &[
    // sideloaded epub parts
    PartMarker {
        marker: "!!",
        strategy: SplitStrategy::Discard,
    },
    // kepub anchors
    PartMarker {
        marker: "#(",
        strategy: SplitStrategy::Discard,
    },
    PartMarker {
        marker: "!OEBPS!",
        strategy: SplitStrategy::Directory,
    },
    PartMarker {
        marker: "!OPS!",
        strategy: SplitStrategy::Directory,
    },
    // legacy downloads
    PartMarker {
        marker: "!",
        strategy: SplitStrategy::Discard,
    },
];

/// A content ID split into book and part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKey {
    /// Book ID, empty when nothing precedes the marker
    pub book_id: String,
    /// Part ID, empty for the canonical book-level row
    pub part_id: String,
}

impl ContentKey {
    /// Returns true for the book-level row
    pub fn is_canonical(&self) -> bool {
        self.part_id.is_empty()
    }
}

/// Strips the `file://` scheme and anything up to the device mount prefix.
///
/// IDs without the prefix, such as article IDs, come back unchanged.
pub fn clean_content_id(content_id: &str) -> &str {
    let id = content_id.strip_prefix(FILE_SCHEME).unwrap_or(content_id);
    match id.find(DEVICE_MOUNT_PREFIX) {
        Some(pos) => &id[pos + DEVICE_MOUNT_PREFIX.len()..],
        None => id,
    }
}

/// Finds the first marker, in priority order, present in `id`
fn find_marker(id: &str) -> Option<(usize, &'static PartMarker)> {
    let upper = id.to_ascii_uppercase();
    PART_MARKERS
        .iter()
        .find_map(|m| upper.find(m.marker).map(|pos| (pos, m)))
}

/// Splits a content ID into book ID and part ID
pub fn split_content_id(content_id: &str) -> ContentKey {
    let id = clean_content_id(content_id);

    let Some((pos, marker)) = find_marker(id) else {
        return ContentKey {
            book_id: id.to_string(),
            part_id: String::new(),
        };
    };

    let book_id = id[..pos].to_string();
    let rest = &id[pos + marker.marker.len()..];
    let part_id = match marker.strategy {
        SplitStrategy::Discard => rest.to_string(),
        SplitStrategy::Directory => {
            let dir = id[pos..pos + marker.marker.len()].trim_matches('!');
            format!("{}/{}", dir, rest)
        }
    };

    ContentKey { book_id, part_id }
}
