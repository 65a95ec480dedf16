//! Configuration for decoding and reconstruction.
//!
//! The defaults match what current device firmware writes. Every code and
//! key is overridable because firmware generations disagree on several of
//! them.

/// MIME type of syndicated articles
pub const ARTICLE_MIME: &str = "application/x-kobo-html+pocket";

/// Content type code of downloaded top-level entries
pub const CONTENT_TYPE_DOWNLOADED: i64 = 6;

/// Configuration for the variant decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum nesting of lists and maps
    pub max_depth: usize,
    /// Largest element count accepted for a list, map or string list
    pub max_container_len: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_container_len: 1 << 20,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum container nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the largest accepted container element count
    pub fn max_container_len(mut self, len: u32) -> Self {
        self.max_container_len = len;
        self
    }
}

/// Configuration for building the content catalog
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Content type code that, together with the article MIME, marks an article
    pub downloaded_content_type: i64,
    /// MIME type of syndicated articles
    pub article_mime: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            downloaded_content_type: CONTENT_TYPE_DOWNLOADED,
            article_mime: ARTICLE_MIME.to_string(),
        }
    }
}

impl CatalogConfig {
    /// Creates a new catalog config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the downloaded content type code
    pub fn downloaded_content_type(mut self, code: i64) -> Self {
        self.downloaded_content_type = code;
        self
    }

    /// Sets the article MIME type
    pub fn article_mime(mut self, mime: impl Into<String>) -> Self {
        self.article_mime = mime.into();
        self
    }
}

/// Event type codes written by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCodes {
    /// 25% progress milestone
    pub progress_25: i64,
    /// 50% progress milestone
    pub progress_50: i64,
    /// 75% progress milestone
    pub progress_75: i64,
    /// Book finished
    pub finished: i64,
    /// Reading started, blob carries start timestamps
    pub read_start: i64,
    /// Reading ended, blob carries end timestamps
    pub read_end: i64,
    /// Article reading session, blob carries a duration
    pub session: i64,
}

impl Default for EventCodes {
    fn default() -> Self {
        Self {
            progress_25: 1012,
            progress_50: 1013,
            progress_75: 1014,
            finished: 5,
            read_start: 1020,
            read_end: 1021,
            session: 46,
        }
    }
}

/// Configuration for event reconstruction
#[derive(Debug, Clone)]
pub struct ReconstructorConfig {
    /// Sessions shorter than this many seconds are discarded
    pub min_session_secs: i64,
    /// Event type codes
    pub codes: EventCodes,
    /// MIME type of syndicated articles
    pub article_mime: String,
    /// Blob key of the timestamp list on start/end rows
    pub timestamps_key: String,
    /// Blob key of the content type on session rows
    pub content_type_key: String,
    /// Blob key of the reading duration on session rows
    pub reading_seconds_key: String,
    /// Lowercase file extensions of bundled assets that never carry events
    pub ignored_extensions: Vec<String>,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            min_session_secs: 30,
            codes: EventCodes::default(),
            article_mime: ARTICLE_MIME.to_string(),
            timestamps_key: "eventTimestamps".to_string(),
            content_type_key: "ContentType".to_string(),
            reading_seconds_key: "ExtraDataReadingSeconds".to_string(),
            ignored_extensions: ["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "css", "ttf", "otf"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl ReconstructorConfig {
    /// Creates a new reconstructor config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum session duration in seconds
    pub fn min_session_secs(mut self, secs: i64) -> Self {
        self.min_session_secs = secs;
        self
    }

    /// Sets the event type codes
    pub fn codes(mut self, codes: EventCodes) -> Self {
        self.codes = codes;
        self
    }

    /// Sets the article MIME type
    pub fn article_mime(mut self, mime: impl Into<String>) -> Self {
        self.article_mime = mime.into();
        self
    }

    /// Returns true if `book_id` ends in an ignored asset extension
    pub fn is_ignored_asset(&self, book_id: &str) -> bool {
        std::path::Path::new(book_id)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.ignored_extensions.iter().any(|ignored| *ignored == ext)
            })
            .unwrap_or(false)
    }
}
