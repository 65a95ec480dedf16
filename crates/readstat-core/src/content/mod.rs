//! Content catalog construction.
//!
//! Turns content rows into one [`BookEntity`] per book or article. A book
//! is spread over many rows: one canonical row carrying its metadata and
//! one row per part carrying that part's word count. Articles arrive as a
//! single row.

mod id;

use crate::config::CatalogConfig;
use crate::error::Result;
use crate::row::ContentRow;
use std::collections::btree_map::{self, BTreeMap};
use tracing::{debug, trace};

pub use id::{
    clean_content_id, split_content_id, ContentKey, PartMarker, SplitStrategy,
    DEVICE_MOUNT_PREFIX, PART_MARKERS,
};

/// Read status code of a finished book
const READ_STATUS_BOOK_FINISHED: i64 = 2;

/// Read status code of a finished article
const READ_STATUS_ARTICLE_FINISHED: i64 = 1;

/// Rounds a percentage down to the nearest quarter, clamped to 0..=100
pub fn coarse_progress(percent: i64) -> u8 {
    let clamped = percent.clamp(0, 100);
    (clamped - clamped % 25) as u8
}

/// A book or article in the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookEntity {
    /// Book path with part markers stripped, or the article ID
    pub id: String,
    /// Title
    pub title: String,
    /// Author
    pub author: String,
    /// Source URL, empty for local books
    pub url: String,
    /// True for books, false for articles
    pub is_book: bool,
    /// Finished flag
    pub finished: bool,
    /// Progress rounded down to 0, 25, 50, 75 or 100
    pub progress_percent: u8,
    parts: BTreeMap<String, u64>,
}

impl BookEntity {
    fn new(id: impl Into<String>, is_book: bool) -> Self {
        Self {
            id: id.into(),
            is_book,
            ..Self::default()
        }
    }

    /// Word counts by part ID
    pub fn parts(&self) -> &BTreeMap<String, u64> {
        &self.parts
    }

    /// Sum of all registered parts' word counts
    pub fn total_words(&self) -> u64 {
        self.parts.values().fold(0u64, |acc, &n| acc.saturating_add(n))
    }

    /// Registers a part unless its ID is already known.
    ///
    /// Returns true if the part was added.
    fn register_part(&mut self, part_id: &str, word_count: u64) -> bool {
        match self.parts.entry(part_id.to_string()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(word_count);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }
}

/// Book and article entities keyed by ID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<String, BookEntity>,
}

impl Catalog {
    /// Looks up an entity by ID
    pub fn get(&self, id: &str) -> Option<&BookEntity> {
        self.entries.get(id)
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entities in ID order
    pub fn iter(&self) -> impl Iterator<Item = &BookEntity> {
        self.entries.values()
    }

    /// Books only
    pub fn books(&self) -> impl Iterator<Item = &BookEntity> {
        self.iter().filter(|e| e.is_book)
    }

    /// Articles only
    pub fn articles(&self) -> impl Iterator<Item = &BookEntity> {
        self.iter().filter(|e| !e.is_book)
    }

    /// Consumes the catalog, returning the underlying map
    pub fn into_inner(self) -> BTreeMap<String, BookEntity> {
        self.entries
    }
}

/// Builds a [`Catalog`] from content rows
#[derive(Debug, Clone, Default)]
pub struct ContentCatalog {
    config: CatalogConfig,
}

impl ContentCatalog {
    /// Creates a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder with custom configuration
    pub fn with_config(config: CatalogConfig) -> Self {
        Self { config }
    }

    fn is_article(&self, row: &ContentRow) -> bool {
        row.content_type == self.config.downloaded_content_type
            && row.mime_type == self.config.article_mime
    }

    /// Builds the catalog.
    ///
    /// The first row error aborts the build and is returned unchanged.
    pub fn build<I>(&self, rows: I) -> Result<Catalog>
    where
        I: IntoIterator<Item = Result<ContentRow>>,
    {
        let mut entries: BTreeMap<String, BookEntity> = BTreeMap::new();
        let mut row_count = 0usize;

        for row in rows {
            let row = row?;
            row_count += 1;

            if self.is_article(&row) {
                self.add_article(&mut entries, &row);
            } else {
                self.add_book_row(&mut entries, &row);
            }
        }

        debug!(
            "Built catalog of {} entities from {} rows",
            entries.len(),
            row_count
        );
        Ok(Catalog { entries })
    }

    fn add_article(&self, entries: &mut BTreeMap<String, BookEntity>, row: &ContentRow) {
        let id = row.content_id.as_str();
        if entries.contains_key(id) {
            trace!("Skipping repeated article {}", id);
            return;
        }

        let mut article = BookEntity::new(id, false);
        article.title = row.title.clone();
        article.author = row.author.clone();
        article.url = row.url.clone();
        article.finished = row.read_status == READ_STATUS_ARTICLE_FINISHED;
        article.progress_percent = coarse_progress(row.percent_read);
        article.register_part(id, row.word_count.max(0) as u64);

        trace!("Registered article {}", id);
        entries.insert(id.to_string(), article);
    }

    fn add_book_row(&self, entries: &mut BTreeMap<String, BookEntity>, row: &ContentRow) {
        let key = split_content_id(&row.content_id);
        if key.book_id.is_empty() {
            trace!("No book ID in content ID {}", row.content_id);
            return;
        }

        let book = entries
            .entry(key.book_id.clone())
            .or_insert_with(|| BookEntity::new(key.book_id.as_str(), true));

        if key.is_canonical() {
            book.title = row.title.clone();
            book.author = row.author.clone();
            book.url = row.url.clone();
            book.progress_percent = coarse_progress(row.percent_read);
            book.finished = row.read_status == READ_STATUS_BOOK_FINISHED;
        } else if row.word_count > 0 && book.register_part(&key.part_id, row.word_count as u64) {
            trace!(
                "Registered part {} of {} ({} words)",
                key.part_id,
                key.book_id,
                row.word_count
            );
        }
    }
}

/// Builds a catalog with the default configuration
pub fn build_catalog<I>(rows: I) -> Result<Catalog>
where
    I: IntoIterator<Item = Result<ContentRow>>,
{
    ContentCatalog::new().build(rows)
}
