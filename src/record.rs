//! Book records and the JSON record file.

use crate::error::StorageError;
use crate::storage::replace_file;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a detail page says about a book.
///
/// The site id is not part of the page body; see [`BookRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookPage {
    pub title: String,
    pub author: String,
    /// Cover `src`, percent-decoded, as written in the page.
    pub image_src: String,
    pub genres: Vec<String>,
    pub comments: Vec<String>,
}

/// One crawled book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Site-assigned id. Record files written without ids read back as 0.
    #[serde(default)]
    pub id: u64,
    pub title: String,
    pub author: String,
    pub image_src: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

impl BookRecord {
    /// Completes an extracted page with the id it was fetched under.
    pub fn new(id: u64, page: BookPage) -> Self {
        Self {
            id,
            title: page.title,
            author: page.author,
            image_src: page.image_src,
            genres: page.genres,
            comments: page.comments,
        }
    }
}

/// Serialized shape of a record; `id` is written only on request.
#[derive(Serialize)]
struct RecordView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    title: &'a str,
    author: &'a str,
    image_src: &'a str,
    genres: &'a [String],
    comments: &'a [String],
}

impl<'a> RecordView<'a> {
    fn new(record: &'a BookRecord, include_id: bool) -> Self {
        Self {
            id: include_id.then_some(record.id),
            title: &record.title,
            author: &record.author,
            image_src: &record.image_src,
            genres: &record.genres,
            comments: &record.comments,
        }
    }
}

/// Renders records as a pretty-printed JSON array.
pub fn records_to_json(records: &[BookRecord], include_id: bool) -> Result<String, StorageError> {
    let views: Vec<RecordView<'_>> = records
        .iter()
        .map(|record| RecordView::new(record, include_id))
        .collect();
    Ok(serde_json::to_string_pretty(&views)?)
}

/// Writes the record file, creating its parent directory if needed.
///
/// An existing file is replaced in one step.
pub fn write_records(
    path: &Path,
    records: &[BookRecord],
    include_id: bool,
) -> Result<PathBuf, StorageError> {
    let json = records_to_json(records, include_id)?;
    replace_file(path, json.as_bytes())
}

/// Reads a record file written by [`write_records`].
pub fn read_records(path: &Path) -> Result<Vec<BookRecord>, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|source| StorageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}
