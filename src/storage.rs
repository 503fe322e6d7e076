//! Saving downloaded texts and covers to disk.

use crate::error::StorageError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::Url;

/// Longest file name most filesystems accept, in bytes.
const MAX_FILENAME_BYTES: usize = 255;

/// Device names Windows refuses as file stems.
const RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Removes characters that are illegal in file names.
///
/// Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .filter(|ch| !matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|ch| !ch.is_control())
        .collect();

    let trimmed_len = cleaned.trim_end_matches([' ', '.']).len();
    cleaned.truncate(trimmed_len);
    let cleaned = cleaned.trim_start().to_string();

    let stem = cleaned.split('.').next().unwrap_or_default().to_uppercase();
    let mut cleaned = if RESERVED.contains(&stem.as_str()) {
        format!("_{}", cleaned)
    } else {
        cleaned
    };

    if cleaned.len() > MAX_FILENAME_BYTES {
        let mut end = MAX_FILENAME_BYTES;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    cleaned
}

/// File name for a book text: `<id>. <title>.txt`.
pub fn text_filename(book_id: u64, title: &str) -> String {
    format!("{}. {}.txt", book_id, title)
}

/// File name for a cover: the last segment of the URL path, decoded.
pub fn image_filename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Writes `content` to `directory/filename`.
///
/// The directory is created if missing and the name is sanitized. Existing
/// files are replaced.
fn write_atomic(content: &[u8], directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
    replace_file(&directory.join(sanitize_filename(filename)), content)
}

/// Replaces the file at `path` with `content`, creating its parent directory.
///
/// Content lands in a temporary file next to `path` first, so the final path
/// holds either the old file or the complete new one.
pub(crate) fn replace_file(path: &Path, content: &[u8]) -> Result<PathBuf, StorageError> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory).map_err(|source| StorageError::CreateDir {
        path: directory.to_path_buf(),
        source,
    })?;

    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(directory).map_err(write_err)?;
    tmp.write_all(content).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(path.to_path_buf())
}

/// Saves a decoded text.
pub fn save_text(content: &str, directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
    write_atomic(content.as_bytes(), directory, filename)
}

/// Saves raw bytes.
pub fn save_binary(
    content: &[u8],
    directory: &Path,
    filename: &str,
) -> Result<PathBuf, StorageError> {
    write_atomic(content, directory, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("239. Алиби.txt"), "239. Алиби.txt");
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
        assert_eq!(sanitize_filename("tab\there\n"), "tabhere");
        assert_eq!(sanitize_filename("trailing. . "), "trailing");
        assert_eq!(sanitize_filename("???"), "unnamed");
        assert_eq!(sanitize_filename("con.txt"), "_con.txt");
    }

    #[test]
    fn test_sanitize_long_name_on_char_boundary() {
        let long = "я".repeat(200);
        let cleaned = sanitize_filename(&long);
        assert!(cleaned.len() <= MAX_FILENAME_BYTES);
        assert!(cleaned.chars().all(|c| c == 'я'));
    }

    #[test]
    fn test_text_filename() {
        assert_eq!(text_filename(5, "Title"), "5. Title.txt");
    }

    #[test]
    fn test_image_filename() {
        let url = Url::parse("https://tululu.org/shots/239.jpg").unwrap();
        assert_eq!(image_filename(&url), "239.jpg");

        let url = Url::parse("https://tululu.org/shots/%D0%B0.jpg").unwrap();
        assert_eq!(image_filename(&url), "а.jpg");

        let url = Url::parse("https://tululu.org/").unwrap();
        assert_eq!(sanitize_filename(&image_filename(&url)), "unnamed");
    }

    #[test]
    fn test_save_creates_directory_and_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let books = root.path().join("books");

        let first = save_text("first body", &books, "7. Title?.txt").unwrap();
        let second = save_text("second body", &books, "7. Title?.txt").unwrap();

        assert_eq!(first, second);
        assert_eq!(first, books.join("7. Title.txt"));
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "second body");
        assert_eq!(std::fs::read_dir(&books).unwrap().count(), 1);
    }

    #[test]
    fn test_save_binary_is_byte_exact() {
        let root = tempfile::tempdir().unwrap();
        let bytes = [0u8, 159, 146, 150, 255];

        let path = save_binary(&bytes, root.path(), "cover.jpg").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), bytes);
    }

    #[test]
    fn test_replace_file_keeps_given_name() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("out").join("records.json");

        replace_file(&path, b"old").unwrap();
        let written = replace_file(&path, b"new").unwrap();

        assert_eq!(written, path);
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(root.path().join("out")).unwrap().count(), 1);
    }
}
