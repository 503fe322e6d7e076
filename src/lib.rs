//! Tululu - book catalog crawler.
//!
//! This library provides functionality for:
//! - Listing books from paginated category pages of tululu.org
//! - Extracting title, author, cover, genres and comments from detail pages
//! - Downloading book texts and covers, and writing a JSON record file

pub mod config;
pub mod console;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod logging;
pub mod observer;
pub mod record;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use console::Console;
pub use crawler::{
    BookOutcome, CrawlOptions, CrawlReport, Crawler, FixedBackoff, RetryCause, SkipReason,
};
pub use error::{ConfigError, ParseError, StorageError};
pub use extract::CrawlTarget;
pub use fetcher::{Absence, FetchOutcome, Fetcher, HttpFetcher};
pub use observer::{CrawlObserver, LogObserver};
pub use record::{BookPage, BookRecord};
