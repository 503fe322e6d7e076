//! Sequential crawl of category pages and book detail pages.
//!
//! Each book moves through fetch, extract and download as a unit. A missing
//! book is skipped for good; an interrupted one is retried from the detail
//! page after a pause, with no upper bound on attempts.

use crate::config::{Config, ParseFailurePolicy};
use crate::error::{ConfigError, ParseError, StorageError};
use crate::extract::{CrawlTarget, extract_book_page, extract_category_links, resolve_links};
use crate::fetcher::{Absence, FetchOutcome, Fetcher};
use crate::observer::{CrawlObserver, LogObserver};
use crate::record::{BookRecord, write_records};
use crate::storage::{image_filename, save_binary, save_text, text_filename};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Path of the plain-text endpoint, queried with `?id=<book id>`.
const TEXT_ENDPOINT: &str = "/txt.php";

/// Pause policy between attempts after a transient failure.
pub trait Backoff: Send + Sync {
    /// Delay before retry number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// The same pause before every retry.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff(pub Duration);

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Everything the crawler needs to know about one run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Site root the category listing hangs off.
    pub base_url: Url,
    /// Category path segment, e.g. `l55`.
    pub category_path: String,
    /// Category pages to visit, inclusive.
    pub pages: RangeInclusive<u32>,
    pub books_dir: PathBuf,
    pub images_dir: PathBuf,
    pub records_path: PathBuf,
    pub skip_images: bool,
    pub skip_text: bool,
    /// Write book ids into the record file.
    pub include_id: bool,
    pub on_parse_error: ParseFailurePolicy,
    pub retry_delay: Duration,
}

impl CrawlOptions {
    /// Builds run options from the loaded configuration.
    pub fn from_config(config: &Config, pages: RangeInclusive<u32>) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: config.site.base()?,
            category_path: config.site.category_path.trim_matches('/').to_string(),
            pages,
            books_dir: config.paths.books_dir(),
            images_dir: config.paths.images_dir(),
            records_path: config.paths.records_path(),
            skip_images: false,
            skip_text: false,
            include_id: config.crawl.include_id,
            on_parse_error: config.crawl.on_parse_error,
            retry_delay: config.crawl.retry_delay(),
        })
    }
}

/// Why a book produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The detail page or one of the book's files does not exist.
    NotFound(Absence),
    /// The detail page is missing required markup.
    Unparseable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound(absence) => write!(f, "{}", absence),
            SkipReason::Unparseable(msg) => write!(f, "unparseable page ({})", msg),
        }
    }
}

/// Why a book is being fetched again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryCause {
    /// A fetch was cut off at the connection level.
    Interrupted(String),
    /// The detail page lacked required markup and the policy says retry.
    Malformed(String),
}

impl fmt::Display for RetryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryCause::Interrupted(msg) => write!(f, "connection lost ({})", msg),
            RetryCause::Malformed(msg) => write!(f, "malformed page ({})", msg),
        }
    }
}

/// Final state of one book.
#[derive(Debug)]
pub enum BookOutcome {
    Recorded(BookRecord),
    Skipped(SkipReason),
    Failed(StorageError),
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Records in crawl order.
    pub records: Vec<BookRecord>,
    /// Ids of books that were not found or could not be parsed.
    pub skipped: Vec<u64>,
    /// Ids of books whose files could not be saved.
    pub failed: Vec<u64>,
    /// Number of retry pauses taken, pages and books together.
    pub retries: usize,
    /// Record file location.
    pub output: PathBuf,
}

/// Reasons a single book attempt did not complete.
enum Failure {
    Missing(Absence),
    Transient(String),
    Unparseable(ParseError),
    Storage(StorageError),
}

impl From<ParseError> for Failure {
    fn from(err: ParseError) -> Self {
        Failure::Unparseable(err)
    }
}

impl From<StorageError> for Failure {
    fn from(err: StorageError) -> Self {
        Failure::Storage(err)
    }
}

/// Unwraps a successful fetch, turning the rest into a [`Failure`].
fn settle<T>(outcome: FetchOutcome<T>) -> Result<T, Failure> {
    match outcome {
        FetchOutcome::Success(body) => Ok(body),
        FetchOutcome::NotFound(absence) => Err(Failure::Missing(absence)),
        FetchOutcome::TransientFailure(cause) => Err(Failure::Transient(cause)),
    }
}

fn join(base: &Url, reference: &str) -> Result<Url, Failure> {
    base.join(reference)
        .map_err(|e| Failure::Missing(Absence::InvalidRequest(format!("{}: {}", reference, e))))
}

/// Drives a crawl over a [`Fetcher`].
pub struct Crawler {
    fetcher: Box<dyn Fetcher>,
    observer: Arc<dyn CrawlObserver>,
    backoff: Box<dyn Backoff>,
    options: CrawlOptions,
}

impl Crawler {
    /// Creates a crawler that logs through `tracing` and pauses
    /// `options.retry_delay` between attempts.
    pub fn new(fetcher: Box<dyn Fetcher>, options: CrawlOptions) -> Self {
        let backoff = Box::new(FixedBackoff(options.retry_delay));
        Self {
            fetcher,
            observer: Arc::new(LogObserver),
            backoff,
            options,
        }
    }

    /// Replaces the event observer.
    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the retry pause policy.
    pub fn with_backoff(mut self, backoff: Box<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    /// URL of category page `page`.
    pub fn category_url(&self, page: u32) -> Result<Url, url::ParseError> {
        self.options
            .base_url
            .join(&format!("/{}/{}/", self.options.category_path, page))
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Lists the books of every configured category page, in page order.
    pub async fn collect_targets(&self) -> Vec<CrawlTarget> {
        let mut retries = 0;
        self.collect_targets_counted(&mut retries).await
    }

    async fn collect_targets_counted(&self, retries: &mut usize) -> Vec<CrawlTarget> {
        let mut targets = Vec::new();
        for page in self.options.pages.clone() {
            targets.extend(self.collect_page(page, retries).await);
        }
        targets
    }

    /// Lists the books of one category page.
    ///
    /// Missing pages are tolerated; interrupted fetches are retried until
    /// the page answers.
    async fn collect_page(&self, page: u32, retries: &mut usize) -> Vec<CrawlTarget> {
        let page_url = match self.category_url(page) {
            Ok(url) => url,
            Err(e) => {
                let absence = Absence::InvalidRequest(e.to_string());
                self.observer.on_page_missing(page, Some(&absence));
                return Vec::new();
            }
        };

        let mut attempt = 0;
        let html = loop {
            match self.fetcher.fetch_text(&page_url, &[]).await {
                FetchOutcome::Success(html) => break html,
                FetchOutcome::NotFound(absence) => {
                    self.observer.on_page_missing(page, Some(&absence));
                    return Vec::new();
                }
                FetchOutcome::TransientFailure(cause) => {
                    attempt += 1;
                    *retries += 1;
                    let delay = self.backoff.delay(attempt);
                    self.observer.on_page_retrying(page, &cause, delay);
                    Self::pause(delay).await;
                }
            }
        };

        let links = extract_category_links(&html);
        if links.is_empty() {
            self.observer.on_page_missing(page, None);
            return Vec::new();
        }

        let (resolved, rejected) = resolve_links(&page_url, &links);
        for link in rejected {
            self.observer
                .on_link_rejected(page, &ParseError::InvalidBookUrl(link));
        }

        let mut targets = Vec::with_capacity(resolved.len());
        for url in resolved {
            match CrawlTarget::from_url(url) {
                Ok(target) => targets.push(target),
                Err(e) => self.observer.on_link_rejected(page, &e),
            }
        }

        self.observer.on_page_listed(page, targets.len());
        targets
    }

    /// Runs one book to completion: recorded, skipped or failed.
    pub async fn crawl_book(&self, target: &CrawlTarget) -> BookOutcome {
        let mut retries = 0;
        self.crawl_book_counted(target, &mut retries).await
    }

    async fn crawl_book_counted(&self, target: &CrawlTarget, retries: &mut usize) -> BookOutcome {
        let mut attempt = 0;
        loop {
            let cause = match self.attempt_book(target).await {
                Ok(record) => {
                    self.observer.on_book_saved(target, &record);
                    return BookOutcome::Recorded(record);
                }
                Err(Failure::Missing(absence)) => {
                    let reason = SkipReason::NotFound(absence);
                    self.observer.on_book_skipped(target, &reason);
                    return BookOutcome::Skipped(reason);
                }
                Err(Failure::Unparseable(err)) => {
                    self.observer.on_parse_failed(target, &err);
                    match self.options.on_parse_error {
                        ParseFailurePolicy::Skip => {
                            let reason = SkipReason::Unparseable(err.to_string());
                            self.observer.on_book_skipped(target, &reason);
                            return BookOutcome::Skipped(reason);
                        }
                        ParseFailurePolicy::Retry => RetryCause::Malformed(err.to_string()),
                    }
                }
                Err(Failure::Storage(err)) => {
                    self.observer.on_book_failed(target, &err);
                    return BookOutcome::Failed(err);
                }
                Err(Failure::Transient(cause)) => RetryCause::Interrupted(cause),
            };

            attempt += 1;
            *retries += 1;
            let delay = self.backoff.delay(attempt);
            self.observer.on_book_retrying(target, &cause, delay);
            Self::pause(delay).await;
        }
    }

    /// One pass of fetch, extract and download for a book.
    ///
    /// Every download finishes before anything is written, so a book that
    /// turns out to be missing leaves no files behind.
    async fn attempt_book(&self, target: &CrawlTarget) -> Result<BookRecord, Failure> {
        let html = settle(self.fetcher.fetch_text(&target.detail_url, &[]).await)?;
        let record = BookRecord::new(target.book_id, extract_book_page(&html)?);

        let text = if self.options.skip_text {
            None
        } else {
            let text_url = join(&target.detail_url, TEXT_ENDPOINT)?;
            let query = [("id", target.book_id.to_string())];
            Some(settle(self.fetcher.fetch_text(&text_url, &query).await)?)
        };

        let image = if self.options.skip_images {
            None
        } else {
            let image_url = join(&target.detail_url, &record.image_src)?;
            let bytes = settle(self.fetcher.fetch_bytes(&image_url, &[]).await)?;
            Some((image_filename(&image_url), bytes))
        };

        if let Some(text) = text {
            save_text(
                &text,
                &self.options.books_dir,
                &text_filename(target.book_id, &record.title),
            )?;
        }
        if let Some((filename, bytes)) = image {
            save_binary(&bytes, &self.options.images_dir, &filename)?;
        }

        Ok(record)
    }

    /// Crawls every configured page and book, then writes the record file.
    ///
    /// Only a failure to write the record file is returned as an error.
    pub async fn run(&self) -> anyhow::Result<CrawlReport> {
        let mut retries = 0;
        let targets = self.collect_targets_counted(&mut retries).await;
        tracing::info!(books = targets.len(), "collected books to crawl");

        let mut records = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();

        for target in &targets {
            match self.crawl_book_counted(target, &mut retries).await {
                BookOutcome::Recorded(record) => records.push(record),
                BookOutcome::Skipped(_) => skipped.push(target.book_id),
                BookOutcome::Failed(_) => failed.push(target.book_id),
            }
        }

        let output = write_records(
            &self.options.records_path,
            &records,
            self.options.include_id,
        )?;

        let report = CrawlReport {
            records,
            skipped,
            failed,
            retries,
            output,
        };
        self.observer.on_crawl_complete(&report);
        Ok(report)
    }
}
