//! Crawl event hooks.
//!
//! The crawler reports everything it decides through a [`CrawlObserver`]
//! handed to it at construction, instead of writing to a global log.
//! [`LogObserver`] is the production implementation.

use crate::crawler::{CrawlReport, RetryCause, SkipReason};
use crate::error::{ParseError, StorageError};
use crate::extract::CrawlTarget;
use crate::fetcher::Absence;
use crate::record::BookRecord;
use std::time::Duration;

/// Receives crawl events. Every method defaults to doing nothing.
pub trait CrawlObserver: Send + Sync {
    /// A category page listed `books` crawlable books.
    fn on_page_listed(&self, _page: u32, _books: usize) {}

    /// A category page does not exist or has no listings.
    fn on_page_missing(&self, _page: u32, _absence: Option<&Absence>) {}

    /// A category page fetch was interrupted and will be retried after `delay`.
    fn on_page_retrying(&self, _page: u32, _cause: &str, _delay: Duration) {}

    /// A listing link did not lead to a book detail page.
    fn on_link_rejected(&self, _page: u32, _error: &ParseError) {}

    /// A book was fully downloaded and recorded.
    fn on_book_saved(&self, _target: &CrawlTarget, _record: &BookRecord) {}

    /// A book was dropped without a record.
    fn on_book_skipped(&self, _target: &CrawlTarget, _reason: &SkipReason) {}

    /// A detail page was fetched but its markup was incomplete.
    fn on_parse_failed(&self, _target: &CrawlTarget, _error: &ParseError) {}

    /// A book attempt did not complete and will be retried after `delay`.
    fn on_book_retrying(&self, _target: &CrawlTarget, _cause: &RetryCause, _delay: Duration) {}

    /// Saving a book's files failed; the book is dropped.
    fn on_book_failed(&self, _target: &CrawlTarget, _error: &StorageError) {}

    /// The record file was written.
    fn on_crawl_complete(&self, _report: &CrawlReport) {}
}

/// Turns crawl events into `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl CrawlObserver for LogObserver {
    fn on_page_listed(&self, page: u32, books: usize) {
        tracing::info!(page, books, "category page listed");
    }

    fn on_page_missing(&self, page: u32, absence: Option<&Absence>) {
        match absence {
            Some(absence) => tracing::warn!(page, "Category page {} is missing: {}", page, absence),
            None => tracing::warn!(page, "Category page {} lists no books", page),
        }
    }

    fn on_page_retrying(&self, page: u32, cause: &str, delay: Duration) {
        tracing::warn!(
            page,
            "Connection lost on category page {}: {}; retrying in {:?}",
            page,
            cause,
            delay
        );
    }

    fn on_link_rejected(&self, page: u32, error: &ParseError) {
        tracing::warn!(page, "Ignoring listing link: {}", error);
    }

    fn on_book_saved(&self, target: &CrawlTarget, record: &BookRecord) {
        tracing::info!(
            book_id = target.book_id,
            "{} ({} :: {})",
            target.detail_url,
            record.title,
            record.author
        );
    }

    fn on_book_skipped(&self, target: &CrawlTarget, reason: &SkipReason) {
        tracing::warn!(book_id = target.book_id, "{}", skip_message(target.book_id, reason));
    }

    fn on_parse_failed(&self, target: &CrawlTarget, error: &ParseError) {
        tracing::warn!(
            book_id = target.book_id,
            "Book #{} page is malformed: {}",
            target.book_id,
            error
        );
    }

    fn on_book_retrying(&self, target: &CrawlTarget, cause: &RetryCause, delay: Duration) {
        tracing::warn!(
            book_id = target.book_id,
            "{}",
            retry_message(target.book_id, cause, delay)
        );
    }

    fn on_book_failed(&self, target: &CrawlTarget, error: &StorageError) {
        tracing::error!(
            book_id = target.book_id,
            "Could not save book #{}: {}",
            target.book_id,
            error
        );
    }

    fn on_crawl_complete(&self, report: &CrawlReport) {
        tracing::info!(
            records = report.records.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            retries = report.retries,
            "records written to {}",
            report.output.display()
        );
    }
}

fn skip_message(book_id: u64, reason: &SkipReason) -> String {
    match reason {
        SkipReason::NotFound(absence) => {
            format!("Book #{} is missing from the site: {}", book_id, absence)
        }
        SkipReason::Unparseable(msg) => {
            format!("Book #{} has a malformed page, skipping: {}", book_id, msg)
        }
    }
}

fn retry_message(book_id: u64, cause: &RetryCause, delay: Duration) -> String {
    match cause {
        RetryCause::Interrupted(msg) => format!(
            "Connection lost on book #{}: {}; retrying in {:?}",
            book_id, msg, delay
        ),
        RetryCause::Malformed(msg) => format!(
            "Book #{} page is malformed: {}; fetching again in {:?}",
            book_id, msg, delay
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_message_follows_reason() {
        let missing = SkipReason::NotFound(Absence::Status(404));
        assert_eq!(
            skip_message(7, &missing),
            "Book #7 is missing from the site: HTTP 404"
        );

        let malformed = SkipReason::Unparseable("element not found: h1".to_string());
        let message = skip_message(6, &malformed);
        assert!(message.starts_with("Book #6 has a malformed page"));
        assert!(!message.contains("missing from the site"));
    }

    #[test]
    fn test_retry_message_follows_cause() {
        let delay = Duration::from_secs(5);

        let lost = RetryCause::Interrupted("timed out".to_string());
        assert_eq!(
            retry_message(5, &lost, delay),
            "Connection lost on book #5: timed out; retrying in 5s"
        );

        let malformed = RetryCause::Malformed("element not found: h1".to_string());
        let message = retry_message(6, &malformed, delay);
        assert!(message.starts_with("Book #6 page is malformed"));
        assert!(!message.contains("Connection lost"));
    }
}
