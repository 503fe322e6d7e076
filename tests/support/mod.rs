//! In-memory fetcher and observer shared by the crawl tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tululu::config::ParseFailurePolicy;
use tululu::crawler::{CrawlOptions, RetryCause, SkipReason};
use tululu::error::{ParseError, StorageError};
use tululu::extract::CrawlTarget;
use tululu::fetcher::{Absence, FetchOutcome, Fetcher, with_query};
use tululu::observer::CrawlObserver;
use tululu::record::BookRecord;
use url::Url;

pub const SITE: &str = "https://tululu.org/";

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Bytes(Vec<u8>),
    Redirect,
    Status(u16),
    Drop,
}

impl Reply {
    fn outcome(&self) -> FetchOutcome<Vec<u8>> {
        match self {
            Reply::Text(text) => FetchOutcome::Success(text.clone().into_bytes()),
            Reply::Bytes(bytes) => FetchOutcome::Success(bytes.clone()),
            Reply::Redirect => FetchOutcome::NotFound(Absence::Redirected {
                status: 302,
                location: Some("/".to_string()),
            }),
            Reply::Status(code) => FetchOutcome::NotFound(Absence::Status(*code)),
            Reply::Drop => FetchOutcome::TransientFailure("connection reset".to_string()),
        }
    }
}

/// Answers from per-URL queues; the last reply in a queue repeats forever.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues replies for `url` (relative to [`SITE`], query included).
    pub fn on(self, url: &str, replies: Vec<Reply>) -> Self {
        let full = Url::parse(SITE).unwrap().join(url).unwrap().to_string();
        self.replies
            .lock()
            .unwrap()
            .insert(full, replies.into_iter().collect());
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, url: &Url, query: &[(&str, String)]) -> FetchOutcome<Vec<u8>> {
        let full = with_query(url, query).to_string();
        self.requests.lock().unwrap().push(full.clone());

        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(&full) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap().outcome(),
            Some(queue) => queue.front().map(Reply::outcome).unwrap_or_else(|| {
                FetchOutcome::NotFound(Absence::Status(404))
            }),
            None => FetchOutcome::NotFound(Absence::Status(404)),
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_text(&self, url: &Url, query: &[(&str, String)]) -> FetchOutcome<String> {
        match self.next(url, query) {
            FetchOutcome::Success(bytes) => {
                FetchOutcome::Success(String::from_utf8_lossy(&bytes).into_owned())
            }
            FetchOutcome::NotFound(absence) => FetchOutcome::NotFound(absence),
            FetchOutcome::TransientFailure(cause) => FetchOutcome::TransientFailure(cause),
        }
    }

    async fn fetch_bytes(&self, url: &Url, query: &[(&str, String)]) -> FetchOutcome<Vec<u8>> {
        self.next(url, query)
    }
}

/// Records events as short strings such as `skip:7` or `retry:5`.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl CrawlObserver for RecordingObserver {
    fn on_page_listed(&self, page: u32, books: usize) {
        self.push(format!("page:{}:{}", page, books));
    }

    fn on_page_missing(&self, page: u32, _absence: Option<&Absence>) {
        self.push(format!("page_missing:{}", page));
    }

    fn on_page_retrying(&self, page: u32, _cause: &str, _delay: Duration) {
        self.push(format!("page_retry:{}", page));
    }

    fn on_link_rejected(&self, page: u32, _error: &ParseError) {
        self.push(format!("link_rejected:{}", page));
    }

    fn on_book_saved(&self, target: &CrawlTarget, _record: &BookRecord) {
        self.push(format!("saved:{}", target.book_id));
    }

    fn on_book_skipped(&self, target: &CrawlTarget, _reason: &SkipReason) {
        self.push(format!("skip:{}", target.book_id));
    }

    fn on_parse_failed(&self, target: &CrawlTarget, _error: &ParseError) {
        self.push(format!("parse:{}", target.book_id));
    }

    fn on_book_retrying(&self, target: &CrawlTarget, cause: &RetryCause, _delay: Duration) {
        let kind = match cause {
            RetryCause::Interrupted(_) => "interrupted",
            RetryCause::Malformed(_) => "malformed",
        };
        self.push(format!("retry:{}:{}", target.book_id, kind));
    }

    fn on_book_failed(&self, target: &CrawlTarget, _error: &StorageError) {
        self.push(format!("failed:{}", target.book_id));
    }
}

/// Options rooted in `dest`, with a zero retry delay.
pub fn options(dest: &Path, pages: std::ops::RangeInclusive<u32>) -> CrawlOptions {
    CrawlOptions {
        base_url: Url::parse(SITE).unwrap(),
        category_path: "l55".to_string(),
        pages,
        books_dir: dest.join("books"),
        images_dir: dest.join("images"),
        records_path: dest.join("books.json"),
        skip_images: false,
        skip_text: false,
        include_id: false,
        on_parse_error: ParseFailurePolicy::Skip,
        retry_delay: Duration::ZERO,
    }
}

/// Category page markup listing the given book ids.
pub fn category_page(ids: &[u64]) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<table class="d_book"><tr><td><a href="/b{id}/"><img src="/shots/{id}.jpg"></a></td></tr></table>"#
            )
        })
        .collect();
    format!("<html><body><div id=\"content\">{}</div></body></html>", rows)
}

/// Detail page markup for book `id`.
pub fn detail_page(id: u64, heading: &str) -> String {
    format!(
        r#"<html><body>
        <h1>{heading}</h1>
        <div class="bookimage"><a href="/b{id}/"><img src="/shots/{id}.jpg"></a></div>
        <span class="d_book"><b>Жанр книги:</b> <a href="/l55/">Научная фантастика</a></span>
        <div class="texts"><b>Гость</b><br><span class="black">Комментарий к {id}</span></div>
        </body></html>"#
    )
}

/// Scripts a complete, healthy book.
pub fn healthy_book(fetcher: ScriptedFetcher, id: u64) -> ScriptedFetcher {
    fetcher
        .on(
            &format!("/b{}/", id),
            vec![Reply::Text(detail_page(id, &format!("Книга {} :: Автор {}", id, id)))],
        )
        .on(
            &format!("/txt.php?id={}", id),
            vec![Reply::Text(format!("Текст книги {}", id))],
        )
        .on(
            &format!("/shots/{}.jpg", id),
            vec![Reply::Bytes(vec![0xFF, 0xD8, id as u8])],
        )
}
