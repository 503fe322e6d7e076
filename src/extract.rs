//! HTML extraction for category listings and book detail pages.

use crate::error::ParseError;
use crate::record::BookPage;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// Author used when the heading names none.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Separator between title and author in the detail page heading.
const TITLE_AUTHOR_SEPARATOR: &str = "::";

/// Regex to extract the book id from a detail page path (`/b239/`).
static BOOK_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/b(\d+)/?$").unwrap());

/// CSS selectors used for parsing.
struct Selectors {
    /// One table per book in a category listing.
    listing_row: Selector,
    /// Detail link inside a listing row.
    listing_link: Selector,
    /// "Title :: Author" heading.
    heading: Selector,
    /// Cover image.
    cover: Selector,
    /// Genre links.
    genre: Selector,
    /// Comment bodies.
    comment: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            listing_row: Selector::parse("table.d_book").unwrap(),
            listing_link: Selector::parse("td > a").unwrap(),
            heading: Selector::parse("h1").unwrap(),
            cover: Selector::parse("div.bookimage img").unwrap(),
            genre: Selector::parse("span.d_book a").unwrap(),
            comment: Selector::parse("div.texts span.black").unwrap(),
        }
    }
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(Selectors::new);

/// A book found on a category page, not yet crawled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub book_id: u64,
    pub detail_url: Url,
}

impl CrawlTarget {
    /// Builds a target from a detail page URL such as `https://tululu.org/b239/`.
    pub fn from_url(detail_url: Url) -> Result<Self, ParseError> {
        let book_id = BOOK_PATH_REGEX
            .captures(detail_url.path())
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| ParseError::InvalidBookUrl(detail_url.to_string()))?;

        Ok(Self {
            book_id,
            detail_url,
        })
    }
}

/// Collects the text content of an element.
fn element_text(elem: ElementRef<'_>) -> String {
    elem.text().collect::<String>()
}

/// Percent-decodes an attribute value, keeping it as-is if it is not valid UTF-8.
fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Extracts detail page links from a category page, in listing order.
///
/// Links are percent-decoded but left relative. A page without listings
/// yields an empty list.
pub fn extract_category_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);

    doc.select(&SELECTORS.listing_row)
        .filter_map(|row| {
            let link = row.select(&SELECTORS.listing_link).next()?;
            let href = link.value().attr("href")?;
            Some(decode(href))
        })
        .collect()
}

/// Resolves category links against the category page URL.
///
/// Links that cannot be joined are returned separately.
pub fn resolve_links(page_url: &Url, links: &[String]) -> (Vec<Url>, Vec<String>) {
    let mut resolved = Vec::with_capacity(links.len());
    let mut rejected = Vec::new();

    for link in links {
        match page_url.join(link) {
            Ok(url) => resolved.push(url),
            Err(_) => rejected.push(link.clone()),
        }
    }

    (resolved, rejected)
}

/// Splits a "Title :: Author" heading.
///
/// A missing or blank author becomes [`UNKNOWN_AUTHOR`].
pub fn split_heading(heading: &str) -> (String, String) {
    let parts: Vec<&str> = heading.split(TITLE_AUTHOR_SEPARATOR).collect();
    let title = parts[0].trim().to_string();

    let author = match parts.as_slice() {
        [_, .., last] => last.trim(),
        _ => "",
    };
    let author = if author.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        author.to_string()
    };

    (title, author)
}

/// Extracts book metadata from a detail page.
///
/// The heading and the cover image are required; genres and comments may be
/// absent.
pub fn extract_book_page(html: &str) -> Result<BookPage, ParseError> {
    let doc = Html::parse_document(html);

    let heading = doc
        .select(&SELECTORS.heading)
        .next()
        .map(element_text)
        .ok_or_else(|| ParseError::ElementNotFound("book heading".to_string()))?;

    let (title, author) = split_heading(&heading);
    if title.is_empty() {
        return Err(ParseError::ElementNotFound("book title".to_string()));
    }

    let image_src = doc
        .select(&SELECTORS.cover)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(decode)
        .ok_or_else(|| ParseError::ElementNotFound("cover image".to_string()))?;

    let genres = doc.select(&SELECTORS.genre).map(element_text).collect();
    let comments = doc.select(&SELECTORS.comment).map(element_text).collect();

    Ok(BookPage {
        title,
        author,
        image_src,
        genres,
        comments,
    })
}
