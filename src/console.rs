//! Terminal front end: the run header, the crawl plan and the closing summary.
//!
//! Per-book progress goes through `tracing`. Color is used only on a terminal
//! and never when `NO_COLOR` is set.

use crate::crawler::{CrawlOptions, CrawlReport};
use std::io::{self, IsTerminal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Heading,
    Plan,
    Done,
    Caution,
    Failure,
}

impl Tone {
    /// SGR parameters, always bold plus one color.
    fn sgr(self) -> &'static str {
        match self {
            Tone::Heading => "1;35",
            Tone::Plan => "1;34",
            Tone::Done => "1;32",
            Tone::Caution => "1;33",
            Tone::Failure => "1;31",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Tone::Heading => "",
            Tone::Plan => "PLAN",
            Tone::Done => "DONE",
            Tone::Caution => "WARN",
            Tone::Failure => "ERROR",
        }
    }
}

#[derive(Debug)]
pub struct Console {
    color: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self::with_colors(std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal())
    }

    pub fn with_colors(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", tone.sgr(), text)
        } else {
            text.to_string()
        }
    }

    /// `[TAG] message`, with only the tag colored.
    fn tagged(&self, tone: Tone, message: &str) -> String {
        format!("[{}] {}", self.paint(tone.tag(), tone), message)
    }

    pub fn heading(&self, title: &str) {
        println!();
        println!("{}", self.paint(title, Tone::Heading));
    }

    /// Describes what a run is about to do, one line per fact.
    pub fn plan_lines(&self, options: &CrawlOptions) -> Vec<String> {
        let mut lines = vec![format!(
            "category {} pages {} to {}",
            options.category_path,
            options.pages.start(),
            options.pages.end()
        )];
        match (options.skip_text, options.skip_images) {
            (true, true) => lines.push("records only, no texts or covers".to_string()),
            (true, false) => lines.push(format!("covers to {}", options.images_dir.display())),
            (false, true) => lines.push(format!("texts to {}", options.books_dir.display())),
            (false, false) => lines.push(format!(
                "texts to {}, covers to {}",
                options.books_dir.display(),
                options.images_dir.display()
            )),
        }
        lines.push(format!("records to {}", options.records_path.display()));
        lines
    }

    pub fn plan(&self, options: &CrawlOptions) {
        for line in self.plan_lines(options) {
            println!("{}", self.tagged(Tone::Plan, &line));
        }
    }

    pub fn failure(&self, message: &str) {
        eprintln!("{}", self.tagged(Tone::Failure, message));
    }

    /// One-line summary of a finished crawl.
    pub fn summary_line(&self, report: &CrawlReport) -> String {
        format!(
            "{} books saved, {} skipped, {} failed, {} retries",
            report.records.len(),
            report.skipped.len(),
            report.failed.len(),
            report.retries
        )
    }

    pub fn report(&self, report: &CrawlReport) {
        println!("{}", self.tagged(Tone::Done, &self.summary_line(report)));
        println!(
            "{}",
            self.tagged(Tone::Done, &format!("records in {}", report.output.display()))
        );
        if !report.failed.is_empty() {
            eprintln!(
                "{}",
                self.tagged(Tone::Caution, &format!("could not save books {:?}", report.failed))
            );
        }
    }
}
