//! Per-document conversion of wiki pages for search ingestion.
//!
//! A page that fails to convert is logged and skipped; one bad document
//! never aborts the batch.
use std::io::{BufRead, Write};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::Pipeline;

/// Title prefixes of pages kept out of the index.
const UNINDEXED_PREFIXES: &[&str] = &["api:", "howto:"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedPage {
    pub id: i64,
    pub title: String,
    pub markdown: String,
    pub search_title: String,
    pub search_text: String,
}

impl WikiPage {
    pub fn is_indexable(&self) -> bool {
        !UNINDEXED_PREFIXES
            .iter()
            .any(|prefix| self.title.starts_with(prefix))
    }
}

/// A page that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// 1-based line of the page in a JSON-lines input, 0 otherwise.
    pub line: usize,
    pub id: Option<i64>,
    pub error: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub converted: usize,
    pub skipped: usize,
    pub failures: Vec<Failure>,
}

/// Lowercase `text` and keep its `[a-z0-9]` runs, separated by single spaces.
pub fn search_terms(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn convert_page(pipeline: &Pipeline, page: &WikiPage) -> Result<ConvertedPage> {
    let body = page.body.as_deref();
    Ok(ConvertedPage {
        id: page.id,
        title: page.title.clone(),
        markdown: pipeline.to_markup(body)?,
        search_title: search_terms(&page.title),
        search_text: search_terms(&pipeline.to_raw(body)?),
    })
}

/// Convert `pages`, handing each result to `sink`.
pub fn convert_pages<I, F>(pipeline: &Pipeline, pages: I, mut sink: F) -> BatchReport
where
    I: IntoIterator<Item = WikiPage>,
    F: FnMut(ConvertedPage),
{
    let mut report = BatchReport::default();
    for page in pages {
        if let Some(converted) = convert_one(pipeline, &page, 0, &mut report) {
            sink(converted);
        }
    }
    report
}

/// Convert a JSON-lines stream of [`WikiPage`]s into JSON lines of
/// [`ConvertedPage`]s. Only I/O errors end the run.
pub fn convert_jsonl<R: BufRead, W: Write>(
    pipeline: &Pipeline,
    reader: R,
    mut writer: W,
) -> Result<BatchReport> {
    let started = Instant::now();
    let mut report = BatchReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let page: WikiPage = match serde_json::from_str(&line) {
            Ok(page) => page,
            Err(error) => {
                log::warn!("skipping line {}: {error}", index + 1);
                report.failures.push(Failure {
                    line: index + 1,
                    id: None,
                    error: error.to_string(),
                });
                continue;
            }
        };
        if let Some(converted) = convert_one(pipeline, &page, index + 1, &mut report) {
            serde_json::to_writer(&mut writer, &converted)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;

    log::debug!(
        "converted {} page(s), skipped {}, failed {} in {:?}",
        report.converted,
        report.skipped,
        report.failures.len(),
        started.elapsed()
    );
    Ok(report)
}

fn convert_one(
    pipeline: &Pipeline,
    page: &WikiPage,
    line: usize,
    report: &mut BatchReport,
) -> Option<ConvertedPage> {
    if !page.is_indexable() {
        log::trace!("page {} ({}) is not indexed", page.id, page.title);
        report.skipped += 1;
        return None;
    }
    match convert_page(pipeline, page) {
        Ok(converted) => {
            report.converted += 1;
            Some(converted)
        }
        Err(error) => {
            log::warn!("skipping page {} ({}): {error}", page.id, page.title);
            report.failures.push(Failure {
                line,
                id: Some(page.id),
                error: error.to_string(),
            });
            None
        }
    }
}
