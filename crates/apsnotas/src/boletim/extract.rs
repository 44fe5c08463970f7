//! Extracting subject records from the grades page.
//!
//! APSWeb renders the boletim as plain HTML tables, but the markup varies by
//! installation and by school year. The extractor first harvests every table
//! that looks grade-related; only when that yields nothing does it fall back
//! to scanning the visible text line by line.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::boletim::types::{RawGradeCell, SubjectRecord};

// Static selectors for parsing - compiled once
static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static HEADER_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").unwrap());
static DATA_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").unwrap());

// Vocabulary marking a table, or a line of text, as grade-related.
static HEADER_VOCAB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)disciplin|mat[eé]ria").unwrap());
static TABLE_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)disciplin|nota|m[eé]dia|avalia").unwrap());
static SUBJECT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)disciplina|mat[eé]ria").unwrap());

/// Subject records plus which tier produced them.
pub enum Extraction {
    FromTables(Vec<SubjectRecord>),
    FromText(Vec<SubjectRecord>),
}

impl Extraction {
    pub fn source(&self) -> &'static str {
        match self {
            Extraction::FromTables(_) => "tables",
            Extraction::FromText(_) => "text",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Extraction::FromTables(records) | Extraction::FromText(records) => records.len(),
        }
    }

    pub fn into_subjects(self) -> Vec<SubjectRecord> {
        match self {
            Extraction::FromTables(records) | Extraction::FromText(records) => records,
        }
    }
}

/// Harvests subject records from the page.
///
/// The text tier only runs when the table tier found no rows at all; rows
/// whose name cell is blank are dropped afterwards, whichever tier ran.
pub fn extract_subjects(html: &str, body_text: &str) -> Extraction {
    let mut records = extract_from_tables(html);
    let from_tables = !records.is_empty();
    if !from_tables {
        records = extract_from_text_lines(body_text);
    }
    records.retain(|record| !record.name.trim().is_empty());
    if from_tables {
        Extraction::FromTables(records)
    } else {
        Extraction::FromText(records)
    }
}

/// Strategy 1: rows of grade-looking tables. The first cell names the
/// subject, every further cell is a grade.
fn extract_from_tables(html: &str) -> Vec<SubjectRecord> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for table in document.select(&TABLE_SELECTOR) {
        if !table_looks_grade_related(&table) {
            continue;
        }
        for (index, row) in table.select(&ROW_SELECTOR).enumerate() {
            // A leading header row is skipped; headerless tables start with
            // data in row zero.
            if index == 0 && row.select(&HEADER_CELL_SELECTOR).next().is_some() {
                continue;
            }
            let cells: Vec<String> = row
                .select(&DATA_CELL_SELECTOR)
                .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
                .collect();
            if cells.len() < 2 {
                continue;
            }
            let grades: Vec<RawGradeCell> =
                cells[1..].iter().map(|raw| RawGradeCell::from_raw(raw)).collect();
            records.push(SubjectRecord::from_row(cells[0].clone(), grades));
        }
    }
    records
}

/// A table qualifies when a header cell names subjects, or failing that,
/// when its text mentions grade vocabulary anywhere.
fn table_looks_grade_related(table: &ElementRef<'_>) -> bool {
    let mut headers = table.select(&HEADER_CELL_SELECTOR);
    if headers.any(|header| HEADER_VOCAB_RE.is_match(&header.text().collect::<String>())) {
        return true;
    }
    let text = table.text().collect::<String>();
    TABLE_TEXT_RE.is_match(&text)
}

/// Strategy 2: subject-heading lines in the visible text. Produces
/// grade-less records; they at least tell the caller which subjects exist.
fn extract_from_text_lines(body_text: &str) -> Vec<SubjectRecord> {
    let lines: Vec<&str> = body_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut records = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if SUBJECT_LINE_RE.is_match(line) && index + 1 < lines.len() {
            records.push(SubjectRecord::from_row((*line).to_string(), Vec::new()));
        }
    }
    records
}

fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
