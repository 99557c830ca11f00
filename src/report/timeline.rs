//! Per-company timeline of recruiting emails.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::dataset::PredictionRecord;
use crate::error::ReportError;
use crate::taxonomy::RECRUITING;

const UNKNOWN_DOMAIN: &str = "Unknown";

static SENDER_DOMAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@([\w.-]+)").unwrap());

static TRAILING_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub date: DateTime<Utc>,
    pub from: String,
    pub subject: String,
    pub sub_category: String,
}

/// Recruiting events grouped by sender domain, each group in date order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    pub companies: BTreeMap<String, Vec<TimelineEvent>>,
}

impl Timeline {
    pub fn event_count(&self) -> usize {
        self.companies.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    /// Company groups worth showing: senders without a domain are left out.
    fn named_companies(&self) -> impl Iterator<Item = (&String, &Vec<TimelineEvent>)> {
        self.companies
            .iter()
            .filter(|(domain, _)| domain.as_str() != UNKNOWN_DOMAIN)
    }
}

/// Naive layouts tried after the zoned ones; all are taken as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a header date: RFC 2822 (with or without a trailing `(UTC)`-style
/// comment), RFC 3339, a zone-less `%Y-%m-%d %H:%M:%S` or
/// `%Y-%m-%dT%H:%M:%S`, or a bare `%Y-%m-%d` at midnight. Naive values are
/// taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let without_comment = TRAILING_COMMENT.replace(trimmed, "");
    if let Ok(dt) = DateTime::parse_from_rfc2822(&without_comment) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Domain part of the first address in a `From` header.
pub fn sender_domain(from: &str) -> String {
    SENDER_DOMAIN
        .captures(from)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

/// Collect predicted-recruiting rows with a usable date.
pub fn build_timeline(predictions: &[PredictionRecord]) -> Timeline {
    let mut events: Vec<(String, TimelineEvent)> = Vec::new();
    for pred in predictions.iter().filter(|p| p.pred_main == RECRUITING) {
        let Some(date) = pred.record.header("date").as_deref().and_then(parse_date) else {
            debug!(id = pred.id, "Skipping recruiting email without a parsable date");
            continue;
        };
        let from = pred.record.header("from").unwrap_or_default();
        events.push((
            sender_domain(&from),
            TimelineEvent {
                date,
                from,
                subject: pred.record.header("subject").unwrap_or_default(),
                sub_category: pred.pred_sub.clone(),
            },
        ));
    }

    events.sort_by_key(|(_, event)| event.date);
    let mut timeline = Timeline::default();
    for (domain, event) in events {
        timeline.companies.entry(domain).or_default().push(event);
    }
    timeline
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (domain, events) in self.named_companies() {
            writeln!(f, "=== {domain} ===")?;
            for e in events {
                writeln!(
                    f,
                    "  {} | {:<25} | From: {:<40} | Subject: {}",
                    e.date.format("%Y-%m-%d"),
                    e.sub_category,
                    e.from,
                    e.subject
                )?;
            }
        }
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = "body { font-family: sans-serif; margin: 2em; }
h2 { border-bottom: 1px solid #ccc; padding-bottom: 4px; }
table { border-collapse: collapse; width: 100%; margin-bottom: 2em; }
th, td { border: 1px solid #ddd; padding: 6px 10px; text-align: left; }
th { background: #f2f2f2; }
tr:nth-child(even) { background: #fafafa; }";

/// Render one table per company. Senders without a domain are left out.
pub fn render_html(timeline: &Timeline) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Recruiting Timeline</title>\n<style>\n");
    html.push_str(STYLE);
    html.push_str("\n</style>\n</head>\n<body>\n<h1>Recruiting Timeline</h1>\n");

    for (domain, events) in timeline.named_companies() {
        html.push_str(&format!("<h2>{}</h2>\n<table>\n", escape_html(domain)));
        html.push_str("<tr><th>Date</th><th>Category</th><th>From</th><th>Subject</th></tr>\n");
        for e in events {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                e.date.format("%Y-%m-%d"),
                escape_html(&e.sub_category),
                escape_html(&e.from),
                escape_html(&e.subject),
            ));
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

pub fn write_html(path: &Path, timeline: &Timeline) -> Result<(), ReportError> {
    std::fs::write(path, render_html(timeline))?;
    Ok(())
}
