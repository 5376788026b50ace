//! Green Button style interval feed ingestion.
//!
//! Element names are matched on their local name, case-insensitively, so
//! `espi:IntervalBlock`, `IntervalBlock` and `intervalBlock` all resolve.

use crate::error::{AppError, UsageError};
use crate::models::{
    round2, DataQuality, DateRange, IntervalReading, MonthlyUsage, ParsedUsageData,
};
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use roxmltree::{Document, Node};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const DEFAULT_READING_SECONDS: i64 = 3600;
const SECONDS_PER_DAY: f64 = 86_400.0;

fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_named(n, name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name)?.text().map(str::trim)
}

fn parse_epoch(raw: Option<&str>) -> Option<i64> {
    raw?.parse().ok()
}

/// Pull every positive interval reading out of a feed document.
pub fn extract_readings(xml: &str) -> Result<Vec<IntervalReading>, AppError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if !is_named(&root, "feed") {
        return Err(AppError::MalformedInput(format!(
            "expected <feed> root element, found <{}>",
            root.tag_name().name()
        )));
    }

    let entries: Vec<Node> = root.children().filter(|n| is_named(n, "entry")).collect();
    if entries.is_empty() {
        return Err(AppError::MalformedInput("feed contains no entries".into()));
    }

    let blocks: Vec<Node> = entries
        .iter()
        .filter_map(|entry| child(*entry, "content"))
        .flat_map(|content| {
            content
                .descendants()
                .filter(|n| is_named(n, "intervalBlock"))
        })
        .collect();
    if blocks.is_empty() {
        return Err(AppError::MalformedInput(
            "feed contains no intervalBlock elements".into(),
        ));
    }

    let mut readings = Vec::new();
    let mut discarded = 0usize;

    for block in blocks {
        let interval = child(block, "interval").ok_or_else(|| {
            AppError::MalformedInput("intervalBlock is missing its interval".into())
        })?;
        let block_start = parse_epoch(child_text(interval, "start")).ok_or_else(|| {
            AppError::MalformedInput("interval start is missing or not a timestamp".into())
        })?;

        let nodes: Vec<Node> = block
            .children()
            .filter(|n| is_named(n, "intervalReading"))
            .collect();
        let step = parse_epoch(child_text(interval, "duration"))
            .filter(|d| *d > 0 && !nodes.is_empty())
            .map_or(DEFAULT_READING_SECONDS, |d| (d / nodes.len() as i64).max(1));

        for (index, node) in nodes.iter().enumerate() {
            let wh = child_text(*node, "value").and_then(|v| v.parse::<f64>().ok());
            let Some(wh) = wh.filter(|v| v.is_finite() && *v > 0.0) else {
                discarded += 1;
                continue;
            };

            let secs = child(*node, "timePeriod")
                .and_then(|period| parse_epoch(child_text(period, "start")))
                .or_else(|| {
                    i64::try_from(index)
                        .ok()
                        .and_then(|i| i.checked_mul(step))
                        .and_then(|offset| block_start.checked_add(offset))
                });
            let Some(timestamp) = secs.and_then(|s| Utc.timestamp_opt(s, 0).single()) else {
                discarded += 1;
                continue;
            };

            readings.push(IntervalReading {
                timestamp,
                kwh: wh / 1000.0,
            });
        }
    }

    debug!(
        kept = readings.len(),
        discarded, "extracted interval readings from feed"
    );
    Ok(readings)
}

#[derive(Default)]
struct MonthBucket {
    total: f64,
    days: BTreeSet<NaiveDate>,
}

/// Bucket readings into calendar months (UTC) and grade their completeness.
pub fn aggregate_readings(readings: &[IntervalReading]) -> Result<ParsedUsageData, UsageError> {
    let (Some(first), Some(last)) = (
        readings.iter().map(|r| r.timestamp).min(),
        readings.iter().map(|r| r.timestamp).max(),
    ) else {
        return Err(UsageError::NoValidReadings);
    };

    let mut buckets: BTreeMap<(i32, u32), MonthBucket> = BTreeMap::new();
    for reading in readings {
        let date = reading.timestamp.date_naive();
        let bucket = buckets.entry((date.year(), date.month())).or_default();
        bucket.total += reading.kwh;
        bucket.days.insert(date);
    }

    let monthly_totals: Vec<MonthlyUsage> = buckets
        .into_iter()
        .map(|((year, month), bucket)| {
            let days = bucket.days.len() as u32;
            MonthlyUsage {
                month_key: format!("{year:04}-{month:02}"),
                total_kwh: bucket.total,
                days_with_data: days,
                average_daily: round2(bucket.total / f64::from(days)),
            }
        })
        .collect();

    let span_days = ((last - first).num_seconds() as f64 / SECONDS_PER_DAY)
        .ceil()
        .max(1.0);
    let completeness = readings.len() as f64 / (span_days * 24.0);
    let data_quality = DataQuality::from_completeness(completeness);

    debug!(
        months = monthly_totals.len(),
        completeness,
        quality = data_quality.as_label(),
        "aggregated usage"
    );

    ParsedUsageData::new(
        monthly_totals,
        data_quality,
        DateRange {
            start: first,
            end: last,
        },
    )
}

pub fn parse_feed(xml: &str) -> Result<ParsedUsageData, AppError> {
    let readings = extract_readings(xml)?;
    Ok(aggregate_readings(&readings)?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, NaiveDate};
    use std::fmt::Write;

    /// Daily blocks of hourly readings, each reading worth `wh`.
    pub fn hourly_feed(start: NaiveDate, days: i64, wh: f64, prefix: &str) -> String {
        let mut xml = String::new();
        let ns = if prefix.is_empty() {
            String::new()
        } else {
            format!(" xmlns:{prefix}=\"http://naesb.org/espi\"")
        };
        let p = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}:")
        };
        let _ = write!(xml, "<feed xmlns=\"http://www.w3.org/2005/Atom\"{ns}><entry><content>");
        let _ = write!(xml, "<{p}MeterReading>");
        for day in 0..days {
            let date = start + Duration::days(day);
            let epoch = date
                .and_hms_opt(0, 0, 0)
                .expect("midnight")
                .and_utc()
                .timestamp();
            let _ = write!(
                xml,
                "<{p}IntervalBlock><{p}interval><{p}duration>86400</{p}duration><{p}start>{epoch}</{p}start></{p}interval>"
            );
            for _ in 0..24 {
                let _ = write!(
                    xml,
                    "<{p}IntervalReading><{p}value>{wh}</{p}value></{p}IntervalReading>"
                );
            }
            let _ = write!(xml, "</{p}IntervalBlock>");
        }
        let _ = write!(xml, "</{p}MeterReading></content></entry></feed>");
        xml
    }
}
