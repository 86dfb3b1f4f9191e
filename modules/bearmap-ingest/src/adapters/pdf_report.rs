//! Prefecture PDF report importer.
//!
//! Several prefectures (Nagano, Iwate) publish sighting lists only as
//! PDF tables. An external parsing step turns those into JSON files;
//! this adapter reads one such file and converts its rows. Geocoding is
//! an external collaborator, so rows stay coordinate-free and rely on
//! the city-plus-date duplicate rule, like the GIS source.

use std::path::PathBuf;

use async_trait::async_trait;
use bearmap_common::{
    bear_type_for_prefecture, is_known_prefecture, Sighting, SightingStatus, SourceType,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::{FetchError, FetchOptions, SourceAdapter};

/// Published sighting-list page for Nagano, the default source of the
/// parsed files.
const NAGANO_REPORT_URL: &str =
    "https://www.pref.nagano.lg.jp/shinrin/sangyo/ringyo/choju/joho/kuma-map.html";

/// One row of the parsed PDF table.
#[derive(Debug, Deserialize)]
struct ReportRow {
    #[serde(default)]
    prefecture: String,
    /// Row number within the published table, unique per report.
    #[serde(default)]
    number: String,
    /// `YYYY/M/D` with no zero padding.
    #[serde(default)]
    date_str: String,
    #[serde(default)]
    municipality: String,
    /// 里地 or 林内.
    #[serde(default)]
    area_type: String,
    /// 目撃 or 痕跡.
    #[serde(default)]
    sighting_type: String,
    /// 成獣, 幼獣, 親子, 不明.
    #[serde(default)]
    bear_size: String,
    #[serde(default)]
    bear_count: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    location: String,
}

pub struct PdfReportAdapter {
    path: PathBuf,
    report_url: String,
}

impl PdfReportAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            report_url: NAGANO_REPORT_URL.to_string(),
        }
    }

    pub fn with_report_url(mut self, url: impl Into<String>) -> Self {
        self.report_url = url.into();
        self
    }
}

fn parse_report_date(raw: &str) -> Option<DateTime<Utc>> {
    let mut parts = raw.split('/');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let day: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn convert_row(row: &ReportRow, report_url: &str) -> Option<Sighting> {
    if !is_known_prefecture(&row.prefecture) {
        warn!(number = %row.number, raw = %row.prefecture, "Unknown prefecture, skipping row");
        return None;
    }

    let Some(sighted_at) = parse_report_date(&row.date_str) else {
        warn!(number = %row.number, raw = %row.date_str, "Invalid date format, skipping row");
        return None;
    };

    if row.municipality.is_empty() {
        warn!(number = %row.number, "Missing municipality, skipping row");
        return None;
    }

    let mut header: Vec<&str> = Vec::new();
    for part in [
        row.sighting_type.as_str(),
        row.bear_size.as_str(),
        row.bear_count.as_str(),
        row.area_type.as_str(),
    ] {
        if !part.is_empty() && part != "不明" {
            header.push(part);
        }
    }
    let description = match (header.is_empty(), row.details.is_empty()) {
        (false, false) => Some(format!("{} - {}", header.join(" "), row.details)),
        (false, true) => Some(header.join(" ")),
        (true, false) => Some(row.details.clone()),
        (true, true) => None,
    };

    let location = if row.location.is_empty() {
        row.municipality.clone()
    } else {
        row.location.clone()
    };

    // The table rows all come from one published page; the row number
    // keeps their URLs distinct so the URL dedup rule stays per-row.
    let source_url = if row.number.is_empty() {
        report_url.to_string()
    } else {
        format!("{report_url}#{}", row.number)
    };

    Some(Sighting {
        source_type: SourceType::Official,
        prefecture: row.prefecture.clone(),
        city: Some(row.municipality.clone()),
        location: Some(location),
        latitude: None,
        longitude: None,
        sighted_at,
        bear_type: Some(bear_type_for_prefecture(&row.prefecture).to_string()),
        description,
        source_url: Some(source_url),
        status: SightingStatus::Approved,
    })
}

/// Parse and convert a whole report file body. Returns the surviving
/// sightings plus the count of dropped rows.
fn convert_report(json_text: &str, report_url: &str, cutoff: Option<DateTime<Utc>>)
    -> Result<(Vec<Sighting>, usize), FetchError>
{
    let rows: Vec<ReportRow> = serde_json::from_str(json_text)
        .map_err(|e| FetchError::Malformed(format!("report payload: {e}")))?;

    let mut sightings = Vec::new();
    let mut skipped = 0usize;
    for row in &rows {
        let Some(sighting) = convert_row(row, report_url) else {
            skipped += 1;
            continue;
        };
        if let Some(cutoff) = cutoff {
            if sighting.sighted_at < cutoff {
                continue;
            }
        }
        sightings.push(sighting);
    }
    Ok((sightings, skipped))
}

#[async_trait]
impl SourceAdapter for PdfReportAdapter {
    async fn fetch_and_convert(&self, opts: &FetchOptions) -> Result<Vec<Sighting>, FetchError> {
        info!(source = self.name(), path = %self.path.display(), "Reading parsed report");

        let json_text = tokio::fs::read_to_string(&self.path).await?;

        let (sightings, skipped) = convert_report(&json_text, &self.report_url, opts.cutoff())?;
        info!(
            source = self.name(),
            converted = sightings.len(),
            skipped,
            "Report conversion complete"
        );
        Ok(sightings)
    }

    fn name(&self) -> &str {
        "pdf-report"
    }
}
