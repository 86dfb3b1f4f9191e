//! Akita "Kumadas" open-data CSV importer.
//!
//! Downloads the fixed CSV export from the prefectural open-data catalog,
//! keeps black-bear rows only, and converts them into canonical records.
//! The feed is UTF-8 with an occasional BOM, quote-escaped, CRLF-lined.

use std::sync::OnceLock;

use async_trait::async_trait;
use bearmap_common::{
    validate_coordinates, with_retry, RetryOptions, Sighting, SightingStatus, SourceType,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use super::{FetchError, FetchOptions, SourceAdapter};

const AKITA_CSV_URL: &str = "https://ckan.pref.akita.lg.jp/dataset/f801a10f-f076-47e4-b5a6-0bb5569639e0/resource/326bfe79-3f64-401b-9862-b37a477c7211/download/050008_kumadas.csv";

const PREFECTURE: &str = "秋田県";
const TARGET_SPECIES: &str = "ツキノワグマ";

#[derive(Debug, Deserialize)]
struct KumadasRow {
    #[serde(rename = "出没情報ID", default)]
    id: String,
    #[serde(rename = "情報種別", default)]
    kind: String,
    #[serde(rename = "市町村", default)]
    municipality: String,
    #[serde(rename = "地番情報", default)]
    address: String,
    #[serde(rename = "目撃日時", default)]
    sighted_at: String,
    #[serde(rename = "獣種", default)]
    species: String,
    #[serde(rename = "性別", default)]
    gender: String,
    #[serde(rename = "単独か親子", default)]
    grouping: String,
    #[serde(rename = "頭数", default)]
    count: String,
    #[serde(rename = "目撃時の状況", default)]
    situation: String,
    #[serde(rename = "x(緯度)", default)]
    latitude: String,
    #[serde(rename = "y(経度)", default)]
    longitude: String,
}

pub struct KumadasCsvAdapter {
    client: reqwest::Client,
    url: String,
    retry: RetryOptions,
}

impl KumadasCsvAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            url: AKITA_CSV_URL.to_string(),
            retry: RetryOptions::default(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Parse the feed's loose `YYYY/M/D H:mm` date format. Missing time-of-day
/// means midnight.
fn parse_sighted_at(raw: &str) -> Option<DateTime<Utc>> {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = DATE_RE.get_or_init(|| {
        Regex::new(r"(\d{4})/(\d{1,2})/(\d{1,2})(?:\s+(\d{1,2}):(\d{1,2}))?").expect("valid regex")
    });
    let caps = re.captures(raw)?;

    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps.get(4).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let minute: u32 = caps.get(5).map_or(Some(0), |m| m.as_str().parse().ok())?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn convert_row(row: &KumadasRow) -> Option<Sighting> {
    // The feed mixes in monkeys, boars and the rest of the menagerie.
    if row.species != TARGET_SPECIES {
        return None;
    }

    let Some(sighted_at) = parse_sighted_at(&row.sighted_at) else {
        warn!(id = %row.id, raw = %row.sighted_at, "Invalid date format, skipping row");
        return None;
    };

    // Zero/blank coordinates mean "not geocoded" upstream.
    if row.latitude.is_empty()
        || row.longitude.is_empty()
        || row.latitude == "0"
        || row.longitude == "0"
    {
        warn!(id = %row.id, "Missing coordinates, skipping row");
        return None;
    }
    if !validate_coordinates(&row.latitude, &row.longitude) {
        warn!(id = %row.id, lat = %row.latitude, lng = %row.longitude, "Out-of-range coordinates, skipping row");
        return None;
    }

    let mut extras: Vec<String> = Vec::new();
    if !row.kind.is_empty() {
        extras.push(format!("種別: {}", row.kind));
    }
    if !row.grouping.is_empty() && row.grouping != "単独" {
        extras.push(format!("状態: {}", row.grouping));
    }
    if !row.count.is_empty() && row.count != "1" {
        extras.push(format!("頭数: {}", row.count));
    }
    if !row.gender.is_empty() && row.gender != "不明" {
        extras.push(format!("性別: {}", row.gender));
    }

    let description = match (row.situation.is_empty(), extras.is_empty()) {
        (false, false) => Some(format!("{} ({})", row.situation, extras.join(", "))),
        (false, true) => Some(row.situation.clone()),
        (true, false) => Some(extras.join(", ")),
        (true, true) => None,
    };

    let city = (!row.municipality.is_empty()).then(|| row.municipality.clone());
    let location = if !row.address.is_empty() {
        row.address.clone()
    } else if !row.municipality.is_empty() {
        row.municipality.clone()
    } else {
        PREFECTURE.to_string()
    };

    Some(Sighting {
        source_type: SourceType::Official,
        prefecture: PREFECTURE.to_string(),
        city,
        location: Some(location),
        latitude: Some(row.latitude.clone()),
        longitude: Some(row.longitude.clone()),
        sighted_at,
        bear_type: Some(TARGET_SPECIES.to_string()),
        description,
        source_url: Some(format!("https://kumadas.net/?id={}", row.id)),
        status: SightingStatus::Approved,
    })
}

/// Parse and convert the whole CSV body. Returns the surviving sightings
/// plus the count of rows dropped (wrong species, bad date, no coords,
/// unparsable line).
pub fn convert_csv(csv_text: &str, cutoff: Option<DateTime<Utc>>) -> (Vec<Sighting>, usize) {
    let cleaned = csv_text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(cleaned.as_bytes());

    let mut sightings = Vec::new();
    let mut skipped = 0usize;

    for result in reader.deserialize::<KumadasRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "Unparsable CSV line, skipping");
                skipped += 1;
                continue;
            }
        };

        let Some(sighting) = convert_row(&row) else {
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

    (sightings, skipped)
}

#[async_trait]
impl SourceAdapter for KumadasCsvAdapter {
    async fn fetch_and_convert(&self, opts: &FetchOptions) -> Result<Vec<Sighting>, FetchError> {
        info!(source = self.name(), url = %self.url, "Fetching CSV");

        let resp = with_retry(
            || async { self.client.get(&self.url).send().await?.error_for_status() },
            &self.retry,
        )
        .await?;
        let csv_text = resp.text().await?;

        let (sightings, skipped) = convert_csv(&csv_text, opts.cutoff());
        info!(
            source = self.name(),
            converted = sightings.len(),
            skipped,
            "CSV conversion complete"
        );

        Ok(sightings)
    }

    fn name(&self) -> &str {
        "kumadas-csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "出没情報ID,情報種別,市町村,地番情報,目撃日時,獣種,性別,単独か親子,頭数,目撃時の状況,x(緯度),y(経度)";

    fn csv_with(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn converts_a_valid_row() {
        let text = csv_with(&[
            "A-1,目撃,北秋田市,阿仁前田,2024/6/1 9:30,ツキノワグマ,不明,親子,2,山林で目撃,40.1234,140.5678",
        ]);
        let (sightings, skipped) = convert_csv(&text, None);
        assert_eq!(skipped, 0);
        assert_eq!(sightings.len(), 1);

        let s = &sightings[0];
        assert_eq!(s.prefecture, "秋田県");
        assert_eq!(s.city.as_deref(), Some("北秋田市"));
        assert_eq!(s.location.as_deref(), Some("阿仁前田"));
        assert_eq!(s.bear_type.as_deref(), Some("ツキノワグマ"));
        assert_eq!(s.source_url.as_deref(), Some("https://kumadas.net/?id=A-1"));
        assert_eq!(s.sighted_date().to_string(), "2024-06-01");
        // Grouping and count make it into the description; gender 不明 does not.
        let desc = s.description.as_deref().unwrap();
        assert!(desc.contains("山林で目撃"));
        assert!(desc.contains("状態: 親子"));
        assert!(desc.contains("頭数: 2"));
        assert!(!desc.contains("性別"));
    }

    #[test]
    fn non_target_species_is_excluded() {
        let text = csv_with(&[
            "A-2,目撃,北秋田市,,2024/6/1,ニホンザル,不明,単独,1,,40.1,140.5",
        ]);
        let (sightings, skipped) = convert_csv(&text, None);
        assert!(sightings.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn zero_or_blank_coordinates_are_excluded() {
        let text = csv_with(&[
            "A-3,目撃,北秋田市,,2024/6/1,ツキノワグマ,不明,単独,1,,0,140.5",
            "A-4,目撃,北秋田市,,2024/6/1,ツキノワグマ,不明,単独,1,,40.1,",
        ]);
        let (sightings, skipped) = convert_csv(&text, None);
        assert!(sightings.is_empty());
        assert_eq!(skipped, 2);
    }

    #[test]
    fn bad_date_is_excluded() {
        let text = csv_with(&[
            "A-5,目撃,北秋田市,,6月1日ごろ,ツキノワグマ,不明,単独,1,,40.1,140.5",
        ]);
        let (sightings, skipped) = convert_csv(&text, None);
        assert!(sightings.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn cutoff_filters_old_rows() {
        let text = csv_with(&[
            "A-6,目撃,北秋田市,,2020/1/1,ツキノワグマ,不明,単独,1,,40.1,140.5",
        ]);
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let (sightings, skipped) = convert_csv(&text, Some(cutoff));
        assert!(sightings.is_empty());
        // Filtered by window, not dropped as malformed.
        assert_eq!(skipped, 0);
    }

    #[test]
    fn tolerates_bom_and_crlf() {
        let text = format!(
            "\u{feff}{}\r\nA-7,目撃,鹿角市,\"大湯, 十和田\",2024/6/2 14:05,ツキノワグマ,オス,単独,1,道路横断,40.2,140.8\r\n",
            HEADER
        );
        let (sightings, skipped) = convert_csv(&text, None);
        assert_eq!(skipped, 0);
        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0].location.as_deref(), Some("大湯, 十和田"));
        let desc = sightings[0].description.as_deref().unwrap();
        assert!(desc.contains("性別: オス"));
    }

    #[test]
    fn date_without_time_defaults_to_midnight() {
        let at = parse_sighted_at("2024/6/1").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }
}
