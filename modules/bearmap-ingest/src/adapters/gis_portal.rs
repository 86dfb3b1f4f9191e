//! Kyoto GIS portal scraper.
//!
//! The portal is a classic server-rendered mapping product with no API:
//! an agreement interstitial, per-fiscal-year layer IDs, and a paginated
//! result grid. A remote browser session walks the pages and hands back
//! plain `{date, location}` rows; conversion happens here.

use std::collections::HashSet;

use async_trait::async_trait;
use bearmap_common::{with_retry, RetryOptions, Sighting, SightingStatus, SourceType};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use browserless_client::BrowserlessClient;

use super::{FetchError, FetchOptions, SourceAdapter};

const KYOTO_BASE_URL: &str = "https://g-kyoto.pref.kyoto.lg.jp/g-kyoto";
const PORTAL_PERMALINK: &str = "https://g-kyoto.pref.kyoto.lg.jp/g-kyoto/Map?mid=676";

/// Sighting layers, newest fiscal year first. The layer IDs are assigned
/// by the portal operator and change every year.
const LAYER_IDS: [(&str, &str, &str); 5] = [
    ("R7", "8010", "令和7年度"),
    ("R6", "7451", "令和6年度"),
    ("R5", "7450", "令和5年度"),
    ("R4", "7400", "令和4年度"),
    ("R3", "7184", "令和3年度"),
];

const MAX_PAGES: u32 = 20;
const SETTLE_MS: u64 = 1500;

/// Runs inside the remote browser. Clicks through the agreement page,
/// opens the requested layer's attribute grid, and pages through it,
/// collecting the date and location cells of every row.
const PAGINATION_SCRIPT: &str = r#"
export default async function ({ page, context }) {
  const { baseUrl, layerId, maxPages, settleMs } = context;

  await page.goto(`${baseUrl}/select.asp?dtp=676`, { waitUntil: "networkidle0" });
  const agree = await page.$("input#Agree");
  if (agree) {
    await Promise.all([
      page.waitForNavigation({ waitUntil: "networkidle0" }),
      agree.click(),
    ]);
  }

  await page.goto(
    `${baseUrl}/ThemeSearch?mid=676&mcl=${layerId},1,1,1&ac=26000`,
    { waitUntil: "networkidle0" }
  );
  await new Promise((r) => setTimeout(r, settleMs));

  const rows = [];
  for (let pageNo = 0; pageNo < maxPages; pageNo++) {
    const pageRows = await page.evaluate(() => {
      const out = [];
      const grid = document.querySelector('table[role="grid"]#parent-grid_');
      if (!grid) return out;
      for (const tr of grid.querySelectorAll("tbody tr")) {
        const cells = tr.querySelectorAll("td");
        if (cells.length >= 2) {
          out.push({
            date: cells[0].textContent.trim(),
            location: cells[1].textContent.trim(),
          });
        }
      }
      return out;
    });
    rows.push(...pageRows);

    const next = await page.evaluateHandle(() => {
      for (const el of document.querySelectorAll("a, button")) {
        if (el.textContent.includes("次へ") && !el.disabled) return el;
      }
      return null;
    });
    if (!(await next.jsonValue())) break;
    await next.asElement().click();
    await new Promise((r) => setTimeout(r, settleMs));
  }

  return { data: rows, type: "application/json" };
}
"#;

#[derive(Debug, Deserialize)]
struct GridRow {
    #[serde(default)]
    date: String,
    #[serde(default)]
    location: String,
}

pub struct GisPortalAdapter {
    browserless: BrowserlessClient,
    base_url: String,
    fiscal_years: Vec<String>,
    retry: RetryOptions,
}

impl GisPortalAdapter {
    pub fn new(browserless: BrowserlessClient) -> Self {
        Self {
            browserless,
            base_url: KYOTO_BASE_URL.to_string(),
            // The two most recent years cover the useful window; older
            // layers are opt-in.
            fiscal_years: vec!["R7".to_string(), "R6".to_string()],
            retry: RetryOptions::default(),
        }
    }

    pub fn with_fiscal_years(mut self, years: Vec<String>) -> Self {
        self.fiscal_years = years;
        self
    }

    fn layer_id(year: &str) -> Option<&'static str> {
        LAYER_IDS
            .iter()
            .find(|(label, _, _)| *label == year)
            .map(|(_, id, _)| *id)
    }
}

/// Convert scraped grid rows into canonical records. Rows without a
/// parsable `YYYY/MM/DD` date or an extractable municipality are dropped;
/// the grid has no coordinates, so records stay point-free and rely on
/// the location-plus-date duplicate rule.
fn convert_grid_rows(rows: &[GridRow]) -> Vec<Sighting> {
    let date_re = Regex::new(r"^(\d{4})/(\d{2})/(\d{2})$").expect("valid regex");
    let city_re = Regex::new(r"^([^市町村区]+(?:市|町|村|区))").expect("valid regex");

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut sightings = Vec::new();

    for row in rows {
        let Some(caps) = date_re.captures(&row.date) else {
            warn!(raw = %row.date, "Unrecognized grid date, skipping row");
            continue;
        };
        let (Ok(year), Ok(month), Ok(day)) = (
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        ) else {
            continue;
        };
        let Some(naive) = chrono::NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        else {
            warn!(raw = %row.date, "Impossible calendar date, skipping row");
            continue;
        };
        let sighted_at = chrono::TimeZone::from_utc_datetime(&chrono::Utc, &naive);

        if row.location.is_empty() {
            continue;
        }

        // The grid repeats rows across page boundaries when results shift
        // underneath the pager.
        if !seen.insert((row.date.clone(), row.location.clone())) {
            continue;
        }

        let city = city_re
            .captures(&row.location)
            .map(|c| c[1].to_string());

        sightings.push(Sighting {
            source_type: SourceType::Official,
            prefecture: "京都府".to_string(),
            city,
            location: Some(row.location.clone()),
            latitude: None,
            longitude: None,
            sighted_at,
            bear_type: Some("ツキノワグマ".to_string()),
            description: Some(format!("京都府クマ目撃情報: {}", row.location)),
            source_url: Some(PORTAL_PERMALINK.to_string()),
            status: SightingStatus::Approved,
        });
    }

    sightings
}

#[async_trait]
impl SourceAdapter for GisPortalAdapter {
    async fn fetch_and_convert(&self, opts: &FetchOptions) -> Result<Vec<Sighting>, FetchError> {
        let mut all_rows: Vec<GridRow> = Vec::new();

        for year in &self.fiscal_years {
            let Some(layer_id) = Self::layer_id(year) else {
                warn!(year = %year, "Unknown fiscal year label, skipping layer");
                continue;
            };

            info!(source = self.name(), year = %year, layer_id, "Scraping layer");
            let context = json!({
                "baseUrl": self.base_url,
                "layerId": layer_id,
                "maxPages": MAX_PAGES,
                "settleMs": SETTLE_MS,
            });

            let value = with_retry(
                || async { self.browserless.function(PAGINATION_SCRIPT, &context).await },
                &self.retry,
            )
            .await?;

            let rows: Vec<GridRow> = serde_json::from_value(value)
                .map_err(|e| FetchError::Malformed(format!("grid payload: {e}")))?;
            info!(source = self.name(), year = %year, rows = rows.len(), "Layer scraped");
            all_rows.extend(rows);
        }

        let mut sightings = convert_grid_rows(&all_rows);
        if let Some(cutoff) = opts.cutoff() {
            sightings.retain(|s| s.sighted_at >= cutoff);
        }

        info!(source = self.name(), converted = sightings.len(), "Grid conversion complete");
        Ok(sightings)
    }

    fn name(&self) -> &str {
        "gis-portal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, location: &str) -> GridRow {
        GridRow {
            date: date.to_string(),
            location: location.to_string(),
        }
    }

    #[test]
    fn converts_grid_rows_with_city_extraction() {
        let rows = vec![row("2024/06/15", "福知山市字大呂")];
        let sightings = convert_grid_rows(&rows);
        assert_eq!(sightings.len(), 1);

        let s = &sightings[0];
        assert_eq!(s.prefecture, "京都府");
        assert_eq!(s.city.as_deref(), Some("福知山市"));
        assert_eq!(s.location.as_deref(), Some("福知山市字大呂"));
        assert_eq!(s.latitude, None);
        assert_eq!(s.longitude, None);
        assert_eq!(s.sighted_date().to_string(), "2024-06-15");
        assert_eq!(s.source_url.as_deref(), Some(PORTAL_PERMALINK));
    }

    #[test]
    fn town_and_village_suffixes_are_recognized() {
        let rows = vec![
            row("2024/07/01", "与謝野町岩滝"),
            row("2024/07/02", "南山城村田山"),
        ];
        let sightings = convert_grid_rows(&rows);
        assert_eq!(sightings[0].city.as_deref(), Some("与謝野町"));
        assert_eq!(sightings[1].city.as_deref(), Some("南山城村"));
    }

    #[test]
    fn location_without_city_suffix_keeps_city_empty() {
        let rows = vec![row("2024/07/03", "国有林内")];
        let sightings = convert_grid_rows(&rows);
        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0].city, None);
    }

    #[test]
    fn malformed_dates_are_dropped() {
        let rows = vec![
            row("2024/6/15", "福知山市字大呂"),
            row("令和6年6月15日", "舞鶴市字上安"),
            row("2024/02/30", "宮津市字杉末"),
        ];
        assert!(convert_grid_rows(&rows).is_empty());
    }

    #[test]
    fn repeated_rows_across_pages_collapse() {
        let rows = vec![
            row("2024/06/15", "福知山市字大呂"),
            row("2024/06/15", "福知山市字大呂"),
            row("2024/06/15", "舞鶴市字上安"),
        ];
        assert_eq!(convert_grid_rows(&rows).len(), 2);
    }

    #[test]
    fn layer_ids_cover_configured_years() {
        assert_eq!(GisPortalAdapter::layer_id("R7"), Some("8010"));
        assert_eq!(GisPortalAdapter::layer_id("R3"), Some("7184"));
        assert_eq!(GisPortalAdapter::layer_id("R2"), None);
    }
}
