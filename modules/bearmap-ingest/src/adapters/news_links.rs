//! News-digest link scraper.
//!
//! Parses a single editorial HTML page that lists bear-advisory links per
//! prefecture under `<h2>` headings, and emits one prefecture-level
//! placeholder record per section: centroid coordinates plus a link to
//! the authoritative external map. Manually verified URLs from the
//! curated table beat whatever the heuristic scraped.

use async_trait::async_trait;
use bearmap_common::{
    curated_map_url, is_known_prefecture, prefecture_centroid, with_retry, RetryOptions,
    Sighting, SightingStatus, SourceType,
};
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use super::{FetchError, FetchOptions, SourceAdapter};

const NEWS_DIGEST_URL: &str =
    "https://emg.yahoo.co.jp/notebook/contents/article/bearsummary251114.html";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; BearmapBot/1.0)";

/// Anchor-text fragments that mark a link as a sighting map.
const MAP_KEYWORDS: [&str; 4] = ["出没", "マップ", "地図", "目撃"];

/// A link scraped out of one prefecture's section.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefectureLink {
    pub prefecture: String,
    pub url: String,
    pub text: String,
}

pub struct NewsLinksAdapter {
    client: reqwest::Client,
    url: String,
    retry: RetryOptions,
}

impl NewsLinksAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            url: NEWS_DIGEST_URL.to_string(),
            retry: RetryOptions::default(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Extract per-prefecture links from the digest page. A page whose markup
/// changed underneath us yields zero links, never an error.
pub fn parse_prefecture_links(html: &str, base_url: &str) -> Vec<PrefectureLink> {
    let doc = Html::parse_document(html);
    let h2_sel = match Selector::parse("h2") {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };
    let a_sel = Selector::parse("a").expect("valid selector");
    let base = url::Url::parse(base_url).ok();

    let mut links = Vec::new();

    for heading in doc.select(&h2_sel) {
        let prefecture = heading.text().collect::<String>().trim().to_string();
        if !is_known_prefecture(&prefecture) {
            continue;
        }

        // Anchors between this heading and the next one.
        let mut anchors: Vec<(String, String)> = Vec::new();
        for node in heading.next_siblings() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            if el.value().name() == "h2" {
                break;
            }
            let own: Vec<ElementRef> = if el.value().name() == "a" {
                vec![el]
            } else {
                el.select(&a_sel).collect()
            };
            for a in own {
                let Some(href) = a.value().attr("href") else {
                    continue;
                };
                let resolved = match base.as_ref() {
                    Some(b) => match b.join(href) {
                        Ok(u) => u.to_string(),
                        Err(_) => continue,
                    },
                    None => href.to_string(),
                };
                let text = a.text().collect::<String>().trim().to_string();
                anchors.push((resolved, text));
            }
        }

        let chosen = anchors
            .iter()
            .find(|(_, text)| MAP_KEYWORDS.iter().any(|k| text.contains(k)))
            .or_else(|| anchors.iter().find(|(_, text)| text.contains(&prefecture)));

        if let Some((url, text)) = chosen {
            links.push(PrefectureLink {
                prefecture,
                url: url.clone(),
                text: text.clone(),
            });
        }
    }

    links
}

/// Build placeholder records: one per scraped prefecture link, pinned to
/// the prefecture centroid. These mark "this prefecture has an active
/// advisory map", not an individual sighting, so `sighted_at` is the
/// scrape time.
fn to_sightings(links: Vec<PrefectureLink>) -> Vec<Sighting> {
    let now = Utc::now();
    let mut sightings = Vec::new();

    for link in links {
        let Some((lat, lng)) = prefecture_centroid(&link.prefecture) else {
            warn!(prefecture = %link.prefecture, "No centroid for prefecture, skipping");
            continue;
        };

        let source_url = curated_map_url(&link.prefecture)
            .map(String::from)
            .unwrap_or(link.url);

        sightings.push(Sighting {
            source_type: SourceType::Official,
            prefecture: link.prefecture.clone(),
            city: None,
            location: Some(link.prefecture.clone()),
            latitude: Some(lat.to_string()),
            longitude: Some(lng.to_string()),
            sighted_at: now,
            bear_type: None,
            description: Some(format!("{}の公式情報: {}", link.prefecture, link.text)),
            source_url: Some(source_url),
            status: SightingStatus::Approved,
        });
    }

    sightings
}

#[async_trait]
impl SourceAdapter for NewsLinksAdapter {
    async fn fetch_and_convert(&self, _opts: &FetchOptions) -> Result<Vec<Sighting>, FetchError> {
        let resp = with_retry(
            || async {
                self.client
                    .get(&self.url)
                    .header(reqwest::header::USER_AGENT, USER_AGENT)
                    .send()
                    .await?
                    .error_for_status()
            },
            &self.retry,
        )
        .await?;

        let html = resp.text().await?;
        let links = parse_prefecture_links(&html, &self.url);
        info!(source = self.name(), links = links.len(), "Parsed prefecture links");

        // Placeholder rows carry the scrape time, so every record is
        // inside any lookback window by construction.
        Ok(to_sightings(links))
    }

    fn name(&self) -> &str {
        "news-links"
    }
}
