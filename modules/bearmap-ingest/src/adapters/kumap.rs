//! Kumap community API importer.
//!
//! User-submitted reports from the Kumap (Xenon) map, fetched through
//! [`KumapClient`]. Unlike the official sources these carry structured
//! metadata (kind, animal state, head count) which gets folded into the
//! description text.

use async_trait::async_trait;
use bearmap_common::{
    bear_type_for_prefecture, is_known_prefecture, with_retry, RetryOptions, Sighting,
    SightingStatus, SourceType,
};
use chrono::{DateTime, Duration, Utc};
use kumap_client::{
    Gender, KumapClient, KumapPoint, ListPointsRequest, PointKind, WitnessState,
};
use tracing::{info, warn};

use super::{FetchError, FetchOptions, SourceAdapter};

/// Public map URL for a single point.
const POINT_URL_BASE: &str = "https://kumap-xenon.web.app/map?id=";

const DEFAULT_DAYS_BACK: i64 = 365;

pub struct KumapAdapter {
    client: KumapClient,
    retry: RetryOptions,
}

impl KumapAdapter {
    pub fn new(client: KumapClient) -> Self {
        Self {
            client,
            retry: RetryOptions::default(),
        }
    }
}

fn kind_label(kind: PointKind) -> &'static str {
    match kind {
        PointKind::Witness => "目撃",
        PointKind::Trace => "痕跡",
        PointKind::Injury => "人身被害",
        PointKind::Damage => "物損被害",
    }
}

fn state_label(state: WitnessState) -> &'static str {
    match state {
        WitnessState::Adult => "成獣",
        WitnessState::Cub => "子グマ",
        WitnessState::WithCubs => "子連れ",
    }
}

fn gender_label(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "オス",
        Gender::Female => "メス",
    }
}

/// Convert one API point. Points without a resolvable prefecture, a
/// parsable event time, or plausible coordinates are dropped.
pub fn convert_point(point: &KumapPoint) -> Option<Sighting> {
    let prefecture = point.prefecture.as_deref().unwrap_or_default();
    if !is_known_prefecture(prefecture) {
        warn!(id = %point.id, raw = ?point.prefecture, "Unknown prefecture, skipping point");
        return None;
    }

    let Ok(sighted_at) = DateTime::parse_from_rfc3339(&point.event_time) else {
        warn!(id = %point.id, raw = %point.event_time, "Unparsable event time, skipping point");
        return None;
    };
    let sighted_at = sighted_at.with_timezone(&Utc);

    let (lat, lng) = (point.location.lat, point.location.lng);
    let in_bounds = lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng);
    if !in_bounds {
        warn!(id = %point.id, lat, lng, "Out-of-range coordinates, skipping point");
        return None;
    }

    let mut parts: Vec<String> = vec![kind_label(point.name).to_string()];
    if let Some(extra) = &point.additional_data {
        if let Some(state) = extra.state {
            parts.push(state_label(state).to_string());
        }
        if let Some(gender) = extra.gender {
            parts.push(gender_label(gender).to_string());
        }
        if let Some(count) = extra.count {
            if count > 1 {
                parts.push(format!("頭数: {count}"));
            }
        }
        if let Some(trace) = &extra.trace_kind {
            if !trace.is_empty() {
                parts.push(trace.clone());
            }
        }
    }
    let description = match point.content.as_deref() {
        Some(content) if !content.is_empty() => format!("{} ({})", content, parts.join(", ")),
        _ => parts.join(", "),
    };

    let location = [point.prefecture.clone(), point.city.clone(), point.address.clone()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let location = if location.is_empty() {
        "不明".to_string()
    } else {
        location
    };

    Some(Sighting {
        // Imported data is official regardless of how the upstream
        // collected it; User is reserved for direct submissions.
        source_type: SourceType::Official,
        prefecture: prefecture.to_string(),
        city: point.city.clone().filter(|c| !c.is_empty()),
        location: Some(location),
        latitude: Some(lat.to_string()),
        longitude: Some(lng.to_string()),
        sighted_at,
        bear_type: Some(bear_type_for_prefecture(prefecture).to_string()),
        description: Some(description),
        source_url: Some(format!("{POINT_URL_BASE}{}", point.id)),
        status: SightingStatus::Approved,
    })
}

#[async_trait]
impl SourceAdapter for KumapAdapter {
    async fn fetch_and_convert(&self, opts: &FetchOptions) -> Result<Vec<Sighting>, FetchError> {
        let end = Utc::now();
        let start = end - Duration::days(opts.days_back.unwrap_or(DEFAULT_DAYS_BACK));

        let points = match &opts.prefecture {
            Some(prefecture) => {
                info!(source = self.name(), prefecture = %prefecture, "Fetching points by prefecture");
                with_retry(
                    || async {
                        self.client
                            .fetch_points_by_prefecture(prefecture, ListPointsRequest::default())
                            .await
                    },
                    &self.retry,
                )
                .await?
            }
            None => {
                info!(source = self.name(), %start, %end, "Fetching points by date range");
                with_retry(
                    || async {
                        self.client
                            .fetch_points_by_date_range(start, end, ListPointsRequest::default())
                            .await
                    },
                    &self.retry,
                )
                .await?
            }
        };

        let total = points.len();
        let mut sightings: Vec<Sighting> =
            points.iter().filter_map(convert_point).collect();

        // The prefecture path has no server-side time filter.
        if let Some(cutoff) = opts.cutoff() {
            sightings.retain(|s| s.sighted_at >= cutoff);
        }

        info!(
            source = self.name(),
            fetched = total,
            converted = sightings.len(),
            "Kumap conversion complete"
        );
        Ok(sightings)
    }

    fn name(&self) -> &str {
        "kumap"
    }
}
