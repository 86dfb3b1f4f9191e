//! Canonical sighting record shared by every source adapter and the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where a record came from: scraped/imported official data or a manual
/// user submission. Ingestion only ever produces `Official`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Official,
    User,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Official => "official",
            SourceType::User => "user",
        }
    }
}

/// Moderation status. Ingested official data is written pre-approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SightingStatus {
    Pending,
    Approved,
    Rejected,
}

impl SightingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SightingStatus::Pending => "pending",
            SightingStatus::Approved => "approved",
            SightingStatus::Rejected => "rejected",
        }
    }
}

/// A candidate sighting produced by a source adapter, not yet checked for
/// duplication or persisted. Coordinates are stored decimal-as-string to
/// match the upstream sources, which mix precision wildly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    pub source_type: SourceType,
    pub prefecture: String,
    pub city: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub sighted_at: DateTime<Utc>,
    pub bear_type: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub status: SightingStatus,
}

impl Sighting {
    /// Parsed coordinates, if both are present and valid.
    pub fn coords(&self) -> Option<(f64, f64)> {
        let lat = parse_coordinate(self.latitude.as_deref()?)?;
        let lng = parse_coordinate(self.longitude.as_deref()?)?;
        Some((lat, lng))
    }

    /// Calendar date of the sighting. Time-of-day is ignored for dedup
    /// because upstream sources disagree on precision.
    pub fn sighted_date(&self) -> NaiveDate {
        calendar_date(&self.sighted_at)
    }
}

/// A persisted sighting row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSighting {
    pub id: i64,
    #[serde(flatten)]
    pub sighting: Sighting,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parse a decimal-as-string coordinate, rejecting non-finite values and
/// anything outside global bounds.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || !(-180.0..=180.0).contains(&value) {
        return None;
    }
    Some(value)
}

/// Validate a latitude/longitude pair. Latitude gets the tighter bound.
pub fn validate_coordinates(lat: &str, lng: &str) -> bool {
    match (parse_coordinate(lat), parse_coordinate(lng)) {
        (Some(lat), Some(_)) => (-90.0..=90.0).contains(&lat),
        _ => false,
    }
}

/// Species inference rule shared by the adapters: Hokkaido has brown
/// bears, everywhere else on the archipelago has Asian black bears.
pub fn bear_type_for_prefecture(prefecture: &str) -> &'static str {
    if prefecture == "北海道" {
        "ヒグマ"
    } else {
        "ツキノワグマ"
    }
}

/// Truncate a timestamp to its UTC calendar date.
pub fn calendar_date(at: &DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_coordinate_accepts_valid_values() {
        assert_eq!(parse_coordinate("36.9167"), Some(36.9167));
        assert_eq!(parse_coordinate(" 138.45 "), Some(138.45));
        assert_eq!(parse_coordinate("-89.9"), Some(-89.9));
    }

    #[test]
    fn parse_coordinate_rejects_garbage() {
        assert_eq!(parse_coordinate(""), None);
        assert_eq!(parse_coordinate("abc"), None);
        assert_eq!(parse_coordinate("NaN"), None);
        assert_eq!(parse_coordinate("inf"), None);
        assert_eq!(parse_coordinate("181.0"), None);
        assert_eq!(parse_coordinate("-200"), None);
    }

    #[test]
    fn validate_coordinates_bounds_latitude() {
        assert!(validate_coordinates("43.064", "141.347"));
        assert!(!validate_coordinates("95.0", "141.347"));
        assert!(!validate_coordinates("43.064", "200.0"));
        assert!(!validate_coordinates("", "141.347"));
    }

    #[test]
    fn bear_type_rule() {
        assert_eq!(bear_type_for_prefecture("北海道"), "ヒグマ");
        assert_eq!(bear_type_for_prefecture("長野県"), "ツキノワグマ");
        assert_eq!(bear_type_for_prefecture("秋田県"), "ツキノワグマ");
    }

    #[test]
    fn sighted_date_ignores_time_of_day() {
        let morning = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 1, 15, 23, 0, 0).unwrap();
        assert_eq!(calendar_date(&morning), calendar_date(&night));
    }

    #[test]
    fn sighting_serializes_camel_case() {
        let s = Sighting {
            source_type: SourceType::Official,
            prefecture: "長野県".to_string(),
            city: Some("野沢温泉村".to_string()),
            location: None,
            latitude: Some("36.9167".to_string()),
            longitude: Some("138.45".to_string()),
            sighted_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            bear_type: Some("ツキノワグマ".to_string()),
            description: None,
            source_url: None,
            status: SightingStatus::Approved,
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["sourceType"], "official");
        assert_eq!(json["sightedAt"], "2024-01-15T10:00:00Z");
        assert_eq!(json["status"], "approved");
    }
}
