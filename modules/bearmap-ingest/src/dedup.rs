//! Duplicate detection.
//!
//! Three rules, checked in order; the first hit wins:
//! 1. identical source URL;
//! 2. same prefecture, same city, same calendar date;
//! 3. both coordinates within the epsilon (roughly 1 km at these
//!    latitudes) on the same calendar date.
//!
//! Rule 2 only fires when the candidate has a city; prefecture-wide
//! placeholder rows must never swallow each other. Time-of-day is
//! ignored throughout.

use std::collections::{HashMap, HashSet};
use std::fmt;

use anyhow::Result;
use bearmap_common::{Sighting, StoredSighting};
use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::store::SightingStore;

#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Coordinate tolerance for the proximity rule, in degrees.
    pub coord_epsilon_deg: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            coord_epsilon_deg: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    SourceUrl,
    LocationDate,
    Proximity,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::SourceUrl => write!(f, "same source URL"),
            DuplicateReason::LocationDate => write!(f, "same city and date"),
            DuplicateReason::Proximity => write!(f, "nearby coordinates on same date"),
        }
    }
}

/// In-memory duplicate index over a window of existing rows, used for
/// batch checks so one ingestion run issues a single window query
/// instead of three lookups per candidate.
///
/// The spatial part is a degree grid with cell size equal to the
/// epsilon; a candidate probes its own cell plus the eight neighbors
/// and then compares exact deltas, so the grid never widens or narrows
/// the rule.
pub struct DedupIndex {
    config: DedupConfig,
    source_urls: HashSet<String>,
    by_location: HashMap<String, HashSet<NaiveDate>>,
    by_cell: HashMap<(i64, i64), Vec<(f64, f64, NaiveDate)>>,
}

fn location_key(prefecture: &str, city: &str) -> String {
    format!("{prefecture}|{city}")
}

impl DedupIndex {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            source_urls: HashSet::new(),
            by_location: HashMap::new(),
            by_cell: HashMap::new(),
        }
    }

    pub fn build(existing: &[StoredSighting], config: DedupConfig) -> Self {
        let mut index = Self::new(config);
        for stored in existing {
            index.insert(&stored.sighting);
        }
        index
    }

    fn cell(&self, lat: f64, lng: f64) -> (i64, i64) {
        let eps = self.config.coord_epsilon_deg;
        ((lat / eps).floor() as i64, (lng / eps).floor() as i64)
    }

    /// Register a record so later candidates are checked against it.
    pub fn insert(&mut self, s: &Sighting) {
        if let Some(url) = &s.source_url {
            self.source_urls.insert(url.clone());
        }
        if let Some(city) = &s.city {
            self.by_location
                .entry(location_key(&s.prefecture, city))
                .or_default()
                .insert(s.sighted_date());
        }
        if let Some((lat, lng)) = s.coords() {
            self.by_cell
                .entry(self.cell(lat, lng))
                .or_default()
                .push((lat, lng, s.sighted_date()));
        }
    }

    /// First matching rule, or `None` when the candidate is new.
    pub fn check(&self, s: &Sighting) -> Option<DuplicateReason> {
        if let Some(url) = &s.source_url {
            if self.source_urls.contains(url) {
                return Some(DuplicateReason::SourceUrl);
            }
        }

        if let Some(city) = &s.city {
            if let Some(dates) = self.by_location.get(&location_key(&s.prefecture, city)) {
                if dates.contains(&s.sighted_date()) {
                    return Some(DuplicateReason::LocationDate);
                }
            }
        }

        if let Some((lat, lng)) = s.coords() {
            let eps = self.config.coord_epsilon_deg;
            let date = s.sighted_date();
            let (row, col) = self.cell(lat, lng);
            for dr in -1..=1 {
                for dc in -1..=1 {
                    let Some(points) = self.by_cell.get(&(row + dr, col + dc)) else {
                        continue;
                    };
                    for (plat, plng, pdate) in points {
                        if *pdate == date
                            && (plat - lat).abs() < eps
                            && (plng - lng).abs() < eps
                        {
                            return Some(DuplicateReason::Proximity);
                        }
                    }
                }
            }
        }

        None
    }
}

/// Store-backed duplicate checks, single-record and batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupEngine {
    config: DedupConfig,
}

impl DedupEngine {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> DedupConfig {
        self.config
    }

    /// Check one candidate against the whole store.
    pub async fn is_duplicate(
        &self,
        store: &dyn SightingStore,
        s: &Sighting,
    ) -> Result<Option<DuplicateReason>> {
        if let Some(url) = &s.source_url {
            if store.exists_source_url(url).await? {
                return Ok(Some(DuplicateReason::SourceUrl));
            }
        }

        if let Some(city) = &s.city {
            if store
                .exists_location_date(&s.prefecture, city, s.sighted_date())
                .await?
            {
                return Ok(Some(DuplicateReason::LocationDate));
            }
        }

        if let Some((lat, lng)) = s.coords() {
            if store
                .exists_near(lat, lng, self.config.coord_epsilon_deg, s.sighted_date())
                .await?
            {
                return Ok(Some(DuplicateReason::Proximity));
            }
        }

        Ok(None)
    }

    /// Classify a whole batch against the store with one window query.
    /// The window is the batch's `sighted_at` span padded by a day on
    /// each side, covering timezone skew around date boundaries.
    ///
    /// Accepted candidates join the index as they pass, so copies inside
    /// the batch itself collapse too. Returns one entry per candidate,
    /// aligned by position.
    pub async fn check_batch(
        &self,
        store: &dyn SightingStore,
        batch: &[Sighting],
    ) -> Result<Vec<Option<DuplicateReason>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let min = batch.iter().map(|s| s.sighted_at).min().expect("non-empty");
        let max = batch.iter().map(|s| s.sighted_at).max().expect("non-empty");
        let existing = store
            .fetch_between(min - Duration::days(1), max + Duration::days(1), None)
            .await?;
        debug!(window_rows = existing.len(), batch = batch.len(), "Built dedup window");

        let mut index = DedupIndex::build(&existing, self.config);
        let mut verdicts = Vec::with_capacity(batch.len());
        for s in batch {
            let verdict = index.check(s);
            if verdict.is_none() {
                index.insert(s);
            }
            verdicts.push(verdict);
        }
        Ok(verdicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearmap_common::{SightingStatus, SourceType};
    use chrono::{TimeZone, Utc};

    fn sighting(
        city: Option<&str>,
        lat: Option<&str>,
        lng: Option<&str>,
        url: Option<&str>,
        day: u32,
    ) -> Sighting {
        Sighting {
            source_type: SourceType::Official,
            prefecture: "長野県".to_string(),
            city: city.map(String::from),
            location: None,
            latitude: lat.map(String::from),
            longitude: lng.map(String::from),
            sighted_at: Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap(),
            bear_type: None,
            description: None,
            source_url: url.map(String::from),
            status: SightingStatus::Approved,
        }
    }

    fn stored(s: Sighting, id: i64) -> StoredSighting {
        let now = Utc::now();
        StoredSighting {
            id,
            sighting: s,
            created_at: now,
            updated_at: now,
        }
    }

    fn index_with(existing: Vec<Sighting>) -> DedupIndex {
        let rows: Vec<StoredSighting> = existing
            .into_iter()
            .enumerate()
            .map(|(i, s)| stored(s, i as i64 + 1))
            .collect();
        DedupIndex::build(&rows, DedupConfig::default())
    }

    #[test]
    fn identical_source_url_is_duplicate() {
        let index = index_with(vec![sighting(None, None, None, Some("https://a.example/1"), 15)]);
        // Different date, different everything, same URL.
        let candidate = sighting(Some("松本市"), None, None, Some("https://a.example/1"), 20);
        assert_eq!(index.check(&candidate), Some(DuplicateReason::SourceUrl));
    }

    #[test]
    fn same_city_and_date_is_duplicate() {
        let index = index_with(vec![sighting(Some("野沢温泉村"), None, None, None, 15)]);
        let candidate = sighting(Some("野沢温泉村"), None, None, None, 15);
        assert_eq!(index.check(&candidate), Some(DuplicateReason::LocationDate));
    }

    #[test]
    fn same_city_different_date_is_new() {
        let index = index_with(vec![sighting(Some("野沢温泉村"), None, None, None, 15)]);
        let candidate = sighting(Some("野沢温泉村"), None, None, None, 16);
        assert_eq!(index.check(&candidate), None);
    }

    #[test]
    fn missing_city_never_matches_location_rule() {
        // Two prefecture-level placeholders on the same date coexist.
        let index = index_with(vec![sighting(None, None, None, None, 15)]);
        let candidate = sighting(None, None, None, None, 15);
        assert_eq!(index.check(&candidate), None);
    }

    #[test]
    fn nearby_coordinates_on_same_date_are_duplicate() {
        let index = index_with(vec![sighting(
            Some("野沢温泉村"),
            Some("36.9167"),
            Some("138.4500"),
            None,
            15,
        )]);
        // ~0.003/0.005 degrees away, different city label.
        let candidate = sighting(Some("木島平村"), Some("36.9200"), Some("138.4550"), None, 15);
        assert_eq!(index.check(&candidate), Some(DuplicateReason::Proximity));
    }

    #[test]
    fn distant_coordinates_are_new() {
        let index = index_with(vec![sighting(
            Some("野沢温泉村"),
            Some("36.9167"),
            Some("138.4500"),
            None,
            15,
        )]);
        let candidate = sighting(Some("飯山市"), Some("36.8000"), Some("138.3000"), None, 15);
        assert_eq!(index.check(&candidate), None);
    }

    #[test]
    fn nearby_coordinates_on_different_dates_are_new() {
        let index = index_with(vec![sighting(
            Some("野沢温泉村"),
            Some("36.9167"),
            Some("138.4500"),
            None,
            15,
        )]);
        let candidate = sighting(Some("木島平村"), Some("36.9200"), Some("138.4550"), None, 16);
        assert_eq!(index.check(&candidate), None);
    }

    #[test]
    fn proximity_matches_across_cell_boundaries() {
        // 0.00999 and 0.01001 land in adjacent grid cells but are only
        // 0.00002 degrees apart.
        let index = index_with(vec![sighting(None, Some("36.00999"), Some("138.00999"), None, 15)]);
        let candidate = sighting(None, Some("36.01001"), Some("138.01001"), None, 15);
        assert_eq!(index.check(&candidate), Some(DuplicateReason::Proximity));
    }

    #[test]
    fn epsilon_is_exclusive() {
        let index = index_with(vec![sighting(None, Some("36.9000"), Some("138.4000"), None, 15)]);
        // Exactly epsilon away on both axes.
        let candidate = sighting(None, Some("36.9100"), Some("138.4100"), None, 15);
        assert_eq!(index.check(&candidate), None);
    }

    #[test]
    fn url_rule_wins_over_location_rule() {
        let index = index_with(vec![sighting(
            Some("野沢温泉村"),
            None,
            None,
            Some("https://a.example/1"),
            15,
        )]);
        let candidate = sighting(
            Some("野沢温泉村"),
            None,
            None,
            Some("https://a.example/1"),
            15,
        );
        assert_eq!(index.check(&candidate), Some(DuplicateReason::SourceUrl));
    }

    mod store_backed {
        use super::*;
        use crate::testing::MemoryStore;

        fn store_with(existing: Vec<Sighting>) -> MemoryStore {
            let store = MemoryStore::new();
            for s in existing {
                store.insert_stored(s, Utc::now());
            }
            store
        }

        #[tokio::test]
        async fn url_rule_hits_through_the_store() {
            let store = store_with(vec![sighting(None, None, None, Some("https://a.example/1"), 15)]);
            let engine = DedupEngine::new(DedupConfig::default());

            let candidate = sighting(Some("松本市"), None, None, Some("https://a.example/1"), 20);
            let verdict = engine.is_duplicate(&store, &candidate).await.unwrap();
            assert_eq!(verdict, Some(DuplicateReason::SourceUrl));
        }

        #[tokio::test]
        async fn location_rule_hits_through_the_store() {
            let store = store_with(vec![sighting(Some("野沢温泉村"), None, None, None, 15)]);
            let engine = DedupEngine::new(DedupConfig::default());

            let same_day = sighting(Some("野沢温泉村"), None, None, None, 15);
            assert_eq!(
                engine.is_duplicate(&store, &same_day).await.unwrap(),
                Some(DuplicateReason::LocationDate)
            );

            let next_day = sighting(Some("野沢温泉村"), None, None, None, 16);
            assert_eq!(engine.is_duplicate(&store, &next_day).await.unwrap(), None);
        }

        #[tokio::test]
        async fn proximity_rule_hits_through_the_store() {
            let store = store_with(vec![sighting(
                Some("野沢温泉村"),
                Some("36.9167"),
                Some("138.4500"),
                None,
                15,
            )]);
            let engine = DedupEngine::new(DedupConfig::default());

            let nearby = sighting(Some("木島平村"), Some("36.9200"), Some("138.4550"), None, 15);
            assert_eq!(
                engine.is_duplicate(&store, &nearby).await.unwrap(),
                Some(DuplicateReason::Proximity)
            );

            let distant = sighting(Some("飯山市"), Some("36.8000"), Some("138.3000"), None, 15);
            assert_eq!(engine.is_duplicate(&store, &distant).await.unwrap(), None);
        }

        #[tokio::test]
        async fn fresh_record_passes_all_rules() {
            let store = store_with(vec![sighting(
                Some("野沢温泉村"),
                Some("36.9167"),
                Some("138.4500"),
                Some("https://a.example/1"),
                15,
            )]);
            let engine = DedupEngine::new(DedupConfig::default());

            let fresh = sighting(
                Some("松本市"),
                Some("36.2380"),
                Some("137.9720"),
                Some("https://a.example/2"),
                15,
            );
            assert_eq!(engine.is_duplicate(&store, &fresh).await.unwrap(), None);
        }
    }

    #[test]
    fn in_batch_copies_collapse_through_insert() {
        let mut index = index_with(vec![]);
        let first = sighting(Some("野沢温泉村"), None, None, None, 15);
        assert_eq!(index.check(&first), None);
        index.insert(&first);

        let copy = sighting(Some("野沢温泉村"), None, None, None, 15);
        assert_eq!(index.check(&copy), Some(DuplicateReason::LocationDate));
    }
}
