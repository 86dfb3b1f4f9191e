//! Offline cleanup jobs: duplicate sweeps over already-persisted rows
//! and source-URL backfill for prefecture placeholder records.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use bearmap_common::{curated_map_url, prefecture_centroid, SourceType, StoredSighting};
use tracing::info;

use crate::dedup::{DedupConfig, DuplicateReason};
use crate::store::SightingStore;

/// Two persisted rows judged to be the same sighting. `older_id` is the
/// row with the earlier `created_at` (lower id on ties).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatePair {
    pub older_id: i64,
    pub newer_id: i64,
    pub reason: DuplicateReason,
}

/// Which side of each pair survives a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Keep the earlier insert; re-scrapes lose to the first import.
    #[default]
    KeepOldest,
    KeepNewest,
}

fn pair_reason(a: &StoredSighting, b: &StoredSighting, config: &DedupConfig) -> Option<DuplicateReason> {
    // URL equality holds regardless of date; a re-scrape of the same
    // article may carry a corrected date.
    if let (Some(ua), Some(ub)) = (&a.sighting.source_url, &b.sighting.source_url) {
        if ua == ub {
            return Some(DuplicateReason::SourceUrl);
        }
    }

    if a.sighting.sighted_date() != b.sighting.sighted_date() {
        return None;
    }

    if a.sighting.prefecture == b.sighting.prefecture {
        if let (Some(ca), Some(cb)) = (&a.sighting.city, &b.sighting.city) {
            if ca == cb {
                return Some(DuplicateReason::LocationDate);
            }
        }
    }

    if let (Some((lat_a, lng_a)), Some((lat_b, lng_b))) = (a.sighting.coords(), b.sighting.coords())
    {
        let eps = config.coord_epsilon_deg;
        if (lat_a - lat_b).abs() < eps && (lng_a - lng_b).abs() < eps {
            return Some(DuplicateReason::Proximity);
        }
    }

    None
}

/// Pairwise duplicate scan over a set of persisted rows.
pub fn find_duplicate_pairs(rows: &[StoredSighting], config: &DedupConfig) -> Vec<DuplicatePair> {
    let mut pairs = Vec::new();
    for (i, a) in rows.iter().enumerate() {
        for b in &rows[i + 1..] {
            let Some(reason) = pair_reason(a, b, config) else {
                continue;
            };
            let (older, newer) = if (a.created_at, a.id) <= (b.created_at, b.id) {
                (a, b)
            } else {
                (b, a)
            };
            pairs.push(DuplicatePair {
                older_id: older.id,
                newer_id: newer.id,
                reason,
            });
        }
    }
    pairs
}

/// Scan the whole store for duplicate pairs without deleting anything.
pub async fn find_existing_duplicates(
    store: &dyn SightingStore,
    config: &DedupConfig,
) -> Result<Vec<DuplicatePair>> {
    let rows = store.fetch_all().await?;
    let pairs = find_duplicate_pairs(&rows, config);
    info!(rows = rows.len(), pairs = pairs.len(), "Duplicate scan complete");
    Ok(pairs)
}

/// Delete one side of each pair per the retention policy. A row already
/// deleted through an earlier pair is skipped, so chains of three or
/// more duplicates keep exactly one survivor. Returns the number of
/// rows removed.
pub async fn remove_duplicates(
    store: &dyn SightingStore,
    pairs: &[DuplicatePair],
    policy: RetentionPolicy,
) -> Result<usize> {
    let mut removed_ids: HashSet<i64> = HashSet::new();
    let mut removed = 0usize;

    for pair in pairs {
        if removed_ids.contains(&pair.older_id) || removed_ids.contains(&pair.newer_id) {
            continue;
        }
        let loser = match policy {
            RetentionPolicy::KeepOldest => pair.newer_id,
            RetentionPolicy::KeepNewest => pair.older_id,
        };
        if store.delete_by_id(loser).await? {
            removed_ids.insert(loser);
            removed += 1;
            info!(id = loser, reason = %pair.reason, "Removed duplicate row");
        }
    }

    info!(removed, "Duplicate removal complete");
    Ok(removed)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub updated: usize,
    pub skipped: usize,
}

/// Point prefecture placeholder rows at the curated map URLs.
///
/// Placeholders are recognized by their centroid coordinates; real
/// sightings never sit exactly on a prefectural office.
pub async fn backfill_prefecture_urls(store: &dyn SightingStore) -> Result<BackfillReport> {
    let rows = store.fetch_all().await?;
    let centroids: HashMap<&str, (&str, &str)> = rows
        .iter()
        .filter_map(|r| {
            prefecture_centroid(&r.sighting.prefecture)
                .map(|c| (r.sighting.prefecture.as_str(), c))
        })
        .collect();

    let mut report = BackfillReport::default();
    for row in &rows {
        if row.sighting.source_type != SourceType::Official {
            continue;
        }
        let Some((lat, lng)) = centroids.get(row.sighting.prefecture.as_str()) else {
            continue;
        };
        let is_placeholder = row.sighting.latitude.as_deref() == Some(lat)
            && row.sighting.longitude.as_deref() == Some(lng);
        if !is_placeholder {
            continue;
        }

        let Some(curated) = curated_map_url(&row.sighting.prefecture) else {
            report.skipped += 1;
            continue;
        };
        if row.sighting.source_url.as_deref() == Some(curated) {
            report.skipped += 1;
            continue;
        }

        store.update_source_url(row.id, curated).await?;
        report.updated += 1;
    }

    info!(updated = report.updated, skipped = report.skipped, "URL backfill complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use bearmap_common::{Sighting, SightingStatus};
    use chrono::{TimeZone, Utc};

    fn sighting(city: Option<&str>, url: Option<&str>, day: u32) -> Sighting {
        Sighting {
            source_type: SourceType::Official,
            prefecture: "長野県".to_string(),
            city: city.map(String::from),
            location: None,
            latitude: None,
            longitude: None,
            sighted_at: Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
            bear_type: None,
            description: None,
            source_url: url.map(String::from),
            status: SightingStatus::Approved,
        }
    }

    fn created(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn url_pairs_match_across_dates() {
        let store = MemoryStore::new();
        let a = store.insert_stored(sighting(None, Some("https://x.example/1"), 10), created(1));
        let b = store.insert_stored(sighting(None, Some("https://x.example/1"), 12), created(2));

        let pairs = find_duplicate_pairs(&store.rows(), &DedupConfig::default());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].older_id, a);
        assert_eq!(pairs[0].newer_id, b);
        assert_eq!(pairs[0].reason, DuplicateReason::SourceUrl);
    }

    #[test]
    fn city_pairs_require_matching_date() {
        let store = MemoryStore::new();
        store.insert_stored(sighting(Some("松本市"), None, 10), created(1));
        store.insert_stored(sighting(Some("松本市"), None, 10), created(2));
        store.insert_stored(sighting(Some("松本市"), None, 11), created(3));

        let pairs = find_duplicate_pairs(&store.rows(), &DedupConfig::default());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].reason, DuplicateReason::LocationDate);
    }

    #[tokio::test]
    async fn keep_oldest_removes_the_newer_row() {
        let store = MemoryStore::new();
        let a = store.insert_stored(sighting(Some("松本市"), None, 10), created(1));
        let b = store.insert_stored(sighting(Some("松本市"), None, 10), created(2));

        let pairs = find_existing_duplicates(&store, &DedupConfig::default())
            .await
            .unwrap();
        let removed = remove_duplicates(&store, &pairs, RetentionPolicy::KeepOldest)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, a);
        assert!(rows.iter().all(|r| r.id != b));
    }

    #[tokio::test]
    async fn keep_newest_removes_the_older_row() {
        let store = MemoryStore::new();
        let a = store.insert_stored(sighting(Some("松本市"), None, 10), created(1));
        let b = store.insert_stored(sighting(Some("松本市"), None, 10), created(2));

        let pairs = find_existing_duplicates(&store, &DedupConfig::default())
            .await
            .unwrap();
        remove_duplicates(&store, &pairs, RetentionPolicy::KeepNewest)
            .await
            .unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, b);
        assert!(rows.iter().all(|r| r.id != a));
    }

    #[tokio::test]
    async fn duplicate_chain_keeps_one_survivor() {
        let store = MemoryStore::new();
        let a = store.insert_stored(sighting(Some("松本市"), None, 10), created(1));
        store.insert_stored(sighting(Some("松本市"), None, 10), created(2));
        store.insert_stored(sighting(Some("松本市"), None, 10), created(3));

        let pairs = find_existing_duplicates(&store, &DedupConfig::default())
            .await
            .unwrap();
        let removed = remove_duplicates(&store, &pairs, RetentionPolicy::KeepOldest)
            .await
            .unwrap();

        assert_eq!(removed, 2);
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, a);
    }

    #[tokio::test]
    async fn backfill_updates_placeholder_rows_only() {
        let store = MemoryStore::new();

        // Placeholder row for Akita: centroid coords, scraped URL.
        let mut placeholder = sighting(None, Some("https://scraped.example/akita"), 10);
        placeholder.prefecture = "秋田県".to_string();
        placeholder.latitude = Some("39.719".to_string());
        placeholder.longitude = Some("140.103".to_string());
        let placeholder_id = store.insert_stored(placeholder, created(1));

        // Real sighting in the same prefecture; must stay untouched.
        let mut real = sighting(Some("北秋田市"), Some("https://kumadas.net/?id=9"), 10);
        real.prefecture = "秋田県".to_string();
        real.latitude = Some("40.1234".to_string());
        real.longitude = Some("140.5678".to_string());
        let real_id = store.insert_stored(real, created(2));

        let report = backfill_prefecture_urls(&store).await.unwrap();
        assert_eq!(report.updated, 1);

        let rows = store.rows();
        let placeholder_row = rows.iter().find(|r| r.id == placeholder_id).unwrap();
        assert_eq!(
            placeholder_row.sighting.source_url.as_deref(),
            Some("https://kumadas.net/")
        );
        let real_row = rows.iter().find(|r| r.id == real_id).unwrap();
        assert_eq!(
            real_row.sighting.source_url.as_deref(),
            Some("https://kumadas.net/?id=9")
        );
    }

    #[tokio::test]
    async fn backfill_skips_rows_already_curated() {
        let store = MemoryStore::new();
        let mut placeholder = sighting(None, Some("https://kumadas.net/"), 10);
        placeholder.prefecture = "秋田県".to_string();
        placeholder.latitude = Some("39.719".to_string());
        placeholder.longitude = Some("140.103".to_string());
        store.insert_stored(placeholder, created(1));

        let report = backfill_prefecture_urls(&store).await.unwrap();
        assert_eq!(report.updated, 0);
        assert_eq!(report.skipped, 1);
    }
}
