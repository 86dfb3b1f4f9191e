//! In-memory [`SightingStore`] used by unit and pipeline tests.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bearmap_common::{Sighting, StoredSighting};
use chrono::{DateTime, NaiveDate, Utc};

use crate::store::SightingStore;

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredSighting>>,
    next_id: AtomicI64,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_inserts: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `insert_batch` fail, for error-path tests.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Insert directly with a chosen creation time, bypassing the batch
    /// path. Returns the assigned id.
    pub fn insert_stored(&self, sighting: Sighting, created_at: DateTime<Utc>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(StoredSighting {
            id,
            sighting,
            created_at,
            updated_at: created_at,
        });
        id
    }

    pub fn rows(&self) -> Vec<StoredSighting> {
        self.rows.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SightingStore for MemoryStore {
    async fn insert_batch(&self, batch: &[Sighting]) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            bail!("simulated insert failure");
        }
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        for sighting in batch {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            rows.push(StoredSighting {
                id,
                sighting: sighting.clone(),
                created_at: now,
                updated_at: now,
            });
        }
        Ok(())
    }

    async fn fetch_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        prefecture: Option<&str>,
    ) -> Result<Vec<StoredSighting>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.sighting.sighted_at >= start && r.sighting.sighted_at <= end)
            .filter(|r| prefecture.map_or(true, |p| r.sighting.prefecture == p))
            .cloned()
            .collect())
    }

    async fn fetch_all(&self) -> Result<Vec<StoredSighting>> {
        Ok(self.rows())
    }

    async fn exists_source_url(&self, url: &str) -> Result<bool> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.sighting.source_url.as_deref() == Some(url)))
    }

    async fn exists_location_date(
        &self,
        prefecture: &str,
        city: &str,
        date: NaiveDate,
    ) -> Result<bool> {
        Ok(self.rows.lock().unwrap().iter().any(|r| {
            r.sighting.prefecture == prefecture
                && r.sighting.city.as_deref() == Some(city)
                && r.sighting.sighted_date() == date
        }))
    }

    async fn exists_near(
        &self,
        lat: f64,
        lng: f64,
        epsilon: f64,
        date: NaiveDate,
    ) -> Result<bool> {
        Ok(self.rows.lock().unwrap().iter().any(|r| {
            r.sighting.sighted_date() == date
                && r.sighting.coords().is_some_and(|(rlat, rlng)| {
                    (rlat - lat).abs() < epsilon && (rlng - lng).abs() < epsilon
                })
        }))
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }

    async fn update_source_url(&self, id: i64, url: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.sighting.source_url = Some(url.to_string());
            row.updated_at = Utc::now();
        }
        Ok(())
    }
}
