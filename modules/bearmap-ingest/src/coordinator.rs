//! Batch ingestion pipeline: fetch, deduplicate, persist, report.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bearmap_common::Sighting;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::adapters::{FetchOptions, SourceAdapter};
use crate::dedup::DedupEngine;
use crate::store::SightingStore;

/// Rows per INSERT statement. One failed statement costs at most this
/// many records.
const INSERT_CHUNK: usize = 100;

/// Outcome counters for one source run. Every fetched record lands in
/// exactly one bucket, so `imported + duplicates + errors == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub total: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {}, imported {}, duplicates {}, errors {}",
            self.total, self.imported, self.duplicates, self.errors
        )
    }
}

/// Runs one adapter end to end. With no store configured the pipeline
/// degrades to a JSON file sink so a scrape is never thrown away.
pub struct Coordinator {
    store: Option<Arc<dyn SightingStore>>,
    dedup: DedupEngine,
    data_dir: PathBuf,
}

impl Coordinator {
    pub fn new(
        store: Option<Arc<dyn SightingStore>>,
        dedup: DedupEngine,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            dedup,
            data_dir: data_dir.into(),
        }
    }

    pub async fn run(
        &self,
        adapter: &dyn SourceAdapter,
        opts: &FetchOptions,
    ) -> Result<IngestReport> {
        info!(source = adapter.name(), dry_run = opts.dry_run, "Starting ingestion");

        let batch = adapter
            .fetch_and_convert(opts)
            .await
            .with_context(|| format!("fetching from {}", adapter.name()))?;
        let total = batch.len();
        info!(source = adapter.name(), fetched = total, "Fetch complete");

        let Some(store) = &self.store else {
            return self.sink_to_file(adapter.name(), &batch, opts.dry_run).await;
        };

        let verdicts = self.dedup.check_batch(store.as_ref(), &batch).await?;
        let mut fresh: Vec<Sighting> = Vec::new();
        let mut duplicates = 0usize;
        for (sighting, verdict) in batch.into_iter().zip(&verdicts) {
            match verdict {
                Some(reason) => {
                    duplicates += 1;
                    tracing::debug!(source = adapter.name(), %reason, "Skipping duplicate");
                }
                None => fresh.push(sighting),
            }
        }

        let mut imported = 0usize;
        let mut errors = 0usize;
        if opts.dry_run {
            imported = fresh.len();
            info!(source = adapter.name(), would_import = imported, "Dry run, nothing persisted");
        } else {
            for chunk in fresh.chunks(INSERT_CHUNK) {
                match store.insert_batch(chunk).await {
                    Ok(()) => imported += chunk.len(),
                    Err(e) => {
                        errors += chunk.len();
                        error!(source = adapter.name(), error = %e, lost = chunk.len(), "Chunk insert failed");
                    }
                }
            }
        }

        let report = IngestReport {
            total,
            imported,
            duplicates,
            errors,
        };
        debug_assert_eq!(report.imported + report.duplicates + report.errors, report.total);
        info!(source = adapter.name(), %report, "Ingestion finished");
        Ok(report)
    }

    /// Degraded mode: write the raw batch to `data/<source>_sightings_<ts>.json`.
    async fn sink_to_file(
        &self,
        source: &str,
        batch: &[Sighting],
        dry_run: bool,
    ) -> Result<IngestReport> {
        warn!(source, "No database configured, writing to file sink");

        if !dry_run {
            tokio::fs::create_dir_all(&self.data_dir)
                .await
                .with_context(|| format!("creating {}", self.data_dir.display()))?;
            let path = self.data_dir.join(format!(
                "{source}_sightings_{}.json",
                Utc::now().timestamp_millis()
            ));
            let body = serde_json::to_vec_pretty(batch)?;
            tokio::fs::write(&path, body)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(source, path = %path.display(), records = batch.len(), "File sink written");
        }

        // No store means no dedup; everything counts as imported.
        Ok(IngestReport {
            total: batch.len(),
            imported: batch.len(),
            duplicates: 0,
            errors: 0,
        })
    }
}
