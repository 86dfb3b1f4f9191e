//! Source adapters. Each one converts a foreign upstream shape into
//! canonical [`Sighting`] candidates; persistence belongs to the
//! coordinator, never to an adapter.

pub mod gis_portal;
pub mod kumadas_csv;
pub mod kumap;
pub mod news_links;
pub mod pdf_report;

pub use gis_portal::GisPortalAdapter;
pub use kumadas_csv::KumadasCsvAdapter;
pub use kumap::KumapAdapter;
pub use news_links::NewsLinksAdapter;
pub use pdf_report::PdfReportAdapter;

use async_trait::async_trait;
use bearmap_common::Sighting;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Options shared by every source run.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Lookback window; candidates older than `now - days_back` are
    /// filtered out by the adapter itself.
    pub days_back: Option<i64>,
    /// Restrict to one prefecture where the source supports it.
    pub prefecture: Option<String>,
    /// Skip persistence; counters report what would have been imported.
    pub dry_run: bool,
}

impl FetchOptions {
    pub fn with_days_back(mut self, days: i64) -> Self {
        self.days_back = Some(days);
        self
    }

    pub fn with_prefecture(mut self, prefecture: impl Into<String>) -> Self {
        self.prefecture = Some(prefecture.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Oldest acceptable `sighted_at`, if a lookback window is set.
    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.days_back.map(|d| Utc::now() - Duration::days(d))
    }
}

/// Whole-source fetch failures. A single bad record inside a batch is
/// logged and skipped instead of surfacing here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Browser session failed: {0}")]
    Browser(#[from] browserless_client::BrowserlessError),

    #[error("Kumap API error: {0}")]
    Api(#[from] kumap_client::KumapError),

    #[error("Malformed upstream payload: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(err.to_string())
    }
}

/// One upstream origin of sighting data. Implementations own their
/// idiosyncratic parsing; the coordinator stays source-agnostic.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch from the upstream and convert to candidate records, already
    /// filtered by the lookback window. Records whose required fields
    /// cannot be derived are dropped, not emitted half-empty.
    async fn fetch_and_convert(&self, opts: &FetchOptions) -> Result<Vec<Sighting>, FetchError>;

    /// Source name for logging and file-sink naming.
    fn name(&self) -> &str;
}
