pub mod adapters;
pub mod coordinator;
pub mod dedup;
pub mod maintenance;
pub mod store;
pub mod testing;

pub use adapters::{FetchError, FetchOptions, SourceAdapter};
pub use coordinator::{Coordinator, IngestReport};
pub use dedup::{DedupConfig, DedupEngine, DedupIndex, DuplicateReason};
pub use maintenance::{
    backfill_prefecture_urls, find_existing_duplicates, remove_duplicates, BackfillReport,
    DuplicatePair, RetentionPolicy,
};
pub use store::{PgStore, SightingStore};
