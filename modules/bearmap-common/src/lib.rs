pub mod config;
pub mod prefectures;
pub mod retry;
pub mod types;

pub use config::Config;
pub use prefectures::{
    curated_map_url, is_known_prefecture, prefecture_centroid, PREFECTURES,
};
pub use retry::{fetch_with_retry, is_retryable, is_retryable_status, with_retry, RetryOptions};
pub use types::{
    bear_type_for_prefecture, calendar_date, parse_coordinate, validate_coordinates, Sighting,
    SightingStatus, SourceType, StoredSighting,
};
