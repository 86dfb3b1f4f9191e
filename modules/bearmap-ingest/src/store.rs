//! Persistence behind a trait so the pipeline tests run in memory.

use anyhow::Result;
use async_trait::async_trait;
use bearmap_common::{Sighting, SightingStatus, SourceType, StoredSighting};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Everything the coordinator and maintenance jobs need from storage.
#[async_trait]
pub trait SightingStore: Send + Sync {
    async fn insert_batch(&self, batch: &[Sighting]) -> Result<()>;

    /// Rows whose `sighted_at` falls inside `[start, end]`, optionally
    /// narrowed to one prefecture.
    async fn fetch_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        prefecture: Option<&str>,
    ) -> Result<Vec<StoredSighting>>;

    async fn fetch_all(&self) -> Result<Vec<StoredSighting>>;

    async fn exists_source_url(&self, url: &str) -> Result<bool>;

    async fn exists_location_date(
        &self,
        prefecture: &str,
        city: &str,
        date: NaiveDate,
    ) -> Result<bool>;

    /// Any row on `date` with both coordinates strictly within `epsilon`
    /// degrees of the given point.
    async fn exists_near(&self, lat: f64, lng: f64, epsilon: f64, date: NaiveDate)
        -> Result<bool>;

    /// Returns whether a row was actually removed.
    async fn delete_by_id(&self, id: i64) -> Result<bool>;

    async fn update_source_url(&self, id: i64, url: &str) -> Result<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct SightingRow {
    id: i64,
    source_type: String,
    prefecture: String,
    city: Option<String>,
    location: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    sighted_at: DateTime<Utc>,
    bear_type: Option<String>,
    description: Option<String>,
    source_url: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_source_type(raw: &str) -> SourceType {
    match raw {
        "user" => SourceType::User,
        _ => SourceType::Official,
    }
}

fn parse_status(raw: &str) -> SightingStatus {
    match raw {
        "pending" => SightingStatus::Pending,
        "rejected" => SightingStatus::Rejected,
        _ => SightingStatus::Approved,
    }
}

impl From<SightingRow> for StoredSighting {
    fn from(row: SightingRow) -> Self {
        StoredSighting {
            id: row.id,
            sighting: Sighting {
                source_type: parse_source_type(&row.source_type),
                prefecture: row.prefecture,
                city: row.city,
                location: row.location,
                latitude: row.latitude,
                longitude: row.longitude,
                sighted_at: row.sighted_at,
                bear_type: row.bear_type,
                description: row.description,
                source_url: row.source_url,
                status: parse_status(&row.status),
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, source_type, prefecture, city, location, latitude, longitude, \
     sighted_at, bear_type, description, source_url, status, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema setup. Coordinates stay VARCHAR to preserve
    /// whatever precision the upstream emitted.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sightings (
                id BIGSERIAL PRIMARY KEY,
                source_type TEXT NOT NULL,
                prefecture TEXT NOT NULL,
                city TEXT,
                location TEXT,
                latitude VARCHAR(32),
                longitude VARCHAR(32),
                sighted_at TIMESTAMPTZ NOT NULL,
                bear_type TEXT,
                description TEXT,
                source_url TEXT,
                status TEXT NOT NULL DEFAULT 'approved',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sightings_sighted_at ON sightings (sighted_at)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sightings_prefecture ON sightings (prefecture)")
            .execute(&self.pool)
            .await?;

        info!("Schema ready");
        Ok(())
    }
}

#[async_trait]
impl SightingStore for PgStore {
    async fn insert_batch(&self, batch: &[Sighting]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO sightings (source_type, prefecture, city, location, latitude, \
             longitude, sighted_at, bear_type, description, source_url, status) ",
        );
        qb.push_values(batch, |mut b, s| {
            b.push_bind(s.source_type.as_str())
                .push_bind(&s.prefecture)
                .push_bind(&s.city)
                .push_bind(&s.location)
                .push_bind(&s.latitude)
                .push_bind(&s.longitude)
                .push_bind(s.sighted_at)
                .push_bind(&s.bear_type)
                .push_bind(&s.description)
                .push_bind(&s.source_url)
                .push_bind(s.status.as_str());
        });
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        prefecture: Option<&str>,
    ) -> Result<Vec<StoredSighting>> {
        let rows: Vec<SightingRow> = match prefecture {
            Some(prefecture) => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM sightings \
                     WHERE sighted_at BETWEEN $1 AND $2 AND prefecture = $3"
                ))
                .bind(start)
                .bind(end)
                .bind(prefecture)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM sightings WHERE sighted_at BETWEEN $1 AND $2"
                ))
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_all(&self) -> Result<Vec<StoredSighting>> {
        let rows: Vec<SightingRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM sightings ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn exists_source_url(&self, url: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sightings WHERE source_url = $1)")
                .bind(url)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn exists_location_date(
        &self,
        prefecture: &str,
        city: &str,
        date: NaiveDate,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sightings \
             WHERE prefecture = $1 AND city = $2 AND sighted_at::date = $3)",
        )
        .bind(prefecture)
        .bind(city)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn exists_near(
        &self,
        lat: f64,
        lng: f64,
        epsilon: f64,
        date: NaiveDate,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sightings \
             WHERE latitude IS NOT NULL AND longitude IS NOT NULL \
               AND ABS(latitude::double precision - $1) < $3 \
               AND ABS(longitude::double precision - $2) < $3 \
               AND sighted_at::date = $4)",
        )
        .bind(lat)
        .bind(lng)
        .bind(epsilon)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sightings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_source_url(&self, id: i64, url: &str) -> Result<()> {
        sqlx::query("UPDATE sightings SET source_url = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
