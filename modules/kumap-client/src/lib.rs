pub mod error;
pub mod types;

pub use error::{KumapError, Result};
pub use types::{
    AdditionalData, Gender, KumapPoint, ListPointsRequest, ListPointsResponse, Location,
    PointKind, PointStatus, WitnessState,
};

use chrono::{DateTime, Utc};

const BASE_URL: &str = "https://xgzsccaaaxadvzzsztde.supabase.co/functions/v1";

/// Page size used when draining the full dataset. The API maximum.
const FETCH_ALL_LIMIT: u32 = 1000;

/// Client for the Kumap (Xenon) bear-sighting API.
///
/// All endpoints are bearer-token authenticated JSON POSTs.
pub struct KumapClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl KumapClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl serde::Serialize,
    ) -> Result<T> {
        if self.api_key.is_empty() {
            return Err(KumapError::MissingApiKey);
        }

        let resp = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(KumapError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }

    /// Fetch one page of points. Defaults: limit 100, offset 0, active only.
    pub async fn list_points(&self, params: ListPointsRequest) -> Result<ListPointsResponse> {
        let params = ListPointsRequest {
            limit: params.limit.or(Some(100)),
            offset: params.offset.or(Some(0)),
            status: params.status.or(Some(PointStatus::Active)),
            ..params
        };
        self.request("/api-points-list", &params).await
    }

    /// Drain all pages matching the filters. A page shorter than the
    /// request limit signals end-of-data.
    pub async fn fetch_all_points(&self, params: ListPointsRequest) -> Result<Vec<KumapPoint>> {
        let mut all = Vec::new();
        let mut offset = 0u32;

        loop {
            let page = self
                .list_points(ListPointsRequest {
                    limit: Some(FETCH_ALL_LIMIT),
                    offset: Some(offset),
                    ..params.clone()
                })
                .await?;

            let count = page.data.len();
            all.extend(page.data);
            tracing::debug!(offset, count, total = all.len(), "Fetched Kumap page");

            if (count as u32) < FETCH_ALL_LIMIT {
                break;
            }
            offset += FETCH_ALL_LIMIT;
        }

        Ok(all)
    }

    /// All points for one prefecture.
    pub async fn fetch_points_by_prefecture(
        &self,
        prefecture: &str,
        params: ListPointsRequest,
    ) -> Result<Vec<KumapPoint>> {
        self.fetch_all_points(ListPointsRequest {
            prefecture: Some(prefecture.to_string()),
            ..params
        })
        .await
    }

    /// All points within an event-time window.
    pub async fn fetch_points_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        params: ListPointsRequest,
    ) -> Result<Vec<KumapPoint>> {
        self.fetch_all_points(ListPointsRequest {
            event_time_after: Some(start.to_rfc3339()),
            event_time_before: Some(end.to_rfc3339()),
            ..params
        })
        .await
    }

    /// Witness reports only (no traces/damage).
    pub async fn fetch_witness_points(&self, params: ListPointsRequest) -> Result<Vec<KumapPoint>> {
        self.fetch_all_points(ListPointsRequest {
            point_kind_ids: Some(vec![PointKind::Witness]),
            ..params
        })
        .await
    }

    /// Cheap API-key validity probe.
    pub async fn test_connection(&self) -> bool {
        match self
            .list_points(ListPointsRequest {
                limit: Some(1),
                ..Default::default()
            })
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "Kumap API connection test failed");
                false
            }
        }
    }
}
