use serde::{Deserialize, Serialize};

/// Kind of a reported point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Witness,
    Trace,
    Injury,
    Damage,
}

/// Publication status of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    Active,
    Inactive,
    Draft,
}

/// State of the witnessed animal(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WitnessState {
    Adult,
    Cub,
    WithCubs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Free-form extras attached to a point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdditionalData {
    pub count: Option<u32>,
    pub state: Option<WitnessState>,
    pub gender: Option<Gender>,
    pub trace_kind: Option<String>,
}

/// A single point as returned by the Kumap API.
#[derive(Debug, Clone, Deserialize)]
pub struct KumapPoint {
    pub id: String,
    pub location: Location,
    /// Point kind; the API calls this field `name`.
    pub name: PointKind,
    pub output_name: Option<String>,
    pub content: Option<String>,
    pub additional_data: Option<AdditionalData>,
    pub event_time: String,
    pub status: PointStatus,
    pub source: Option<String>,
    pub prefecture: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
}

/// Request body for `/api-points-list`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListPointsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_kind_ids: Option<Vec<PointKind>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PointStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListPointsResponse {
    pub data: Vec<KumapPoint>,
    pub limit: u32,
    pub offset: u32,
}
