//! Game metadata declared once by the guest at load time.

use crate::plain::{kind_of, list_or_empty};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_DIMENSION: u32 = 400;
pub const MIN_DIMENSION: u32 = 100;
pub const MAX_DIMENSION: u32 = 800;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataError {
    #[error("metadata() must return a table, got {0}")]
    NotATable(&'static str),

    #[error("metadata is malformed: {0}")]
    Malformed(String),

    #[error("title is required")]
    MissingTitle,

    #[error("{field} must be {MIN_DIMENSION}-{MAX_DIMENSION}, got {value}")]
    DimensionOutOfRange { field: &'static str, value: f64 },
}

/// Validated game metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub control_scheme: Option<String>,
    pub controls: Vec<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMetadata {
    title: Option<String>,
    description: Option<String>,
    control_scheme: Option<String>,
    #[serde(deserialize_with = "list_or_empty")]
    controls: Vec<String>,
    width: Option<f64>,
    height: Option<f64>,
}

fn dimension(field: &'static str, value: Option<f64>) -> Result<u32, MetadataError> {
    match value {
        None => Ok(DEFAULT_DIMENSION),
        Some(v) if (MIN_DIMENSION as f64..=MAX_DIMENSION as f64).contains(&v) => {
            Ok(v.round() as u32)
        }
        Some(v) => Err(MetadataError::DimensionOutOfRange { field, value: v }),
    }
}

impl Metadata {
    /// Validates the plain value returned by the guest's `metadata()`
    pub fn from_plain(value: Value) -> Result<Self, MetadataError> {
        if !value.is_object() {
            return Err(MetadataError::NotATable(kind_of(&value)));
        }
        let raw: RawMetadata =
            serde_json::from_value(value).map_err(|e| MetadataError::Malformed(e.to_string()))?;

        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(MetadataError::MissingTitle)?;

        Ok(Self {
            title,
            description: raw.description.unwrap_or_default(),
            control_scheme: raw.control_scheme,
            controls: raw.controls,
            width: dimension("width", raw.width)?,
            height: dimension("height", raw.height)?,
        })
    }
}
