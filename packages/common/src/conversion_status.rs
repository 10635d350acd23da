#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a PDF rendition of a file exists, is pending, or is impossible.
///
/// Transitions:
/// - a save with content on a new record starts at `NotConverted`,
///   a save without content lands on `NotNeeded`;
/// - the conversion scheduler moves `NotConverted` to `Converted`,
///   `NotSupported` or `NotNeeded`;
/// - only a save with materially different content moves a record back to
///   `NotConverted`.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionStatus {
    /// Waiting for the scheduler.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "NOT_CONVERTED"))]
    NotConverted,
    /// A converted PDF blob is attached.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "CONVERTED"))]
    Converted,
    /// The converter rejected the content. Terminal until the content changes.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "NOT_SUPPORTED"))]
    NotSupported,
    /// No content, or content that is already viewable (PDF, images).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "NOT_NEEDED"))]
    NotNeeded,
}

impl ConversionStatus {
    /// Returns true if the scheduler still has work to do for this status.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::NotConverted)
    }

    pub const ALL: &'static [ConversionStatus] = &[
        Self::NotConverted,
        Self::Converted,
        Self::NotSupported,
        Self::NotNeeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConverted => "NOT_CONVERTED",
            Self::Converted => "CONVERTED",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::NotNeeded => "NOT_NEEDED",
        }
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ConversionStatus {
    fn default() -> Self {
        Self::NotNeeded
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid conversion status '{}'. Valid values: {}",
            self.invalid,
            ConversionStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for ConversionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_CONVERTED" => Ok(Self::NotConverted),
            "CONVERTED" => Ok(Self::Converted),
            "NOT_SUPPORTED" => Ok(Self::NotSupported),
            "NOT_NEEDED" => Ok(Self::NotNeeded),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}
