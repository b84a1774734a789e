//! Core data models for the AlphaTrader API
//!
//! Plain value structs decoded once from API responses. Every field is
//! optional so that partial payloads still decode; unknown fields are ignored.
//! Timestamps arrive as Unix epoch milliseconds.

pub mod company_profile;
pub mod order;

pub use company_profile::{CompanyCapabilities, CompanyProfile};
pub use order::{Order, OrderAction, OrderType};

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix shared by every API endpoint path
pub const API_PREFIX: &str = "/api/";

/// Exchange listing of a security
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Listing {
    /// Display name of the listed security
    pub name: Option<String>,
    /// Identifier the security trades under
    pub security_identifier: Option<String>,
    /// When the listing started
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub start_date: Option<DateTime<Utc>>,
}

/// A traded price at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LastPrice {
    pub value: Option<f64>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub date: Option<DateTime<Utc>>,
}

/// Origin used only so `Url` can percent-encode path segments
const SEGMENT_BASE: &str = "http://localhost/";

/// Builds an endpoint path from its segments, e.g. `/api/securityorders/42`
///
/// Each segment is percent-encoded, so an id containing `/` or `?` stays
/// inside its own segment.
pub(crate) fn api_path(segments: &[&str]) -> String {
    let encoded = Url::parse(SEGMENT_BASE).ok().and_then(|mut url| {
        url.path_segments_mut()
            .ok()?
            .clear()
            .push(API_PREFIX.trim_matches('/'))
            .extend(segments);
        Some(url.path().to_string())
    });
    encoded.unwrap_or_else(|| format!("{}{}", API_PREFIX, segments.join("/")))
}

/// Decodes an optional enum, mapping values this client does not know to `None`
pub(crate) fn lenient_enum<'de, D, E>(deserializer: D) -> Result<Option<E>, D::Error>
where
    D: Deserializer<'de>,
    E: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match E::deserialize(&value) {
        Ok(decoded) => Some(decoded),
        Err(_) => {
            log::debug!("Ignoring unknown enum value {}", value);
            None
        }
    }))
}
