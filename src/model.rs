use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Discount kinds the offers page renders: "$ 5 OFF" or "25 % OFF".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    Dollar,
    Percent,
}

impl DiscountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountKind::Dollar => "dollar",
            DiscountKind::Percent => "percent",
        }
    }
}

/// Where an offer can be redeemed. Unknown absorbs any banner text we do not
/// recognize, including labels from future page versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "Warehouse-Only")]
    WarehouseOnly,
    #[serde(rename = "In-Warehouse & Online")]
    InWarehouseAndOnline,
    #[serde(rename = "Online-Only")]
    OnlineOnly,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::WarehouseOnly => "Warehouse-Only",
            Channel::InWarehouseAndOnline => "In-Warehouse & Online",
            Channel::OnlineOnly => "Online-Only",
            Channel::Unknown => "Unknown",
        }
    }
}

/// The date window one captured page is valid for, shared by every deal
/// extracted from it. Dates are ISO calendar strings; either may be absent in
/// historical files produced by lenient crawler runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidPeriod {
    pub starts: Option<String>,
    pub ends: Option<String>,
}

impl ValidPeriod {
    pub fn from_dates(starts: NaiveDate, ends: NaiveDate) -> Self {
        Self {
            starts: Some(starts.format("%Y-%m-%d").to_string()),
            ends: Some(ends.format("%Y-%m-%d").to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.compact().is_some()
    }

    /// Start date parsed back out, for chronological tie-breaking.
    pub fn starts_date(&self) -> Option<NaiveDate> {
        self.starts
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    /// Both dates as `YYYYMMDD` strings, used in output file names.
    pub fn compact(&self) -> Option<(String, String)> {
        match (self.starts.as_deref(), self.ends.as_deref()) {
            (Some(s), Some(e)) if !s.is_empty() && !e.is_empty() => {
                Some((s.replace('-', ""), e.replace('-', "")))
            }
            _ => None,
        }
    }
}

/// One normalized deal record, one NDJSON line. Optional fields stay loose so
/// deal lists written by any crawler generation load back cleanly: the oldest
/// files have no `image_url` and spell the channel key `offer_channel`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Deal {
    pub link: Option<String>,
    pub sku: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub category: String,
    pub discount: Option<f64>,
    pub discount_type: Option<String>,
    pub details: String,
    pub seen_at: String,
    pub valid_period: ValidPeriod,
    #[serde(alias = "offer_channel")]
    pub channel: Channel,
}

impl Deal {
    /// The SKU when present and non-empty.
    pub fn sku_str(&self) -> Option<&str> {
        self.sku.as_deref().filter(|s| !s.is_empty())
    }
}

/// Capture timestamp: UTC, second precision, e.g. `2025-05-14T09:30:12Z`.
pub fn capture_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
