use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Deal;
use crate::sql::{self, SqlValue};

static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Limit\s+(\d+)").unwrap());

const REGION: &str = "US";
const CURRENCY: &str = "USD";

const PRODUCT_COLUMNS: &[&str] = &["sku", "name", "category", "brand", "image_url"];
const OFFER_PERIOD_COLUMNS: &[&str] = &[
    "product_id",
    "region",
    "channel",
    "sale_type",
    "discount_low",
    "discount_high",
    "currency",
    "limit_qty",
    "details",
    "starts",
    "ends",
];
const OFFER_SNAPSHOT_COLUMNS: &[&str] = &[
    "offer_period_id",
    "seen_at",
    "discount_low",
    "discount_high",
    "details",
];

/// A deal that failed validation, annotated with the first reason that
/// triggered. Quarantined records are kept, never dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quarantined {
    #[serde(flatten)]
    pub deal: Deal,
    pub validation_error: String,
}

pub struct Partition {
    pub valid: Vec<Deal>,
    pub invalid: Vec<Quarantined>,
}

/// Split a deal list into the set that can be transformed and the quarantine
/// set. Every input deal lands in exactly one of the two.
pub fn partition(deals: Vec<Deal>) -> Partition {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for deal in deals {
        match validate(&deal) {
            Ok(()) => valid.push(deal),
            Err(reason) => invalid.push(Quarantined {
                deal,
                validation_error: reason,
            }),
        }
    }
    Partition { valid, invalid }
}

/// Schema requirements, checked in a fixed order; the first failure names the
/// deal's quarantine reason.
pub fn validate(deal: &Deal) -> Result<(), String> {
    if deal.sku_str().is_none() {
        return Err("Missing SKU".into());
    }
    if deal.name.is_empty() {
        return Err("Missing product name".into());
    }
    let discount = deal.discount.unwrap_or(0.0);
    if discount == 0.0 {
        return Err("Missing discount".into());
    }
    let Some(discount_type) = deal.discount_type.as_deref().filter(|s| !s.is_empty()) else {
        return Err("Missing discount type".into());
    };
    let period = &deal.valid_period;
    if period.starts.is_none() && period.ends.is_none() {
        return Err("Missing valid period".into());
    }
    if period.starts.as_deref().is_none_or(str::is_empty)
        || period.ends.as_deref().is_none_or(str::is_empty)
    {
        return Err("Invalid valid period dates".into());
    }
    if discount_type != "dollar" && discount_type != "percent" {
        return Err(format!("Invalid discount type: {}", discount_type));
    }
    if discount < 0.0 {
        return Err(format!("Invalid discount value: {}", discount));
    }
    Ok(())
}

// ── Derived record sets ──

#[derive(Debug, Clone, Serialize)]
pub struct ProductRow {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferPeriodRow {
    pub sku: String,
    pub region: String,
    pub channel: String,
    pub sale_type: String,
    pub discount_low: f64,
    pub discount_high: f64,
    pub currency: String,
    pub limit_qty: Option<i64>,
    pub details: String,
    pub starts: String,
    pub ends: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferSnapshotRow {
    pub sku: String,
    pub seen_at: String,
    pub discount_low: f64,
    pub discount_high: f64,
    pub details: String,
}

pub fn product_row(deal: &Deal) -> ProductRow {
    ProductRow {
        sku: deal.sku_str().unwrap_or_default().to_string(),
        name: deal.name.clone(),
        category: if deal.category.is_empty() {
            "Other".to_string()
        } else {
            deal.category.clone()
        },
        brand: None,
        image_url: deal.image_url.clone(),
    }
}

pub fn offer_period_row(deal: &Deal) -> OfferPeriodRow {
    let discount = deal.discount.unwrap_or_default();
    OfferPeriodRow {
        sku: deal.sku_str().unwrap_or_default().to_string(),
        region: REGION.to_string(),
        channel: deal.channel.as_str().to_string(),
        sale_type: deal.discount_type.clone().unwrap_or_default(),
        discount_low: discount,
        discount_high: discount,
        currency: CURRENCY.to_string(),
        limit_qty: limit_qty(&deal.details),
        details: deal.details.clone(),
        starts: deal.valid_period.starts.clone().unwrap_or_default(),
        ends: deal.valid_period.ends.clone().unwrap_or_default(),
    }
}

pub fn offer_snapshot_row(deal: &Deal) -> OfferSnapshotRow {
    let discount = deal.discount.unwrap_or_default();
    OfferSnapshotRow {
        sku: deal.sku_str().unwrap_or_default().to_string(),
        seen_at: deal.seen_at.clone(),
        discount_low: discount,
        discount_high: discount,
        details: deal.details.clone(),
    }
}

/// Purchase limits ride along in free text, e.g. "186 ct. Item 1111161, Limit 2."
pub fn limit_qty(details: &str) -> Option<i64> {
    LIMIT_RE
        .captures(details)
        .and_then(|caps| caps[1].parse().ok())
}

/// Render the three bulk inserts (product, offer_period, offer_snapshot, in
/// that order) for a validated deal list.
pub fn render_sql(valid: &[Deal]) -> String {
    let products: Vec<Vec<SqlValue>> = valid
        .iter()
        .map(|deal| {
            let row = product_row(deal);
            vec![
                SqlValue::text(&row.sku),
                SqlValue::text(&row.name),
                SqlValue::text(&row.category),
                SqlValue::opt_text(row.brand.as_deref()),
                SqlValue::opt_text(row.image_url.as_deref()),
            ]
        })
        .collect();

    let offer_periods: Vec<Vec<SqlValue>> = valid
        .iter()
        .map(|deal| {
            let row = offer_period_row(deal);
            vec![
                SqlValue::Expr(sql::product_lookup(&row.sku)),
                SqlValue::text(&row.region),
                SqlValue::text(&row.channel),
                SqlValue::text(&row.sale_type),
                SqlValue::Num(row.discount_low),
                SqlValue::Num(row.discount_high),
                SqlValue::text(&row.currency),
                SqlValue::opt_int(row.limit_qty),
                SqlValue::text(&row.details),
                SqlValue::text(&row.starts),
                SqlValue::text(&row.ends),
            ]
        })
        .collect();

    let offer_snapshots: Vec<Vec<SqlValue>> = valid
        .iter()
        .map(|deal| {
            let row = offer_snapshot_row(deal);
            vec![
                SqlValue::Expr(sql::offer_period_lookup(&row.sku)),
                SqlValue::text(&row.seen_at),
                SqlValue::Num(row.discount_low),
                SqlValue::Num(row.discount_high),
                SqlValue::text(&row.details),
            ]
        })
        .collect();

    let mut out = String::new();
    out.push_str(&sql::insert_or_ignore("product", PRODUCT_COLUMNS, &products));
    out.push('\n');
    out.push_str(&sql::insert_or_ignore(
        "offer_period",
        OFFER_PERIOD_COLUMNS,
        &offer_periods,
    ));
    out.push('\n');
    out.push_str(&sql::insert_or_ignore(
        "offer_snapshot",
        OFFER_SNAPSHOT_COLUMNS,
        &offer_snapshots,
    ));
    out.push('\n');
    out
}
