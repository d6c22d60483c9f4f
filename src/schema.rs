use std::fmt;
use std::sync::LazyLock;

use scraper::{Html, Selector};

static AD_BUILDER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="AdBuilder"]"#).unwrap());
static ECO_COUPON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.eco-coupons").unwrap());
static ECO_INSTANT_SAVINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.eco-sl3").unwrap());
static DATED_VALIDITY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.eco-webvalid-header time[datetime]").unwrap());

/// The markup generations the offers page has shipped under. All three
/// describe the same logical tile; none of them share selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSchema {
    /// `div[data-testid="AdBuilder"]` tiles with price fragments split across
    /// sibling text nodes.
    Legacy,
    /// `li.eco-coupons` tiles with a nested `table.eco-price`.
    V2024,
    /// v2024 plus an instant-savings text line and machine-readable validity
    /// markers.
    V2024Ext,
}

impl fmt::Display for TileSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TileSchema::Legacy => "legacy",
            TileSchema::V2024 => "v2024",
            TileSchema::V2024Ext => "v2024-ext",
        })
    }
}

/// Probe a parsed document for schema-distinguishing markers.
pub fn detect(doc: &Html) -> Option<TileSchema> {
    if doc.select(&AD_BUILDER).next().is_some() {
        return Some(TileSchema::Legacy);
    }
    if doc.select(&ECO_COUPON).next().is_some() {
        let extended = doc.select(&ECO_INSTANT_SAVINGS).next().is_some()
            || doc.select(&DATED_VALIDITY).next().is_some();
        return Some(if extended {
            TileSchema::V2024Ext
        } else {
            TileSchema::V2024
        });
    }
    None
}
