use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::text_of;
use crate::model::Channel;
use crate::schema::TileSchema;

static STRIP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="strip"]"#).unwrap());
static TEXT_DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="Text"]"#).unwrap());
static ECO_HEADER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.eco-header").unwrap());

/// Read the redemption-channel banner of one tile. Unrecognized or missing
/// banners are Unknown, never a tile rejection.
pub fn extract_channel(tile: ElementRef<'_>, schema: TileSchema) -> Channel {
    match schema {
        TileSchema::Legacy => from_strip(tile),
        TileSchema::V2024 | TileSchema::V2024Ext => from_header(tile),
    }
}

fn from_strip(tile: ElementRef<'_>) -> Channel {
    let Some(strip) = tile.select(&STRIP).next() else {
        return Channel::Unknown;
    };
    let Some(text_div) = strip.select(&TEXT_DIV).next() else {
        return Channel::Unknown;
    };
    let text = text_of(text_div);
    if text.contains("Warehouse-Only") {
        Channel::WarehouseOnly
    } else if text.contains("In-Warehouse & Online") {
        Channel::InWarehouseAndOnline
    } else if text.contains("Online-Only") {
        Channel::OnlineOnly
    } else {
        Channel::Unknown
    }
}

fn from_header(tile: ElementRef<'_>) -> Channel {
    let Some(header) = tile.select(&ECO_HEADER).next() else {
        return Channel::Unknown;
    };
    let text = text_of(header).to_uppercase();
    if text.contains("IN-WAREHOUSE") && text.contains("ONLINE") {
        Channel::InWarehouseAndOnline
    } else if text.contains("WAREHOUSE") {
        Channel::WarehouseOnly
    } else if text.contains("ONLINE") {
        Channel::OnlineOnly
    } else {
        Channel::Unknown
    }
}
