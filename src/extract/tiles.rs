use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{category::Classifier, channel, discount, text_of};
use crate::model::{Channel, Deal, ValidPeriod};
use crate::schema::TileSchema;

static LEGACY_TILE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="AdBuilder"]"#).unwrap());
static ECO_TILE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.eco-coupons").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static TEXT_DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="Text"]"#).unwrap());
static TEXT_ZONE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="below_the_ad_text_content"]"#).unwrap());
static ECO_NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.eco-sl1").unwrap());
static ECO_SIZE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.eco-sl2").unwrap());
static ECO_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.eco-items").unwrap());
static ECO_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.eco-webImage").unwrap());

static ITEM_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Item\s+(\d+)").unwrap());
// Later pages list bundles as "Item 1720981, 1720886"; only the first counts.
static ITEM_LIST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Item\s+([\d, ]+)").unwrap());
static PNG_SKU_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_([0-9]{6,})\.png").unwrap());
// web.archive.org capture prefixes, e.g. /web/20241009103332im_/
static ARCHIVE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/web/\d+(?:im_)?/").unwrap());

/// Walk every tile of the page and build one Deal per extractable tile.
/// Tiles missing a link, a parseable discount, or any text are dropped
/// without a trace; malformed tiles are noise, not errors.
pub fn extract_tiles(
    doc: &Html,
    schema: TileSchema,
    classifier: &Classifier,
    period: &ValidPeriod,
    seen_at: &str,
) -> Vec<Deal> {
    let selector = match schema {
        TileSchema::Legacy => &LEGACY_TILE,
        TileSchema::V2024 | TileSchema::V2024Ext => &ECO_TILE,
    };
    doc.select(selector)
        .filter_map(|tile| extract_tile(tile, schema, classifier, period, seen_at))
        .collect()
}

fn extract_tile(
    tile: ElementRef<'_>,
    schema: TileSchema,
    classifier: &Classifier,
    period: &ValidPeriod,
    seen_at: &str,
) -> Option<Deal> {
    match schema {
        TileSchema::Legacy => legacy_tile(tile, classifier, period, seen_at),
        TileSchema::V2024 | TileSchema::V2024Ext => {
            eco_tile(tile, schema, classifier, period, seen_at)
        }
    }
}

fn legacy_tile(
    tile: ElementRef<'_>,
    classifier: &Classifier,
    period: &ValidPeriod,
    seen_at: &str,
) -> Option<Deal> {
    let link = first_href(tile)?;
    let (discount, kind) = discount::parse_discount(tile, TileSchema::Legacy)?;

    let zone = tile.select(&TEXT_ZONE).next()?;
    let mut lines: Vec<String> = Vec::new();
    for div in zone.select(&TEXT_DIV) {
        // Price fragments live in the same zone; they are not product text.
        if in_price_block(div) {
            continue;
        }
        let text = text_of(div);
        if !text.is_empty() {
            lines.push(text);
        }
    }
    if lines.is_empty() {
        return None;
    }
    let name = lines.first().cloned()?;
    let details = lines.last().cloned()?;

    // "Item 1111161" in the details, else a numeric token in an embedded
    // image filename.
    let sku = ITEM_SINGLE_RE
        .captures(&details)
        .map(|c| c[1].to_string())
        .or_else(|| PNG_SKU_RE.captures(&tile.html()).map(|c| c[1].to_string()));

    Some(build_deal(
        link,
        sku,
        name,
        None,
        details,
        discount,
        kind.as_str(),
        channel::extract_channel(tile, TileSchema::Legacy),
        classifier,
        period,
        seen_at,
    ))
}

fn eco_tile(
    tile: ElementRef<'_>,
    schema: TileSchema,
    classifier: &Classifier,
    period: &ValidPeriod,
    seen_at: &str,
) -> Option<Deal> {
    let link = first_href(tile)?;
    let (discount, kind) = discount::parse_discount(tile, schema)?;

    let name = tile.select(&ECO_NAME).next().map(text_of).unwrap_or_default();
    if name.is_empty() {
        return None;
    }

    let image_url = tile
        .select(&ECO_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(strip_archive_prefix);

    let mut details_parts: Vec<String> = Vec::new();
    if let Some(size) = tile.select(&ECO_SIZE).next() {
        let text = text_of(size);
        if !text.is_empty() {
            details_parts.push(text);
        }
    }
    let mut sku = None;
    if let Some(items) = tile.select(&ECO_ITEMS).next() {
        let items_text = text_of(items);
        if let Some(caps) = ITEM_LIST_RE.captures(&items_text) {
            sku = caps[1]
                .split(',')
                .next()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }
        if !items_text.is_empty() {
            details_parts.push(items_text);
        }
    }
    let details = details_parts.join(". ");

    Some(build_deal(
        link,
        sku,
        name,
        image_url,
        details,
        discount,
        kind.as_str(),
        channel::extract_channel(tile, schema),
        classifier,
        period,
        seen_at,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_deal(
    link: String,
    sku: Option<String>,
    name: String,
    image_url: Option<String>,
    details: String,
    discount: f64,
    discount_type: &str,
    channel: Channel,
    classifier: &Classifier,
    period: &ValidPeriod,
    seen_at: &str,
) -> Deal {
    let category = classifier.classify(&name, &details).to_string();
    Deal {
        link: Some(link),
        sku,
        name,
        image_url,
        category,
        discount: Some(discount),
        discount_type: Some(discount_type.to_string()),
        details,
        seen_at: seen_at.to_string(),
        valid_period: period.clone(),
        channel,
    }
}

fn first_href(tile: ElementRef<'_>) -> Option<String> {
    tile.select(&ANCHOR)
        .find_map(|a| a.value().attr("href"))
        .map(strip_archive_prefix)
}

fn strip_archive_prefix(url: &str) -> String {
    ARCHIVE_RE
        .split(url)
        .last()
        .unwrap_or(url)
        .to_string()
}

fn in_price_block(el: ElementRef<'_>) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(|a| {
        a.value().attr("data-testid") == Some("prices_and_percentages_prices")
    })
}
