use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::text_of;
use crate::model::DiscountKind;
use crate::schema::TileSchema;

static PRICE_BLOCK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"div[data-testid="prices_and_percentages_prices"]"#).unwrap()
});
static TEXT_DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="Text"]"#).unwrap());
static PRICE_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.eco-price").unwrap());
static DOLLAR_SIGN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.eco-dollarSign").unwrap());
static DOLLAR_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.eco-dollar").unwrap());
static INSTANT_SAVINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.eco-sl3").unwrap());

static WHOLE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?$").unwrap());
static FIRST_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static AFTER_DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)After\s+\$?(\d+(?:\.\d+)?)\s+OFF").unwrap());
static AFTER_PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)After\s+(\d+(?:\.\d+)?)%\s+OFF").unwrap());

/// Read the discount banner of one tile. `None` rejects the tile, so an
/// amount of zero is treated the same as no amount at all.
pub fn parse_discount(tile: ElementRef<'_>, schema: TileSchema) -> Option<(f64, DiscountKind)> {
    let parsed = match schema {
        TileSchema::Legacy => legacy_fragments(tile),
        TileSchema::V2024 => price_table(tile),
        TileSchema::V2024Ext => instant_savings(tile).or_else(|| price_table(tile)),
    };
    parsed.filter(|(amount, _)| *amount > 0.0)
}

/// "After $100 OFF" / "After 25% OFF" line, present on extended tiles only.
fn instant_savings(tile: ElementRef<'_>) -> Option<(f64, DiscountKind)> {
    let text = text_of(tile.select(&INSTANT_SAVINGS).next()?);
    if let Some(caps) = AFTER_DOLLAR_RE.captures(&text) {
        return caps[1].parse().ok().map(|v| (v, DiscountKind::Dollar));
    }
    if let Some(caps) = AFTER_PERCENT_RE.captures(&text) {
        return caps[1].parse().ok().map(|v| (v, DiscountKind::Percent));
    }
    None
}

/// Legacy tiles render the banner as loose text fragments: a symbol node
/// ("$" or "%") beside one or two number nodes. Two numbers are a
/// dollars/cents split, e.g. "$", "4", "99" is 4.99.
fn legacy_fragments(tile: ElementRef<'_>) -> Option<(f64, DiscountKind)> {
    let block = tile.select(&PRICE_BLOCK).next()?;
    let mut symbol: Option<String> = None;
    let mut dollars: Option<f64> = None;
    let mut cents: Option<f64> = None;
    for node in block.select(&TEXT_DIV) {
        let text = text_of(node);
        if text == "$" || text == "%" {
            symbol = Some(text);
            continue;
        }
        if WHOLE_NUMBER_RE.is_match(&text) {
            let value: f64 = text.parse().ok()?;
            if dollars.is_none() {
                dollars = Some(value);
            } else if cents.is_none() {
                cents = Some(value);
            }
        }
    }
    let mut amount = dollars?;
    if let Some(c) = cents {
        amount += c / 100.0;
    }
    let kind = if symbol.as_deref() == Some("%") {
        DiscountKind::Percent
    } else {
        DiscountKind::Dollar
    };
    Some((amount, kind))
}

/// 2024 tiles use a nested price table. The amount span's digits may be split
/// across nested nodes, so all fragments are joined before matching.
fn price_table(tile: ElementRef<'_>) -> Option<(f64, DiscountKind)> {
    let table = tile.select(&PRICE_TABLE).next()?;
    let span = table.select(&DOLLAR_SPAN).next()?;
    let joined: String = span.text().map(str::trim).collect();
    let amount: f64 = FIRST_NUMBER_RE.find(&joined)?.as_str().parse().ok()?;
    let percent = table
        .select(&DOLLAR_SIGN)
        .next()
        .is_some_and(|s| text_of(s).contains('%'));
    Some((
        amount,
        if percent {
            DiscountKind::Percent
        } else {
            DiscountKind::Dollar
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn legacy_tile(price_fragments: &str) -> Html {
        Html::parse_document(&format!(
            concat!(
                r#"<div data-testid="AdBuilder">"#,
                r#"<div data-testid="prices_and_percentages_prices">{}</div>"#,
                r#"</div>"#,
            ),
            price_fragments
        ))
    }

    #[test]
    fn legacy_dollars_and_cents_fragments() {
        let doc = legacy_tile(concat!(
            r#"<div data-testid="Text">$</div>"#,
            r#"<div data-testid="Text">4</div>"#,
            r#"<div data-testid="Text">99</div>"#,
        ));
        let tile = doc
            .select(&Selector::parse(r#"div[data-testid="AdBuilder"]"#).unwrap())
            .next()
            .unwrap();
        assert_eq!(
            parse_discount(tile, TileSchema::Legacy),
            Some((4.99, DiscountKind::Dollar))
        );
    }

    #[test]
    fn legacy_percent_banner() {
        let doc = legacy_tile(concat!(
            r#"<div data-testid="Text">25</div>"#,
            r#"<div data-testid="Text">%</div>"#,
        ));
        let tile = doc
            .select(&Selector::parse(r#"div[data-testid="AdBuilder"]"#).unwrap())
            .next()
            .unwrap();
        assert_eq!(
            parse_discount(tile, TileSchema::Legacy),
            Some((25.0, DiscountKind::Percent))
        );
    }

    #[test]
    fn legacy_without_numeric_fragment_rejects() {
        let doc = legacy_tile(r#"<div data-testid="Text">$</div>"#);
        let tile = doc
            .select(&Selector::parse(r#"div[data-testid="AdBuilder"]"#).unwrap())
            .next()
            .unwrap();
        assert_eq!(parse_discount(tile, TileSchema::Legacy), None);
    }

    #[test]
    fn table_amount_split_across_nested_nodes() {
        let doc = Html::parse_document(concat!(
            r#"<li class="eco-coupons"><table class="eco-price"><tr>"#,
            r#"<td><span class="eco-dollarSign">$</span></td>"#,
            r#"<td><span class="eco-dollar"><span>1</span><span>5</span></span></td>"#,
            r#"</tr></table></li>"#,
        ));
        let tile = doc
            .select(&Selector::parse("li.eco-coupons").unwrap())
            .next()
            .unwrap();
        assert_eq!(
            parse_discount(tile, TileSchema::V2024),
            Some((15.0, DiscountKind::Dollar))
        );
    }

    #[test]
    fn table_percent_sign() {
        let doc = Html::parse_document(concat!(
            r#"<li class="eco-coupons"><table class="eco-price"><tr>"#,
            r#"<td><span class="eco-dollar">30</span></td>"#,
            r#"<td><span class="eco-dollarSign">%</span></td>"#,
            r#"</tr></table></li>"#,
        ));
        let tile = doc
            .select(&Selector::parse("li.eco-coupons").unwrap())
            .next()
            .unwrap();
        assert_eq!(
            parse_discount(tile, TileSchema::V2024),
            Some((30.0, DiscountKind::Percent))
        );
    }

    #[test]
    fn instant_savings_line_wins_over_price_table() {
        let doc = Html::parse_document(concat!(
            r#"<li class="eco-coupons">"#,
            r#"<div class="eco-sl3">After $100 OFF</div>"#,
            r#"<table class="eco-price"><tr><td><span class="eco-dollar">99</span></td></tr></table>"#,
            r#"</li>"#,
        ));
        let tile = doc
            .select(&Selector::parse("li.eco-coupons").unwrap())
            .next()
            .unwrap();
        assert_eq!(
            parse_discount(tile, TileSchema::V2024Ext),
            Some((100.0, DiscountKind::Dollar))
        );
    }

    #[test]
    fn zero_amount_rejects_the_tile() {
        let doc = legacy_tile(concat!(
            r#"<div data-testid="Text">$</div>"#,
            r#"<div data-testid="Text">0</div>"#,
        ));
        let tile = doc
            .select(&Selector::parse(r#"div[data-testid="AdBuilder"]"#).unwrap())
            .next()
            .unwrap();
        assert_eq!(parse_discount(tile, TileSchema::Legacy), None);
    }
}
