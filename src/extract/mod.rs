pub mod category;
pub mod channel;
pub mod discount;
pub mod period;
pub mod tiles;

use scraper::{ElementRef, Html};
use thiserror::Error;
use tracing::warn;

use crate::model::{capture_timestamp, Deal, ValidPeriod};
use crate::schema::{self, TileSchema};
use category::Classifier;
use period::PeriodError;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not detect a known tile schema in the document")]
    UnknownSchema,
    #[error(transparent)]
    Period(#[from] PeriodError),
}

#[derive(Debug)]
pub struct Extraction {
    pub deals: Vec<Deal>,
    pub period: ValidPeriod,
    pub schema: TileSchema,
}

/// One captured page, start to finish: pick the schema, fix the validity
/// window, then walk the tiles. The validity window is document-level; a page
/// whose window cannot be determined fails as a whole unless the caller
/// supplied one out-of-band or opted into unknown-period output.
pub fn extract_document(
    html: &str,
    schema_hint: Option<TileSchema>,
    classifier: &Classifier,
    period_override: Option<ValidPeriod>,
    allow_unknown_period: bool,
) -> Result<Extraction, ExtractError> {
    let doc = Html::parse_document(html);
    let schema = match schema_hint {
        Some(s) => s,
        None => schema::detect(&doc).ok_or(ExtractError::UnknownSchema)?,
    };

    let period = match period_override {
        Some(p) => p,
        None => match period::extract_valid_period(&doc) {
            Ok(p) => p,
            Err(e) if allow_unknown_period => {
                warn!("no usable validity period ({e}); continuing with null dates");
                ValidPeriod::default()
            }
            Err(e) => return Err(e.into()),
        },
    };

    let seen_at = capture_timestamp();
    let deals = tiles::extract_tiles(&doc, schema, classifier, &period, &seen_at);
    Ok(Extraction {
        deals,
        period,
        schema,
    })
}

/// All descendant strings of a node, each trimmed, concatenated in tree
/// order.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Channel;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    fn extract(html: &str) -> Extraction {
        extract_document(html, None, &Classifier::new(), None, false).unwrap()
    }

    fn dates(starts: &str, ends: &str) -> ValidPeriod {
        ValidPeriod {
            starts: Some(starts.into()),
            ends: Some(ends.into()),
        }
    }

    #[test]
    fn legacy_page_two_tiles_one_deal() {
        // One well-formed tile, one with no link: the linkless tile leaves no
        // record behind.
        let out = extract(&fixture("legacy.html"));
        assert_eq!(out.schema, TileSchema::Legacy);
        assert_eq!(out.period, dates("2025-05-14", "2025-06-08"));
        assert_eq!(out.deals.len(), 1);

        let deal = &out.deals[0];
        assert_eq!(deal.name, "Widget");
        assert_eq!(deal.sku.as_deref(), Some("123456"));
        assert_eq!(deal.discount, Some(5.0));
        assert_eq!(deal.discount_type.as_deref(), Some("dollar"));
        assert_eq!(deal.channel, Channel::OnlineOnly);
        assert_eq!(
            deal.link.as_deref(),
            Some("https://www.costco.com/widget.product.100352100.html")
        );
    }

    #[test]
    fn v2024_page() {
        let out = extract(&fixture("v2024.html"));
        assert_eq!(out.schema, TileSchema::V2024);
        assert_eq!(out.period, dates("2024-08-28", "2024-09-22"));
        // Three tiles on the page; the one without a price table is skipped.
        assert_eq!(out.deals.len(), 2);

        let bounty = &out.deals[0];
        assert_eq!(bounty.name, "Bounty Advanced Paper Towels");
        assert_eq!(bounty.sku.as_deref(), Some("1720981"));
        assert_eq!(bounty.details, "12/101 Sheets. Item 1720981, 1720886");
        assert_eq!(bounty.category, "Home & Kitchen");
        assert_eq!(bounty.channel, Channel::InWarehouseAndOnline);
        assert_eq!(bounty.discount, Some(5.0));
        // Archive-capture prefixes never reach storage.
        assert_eq!(
            bounty.link.as_deref(),
            Some("https://www.costco.com/bounty.product.4000137876.html")
        );
        assert_eq!(
            bounty.image_url.as_deref(),
            Some("https://images.costco.com/img/1720981_840.png")
        );

        let charmin = &out.deals[1];
        assert_eq!(charmin.discount, Some(25.0));
        assert_eq!(charmin.discount_type.as_deref(), Some("percent"));
        assert_eq!(charmin.channel, Channel::WarehouseOnly);
    }

    #[test]
    fn v2024_ext_page() {
        let out = extract(&fixture("v2024_ext.html"));
        assert_eq!(out.schema, TileSchema::V2024Ext);
        // Dated markers agree with their labels, so the machine values win.
        assert_eq!(out.period, dates("2024-10-09", "2024-11-03"));
        assert_eq!(out.deals.len(), 1);

        let dyson = &out.deals[0];
        // The instant-savings line outranks the crossed-out price table.
        assert_eq!(dyson.discount, Some(100.0));
        assert_eq!(dyson.discount_type.as_deref(), Some("dollar"));
        assert_eq!(dyson.sku.as_deref(), Some("1602345"));
        assert_eq!(dyson.channel, Channel::OnlineOnly);
        assert_eq!(dyson.details, "Cordless stick vacuum. Item 1602345, Limit 2");
    }

    #[test]
    fn every_extracted_deal_satisfies_the_discount_invariants() {
        for name in ["legacy.html", "v2024.html", "v2024_ext.html"] {
            let out = extract(&fixture(name));
            for deal in &out.deals {
                assert!(deal.discount.unwrap() > 0.0, "{name}: {:?}", deal.name);
                assert!(
                    matches!(deal.discount_type.as_deref(), Some("dollar") | Some("percent")),
                    "{name}: {:?}",
                    deal.discount_type
                );
            }
        }
    }

    #[test]
    fn unrecognized_markup_is_a_schema_error() {
        let err = extract_document(
            "<html><body><p>Valid April 12 - 15, 2023</p></body></html>",
            None,
            &Classifier::new(),
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::UnknownSchema));
    }

    #[test]
    fn missing_period_is_fatal_by_default() {
        let html = r#"<ul><li class="eco-coupons"></li></ul>"#;
        let err = extract_document(html, None, &Classifier::new(), None, false).unwrap_err();
        assert!(matches!(err, ExtractError::Period(PeriodError::NotFound)));
    }

    #[test]
    fn unknown_period_escape_hatch() {
        let html = r#"<ul><li class="eco-coupons"></li></ul>"#;
        let out = extract_document(html, None, &Classifier::new(), None, true).unwrap();
        assert!(!out.period.is_complete());
    }

    #[test]
    fn period_override_bypasses_page_text() {
        let html = r#"<ul><li class="eco-coupons"></li></ul>"#;
        let out = extract_document(
            html,
            None,
            &Classifier::new(),
            Some(dates("2024-01-01", "2024-01-31")),
            false,
        )
        .unwrap();
        assert_eq!(out.period, dates("2024-01-01", "2024-01-31"));
    }
}
