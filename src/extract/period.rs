use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::text_of;
use crate::model::ValidPeriod;

static VALID_HEADER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.eco-webvalid-header").unwrap());
static TIME_MARKER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time[datetime]").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

// "Valid August 28 to September 22, 2024" / "Valid August 28 to 31, 2024"
static BANNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Valid\s+([A-Za-z]+)\s+(\d{1,2})\s+to\s+(?:([A-Za-z]+)\s+)?(\d{1,2}),\s+(\d{4})")
        .unwrap()
});
// "Valid April 12 - May 10, 2023" / "Valid April 12 - 15, 2023"
static DASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Valid\s+([A-Za-z]+)\s+(\d{1,2})\s*-\s*(?:([A-Za-z]+)\s+)?(\d{1,2}),\s+(\d{4})")
        .unwrap()
});
// "August 28" or "August 28, 2024" inside a <time> label
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)\s+(\d{1,2})(?:,\s*(\d{4}))?").unwrap());
// "5/14/25"
static NUMERIC_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2}\b").unwrap());

#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("no validity period found in document")]
    NotFound,
    #[error("validity text {0:?} did not parse as a date range")]
    Unparseable(String),
}

/// Pull the document-wide validity window. Strategies cascade and the first
/// one that matches wins; a matching strategy whose dates then fail to parse
/// is an error, not a fall-through. Null dates never leave this function.
pub fn extract_valid_period(doc: &Html) -> Result<ValidPeriod, PeriodError> {
    if let Some(header) = doc.select(&VALID_HEADER).next() {
        // Dated markers carry both a machine value and a human label.
        let markers: Vec<ElementRef> = header.select(&TIME_MARKER).collect();
        if markers.len() >= 2 {
            let text = text_of(header);
            let starts =
                resolve_marker(markers[0]).ok_or_else(|| PeriodError::Unparseable(text.clone()))?;
            let ends =
                resolve_marker(markers[1]).ok_or(PeriodError::Unparseable(text))?;
            return Ok(ValidPeriod::from_dates(starts, ends));
        }

        let text = text_of(header);
        if let Some(caps) = BANNER_RE.captures(&text) {
            return range_from_captures(&caps).ok_or(PeriodError::Unparseable(text));
        }
    }

    for p in doc.select(&PARAGRAPH) {
        let text = text_of(p);
        if let Some(caps) = DASH_RE.captures(&text) {
            return range_from_captures(&caps).ok_or(PeriodError::Unparseable(text));
        }
    }

    // The oldest captures only carry "Valid 5/14/25 - 6/8/25" style text
    // somewhere in the body.
    for chunk in doc.root_element().text() {
        if !chunk.contains("Valid") {
            continue;
        }
        let dates: Vec<&str> = NUMERIC_DATE_RE
            .find_iter(chunk)
            .map(|m| m.as_str())
            .collect();
        if dates.len() != 2 {
            continue;
        }
        let starts = NaiveDate::parse_from_str(dates[0], "%m/%d/%y");
        let ends = NaiveDate::parse_from_str(dates[1], "%m/%d/%y");
        return match (starts, ends) {
            (Ok(s), Ok(e)) => Ok(ValidPeriod::from_dates(s, e)),
            _ => Err(PeriodError::Unparseable(chunk.trim().to_string())),
        };
    }

    Err(PeriodError::NotFound)
}

/// One `<time datetime="...">August 28</time>` marker. The human label is
/// authoritative when it disagrees with the machine value.
fn resolve_marker(marker: ElementRef<'_>) -> Option<NaiveDate> {
    let machine = marker
        .value()
        .attr("datetime")
        .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok());
    let label = parse_label(&text_of(marker), machine.map(|d| d.year()));
    match (machine, label) {
        (Some(m), Some(t)) if m != t => Some(t),
        (Some(m), _) => Some(m),
        (None, t) => t,
    }
}

fn parse_label(label: &str, fallback_year: Option<i32>) -> Option<NaiveDate> {
    let caps = LABEL_RE.captures(label)?;
    let year = match caps.get(3) {
        Some(y) => y.as_str().parse().ok()?,
        None => fallback_year?,
    };
    month_day_year(&caps[1], &caps[2], year)
}

fn month_day_year(month: &str, day: &str, year: i32) -> Option<NaiveDate> {
    let text = format!("{} {} {}", month, day, year);
    NaiveDate::parse_from_str(&text, "%B %d %Y")
        .or_else(|_| NaiveDate::parse_from_str(&text, "%b %d %Y"))
        .ok()
}

fn range_from_captures(caps: &regex::Captures<'_>) -> Option<ValidPeriod> {
    let start_month = &caps[1];
    // End month defaults to the start month: "Valid August 28 to 31, 2024".
    let end_month = caps.get(3).map_or(start_month, |m| m.as_str());
    let year: i32 = caps[5].parse().ok()?;
    let starts = month_day_year(start_month, &caps[2], year)?;
    let ends = month_day_year(end_month, &caps[4], year)?;
    Some(ValidPeriod::from_dates(starts, ends))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period_of(html: &str) -> Result<ValidPeriod, PeriodError> {
        extract_valid_period(&Html::parse_document(html))
    }

    fn dates(starts: &str, ends: &str) -> ValidPeriod {
        ValidPeriod {
            starts: Some(starts.into()),
            ends: Some(ends.into()),
        }
    }

    #[test]
    fn banner_round_trip() {
        let got = period_of(
            r#"<p class="eco-webvalid-header">Valid August 28 to September 22, 2024</p>"#,
        )
        .unwrap();
        assert_eq!(got, dates("2024-08-28", "2024-09-22"));
    }

    #[test]
    fn banner_end_month_defaults_to_start_month() {
        let got =
            period_of(r#"<p class="eco-webvalid-header">Valid August 28 to 31, 2024</p>"#).unwrap();
        assert_eq!(got, dates("2024-08-28", "2024-08-31"));
    }

    #[test]
    fn free_text_same_month_shorthand() {
        let got = period_of("<p>Valid April 12 - 15, 2023</p>").unwrap();
        assert_eq!(got, dates("2023-04-12", "2023-04-15"));
    }

    #[test]
    fn free_text_with_end_month() {
        let got = period_of("<p>Offer details. Valid April 12 - May 10, 2023</p>").unwrap();
        assert_eq!(got, dates("2023-04-12", "2023-05-10"));
    }

    #[test]
    fn dated_markers_prefer_machine_value_when_they_agree() {
        let got = period_of(concat!(
            r#"<p class="eco-webvalid-header">Valid "#,
            r#"<time datetime="2024-10-09">October 9</time> to "#,
            r#"<time datetime="2024-11-03">November 3</time>, 2024</p>"#,
        ))
        .unwrap();
        assert_eq!(got, dates("2024-10-09", "2024-11-03"));
    }

    #[test]
    fn dated_markers_prefer_label_on_disagreement() {
        // Stale machine field says the 27th, the editor-facing label says the
        // 28th: the label wins.
        let got = period_of(concat!(
            r#"<p class="eco-webvalid-header">Valid "#,
            r#"<time datetime="2024-08-27">August 28</time> to "#,
            r#"<time datetime="2024-09-22">September 22</time>, 2024</p>"#,
        ))
        .unwrap();
        assert_eq!(got, dates("2024-08-28", "2024-09-22"));
    }

    #[test]
    fn numeric_fallback_for_oldest_pages() {
        let got = period_of("<div>Pricing Valid 5/14/25 - 6/8/25 while supplies last</div>")
            .unwrap();
        assert_eq!(got, dates("2025-05-14", "2025-06-08"));
    }

    #[test]
    fn document_without_validity_text_is_not_found() {
        assert!(matches!(
            period_of("<p>Nothing to see here</p>"),
            Err(PeriodError::NotFound)
        ));
    }

    #[test]
    fn matched_banner_with_bad_month_is_fatal() {
        // The banner strategy matched, so a bogus month name must not fall
        // through to weaker strategies.
        assert!(matches!(
            period_of(r#"<p class="eco-webvalid-header">Valid Smarch 28 to 31, 2024</p>"#),
            Err(PeriodError::Unparseable(_))
        ));
    }
}
