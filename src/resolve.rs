use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::info;

use crate::model::Deal;

const NAME_THRESHOLD: f64 = 0.85;
const DETAILS_THRESHOLD: f64 = 0.70;

/// Which matching strategy recovered a SKU. Weaker tiers only run when every
/// stronger tier came up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    ExactName,
    PrefixSuffix,
    Fuzzy,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::ExactName => "exact name",
            Tier::PrefixSuffix => "prefix/suffix match",
            Tier::Fuzzy => "fuzzy match",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Repair {
    pub line: usize,
    pub tier: Tier,
    pub before: Deal,
    pub after: Deal,
}

/// Fill every missing SKU in `target` from the reference corpus. Returns the
/// repaired list (original order) plus one Repair per change; deals no tier
/// could resolve pass through untouched.
pub fn fill_missing_skus(target: &[Deal], reference: &[Deal]) -> (Vec<Deal>, Vec<Repair>) {
    let pb = ProgressBar::new(target.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len}")
            .unwrap()
            .progress_chars("=> "),
    );

    let resolved: Vec<(Deal, Option<Repair>)> = target
        .par_iter()
        .enumerate()
        .map(|(line, deal)| {
            let out = resolve_one(line, deal, reference);
            pb.inc(1);
            out
        })
        .collect();
    pb.finish_and_clear();

    let mut deals = Vec::with_capacity(resolved.len());
    let mut repairs = Vec::new();
    for (deal, repair) in resolved {
        deals.push(deal);
        if let Some(repair) = repair {
            info!(
                line = repair.line,
                tier = %repair.tier,
                sku = repair.after.sku.as_deref().unwrap_or(""),
                name = %repair.after.name,
                "filled missing sku"
            );
            repairs.push(repair);
        }
    }
    (deals, repairs)
}

fn resolve_one(line: usize, deal: &Deal, reference: &[Deal]) -> (Deal, Option<Repair>) {
    if deal.sku_str().is_some() {
        return (deal.clone(), None);
    }

    let hit = by_exact_name(&deal.name, reference)
        .map(|sku| (sku, Tier::ExactName))
        .or_else(|| by_prefix_or_suffix(&deal.name, reference).map(|sku| (sku, Tier::PrefixSuffix)))
        .or_else(|| by_similarity(&deal.name, &deal.details, reference).map(|sku| (sku, Tier::Fuzzy)));

    match hit {
        Some((sku, tier)) => {
            let mut after = deal.clone();
            after.sku = Some(sku);
            let repair = Repair {
                line,
                tier,
                before: deal.clone(),
                after: after.clone(),
            };
            (after, Some(repair))
        }
        None => (deal.clone(), None),
    }
}

/// Tier 1: first reference deal with the identical name and a SKU.
fn by_exact_name(name: &str, reference: &[Deal]) -> Option<String> {
    reference
        .iter()
        .find(|d| d.sku_str().is_some() && d.name == name)
        .and_then(|d| d.sku_str())
        .map(str::to_string)
}

/// Tier 2: reference deals whose name has the target name as a prefix or
/// suffix. Most frequent SKU wins; count ties go to the SKU on the deal with
/// the latest parseable start date, then to the first SKU encountered.
fn by_prefix_or_suffix(target: &str, reference: &[Deal]) -> Option<String> {
    let matches: Vec<&Deal> = reference
        .iter()
        .filter(|d| {
            d.sku_str().is_some() && (d.name.starts_with(target) || d.name.ends_with(target))
        })
        .collect();
    if matches.is_empty() {
        return None;
    }

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for deal in &matches {
        let sku = deal.sku_str().unwrap();
        if !counts.contains_key(sku) {
            order.push(sku);
        }
        *counts.entry(sku).or_insert(0) += 1;
    }
    let top = counts.values().copied().max()?;
    let tied: Vec<&str> = order.iter().copied().filter(|s| counts[s] == top).collect();
    if tied.len() == 1 {
        return Some(tied[0].to_string());
    }

    // Strictly-later comparison keeps the first-encountered deal on equal
    // dates; deals without a parseable start date are skipped here but still
    // counted above.
    let mut latest: Option<NaiveDate> = None;
    let mut chosen: Option<&str> = None;
    for deal in &matches {
        let sku = deal.sku_str().unwrap();
        if !tied.contains(&sku) {
            continue;
        }
        let Some(date) = deal.valid_period.starts_date() else {
            continue;
        };
        if latest.is_none_or(|l| date > l) {
            latest = Some(date);
            chosen = Some(sku);
        }
    }
    Some(chosen.unwrap_or(tied[0]).to_string())
}

/// Tier 3: best average of name and details similarity, both over their
/// thresholds.
fn by_similarity(name: &str, details: &str, reference: &[Deal]) -> Option<String> {
    let mut best_score = 0.0;
    let mut best: Option<&str> = None;
    for deal in reference {
        let Some(sku) = deal.sku_str() else { continue };
        let name_score = strsim::normalized_levenshtein(&deal.name, name);
        if name_score <= NAME_THRESHOLD {
            continue;
        }
        let details_score = strsim::normalized_levenshtein(&deal.details, details);
        if details_score <= DETAILS_THRESHOLD {
            continue;
        }
        let avg = (name_score + details_score) / 2.0;
        if avg > best_score {
            best_score = avg;
            best = Some(sku);
        }
    }
    best.map(str::to_string)
}

/// Append every repair to the human-readable change log, one entry per
/// repair with the full before/after record.
pub fn append_change_log(path: &Path, source: &str, repairs: &[Repair]) -> Result<()> {
    if repairs.is_empty() {
        return Ok(());
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    for repair in repairs {
        writeln!(
            file,
            "[SKU FILLED] file={} line={} reason={}",
            source, repair.line, repair.tier
        )?;
        writeln!(file, "  OLD: {}", serde_json::to_string(&repair.before)?)?;
        writeln!(file, "  NEW: {}", serde_json::to_string(&repair.after)?)?;
    }
    Ok(())
}
