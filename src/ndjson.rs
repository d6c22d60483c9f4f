use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::{Deal, ValidPeriod};

/// Output name for one extraction run. The prefix is the input stem up to its
/// first underscore ("savings_051425_060825" keeps "savings"), else "deals".
pub fn deal_file_name(input_stem: &str, period: &ValidPeriod) -> String {
    let prefix = if input_stem.contains('_') {
        input_stem.split('_').next().unwrap_or("deals")
    } else {
        "deals"
    };
    match period.compact() {
        Some((starts, ends)) => format!("{}_{}-{}.ndjson", prefix, starts, ends),
        None => format!("{}_unknown_period.ndjson", prefix),
    }
}

pub fn sku_filled_path(target: &Path) -> PathBuf {
    let stem = target.file_stem().and_then(|s| s.to_str()).unwrap_or("deals");
    target.with_file_name(format!("{}_sku_filled.ndjson", stem))
}

pub fn unavailable_path(target: &Path) -> PathBuf {
    let stem = target.file_stem().and_then(|s| s.to_str()).unwrap_or("deals");
    target.with_file_name(format!("unavailable_{}.ndjson", stem))
}

pub fn read_deals(path: &Path) -> Result<Vec<Deal>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut deals = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let deal: Deal = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed deal record", path.display(), i + 1))?;
        deals.push(deal);
    }
    Ok(deals)
}

/// One JSON record per line.
pub fn write_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Reference corpus for SKU resolution: every deal list in `dir` except the
/// target itself. Files are visited in name order; the resolver's frequency
/// tie-breaking depends on a stable scan order.
pub fn load_reference(dir: &Path, exclude: &Path) -> Result<Vec<Deal>> {
    let exclude = fs::canonicalize(exclude).unwrap_or_else(|_| exclude.to_path_buf());
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("ndjson"))
        .collect();
    paths.sort();

    let mut deals = Vec::new();
    for path in paths {
        let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if canonical == exclude {
            continue;
        }
        deals.extend(read_deals(&path)?);
    }
    Ok(deals)
}
