mod extract;
mod ingest;
mod model;
mod ndjson;
mod resolve;
mod schema;
mod sql;
mod transform;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::extract::category::Classifier;
use crate::model::ValidPeriod;
use crate::schema::TileSchema;

#[derive(Parser)]
#[command(name = "costco_deals", about = "Costco promotional-offer extraction pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract deals from a captured offers page into NDJSON
    Extract {
        /// Saved HTML file of one offers page
        file: PathBuf,
        /// Tile schema (legacy, v2024, v2024-ext); probed when omitted
        #[arg(long, value_parser = parse_schema)]
        schema: Option<TileSchema>,
        /// Output directory (default: next to the input file)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Override the validity start date (YYYY-MM-DD); requires --ends
        #[arg(long)]
        starts: Option<String>,
        /// Override the validity end date (YYYY-MM-DD); requires --starts
        #[arg(long)]
        ends: Option<String>,
        /// Emit an unknown-period file instead of failing when no validity
        /// text parses
        #[arg(long)]
        allow_unknown_period: bool,
    },
    /// Backfill missing SKUs from sibling deal lists
    FillSkus {
        /// Target deal list (NDJSON)
        file: PathBuf,
        /// Directory holding the reference deal lists (default: the target's)
        #[arg(long)]
        reference_dir: Option<PathBuf>,
        /// Change log path (default: fill_missing_skus.log in the reference dir)
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Validate deals and emit SQL plus a quarantine file
    Convert {
        /// Deal list (NDJSON)
        file: PathBuf,
        /// SQL output path (default: input with .sql extension)
        #[arg(long)]
        sql_out: Option<PathBuf>,
        /// Quarantine output path (default: unavailable_<stem>.ndjson)
        #[arg(long)]
        unavailable_out: Option<PathBuf>,
    },
    /// Extract, backfill, and convert in one pipeline
    Run {
        /// Saved HTML file of one offers page
        file: PathBuf,
        #[arg(long, value_parser = parse_schema)]
        schema: Option<TileSchema>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        allow_unknown_period: bool,
    },
    /// Post validated deals to the ingestion endpoint
    Ingest {
        /// Deal list (NDJSON)
        file: PathBuf,
        /// Ingestion endpoint URL
        #[arg(long)]
        endpoint: String,
        /// Bearer token (default: the INGEST_TOKEN environment variable)
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            file,
            schema,
            out_dir,
            starts,
            ends,
            allow_unknown_period,
        } => {
            let period = period_override(starts, ends)?;
            cmd_extract(&file, schema, out_dir.as_deref(), period, allow_unknown_period)
                .map(|_| ())
        }
        Commands::FillSkus {
            file,
            reference_dir,
            log_file,
        } => cmd_fill_skus(&file, reference_dir.as_deref(), log_file.as_deref()).map(|_| ()),
        Commands::Convert {
            file,
            sql_out,
            unavailable_out,
        } => cmd_convert(&file, sql_out, unavailable_out),
        Commands::Run {
            file,
            schema,
            out_dir,
            allow_unknown_period,
        } => {
            let deals_file =
                cmd_extract(&file, schema, out_dir.as_deref(), None, allow_unknown_period)?;
            let filled = cmd_fill_skus(&deals_file, None, None)?;
            cmd_convert(&filled, None, None)
        }
        Commands::Ingest {
            file,
            endpoint,
            token,
        } => cmd_ingest(&file, &endpoint, token).await,
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn cmd_extract(
    file: &Path,
    schema: Option<TileSchema>,
    out_dir: Option<&Path>,
    period_override: Option<ValidPeriod>,
    allow_unknown_period: bool,
) -> Result<PathBuf> {
    let html =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let classifier = Classifier::new();
    let extraction = extract::extract_document(
        &html,
        schema,
        &classifier,
        period_override,
        allow_unknown_period,
    )
    .with_context(|| format!("extracting {}", file.display()))?;

    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("deals");
    let out_dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| file.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let out_path = out_dir.join(ndjson::deal_file_name(stem, &extraction.period));
    ndjson::write_lines(&out_path, &extraction.deals)?;

    println!(
        "Wrote {} deals to {} (schema: {})",
        extraction.deals.len(),
        out_path.display(),
        extraction.schema
    );
    Ok(out_path)
}

fn cmd_fill_skus(
    file: &Path,
    reference_dir: Option<&Path>,
    log_file: Option<&Path>,
) -> Result<PathBuf> {
    let target = ndjson::read_deals(file)?;
    let dir = reference_dir
        .map(Path::to_path_buf)
        .or_else(|| file.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let reference = ndjson::load_reference(&dir, file)?;
    println!(
        "Resolving {} deals against {} reference deals...",
        target.len(),
        reference.len()
    );

    let missing = target.iter().filter(|d| d.sku_str().is_none()).count();
    let (resolved, repairs) = resolve::fill_missing_skus(&target, &reference);

    let out_path = ndjson::sku_filled_path(file);
    ndjson::write_lines(&out_path, &resolved)?;

    let log_path = log_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.join("fill_missing_skus.log"));
    let source = file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("deals.ndjson");
    resolve::append_change_log(&log_path, source, &repairs)?;

    println!(
        "Total deals: {} | Missing SKUs: {} | Resolved: {} | Unresolved: {}",
        resolved.len(),
        missing,
        repairs.len(),
        missing - repairs.len()
    );
    println!("Changes logged to {}", log_path.display());
    println!("Output: {}", out_path.display());
    Ok(out_path)
}

fn cmd_convert(
    file: &Path,
    sql_out: Option<PathBuf>,
    unavailable_out: Option<PathBuf>,
) -> Result<()> {
    let deals = ndjson::read_deals(file)?;
    let total = deals.len();
    let partition = transform::partition(deals);

    let unavailable_path = unavailable_out.unwrap_or_else(|| ndjson::unavailable_path(file));
    if !partition.invalid.is_empty() {
        ndjson::write_lines(&unavailable_path, &partition.invalid)?;
        println!(
            "Saved {} unavailable deals to {}",
            partition.invalid.len(),
            unavailable_path.display()
        );
    }

    let sql_path = sql_out.unwrap_or_else(|| file.with_extension("sql"));
    let sql_text = transform::render_sql(&partition.valid);
    std::fs::write(&sql_path, sql_text)
        .with_context(|| format!("writing {}", sql_path.display()))?;

    println!(
        "Total deals: {} | Valid: {} | Unavailable: {}",
        total,
        partition.valid.len(),
        partition.invalid.len()
    );
    println!("Wrote SQL to {}", sql_path.display());
    Ok(())
}

async fn cmd_ingest(file: &Path, endpoint: &str, token: Option<String>) -> Result<()> {
    let deals = ndjson::read_deals(file)?;
    let total = deals.len();
    let partition = transform::partition(deals);
    if partition.valid.is_empty() {
        bail!("no valid deals to ingest in {}", file.display());
    }

    let batch = ingest::batch_from(&partition.valid);
    let token = token.or_else(|| std::env::var("INGEST_TOKEN").ok());
    let response = ingest::post_batch(endpoint, token.as_deref(), &batch).await?;
    if !response.success {
        bail!(
            "ingestion rejected: {}",
            response.message.unwrap_or_else(|| "no detail".into())
        );
    }

    println!(
        "Ingested {} deals ({} invalid skipped)",
        partition.valid.len(),
        total - partition.valid.len()
    );
    Ok(())
}

fn parse_schema(s: &str) -> Result<TileSchema, String> {
    match s {
        "legacy" => Ok(TileSchema::Legacy),
        "v2024" => Ok(TileSchema::V2024),
        "v2024-ext" | "v2024_ext" => Ok(TileSchema::V2024Ext),
        other => Err(format!(
            "unknown schema {:?} (expected legacy, v2024, v2024-ext)",
            other
        )),
    }
}

/// Both dates or neither; each must be a real calendar date.
fn period_override(starts: Option<String>, ends: Option<String>) -> Result<Option<ValidPeriod>> {
    match (starts, ends) {
        (None, None) => Ok(None),
        (Some(starts), Some(ends)) => {
            for date in [&starts, &ends] {
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .with_context(|| format!("invalid date {:?} (expected YYYY-MM-DD)", date))?;
            }
            Ok(Some(ValidPeriod {
                starts: Some(starts),
                ends: Some(ends),
            }))
        }
        _ => bail!("--starts and --ends must be given together"),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_flag_values() {
        assert_eq!(parse_schema("legacy"), Ok(TileSchema::Legacy));
        assert_eq!(parse_schema("v2024"), Ok(TileSchema::V2024));
        assert_eq!(parse_schema("v2024-ext"), Ok(TileSchema::V2024Ext));
        assert!(parse_schema("v2023").is_err());
    }

    #[test]
    fn period_override_needs_both_dates() {
        assert!(period_override(Some("2024-01-01".into()), None).is_err());
        assert!(period_override(Some("2024-01-01".into()), Some("not-a-date".into())).is_err());
        let period = period_override(Some("2024-01-01".into()), Some("2024-01-31".into()))
            .unwrap()
            .unwrap();
        assert_eq!(period.starts.as_deref(), Some("2024-01-01"));
    }
}
