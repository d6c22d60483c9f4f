use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Deal;
use crate::transform::{self, OfferPeriodRow, OfferSnapshotRow, ProductRow};

/// The wire shape the ingestion endpoint accepts: one batch of transformed
/// record triples per request.
#[derive(Debug, Serialize)]
pub struct Batch {
    pub products: Vec<ProductRow>,
    pub offer_periods: Vec<OfferPeriodRow>,
    pub offer_snapshots: Vec<OfferSnapshotRow>,
}

#[derive(Debug, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

pub fn batch_from(valid: &[Deal]) -> Batch {
    Batch {
        products: valid.iter().map(transform::product_row).collect(),
        offer_periods: valid.iter().map(transform::offer_period_row).collect(),
        offer_snapshots: valid.iter().map(transform::offer_snapshot_row).collect(),
    }
}

/// POST one batch and report the endpoint's verdict. Retries are the
/// caller's problem, not ours.
pub async fn post_batch(
    endpoint: &str,
    token: Option<&str>,
    batch: &Batch,
) -> Result<IngestResponse> {
    let client = reqwest::Client::new();
    let mut request = client.post(endpoint).json(batch);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await
        .with_context(|| format!("posting batch to {}", endpoint))?;
    let status = response.status();
    let body: IngestResponse = response
        .json()
        .await
        .with_context(|| format!("decoding ingest response (HTTP {})", status))?;
    info!(%status, success = body.success, "ingest response");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValidPeriod;

    #[test]
    fn batch_carries_one_row_per_table_per_deal() {
        let deal = Deal {
            sku: Some("1111161".into()),
            name: "Dixie Ultra Plates".into(),
            discount: Some(4.0),
            discount_type: Some("dollar".into()),
            valid_period: ValidPeriod {
                starts: Some("2025-05-14".into()),
                ends: Some("2025-06-08".into()),
            },
            ..Deal::default()
        };
        let batch = batch_from(&[deal]);
        assert_eq!(batch.products.len(), 1);
        assert_eq!(batch.offer_periods.len(), 1);
        assert_eq!(batch.offer_snapshots.len(), 1);

        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.contains(r#""products""#));
        assert!(json.contains(r#""sale_type":"dollar""#));
        assert!(json.contains(r#""region":"US""#));
    }
}
