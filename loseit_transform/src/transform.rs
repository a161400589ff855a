//! Per-object transform: CSV in, one curated Parquet partition out.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::json;
use shared::config::TransformConfig;
use shared::partition::PartitionKey;
use shared::store::{ObjectStore, CONTENT_TYPE_PARQUET};
use shared::ObjectRef;

use crate::csv_rows::read_rows;
use crate::encoder::{encode_parquet, PART_FILE_NAME};
use crate::mapping::map_row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Key outside the raw CSV base.
    Skipped,
    Written { output_key: String, rows: usize },
}

#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    pub outcomes: Vec<TransformOutcome>,
}

impl TransformReport {
    pub fn rows_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                TransformOutcome::Written { rows, .. } => *rows,
                TransformOutcome::Skipped => 0,
            })
            .sum()
    }

    pub fn summary(&self) -> serde_json::Value {
        let written = self
            .outcomes
            .iter()
            .filter(|o| matches!(o, TransformOutcome::Written { .. }))
            .count();
        json!({
            "type": "service_log",
            "service": "loseit_transform",
            "records": self.outcomes.len(),
            "skipped": self.outcomes.len() - written,
            "csv_processed": written,
            "rows_written": self.rows_written(),
        })
    }
}

/// The curated object key for a partition.
pub fn curated_key(config: &TransformConfig, partition: &PartitionKey) -> String {
    format!("{}{}{}", config.curated_base, partition.path(), PART_FILE_NAME)
}

pub async fn transform_objects(
    store: &dyn ObjectStore,
    config: &TransformConfig,
    objects: &[ObjectRef],
) -> Result<TransformReport> {
    let mut report = TransformReport::default();
    for object in objects {
        let outcome = transform_object(store, config, object, Utc::now()).await?;
        report.outcomes.push(outcome);
    }
    Ok(report)
}

/// Rewrites the day's curated partition from one extracted CSV.
///
/// The output path is fixed per day, so a later CSV for the same day replaces
/// the earlier file. Nothing is written unless every row maps and encodes.
pub async fn transform_object(
    store: &dyn ObjectStore,
    config: &TransformConfig,
    object: &ObjectRef,
    now: DateTime<Utc>,
) -> Result<TransformOutcome> {
    let bucket = object.bucket.as_str();
    let key = object.decoded_key();
    if !key.starts_with(&config.raw_csv_base) {
        info!("skip non-matching key: {}", key);
        return Ok(TransformOutcome::Skipped);
    }

    let partition = match PartitionKey::from_object_key(&key) {
        Some(partition) => partition,
        None => {
            warn!("cannot derive y/m/d from {}; using processing date", key);
            PartitionKey::from_datetime(now)
        }
    };

    let body = store.get(bucket, &key).await?;
    let rows = read_rows(&body)
        .await
        .with_context(|| format!("parse csv {}/{}", bucket, key))?;
    let records = rows.iter().map(map_row).collect::<Vec<_>>();
    let parquet = encode_parquet(&records).with_context(|| format!("encode {}", key))?;

    let output_key = curated_key(config, &partition);
    store
        .put(&config.data_bucket, &output_key, parquet, CONTENT_TYPE_PARQUET)
        .await
        .context("put parquet")?;
    info!(
        "wrote {} rows from {} to {}",
        records.len(),
        key,
        output_key
    );

    Ok(TransformOutcome::Written {
        output_key,
        rows: records.len(),
    })
}
