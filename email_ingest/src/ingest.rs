//! Per-object ingestion: fetch, filter, persist the raw copy, extract CSVs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde_json::json;
use shared::config::IngestConfig;
use shared::partition::PartitionKey;
use shared::store::{ObjectStore, CONTENT_TYPE_CSV, CONTENT_TYPE_EML};
use shared::ObjectRef;
use uuid::Uuid;

use crate::filter::{check_sender, FilterDecision, RejectReason};
use crate::message::{extract_csv_attachments, HeaderView};
use crate::sanitize::{message_id_or_generated, sanitize_filename};

/// Leaf name for a CSV attachment that arrives without a file name.
pub const DEFAULT_CSV_NAME: &str = "loseit-daily.csv";

/// Probes (canonical key included) before falling back to a random suffix.
pub const MAX_KEY_PROBES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Key outside the incoming prefix; nothing was read.
    Skipped,
    /// Sender failed the domain check; the source object was deleted.
    Rejected(RejectReason),
    Stored {
        raw_key: String,
        csv_keys: Vec<String>,
        failed_attachments: usize,
        /// MIME parsing failed, so only the raw copy was written.
        degraded: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub outcomes: Vec<RecordOutcome>,
}

impl IngestReport {
    pub fn csv_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .flat_map(|o| match o {
                RecordOutcome::Stored { csv_keys, .. } => csv_keys.as_slice(),
                _ => &[][..],
            })
            .map(String::as_str)
            .collect()
    }

    pub fn summary(&self) -> serde_json::Value {
        let count = |pred: fn(&RecordOutcome) -> bool| self.outcomes.iter().filter(|o| pred(o)).count();
        let failed_attachments: usize = self
            .outcomes
            .iter()
            .map(|o| match o {
                RecordOutcome::Stored {
                    failed_attachments, ..
                } => *failed_attachments,
                _ => 0,
            })
            .sum();
        json!({
            "type": "service_log",
            "service": "email_ingest",
            "records": self.outcomes.len(),
            "skipped": count(|o| matches!(o, RecordOutcome::Skipped)),
            "rejected": count(|o| matches!(o, RecordOutcome::Rejected(_))),
            "stored": count(|o| matches!(o, RecordOutcome::Stored { .. })),
            "degraded": count(|o| matches!(o, RecordOutcome::Stored { degraded: true, .. })),
            "csv_written": self.csv_keys().len(),
            "csv_failed": failed_attachments,
        })
    }
}

/// Processes a batch of notifications strictly in order.
///
/// The first fatal error (fetch or raw-copy write) aborts the batch; the
/// platform's redelivery takes it from there.
pub async fn ingest_objects(
    store: &dyn ObjectStore,
    config: &IngestConfig,
    objects: &[ObjectRef],
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for object in objects {
        let outcome = ingest_object(store, config, object, Utc::now()).await?;
        report.outcomes.push(outcome);
    }
    Ok(report)
}

/// Ingests one raw email. `now` dates messages without a usable `Date` header.
pub async fn ingest_object(
    store: &dyn ObjectStore,
    config: &IngestConfig,
    object: &ObjectRef,
    now: DateTime<Utc>,
) -> Result<RecordOutcome> {
    let bucket = object.bucket.as_str();
    let key = object.decoded_key();
    if !key.starts_with(&config.incoming_prefix) {
        info!("skip key without incoming prefix: {}", key);
        return Ok(RecordOutcome::Skipped);
    }

    let raw = store.get(bucket, &key).await?;
    let headers = HeaderView::parse(&raw);

    if let Some(allowed_domain) = config.allowed_domain() {
        match check_sender(&headers, Some(allowed_domain)) {
            FilterDecision::Accept => {
                info!("email from allowed domain '{}', processing", allowed_domain);
            }
            FilterDecision::Reject(reason) => {
                warn!(
                    "rejecting email {}/{} ({}), From: {:?}",
                    bucket, key, reason, headers.from
                );
                match store.delete(bucket, &key).await {
                    Ok(()) => info!("deleted email {}/{} ({})", bucket, key, reason),
                    Err(e) => error!("failed to delete email {}/{}: {:#}", bucket, key, e),
                }
                return Ok(RecordOutcome::Rejected(reason));
            }
        }
    }

    let message_id = message_id_or_generated(headers.message_id.as_deref());
    let partition = PartitionKey::from_date_header(headers.date.as_deref(), now);
    let attachments = extract_csv_attachments(&raw);

    let raw_key = format!(
        "{}{}{}.eml",
        config.raw_email_base,
        partition.path(),
        message_id
    );
    store
        .put(&config.email_bucket, &raw_key, raw, CONTENT_TYPE_EML)
        .await
        .context("put raw eml")?;
    info!("stored raw email at {}", raw_key);

    let attachments = match attachments {
        Ok(attachments) => attachments,
        Err(e) => {
            warn!("{} for {}; continuing with raw only", e, key);
            return Ok(RecordOutcome::Stored {
                raw_key,
                csv_keys: vec![],
                failed_attachments: 0,
                degraded: true,
            });
        }
    };

    let mut csv_keys = vec![];
    let mut failed_attachments = 0;
    for attachment in attachments {
        if attachment.bytes.is_empty() {
            warn!("attachment {} has no content", attachment.file_name);
            continue;
        }
        let leaf = match attachment.file_name.trim() {
            "" => DEFAULT_CSV_NAME.to_string(),
            name => sanitize_filename(name),
        };
        let canonical = format!("{}{}{}", config.raw_csv_base, partition.path(), leaf);
        let csv_key = ensure_unique_key(store, &config.email_bucket, &canonical).await;

        match store
            .put(&config.email_bucket, &csv_key, attachment.bytes, CONTENT_TYPE_CSV)
            .await
        {
            Ok(()) => {
                info!("stored csv attachment at {}", csv_key);
                csv_keys.push(csv_key);
            }
            Err(e) => {
                warn!("put csv {}: {:#}", csv_key, e);
                failed_attachments += 1;
            }
        }
    }

    Ok(RecordOutcome::Stored {
        raw_key,
        csv_keys,
        failed_attachments,
        degraded: false,
    })
}

/// Resolves a key that does not yet exist in `bucket`.
///
/// Tries `key`, then `-2`, `-3`, ... inserted before the leaf's extension, up to
/// [`MAX_KEY_PROBES`] probes, then a UUID suffix. The probe and the later write
/// are not atomic: two concurrent writers can both see a key as free.
pub async fn ensure_unique_key(store: &dyn ObjectStore, bucket: &str, key: &str) -> String {
    let (stem, ext) = split_extension(key);
    let mut candidate = key.to_string();
    for attempt in 1..=MAX_KEY_PROBES {
        if attempt > 1 {
            candidate = format!("{}-{}{}", stem, attempt, ext);
        }
        match store.exists(bucket, &candidate).await {
            Ok(false) => return candidate,
            Ok(true) => {}
            Err(e) => {
                warn!("probe {} failed ({:#}); assuming it is free", candidate, e);
                return candidate;
            }
        }
    }
    format!("{}-{}{}", stem, Uuid::new_v4(), ext)
}

/// Splits off the extension of the last path segment, dot included.
fn split_extension(key: &str) -> (&str, &str) {
    let leaf_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[leaf_start..].rfind('.') {
        Some(dot) => key.split_at(leaf_start + dot),
        None => (key, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::store::MemoryObjectStore;

    #[test]
    fn extension_split_only_looks_at_the_leaf() {
        assert_eq!(
            split_extension("raw/loseit_csv/year=2025/report.csv"),
            ("raw/loseit_csv/year=2025/report", ".csv")
        );
        assert_eq!(split_extension("a.b/noext"), ("a.b/noext", ""));
        assert_eq!(split_extension("x.tar.gz"), ("x.tar", ".gz"));
    }

    #[tokio::test]
    async fn free_canonical_key_is_used_as_is() {
        let store = MemoryObjectStore::new();
        let key = ensure_unique_key(&store, "b", "day=27/report.csv").await;
        assert_eq!(key, "day=27/report.csv");
    }

    #[tokio::test]
    async fn taken_keys_get_numeric_suffixes() {
        let store = MemoryObjectStore::new();
        store.insert("b", "day=27/report.csv", "x").unwrap();
        assert_eq!(
            ensure_unique_key(&store, "b", "day=27/report.csv").await,
            "day=27/report-2.csv"
        );

        store.insert("b", "day=27/report-2.csv", "x").unwrap();
        store.insert("b", "day=27/report-3.csv", "x").unwrap();
        assert_eq!(
            ensure_unique_key(&store, "b", "day=27/report.csv").await,
            "day=27/report-4.csv"
        );
    }

    #[tokio::test]
    async fn exhausted_probes_fall_back_to_random_suffix() {
        let store = MemoryObjectStore::new();
        store.insert("b", "d/report.csv", "x").unwrap();
        for n in 2..=MAX_KEY_PROBES {
            store.insert("b", &format!("d/report-{}.csv", n), "x").unwrap();
        }

        let key = ensure_unique_key(&store, "b", "d/report.csv").await;
        assert!(key.starts_with("d/report-"));
        assert!(key.ends_with(".csv"));
        let suffix = &key["d/report-".len()..key.len() - ".csv".len()];
        assert!(Uuid::parse_str(suffix).is_ok(), "unexpected key {}", key);
        assert!(!store.exists("b", &key).await.unwrap());
    }
}
