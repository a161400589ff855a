//! Tolerant CSV reading into header-keyed rows.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use csv_async::{AsyncReaderBuilder, Trim};
use futures::StreamExt;

/// One data row keyed by normalized header name. Cells past the header's width
/// are dropped; missing trailing cells are simply absent.
pub type NormalizedRow = HashMap<String, String>;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// `" Protein (g) "` becomes `"protein_(g)"`.
pub fn normalize_header(header: &str) -> String {
    header.trim().replace(' ', "_").to_lowercase()
}

/// Reads every data row. Ragged rows are accepted; invalid UTF-8 or a missing
/// header row is an error.
pub async fn read_rows(data: &[u8]) -> Result<Vec<NormalizedRow>> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let mut reader = AsyncReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .create_reader(data);

    let headers = reader
        .headers()
        .await
        .context("read csv header")?
        .iter()
        .map(normalize_header)
        .collect::<Vec<_>>();
    if headers.is_empty() {
        return Err(anyhow!("csv has no header row"));
    }

    let mut rows = vec![];
    let mut records = reader.records();
    while let Some(record) = records.next().await {
        let record = record.with_context(|| format!("read csv row {}", rows.len() + 1))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.trim().to_string()))
            .collect::<NormalizedRow>();
        rows.push(row);
    }
    Ok(rows)
}
