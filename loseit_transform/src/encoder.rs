//! Snappy-compressed Parquet encoding of curated records.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::mapping::{Column, TypedRecord};

/// Fixed leaf name of every curated partition.
pub const PART_FILE_NAME: &str = "part-0000.snappy.parquet";

/// `record_type` is the only required column.
pub fn curated_schema() -> SchemaRef {
    let fields = Column::ALL
        .iter()
        .map(|column| {
            let data_type = if column.is_numeric() {
                DataType::Float64
            } else {
                DataType::Utf8
            };
            Field::new(column.name(), data_type, *column != Column::RecordType)
        })
        .collect::<Vec<_>>();
    Arc::new(Schema::new(fields))
}

fn column_array(column: Column, records: &[TypedRecord]) -> ArrayRef {
    if column.is_numeric() {
        Arc::new(
            records
                .iter()
                .map(|r| r.number(column))
                .collect::<Float64Array>(),
        )
    } else {
        Arc::new(
            records
                .iter()
                .map(|r| r.text(column))
                .collect::<StringArray>(),
        )
    }
}

pub fn to_record_batch(records: &[TypedRecord]) -> Result<RecordBatch> {
    let arrays = Column::ALL
        .iter()
        .map(|column| column_array(*column, records))
        .collect::<Vec<_>>();
    Ok(RecordBatch::try_new(curated_schema(), arrays)?)
}

/// Encodes all records as a single Parquet file held in memory. Zero records
/// still produce a valid file with the full schema.
pub fn encode_parquet(records: &[TypedRecord]) -> Result<Vec<u8>> {
    let batch = to_record_batch(records)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let buf = Cursor::new(vec![]);
    let mut writer = ArrowWriter::try_new(buf, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.flush()?;

    let bytes = writer.into_inner()?.into_inner();
    Ok(bytes)
}
