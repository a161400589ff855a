pub mod filter;
pub mod ingest;
pub mod message;
pub mod sanitize;

pub use ingest::{ingest_object, ingest_objects, IngestReport, RecordOutcome};
