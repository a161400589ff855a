//! Object storage capability shared by both stages.
//!
//! Orchestrators receive an `&dyn ObjectStore` rather than building a client
//! themselves, so tests can swap in [`MemoryObjectStore`].

use anyhow::Result;
use async_trait::async_trait;

mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

pub const CONTENT_TYPE_EML: &str = "message/rfc822";
pub const CONTENT_TYPE_CSV: &str = "text/csv";
pub const CONTENT_TYPE_PARQUET: &str = "application/octet-stream";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches the full object body.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Writes (or overwrites) an object.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str)
        -> Result<()>;

    /// HEAD probe. A missing object is `Ok(false)`; any other failure is an error.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}
