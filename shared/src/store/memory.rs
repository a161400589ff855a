//! In-memory object store, used by tests in place of S3.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Put,
    Exists,
    Delete,
}

/// Objects keyed by `(bucket, key)`.
///
/// Operations on keys under a prefix registered with one of the `fail_*_under`
/// hooks return an error, which is how tests exercise the failure paths.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), StoredObject>>,
    failures: RwLock<Vec<(Op, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without going through the trait.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Result<()> {
        self.write()?.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                content_type: String::new(),
            },
        );
        Ok(())
    }

    pub fn fail_puts_under(&self, prefix: &str) -> Result<()> {
        self.fail_under(Op::Put, prefix)
    }

    /// HEAD requests under `prefix` fail with something other than not-found.
    pub fn fail_exists_under(&self, prefix: &str) -> Result<()> {
        self.fail_under(Op::Exists, prefix)
    }

    pub fn fail_deletes_under(&self, prefix: &str) -> Result<()> {
        self.fail_under(Op::Delete, prefix)
    }

    fn fail_under(&self, op: Op, prefix: &str) -> Result<()> {
        self.failures
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?
            .push((op, prefix.to_string()));
        Ok(())
    }

    fn check(&self, op: Op, bucket: &str, key: &str) -> Result<()> {
        let failing = self
            .failures
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?
            .iter()
            .any(|(o, prefix)| *o == op && key.starts_with(prefix.as_str()));
        if failing {
            return Err(anyhow!(
                "s3 {:?} {}/{}: injected failure",
                op,
                bucket,
                key
            ));
        }
        Ok(())
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.read()
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// All keys in `bucket` starting with `prefix`, in key order.
    pub fn keys(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.read()
            .map(|objects| {
                objects
                    .keys()
                    .filter(|(b, k)| b == bucket && k.starts_with(prefix))
                    .map(|(_, k)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<(String, String), StoredObject>>> {
        self.objects
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<(String, String), StoredObject>>> {
        self.objects
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.object(bucket, key)
            .map(|o| o.body)
            .ok_or_else(|| anyhow!("s3 get {}/{}: NoSuchKey", bucket, key))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.check(Op::Put, bucket, key)?;
        self.write()?.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        self.check(Op::Exists, bucket, key)?;
        Ok(self.read()?.contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.check(Op::Delete, bucket, key)?;
        self.write()?.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
