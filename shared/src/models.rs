use aws_lambda_events::event::s3::S3Event;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::keys::decode_object_key;

/// A bucket/key pair taken from a storage notification.
///
/// `key` is kept exactly as delivered; call [`ObjectRef::decoded_key`] before
/// matching it against a prefix, since S3 encodes spaces as `+` and `=` as `%3D`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        ObjectRef {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn decoded_key(&self) -> String {
        decode_object_key(&self.key)
    }
}

/// Flattens an S3 notification into the objects it references.
pub fn object_refs(event: &S3Event) -> Vec<ObjectRef> {
    event
        .records
        .iter()
        .filter_map(|record| {
            let bucket = record.s3.bucket.name.as_ref();
            let key = record.s3.object.key.as_ref();
            match (bucket, key) {
                (Some(bucket), Some(key)) => Some(ObjectRef::new(bucket, key)),
                _ => {
                    warn!("Skipping S3 record without bucket or key: {:?}", record.s3);
                    None
                }
            }
        })
        .collect()
}
