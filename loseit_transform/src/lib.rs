pub mod csv_rows;
pub mod encoder;
pub mod mapping;
pub mod transform;

pub use transform::{curated_key, transform_object, transform_objects, TransformOutcome, TransformReport};
