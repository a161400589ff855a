//! Environment-driven configuration for the two Lambda functions.
//!
//! Values are read through the `config` crate's environment source. Keys are
//! matched case-insensitively, so `EMAIL_BUCKET` fills `email_bucket`.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

fn default_incoming_prefix() -> String {
    "raw/email/incoming/".to_string()
}

fn default_raw_email_base() -> String {
    "raw/email/".to_string()
}

fn default_raw_csv_base() -> String {
    "raw/loseit_csv/".to_string()
}

fn default_allowed_sender_domain() -> String {
    "loseit.com".to_string()
}

fn default_curated_base() -> String {
    "curated/loseit_parquet/".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub email_bucket: String,
    #[serde(default = "default_incoming_prefix")]
    pub incoming_prefix: String,
    #[serde(default = "default_raw_email_base")]
    pub raw_email_base: String,
    #[serde(default = "default_raw_csv_base")]
    pub raw_csv_base: String,
    /// An explicitly empty value disables sender filtering.
    #[serde(default = "default_allowed_sender_domain")]
    pub allowed_sender_domain: String,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        load::<Self>(None)?.validate()
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        load::<Self>(Some(vars))?.validate()
    }

    pub fn allowed_domain(&self) -> Option<&str> {
        let domain = self.allowed_sender_domain.trim();
        (!domain.is_empty()).then_some(domain)
    }

    fn validate(self) -> Result<Self> {
        if self.email_bucket.trim().is_empty() {
            return Err(anyhow!("EMAIL_BUCKET env var is required"));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub data_bucket: String,
    #[serde(default = "default_raw_csv_base")]
    pub raw_csv_base: String,
    #[serde(default = "default_curated_base")]
    pub curated_base: String,
}

impl TransformConfig {
    pub fn from_env() -> Result<Self> {
        load::<Self>(None)?.validate()
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        load::<Self>(Some(vars))?.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.data_bucket.trim().is_empty() {
            return Err(anyhow!("DATA_BUCKET env var is required"));
        }
        Ok(self)
    }
}

/// `None` reads the process environment.
fn load<T: DeserializeOwned>(vars: Option<HashMap<String, String>>) -> Result<T> {
    config::Config::builder()
        .add_source(config::Environment::default().source(vars))
        .build()
        .context("Unable to read configuration from the environment")?
        .try_deserialize()
        .context("Invalid configuration in the environment")
}
