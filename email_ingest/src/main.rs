use std::time::Instant;

use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use log::{error, info};
use serde_json::json;

use email_ingest::ingest_objects;
use shared::config::IngestConfig;
use shared::store::S3ObjectStore;
use shared::{log_service_summary, object_refs, setup_logging};

#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    setup_logging();

    let func = service_fn(handler);
    run(func).await?;

    Ok(())
}

async fn handler(event: LambdaEvent<S3Event>) -> Result<(), LambdaError> {
    let start = Instant::now();
    let config = IngestConfig::from_env()?;
    let store = S3ObjectStore::from_env().await;

    let objects = object_refs(&event.payload);
    info!("Received {} S3 records", objects.len());

    let result = ingest_objects(&store, &config, &objects).await;

    let mut summary = match &result {
        Ok(report) => report.summary(),
        Err(e) => {
            error!("email_ingest failed: {:#}", e);
            json!({ "type": "service_log", "service": "email_ingest", "records": objects.len() })
        }
    };
    summary["error"] = json!(result.is_err());
    summary["time"] = json!(i64::try_from(start.elapsed().as_millis()).ok());
    log_service_summary(summary);

    result?;
    Ok(())
}
