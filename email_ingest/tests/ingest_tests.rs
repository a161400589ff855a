use chrono::{TimeZone, Utc};
use email_ingest::filter::RejectReason;
use email_ingest::{ingest_object, ingest_objects, RecordOutcome};
use shared::config::IngestConfig;
use shared::store::{MemoryObjectStore, ObjectStore, CONTENT_TYPE_CSV, CONTENT_TYPE_EML};
use shared::ObjectRef;

const BUCKET: &str = "diary-email";
const FIXTURE: &[u8] = include_bytes!("fixtures/loseit_example.eml");
const RAW_KEY: &str =
    "raw/email/year=2025/month=08/day=27/20250827193456.ABC123-mail.loseit.com.eml";
const CSV_KEY: &str = "raw/loseit_csv/year=2025/month=08/day=27/Daily_Report.csv";

fn config() -> IngestConfig {
    IngestConfig {
        email_bucket: BUCKET.to_string(),
        incoming_prefix: "raw/email/incoming/".to_string(),
        raw_email_base: "raw/email/".to_string(),
        raw_csv_base: "raw/loseit_csv/".to_string(),
        allowed_sender_domain: "loseit.com".to_string(),
    }
}

fn seeded(key: &str, body: &[u8]) -> (MemoryObjectStore, ObjectRef) {
    let store = MemoryObjectStore::new();
    store.insert(BUCKET, key, body).unwrap();
    (store, ObjectRef::new(BUCKET, key))
}

fn from_evil() -> Vec<u8> {
    String::from_utf8_lossy(FIXTURE)
        .replacen("From: \"Lose It!\" <reports@loseit.com>", "From: x@evil.com", 1)
        .into_bytes()
}

#[tokio::test]
async fn stores_raw_email_and_csv_attachment() {
    let (store, object) = seeded("raw/email/incoming/abc123", FIXTURE);

    let report = ingest_objects(&store, &config(), &[object]).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![RecordOutcome::Stored {
            raw_key: RAW_KEY.to_string(),
            csv_keys: vec![CSV_KEY.to_string()],
            failed_attachments: 0,
            degraded: false,
        }]
    );

    let raw = store.object(BUCKET, RAW_KEY).unwrap();
    assert_eq!(raw.body, FIXTURE);
    assert_eq!(raw.content_type, CONTENT_TYPE_EML);

    let csv = store.object(BUCKET, CSV_KEY).unwrap();
    assert_eq!(csv.content_type, CONTENT_TYPE_CSV);
    assert!(csv.body.starts_with(b"Date,Name,Type,Quantity"));
    assert_eq!(store.keys(BUCKET, "raw/email/year=").len(), 1);
    assert_eq!(store.keys(BUCKET, "raw/loseit_csv/").len(), 1);

    assert_eq!(report.summary()["csv_written"], 1);
}

#[tokio::test]
async fn reprocessing_overwrites_raw_copy_but_suffixes_csv() {
    let (store, object) = seeded("raw/email/incoming/abc123", FIXTURE);
    let now = Utc::now();

    ingest_object(&store, &config(), &object, now).await.unwrap();
    let second = ingest_object(&store, &config(), &object, now).await.unwrap();

    match second {
        RecordOutcome::Stored { raw_key, csv_keys, .. } => {
            assert_eq!(raw_key, RAW_KEY);
            assert_eq!(
                csv_keys,
                vec!["raw/loseit_csv/year=2025/month=08/day=27/Daily_Report-2.csv".to_string()]
            );
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(store.keys(BUCKET, "raw/email/year=").len(), 1);
    assert_eq!(store.keys(BUCKET, "raw/loseit_csv/").len(), 2);
}

#[tokio::test]
async fn wrong_domain_deletes_source_and_writes_nothing() {
    let incoming = "raw/email/incoming/evil";
    let (store, object) = seeded(incoming, &from_evil());

    let outcome = ingest_object(&store, &config(), &object, Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome, RecordOutcome::Rejected(RejectReason::WrongDomain));
    assert!(!store.exists(BUCKET, incoming).await.unwrap());
    assert!(store.keys(BUCKET, "").is_empty());
}

#[tokio::test]
async fn missing_from_is_rejected() {
    let raw = b"Date: Wed, 27 Aug 2025 12:34:56 -0700\r\nSubject: hi\r\n\r\nbody\r\n";
    let (store, object) = seeded("raw/email/incoming/nofrom", raw);

    let outcome = ingest_object(&store, &config(), &object, Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome, RecordOutcome::Rejected(RejectReason::NoFrom));
    assert!(store.keys(BUCKET, "").is_empty());
}

#[tokio::test]
async fn empty_domain_disables_filtering() {
    let (store, object) = seeded("raw/email/incoming/evil", &from_evil());
    let config = IngestConfig {
        allowed_sender_domain: String::new(),
        ..config()
    };

    let outcome = ingest_object(&store, &config, &object, Utc::now())
        .await
        .unwrap();

    assert!(matches!(outcome, RecordOutcome::Stored { .. }));
    assert!(store.object(BUCKET, CSV_KEY).is_some());
}

#[tokio::test]
async fn keys_outside_incoming_prefix_are_skipped() {
    let (store, object) = seeded("raw/email/year=2025/month=08/day=27/x.eml", FIXTURE);

    let outcome = ingest_object(&store, &config(), &object, Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome, RecordOutcome::Skipped);
    assert_eq!(store.keys(BUCKET, "").len(), 1);
}

#[tokio::test]
async fn encoded_notification_key_is_decoded() {
    let store = MemoryObjectStore::new();
    store
        .insert(BUCKET, "raw/email/incoming/a b", FIXTURE)
        .unwrap();
    let object = ObjectRef::new(BUCKET, "raw/email/incoming/a+b");

    let outcome = ingest_object(&store, &config(), &object, Utc::now())
        .await
        .unwrap();

    assert!(matches!(outcome, RecordOutcome::Stored { .. }));
}

#[tokio::test]
async fn attachment_put_failure_is_not_fatal() {
    let (store, object) = seeded("raw/email/incoming/abc123", FIXTURE);
    store.fail_puts_under("raw/loseit_csv/").unwrap();

    let outcome = ingest_object(&store, &config(), &object, Utc::now())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RecordOutcome::Stored {
            raw_key: RAW_KEY.to_string(),
            csv_keys: vec![],
            failed_attachments: 1,
            degraded: false,
        }
    );
    assert!(store.object(BUCKET, RAW_KEY).is_some());
}

#[tokio::test]
async fn raw_put_failure_aborts_the_batch() {
    let (store, object) = seeded("raw/email/incoming/abc123", FIXTURE);
    store.fail_puts_under("raw/email/year=").unwrap();

    let err = ingest_objects(&store, &config(), &[object]).await.unwrap_err();

    assert!(format!("{:#}", err).contains("put raw eml"));
    assert!(store.keys(BUCKET, "raw/loseit_csv/").is_empty());
}

#[tokio::test]
async fn missing_source_object_is_fatal() {
    let store = MemoryObjectStore::new();
    let object = ObjectRef::new(BUCKET, "raw/email/incoming/gone");

    assert!(ingest_object(&store, &config(), &object, Utc::now())
        .await
        .is_err());
}

#[tokio::test]
async fn undated_message_uses_processing_time_and_generated_id() {
    let raw = b"From: reports@loseit.com\r\n\
Content-Type: multipart/mixed; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
Content-Type: text/csv\r\n\
Content-Disposition: attachment\r\n\
\r\n\
Date,Name\r\n\
08/27/2025,Apple\r\n\
--B--\r\n";
    let (store, object) = seeded("raw/email/incoming/undated", raw);
    let now = Utc.with_ymd_and_hms(2024, 1, 5, 23, 0, 0).unwrap();

    let outcome = ingest_object(&store, &config(), &object, now).await.unwrap();

    match outcome {
        RecordOutcome::Stored { raw_key, csv_keys, .. } => {
            assert!(raw_key.starts_with("raw/email/year=2024/month=01/day=05/"));
            assert!(raw_key.ends_with(".eml"));
            assert_eq!(
                csv_keys,
                vec!["raw/loseit_csv/year=2024/month=01/day=05/loseit-daily.csv".to_string()]
            );
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn unparsable_mime_keeps_raw_copy_only() {
    let (store, object) = seeded("raw/email/incoming/empty", b"");
    let config = IngestConfig {
        allowed_sender_domain: String::new(),
        ..config()
    };

    let report = ingest_objects(&store, &config, &[object]).await.unwrap();

    match &report.outcomes[..] {
        [RecordOutcome::Stored {
            raw_key,
            csv_keys,
            failed_attachments: 0,
            degraded: true,
        }] => {
            assert!(raw_key.starts_with("raw/email/year="));
            assert!(raw_key.ends_with(".eml"));
            assert!(csv_keys.is_empty());
            assert!(store.object(BUCKET, raw_key).is_some());
        }
        other => panic!("unexpected outcomes {:?}", other),
    }
    assert_eq!(report.summary()["degraded"], 1);
    assert!(store.keys(BUCKET, "raw/loseit_csv/").is_empty());
}

#[tokio::test]
async fn failed_delete_of_rejected_email_is_not_fatal() {
    let incoming = "raw/email/incoming/evil";
    let (store, object) = seeded(incoming, &from_evil());
    store.fail_deletes_under("raw/email/incoming/").unwrap();

    let report = ingest_objects(&store, &config(), &[object]).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![RecordOutcome::Rejected(RejectReason::WrongDomain)]
    );
    assert!(store.exists(BUCKET, incoming).await.unwrap());
    assert_eq!(store.keys(BUCKET, "").len(), 1);
}

#[tokio::test]
async fn failed_existence_check_uses_canonical_key() {
    let (store, object) = seeded("raw/email/incoming/abc123", FIXTURE);
    store.insert(BUCKET, CSV_KEY, "older export").unwrap();
    store.fail_exists_under("raw/loseit_csv/").unwrap();

    let outcome = ingest_object(&store, &config(), &object, Utc::now())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        RecordOutcome::Stored { ref csv_keys, .. } if csv_keys == &vec![CSV_KEY.to_string()]
    ));
    assert!(store.object(BUCKET, CSV_KEY).unwrap().body.starts_with(b"Date,Name"));
}
