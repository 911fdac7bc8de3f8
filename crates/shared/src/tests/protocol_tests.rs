use super::*;
use crate::{
    domain::FileDescriptor,
    error::{ErrorCode, UploadError},
};

#[test]
fn events_serialize_with_type_tag() {
    let record = UploadRecord::register(FileDescriptor::new("lease.docx", 10));
    let json = UploadEvent::Registered(record.clone())
        .to_json()
        .expect("json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");

    assert_eq!(value["type"], "registered");
    assert_eq!(value["payload"]["status"], "uploading");
    assert_eq!(value["payload"]["name"], "lease.docx");
    assert!(value["payload"].get("error").is_none());

    let cancelled = UploadEvent::Cancelled { id: record.id };
    assert_eq!(cancelled.id(), record.id);
    assert!(cancelled.record().is_none());
    assert!(cancelled.is_terminal());
}

#[test]
fn summary_counts_each_status() {
    let mut uploading = UploadRecord::register(FileDescriptor::new("a.pdf", 1));
    let mut processing = uploading.clone();
    processing.advance(100.0);
    let mut completed = processing.clone();
    completed.advance(100.0);
    uploading.advance(1.0);
    let mut failed = UploadRecord::register(FileDescriptor::new("b.pdf", 1));
    failed.fail("boom").expect("fail");

    let records = [uploading, processing, completed, failed];
    let summary = UploadSummary::from_records(&records);
    assert_eq!(
        summary,
        UploadSummary {
            total: 4,
            uploading: 1,
            processing: 1,
            completed: 1,
            failed: 1,
        }
    );
    assert_eq!(summary.active(), 2);
}

#[test]
fn receipt_omits_empty_rejections() {
    let receipt = SubmitReceipt::default();
    let json = serde_json::to_string(&receipt).expect("json");
    assert_eq!(json, r#"{"accepted":[]}"#);

    let err = UploadError::Validation("file name is empty".into());
    let rejection = Rejection {
        name: String::new(),
        error: ErrorReport::from(&err),
    };
    assert_eq!(rejection.error.code, ErrorCode::Validation);
    assert_eq!(rejection.error.message, "invalid submission: file name is empty");
}
