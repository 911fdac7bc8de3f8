use super::*;

fn record() -> UploadRecord {
    UploadRecord::register(FileDescriptor::new("contract.pdf", 2048))
}

#[test]
fn registered_record_starts_uploading_at_zero() {
    let record = record();
    assert_eq!(record.status, UploadStatus::Uploading);
    assert_eq!(record.progress, 0.0);
    assert_eq!(record.name, "contract.pdf");
    assert_eq!(record.size, 2048);
    assert!(record.error.is_none());
}

#[test]
fn registered_records_get_distinct_ids() {
    assert_ne!(record().id, record().id);
}

#[test]
fn crossing_upload_threshold_resets_progress_for_processing() {
    let mut record = record();
    assert_eq!(record.advance(60.0), Transition::Progressed);
    assert_eq!(record.progress, 60.0);

    assert_eq!(record.advance(60.0), Transition::PhaseChanged);
    assert_eq!(record.status, UploadStatus::Processing);
    assert_eq!(record.progress, 0.0);
}

#[test]
fn crossing_processing_threshold_completes_at_hundred() {
    let mut record = record();
    record.advance(100.0);
    assert_eq!(record.status, UploadStatus::Processing);

    assert_eq!(record.advance(70.0), Transition::Progressed);
    assert_eq!(record.advance(70.0), Transition::Completed);
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.progress, PROGRESS_MAX);
}

#[test]
fn terminal_record_ignores_further_ticks() {
    let mut record = record();
    record.advance(100.0);
    record.advance(100.0);
    let before = record.clone();

    assert_eq!(record.advance(10.0), Transition::Unchanged);
    assert_eq!(record, before);
}

#[test]
fn degenerate_steps_are_floored() {
    let mut record = record();
    record.advance(0.0);
    assert_eq!(record.progress, MIN_PROGRESS_STEP);
    record.advance(-5.0);
    assert_eq!(record.progress, 2.0 * MIN_PROGRESS_STEP);
    record.advance(f64::NAN);
    assert_eq!(record.progress, 3.0 * MIN_PROGRESS_STEP);
}

#[test]
fn zero_steps_still_finish_within_bound() {
    let mut record = record();
    let mut ticks = 0;
    while !record.is_terminal() {
        record.advance(0.0);
        ticks += 1;
        assert!(ticks <= 2 * max_ticks_per_phase(), "record never finished");
    }
    assert_eq!(record.status, UploadStatus::Completed);
}

#[test]
fn fail_sets_error_only_on_active_records() {
    let mut record = record();
    record.advance(30.0);

    assert_eq!(record.fail("parser crashed"), Ok(Transition::Failed));
    assert_eq!(record.status, UploadStatus::Error);
    assert_eq!(record.error.as_deref(), Some("parser crashed"));
    assert_eq!(record.progress, 30.0);

    let err = record.fail("again").expect_err("terminal record");
    assert!(matches!(
        err,
        UploadError::AlreadyTerminal {
            status: UploadStatus::Error,
            ..
        }
    ));
    assert_eq!(record.error.as_deref(), Some("parser crashed"));
}

#[test]
fn status_phase_mapping_round_trips() {
    assert_eq!(Phase::Uploading.status().phase(), Some(Phase::Uploading));
    assert_eq!(Phase::Processing.status().phase(), Some(Phase::Processing));
    assert_eq!(UploadStatus::Completed.phase(), None);
    assert!(UploadStatus::Error.is_terminal());
    assert!(!UploadStatus::Processing.is_terminal());
}
