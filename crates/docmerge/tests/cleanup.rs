//! Retention and purge behavior: finished jobs disappear together with
//! their files.

mod common;

use common::harness::submission;
use common::*;
use docmerge::{FetchError, JobState};

#[tokio::test(flavor = "multi_thread")]
async fn test_completed_job_is_removed_after_retention() {
    let harness = TestHarness::new();
    let service = harness.service_with_config(harness.config().retention_seconds(1).build());

    let job_id = service
        .submit(submission(
            docx_upload("cover.docx", &["Cover"]),
            vec![pdf_upload("a.pdf", &["A"])],
            "append",
        ))
        .await
        .unwrap();

    let job = harness.wait_for_terminal(&service, &job_id).await;
    assert_eq!(job.state, JobState::Completed);
    let archive = job.result_path.clone().unwrap();
    assert!(archive.is_file());

    harness.wait_for_removal(&service, &job_id).await;

    assert!(matches!(
        service.fetch(&job_id).await,
        Err(FetchError::JobNotFound(_))
    ));
    assert!(!archive.exists());
    assert!(!harness.upload_root().join(&job_id).exists());
    assert!(!harness.results_root().join(&job_id).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_job_is_removed_after_retention() {
    let harness = TestHarness::new();
    let service = harness.configured_service(
        harness
            .config()
            .without_converters()
            .retention_seconds(1)
            .build(),
    );

    let job_id = service
        .submit(submission(
            docx_upload("cover.docx", &["Cover"]),
            vec![pdf_upload("a.pdf", &["A"])],
            "append",
        ))
        .await
        .unwrap();

    assert_eq!(
        harness.wait_for_terminal(&service, &job_id).await.state,
        JobState::Error
    );
    harness.wait_for_removal(&service, &job_id).await;
    assert!(!harness.upload_root().join(&job_id).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_job_is_kept_within_retention() {
    let harness = TestHarness::new();
    let service = harness.service();

    let job_id = service
        .submit(submission(
            docx_upload("cover.docx", &["Cover"]),
            vec![pdf_upload("a.pdf", &["A"])],
            "append",
        ))
        .await
        .unwrap();

    harness.wait_for_terminal(&service, &job_id).await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert!(service.poll(&job_id).is_some());
    assert!(service.fetch(&job_id).await.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_purge_removes_finished_job_immediately() {
    let harness = TestHarness::new();
    let service = harness.service();

    let job_id = service
        .submit(submission(
            docx_upload("cover.docx", &["Cover"]),
            vec![pdf_upload("a.pdf", &["A"])],
            "append",
        ))
        .await
        .unwrap();

    let job = harness.wait_for_terminal(&service, &job_id).await;
    assert!(service.purge(&job_id).await);

    assert!(service.poll(&job_id).is_none());
    assert!(!job.result_path.unwrap().exists());
    assert!(!harness.results_root().join(&job_id).exists());
    assert!(!service.purge(&job_id).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_purge_of_unknown_job() {
    let harness = TestHarness::new();
    let service = harness.service();

    assert!(!service.purge("no-such-job").await);
}
