//! Batch orchestration tests: ordering, completeness, the concurrency
//! bound, failure isolation, cancellation, and the end-to-end scenarios.

use crate::error::{Error, TaskError};
use crate::pipeline::test_helpers::*;
use crate::pipeline::ResultSlots;
use crate::types::{BatchState, Event, TaskOutcome, TaskResult, UploadedFile};
use std::time::Duration;

fn ok_result(index: usize) -> TaskResult {
    TaskResult {
        index,
        uploaded: format!("file{index}.png"),
        outcome: TaskOutcome::Ok {
            english_name: format!("Asset {index}"),
            arabic_name: String::new(),
            tags: vec![],
        },
    }
}

// ---------------------------------------------------------------------------
// ResultSlots: the index-addressed fan-in container
// ---------------------------------------------------------------------------

#[test]
fn slots_record_each_index_exactly_once() {
    let slots = ResultSlots::new(3);

    assert!(slots.record(ok_result(1)));
    assert!(!slots.record(ok_result(1)), "second write to a slot is rejected");
    assert_eq!(slots.settled(), 1);
}

#[test]
fn slots_reject_out_of_range_indices() {
    let slots = ResultSlots::new(2);
    assert!(!slots.record(ok_result(5)));
    assert_eq!(slots.settled(), 0);
}

#[test]
fn ordered_results_unavailable_until_complete() {
    let slots = ResultSlots::new(2);
    slots.record(ok_result(1));
    assert!(slots.ordered_results().is_none());

    slots.record(ok_result(0));
    let results = slots.ordered_results().unwrap();
    assert_eq!(results[0].index, 0);
    assert_eq!(results[1].index, 1);
}

// ---------------------------------------------------------------------------
// Order and completeness invariants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_are_in_input_order_despite_scrambled_completion() {
    // Earlier tasks sleep longer, so completion order is roughly reversed
    let generator = FakeGenerator::with_delays(
        |seed| Duration::from_millis(60u64.saturating_sub(seed as u64 * 10)),
        |seed, _| Ok(ok_metadata(seed)),
    );
    let pipeline = test_pipeline(3, generator, FakeConverter::Slides(0));

    let files = (1..=6).map(|k| image_upload(&format!("img{k}.png"), k)).collect();
    let submission = pipeline.submit_batch(files, None).await.unwrap();
    wait_for_completion(&pipeline, &submission.batch_id).await;

    let rows = pipeline.export_rows(&submission.batch_id).await.unwrap();
    assert_eq!(rows.len(), 6);
    for (i, row) in rows.iter().enumerate() {
        let seed = i + 1;
        assert_eq!(row.uploaded, format!("img{seed}.png"), "row {i} out of order");
        assert_eq!(row.english_name, format!("Asset {seed}"));
    }
}

#[tokio::test]
async fn result_count_equals_task_count_even_with_failures() {
    let generator = FakeGenerator::new(|seed, _| {
        if seed % 2 == 0 {
            Err(TaskError::Service {
                status: 500,
                message: "boom".into(),
            })
        } else {
            Ok(ok_metadata(seed))
        }
    });
    let pipeline = test_pipeline(2, generator, FakeConverter::Slides(0));

    let files = (1..=7).map(|k| image_upload(&format!("img{k}.png"), k)).collect();
    let submission = pipeline.submit_batch(files, None).await.unwrap();
    let progress = wait_for_completion(&pipeline, &submission.batch_id).await;

    assert_eq!(progress.settled_tasks, 7);
    assert_eq!(progress.ok_tasks, 4);
    assert_eq!(progress.failed_tasks, 3);

    let rows = pipeline.export_rows(&submission.batch_id).await.unwrap();
    assert_eq!(rows.len(), 7, "no task is silently dropped");
}

// ---------------------------------------------------------------------------
// Concurrency bound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn in_flight_tasks_never_exceed_the_cap() {
    let generator = FakeGenerator::with_delays(
        |_| Duration::from_millis(40),
        |seed, _| Ok(ok_metadata(seed)),
    );
    let pipeline = test_pipeline(3, generator.clone(), FakeConverter::Slides(0));

    let files = (1..=9).map(|k| image_upload(&format!("img{k}.png"), k)).collect();
    let submission = pipeline.submit_batch(files, None).await.unwrap();
    wait_for_completion(&pipeline, &submission.batch_id).await;

    assert_eq!(generator.total_calls(), 9, "every task reached the service");
    assert!(
        generator.observed_max_in_flight() <= 3,
        "observed {} concurrent calls with cap 3",
        generator.observed_max_in_flight()
    );
}

#[tokio::test]
async fn cap_of_one_serializes_all_calls() {
    let generator = FakeGenerator::with_delays(
        |_| Duration::from_millis(10),
        |seed, _| Ok(ok_metadata(seed)),
    );
    let pipeline = test_pipeline(1, generator.clone(), FakeConverter::Slides(0));

    let files = (1..=4).map(|k| image_upload(&format!("img{k}.png"), k)).collect();
    let submission = pipeline.submit_batch(files, None).await.unwrap();
    wait_for_completion(&pipeline, &submission.batch_id).await;

    assert_eq!(generator.observed_max_in_flight(), 1);
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_failing_task_does_not_alter_its_siblings() {
    let failing_seed = 3u8;
    let generator = FakeGenerator::new(move |seed, _| {
        if seed == failing_seed {
            Err(TaskError::Transport("simulated timeout".into()))
        } else {
            Ok(ok_metadata(seed))
        }
    });
    let pipeline = test_pipeline(2, generator, FakeConverter::Slides(0));

    let files = (1..=5).map(|k| image_upload(&format!("img{k}.png"), k)).collect();
    let submission = pipeline.submit_batch(files, None).await.unwrap();
    wait_for_completion(&pipeline, &submission.batch_id).await;

    let rows = pipeline.export_rows(&submission.batch_id).await.unwrap();
    for (i, row) in rows.iter().enumerate() {
        let seed = (i + 1) as u8;
        if seed == failing_seed {
            let error = row.error.as_ref().expect("failing task must carry marker");
            assert!(error.contains("transport"));
        } else {
            assert!(row.error.is_none(), "sibling task {seed} was affected");
            assert_eq!(row.english_name, format!("Asset {seed}"));
        }
    }
}

// ---------------------------------------------------------------------------
// End-to-end: 3 images + 1 presentation with 2 slides, cap = 2
// ---------------------------------------------------------------------------

fn scenario_files() -> Vec<UploadedFile> {
    vec![
        image_upload("img1.png", 1),
        image_upload("img2.png", 2),
        image_upload("img3.png", 3),
        pptx_upload("deck.pptx"),
    ]
}

#[tokio::test]
async fn mixed_batch_produces_five_ordered_ok_results() {
    let pipeline = test_pipeline(2, FakeGenerator::always_ok(), FakeConverter::Slides(2));

    let submission = pipeline.submit_batch(scenario_files(), None).await.unwrap();
    assert_eq!(submission.total_tasks, 5);
    assert!(submission.warnings.is_empty());

    let progress = wait_for_completion(&pipeline, &submission.batch_id).await;
    assert_eq!(progress.ok_tasks, 5);
    assert_eq!(progress.failed_tasks, 0);

    let rows = pipeline.export_rows(&submission.batch_id).await.unwrap();
    let uploaded: Vec<&str> = rows.iter().map(|r| r.uploaded.as_str()).collect();
    assert_eq!(
        uploaded,
        vec![
            "img1.png",
            "img2.png",
            "img3.png",
            "deck.pptx (slide 1)",
            "deck.pptx (slide 2)",
        ]
    );
    assert!(rows.iter().all(|r| r.error.is_none()));
}

#[tokio::test]
async fn permanently_failing_slide_fails_alone() {
    // Slide 2 carries seed SLIDE_SEED_BASE + 2
    let generator = FakeGenerator::new(|seed, _| {
        if seed == SLIDE_SEED_BASE + 2 {
            Err(TaskError::Service {
                status: 500,
                message: "permanent failure".into(),
            })
        } else {
            Ok(ok_metadata(seed))
        }
    });
    let pipeline = test_pipeline(2, generator, FakeConverter::Slides(2));

    let submission = pipeline.submit_batch(scenario_files(), None).await.unwrap();
    let progress = wait_for_completion(&pipeline, &submission.batch_id).await;

    assert_eq!(progress.settled_tasks, 5, "all 5 results still produced");
    assert_eq!(progress.ok_tasks, 4);
    assert_eq!(progress.failed_tasks, 1);

    let rows = pipeline.export_rows(&submission.batch_id).await.unwrap();
    assert!(rows[4].error.as_ref().unwrap().contains("service"));
    assert_eq!(rows[4].uploaded, "deck.pptx (slide 2)");
    for row in &rows[..4] {
        assert!(row.error.is_none());
    }
}

#[tokio::test]
async fn rejected_file_produces_warning_and_batch_proceeds() {
    let pipeline = test_pipeline(2, FakeGenerator::always_ok(), FakeConverter::Slides(2));

    let mut files = scenario_files();
    files.push(UploadedFile {
        name: "notes.txt".to_string(),
        bytes: b"plain text".to_vec(),
    });

    let submission = pipeline.submit_batch(files, None).await.unwrap();
    assert_eq!(submission.total_tasks, 5, "rows come from valid files only");
    assert_eq!(submission.warnings.len(), 1);
    assert_eq!(submission.warnings[0].file, "notes.txt");

    let progress = wait_for_completion(&pipeline, &submission.batch_id).await;
    assert_eq!(progress.warnings.len(), 1, "warning survives on the batch");

    let rows = pipeline.export_rows(&submission.batch_id).await.unwrap();
    assert_eq!(rows.len(), 5);
}

// ---------------------------------------------------------------------------
// Retry behavior through the whole pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limited_task_succeeds_on_retry() {
    let generator = FakeGenerator::new(|seed, attempt| {
        if attempt == 1 {
            Err(TaskError::Service {
                status: 429,
                message: "rate limited".into(),
            })
        } else {
            Ok(ok_metadata(seed))
        }
    });
    let pipeline = test_pipeline(2, generator.clone(), FakeConverter::Slides(0));

    let submission = pipeline
        .submit_batch(vec![image_upload("img.png", 1)], None)
        .await
        .unwrap();
    let progress = wait_for_completion(&pipeline, &submission.batch_id).await;

    assert_eq!(progress.ok_tasks, 1);
    assert_eq!(generator.total_calls(), 2, "initial call + one retry");
}

#[tokio::test]
async fn pipeline_is_correct_with_retries_disabled() {
    let generator = FakeGenerator::new(|_, _| {
        Err(TaskError::Service {
            status: 429,
            message: "rate limited".into(),
        })
    });
    let mut config = crate::config::Config::default();
    config.pipeline.max_concurrent_tasks = 2;
    config.pipeline.retry.max_attempts = 0;
    let pipeline = crate::pipeline::AssetPipeline::with_collaborators(
        config,
        generator.clone(),
        std::sync::Arc::new(FakeConverter::Slides(0)),
    );

    let submission = pipeline
        .submit_batch(vec![image_upload("img.png", 1)], None)
        .await
        .unwrap();
    let progress = wait_for_completion(&pipeline, &submission.batch_id).await;

    assert_eq!(progress.failed_tasks, 1, "failure is reported, not dropped");
    assert_eq!(generator.total_calls(), 1, "no retry with max_attempts=0");
}

// ---------------------------------------------------------------------------
// Progress, state transitions, and events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_is_queryable_while_running() {
    let generator = FakeGenerator::with_delays(
        |_| Duration::from_millis(80),
        |seed, _| Ok(ok_metadata(seed)),
    );
    let pipeline = test_pipeline(1, generator, FakeConverter::Slides(0));

    let files = (1..=3).map(|k| image_upload(&format!("img{k}.png"), k)).collect();
    let submission = pipeline.submit_batch(files, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    let progress = pipeline.batch_progress(&submission.batch_id).await.unwrap();
    assert_ne!(progress.state, BatchState::Completed);
    assert!(progress.settled_tasks < progress.total_tasks);

    // Rows are refused until every task has settled
    let err = pipeline.export_rows(&submission.batch_id).await.unwrap_err();
    assert!(matches!(err, Error::BatchNotCompleted { .. }));

    wait_for_completion(&pipeline, &submission.batch_id).await;
}

#[tokio::test]
async fn completed_batch_emits_events_in_order() {
    let pipeline = test_pipeline(2, FakeGenerator::always_ok(), FakeConverter::Slides(0));
    let mut events = pipeline.subscribe();

    let submission = pipeline
        .submit_batch(vec![image_upload("a.png", 1), image_upload("b.png", 2)], None)
        .await
        .unwrap();
    wait_for_completion(&pipeline, &submission.batch_id).await;

    let mut saw_submitted = false;
    let mut settled_count = 0;
    loop {
        match tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
            Ok(Ok(Event::BatchSubmitted { total_tasks, .. })) => {
                assert_eq!(total_tasks, 2);
                saw_submitted = true;
            }
            Ok(Ok(Event::TaskSettled { ok, .. })) => {
                assert!(ok);
                settled_count += 1;
            }
            Ok(Ok(Event::BatchCompleted {
                ok_tasks,
                failed_tasks,
                ..
            })) => {
                assert_eq!(ok_tasks, 2);
                assert_eq!(failed_tasks, 0);
                break;
            }
            other => panic!("unexpected event flow: {other:?}"),
        }
    }
    assert!(saw_submitted);
    assert_eq!(settled_count, 2);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_batch_stops_admitting_and_loses_its_home() {
    let generator = FakeGenerator::with_delays(
        |_| Duration::from_millis(60),
        |seed, _| Ok(ok_metadata(seed)),
    );
    let pipeline = test_pipeline(1, generator.clone(), FakeConverter::Slides(0));

    let files = (1..=6).map(|k| image_upload(&format!("img{k}.png"), k)).collect();
    let submission = pipeline.submit_batch(files, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    pipeline.cancel_batch(&submission.batch_id).await.unwrap();

    // No addressable home afterwards
    let err = pipeline.batch_progress(&submission.batch_id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Give any in-flight call time to drain, then verify admission stopped
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        generator.total_calls() < 6,
        "cancellation must prevent new admissions"
    );
}

#[tokio::test]
async fn cancel_unknown_batch_is_not_found() {
    let pipeline = test_pipeline(1, FakeGenerator::always_ok(), FakeConverter::Slides(0));
    let err = pipeline
        .cancel_batch(&crate::types::BatchId::from("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Submission guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_upload_is_rejected() {
    let pipeline = test_pipeline(2, FakeGenerator::always_ok(), FakeConverter::Slides(0));
    let err = pipeline.submit_batch(vec![], None).await.unwrap_err();
    assert!(matches!(err, Error::EmptyBatch));
}

#[tokio::test]
async fn oversized_upload_is_rejected_with_counts() {
    let mut config = crate::config::Config::default();
    config.pipeline.max_files_per_batch = 2;
    let pipeline = crate::pipeline::AssetPipeline::with_collaborators(
        config,
        FakeGenerator::always_ok(),
        std::sync::Arc::new(FakeConverter::Slides(0)),
    );

    let files = (1..=3).map(|k| image_upload(&format!("img{k}.png"), k)).collect();
    let err = pipeline.submit_batch(files, None).await.unwrap_err();
    assert!(matches!(err, Error::TooManyFiles { limit: 2, count: 3 }));
}

#[tokio::test]
async fn batch_with_only_rejected_files_is_no_tasks() {
    let pipeline = test_pipeline(2, FakeGenerator::always_ok(), FakeConverter::Slides(0));
    let err = pipeline
        .submit_batch(
            vec![UploadedFile {
                name: "notes.txt".to_string(),
                bytes: vec![1, 2, 3],
            }],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoTasks));
}

#[tokio::test]
async fn shutdown_refuses_new_batches() {
    let pipeline = test_pipeline(2, FakeGenerator::always_ok(), FakeConverter::Slides(0));
    pipeline.shutdown().await;

    let err = pipeline
        .submit_batch(vec![image_upload("img.png", 1)], None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
}

#[tokio::test]
async fn batches_are_listed_newest_first() {
    let pipeline = test_pipeline(2, FakeGenerator::always_ok(), FakeConverter::Slides(0));

    let first = pipeline
        .submit_batch(vec![image_upload("a.png", 1)], None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = pipeline
        .submit_batch(vec![image_upload("b.png", 2)], None)
        .await
        .unwrap();

    wait_for_completion(&pipeline, &first.batch_id).await;
    wait_for_completion(&pipeline, &second.batch_id).await;

    let listed = pipeline.list_batches().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.batch_id);
    assert_eq!(listed[1].id, first.batch_id);
}
