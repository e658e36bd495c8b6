use super::*;
use crate::types::Event;

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn batch_emits_lifecycle_events() {
    let dir = scratch();
    let fetcher = Arc::new(StubFetcher::new().script(
        &url_for("retry"),
        vec![StubResponse::Refused, StubResponse::Png],
    ));
    let downloader = create_test_downloader(fetcher);
    let cached = request_in(dir.path(), "cached");
    std::fs::write(&cached.destination_path, PNG_BYTES).unwrap();

    let mut rx = downloader.subscribe();
    downloader
        .download_batch(vec![cached, request_in(dir.path(), "retry")])
        .await
        .unwrap();
    let events = drain(&mut rx);

    assert_eq!(
        events.first(),
        Some(&Event::BatchStarted {
            total: 2,
            to_fetch: 1
        })
    );
    assert!(events.contains(&Event::Skipped {
        identifier: "cached".into()
    }));
    assert!(events.contains(&Event::AttemptFailed {
        identifier: "retry".into(),
        attempt: 1,
        error: "connection failed: connection refused".into(),
        will_retry: true,
    }));
    assert!(events.contains(&Event::Succeeded {
        identifier: "retry".into(),
        attempts: 2,
        file_size: PNG_BYTES.len() as u64,
    }));
    assert!(matches!(
        events.last(),
        Some(Event::BatchFinished {
            succeeded: 1,
            failed: 0,
            skipped: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn final_failed_attempt_is_marked_as_not_retrying() {
    let dir = scratch();
    let fetcher =
        Arc::new(StubFetcher::new().script(&url_for("x"), vec![StubResponse::Status(500)]));
    let downloader = create_test_downloader(fetcher);

    let mut rx = downloader.subscribe();
    downloader
        .download_one(request_in(dir.path(), "x"))
        .await
        .unwrap();

    let retry_flags: Vec<(u32, bool)> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            Event::AttemptFailed {
                attempt,
                will_retry,
                ..
            } => Some((attempt, will_retry)),
            _ => None,
        })
        .collect();

    assert_eq!(retry_flags, vec![(1, true), (2, true), (3, false)]);
}

#[tokio::test]
async fn rejected_batch_emits_nothing() {
    let dir = scratch();
    let downloader = create_test_downloader(Arc::new(StubFetcher::new()));
    let request = request_in(dir.path(), "dup");

    let mut rx = downloader.subscribe();
    let result = downloader
        .download_batch(vec![request.clone(), request])
        .await;

    assert!(result.is_err());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn downloads_proceed_without_subscribers() {
    let dir = scratch();
    let downloader = create_test_downloader(Arc::new(StubFetcher::new()));

    let report = downloader
        .download_batch(vec![request_in(dir.path(), "solo")])
        .await
        .unwrap();

    assert_eq!(report.success_count(), 1);
}
