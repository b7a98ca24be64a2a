// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-cap behavior of the dispatcher on a paused tokio clock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use courier_config::model::DispatchConfig;
use courier_core::{CampaignId, CourierError, JobId, SendOutcome, TemplateMessage};
use courier_dispatch::{DispatchReceipt, DispatchRequest, Dispatcher};
use courier_test_utils::{MockBehavior, MockProvider};
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

fn dispatcher(provider: &Arc<MockProvider>, per_window: usize) -> Dispatcher {
    let config = DispatchConfig {
        window_ms: WINDOW.as_millis() as u64,
        per_window,
    };
    Dispatcher::new(&config, provider.clone())
}

fn request(campaign: &CampaignId, address: String) -> DispatchRequest {
    DispatchRequest {
        job_id: JobId::generate(),
        campaign_id: campaign.clone(),
        message: TemplateMessage {
            address,
            template_name: "order_update".into(),
            language_code: "en_US".into(),
            components: None,
        },
    }
}

fn submit_many(dispatcher: &Dispatcher, campaign: &CampaignId, n: usize) -> Vec<DispatchReceipt> {
    (0..n)
        .map(|i| {
            dispatcher
                .submit(request(campaign, format!("+1555{i:04}")))
                .unwrap()
        })
        .collect()
}

async fn settle_all(receipts: Vec<DispatchReceipt>) -> Vec<SendOutcome> {
    let mut outcomes = Vec::with_capacity(receipts.len());
    for receipt in receipts {
        outcomes.push(receipt.await.unwrap());
    }
    outcomes
}

#[tokio::test(start_paused = true)]
async fn forty_five_jobs_at_twenty_per_window_take_three_drains() {
    let provider = Arc::new(MockProvider::new());
    let dispatcher = dispatcher(&provider, 20);
    let campaign = CampaignId::generate();

    let start = Instant::now();
    let receipts = submit_many(&dispatcher, &campaign, 45);
    let outcomes = settle_all(receipts).await;
    let elapsed = start.elapsed();

    assert!(outcomes.iter().all(SendOutcome::is_delivered));
    assert!(elapsed >= 2 * WINDOW, "finished too early: {elapsed:?}");
    assert!(elapsed < 3 * WINDOW, "finished too late: {elapsed:?}");
    assert_eq!(provider.call_count().await, 45);
    assert_eq!(provider.max_calls_within(WINDOW).await, 20);
}

#[tokio::test(start_paused = true)]
async fn calls_within_one_drain_are_concurrent() {
    let provider = Arc::new(MockProvider::new().with_latency(Duration::from_millis(400)));
    let dispatcher = dispatcher(&provider, 20);
    let campaign = CampaignId::generate();

    let start = Instant::now();
    settle_all(submit_many(&dispatcher, &campaign, 40)).await;
    let elapsed = start.elapsed();

    // Two drains plus one call latency; sequential sends would take 16 s.
    assert!(elapsed >= WINDOW + Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < WINDOW + Duration::from_millis(500), "{elapsed:?}");
    // All twenty calls of a drain start at the same instant.
    assert_eq!(provider.max_calls_within(Duration::from_millis(1)).await, 20);
}

#[tokio::test(start_paused = true)]
async fn idle_windows_do_not_bank_capacity() {
    let provider = Arc::new(MockProvider::new());
    let dispatcher = dispatcher(&provider, 10);
    let campaign = CampaignId::generate();

    settle_all(submit_many(&dispatcher, &campaign, 1)).await;
    tokio::time::sleep(10 * WINDOW).await;

    settle_all(submit_many(&dispatcher, &campaign, 35)).await;
    assert_eq!(provider.call_count().await, 36);
    assert!(provider.max_calls_within(WINDOW).await <= 10);
}

#[tokio::test(start_paused = true)]
async fn campaigns_share_one_ceiling_in_submission_order() {
    let provider = Arc::new(MockProvider::new());
    let dispatcher = dispatcher(&provider, 5);
    let first = CampaignId::generate();
    let second = CampaignId::generate();

    let mut receipts = Vec::new();
    let mut submitted = Vec::new();
    for i in 0..8 {
        for (campaign, tag) in [(&first, "1"), (&second, "2")] {
            let address = format!("+{tag}00{i}");
            submitted.push(address.clone());
            receipts.push(dispatcher.submit(request(campaign, address)).unwrap());
        }
    }
    settle_all(receipts).await;

    assert!(provider.max_calls_within(WINDOW).await <= 5);
    let calls = provider.calls().await;
    assert_eq!(calls.len(), 16);
    // Each drain releases the next five in FIFO order.
    for (chunk_calls, chunk_submitted) in calls.chunks(5).zip(submitted.chunks(5)) {
        let got: HashSet<_> = chunk_calls.iter().map(|c| c.address.as_str()).collect();
        let want: HashSet<_> = chunk_submitted.iter().map(String::as_str).collect();
        assert_eq!(got, want);
    }
}

#[tokio::test(start_paused = true)]
async fn provider_faults_resolve_as_failures_and_drain_continues() {
    let provider = Arc::new(MockProvider::new().with_script(vec![
        MockBehavior::Panic("provider bug".into()),
        MockBehavior::TransportError("connection reset".into()),
        MockBehavior::Fail("template not approved".into()),
    ]));
    let dispatcher = dispatcher(&provider, 1);
    let campaign = CampaignId::generate();

    let outcomes = settle_all(submit_many(&dispatcher, &campaign, 4)).await;
    match &outcomes[0] {
        SendOutcome::Failed { error } => assert!(error.contains("provider bug"), "{error}"),
        other => panic!("expected failure, got {other:?}"),
    }
    match &outcomes[1] {
        SendOutcome::Failed { error } => assert!(error.contains("connection reset"), "{error}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(outcomes[2], SendOutcome::failure("template not approved"));
    assert!(outcomes[3].is_delivered());

    // The loop is still alive for later submissions.
    let later = dispatcher
        .submit(request(&campaign, "+19990000".into()))
        .unwrap()
        .await
        .unwrap();
    assert!(later.is_delivered());
}

#[tokio::test(start_paused = true)]
async fn stopped_dispatcher_restarts_on_next_submit() {
    let provider = Arc::new(MockProvider::new());
    let dispatcher = dispatcher(&provider, 1);
    let campaign = CampaignId::generate();

    let receipts = submit_many(&dispatcher, &campaign, 3);
    dispatcher.stop().await.unwrap();
    for receipt in receipts {
        assert!(matches!(receipt.await, Err(CourierError::Dispatch(_))));
    }
    assert_eq!(dispatcher.pending(), 0);

    let outcome = dispatcher
        .submit(request(&campaign, "+1".into()))
        .unwrap()
        .await
        .unwrap();
    assert!(outcome.is_delivered());
}
