// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end campaign behavior over a temp SQLite ledger.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{
    CampaignId, CampaignStatus, CourierError, JobId, JobStatus, LedgerAdapter, NewCampaign,
    NewJob,
};
use courier_dispatch::coordinator::{DUPLICATE, INVALID_ADDRESS};
use courier_dispatch::{
    CANCELLED, CampaignCoordinator, CampaignRequest, CoordinatorConfig, Dispatcher,
};
use courier_test_utils::{MockBehavior, MockProvider, TestHarness};

fn numbers(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("+1 (555) 01{i:02}")).collect()
}

fn as_refs(v: &[String]) -> Vec<&str> {
    v.iter().map(String::as_str).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn campaign_completes_with_consistent_counters() {
    let harness = TestHarness::builder().build().await.unwrap();
    let recipients = numbers(50);
    let receipt = harness.send(&as_refs(&recipients)).await.unwrap();
    assert_eq!(receipt.total, 50);
    assert_eq!(receipt.accepted(), 50);

    // Poll while jobs settle; the counters always add up.
    loop {
        let campaign = harness
            .coordinator
            .campaign(&receipt.campaign_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(campaign.queued + campaign.success + campaign.failed, campaign.total);
        if campaign.status == CampaignStatus::Completed {
            assert_eq!(campaign.success, 50);
            assert!(campaign.started_at.is_some());
            assert!(campaign.finished_at.is_some());
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let jobs = harness
        .coordinator
        .jobs(&receipt.campaign_id, None)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 50);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Success && j.attempts == 1));
    assert!(jobs.iter().all(|j| j.provider_message_id.is_some()));
    // Job order follows input order.
    assert_eq!(jobs[0].address, "+15550100");
    assert_eq!(jobs[49].address, "+15550149");
    harness.coordinator.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn always_failing_provider_still_completes_campaign() {
    let harness = TestHarness::builder()
        .with_provider(MockProvider::always_failing("invalid parameter"))
        .build()
        .await
        .unwrap();
    let receipt = harness.send(&["+15550001", "+15550002", "+15550003"]).await.unwrap();

    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!((campaign.success, campaign.failed), (0, 3));

    let failed = harness
        .coordinator
        .jobs(&receipt.campaign_id, Some(JobStatus::Failed))
        .await
        .unwrap();
    assert_eq!(failed.len(), 3);
    assert!(
        failed
            .iter()
            .all(|j| j.last_error.as_deref() == Some("invalid parameter"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn jobs_completing_in_the_same_drain_are_both_counted() {
    let harness = TestHarness::builder().build().await.unwrap();
    let receipt = harness.send(&["+15550001", "+15550002"]).await.unwrap();
    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!((campaign.success, campaign.failed, campaign.queued), (2, 0, 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn mixed_outcomes_are_recorded_per_job() {
    let provider = MockProvider::new()
        .with_address("+15550002", MockBehavior::Fail("number not on WhatsApp".into()))
        .with_address("+15550003", MockBehavior::TransportError("connection reset".into()));
    let harness = TestHarness::builder()
        .with_provider(provider)
        .build()
        .await
        .unwrap();
    let receipt = harness
        .send(&["+15550001", "+15550002", "+15550003"])
        .await
        .unwrap();
    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!((campaign.success, campaign.failed), (1, 2));

    let jobs = harness
        .coordinator
        .jobs(&receipt.campaign_id, None)
        .await
        .unwrap();
    assert_eq!(jobs[0].status, JobStatus::Success);
    assert_eq!(jobs[1].last_error.as_deref(), Some("number not on WhatsApp"));
    assert!(
        jobs[2]
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("connection reset"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_requests_are_rejected_before_anything_is_written() {
    let harness = TestHarness::builder().build().await.unwrap();

    let err = harness
        .coordinator
        .create_campaign(CampaignRequest {
            recipients: vec!["+15550001".into()],
            template_name: "   ".into(),
            ..CampaignRequest::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_validation(), "{err}");

    let err = harness.send(&["n/a", "+", ""]).await.unwrap_err();
    assert!(err.is_validation(), "{err}");

    let err = harness.send(&[]).await.unwrap_err();
    assert!(err.is_validation(), "{err}");

    assert!(harness.coordinator.campaigns(None, None).await.unwrap().is_empty());
    assert_eq!(harness.provider.call_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn recipients_are_normalized_and_not_deduplicated_by_default() {
    let harness = TestHarness::builder().build().await.unwrap();
    let receipt = harness
        .send(&["+1 (202) 555-0143", "not a number", "1-202-555-0143", "+1 202 555 0143"])
        .await
        .unwrap();

    assert_eq!(receipt.total, 3);
    assert_eq!(receipt.acks.len(), 4);
    assert_eq!(receipt.acks[0].address, "+12025550143");
    assert_eq!(receipt.acks[1].result, Err(INVALID_ADDRESS.to_string()));
    assert_eq!(receipt.acks[2].address, "12025550143");
    assert!(receipt.acks[3].result.is_ok());

    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!(campaign.success, 3);
    let sent = harness.provider.addresses().await;
    assert_eq!(sent.iter().filter(|a| *a == "+12025550143").count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn dedupe_keeps_first_occurrence() {
    let harness = TestHarness::builder().with_dedupe(true).build().await.unwrap();
    let receipt = harness
        .send(&["+1 202 555 0143", "+15550001", "+1 (202) 555-0143"])
        .await
        .unwrap();

    assert_eq!(receipt.total, 2);
    assert!(receipt.acks[0].result.is_ok());
    assert_eq!(receipt.acks[2].result, Err(DUPLICATE.to_string()));
    harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!(harness.provider.call_count().await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn language_defaults_and_components_flow_to_jobs() {
    let harness = TestHarness::builder().build().await.unwrap();
    let components = serde_json::json!([
        {"type": "body", "parameters": [{"type": "text", "text": "Ada"}]}
    ]);
    let receipt = harness
        .coordinator
        .create_campaign(CampaignRequest {
            recipients: vec!["+15550001".into()],
            template_name: "welcome".into(),
            language_code: Some("pt_BR".into()),
            components: Some(components.clone()),
        })
        .await
        .unwrap();
    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!(campaign.language_code, "pt_BR");
    assert_eq!(campaign.components.as_ref(), Some(&components));

    let jobs = harness
        .coordinator
        .jobs(&receipt.campaign_id, None)
        .await
        .unwrap();
    assert_eq!(jobs[0].template_name, "welcome");
    assert_eq!(jobs[0].components.as_ref(), Some(&components));

    let receipt = harness.send(&["+15550002"]).await.unwrap();
    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!(campaign.language_code, "en_US");
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_attempt_is_retried_when_policy_allows() {
    let provider = MockProvider::new().with_script(vec![MockBehavior::Fail("rate limited".into())]);
    let harness = TestHarness::builder()
        .with_provider(provider)
        .with_retries(3)
        .build()
        .await
        .unwrap();
    let receipt = harness.send(&["+15550001"]).await.unwrap();
    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!((campaign.success, campaign.failed), (1, 0));

    let jobs = harness
        .coordinator
        .jobs(&receipt.campaign_id, None)
        .await
        .unwrap();
    assert_eq!(jobs[0].attempts, 2);
    assert_eq!(jobs[0].status, JobStatus::Success);
    assert_eq!(harness.provider.call_count().await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_stop_at_max_attempts() {
    let harness = TestHarness::builder()
        .with_provider(MockProvider::always_failing("template paused"))
        .with_retries(3)
        .build()
        .await
        .unwrap();
    let receipt = harness.send(&["+15550001"]).await.unwrap();
    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!(campaign.failed, 1);

    let job = &harness
        .coordinator
        .jobs(&receipt.campaign_id, None)
        .await
        .unwrap()[0];
    assert_eq!(job.attempts, 3);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(harness.provider.call_count().await, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_removes_queued_jobs_and_completes_campaign() {
    let harness = TestHarness::builder()
        .with_rate(1, 500)
        .build()
        .await
        .unwrap();
    let receipt = harness.send(&as_refs(&numbers(6))).await.unwrap();

    let removed = harness
        .coordinator
        .cancel_campaign(&receipt.campaign_id)
        .await
        .unwrap();
    assert!(removed >= 5, "removed only {removed}");

    let campaign = harness.wait(&receipt.campaign_id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.failed as usize, removed);

    let cancelled = harness
        .coordinator
        .jobs(&receipt.campaign_id, Some(JobStatus::Failed))
        .await
        .unwrap();
    assert!(cancelled.iter().all(|j| j.last_error.as_deref() == Some(CANCELLED)));

    // Cancelling a finished campaign is a no-op.
    assert_eq!(
        harness
            .coordinator
            .cancel_campaign(&receipt.campaign_id)
            .await
            .unwrap(),
        0
    );
}

async fn wait_until_idle(coordinator: &CampaignCoordinator) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while coordinator.live_campaigns() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_campaign_is_forgotten_once_its_tracker_ends() {
    let harness = TestHarness::builder()
        .with_rate(1, 200)
        .build()
        .await
        .unwrap();
    let receipt = harness.send(&as_refs(&numbers(4))).await.unwrap();
    assert_eq!(harness.coordinator.live_campaigns(), 1);

    harness
        .coordinator
        .cancel_campaign(&receipt.campaign_id)
        .await
        .unwrap();
    harness.wait(&receipt.campaign_id).await.unwrap();
    wait_until_idle(&harness.coordinator).await;

    // A finished campaign stays forgotten when cancelled again.
    harness
        .coordinator
        .cancel_campaign(&receipt.campaign_id)
        .await
        .unwrap();
    assert_eq!(harness.coordinator.live_campaigns(), 0);
    harness.coordinator.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_without_a_running_tracker_leaves_no_mark() {
    let provider = MockProvider::new().with_script(vec![MockBehavior::Fail("rate limited".into())]);
    let harness = TestHarness::builder()
        .with_provider(provider)
        .with_retries(2)
        .build()
        .await
        .unwrap();

    // Open rows with nobody tracking them, as after a crash.
    let campaign_id = CampaignId::generate();
    harness
        .ledger
        .create_campaign(&NewCampaign {
            id: campaign_id.clone(),
            template_name: "order_update".into(),
            language_code: "en_US".into(),
            components: None,
            total: 1,
        })
        .await
        .unwrap();
    let job = NewJob {
        id: JobId::generate(),
        address: "+15550001".into(),
        template_name: "order_update".into(),
        language_code: "en_US".into(),
        components: None,
    };
    harness.ledger.insert_jobs(&campaign_id, vec![job]).await.unwrap();

    assert_eq!(harness.coordinator.cancel_campaign(&campaign_id).await.unwrap(), 0);
    assert_eq!(harness.coordinator.live_campaigns(), 0);

    // Recovered later, the job still gets its retry.
    assert_eq!(harness.coordinator.recover(0).await.unwrap(), 1);
    let campaign = harness.wait(&campaign_id).await.unwrap();
    assert_eq!((campaign.success, campaign.failed), (1, 0));
    assert_eq!(harness.provider.call_count().await, 2);
    wait_until_idle(&harness.coordinator).await;
    harness.coordinator.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_unknown_campaign_is_not_found() {
    let harness = TestHarness::builder().build().await.unwrap();
    let err = harness
        .coordinator
        .cancel_campaign(&CampaignId("missing".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::NotFound { kind: "campaign", .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn recover_resubmits_orphaned_jobs() {
    let harness = TestHarness::builder().build().await.unwrap();

    // Rows left behind by a process that died before dispatching.
    let campaign_id = CampaignId::generate();
    harness
        .ledger
        .create_campaign(&NewCampaign {
            id: campaign_id.clone(),
            template_name: "order_update".into(),
            language_code: "en_US".into(),
            components: None,
            total: 3,
        })
        .await
        .unwrap();
    let jobs = (0..3)
        .map(|i| NewJob {
            id: JobId::generate(),
            address: format!("+1555000{i}"),
            template_name: "order_update".into(),
            language_code: "en_US".into(),
            components: None,
        })
        .collect();
    harness.ledger.insert_jobs(&campaign_id, jobs).await.unwrap();

    let recovered = harness.coordinator.recover(0).await.unwrap();
    assert_eq!(recovered, 3);
    let campaign = harness.wait(&campaign_id).await.unwrap();
    assert_eq!(campaign.success, 3);

    // Nothing left to recover.
    assert_eq!(harness.coordinator.recover(0).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn jobs_dropped_at_shutdown_are_recovered_by_the_next_coordinator() {
    let harness = TestHarness::builder()
        .with_rate(1, 10_000)
        .build()
        .await
        .unwrap();
    let receipt = harness.send(&["+15550001", "+15550002", "+15550003"]).await.unwrap();

    // Let the first drain go out, then stop with two jobs still queued.
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.coordinator.shutdown().await.unwrap();

    let campaign = harness
        .coordinator
        .campaign(&receipt.campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((campaign.success, campaign.queued), (1, 2));

    let provider = Arc::new(MockProvider::new());
    let dispatcher = Arc::new(Dispatcher::new(&Default::default(), provider.clone()));
    let next = CampaignCoordinator::new(
        Arc::clone(&harness.ledger),
        dispatcher,
        CoordinatorConfig::from(&harness.config),
    );
    assert_eq!(next.recover(0).await.unwrap(), 2);

    let campaign = next
        .wait_for_completion(&receipt.campaign_id, Duration::from_millis(5))
        .await
        .unwrap();
    assert_eq!(campaign.success, 3);
    assert_eq!(provider.call_count().await, 2);
    next.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_projections() {
    let harness = TestHarness::builder()
        .with_provider(MockProvider::always_failing("nope"))
        .build()
        .await
        .unwrap();
    let a = harness.send(&["+1"]).await.unwrap();
    let b = harness.send(&["+2"]).await.unwrap();
    harness.wait(&a.campaign_id).await.unwrap();
    harness.wait(&b.campaign_id).await.unwrap();

    let all = harness.coordinator.campaigns(None, None).await.unwrap();
    assert_eq!(all.len(), 2);
    let completed = harness
        .coordinator
        .campaigns(Some(CampaignStatus::Completed), Some(1))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert!(
        harness
            .coordinator
            .campaigns(Some(CampaignStatus::Queued), None)
            .await
            .unwrap()
            .is_empty()
    );
}
