// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with scripted outcomes and
//! records when each call started, so tests can check the rate cap against
//! the tokio clock (paused or real).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use courier_core::types::{AdapterType, HealthStatus};
use courier_core::{CourierError, PluginAdapter, ProviderAdapter, SendOutcome, TemplateMessage};

/// What the mock does for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Accept and return a generated message id.
    Deliver,
    /// Return a provider-reported failure.
    Fail(String),
    /// Return a transport error (`Err`).
    TransportError(String),
    /// Panic inside `send`.
    Panic(String),
}

/// One recorded provider call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub address: String,
    pub template_name: String,
    pub at: Instant,
}

/// A mock provider with scripted outcomes.
///
/// Per-address behaviors win; otherwise the next scripted behavior is
/// popped, falling back to the default (`Deliver` unless overridden).
pub struct MockProvider {
    script: Mutex<VecDeque<MockBehavior>>,
    by_address: HashMap<String, MockBehavior>,
    fallback: MockBehavior,
    latency: Duration,
    calls: Mutex<Vec<MockCall>>,
    next_id: AtomicU64,
}

impl MockProvider {
    /// A provider that delivers everything immediately.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            by_address: HashMap::new(),
            fallback: MockBehavior::Deliver,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// A provider whose every call reports `error`.
    pub fn always_failing(error: &str) -> Self {
        Self::new().with_default(MockBehavior::Fail(error.to_string()))
    }

    /// Behaviors consumed in call order before the default applies.
    pub fn with_script(mut self, script: Vec<MockBehavior>) -> Self {
        self.script = Mutex::new(VecDeque::from(script));
        self
    }

    pub fn with_default(mut self, behavior: MockBehavior) -> Self {
        self.fallback = behavior;
        self
    }

    /// Always apply `behavior` to calls for this (normalized) address.
    pub fn with_address(mut self, address: &str, behavior: MockBehavior) -> Self {
        self.by_address.insert(address.to_string(), behavior);
        self
    }

    /// Delay every call by `latency` after it is recorded.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// All calls so far, in start order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Addresses in the order their calls started.
    pub async fn addresses(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|c| c.address.clone())
            .collect()
    }

    /// Largest number of calls that started within any span shorter than `window`.
    pub async fn max_calls_within(&self, window: Duration) -> usize {
        let mut times: Vec<Instant> = self.calls.lock().await.iter().map(|c| c.at).collect();
        times.sort();
        if window.is_zero() {
            return 0;
        }
        let mut best = 0;
        let mut start = 0;
        for end in 0..times.len() {
            while times[end].duration_since(times[start]) >= window {
                start += 1;
            }
            best = best.max(end - start + 1);
        }
        best
    }

    async fn next_behavior(&self, address: &str) -> MockBehavior {
        if let Some(behavior) = self.by_address.get(address) {
            return behavior.clone();
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn send(&self, message: &TemplateMessage) -> Result<SendOutcome, CourierError> {
        self.calls.lock().await.push(MockCall {
            address: message.address.clone(),
            template_name: message.template_name.clone(),
            at: Instant::now(),
        });
        let behavior = self.next_behavior(&message.address).await;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match behavior {
            MockBehavior::Deliver => {
                let n = self.next_id.fetch_add(1, Ordering::Relaxed);
                Ok(SendOutcome::Delivered {
                    provider_message_id: format!("wamid.mock-{n}").into(),
                })
            }
            MockBehavior::Fail(error) => Ok(SendOutcome::Failed { error }),
            MockBehavior::TransportError(message) => Err(CourierError::Provider {
                message,
                source: None,
            }),
            MockBehavior::Panic(message) => panic!("{message}"),
        }
    }
}
