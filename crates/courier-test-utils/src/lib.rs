// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides a scriptable mock provider and a harness that wires a temp
//! SQLite ledger, a dispatcher, and a coordinator together, for fast,
//! deterministic tests without a real messaging provider.
//!
//! # Components
//!
//! - [`MockProvider`] - Provider with scripted outcomes, latency, and call timestamps
//! - [`TestHarness`] - Complete ledger + dispatcher + coordinator stack

pub mod harness;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{MockBehavior, MockCall, MockProvider};
