// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient address normalization.
//!
//! Raw phone strings arrive in whatever shape the uploader typed them
//! (`+1 (202) 555-0143`, `1-202-555-0143 `, ...). The canonical form keeps
//! only `+` and ASCII digits, in their original order.

/// Reduces a raw phone string to its canonical `+`/digit form.
///
/// Total and idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c == '+' || c.is_ascii_digit())
        .collect()
}

/// Normalizes `raw` and rejects results that cannot address anyone.
///
/// Returns `None` when nothing dialable survives (no digits left).
pub fn normalize_checked(raw: &str) -> Option<String> {
    let address = normalize(raw);
    if address.chars().any(|c| c.is_ascii_digit()) {
        Some(address)
    } else {
        None
    }
}
