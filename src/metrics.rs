// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge, TextEncoder,
};

/// Mutations processed per engine and operation.
pub static MUTATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "linknest_mutations_total",
        "Engine mutations processed",
        &["engine", "op"]
    )
    .expect("register linknest_mutations_total")
});

/// Events published to the fan-out layer, per topic kind.
pub static EVENTS_PUBLISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "linknest_events_published_total",
        "Events published to the fan-out layer",
        &["topic"]
    )
    .expect("register linknest_events_published_total")
});

/// Publishes that found no live subscribers (fire-and-forget no-ops).
pub static EVENTS_UNDELIVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "linknest_events_undelivered_total",
        "Publishes with zero live subscribers",
        &["topic"]
    )
    .expect("register linknest_events_undelivered_total")
});

/// Currently attached live subscriptions.
pub static ACTIVE_SUBSCRIPTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "linknest_active_subscriptions",
        "Currently attached live subscriptions"
    )
    .expect("register linknest_active_subscriptions")
});

/// Encode the default registry in the Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}
