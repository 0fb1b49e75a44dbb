// content-gate-broker/tests/fanout_broker.rs
// ============================================================================
// Module: Fan-out Broker Tests
// Description: Ordering, timeout, and selection behavior of the broker.
// Purpose: Prove one channel never affects another.
// Dependencies: content-gate-broker, content-gate-core, tokio
// ============================================================================

//! Ordering, timeout, and selection behavior of the fan-out broker.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use content_gate_broker::BrokerError;
use content_gate_broker::CallbackChannel;
use content_gate_broker::ChannelError;
use content_gate_broker::FanoutBroker;
use content_gate_broker::LogChannel;
use content_gate_core::ChannelDispatcher;
use content_gate_core::ChannelFailureKind;
use content_gate_core::ChannelName;

use crate::common::SlowChannel;
use crate::common::article;

fn names(list: &[&str]) -> Vec<ChannelName> {
    list.iter().copied().map(ChannelName::new).collect()
}

#[tokio::test]
async fn outcomes_follow_registration_order() {
    let broker = FanoutBroker::builder()
        .channel(SlowChannel::ok("broadcast", Duration::from_millis(150)))
        .channel(SlowChannel::ok("bot", Duration::ZERO))
        .channel(SlowChannel::ok("email", Duration::from_millis(50)))
        .build()
        .unwrap();

    let outcomes = broker.dispatch(&article(), &names(&["email", "bot", "broadcast"])).await;

    let order: Vec<&str> = outcomes.iter().map(|outcome| outcome.channel.as_str()).collect();
    assert_eq!(order, vec!["broadcast", "bot", "email"]);
    assert!(outcomes.iter().all(|outcome| outcome.success));
}

#[tokio::test]
async fn channels_run_concurrently() {
    let broker = FanoutBroker::builder()
        .channel(SlowChannel::ok("a", Duration::from_millis(200)))
        .channel(SlowChannel::ok("b", Duration::from_millis(200)))
        .channel(SlowChannel::ok("c", Duration::from_millis(200)))
        .build()
        .unwrap();

    let started = Instant::now();
    let outcomes = broker.dispatch(&article(), &broker.channels()).await;

    assert_eq!(outcomes.len(), 3);
    assert!(started.elapsed() < Duration::from_millis(550));
}

#[tokio::test]
async fn slow_channel_times_out_without_blocking_others() {
    let broker = FanoutBroker::builder()
        .channel_with_timeout(SlowChannel::ok("broadcast", Duration::from_secs(5)), Duration::from_millis(50))
        .channel(SlowChannel::ok("bot", Duration::ZERO))
        .build()
        .unwrap();

    let started = Instant::now();
    let outcomes = broker.dispatch(&article(), &broker.channels()).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!outcomes[0].success);
    assert_eq!(outcomes[0].error_kind, Some(ChannelFailureKind::Timeout));
    assert!(outcomes[0].error_detail.as_deref().unwrap().contains("timed out"));
    assert!(outcomes[1].success);
}

#[tokio::test]
async fn channel_errors_keep_their_kind() {
    let broker = FanoutBroker::builder()
        .channel(SlowChannel::failing(
            "email",
            Duration::ZERO,
            ChannelError::Rejected {
                status: Some(422),
                detail: "list not found".to_string(),
            },
        ))
        .channel(SlowChannel::failing("bot", Duration::ZERO, ChannelError::Unavailable("refused".to_string())))
        .build()
        .unwrap();

    let outcomes = broker.dispatch(&article(), &broker.channels()).await;

    assert_eq!(outcomes[0].error_kind, Some(ChannelFailureKind::Rejected));
    assert!(outcomes[0].error_detail.as_deref().unwrap().contains("list not found"));
    assert_eq!(outcomes[1].error_kind, Some(ChannelFailureKind::Unavailable));
}

#[tokio::test]
async fn only_selected_channels_are_called() {
    let broadcast = SlowChannel::ok("broadcast", Duration::ZERO);
    let broadcast_calls = Arc::clone(&broadcast.calls);
    let bot = SlowChannel::ok("bot", Duration::ZERO);
    let bot_calls = Arc::clone(&bot.calls);
    let broker = FanoutBroker::builder().channel(broadcast).channel(bot).build().unwrap();

    let outcomes = broker.dispatch(&article(), &names(&["bot"])).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].channel.as_str(), "bot");
    assert_eq!(broadcast_calls.load(Ordering::SeqCst), 0);
    assert_eq!(bot_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_channel_is_a_config_failure() {
    let broker = FanoutBroker::builder().channel(SlowChannel::ok("bot", Duration::ZERO)).build().unwrap();

    let outcomes = broker.dispatch(&article(), &names(&["bot", "pager", "pager"])).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[1].channel.as_str(), "pager");
    assert_eq!(outcomes[1].error_kind, Some(ChannelFailureKind::Config));
}

#[tokio::test]
async fn callback_and_log_channels_deliver() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let callback = CallbackChannel::new("callback", move |message| {
        assert_eq!(message.content_id.as_str(), "rust-ownership");
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Some("cb-1".to_string()))
    });
    let broker = FanoutBroker::builder()
        .channel(callback)
        .channel(LogChannel::new("log", std::io::sink()))
        .build()
        .unwrap();

    let outcomes = broker.dispatch(&article(), &broker.channels()).await;

    assert!(outcomes.iter().all(|outcome| outcome.success));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn builder_rejects_invalid_registrations() {
    assert_eq!(FanoutBroker::builder().build().err(), Some(BrokerError::MissingChannels));

    let duplicate = FanoutBroker::builder()
        .channel(SlowChannel::ok("bot", Duration::ZERO))
        .channel(SlowChannel::ok("bot", Duration::ZERO))
        .build();
    assert_eq!(duplicate.err(), Some(BrokerError::DuplicateChannel("bot".to_string())));

    let zero = FanoutBroker::builder()
        .channel_with_timeout(SlowChannel::ok("bot", Duration::ZERO), Duration::ZERO)
        .build();
    assert_eq!(zero.err(), Some(BrokerError::ZeroTimeout("bot".to_string())));
}

#[test]
fn channels_lists_registration_order() {
    let broker = FanoutBroker::builder()
        .channel(SlowChannel::ok("broadcast", Duration::ZERO))
        .channel(SlowChannel::ok("email", Duration::ZERO))
        .channel(SlowChannel::ok("bot", Duration::ZERO))
        .build()
        .unwrap();
    assert_eq!(broker.channels(), names(&["broadcast", "email", "bot"]));
}
