/*
 * pool.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Relay pool fan-out against scripted relays: merging and deduplication, per-relay fault
 * isolation and timeouts, publish acknowledgement tracking.
 */

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{event, ids, rw, Reply, ScriptedConnector};
use segnalibro_core::protocol::nostr::{Filter, NostrError, RelayConfig, RelayPool};

const TIMEOUT: Duration = Duration::from_secs(5);

fn pool(connector: &Arc<ScriptedConnector>) -> RelayPool {
    RelayPool::new(connector.clone())
}

fn signed(id: &str) -> String {
    event(id, 39701, 1, &[&["d", "example.com"]]).to_string()
}

#[tokio::test]
async fn merges_and_deduplicates_by_id() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay(
                "wss://a",
                vec![
                    Reply::Event(event("e1", 1, 1, &[])),
                    Reply::Event(event("e2", 1, 2, &[])),
                    Reply::Eose,
                ],
            )
            .relay(
                "wss://b",
                vec![
                    Reply::Event(event("e2", 1, 2, &[])),
                    Reply::Event(event("e3", 1, 3, &[])),
                    Reply::Eose,
                ],
            ),
    );
    let relays = [rw("wss://a"), rw("wss://b")];
    let events = pool(&connector)
        .subscribe_with_timeout(&relays, &Filter::new().kinds([1]), TIMEOUT)
        .await;
    assert_eq!(ids(&events), vec!["e1", "e2", "e3"]);
}

#[tokio::test]
async fn sends_req_with_fresh_subscription_per_relay() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay("wss://a", vec![Reply::Eose])
            .relay("wss://b", vec![Reply::Eose]),
    );
    let filter = Filter::new().kinds([1111]).events(["b1"]).limit(50);
    pool(&connector)
        .subscribe_with_timeout(&[rw("wss://a"), rw("wss://b")], &filter, TIMEOUT)
        .await;
    let req_a = &connector.sent_to("wss://a")[0];
    let req_b = &connector.sent_to("wss://b")[0];
    assert_eq!(req_a[0], json!("REQ"));
    assert_eq!(req_a[2], json!({"kinds": [1111], "#e": ["b1"], "limit": 50}));
    assert_ne!(req_a[1], req_b[1]);
    // EOSE is followed by CLOSE for the same subscription, then the socket is closed
    assert_eq!(connector.sent_to("wss://a")[1], json!(["CLOSE", req_a[1]]));
    let mut closed = connector.closed();
    closed.sort();
    assert_eq!(closed, vec!["wss://a", "wss://b"]);
    assert_eq!(connector.dropped(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_query_drops_every_socket() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay("wss://a", vec![Reply::Hang])
            .relay("wss://b", vec![Reply::Event(event("e1", 1, 1, &[])), Reply::Hang]),
    );
    let pool = pool(&connector);
    let relays = [rw("wss://a"), rw("wss://b")];
    let filter = Filter::new();
    let query = pool.subscribe_with_timeout(&relays, &filter, TIMEOUT);
    assert!(tokio::time::timeout(Duration::from_secs(1), query).await.is_err());
    assert_eq!(connector.connects().len(), 2);
    assert_eq!(connector.dropped(), 2);
    assert!(connector.closed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failing_and_slow_relays_do_not_block_others() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay("wss://slow", vec![Reply::Hang])
            .relay("wss://good", vec![Reply::Event(event("e1", 1, 1, &[])), Reply::Eose]),
    );
    let relays = [rw("wss://refused"), rw("wss://slow"), rw("wss://good")];
    let events = pool(&connector)
        .subscribe_with_timeout(&relays, &Filter::new(), TIMEOUT)
        .await;
    assert_eq!(ids(&events), vec!["e1"]);
    assert_eq!(connector.connects().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_keeps_partial_results() {
    let connector = Arc::new(ScriptedConnector::new().relay(
        "wss://a",
        vec![
            Reply::Event(event("e1", 1, 1, &[])),
            Reply::Event(event("e2", 1, 2, &[])),
            Reply::Hang,
        ],
    ));
    let events = pool(&connector)
        .subscribe_with_timeout(&[rw("wss://a")], &Filter::new(), TIMEOUT)
        .await;
    assert_eq!(ids(&events), vec!["e1", "e2"]);
    assert_eq!(connector.dropped(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_ends_collection_for_that_relay() {
    let connector = Arc::new(ScriptedConnector::new().relay(
        "wss://a",
        vec![
            Reply::Event(event("e1", 1, 1, &[])),
            Reply::Closed("auth-required: sign in"),
            Reply::Event(event("e2", 1, 2, &[])),
            Reply::Hang,
        ],
    ));
    let events = pool(&connector)
        .subscribe_with_timeout(&[rw("wss://a")], &Filter::new(), TIMEOUT)
        .await;
    assert_eq!(ids(&events), vec!["e1"]);
}

#[tokio::test]
async fn ignores_other_subscriptions_and_notices() {
    let foreign = json!(["EVENT", "someone-else", event("x", 1, 1, &[])]).to_string();
    let connector = Arc::new(ScriptedConnector::new().relay(
        "wss://a",
        vec![
            Reply::Raw(foreign),
            Reply::Raw(r#"["NOTICE","rate limited"]"#.to_string()),
            Reply::Event(event("e1", 1, 1, &[])),
            Reply::Eose,
        ],
    ));
    let events = pool(&connector)
        .subscribe_with_timeout(&[rw("wss://a")], &Filter::new(), TIMEOUT)
        .await;
    assert_eq!(ids(&events), vec!["e1"]);
}

#[tokio::test]
async fn malformed_frame_ends_only_that_relay() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay(
                "wss://bad",
                vec![
                    Reply::Event(event("e1", 1, 1, &[])),
                    Reply::Raw("garbage".into()),
                    Reply::Event(event("e9", 1, 9, &[])),
                ],
            )
            .relay("wss://good", vec![Reply::Event(event("e2", 1, 2, &[])), Reply::Eose]),
    );
    let relays = [rw("wss://bad"), rw("wss://good")];
    let events = pool(&connector)
        .subscribe_with_timeout(&relays, &Filter::new(), TIMEOUT)
        .await;
    assert_eq!(ids(&events), vec!["e1", "e2"]);
}

#[tokio::test]
async fn empty_relay_list_touches_nothing() {
    let connector = Arc::new(ScriptedConnector::new());
    let events = pool(&connector)
        .subscribe_with_timeout(&[], &Filter::new(), TIMEOUT)
        .await;
    assert!(events.is_empty());
    assert!(connector.connects().is_empty());
}

#[tokio::test]
async fn publish_succeeds_when_one_relay_accepts() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay("wss://a", vec![Reply::Ok(true, "")])
            .relay("wss://b", vec![Reply::Ok(false, "duplicate: already have this event")]),
    );
    let result = pool(&connector)
        .publish_event(&[rw("wss://a"), rw("wss://b")], &signed("ev1"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(result.event_id, "ev1");
    assert_eq!(result.successful_relays.into_iter().collect::<Vec<_>>(), vec!["wss://a"]);
    assert_eq!(
        result.failed_relays,
        vec![("wss://b".to_string(), "duplicate: already have this event".to_string())]
    );
    let sent = &connector.sent_to("wss://a")[0];
    assert_eq!(sent[0], json!("EVENT"));
    assert_eq!(sent[1]["id"], json!("ev1"));
}

#[tokio::test]
async fn publish_fails_when_no_relay_accepts() {
    let connector = Arc::new(
        ScriptedConnector::new().relay("wss://a", vec![Reply::Ok(false, "blocked: spam")]),
    );
    let err = pool(&connector)
        .publish_event(&[rw("wss://a"), rw("wss://refused")], &signed("ev1"), TIMEOUT)
        .await
        .unwrap_err();
    match err {
        NostrError::AllRelaysFailed(details) => {
            assert!(details.contains("wss://a: blocked: spam"));
            assert!(details.contains("wss://refused"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn publish_timeout_is_reported_per_relay() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay("wss://slow", vec![Reply::Hang])
            .relay(
                "wss://a",
                vec![
                    Reply::Raw(json!(["OK", "other", true, ""]).to_string()),
                    Reply::Ok(true, ""),
                ],
            ),
    );
    let result = pool(&connector)
        .publish_event(&[rw("wss://slow"), rw("wss://a")], &signed("ev1"), TIMEOUT)
        .await
        .unwrap();
    assert!(result.successful_relays.contains("wss://a"));
    assert_eq!(result.failed_relays, vec![("wss://slow".to_string(), "Timeout".to_string())]);
}

#[tokio::test]
async fn publish_skips_read_only_relays() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay("wss://read", vec![Reply::Ok(true, "")])
            .relay("wss://write", vec![Reply::Ok(true, "")]),
    );
    let relays = [
        RelayConfig::new("wss://read", true, false),
        RelayConfig::new("wss://write", false, true),
    ];
    let result = pool(&connector)
        .publish_event(&relays, &signed("ev1"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(connector.connects(), vec!["wss://write"]);
    assert_eq!(result.successful_relays.len(), 1);
}

#[tokio::test]
async fn publish_preconditions_fail_before_io() {
    let connector = Arc::new(ScriptedConnector::new().relay("wss://a", vec![Reply::Ok(true, "")]));
    let pool = pool(&connector);

    let read_only = [RelayConfig::new("wss://a", true, false)];
    assert!(matches!(
        pool.publish_event(&read_only, &signed("ev1"), TIMEOUT).await,
        Err(NostrError::NoWriteRelays)
    ));
    assert!(matches!(
        pool.publish_event(&[rw("wss://a")], "{not json", TIMEOUT).await,
        Err(NostrError::InvalidJson(_))
    ));
    assert!(matches!(
        pool.publish_event(&[rw("wss://a")], r#"{"id":"  ","kind":1}"#, TIMEOUT).await,
        Err(NostrError::MissingEventId)
    ));
    assert!(connector.connects().is_empty());
}

#[tokio::test(start_paused = true)]
async fn connectivity_check_keeps_reachable_relays_in_order() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .relay("wss://a", vec![])
            .relay("wss://c", vec![]),
    );
    let relays = [rw("wss://a"), rw("wss://b"), RelayConfig::new("wss://c", true, false)];
    let reachable = pool(&connector)
        .check_connectivity(&relays, Duration::from_secs(3))
        .await;
    assert_eq!(reachable, vec![rw("wss://a"), RelayConfig::new("wss://c", true, false)]);
}
