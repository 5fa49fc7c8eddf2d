//! Start/stop behaviour of the orchestrator against scripted handles.
//!
//! Validates:
//! - one live session per identity, including concurrent starts
//! - start clamps to the account list and rejects a zero count
//! - account `i` is routed through proxy `i mod N`
//! - a proxy reload leaves running sessions on their endpoint
//! - stop removes sessions and reports unknown identities

use mc_herd::config::GlobalConfig;
use mc_herd::models::{ProxyEndpoint, SessionState};
use mc_herd::orchestrator::StopTarget;
use mc_herd::AppError;

use super::test_helpers::{server, settle, wait_for_state, Harness};

#[tokio::test(start_paused = true)]
async fn second_start_skips_running_identities() {
    let harness = Harness::new(&["alpha", "beta"]);

    let first = harness
        .orchestrator
        .start(server(), 2)
        .await
        .expect("first start");
    assert_eq!(first.started, vec!["alpha", "beta"]);
    assert!(first.skipped.is_empty());

    let second = harness
        .orchestrator
        .start(server(), 2)
        .await
        .expect("second start");
    assert!(second.started.is_empty());
    assert_eq!(second.skipped, vec!["alpha", "beta"]);
    assert_eq!(harness.connector.connect_count(), 2);
    assert_eq!(harness.orchestrator.registry().len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_starts_register_each_identity_once() {
    let harness = Harness::new(&["alpha", "beta", "gamma"]);
    let orchestrator = &harness.orchestrator;

    let (left, right) = tokio::join!(
        orchestrator.start(server(), 3),
        orchestrator.start(server(), 3)
    );
    let left = left.expect("left start");
    let right = right.expect("right start");

    assert_eq!(left.started.len() + right.started.len(), 3);
    assert_eq!(left.skipped.len() + right.skipped.len(), 3);
    assert_eq!(harness.connector.connect_count(), 3);
    for identity in ["alpha", "beta", "gamma"] {
        assert_eq!(harness.connector.connections_for(identity).len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn start_clamps_to_available_accounts() {
    let harness = Harness::new(&["a", "b", "c"]);
    let report = harness
        .orchestrator
        .start(server(), 5)
        .await
        .expect("start");
    assert_eq!(report.requested, 5);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.started, vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn start_follows_account_file_order() {
    let harness = Harness::new(&["zed", "amy", "kim"]);
    let report = harness
        .orchestrator
        .start(server(), 2)
        .await
        .expect("start");
    assert_eq!(report.started, vec!["zed", "amy"]);
    assert!(harness.orchestrator.registry().get("kim").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn zero_count_and_empty_account_list_are_rejected() {
    let harness = Harness::new(&["a"]);
    let zero = harness.orchestrator.start(server(), 0).await;
    assert!(matches!(zero, Err(AppError::InvalidCommand(_))));

    let empty = Harness::new(&[]);
    let none = empty.orchestrator.start(server(), 1).await;
    assert!(matches!(none, Err(AppError::Config(_))));
    assert_eq!(empty.connector.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn proxies_are_assigned_round_robin() {
    let proxies = ["socks5://10.0.0.1:1080", "http://10.0.0.2:3128"];
    let harness = Harness::with(&["a", "b", "c"], &proxies, GlobalConfig::default());
    harness.start(3).await;

    let expected = [
        ("a", proxies[0], "10.0.0.1"),
        ("b", proxies[1], "10.0.0.2"),
        ("c", proxies[0], "10.0.0.1"),
    ];
    for (identity, proxy, host) in expected {
        let session = harness.session(identity).await;
        assert_eq!(session.proxy().map(ProxyEndpoint::as_str), Some(proxy));

        let handle = harness.connector.latest(identity);
        let route = handle.request.proxy.as_ref().expect("routed");
        assert_eq!(route.host, host);
    }
}

#[tokio::test(start_paused = true)]
async fn no_proxies_means_direct_connections() {
    let harness = Harness::new(&["a"]);
    harness.start(1).await;
    assert!(harness.session("a").await.proxy().is_none());
    assert!(harness.connector.latest("a").request.proxy.is_none());
}

#[tokio::test(start_paused = true)]
async fn malformed_proxy_fails_only_its_session() {
    let harness = Harness::with(
        &["a", "b"],
        &["socks5://10.0.0.1:1080", "not-a-proxy"],
        GlobalConfig::default(),
    );
    let report = harness
        .orchestrator
        .start(server(), 2)
        .await
        .expect("start");
    assert_eq!(report.started, vec!["a"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "b");
    assert!(harness.orchestrator.registry().get("b").await.is_none());
    assert!(harness
        .journal
        .records_for("b")
        .iter()
        .any(|line| line.starts_with("construction failed")));
}

#[tokio::test(start_paused = true)]
async fn reload_does_not_move_running_sessions() {
    let harness = Harness::with(&["a", "b"], &["socks5://10.0.0.1:1080"], GlobalConfig::default());
    harness.start(1).await;

    harness
        .orchestrator
        .allocator()
        .reload(vec![ProxyEndpoint::new("socks5://10.9.9.9:1080")]);

    let session = harness.session("a").await;
    assert_eq!(
        session.proxy().map(ProxyEndpoint::as_str),
        Some("socks5://10.0.0.1:1080")
    );

    let report = harness
        .orchestrator
        .start(server(), 2)
        .await
        .expect("start");
    assert_eq!(report.started, vec!["b"]);
    assert_eq!(
        harness.session("b").await.proxy().map(ProxyEndpoint::as_str),
        Some("socks5://10.9.9.9:1080")
    );
}

#[tokio::test(start_paused = true)]
async fn stop_one_identity() {
    let harness = Harness::new(&["a", "b"]);
    harness.start(2).await;
    harness.spawn("a").await;
    let session = harness.session("a").await;

    let report = harness
        .orchestrator
        .stop(StopTarget::Identity("a".into()))
        .await
        .expect("stop");
    assert_eq!(report.stopped, vec!["a"]);

    wait_for_state(&session, SessionState::Terminated).await;
    assert!(session.is_ended());
    assert!(harness.connector.latest("a").client.is_closed());
    assert!(harness.orchestrator.registry().get("a").await.is_none());
    assert!(harness.orchestrator.registry().get("b").await.is_some());
}

#[tokio::test(start_paused = true)]
async fn stop_unknown_identity_is_not_found() {
    let harness = Harness::new(&["a"]);
    let result = harness
        .orchestrator
        .stop(StopTarget::Identity("ghost".into()))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn stop_all_empties_the_status_table() {
    let harness = Harness::new(&["a", "b", "c"]);
    harness.start(3).await;
    settle().await;

    let report = harness
        .orchestrator
        .stop(StopTarget::All)
        .await
        .expect("stop all");
    assert_eq!(report.stopped, vec!["a", "b", "c"]);

    let status = harness.orchestrator.status_snapshot().await;
    assert_eq!(status.running, 0);
    assert!(status.sessions.is_empty());
    assert_eq!(status.accounts, 3);
}

#[tokio::test(start_paused = true)]
async fn stopped_identity_can_be_started_again() {
    let harness = Harness::new(&["a"]);
    harness.start(1).await;
    let first = harness.session("a").await;
    harness
        .orchestrator
        .stop(StopTarget::Identity("a".into()))
        .await
        .expect("stop");

    harness.start(1).await;
    let second = harness.session("a").await;
    assert_ne!(first.instance_id(), second.instance_id());
    assert_eq!(harness.connector.connections_for("a").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn status_counts_interactive_sessions() {
    let harness = Harness::new(&["a", "b"]);
    harness.start(2).await;
    harness.spawn("b").await;

    let status = harness.orchestrator.status_snapshot().await;
    assert_eq!(status.running, 2);
    assert_eq!(status.interactive, 1);
    let states: Vec<_> = status.sessions.iter().map(|s| (s.identity.as_str(), s.state)).collect();
    assert_eq!(
        states,
        vec![("a", SessionState::Connecting), ("b", SessionState::Spawned)]
    );
}
