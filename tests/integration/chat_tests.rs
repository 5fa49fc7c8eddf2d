//! Operator chat and received-chat transcript.

use mc_herd::client::{ClientEvent, GameClient};
use mc_herd::AppError;

use super::test_helpers::{settle, Harness};

#[tokio::test(start_paused = true)]
async fn broadcast_reaches_every_session() {
    let harness = Harness::new(&["a", "b"]);
    harness.start(2).await;

    let report = harness.orchestrator.broadcast_chat("hello all").await;
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 0);

    for identity in ["a", "b"] {
        let client = &harness.connector.latest(identity).client;
        assert_eq!(client.chats(), vec!["hello all"]);
        assert!(harness
            .journal
            .records_for(identity)
            .contains(&"SENT_CHAT: hello all".to_owned()));
    }
    assert!(harness
        .journal
        .transcript_lines()
        .contains(&"[BROADCAST] hello all".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn broadcast_counts_failed_handles() {
    let harness = Harness::new(&["a", "b"]);
    harness.start(2).await;
    harness
        .connector
        .latest("b")
        .client
        .terminate("test")
        .expect("terminate");

    let report = harness.orchestrator.broadcast_chat("ping").await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert!(harness
        .journal
        .records_for("b")
        .iter()
        .any(|line| line.starts_with("CHAT_ERR:")));
}

#[tokio::test(start_paused = true)]
async fn broadcast_with_no_sessions_is_empty() {
    let harness = Harness::new(&["a"]);
    let report = harness.orchestrator.broadcast_chat("anyone?").await;
    assert_eq!(report.delivered, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test(start_paused = true)]
async fn say_sends_from_one_session() {
    let harness = Harness::new(&["a", "b"]);
    harness.start(2).await;

    harness
        .orchestrator
        .send_chat("b", "just me")
        .await
        .expect("send");

    assert!(harness.connector.latest("a").client.chats().is_empty());
    assert_eq!(harness.connector.latest("b").client.chats(), vec!["just me"]);
    assert!(harness
        .journal
        .transcript_lines()
        .contains(&"[b] just me".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn say_from_unknown_identity_is_not_found() {
    let harness = Harness::new(&["a"]);
    let result = harness.orchestrator.send_chat("nobody", "hi").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn say_on_closed_handle_is_dispatch_error() {
    let harness = Harness::new(&["a"]);
    harness.start(1).await;
    harness
        .connector
        .latest("a")
        .client
        .terminate("test")
        .expect("terminate");

    let result = harness.orchestrator.send_chat("a", "hi").await;
    assert!(matches!(result, Err(AppError::Dispatch(_))));
}

#[tokio::test(start_paused = true)]
async fn received_chat_goes_to_log_and_transcript() {
    let harness = Harness::new(&["a"]);
    harness.start(1).await;
    harness.spawn("a").await;

    harness
        .connector
        .latest("a")
        .emit(ClientEvent::ChatReceived {
            sender: "Steve".into(),
            text: "hi bots".into(),
        })
        .await;
    settle().await;

    assert!(harness
        .journal
        .records_for("a")
        .contains(&"CHAT: Steve: hi bots".to_owned()));
    assert!(harness
        .journal
        .transcript_lines()
        .contains(&"[CHAT][a] Steve: hi bots".to_owned()));
}
