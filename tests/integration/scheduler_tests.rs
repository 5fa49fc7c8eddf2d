//! Action scheduler against scripted sessions.
//!
//! Validates:
//! - nothing happens while every flag is off
//! - only interactive sessions are acted on
//! - a hold window always releases, even after the flag is turned off
//! - combat attacks the nearest other player
//! - spam goes out at the configured probability

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use mc_herd::client::{Direction, EntityKind, Position, VisibleEntity};
use mc_herd::config::GlobalConfig;
use mc_herd::orchestrator::ActionFlag;

use super::test_helpers::{settle, Harness, Recorded};

fn fixed_hold_config() -> GlobalConfig {
    let mut config = GlobalConfig::default();
    config.actions.hold_min_ms = 1_000;
    config.actions.hold_max_ms = 1_001;
    config
}

fn player(id: u32, name: &str, x: f64) -> VisibleEntity {
    VisibleEntity {
        id,
        kind: EntityKind::Player,
        name: Some(name.to_owned()),
        position: Position::new(x, 64.0, 0.0),
    }
}

#[tokio::test(start_paused = true)]
async fn idle_flags_do_nothing() {
    let harness = Harness::new(&["a"]);
    harness.start(1).await;
    harness.spawn("a").await;

    let mut scheduler = harness.orchestrator.scheduler();
    let report = scheduler.tick().await;
    assert_eq!(report.sessions, 0);
    assert!(harness.connector.latest("a").client.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn only_interactive_sessions_are_driven() {
    let harness = Harness::with(&["a", "b"], &[], fixed_hold_config());
    harness.start(2).await;
    harness.spawn("a").await;
    harness.orchestrator.set_flag(ActionFlag::Movement, true);

    let report = harness.orchestrator.scheduler().tick().await;
    assert_eq!(report.sessions, 1);
    assert_eq!(report.movement_windows, 1);
    assert!(harness.connector.latest("b").client.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hold_window_releases_after_flag_turns_off() {
    let harness = Harness::with(&["a"], &[], fixed_hold_config());
    harness.start(1).await;
    harness.spawn("a").await;
    let client = harness.connector.latest("a").client.clone();

    harness.orchestrator.set_flag(ActionFlag::Movement, true);
    harness.orchestrator.set_flag(ActionFlag::Sprint, true);
    harness.orchestrator.scheduler().tick().await;
    assert_eq!(
        client.commands(),
        vec![Recorded::Move(Direction::Forward, true), Recorded::Sprint(true)]
    );

    harness.orchestrator.set_flag(ActionFlag::Movement, false);
    harness.orchestrator.set_flag(ActionFlag::Sprint, false);

    tokio::time::sleep(Duration::from_millis(999)).await;
    settle().await;
    assert_eq!(client.commands().len(), 2);

    tokio::time::sleep(Duration::from_millis(2)).await;
    settle().await;
    let moves: Vec<_> = client
        .commands()
        .into_iter()
        .filter(|c| !matches!(c, Recorded::Chat(_)))
        .collect();
    assert_eq!(
        moves,
        vec![
            Recorded::Move(Direction::Forward, true),
            Recorded::Sprint(true),
            Recorded::Move(Direction::Forward, false),
            Recorded::Sprint(false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn sprint_alone_still_walks() {
    let harness = Harness::with(&["a"], &[], fixed_hold_config());
    harness.start(1).await;
    harness.spawn("a").await;

    harness.orchestrator.set_flag(ActionFlag::Sprint, true);
    let report = harness.orchestrator.scheduler().tick().await;
    assert_eq!(report.movement_windows, 1);
    assert_eq!(
        harness.connector.latest("a").client.commands()[..2],
        [Recorded::Move(Direction::Forward, true), Recorded::Sprint(true)]
    );
}

#[tokio::test(start_paused = true)]
async fn combat_attacks_nearest_player() {
    let harness = Harness::new(&["a"]);
    harness.start(1).await;
    harness.spawn("a").await;
    let client = harness.connector.latest("a").client.clone();
    client.set_position(Position::new(0.0, 64.0, 0.0));
    client.set_entities(vec![
        player(10, "far", 5.0),
        player(11, "near", 2.0),
        player(12, "a", 0.0),
        player(13, "farther", 8.0),
    ]);

    harness.orchestrator.set_flag(ActionFlag::Combat, true);
    let report = harness.orchestrator.scheduler().tick().await;

    assert_eq!(report.attacks, 1);
    assert_eq!(client.commands(), vec![Recorded::Attack(11)]);
    assert!(harness
        .journal
        .records_for("a")
        .contains(&"attacking near".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn combat_without_targets_is_quiet() {
    let harness = Harness::new(&["a"]);
    harness.start(1).await;
    harness.spawn("a").await;
    let client = harness.connector.latest("a").client.clone();
    client.set_position(Position::new(0.0, 64.0, 0.0));

    harness.orchestrator.set_flag(ActionFlag::Combat, true);
    let report = harness.orchestrator.scheduler().tick().await;
    assert_eq!(report.attacks, 0);
    assert_eq!(report.failures, 0);
    assert!(client.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn certain_spam_sends_one_message_per_tick() {
    let mut config = GlobalConfig::default();
    config.actions.spam_probability = 1.0;
    let harness = Harness::with(&["a"], &[], config);
    harness.start(1).await;
    harness.spawn("a").await;

    harness.orchestrator.set_flag(ActionFlag::ChatSpam, true);
    let mut scheduler = harness
        .orchestrator
        .scheduler()
        .with_rng(StdRng::seed_from_u64(7));
    scheduler.tick().await;
    scheduler.tick().await;

    let spam: Vec<String> = harness
        .connector
        .latest("a")
        .client
        .chats()
        .into_iter()
        .filter(|c| c.starts_with("spam_"))
        .collect();
    assert_eq!(spam.len(), 2);
    assert!(spam.iter().all(|m| m.len() == "spam_".len() + 6));
}

#[tokio::test(start_paused = true)]
async fn zero_spam_probability_never_sends() {
    let mut config = GlobalConfig::default();
    config.actions.spam_probability = 0.0;
    let harness = Harness::with(&["a"], &[], config);
    harness.start(1).await;
    harness.spawn("a").await;

    harness.orchestrator.set_flag(ActionFlag::ChatSpam, true);
    let mut scheduler = harness.orchestrator.scheduler();
    for _ in 0..20 {
        scheduler.tick().await;
    }
    assert!(harness.connector.latest("a").client.chats().is_empty());
}

#[tokio::test(start_paused = true)]
async fn spawned_scheduler_ticks_until_cancelled() {
    let harness = Harness::with(&["a"], &[], fixed_hold_config());
    harness.start(1).await;
    harness.spawn("a").await;
    let client = harness.connector.latest("a").client.clone();
    harness.orchestrator.set_flag(ActionFlag::Movement, true);

    let cancel = CancellationToken::new();
    let handle = harness.orchestrator.spawn_scheduler(cancel.clone());

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    settle().await;
    cancel.cancel();
    handle.await.expect("scheduler task");

    let presses = client
        .commands()
        .iter()
        .filter(|c| **c == Recorded::Move(Direction::Forward, true))
        .count();
    assert!(presses >= 3, "expected a press per tick, got {presses}");
}
