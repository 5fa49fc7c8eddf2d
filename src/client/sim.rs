//! Simulated protocol-client driver.
//!
//! Every handle joins one shared in-process [`SimWorld`]: it "connects"
//! after a configurable latency, spawns at a random position, sees every
//! other simulated player, and receives the chat lines they send. No
//! network traffic is generated, which makes the driver suitable for dry
//! runs of the orchestrator and for exercising the action loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use super::{
    ClientConnection, ClientEvent, ConnectRequest, Connector, Direction, EntityKind, GameClient,
    Position, VisibleEntity, EVENT_BUFFER,
};
use crate::config::SimConfig;
use crate::{AppError, Result};

/// Blocks per second while walking.
const WALK_SPEED: f64 = 4.317;
/// Blocks per second while sprinting.
const SPRINT_SPEED: f64 = 5.612;

struct SimPlayer {
    entity_id: u32,
    position: Position,
    walking_since: Option<Instant>,
    sprinting: bool,
    events: mpsc::Sender<ClientEvent>,
}

/// Shared state of the simulated server.
#[derive(Default)]
pub struct SimWorld {
    players: Mutex<HashMap<String, SimPlayer>>,
    mobs: Vec<(u32, Position)>,
    next_entity_id: AtomicU32,
}

impl SimWorld {
    fn players(&self) -> MutexGuard<'_, HashMap<String, SimPlayer>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Names of all spawned simulated players.
    #[must_use]
    pub fn online(&self) -> Vec<String> {
        let mut names: Vec<String> = self.players().keys().cloned().collect();
        names.sort();
        names
    }

    /// World populated with `count` stationary mobs.
    fn with_mobs(count: usize, radius: f64) -> Self {
        let mut world = Self::default();
        let mut rng = rand::thread_rng();
        world.mobs = (0..count)
            .map(|_| {
                let id = world.next_entity_id.fetch_add(1, Ordering::Relaxed) + 1;
                (id, random_position(&mut rng, radius))
            })
            .collect();
        world
    }

    fn join(&self, name: &str, position: Position, events: mpsc::Sender<ClientEvent>) -> u32 {
        let entity_id = self.next_entity_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.players().insert(
            name.to_owned(),
            SimPlayer {
                entity_id,
                position,
                walking_since: None,
                sprinting: false,
                events,
            },
        );
        entity_id
    }

    /// Remove `name` unless a newer handle for the same name has joined since.
    fn leave(&self, name: &str, entity_id: u32) {
        let mut players = self.players();
        if players.get(name).is_some_and(|p| p.entity_id == entity_id) {
            players.remove(name);
        }
    }

    fn broadcast_chat(&self, sender: &str, text: &str) {
        for player in self.players().values() {
            let _ = player.events.try_send(ClientEvent::ChatReceived {
                sender: sender.to_owned(),
                text: text.to_owned(),
            });
        }
    }
}

/// Connector producing [`SimClient`] handles that share one [`SimWorld`].
pub struct SimConnector {
    world: Arc<SimWorld>,
    config: SimConfig,
}

impl SimConnector {
    /// Create a connector with an empty world.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            world: Arc::new(SimWorld::with_mobs(config.mobs, config.spawn_radius)),
            config,
        }
    }

    /// The world shared by all handles from this connector.
    #[must_use]
    pub fn world(&self) -> &Arc<SimWorld> {
        &self.world
    }
}

impl Connector for SimConnector {
    /// Build a simulated handle.
    ///
    /// Must be called from within a Tokio runtime: the connection
    /// progress is driven by a spawned task.
    fn connect(&self, request: ConnectRequest) -> Result<ClientConnection> {
        if request.identity.trim().is_empty() {
            return Err(AppError::Construction("identity must not be empty".into()));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let closed = CancellationToken::new();
        let client = Arc::new(SimClient {
            identity: request.identity.clone(),
            world: Arc::clone(&self.world),
            closed: closed.clone(),
        });

        let span = info_span!("sim_client", identity = %request.identity, server = %request.server);
        tokio::spawn(
            drive(
                request.identity,
                Arc::clone(&self.world),
                self.config.clone(),
                tx,
                closed,
            )
            .instrument(span),
        );

        Ok(ClientConnection { client, events: rx })
    }
}

/// Connection progress of one simulated handle.
async fn drive(
    identity: String,
    world: Arc<SimWorld>,
    config: SimConfig,
    events: mpsc::Sender<ClientEvent>,
    closed: CancellationToken,
) {
    let latency = Duration::from_millis(config.connect_latency_ms);
    let spawn_delay = Duration::from_millis(config.spawn_delay_ms);

    tokio::select! {
        () = closed.cancelled() => {
            let _ = events.send(ClientEvent::Ended).await;
            return;
        }
        () = tokio::time::sleep(latency) => {}
    }
    if events.send(ClientEvent::Connected).await.is_err() {
        return;
    }

    tokio::select! {
        () = closed.cancelled() => {
            let _ = events.send(ClientEvent::Ended).await;
            return;
        }
        () = tokio::time::sleep(spawn_delay) => {}
    }

    let position = random_position(&mut rand::thread_rng(), config.spawn_radius);
    let entity_id = world.join(&identity, position, events.clone());
    debug!(?position, "simulated player joined");
    if events.send(ClientEvent::Spawned).await.is_err() {
        world.leave(&identity, entity_id);
        return;
    }

    closed.cancelled().await;
    world.leave(&identity, entity_id);
    let _ = events.send(ClientEvent::Ended).await;
    debug!("simulated player left");
}

fn random_position(rng: &mut impl Rng, radius: f64) -> Position {
    let r = radius.abs().max(f64::EPSILON);
    Position::new(rng.gen_range(-r..r), 64.0, rng.gen_range(-r..r))
}

/// Handle of one simulated session.
pub struct SimClient {
    identity: String,
    world: Arc<SimWorld>,
    closed: CancellationToken,
}

impl SimClient {
    fn with_player<T>(&self, f: impl FnOnce(&mut SimPlayer) -> T) -> Result<T> {
        if self.closed.is_cancelled() {
            return Err(AppError::Dispatch(format!("{} is disconnected", self.identity)));
        }
        let mut players = self.world.players();
        let player = players
            .get_mut(&self.identity)
            .ok_or_else(|| AppError::Dispatch(format!("{} has not spawned", self.identity)))?;
        Ok(f(player))
    }
}

/// Advance a walking player by the distance covered since it started.
fn settle(player: &mut SimPlayer) {
    if let Some(since) = player.walking_since.take() {
        let speed = if player.sprinting {
            SPRINT_SPEED
        } else {
            WALK_SPEED
        };
        player.position.x += since.elapsed().as_secs_f64() * speed;
    }
}

impl GameClient for SimClient {
    fn send_chat(&self, text: &str) -> Result<()> {
        self.with_player(|_| ())?;
        // Slash commands are consumed by the server, plain text is relayed.
        if !text.starts_with('/') {
            self.world.broadcast_chat(&self.identity, text);
        }
        Ok(())
    }

    fn set_movement(&self, _direction: Direction, active: bool) -> Result<()> {
        self.with_player(|player| {
            settle(player);
            if active {
                player.walking_since = Some(Instant::now());
            }
        })
    }

    fn set_sprint(&self, active: bool) -> Result<()> {
        self.with_player(|player| {
            let walking = player.walking_since.is_some();
            settle(player);
            player.sprinting = active;
            if walking {
                player.walking_since = Some(Instant::now());
            }
        })
    }

    fn attack(&self, target: &VisibleEntity) -> Result<()> {
        self.with_player(|_| ())?;
        let present = self.world.mobs.iter().any(|(id, _)| *id == target.id)
            || self
                .world
                .players()
                .values()
                .any(|p| p.entity_id == target.id);
        if present {
            Ok(())
        } else {
            Err(AppError::Dispatch(format!(
                "entity {} is no longer visible",
                target.id
            )))
        }
    }

    fn terminate(&self, _reason: &str) -> Result<()> {
        self.closed.cancel();
        Ok(())
    }

    fn visible_entities(&self) -> Vec<VisibleEntity> {
        let mobs = self.world.mobs.iter().map(|(id, position)| VisibleEntity {
            id: *id,
            kind: EntityKind::Mob,
            name: None,
            position: *position,
        });
        let players: Vec<VisibleEntity> = self
            .world
            .players()
            .iter()
            .filter(|(name, _)| *name != &self.identity)
            .map(|(name, player)| VisibleEntity {
                id: player.entity_id,
                kind: EntityKind::Player,
                name: Some(name.clone()),
                position: player.position,
            })
            .collect();
        mobs.chain(players).collect()
    }

    fn position(&self) -> Option<Position> {
        self.world.players().get(&self.identity).map(|p| p.position)
    }
}
