// state.rs
//
// Shared host state: connected client channels + the JSON broadcasts. The
// tick loop owns a RaceWorld separately; this module only turns it into
// wire messages.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::kart::{DriftPhase, RaceEvent};
use crate::world::RaceWorld;

#[derive(Serialize)]
pub struct KartSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub heading: f32,
    pub speed: f32,
    pub grounded: bool,
    pub drift_phase: DriftPhase,
    pub drift_stage: i32,
    pub spark_color: Option<[f32; 3]>,
    pub boosting: bool,
    pub surface: Option<String>,
    pub yaw_offset: f32,
    pub lean: f32,
    pub lap: i32,
    pub total_laps: i32,
    pub finished: bool,
}

#[derive(Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub karts: Vec<KartSnapshot>,
}

/// One race event, tagged with the kart it happened to. The event fields are
/// flattened next to the player id.
#[derive(Serialize)]
struct EventBroadcast<'a> {
    player_id: &'a str,
    #[serde(flatten)]
    event: &'a RaceEvent,
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: Vec<UnboundedSender<String>>,
}

impl SharedGameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: Vec::new(),
        }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) {
        self.clients.push(tx);
    }

    fn broadcast(&mut self, json: String) {
        // Closed channels are dropped on the way through.
        self.clients.retain(|tx| tx.send(json.clone()).is_ok());
    }

    /// Build and send a snapshot of every kart to every client.
    pub fn broadcast_snapshot(&mut self, world: &RaceWorld) {
        let mut karts = Vec::with_capacity(world.karts.len());

        for (id, kart) in &world.karts {
            let v = &kart.vehicle;
            let progress = kart.tracker.status();
            karts.push(KartSnapshot {
                id: id.clone(),
                x: v.position.x,
                y: v.position.y,
                z: v.position.z,
                heading: v.heading,
                speed: v.speed(),
                grounded: v.grounded,
                drift_phase: v.drift.phase,
                drift_stage: v.drift.stage_index,
                spark_color: usize::try_from(v.drift.stage_index)
                    .ok()
                    .and_then(|i| v.config.drift_stages.get(i))
                    .map(|s| s.color),
                boosting: v.boost.is_active(),
                surface: v.last_ground.as_ref().map(|g| g.surface.clone()),
                yaw_offset: v.visual.yaw_offset,
                lean: v.visual.lean,
                lap: progress.current_lap,
                total_laps: progress.total_laps,
                finished: progress.race_finished,
            });
        }

        match serde_json::to_string(&Snapshot { tick: self.tick, karts }) {
            Ok(json) => self.broadcast(json),
            Err(err) => println!("⚠️ Snapshot serialization failed: {}", err),
        }
    }

    /// Send this tick's race events to every client, one message per event.
    pub fn broadcast_events(&mut self, events: &[(String, RaceEvent)]) {
        for (player_id, event) in events {
            match serde_json::to_string(&EventBroadcast { player_id, event }) {
                Ok(json) => self.broadcast(json),
                Err(err) => println!("⚠️ Event serialization failed: {}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kart::Controls;
    use tokio::sync::mpsc;

    #[test]
    fn test_snapshot_reaches_registered_clients() {
        let mut world = RaceWorld::new();
        world.spawn_kart("p1");
        world.apply_input("p1", Controls { forward: true, ..Default::default() });
        world.step(1.0 / 60.0);

        let mut state = SharedGameState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.register_client(tx);
        state.tick = 7;
        state.broadcast_snapshot(&world);

        let json = rx.try_recv().expect("client must receive the snapshot");
        assert!(json.contains("\"tick\":7"));
        assert!(json.contains("\"id\":\"p1\""));
        assert!(json.contains("\"drift_phase\":\"idle\""));
    }

    #[test]
    fn test_event_broadcast_is_flat_json() {
        let mut state = SharedGameState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.register_client(tx);

        state.broadcast_events(&[(
            "p1".to_string(),
            RaceEvent::LapCompleted { lap: 2, duration: 31.5 },
        )]);

        let json = rx.try_recv().expect("client must receive the event");
        assert!(json.contains("\"player_id\":\"p1\""));
        assert!(json.contains("\"event\":\"lap_completed\""));
        assert!(json.contains("\"lap\":2"));
    }

    #[test]
    fn test_closed_clients_are_dropped() {
        let mut state = SharedGameState::new();
        let (tx, rx) = mpsc::unbounded_channel();
        state.register_client(tx);
        drop(rx);

        state.broadcast_events(&[(
            "p1".to_string(),
            RaceEvent::Respawned { x: 0.0, y: 0.0, z: 0.0 },
        )]);
        assert!(state.clients.is_empty());
    }
}
