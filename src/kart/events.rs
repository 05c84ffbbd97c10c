// src/kart/events.rs
//
// Race progress events. The tracker pushes these onto an internal queue the
// host drains once per tick; the queue (rather than callback fields) lets
// HUD, scoring and telemetry all consume the same stream.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaceEvent {
    CheckpointPassed {
        index: i32,
        passed: usize,
        total: usize,
    },
    LapCompleted {
        lap: i32,
        duration: f32,
    },
    RaceCompleted {
        total_time: f32,
        lap_times: Vec<f32>,
    },
    Respawned {
        x: f32,
        y: f32,
        z: f32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&RaceEvent::LapCompleted { lap: 1, duration: 42.5 })
            .unwrap();
        assert!(json.contains("\"event\":\"lap_completed\""));
        assert!(json.contains("\"lap\":1"));
    }
}
