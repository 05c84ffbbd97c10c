// src/kart/respawn.rs
//
// Respawn placement policy: put the kart back on the last respawn anchor,
// projected onto the ground, facing the next checkpoint. Used by the
// fall-off timer and by the manual respawn input.

use rapier3d::prelude::{Point, Vector};

use crate::kart::checkpoint::CheckpointTracker;
use crate::kart::events::RaceEvent;
use crate::kart::vehicle::Vehicle;
use crate::track::{TrackData, TrackQuery};

pub fn respawn(
    vehicle: &mut Vehicle,
    tracker: &mut CheckpointTracker,
    data: &TrackData,
    track: &dyn TrackQuery,
) {
    let anchor = tracker.respawn_anchor(data);

    let mut position = anchor.position;
    if let Some(ground) = track.ground_height(&Point::new(position.x, position.y, position.z)) {
        position.y = ground.height + vehicle.config.respawn_height_offset;
    }

    vehicle.position = position;
    vehicle.heading = anchor.facing;
    vehicle.velocity = Vector::zeros();
    vehicle.vertical_velocity = 0.0;
    vehicle.grounded = true;
    vehicle.drift.reset();
    vehicle.boost.remaining = 0.0;
    vehicle.boost.strength = 0.0;
    vehicle.fall_off_timer = 0.0;
    vehicle.dual_input_timer = 0.0;
    // Suppress checkpoint re-entry right after the teleport.
    vehicle.checkpoint_cooldown = vehicle.config.respawn_cooldown;

    tracker.push_event(RaceEvent::Respawned {
        x: position.x,
        y: position.y,
        z: position.z,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kart::config::STANDARD_KART;
    use crate::kart::drift::DriftPhase;
    use crate::track::{Checkpoint, FlatTrack, StartPosition, TrackData, box_volume};

    fn one_checkpoint_track() -> TrackData {
        TrackData {
            checkpoints: vec![Checkpoint {
                index: 0,
                bounds: box_volume([20.0, 0.0, 0.0], [2.0, 2.0, 2.0]),
                is_finish_line: true,
                anchor: Point::new(20.0, 0.0, 0.0),
            }],
            dropoffs: Vec::new(),
            start_positions: vec![StartPosition {
                index: 0,
                position: Point::new(0.0, 0.0, 0.0),
                facing: 1.2,
            }],
            total_laps: 1,
        }
    }

    #[test]
    fn test_respawn_places_on_anchor_and_clears_motion() {
        let data = one_checkpoint_track();
        let track = FlatTrack { height: 2.0 };
        let mut tracker = CheckpointTracker::new(&data, 0.0);
        let mut vehicle = Vehicle::new(STANDARD_KART, Point::new(50.0, -30.0, 9.0), 0.0);
        vehicle.velocity = Vector::new(5.0, 0.0, 5.0);
        vehicle.vertical_velocity = -12.0;
        vehicle.drift.begin_pending();
        vehicle.boost.remaining = 1.0;
        vehicle.boost.strength = 20.0;

        respawn(&mut vehicle, &mut tracker, &data, &track);

        // Start-position anchor, projected onto the flat ground at y = 2.
        assert_eq!(vehicle.position.x, 0.0);
        assert_eq!(vehicle.position.z, 0.0);
        assert!((vehicle.position.y - (2.0 + vehicle.config.respawn_height_offset)).abs() < 1e-5);
        assert_eq!(vehicle.velocity.norm(), 0.0);
        assert_eq!(vehicle.vertical_velocity, 0.0);
        assert_eq!(vehicle.drift.phase, DriftPhase::Idle);
        assert!(!vehicle.boost.is_active());
        assert_eq!(vehicle.checkpoint_cooldown, vehicle.config.respawn_cooldown);

        let events = tracker.drain_events();
        assert!(events.iter().any(|e| matches!(e, RaceEvent::Respawned { .. })));
    }
}
