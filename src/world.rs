// world.rs
//
// The authoritative race world: one track + every connected kart. The net
// layer writes latched controls in, the tick loop calls step() and broadcasts
// whatever events fall out.

use std::collections::HashMap;

use rand::Rng;
use rapier3d::prelude::Real;

use crate::kart::{Controls, Kart, RaceEvent, STANDARD_KART};
use crate::track::{RapierTrack, TrackData, demo_circuit};

pub struct RaceWorld {
    pub track: RapierTrack,
    pub data: TrackData,
    pub karts: HashMap<String, Kart>,
    next_start: usize,
}

impl RaceWorld {
    pub fn new() -> Self {
        let (track, data) = demo_circuit();
        if let Err(err) = data.validate() {
            println!("⚠️ Track data failed validation: {}", err);
        }
        Self {
            track,
            data,
            karts: HashMap::new(),
            next_start: 0,
        }
    }

    /// Put a new kart on the next free start slot. When the grid overflows,
    /// later karts reuse the first slot with a little scatter so they don't
    /// stack exactly.
    pub fn spawn_kart(&mut self, id: &str) {
        let slot = self.next_start;
        self.next_start += 1;

        let mut kart = Kart::new(STANDARD_KART, &self.data, slot);
        if slot >= self.data.start_positions.len() && !self.data.start_positions.is_empty() {
            let mut rng = rand::thread_rng();
            kart.vehicle.position.x += rng.gen_range(-2.0_f32..2.0);
            kart.vehicle.position.z += rng.gen_range(-2.0_f32..2.0);
        }
        self.karts.insert(id.to_string(), kart);
    }

    pub fn remove_kart(&mut self, id: &str) {
        self.karts.remove(id);
    }

    /// Latch a fresh control state for one kart. The one-shot respawn flag
    /// survives until the tick loop consumes it, even if a newer message
    /// clears it.
    pub fn apply_input(&mut self, id: &str, controls: Controls) {
        if let Some(kart) = self.karts.get_mut(id) {
            let respawn = kart.controls.respawn || controls.respawn;
            kart.controls = controls;
            kart.controls.respawn = respawn;
        }
    }

    /// Advance every kart by dt and collect this tick's race events.
    pub fn step(&mut self, dt: Real) -> Vec<(String, RaceEvent)> {
        let mut events = Vec::new();
        for (id, kart) in self.karts.iter_mut() {
            kart.step(dt, &self.track, &self.data);
            for event in kart.tracker.drain_events() {
                events.push((id.clone(), event));
            }
        }
        events
    }
}
