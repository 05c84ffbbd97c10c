// ==============================================================================
// checkpoint.rs — LAP / RACE PROGRESS TRACKER
// ==============================================================================
// One tracker per kart. Consumes the kart's position once per tick and
// maintains:
// - the set of checkpoints passed this lap (lap completes when the finish
//   line is crossed with the full set passed; set size, not order, is what
//   counts),
// - lap times against an externally supplied race clock,
// - the authoritative respawn anchor (overwritten by every checkpoint or
//   dropoff entry, counted or not), with the facing direction recomputed on
//   demand from the first unpassed checkpoint.
//
// Events go onto an internal queue the host drains once per tick.
// ==============================================================================

use std::collections::HashSet;

use rapier3d::prelude::{Point, Real};

use crate::kart::events::RaceEvent;
use crate::track::{Checkpoint, TrackData};

#[derive(Debug, Clone)]
pub struct LapProgress {
    pub current_lap: i32, // 1-based
    pub total_laps: i32,
    pub passed_this_lap: HashSet<i32>,
    pub lap_times: Vec<Real>,
    pub race_start: Real, // race-clock seconds
    pub lap_start: Real,
    pub race_finished: bool,
}

/// Respawn placement: position from the last crossed checkpoint/dropoff,
/// facing computed on demand (never stored per entity).
#[derive(Debug, Clone, Copy)]
pub struct RespawnAnchor {
    pub position: Point<Real>,
    pub facing: Real,
}

pub struct CheckpointTracker {
    pub progress: LapProgress,
    anchor_position: Point<Real>,
    start_facing: Real,          // fallback when no facing target exists
    inside_dropoff: Option<i32>, // de-dup for consecutive frames in one dropoff
    events: Vec<RaceEvent>,
}

impl CheckpointTracker {
    pub fn new(data: &TrackData, now: Real) -> Self {
        let mut tracker = Self {
            progress: LapProgress {
                current_lap: 1,
                total_laps: data.total_laps.max(1),
                passed_this_lap: HashSet::new(),
                lap_times: Vec::new(),
                race_start: now,
                lap_start: now,
                race_finished: false,
            },
            anchor_position: Point::origin(),
            start_facing: 0.0,
            inside_dropoff: None,
            events: Vec::new(),
        };
        tracker.start_race(data, now);
        tracker
    }

    /// Reset all progress and re-seed the respawn anchor from the first start
    /// position (falling back to checkpoint 0, then to the world origin).
    pub fn start_race(&mut self, data: &TrackData, now: Real) {
        self.progress.current_lap = 1;
        self.progress.total_laps = data.total_laps.max(1);
        self.progress.passed_this_lap.clear();
        self.progress.lap_times.clear();
        self.progress.race_finished = false;
        self.progress.race_start = now;
        self.progress.lap_start = now;
        self.inside_dropoff = None;
        self.events.clear();

        if let Some(start) = data.start_positions.first() {
            self.anchor_position = start.position;
            self.start_facing = start.facing;
        } else if let Some(cp) = data.checkpoints.first() {
            self.anchor_position = cp.anchor;
            self.start_facing = 0.0;
        } else {
            self.anchor_position = Point::origin();
            self.start_facing = 0.0;
        }
    }

    /// Per-tick progress update. No-op on tracks without checkpoints or
    /// dropoffs.
    pub fn update(&mut self, data: &TrackData, position: &Point<Real>, now: Real) {
        for i in 0..data.checkpoints.len() {
            if data.checkpoints[i].bounds.contains_local_point(position) {
                self.pass_checkpoint(data, i, now);
            }
        }

        let mut inside: Option<i32> = None;
        for dropoff in &data.dropoffs {
            if dropoff.bounds.contains_local_point(position) {
                inside = Some(dropoff.index);
                if self.inside_dropoff != Some(dropoff.index) {
                    // Anchor position only; facing is always derived.
                    self.anchor_position = dropoff.anchor;
                }
                break;
            }
        }
        self.inside_dropoff = inside;
    }

    fn pass_checkpoint(&mut self, data: &TrackData, i: usize, now: Real) {
        let cp = &data.checkpoints[i];

        // Re-crossing keeps the anchor fresh even when already counted.
        self.anchor_position = cp.anchor;

        let already = self.progress.passed_this_lap.contains(&cp.index);
        if already {
            if cp.is_finish_line {
                self.try_complete_lap(data, now);
            }
            return;
        }

        self.progress.passed_this_lap.insert(cp.index);
        self.events.push(RaceEvent::CheckpointPassed {
            index: cp.index,
            passed: self.progress.passed_this_lap.len(),
            total: data.checkpoints.len(),
        });

        if cp.is_finish_line {
            self.try_complete_lap(data, now);
        }
    }

    /// Completes the lap only when every checkpoint on the track (finish line
    /// included) was passed this lap.
    fn try_complete_lap(&mut self, data: &TrackData, now: Real) {
        if self.progress.race_finished {
            return;
        }
        if self.progress.passed_this_lap.len() != data.checkpoints.len() {
            return;
        }

        let lap_duration = now - self.progress.lap_start;
        self.progress.lap_times.push(lap_duration);
        self.events.push(RaceEvent::LapCompleted {
            lap: self.progress.current_lap,
            duration: lap_duration,
        });

        if self.progress.current_lap >= self.progress.total_laps {
            self.progress.race_finished = true;
            self.events.push(RaceEvent::RaceCompleted {
                total_time: now - self.progress.race_start,
                lap_times: self.progress.lap_times.clone(),
            });
        } else {
            self.progress.current_lap += 1;
            self.progress.passed_this_lap.clear();
            self.progress.lap_start = now;
        }
    }

    pub fn respawn_anchor(&self, data: &TrackData) -> RespawnAnchor {
        RespawnAnchor {
            position: self.anchor_position,
            facing: self.compute_facing(data),
        }
    }

    pub fn status(&self) -> &LapProgress {
        &self.progress
    }

    pub fn push_event(&mut self, event: RaceEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Facing the kart should respawn with: toward the first checkpoint (in
    /// index order) not yet passed this lap, or checkpoint 0 when all are
    /// passed, or the nearest non-coincident dropoff on checkpoint-less
    /// tracks. Pure recomputation every call so lap-state changes can never
    /// leave a stale cached heading.
    fn compute_facing(&self, data: &TrackData) -> Real {
        let anchor = self.anchor_position;

        let target: Option<Point<Real>> = if !data.checkpoints.is_empty() {
            let next: Option<&Checkpoint> = data
                .checkpoints
                .iter()
                .find(|cp| !self.progress.passed_this_lap.contains(&cp.index));
            Some(next.unwrap_or(&data.checkpoints[0]).anchor)
        } else {
            data.dropoffs
                .iter()
                .filter(|d| (d.anchor - anchor).norm() > 0.5)
                .min_by(|a, b| {
                    let da = (a.anchor - anchor).norm();
                    let db = (b.anchor - anchor).norm();
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|d| d.anchor)
        };

        match target {
            Some(t) => {
                let dx = t.x - anchor.x;
                let dz = t.z - anchor.z;
                if dx.abs() < 1e-6 && dz.abs() < 1e-6 {
                    self.start_facing
                } else {
                    dx.atan2(dz)
                }
            }
            None => self.start_facing,
        }
    }
}
