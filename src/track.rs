// ==============================================================================
// track.rs — TRACK QUERIES + STATIC RACE DATA
// ==============================================================================
// Two halves:
//
// 1) TrackQuery — the narrow geometry interface the simulation consumes:
//    ground height/normal/surface tag under a position, and wall pushback for
//    a proposed position + kart footprint. RapierTrack implements it with
//    static colliders and the query pipeline (downward raycasts for ground,
//    parry contact queries against wall colliders for pushback).
//
// 2) TrackData — the ordered static entities consumed at race start:
//    checkpoints (index 0 = finish line), dropoff points, start positions.
//    Bounding volumes are world-space AABBs.
// ==============================================================================

use std::collections::HashMap;

use rapier3d::math::Isometry;
use rapier3d::parry::bounding_volume::Aabb;
use rapier3d::parry::query as parry_query;
use rapier3d::parry::shape::Cuboid;
use rapier3d::prelude::*;

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_WALL: Group = Group::from_bits_truncate(0b0010);

/// Ground sample under a position.
#[derive(Debug, Clone)]
pub struct GroundHit {
    pub height: Real,          // world y of the surface
    pub normal: Vector<Real>,  // surface normal (unit)
    pub surface: String,       // surface tag ("road", "dirt", ...)
}

/// Wall collision response for a proposed position.
#[derive(Debug, Clone)]
pub struct WallHit {
    pub pushback: Vector<Real>, // horizontal correction to add to the proposal
}

/// Kart collision box, full dimensions in meters.
#[derive(Debug, Clone, Copy)]
pub struct Footprint {
    pub width: Real,
    pub height: Real,
    pub length: Real,
}

/// Read-only geometry queries. Implementations must be safe for concurrent
/// reads; the core never writes through this interface.
pub trait TrackQuery {
    /// Sample the ground below `position` (the ray starts well above it, so a
    /// kart slightly under the surface still finds it).
    fn ground_height(&self, position: &Point<Real>) -> Option<GroundHit>;

    /// Wall pushback for a kart footprint centered at `proposed` (position is
    /// at ground contact; the box extends upward). None when clear.
    fn wall_collision(&self, proposed: &Point<Real>, footprint: &Footprint) -> Option<WallHit>;
}

// ==============================================================================
// Static race data
// ==============================================================================

pub struct Checkpoint {
    pub index: i32,
    pub bounds: Aabb,
    pub is_finish_line: bool, // true only for index 0
    pub anchor: Point<Real>,  // respawn anchor when this checkpoint is crossed
}

pub struct DropoffPoint {
    pub index: i32,
    pub bounds: Aabb,
    pub anchor: Point<Real>,
}

pub struct StartPosition {
    pub index: i32,
    pub position: Point<Real>,
    pub facing: Real, // radians
}

pub struct TrackData {
    pub checkpoints: Vec<Checkpoint>,
    pub dropoffs: Vec<DropoffPoint>,
    pub start_positions: Vec<StartPosition>,
    pub total_laps: i32,
}

impl TrackData {
    /// Startup-time integrity check. The runtime paths degrade defensively on
    /// bad data, but a track that can never complete a lap should be loud.
    pub fn validate(&self) -> Result<(), String> {
        if self.checkpoints.is_empty() {
            return Err("track has no checkpoints; laps can never complete".into());
        }
        if self.start_positions.is_empty() {
            return Err("track has no start positions".into());
        }
        for (i, cp) in self.checkpoints.iter().enumerate() {
            if cp.index != i as i32 {
                return Err(format!("checkpoint {} has index {}", i, cp.index));
            }
            if cp.is_finish_line != (i == 0) {
                return Err(format!("checkpoint {} finish-line flag is wrong", i));
            }
        }
        for (i, start) in self.start_positions.iter().enumerate() {
            if start.index != i as i32 {
                return Err(format!("start position {} has index {}", i, start.index));
            }
        }
        if self.total_laps < 1 {
            return Err(format!("total_laps = {}", self.total_laps));
        }
        Ok(())
    }
}

/// World-space AABB from center + half extents.
pub fn box_volume(center: [Real; 3], half: [Real; 3]) -> Aabb {
    Aabb::new(
        Point::new(center[0] - half[0], center[1] - half[1], center[2] - half[2]),
        Point::new(center[0] + half[0], center[1] + half[1], center[2] + half[2]),
    )
}

// ==============================================================================
// RapierTrack — static colliders + query pipeline
// ==============================================================================

pub struct RapierTrack {
    bodies: RigidBodySet, // stays empty; colliders are parentless statics
    colliders: ColliderSet,
    query_pipeline: QueryPipeline,
    surface_tags: HashMap<ColliderHandle, String>,
}

impl RapierTrack {
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            query_pipeline: QueryPipeline::new(),
            surface_tags: HashMap::new(),
        }
    }

    /// Ground slab: the top face sits at `top_y`.
    pub fn add_ground(&mut self, center_x: Real, top_y: Real, center_z: Real, half_x: Real, half_z: Real, surface: &str) {
        let thickness = 1.0;
        let collider = ColliderBuilder::cuboid(half_x, thickness, half_z)
            .translation(vector![center_x, top_y - thickness, center_z])
            .collision_groups(InteractionGroups::new(GROUP_GROUND, Group::ALL))
            .build();
        let handle = self.colliders.insert(collider);
        self.surface_tags.insert(handle, surface.to_string());
    }

    pub fn add_wall(&mut self, center: [Real; 3], half: [Real; 3]) {
        let collider = ColliderBuilder::cuboid(half[0], half[1], half[2])
            .translation(vector![center[0], center[1], center[2]])
            .collision_groups(InteractionGroups::new(GROUP_WALL, Group::ALL))
            .build();
        self.colliders.insert(collider);
    }

    /// Rebuild the query acceleration structure. Call once after the last
    /// collider is added; the track never changes afterwards.
    pub fn refresh(&mut self) {
        self.query_pipeline.update(&self.colliders);
    }
}

impl TrackQuery for RapierTrack {
    fn ground_height(&self, position: &Point<Real>) -> Option<GroundHit> {
        let origin = Point::new(position.x, position.y + 50.0, position.z);
        let ray = Ray::new(origin, vector![0.0, -1.0, 0.0]);
        let filter =
            QueryFilter::default().groups(InteractionGroups::new(Group::ALL, GROUP_GROUND));

        let (handle, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            200.0,
            true,
            filter,
        )?;

        Some(GroundHit {
            height: origin.y - hit.time_of_impact,
            normal: hit.normal,
            surface: self
                .surface_tags
                .get(&handle)
                .cloned()
                .unwrap_or_else(|| "road".to_string()),
        })
    }

    fn wall_collision(&self, proposed: &Point<Real>, footprint: &Footprint) -> Option<WallHit> {
        let half = vector![
            footprint.width * 0.5,
            footprint.height * 0.5,
            footprint.length * 0.5
        ];
        let shape = Cuboid::new(half);
        // Kart position is at ground contact; the box extends upward.
        let iso = Isometry::translation(proposed.x, proposed.y + half.y, proposed.z);
        let filter =
            QueryFilter::default().groups(InteractionGroups::new(Group::ALL, GROUP_WALL));

        let mut pushback: Vector<Real> = Vector::zeros();
        let mut hit_any = false;

        self.query_pipeline.intersections_with_shape(
            &self.bodies,
            &self.colliders,
            &iso,
            &shape,
            filter,
            |handle| {
                if let Some(collider) = self.colliders.get(handle) {
                    if let Ok(Some(contact)) =
                        parry_query::contact(collider.position(), collider.shape(), &iso, &shape, 0.0)
                    {
                        if contact.dist < 0.0 {
                            // normal1 points out of the wall; -dist is the
                            // penetration depth.
                            pushback += *contact.normal1 * -contact.dist;
                            hit_any = true;
                        }
                    }
                }
                true
            },
        );

        if hit_any {
            pushback.y = 0.0;
            Some(WallHit { pushback })
        } else {
            None
        }
    }
}

// ==============================================================================
// Demo circuit: a square corridor between an inner and an outer wall ring,
// three checkpoints past the finish line, two dropoff shortcuts at the
// corners. Enough to race on out of the box.
// ==============================================================================

pub fn demo_circuit() -> (RapierTrack, TrackData) {
    let mut track = RapierTrack::new();
    track.add_ground(0.0, 0.0, 0.0, 200.0, 200.0, "road");

    // Outer ring at +-60.
    track.add_wall([0.0, 1.5, 61.0], [62.0, 1.5, 1.0]);
    track.add_wall([0.0, 1.5, -61.0], [62.0, 1.5, 1.0]);
    track.add_wall([61.0, 1.5, 0.0], [1.0, 1.5, 62.0]);
    track.add_wall([-61.0, 1.5, 0.0], [1.0, 1.5, 62.0]);

    // Inner ring at +-30.
    track.add_wall([0.0, 1.5, 30.0], [31.0, 1.5, 1.0]);
    track.add_wall([0.0, 1.5, -30.0], [31.0, 1.5, 1.0]);
    track.add_wall([30.0, 1.5, 0.0], [1.0, 1.5, 31.0]);
    track.add_wall([-30.0, 1.5, 0.0], [1.0, 1.5, 31.0]);

    track.refresh();

    let checkpoints = vec![
        Checkpoint {
            index: 0,
            bounds: box_volume([45.0, 2.0, 0.0], [16.0, 3.0, 4.0]),
            is_finish_line: true,
            anchor: Point::new(45.0, 0.0, 0.0),
        },
        Checkpoint {
            index: 1,
            bounds: box_volume([0.0, 2.0, 45.0], [4.0, 3.0, 16.0]),
            is_finish_line: false,
            anchor: Point::new(0.0, 0.0, 45.0),
        },
        Checkpoint {
            index: 2,
            bounds: box_volume([-45.0, 2.0, 0.0], [16.0, 3.0, 4.0]),
            is_finish_line: false,
            anchor: Point::new(-45.0, 0.0, 0.0),
        },
        Checkpoint {
            index: 3,
            bounds: box_volume([0.0, 2.0, -45.0], [4.0, 3.0, 16.0]),
            is_finish_line: false,
            anchor: Point::new(0.0, 0.0, -45.0),
        },
    ];

    let dropoffs = vec![
        DropoffPoint {
            index: 0,
            bounds: box_volume([45.0, 2.0, 45.0], [8.0, 3.0, 8.0]),
            anchor: Point::new(45.0, 0.0, 45.0),
        },
        DropoffPoint {
            index: 1,
            bounds: box_volume([-45.0, 2.0, -45.0], [8.0, 3.0, 8.0]),
            anchor: Point::new(-45.0, 0.0, -45.0),
        },
    ];

    let start_positions = (0..4)
        .map(|i| StartPosition {
            index: i,
            position: Point::new(42.0 + 3.0 * (i % 2) as Real, 0.0, -6.0 - 4.0 * (i / 2) as Real),
            facing: 0.0, // toward +z, into the first corner
        })
        .collect();

    let data = TrackData {
        checkpoints,
        dropoffs,
        start_positions,
        total_laps: 3,
    };

    (track, data)
}

// ==============================================================================
// Test doubles
// ==============================================================================

/// Infinite flat ground at a fixed height, no walls.
#[cfg(test)]
pub struct FlatTrack {
    pub height: Real,
}

#[cfg(test)]
impl TrackQuery for FlatTrack {
    fn ground_height(&self, _position: &Point<Real>) -> Option<GroundHit> {
        Some(GroundHit {
            height: self.height,
            normal: vector![0.0, 1.0, 0.0],
            surface: "road".to_string(),
        })
    }

    fn wall_collision(&self, _proposed: &Point<Real>, _footprint: &Footprint) -> Option<WallHit> {
        None
    }
}

/// No ground anywhere: everything free-falls.
#[cfg(test)]
pub struct VoidTrack;

#[cfg(test)]
impl TrackQuery for VoidTrack {
    fn ground_height(&self, _position: &Point<Real>) -> Option<GroundHit> {
        None
    }

    fn wall_collision(&self, _proposed: &Point<Real>, _footprint: &Footprint) -> Option<WallHit> {
        None
    }
}

/// Flat ground that always reports a wall hit with a fixed pushback.
#[cfg(test)]
pub struct PushbackTrack {
    pub pushback: Vector<Real>,
}

#[cfg(test)]
impl TrackQuery for PushbackTrack {
    fn ground_height(&self, _position: &Point<Real>) -> Option<GroundHit> {
        Some(GroundHit {
            height: 0.0,
            normal: vector![0.0, 1.0, 0.0],
            surface: "road".to_string(),
        })
    }

    fn wall_collision(&self, _proposed: &Point<Real>, _footprint: &Footprint) -> Option<WallHit> {
        Some(WallHit { pushback: self.pushback })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_circuit_validates() {
        let (_, data) = demo_circuit();
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_ground_query_on_demo_circuit() {
        let (track, _) = demo_circuit();
        let hit = track
            .ground_height(&Point::new(45.0, 0.5, 0.0))
            .expect("corridor has ground");
        assert!(hit.height.abs() < 1e-3);
        assert!((hit.normal.y - 1.0).abs() < 1e-3);
        assert_eq!(hit.surface, "road");
    }

    #[test]
    fn test_wall_pushback_points_away_from_wall() {
        let (track, _) = demo_circuit();
        let footprint = Footprint { width: 1.6, height: 1.2, length: 2.2 };

        // Overlapping the outer +x wall: pushback must point in -x.
        let hit = track
            .wall_collision(&Point::new(60.5, 0.0, 0.0), &footprint)
            .expect("overlapping a wall must collide");
        assert!(hit.pushback.x < 0.0);
        assert_eq!(hit.pushback.y, 0.0);

        // Mid-corridor is clear.
        assert!(track.wall_collision(&Point::new(45.0, 0.0, 0.0), &footprint).is_none());
    }

    #[test]
    fn test_validate_rejects_bad_tracks() {
        let (_, mut data) = demo_circuit();
        data.checkpoints.clear();
        assert!(data.validate().is_err());

        let (_, mut data) = demo_circuit();
        data.start_positions.clear();
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_box_volume_containment() {
        let aabb = box_volume([10.0, 0.0, 0.0], [2.0, 1.0, 2.0]);
        assert!(aabb.contains_local_point(&Point::new(10.0, 0.0, 0.0)));
        assert!(!aabb.contains_local_point(&Point::new(13.0, 0.0, 0.0)));
    }
}
