//! kart - arcade kart motion + race progress core (engine-agnostic).

pub mod checkpoint;
pub mod config;
pub mod drift;
pub mod events;
pub mod respawn;
pub mod simulation;
pub mod util;
pub mod vehicle;

pub use checkpoint::CheckpointTracker;
pub use config::{KartConfig, STANDARD_KART};
pub use drift::{ControlQuality, DriftPhase, DriftState};
pub use events::RaceEvent;
pub use simulation::Kart;
pub use vehicle::{Controls, InputSnapshot, Vehicle};
