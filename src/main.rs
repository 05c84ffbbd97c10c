mod kart;
mod net;
mod state;
mod track;
mod world;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, interval};

use crate::net::start_websocket_server;
use crate::state::SharedGameState;
use crate::world::RaceWorld;

#[tokio::main]
async fn main() {
    println!("🏁 Starting kart race server...");

    let state = Arc::new(Mutex::new(SharedGameState::new()));
    let world = Arc::new(Mutex::new(RaceWorld::new()));

    // Start WebSocket server
    tokio::spawn(start_websocket_server(
        Arc::clone(&state),
        Arc::clone(&world),
    ));

    // Fixed timestep: ~60 Hz
    let mut ticker = interval(Duration::from_millis(16));

    loop {
        ticker.tick().await;

        let mut world = world.lock().await;
        let mut game = state.lock().await;

        let events = world.step(1.0 / 60.0);

        game.tick += 1;
        game.broadcast_events(&events);
        game.broadcast_snapshot(&world);
    }
}
