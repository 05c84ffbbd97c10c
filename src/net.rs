use std::sync::Arc;

use futures::{Sink, SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::kart::Controls;
use crate::state::SharedGameState;
use crate::world::RaceWorld;

#[derive(Debug)]
struct ClientMessage {
    msg_type: String,
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    drift: bool,
    respawn: bool,
}

impl ClientMessage {
    fn from_json(txt: &str) -> Option<Self> {
        let v = serde_json::from_str::<serde_json::Value>(txt).ok()?;
        let flag = |key: &str| v.get(key).and_then(|x| x.as_bool()).unwrap_or(false);

        Some(ClientMessage {
            msg_type: v.get("type")?.as_str()?.to_string(),
            forward: flag("forward"),
            backward: flag("backward"),
            left: flag("left"),
            right: flag("right"),
            drift: flag("drift"),
            respawn: flag("respawn"),
        })
    }

    fn controls(&self) -> Controls {
        Controls {
            forward: self.forward,
            backward: self.backward,
            steer_left: self.left,
            steer_right: self.right,
            drift: self.drift,
            respawn: self.respawn,
        }
    }
}

/// Forward queued messages to one client's socket. Ends on the first failed
/// send, dropping the receiver so the broadcast side's retain() cleanup sees
/// the closed channel and unregisters the client.
async fn pump_outgoing<S>(mut rx: mpsc::UnboundedReceiver<String>, mut write: S)
where
    S: Sink<Message> + Unpin,
{
    while let Some(msg) = rx.recv().await {
        if write.send(Message::Text(msg)).await.is_err() {
            break;
        }
    }
}

pub async fn start_websocket_server(
    state: Arc<Mutex<SharedGameState>>,
    world: Arc<Mutex<RaceWorld>>,
) {
    let listener = TcpListener::bind("0.0.0.0:9001")
        .await
        .expect("Failed to bind WebSocket port");

    println!("🌐 WebSocket listening on ws://localhost:9001");

    loop {
        let raw = match listener.accept().await {
            Ok((raw, _)) => raw,
            Err(err) => {
                println!("⚠️ Accept failed: {}", err);
                continue;
            }
        };
        let state_clone = Arc::clone(&state);
        let world_clone = Arc::clone(&world);

        tokio::spawn(async move {
            let ws = match accept_async(raw).await {
                Ok(ws) => ws,
                Err(_) => return,
            };
            let (mut write, mut read) = ws.split();

            // -------------------------------
            // 1) Create outgoing message channel
            // -------------------------------
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();

            {
                let mut game = state_clone.lock().await;
                game.register_client(tx.clone());
            }

            // -------------------------------
            // 2) Spawn send-loop task
            // -------------------------------
            tokio::spawn(pump_outgoing(rx, write));

            // -------------------------------
            // 3) Spawn the kart on the grid
            // -------------------------------
            let player_id = uuid::Uuid::new_v4().to_string();
            {
                let mut world = world_clone.lock().await;
                world.spawn_kart(&player_id);
            }

            println!("🟢 Player connected: {}", player_id);

            // Send welcome through the outgoing TX channel
            let welcome = format!(r#"{{"type":"welcome","player_id":"{}"}}"#, player_id);
            let _ = tx.send(welcome);

            // -------------------------------
            // 4) Main receive loop
            // -------------------------------
            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(_) => break,
                };

                if !msg.is_text() {
                    continue;
                }
                let text = match msg.to_text() {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                if text.contains("\"type\":\"ping\"") {
                    let _ = tx.send("{\"type\":\"pong\"}".into());
                    continue;
                }

                let parsed = match ClientMessage::from_json(text) {
                    Some(v) => v,
                    None => continue,
                };

                if parsed.msg_type == "input" {
                    let mut world = world_clone.lock().await;
                    world.apply_input(&player_id, parsed.controls());
                }
            }

            println!("🔴 Player disconnected: {}", player_id);
            let mut world = world_clone.lock().await;
            world.remove_kart(&player_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_message_parses_to_controls() {
        let msg = ClientMessage::from_json(
            r#"{"type":"input","forward":true,"left":true,"drift":true}"#,
        )
        .expect("valid input message");
        assert_eq!(msg.msg_type, "input");

        let controls = msg.controls();
        assert!(controls.forward);
        assert!(controls.steer_left);
        assert!(controls.drift);
        assert!(!controls.backward);
        assert!(!controls.steer_right);
        assert!(!controls.respawn);
    }

    #[test]
    fn test_malformed_messages_are_rejected() {
        assert!(ClientMessage::from_json("not json").is_none());
        assert!(ClientMessage::from_json(r#"{"forward":true}"#).is_none());
    }

    #[tokio::test]
    async fn test_send_loop_stops_when_peer_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel::<String>();

        // A sink whose consumer is already gone: every send fails, like a
        // socket whose peer disconnected.
        let (sink, stream) = futures::channel::mpsc::channel::<Message>(4);
        drop(stream);

        let pump = tokio::spawn(pump_outgoing(rx, sink));
        tx.send("{\"tick\":1}".into()).expect("receiver still alive");
        pump.await.expect("pump task must finish");

        // The pump dropped its receiver, so the state-held sender now fails
        // and broadcast cleanup can drop this client.
        assert!(tx.send("{\"tick\":2}".into()).is_err());
    }
}
