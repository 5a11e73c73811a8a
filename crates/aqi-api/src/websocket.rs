//! Realtime transport for the Push Bus (§4.10, §6): relays
//! `air-quality-update`/`air-quality-alert` events to clients joined to
//! `loc:<lat>,<lng>` or `user:<id>` rooms. Grounded on the teacher's
//! connection-metadata/heartbeat/rate-limit shape, generalized from a
//! broadcast channel to `aqi_core::PushBus`'s per-client mailbox model.

use crate::state::AppState;
use aqi_core::LatLng;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: u64 = 30;
const CONNECTION_TIMEOUT: u64 = 120;
const MAX_MESSAGES_PER_SECOND: u32 = 100;

struct ConnectionMeta {
    last_activity: Instant,
    message_count: u32,
    last_message_time: Instant,
}

impl ConnectionMeta {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            last_activity: now,
            message_count: 0,
            last_message_time: now,
        }
    }

    fn check_rate_limit(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_message_time) >= Duration::from_secs(1) {
            self.message_count = 0;
            self.last_message_time = now;
        }
        if self.message_count >= MAX_MESSAGES_PER_SECOND {
            return false;
        }
        self.message_count += 1;
        true
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn is_timed_out(&self) -> bool {
        Instant::now().duration_since(self.last_activity) > Duration::from_secs(CONNECTION_TIMEOUT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
enum ClientCommand {
    SubscribeLocation { lat: f64, lng: f64 },
    UnsubscribeLocation { lat: f64, lng: f64 },
    SubscribeUser { subscriber_id: String },
    UnsubscribeUser { subscriber_id: String },
    Ping,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    info!(client = %client_id, "websocket client connected");
    let mut meta = ConnectionMeta::new();
    let mut joined_rooms: Vec<String> = Vec::new();

    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL));

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if socket.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
                if meta.is_timed_out() {
                    warn!(client = %client_id, "connection timed out due to inactivity");
                    break;
                }
            }

            event = state.push_bus.recv(&client_id) => {
                let json = match serde_json::to_string(&event) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(client = %client_id, error = %e, "failed to serialize push event");
                        continue;
                    }
                };
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
                meta.touch();
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        meta.touch();
                    }
                    Some(Ok(Message::Pong(_))) => {
                        meta.touch();
                    }
                    Some(Ok(Message::Text(text))) => {
                        if !meta.check_rate_limit() {
                            warn!(client = %client_id, "rate limit exceeded");
                            let _ = socket
                                .send(Message::Text(r#"{"type":"error","message":"rate limit exceeded"}"#.to_string()))
                                .await;
                            continue;
                        }
                        match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(cmd) => {
                                handle_client_command(&state, &client_id, cmd, &mut joined_rooms).await;
                            }
                            Err(_) => {
                                let _ = socket
                                    .send(Message::Text(r#"{"type":"error","message":"invalid command"}"#.to_string()))
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(client = %client_id, bytes = data.len(), "ignoring binary frame");
                    }
                    Some(Err(e)) => {
                        warn!(client = %client_id, error = %e, "websocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.push_bus.disconnect(&client_id);
    info!(client = %client_id, "websocket client disconnected");
}

async fn handle_client_command(
    state: &AppState,
    client_id: &str,
    cmd: ClientCommand,
    joined_rooms: &mut Vec<String>,
) {
    match cmd {
        ClientCommand::SubscribeLocation { lat, lng } => {
            let room = LatLng::new(lat, lng).room_key();
            state.push_bus.join(client_id, &room);
            state.scheduler.touch(LatLng::new(lat, lng));
            joined_rooms.push(room);
        }
        ClientCommand::UnsubscribeLocation { lat, lng } => {
            let room = LatLng::new(lat, lng).room_key();
            state.push_bus.leave(client_id, &room);
            joined_rooms.retain(|r| r != &room);
        }
        ClientCommand::SubscribeUser { subscriber_id } => {
            let room = format!("user:{subscriber_id}");
            state.push_bus.join(client_id, &room);
            joined_rooms.push(room);
        }
        ClientCommand::UnsubscribeUser { subscriber_id } => {
            let room = format!("user:{subscriber_id}");
            state.push_bus.leave(client_id, &room);
            joined_rooms.retain(|r| r != &room);
        }
        ClientCommand::Ping => {}
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}
