//! `/ws` push channel.
//!
//! Each connection registers one subscriber with the broadcaster and
//! forwards every frame it receives as a text message. The connection is
//! closed when the client goes away, when a socket write exceeds the
//! subscriber send timeout, or when the broadcaster drops the subscriber.

use std::fmt;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{Sink, SinkExt, StreamExt};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::AppState;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.broadcaster.connect().await;
    let id = subscription.id();
    let send_timeout = state.broadcaster.settings().subscriber_send_timeout;

    let ping_every = state.settings.ws_ping_interval;
    let mut ping = time::interval_at(Instant::now() + ping_every, ping_every);

    info!(subscriber = %id, "WebSocket client connected");

    loop {
        tokio::select! {
            frame = subscription.recv() => {
                let Some(frame) = frame else {
                    debug!(subscriber = %id, "Subscriber released by broadcaster");
                    break;
                };
                if let Err(reason) = send(&mut sender, Message::Text(frame.message.clone()), send_timeout).await {
                    warn!(subscriber = %id, "Closing WebSocket: {}", reason);
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(reason) = send(&mut sender, Message::Ping(Vec::new()), send_timeout).await {
                    warn!(subscriber = %id, "Closing WebSocket: {}", reason);
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                // pongs to client pings are queued by the protocol layer
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber = %id, "WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    }

    state.broadcaster.disconnect(id).await;
    info!(subscriber = %id, "WebSocket client disconnected");
}

async fn send<S>(sender: &mut S, message: Message, timeout: Duration) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match time::timeout(timeout, sender.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("send failed: {e}")),
        Err(_) => Err(format!("send exceeded {}ms", timeout.as_millis())),
    }
}
