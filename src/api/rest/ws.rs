use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::event::InboundEvent;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One task per connection: an outbound pump draining the room router's
/// channel, and an inbound loop feeding parsed events to the engine. A
/// handler error never drops the connection; membership cleanup happens
/// unconditionally on the way out.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    state.metrics.connected_clients.inc();
    info!(%connection_id, "websocket client connected");

    let send_task = tokio::spawn(async move {
        let mut outbound = UnboundedReceiverStream::new(rx);
        while let Some(text) = outbound.next().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<InboundEvent>(&text) {
            Ok(event) => {
                let name = event.name();
                if let Err(err) = state.engine.handle_event(connection_id, &tx, event) {
                    warn!(%connection_id, event = name, error = %err, "event rejected");
                }
            }
            Err(err) => {
                warn!(%connection_id, error = %err, "unparseable frame ignored");
            }
        }
    }

    state.rooms.drop_connection(connection_id);
    state.metrics.connected_clients.dec();
    send_task.abort();

    info!(%connection_id, "websocket client disconnected");
}
