//! WebSocket event stream.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;
use xintent_core::IntentId;
use xintent_state::{ChainEvent, EventFilter};

use crate::state::AppState;

/// Query string of `/ws/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub intent_id: Option<IntentId>,
    /// Comma-separated event names.
    pub names: Option<String>,
}

impl EventQuery {
    pub fn filter(&self) -> EventFilter {
        EventFilter {
            intent_id: self.intent_id,
            names: self.names.as_ref().map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
        }
    }
}

/// WebSocket message for event updates.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventStreamMessage {
    Subscribed { chain_id: u64 },
    Event(ChainEvent),
}

/// Stream committed ledger events.
pub async fn event_stream(
    ws: WebSocketUpgrade,
    Query(query): Query<EventQuery>,
    State(state): State<AppState>,
) -> Response {
    let filter = query.filter();
    ws.on_upgrade(move |socket| handle_event_stream(socket, filter, state))
}

type WsSender = SplitSink<WebSocket, Message>;

async fn send(sender: &mut WsSender, msg: &EventStreamMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(_) => false,
    }
}

async fn handle_event_stream(socket: WebSocket, filter: EventFilter, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.events.subscribe(filter).await;
    let id = subscription.id;
    debug!(subscription = %id, "event stream opened");

    let hello = EventStreamMessage::Subscribed {
        chain_id: state.chain_id,
    };
    let mut forward = tokio::spawn(async move {
        if !send(&mut sender, &hello).await {
            return;
        }
        while let Some(event) = subscription.next().await {
            if !send(&mut sender, &EventStreamMessage::Event(event)).await {
                break;
            }
        }
    });
    let mut listen = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => listen.abort(),
        _ = &mut listen => forward.abort(),
    }

    state.events.unsubscribe(id).await;
    debug!(subscription = %id, "event stream closed");
}
