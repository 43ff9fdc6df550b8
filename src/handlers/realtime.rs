//! WebSocket endpoint for live chat and the staff dashboard
//!
//! Frames are JSON `{"event": name, "data": {...}}` in both directions. Each
//! connection joins its session room on connect and more rooms on request;
//! every joined room gets a forwarding task feeding the socket writer.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::state::AppState;
use crate::domain::models::{Channel, GuestContext, MessageType};
use crate::domain::services::TurnRequest;
use crate::infrastructure::database::MessageRepository;
use crate::realtime::{conversation_room, EventFrame, ADMIN_ROOM};
use crate::shared::errors::{AppError, Result};

const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub session_id: Option<String>,
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> impl IntoResponse {
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| run_socket(socket, state, session_id))
}

async fn run_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut sink, mut stream) = socket.split();
    let (mut connection, mut outgoing) = Connection::open(state.clone(), session_id);
    tracing::info!(connection = %connection.id, session_id = %connection.session_id, "WebSocket connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = outgoing.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            WsMessage::Text(text) => match serde_json::from_str::<EventFrame>(text.as_str()) {
                Ok(frame) => connection.dispatch(frame).await,
                Err(e) => connection.send("error", json!({ "message": format!("Invalid frame: {}", e) })),
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!(connection = %connection.id, "WebSocket disconnected");
    connection.close();
    writer.abort();
    state.hub.prune();
}

#[derive(Debug, Deserialize)]
struct JoinConversation {
    conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct SendMessage {
    message: String,
    #[serde(default, alias = "user_info", alias = "user_context")]
    guest: GuestContext,
    #[serde(default, rename = "type")]
    message_type: MessageType,
    #[serde(default = "empty_metadata")]
    metadata: Value,
}

fn empty_metadata() -> Value {
    json!({})
}

#[derive(Debug, Deserialize)]
struct Typing {
    conversation_id: String,
    #[serde(default)]
    typing: bool,
}

#[derive(Debug, Deserialize)]
struct AdminMessage {
    conversation_id: String,
    message: String,
    #[serde(default = "default_agent")]
    agent_id: String,
}

fn default_agent() -> String {
    "admin".to_string()
}

#[derive(Debug, Deserialize)]
struct HistoryRequest {
    conversation_id: String,
    limit: Option<usize>,
}

fn payload<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| AppError::Validation(format!("Invalid payload: {}", e)))
}

/// One client connection and the rooms it listens to
pub(crate) struct Connection {
    id: Uuid,
    session_id: String,
    state: AppState,
    out: mpsc::UnboundedSender<EventFrame>,
    rooms: HashMap<String, JoinHandle<()>>,
}

impl Connection {
    /// Join the session room and greet the client
    pub(crate) fn open(
        state: AppState,
        session_id: String,
    ) -> (Self, mpsc::UnboundedReceiver<EventFrame>) {
        let (out, rx) = mpsc::unbounded_channel();
        let mut connection = Self {
            id: Uuid::new_v4(),
            session_id,
            state,
            out,
            rooms: HashMap::new(),
        };
        connection.join(connection.session_id.clone());
        connection.send(
            "connected",
            json!({ "session_id": connection.session_id, "message": "Connected to hotel customer service" }),
        );
        (connection, rx)
    }

    fn send(&self, event: &str, data: Value) {
        let _ = self.out.send(EventFrame::new(event, data));
    }

    /// Forward a room's events to this client, skipping ones it caused
    fn join(&mut self, room: String) {
        if self.rooms.contains_key(&room) {
            return;
        }
        let mut rx = self.state.hub.subscribe(&room);
        let out = self.out.clone();
        let me = self.id;
        let name = room.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        if envelope.origin == Some(me) {
                            continue;
                        }
                        if out.send(envelope.frame.as_ref().clone()).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(room = %name, skipped = skipped, "Client fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.rooms.insert(room, handle);
    }

    pub(crate) async fn dispatch(&mut self, frame: EventFrame) {
        if let Err(e) = self.handle(frame).await {
            tracing::debug!(connection = %self.id, error = %e, "WebSocket event failed");
            self.send("error", json!({ "message": e.to_string() }));
        }
    }

    async fn handle(&mut self, frame: EventFrame) -> Result<()> {
        match frame.event.as_str() {
            "join_conversation" => {
                let join: JoinConversation = payload(frame.data)?;
                self.join(conversation_room(&join.conversation_id));
                self.send(
                    "joined_conversation",
                    json!({ "conversation_id": join.conversation_id }),
                );
            }
            "send_message" => {
                let request: SendMessage = payload(frame.data)?;
                let turn = self
                    .state
                    .chat
                    .handle_turn(TurnRequest {
                        message: request.message,
                        session_id: Some(self.session_id.clone()),
                        channel: Channel::Web,
                        guest: request.guest,
                        message_type: request.message_type,
                        metadata: request.metadata,
                    })
                    .await;
                let outcome = match turn {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.state
                            .hub
                            .publish(&self.session_id, "ai_typing", json!({ "typing": false }));
                        return Err(e);
                    }
                };
                self.join(conversation_room(&outcome.conversation_id));
                self.send(
                    "ai_response",
                    json!({
                        "message": outcome.ai_message,
                        "conversation_id": outcome.conversation_id,
                        "intent": outcome.intent,
                        "sentiment": outcome.sentiment,
                        "escalate": outcome.escalate,
                        "suggested_responses": outcome.suggested_responses,
                    }),
                );
            }
            "typing" => {
                let typing: Typing = payload(frame.data)?;
                self.state.hub.publish_from(
                    Some(self.id),
                    &conversation_room(&typing.conversation_id),
                    "user_typing",
                    json!({ "session_id": self.session_id, "typing": typing.typing }),
                );
            }
            "admin_join" => {
                self.join(ADMIN_ROOM.to_string());
                self.send("admin_joined", json!({ "message": "Joined admin room" }));
            }
            "admin_message" => {
                let request: AdminMessage = payload(frame.data)?;
                self.state
                    .chat
                    .post_agent_message(&request.conversation_id, &request.agent_id, &request.message)
                    .await?;
            }
            "get_conversation_history" => {
                let request: HistoryRequest = payload(frame.data)?;
                let limit = request.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
                let messages = MessageRepository::list_for_conversation(
                    &self.state.db,
                    &request.conversation_id,
                    Some(limit),
                )
                .await?;
                self.send(
                    "conversation_history",
                    json!({ "conversation_id": request.conversation_id, "messages": messages }),
                );
            }
            other => {
                return Err(AppError::Validation(format!("Unknown event '{}'", other)));
            }
        }
        Ok(())
    }

    /// Stop all room forwarders
    pub(crate) fn close(&mut self) {
        for (_, handle) in self.rooms.drain() {
            handle.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SenderType;
    use crate::infrastructure::database::GuestRepository;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<EventFrame>, name: &str) -> EventFrame {
        loop {
            let frame = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed");
            if frame.event == name {
                return frame;
            }
        }
    }

    #[tokio::test]
    async fn test_connect_greets_with_session() {
        let state = AppState::for_testing().await;
        let (_conn, mut rx) = Connection::open(state, "sess-1".to_string());
        let frame = next_event(&mut rx, "connected").await;
        assert_eq!(frame.data["session_id"], "sess-1");
    }

    #[tokio::test]
    async fn test_send_message_replies_and_types() {
        let state = AppState::for_testing().await;
        let (mut conn, mut rx) = Connection::open(state, "sess-2".to_string());

        conn.dispatch(EventFrame::new("send_message", json!({ "message": "Is there a pool?" })))
            .await;

        let typing = next_event(&mut rx, "ai_typing").await;
        assert_eq!(typing.data["typing"], true);
        let reply = next_event(&mut rx, "ai_response").await;
        assert_eq!(reply.data["intent"], "amenities");
        assert_eq!(reply.data["suggested_responses"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_failed_turn_clears_typing_and_reports_error() {
        let state = AppState::for_testing().await;
        let (mut conn, mut rx) = Connection::open(state, "sess-err".to_string());

        conn.dispatch(EventFrame::new("send_message", json!({ "message": "   " })))
            .await;

        // the error is sent directly, typing-off goes through the room
        let (mut typing, mut error) = (None, None);
        while typing.is_none() || error.is_none() {
            let frame = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed");
            match frame.event.as_str() {
                "ai_typing" => typing = Some(frame),
                "error" => error = Some(frame),
                _ => {}
            }
        }
        assert_eq!(typing.unwrap().data["typing"], false);
        assert_eq!(error.unwrap().data["message"], "Message is required");
    }

    #[tokio::test]
    async fn test_send_message_keeps_client_type_and_metadata() {
        let state = AppState::for_testing().await;
        let (mut conn, mut rx) = Connection::open(state.clone(), "sess-meta".to_string());

        conn.dispatch(EventFrame::new(
            "send_message",
            json!({
                "message": "Can I get more towels?",
                "type": "audio",
                "metadata": { "client": "kiosk" },
                "user_context": { "room_number": "31" },
            }),
        ))
        .await;
        let reply = next_event(&mut rx, "ai_response").await;
        let conversation_id = reply.data["conversation_id"].as_str().unwrap().to_string();

        let messages = MessageRepository::list_for_conversation(&state.db, &conversation_id, None)
            .await
            .unwrap();
        let user = messages.iter().find(|m| m.sender_type == SenderType::User).unwrap();
        assert_eq!(user.message_type, MessageType::Audio);
        assert_eq!(user.metadata["client"], "kiosk");

        let guest = GuestRepository::find_by_session_id(&state.db, "sess-meta")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(guest.room_number.as_deref(), Some("31"));
    }

    #[tokio::test]
    async fn test_typing_not_echoed_to_sender() {
        let state = AppState::for_testing().await;
        let (mut alice, mut alice_rx) = Connection::open(state.clone(), "a".to_string());
        let (mut bob, mut bob_rx) = Connection::open(state, "b".to_string());

        for conn in [&mut alice, &mut bob] {
            conn.dispatch(EventFrame::new("join_conversation", json!({ "conversation_id": "c1" })))
                .await;
        }
        next_event(&mut alice_rx, "joined_conversation").await;
        next_event(&mut bob_rx, "joined_conversation").await;

        alice
            .dispatch(EventFrame::new("typing", json!({ "conversation_id": "c1", "typing": true })))
            .await;

        let seen = next_event(&mut bob_rx, "user_typing").await;
        assert_eq!(seen.data["session_id"], "a");
        tokio::time::sleep(Duration::from_millis(50)).await;
        while let Ok(frame) = alice_rx.try_recv() {
            assert_ne!(frame.event, "user_typing");
        }
    }

    #[tokio::test]
    async fn test_admin_receives_escalations_and_sends_agent_messages() {
        let state = AppState::for_testing().await;
        let (mut admin, mut admin_rx) = Connection::open(state.clone(), "staff".to_string());
        admin.dispatch(EventFrame::new("admin_join", json!({}))).await;
        next_event(&mut admin_rx, "admin_joined").await;

        let (mut guest, mut guest_rx) = Connection::open(state, "guest".to_string());
        guest
            .dispatch(EventFrame::new(
                "send_message",
                json!({ "message": "I want to speak to a manager now" }),
            ))
            .await;
        let reply = next_event(&mut guest_rx, "ai_response").await;
        assert_eq!(reply.data["escalate"], true);
        let conversation_id = reply.data["conversation_id"].as_str().unwrap().to_string();

        let alert = next_event(&mut admin_rx, "escalation_needed").await;
        assert_eq!(alert.data["conversation_id"], conversation_id.as_str());

        admin
            .dispatch(EventFrame::new(
                "admin_message",
                json!({ "conversation_id": conversation_id, "message": "A manager is on the way" }),
            ))
            .await;
        let agent = next_event(&mut guest_rx, "agent_message").await;
        assert_eq!(agent.data["message"]["sender_id"], "admin");
    }

    #[tokio::test]
    async fn test_history_and_unknown_event() {
        let state = AppState::for_testing().await;
        let (mut conn, mut rx) = Connection::open(state, "sess-3".to_string());
        conn.dispatch(EventFrame::new("send_message", json!({ "message": "hello" }))).await;
        let reply = next_event(&mut rx, "ai_response").await;

        conn.dispatch(EventFrame::new(
            "get_conversation_history",
            json!({ "conversation_id": reply.data["conversation_id"] }),
        ))
        .await;
        let history = next_event(&mut rx, "conversation_history").await;
        assert_eq!(history.data["messages"].as_array().map(Vec::len), Some(2));

        conn.dispatch(EventFrame::new("bogus", Value::Null)).await;
        let error = next_event(&mut rx, "error").await;
        assert!(error.data["message"].as_str().unwrap().contains("bogus"));
    }
}
