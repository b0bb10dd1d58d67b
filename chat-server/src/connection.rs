use std::sync::Arc;
use std::time::Duration;

use chat_store::models::input::{ChatIdInput, SendMessageInput, UserIdInput, ValidateExt};
use chat_store::models::UserStatus;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::messages::WsMessage;
use crate::state::ServerState;

/// Time a new connection has to send its Connect frame
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection
pub async fn handle_connection(ws_stream: WebSocketStream<TcpStream>, state: Arc<ServerState>) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let user_id = match wait_for_connect(&mut ws_receiver).await {
        Some(id) => id,
        None => {
            warn!("Connection closed before authentication");
            return;
        }
    };

    // Identity is only "this user exists in the store"
    if state.store().get_user_by_id(&user_id).is_none() {
        warn!("Rejecting connection for unknown user {}", user_id);
        let rejection = WsMessage::AuthResponse {
            success: false,
            message: format!("Unknown user {}", user_id),
        };
        if let Ok(json) = serde_json::to_string(&rejection) {
            let _ = ws_sender.send(Message::Text(json.into())).await;
        }
        let _ = ws_sender.close().await;
        return;
    }

    info!("User connected: {}", user_id);

    // Create channel for sending messages to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let reply_tx = tx.clone();

    state.add_client(user_id.clone(), tx);
    state.store().set_user_status(&user_id, UserStatus::Online);

    let auth_response = WsMessage::AuthResponse {
        success: true,
        message: "Connected to server".to_string(),
    };
    match serde_json::to_string(&auth_response) {
        Ok(json) => {
            if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                error!("Failed to send auth response to {}: {}", user_id, e);
            }
        }
        Err(e) => {
            error!("Failed to serialize auth response for {}: {}", user_id, e);
        }
    }

    // Broadcast presence to all other clients
    let presence = WsMessage::Presence {
        user_id: user_id.clone(),
        is_online: true,
        last_seen: None,
    };
    match serde_json::to_string(&presence) {
        Ok(json) => state.broadcast(&json, Some(&user_id)),
        Err(e) => error!("Failed to serialize presence for {}: {}", user_id, e),
    }

    // Send existing online users to the newly connected client
    for online_user_id in state.online_users() {
        if online_user_id != user_id {
            let existing_presence = WsMessage::Presence {
                user_id: online_user_id,
                is_online: true,
                last_seen: None,
            };
            if let Ok(json) = serde_json::to_string(&existing_presence) {
                let _ = reply_tx.send(json);
            }
        }
    }

    // Flush messages pushed while the user was offline
    let pending = state.take_pending_messages(&user_id);
    if !pending.is_empty() {
        info!(
            "Delivering {} pending messages to {}",
            pending.len(),
            user_id
        );
        for msg in pending {
            let _ = reply_tx.send(msg);
        }
    }

    // Forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let mut send_finished = false;
    loop {
        tokio::select! {
            res = ws_receiver.next() => {
                match res {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_message(&text, &user_id, &state) {
                            match serde_json::to_string(&reply) {
                                Ok(json) => {
                                    let _ = reply_tx.send(json);
                                }
                                Err(e) => error!("Failed to serialize reply for {}: {}", user_id, e),
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("User {} sent close frame", user_id);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for user {}: {}", user_id, e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended for user {}", user_id);
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut send_task => {
                info!("Send task finished for user {} (likely connection lost)", user_id);
                send_finished = true;
                break;
            }
        }
    }

    // Cleanup; the receiver must be dropped before remove_client checks for closed channels
    if !send_finished {
        send_task.abort();
        let _ = send_task.await;
    }

    if state.remove_client(&user_id) {
        state.store().set_user_status(&user_id, UserStatus::Offline);

        let offline_presence = WsMessage::Presence {
            user_id: user_id.clone(),
            is_online: false,
            last_seen: Some(chrono::Utc::now().timestamp_millis()),
        };
        if let Ok(json) = serde_json::to_string(&offline_presence) {
            state.broadcast(&json, None);
        }
    }

    info!("User disconnected: {}", user_id);
}

/// Wait for the Connect message from a new connection
async fn wait_for_connect(
    receiver: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
) -> Option<String> {
    let timeout = tokio::time::timeout(CONNECT_TIMEOUT, async {
        while let Some(result) = receiver.next().await {
            if let Ok(Message::Text(text)) = result {
                match serde_json::from_str::<WsMessage>(&text) {
                    Ok(WsMessage::Connect { user_id }) => {
                        let input = UserIdInput { user_id };
                        if let Err(e) = input.validate_input() {
                            warn!("Rejected Connect message: {}", e);
                            return None;
                        }
                        return Some(input.user_id);
                    }
                    Ok(_) => {
                        debug!("Ignoring frame received before Connect");
                    }
                    Err(e) => {
                        warn!("Failed to parse Connect message: {}", e);
                    }
                }
            }
        }
        None
    });

    match timeout.await {
        Ok(result) => result,
        Err(_) => {
            warn!("Authentication timeout");
            None
        }
    }
}

/// Handle a request from an authenticated client and build its reply.
///
/// Every request acts as `user_id`. New messages are also pushed to the
/// chat's other participants, or queued for them while they are offline.
pub fn handle_message(text: &str, user_id: &str, state: &ServerState) -> Option<WsMessage> {
    let msg: WsMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse message from {}: {}", user_id, e);
            return Some(WsMessage::error(format!("Malformed request: {}", e)));
        }
    };

    let store = state.store();

    match msg {
        WsMessage::GetCurrentUser => Some(WsMessage::CurrentUser {
            user: store.get_current_user(user_id),
        }),
        WsMessage::GetUser { user_id: target } => {
            let input = UserIdInput { user_id: target };
            if let Err(e) = input.validate_input() {
                return Some(WsMessage::error(e.to_string()));
            }
            let user = store.get_user_by_id(&input.user_id);
            Some(WsMessage::User {
                user_id: input.user_id,
                user,
            })
        }
        WsMessage::GetChats => Some(WsMessage::Chats {
            chats: store.get_chats(user_id),
        }),
        WsMessage::GetChat { chat_id } => with_chat_id(chat_id, |chat_id| WsMessage::Chat {
            chat: store.get_chat_by_id(&chat_id),
            chat_id,
        }),
        WsMessage::GetMessages { chat_id } => {
            with_chat_id(chat_id, |chat_id| WsMessage::Messages {
                messages: store.get_messages_by_chat_id(&chat_id),
                chat_id,
            })
        }
        WsMessage::SendMessage { chat_id, content } => {
            let input = SendMessageInput { chat_id, content };
            if let Err(e) = input.validate_input() {
                return Some(WsMessage::error(e.to_string()));
            }
            match store.send_message(&input.chat_id, &input.content, user_id) {
                Ok(message) => {
                    push_new_message(state, &message);
                    Some(WsMessage::MessageSent { message })
                }
                Err(e) => {
                    warn!("send_message from {} failed: {}", user_id, e);
                    Some(WsMessage::error(e.to_string()))
                }
            }
        }
        WsMessage::MarkChatRead { chat_id } => with_chat_id(chat_id, |chat_id| {
            let marked = store.mark_chat_as_read(&chat_id, user_id);
            WsMessage::ChatRead {
                chat_id,
                user_id: user_id.to_string(),
                marked,
            }
        }),
        WsMessage::GetFriends => Some(WsMessage::Friends {
            friends: store.get_friends_list(user_id),
        }),
        WsMessage::GetChatMembers { chat_id } => {
            with_chat_id(chat_id, |chat_id| WsMessage::ChatMembers {
                members: store.get_chat_members(&chat_id),
                chat_id,
            })
        }
        WsMessage::Connect { .. } => {
            // Already authenticated, ignore
            None
        }
        WsMessage::AuthResponse { .. }
        | WsMessage::CurrentUser { .. }
        | WsMessage::User { .. }
        | WsMessage::Chats { .. }
        | WsMessage::Chat { .. }
        | WsMessage::Messages { .. }
        | WsMessage::MessageSent { .. }
        | WsMessage::NewMessage { .. }
        | WsMessage::ChatRead { .. }
        | WsMessage::Friends { .. }
        | WsMessage::ChatMembers { .. }
        | WsMessage::Presence { .. }
        | WsMessage::Error { .. } => {
            warn!("Ignoring server-only message from {}", user_id);
            None
        }
    }
}

/// Validate a chat id and build the reply, or reply with the validation error
fn with_chat_id(chat_id: String, reply: impl FnOnce(String) -> WsMessage) -> Option<WsMessage> {
    let input = ChatIdInput { chat_id };
    match input.validate_input() {
        Ok(()) => Some(reply(input.chat_id)),
        Err(e) => Some(WsMessage::error(e.to_string())),
    }
}

/// Push a stored message to every participant except its sender
fn push_new_message(state: &ServerState, message: &chat_store::models::Message) {
    let push = WsMessage::NewMessage {
        message: message.clone(),
    };
    let json = match serde_json::to_string(&push) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize new message {}: {}", message.id, e);
            return;
        }
    };
    for participant in state.store().get_participants(&message.chat_id) {
        if participant != message.sender_id {
            state.send_or_queue(&participant, &json);
        }
    }
}
