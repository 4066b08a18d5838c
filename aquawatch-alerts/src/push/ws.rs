//! WebSocket listener endpoints.
//!
//! `/ws/alerts/{user,village,district,state}/:id`, plus
//! `/ws/alerts/dashboard/:id` as an alias for the district stream. The JWT
//! travels in `?token=` since browsers cannot set headers on upgrades.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use aquawatch_shared::middleware::{decode_token, JwtSecret};
use aquawatch_shared::types::auth::AuthUser;
use aquawatch_shared::{AppError, AppResult, ErrorCode};

use crate::push::{AlertGroup, PushMessage};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamAuth {
    pub token: Option<String>,
}

fn authenticate(state: &AppState, auth: &StreamAuth) -> AppResult<AuthUser> {
    let token = auth
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing token query parameter"))?;
    let claims = decode_token(token, state.jwt_secret())?;
    Ok(AuthUser::from(claims))
}

/// Users may only follow their own stream; admins may follow anyone's.
pub fn may_watch_user(viewer: &AuthUser, target: Uuid) -> bool {
    viewer.id == target || viewer.role.is_admin()
}

fn upgrade(ws: WebSocketUpgrade, state: &AppState, group: AlertGroup, viewer: AuthUser) -> Response {
    let rx = state.hub.subscribe(group);
    tracing::info!(group = %group, user_id = %viewer.id, "alert listener connected");
    ws.on_upgrade(move |socket| forward(socket, rx, group))
}

pub async fn user_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(auth): Query<StreamAuth>,
) -> AppResult<Response> {
    let viewer = authenticate(&state, &auth)?;
    if !may_watch_user(&viewer, user_id) {
        return Err(AppError::forbidden("cannot listen to another user's alerts"));
    }
    Ok(upgrade(ws, &state, AlertGroup::User(user_id), viewer))
}

pub async fn village_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(village_id): Path<i32>,
    Query(auth): Query<StreamAuth>,
) -> AppResult<Response> {
    let viewer = authenticate(&state, &auth)?;
    Ok(upgrade(ws, &state, AlertGroup::Village(village_id), viewer))
}

pub async fn district_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(district_id): Path<i32>,
    Query(auth): Query<StreamAuth>,
) -> AppResult<Response> {
    let viewer = authenticate(&state, &auth)?;
    Ok(upgrade(ws, &state, AlertGroup::District(district_id), viewer))
}

pub async fn state_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(state_id): Path<i32>,
    Query(auth): Query<StreamAuth>,
) -> AppResult<Response> {
    let viewer = authenticate(&state, &auth)?;
    Ok(upgrade(ws, &state, AlertGroup::State(state_id), viewer))
}

/// Pump hub messages to the socket until either side goes away.
async fn forward(socket: WebSocket, mut rx: broadcast::Receiver<Arc<PushMessage>>, group: AlertGroup) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(message) => {
                    let json = match serde_json::to_string(message.as_ref()) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to encode push message");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(group = %group, lagged = n, "alert listener lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                // listeners are receive-only
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(group = %group, "alert listener disconnected");
}
