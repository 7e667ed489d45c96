//! WebSocket channel for team events
//!
//! ```text
//! GET /v1/realtime
//! Authorization: Bearer <jwt_token>        (or ?token=<jwt_token>)
//! ```
//!
//! The caller is authenticated before the upgrade; without a valid token the
//! request fails with 401 and no socket is opened. Once connected the client
//! is subscribed to every team it belongs to and receives
//! `{"event": ..., "data": ...}` frames for those teams only. Control
//! messages (`join:team`, `leave:team`, `ping`) are answered on the same
//! socket.

use axum::{
    extract::{
        ws::rejection::WebSocketUpgradeRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use teamboard_shared::auth::identity::{bearer_token, AuthError, Identity};
use teamboard_shared::realtime::session;
use tracing::{debug, info, warn};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

/// Query parameters accepted on the handshake
#[derive(Debug, Default, Deserialize)]
pub struct RealtimeQuery {
    /// Token for clients that cannot set headers on a WebSocket request
    pub token: Option<String>,
}

/// Resolves the caller from the `Authorization` header, falling back to the
/// `token` query parameter
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> ApiResult<Identity> {
    let token = match headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        Some(value) => bearer_token(value)?,
        None => query_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredentials)?,
    };

    let identity = state.resolver.resolve(token).await?;
    state.services.registry.sync_identity(&identity).await?;
    Ok(identity)
}

/// WebSocket upgrade handler
pub async fn realtime_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RealtimeQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    let identity = authenticate(&state, &headers, query.token.as_deref())
        .await
        .map_err(|e| {
            debug!(error = %e, "Rejected realtime handshake");
            e
        })?;

    let ws = ws.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, identity))
        .into_response())
}

/// Pumps hub frames out and control messages in until either side closes
async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let connection = match session::open(state.hub(), &state.services.registry, &identity).await {
        Ok(connection) => connection,
        Err(e) => {
            warn!(user_id = %identity.user_id, error = %e, "Failed to open realtime session");
            return;
        }
    };
    let (handle, mut rx) = connection.into_split();
    let connection_id = handle.id();
    let (mut sender, mut receiver) = socket.split();

    // Forward hub frames (events and replies) to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    // Apply control messages; dropping the handle leaves every group
    let registry = state.services.registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = session::handle_client_text(&registry, &handle, &text).await;
                    handle.send(&reply);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!(
        user_id = %identity.user_id,
        connection_id,
        "Realtime session closed"
    );
}
