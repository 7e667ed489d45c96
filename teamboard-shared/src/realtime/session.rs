//! Transport-independent session logic
//!
//! A transport (the WebSocket route) authenticates the caller, then calls
//! [`open`] to register the connection and enroll it in every team the user
//! belongs to. Each text frame from the client goes through
//! [`handle_client_text`], which returns the reply to send back.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hub::{Connection, ConnectionHandle, FanoutHub};
use super::protocol::{ClientMessage, ServerMessage};
use crate::auth::identity::Identity;
use crate::error::CoreResult;
use crate::services::MembershipRegistry;

/// Subscribes the connection to a team, then confirms the membership
///
/// Removals write the store before revoking. Reading the membership after
/// subscribing means a removal that committed first is caught here, and one
/// that commits later finds the subscription and revokes it.
async fn subscribe_verified(
    registry: &MembershipRegistry,
    handle: &ConnectionHandle,
    team_id: Uuid,
) -> CoreResult<bool> {
    handle.subscribe(team_id);
    if registry.is_member(team_id, handle.user_id()).await? {
        return Ok(true);
    }

    handle.unsubscribe(team_id);
    debug!(
        connection_id = handle.id(),
        team_id = %team_id,
        "Membership gone before enrollment completed"
    );
    Ok(false)
}

/// Registers a connection and subscribes it to the user's teams
///
/// The connection is registered before the membership query, so a member
/// added in between is still enrolled by [`FanoutHub::enroll_user`].
pub async fn open(
    hub: &FanoutHub,
    registry: &MembershipRegistry,
    identity: &Identity,
) -> CoreResult<Connection> {
    let connection = hub.connect(identity.user_id);
    let candidates = registry.team_ids_for(identity.user_id).await?;

    let mut team_ids = Vec::with_capacity(candidates.len());
    for team_id in candidates {
        if subscribe_verified(registry, connection.handle(), team_id).await? {
            team_ids.push(team_id);
        }
    }

    info!(
        user_id = %identity.user_id,
        connection_id = connection.handle().id(),
        teams = team_ids.len(),
        "Realtime session opened"
    );
    connection.handle().send(&ServerMessage::Connected {
        user_id: identity.user_id,
        team_ids,
    });
    Ok(connection)
}

/// Applies one client control message and returns the reply
pub async fn handle_client_message(
    registry: &MembershipRegistry,
    handle: &ConnectionHandle,
    message: ClientMessage,
) -> ServerMessage {
    match message {
        ClientMessage::JoinTeam { team_id } => {
            if registry.authorize(team_id, handle.user_id(), None).await.is_err() {
                return ServerMessage::error("Not a member of this team");
            }

            match subscribe_verified(registry, handle, team_id).await {
                Ok(true) => {
                    debug!(connection_id = handle.id(), team_id = %team_id, "Joined team group");
                    ServerMessage::Joined { team_id }
                }
                Ok(false) => ServerMessage::error("Not a member of this team"),
                Err(e) => {
                    warn!(connection_id = handle.id(), team_id = %team_id, error = %e, "Join failed");
                    ServerMessage::error("Could not join team")
                }
            }
        }
        ClientMessage::LeaveTeam { team_id } => {
            handle.unsubscribe(team_id);
            debug!(connection_id = handle.id(), team_id = %team_id, "Left team group");
            ServerMessage::Left { team_id }
        }
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

/// Parses a raw text frame and applies it
pub async fn handle_client_text(
    registry: &MembershipRegistry,
    handle: &ConnectionHandle,
    text: &str,
) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => handle_client_message(registry, handle, message).await,
        Err(e) => {
            debug!(connection_id = handle.id(), error = %e, "Invalid control message");
            ServerMessage::error("Invalid message")
        }
    }
}
