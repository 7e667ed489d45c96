//! Team-scoped publish/subscribe hub
//!
//! Each connected client gets a [`Connection`] with its own bounded outbound
//! queue. A connection subscribes to one group per team, keyed by team id;
//! [`FanoutHub::publish`] pushes an event to every connection in the event's
//! team group and to nobody else.
//!
//! Delivery is at-most-once. A full queue drops the event for that
//! connection only, and a disconnected client must re-fetch state instead of
//! expecting a replay.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::events::TeamEvent;

/// Default per-connection outbound buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Identifier of a live connection
pub type ConnectionId = u64;

/// Process-wide fan-out hub; cheap to clone
#[derive(Clone)]
pub struct FanoutHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    state: RwLock<HubState>,
    next_id: AtomicU64,
    capacity: usize,
}

#[derive(Default)]
struct HubState {
    groups: HashMap<Uuid, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

struct ConnectionEntry {
    user_id: Uuid,
    tx: mpsc::Sender<Arc<str>>,
    teams: HashSet<Uuid>,
}

impl HubState {
    fn subscribe(&mut self, conn_id: ConnectionId, team_id: Uuid) -> bool {
        let Some(entry) = self.connections.get_mut(&conn_id) else {
            return false;
        };
        entry.teams.insert(team_id);
        self.groups.entry(team_id).or_default().insert(conn_id)
    }

    fn unsubscribe(&mut self, conn_id: ConnectionId, team_id: Uuid) -> bool {
        if let Some(entry) = self.connections.get_mut(&conn_id) {
            entry.teams.remove(&team_id);
        }

        let Some(group) = self.groups.get_mut(&team_id) else {
            return false;
        };
        let removed = group.remove(&conn_id);
        if group.is_empty() {
            self.groups.remove(&team_id);
        }
        removed
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl std::fmt::Debug for FanoutHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutHub")
            .field("capacity", &self.inner.capacity)
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl FanoutHub {
    /// Creates a hub whose connections buffer up to `capacity` messages
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: RwLock::new(HubState::default()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HubState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HubState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new connection for `user_id` with no subscriptions
    ///
    /// The connection is removed from every group when the returned value
    /// (or the [`ConnectionHandle`] split from it) is dropped.
    pub fn connect(&self, user_id: Uuid) -> Connection {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.capacity);

        self.write().connections.insert(
            id,
            ConnectionEntry {
                user_id,
                tx,
                teams: HashSet::new(),
            },
        );
        debug!(connection_id = id, user_id = %user_id, "Realtime connection registered");

        Connection {
            handle: ConnectionHandle {
                id,
                user_id,
                hub: self.clone(),
            },
            rx,
        }
    }

    fn disconnect(&self, conn_id: ConnectionId) {
        let mut state = self.write();
        let Some(entry) = state.connections.remove(&conn_id) else {
            return;
        };

        for team_id in entry.teams {
            if let Some(group) = state.groups.get_mut(&team_id) {
                group.remove(&conn_id);
                if group.is_empty() {
                    state.groups.remove(&team_id);
                }
            }
        }
        debug!(connection_id = conn_id, user_id = %entry.user_id, "Realtime connection released");
    }

    /// Adds a connection to a team group; returns `false` if it was already there
    pub fn subscribe(&self, conn_id: ConnectionId, team_id: Uuid) -> bool {
        self.write().subscribe(conn_id, team_id)
    }

    /// Removes a connection from a team group; returns `false` if it wasn't there
    pub fn unsubscribe(&self, conn_id: ConnectionId, team_id: Uuid) -> bool {
        self.write().unsubscribe(conn_id, team_id)
    }

    /// Subscribes every open connection of `user_id` to the team group
    pub fn enroll_user(&self, user_id: Uuid, team_id: Uuid) -> usize {
        let mut state = self.write();
        let conn_ids: Vec<ConnectionId> = state
            .connections
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id)
            .map(|(id, _)| *id)
            .collect();

        conn_ids
            .into_iter()
            .filter(|id| state.subscribe(*id, team_id))
            .count()
    }

    /// Removes every open connection of `user_id` from the team group
    pub fn revoke_user(&self, user_id: Uuid, team_id: Uuid) -> usize {
        let mut state = self.write();
        let conn_ids: Vec<ConnectionId> = state
            .groups
            .get(&team_id)
            .map(|group| {
                group
                    .iter()
                    .copied()
                    .filter(|id| {
                        state
                            .connections
                            .get(id)
                            .is_some_and(|entry| entry.user_id == user_id)
                    })
                    .collect()
            })
            .unwrap_or_default();

        conn_ids
            .into_iter()
            .filter(|id| state.unsubscribe(*id, team_id))
            .count()
    }

    /// Drops a team group entirely, e.g. after the team was deleted
    pub fn close_group(&self, team_id: Uuid) -> usize {
        let mut state = self.write();
        let Some(group) = state.groups.remove(&team_id) else {
            return 0;
        };

        for conn_id in &group {
            if let Some(entry) = state.connections.get_mut(conn_id) {
                entry.teams.remove(&team_id);
            }
        }
        group.len()
    }

    /// Publishes an event to the group of the event's team
    ///
    /// Returns how many connections accepted the event.
    pub fn publish(&self, event: &TeamEvent) -> usize {
        let team_id = event.team_id();
        let payload: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(error = %e, event = event.kind(), "Failed to serialize realtime event");
                return 0;
            }
        };

        let state = self.read();
        let Some(group) = state.groups.get(&team_id) else {
            debug!(team_id = %team_id, event = event.kind(), "No subscribers for event");
            return 0;
        };

        let mut delivered = 0;
        for conn_id in group {
            let Some(entry) = state.connections.get(conn_id) else {
                continue;
            };
            match entry.tx.try_send(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        connection_id = conn_id,
                        team_id = %team_id,
                        event = event.kind(),
                        "Outbound queue full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }

        debug!(
            team_id = %team_id,
            event = event.kind(),
            delivered,
            subscribers = group.len(),
            "Published realtime event"
        );
        delivered
    }

    /// Sends a message to a single connection, outside any group
    pub fn send_to<T: Serialize>(&self, conn_id: ConnectionId, message: &T) -> bool {
        let Ok(json) = serde_json::to_string(message) else {
            return false;
        };

        self.read()
            .connections
            .get(&conn_id)
            .is_some_and(|entry| entry.tx.try_send(json.into()).is_ok())
    }

    /// Number of connections in a team group
    pub fn group_size(&self, team_id: Uuid) -> usize {
        self.read().groups.get(&team_id).map_or(0, |group| group.len())
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    /// Teams a connection is subscribed to
    pub fn subscriptions(&self, conn_id: ConnectionId) -> HashSet<Uuid> {
        self.read()
            .connections
            .get(&conn_id)
            .map(|entry| entry.teams.clone())
            .unwrap_or_default()
    }
}

/// A live connection: control handle plus the outbound message queue
pub struct Connection {
    handle: ConnectionHandle,
    rx: mpsc::Receiver<Arc<str>>,
}

impl Connection {
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Waits for the next outbound message
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    /// Takes the next outbound message if one is queued
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }

    /// Splits into the control handle and the outbound queue so they can be
    /// driven from separate tasks
    pub fn into_split(self) -> (ConnectionHandle, mpsc::Receiver<Arc<str>>) {
        (self.handle, self.rx)
    }
}

/// Control side of a connection; unregisters the connection on drop
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: Uuid,
    hub: FanoutHub,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn subscribe(&self, team_id: Uuid) -> bool {
        self.hub.subscribe(self.id, team_id)
    }

    pub fn unsubscribe(&self, team_id: Uuid) -> bool {
        self.hub.unsubscribe(self.id, team_id)
    }

    pub fn subscriptions(&self) -> HashSet<Uuid> {
        self.hub.subscriptions(self.id)
    }

    /// Queues a direct message (control reply) for this connection
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        self.hub.send_to(self.id, message)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::events::MemberLeft;

    fn event_for(team_id: Uuid) -> TeamEvent {
        TeamEvent::MemberLeft(MemberLeft {
            team_id,
            user_id: Uuid::new_v4(),
        })
    }

    #[test]
    fn test_publish_reaches_only_group() {
        let hub = FanoutHub::new(8);
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();

        let mut a = hub.connect(Uuid::new_v4());
        let mut b = hub.connect(Uuid::new_v4());
        a.handle().subscribe(team_a);
        b.handle().subscribe(team_b);

        assert_eq!(hub.publish(&event_for(team_a)), 1);
        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn test_drop_releases_subscriptions() {
        let hub = FanoutHub::new(8);
        let team = Uuid::new_v4();

        let conn = hub.connect(Uuid::new_v4());
        conn.handle().subscribe(team);
        assert_eq!(hub.group_size(team), 1);

        drop(conn);
        assert_eq!(hub.group_size(team), 0);
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_enroll_and_revoke_user() {
        let hub = FanoutHub::new(8);
        let team = Uuid::new_v4();
        let user = Uuid::new_v4();

        let first = hub.connect(user);
        let second = hub.connect(user);
        let _other = hub.connect(Uuid::new_v4());

        assert_eq!(hub.enroll_user(user, team), 2);
        assert_eq!(hub.group_size(team), 2);
        assert!(first.handle().subscriptions().contains(&team));

        assert_eq!(hub.revoke_user(user, team), 2);
        assert_eq!(hub.group_size(team), 0);
        assert!(second.handle().subscriptions().is_empty());
    }

    #[test]
    fn test_close_group() {
        let hub = FanoutHub::new(8);
        let team = Uuid::new_v4();
        let conn = hub.connect(Uuid::new_v4());
        conn.handle().subscribe(team);

        assert_eq!(hub.close_group(team), 1);
        assert!(conn.handle().subscriptions().is_empty());
        assert_eq!(hub.publish(&event_for(team)), 0);
    }

    #[test]
    fn test_full_queue_drops_event() {
        let hub = FanoutHub::new(1);
        let team = Uuid::new_v4();
        let mut conn = hub.connect(Uuid::new_v4());
        conn.handle().subscribe(team);

        assert_eq!(hub.publish(&event_for(team)), 1);
        assert_eq!(hub.publish(&event_for(team)), 0);

        assert!(conn.try_recv().is_some());
        assert!(conn.try_recv().is_none());
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let hub = FanoutHub::new(8);
        let team = Uuid::new_v4();
        let conn = hub.connect(Uuid::new_v4());

        assert!(conn.handle().subscribe(team));
        assert!(!conn.handle().subscribe(team));
        assert!(conn.handle().unsubscribe(team));
        assert!(!conn.handle().unsubscribe(team));
    }
}
