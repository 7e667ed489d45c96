//! Shared fixtures for the service-level integration tests
//!
//! Everything runs against the in-memory store, so these tests need no
//! database. [`PausingStore`] wraps it for tests that interleave two
//! operations.

#![allow(dead_code)]

mod pausing_store;

pub use pausing_store::{PauseControl, PausePoint, PausingStore};

use std::sync::Arc;

use teamboard_shared::auth::identity::Identity;
use teamboard_shared::models::{CreateTeam, TeamRole};
use teamboard_shared::realtime::{Connection, FanoutHub, TeamEvent};
use teamboard_shared::services::{CoreServices, MemberIdentifier};
use teamboard_shared::store::{DynStore, MemoryStore};
use uuid::Uuid;

pub struct TestContext {
    pub store: DynStore,
    pub services: CoreServices,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: DynStore) -> Self {
        let services = CoreServices::new(store.clone(), FanoutHub::default());
        Self { store, services }
    }

    pub fn hub(&self) -> &FanoutHub {
        &self.services.hub
    }

    /// Creates a user known to the store
    pub async fn user(&self, name: &str) -> Identity {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            email: format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4()),
            name: Some(name.to_string()),
        };
        self.services
            .registry
            .sync_identity(&identity)
            .await
            .expect("Failed to sync identity");
        identity
    }

    /// Creates a team managed by `manager`
    pub async fn team(&self, manager: &Identity, name: &str) -> Uuid {
        self.services
            .registry
            .create_team(
                manager,
                CreateTeam {
                    name: name.to_string(),
                    description: None,
                },
            )
            .await
            .expect("Failed to create team")
            .team
            .id
    }

    /// Adds `user` to the team, promoting them when `role` is manager
    pub async fn join(&self, manager: &Identity, team_id: Uuid, user: &Identity, role: TeamRole) {
        self.services
            .registry
            .add_member(manager, team_id, MemberIdentifier::UserId(user.user_id))
            .await
            .expect("Failed to add member");
        if role.is_manager() {
            self.services
                .registry
                .change_role(manager, team_id, user.user_id, TeamRole::Manager)
                .await
                .expect("Failed to promote member");
        }
    }

    /// Opens a realtime connection subscribed to every team of `user`
    pub async fn connect(&self, user: &Identity) -> Connection {
        let mut connection = self.hub().connect(user.user_id);
        for team_id in self
            .services
            .registry
            .team_ids_for(user.user_id)
            .await
            .expect("Failed to list teams")
        {
            connection.handle().subscribe(team_id);
        }
        drain(&mut connection);
        connection
    }
}

/// Discards everything queued on the connection
pub fn drain(connection: &mut Connection) {
    while connection.try_recv().is_some() {}
}

/// Decodes every queued team event
pub fn events(connection: &mut Connection) -> Vec<TeamEvent> {
    let mut out = Vec::new();
    while let Some(frame) = connection.try_recv() {
        if let Ok(event) = serde_json::from_str::<TeamEvent>(&frame) {
            out.push(event);
        }
    }
    out
}

/// Kinds of every queued team event, in order
pub fn event_kinds(connection: &mut Connection) -> Vec<&'static str> {
    events(connection).iter().map(TeamEvent::kind).collect()
}
