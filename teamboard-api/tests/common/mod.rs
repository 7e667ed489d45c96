//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An app wired to the in-memory store (no database needed)
//! - JWT token generation for test users
//! - Request helpers returning status and JSON body

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use teamboard_api::app::{build_router, AppState};
use teamboard_api::config::{
    ApiConfig, Config, DatabaseConfig, JwtConfig, RealtimeConfig, StoreBackend,
};
use teamboard_shared::auth::jwt::{create_token, Claims};
use teamboard_shared::realtime::{Connection, TeamEvent};
use teamboard_shared::store::MemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const ISSUER: &str = "teamboard";

/// A user with a signed token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestUser {
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub state: AppState,
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            backend: StoreBackend::Memory,
            url: String::new(),
            max_connections: 1,
            run_migrations: false,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
            issuer: ISSUER.to_string(),
        },
        realtime: RealtimeConfig {
            channel_capacity: 64,
        },
    }
}

impl TestContext {
    pub fn new() -> Self {
        let state = AppState::new(test_config(), Arc::new(MemoryStore::new()));
        let app = build_router(state.clone());
        Self { app, state }
    }

    /// Mints a token for a new user
    ///
    /// The user only becomes known to the store on their first request.
    pub fn user(&self, name: &str) -> TestUser {
        let id = Uuid::new_v4();
        let email = format!("{}-{}@example.com", name.to_lowercase(), id.simple());
        let claims = Claims::new(id, email.clone(), Some(name.to_string()), ISSUER);
        let token = create_token(&claims, SECRET).expect("Failed to sign token");

        TestUser { id, email, token }
    }

    /// Sends a request and returns the status and JSON body (`Null` if empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("authorization", user.auth_header());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(user), None).await
    }

    /// Makes the user known to the store, as any authenticated request does
    pub async fn register(&self, user: &TestUser) {
        let (status, _) = self.get("/v1/teams", user).await;
        assert_eq!(status, StatusCode::OK);
    }

    /// Creates a team through the API and returns its ID
    pub async fn create_team(&self, manager: &TestUser, name: &str) -> Uuid {
        let (status, body) = self
            .post("/v1/teams", manager, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Adds `user` to the team through the API
    pub async fn add_member(&self, manager: &TestUser, team_id: Uuid, user: &TestUser) {
        self.register(user).await;
        let (status, body) = self
            .post(
                &format!("/v1/teams/{}/members", team_id),
                manager,
                serde_json::json!({ "email": user.email }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    /// Opens a hub connection for `user`, subscribed to the given teams
    pub fn listen(&self, user: &TestUser, teams: &[Uuid]) -> Connection {
        let connection = self.state.hub().connect(user.id);
        for team_id in teams {
            connection.handle().subscribe(*team_id);
        }
        connection
    }
}

/// Kinds of every team event queued on the connection, in order
pub fn event_kinds(connection: &mut Connection) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    while let Some(frame) = connection.try_recv() {
        if let Ok(event) = serde_json::from_str::<TeamEvent>(&frame) {
            kinds.push(event.kind());
        }
    }
    kinds
}
