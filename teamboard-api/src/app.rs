/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamboard_api::{app::AppState, config::Config};
/// use teamboard_shared::store::MemoryStore;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(config, Arc::new(MemoryStore::new()));
/// let app = teamboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use teamboard_shared::auth::identity::{bearer_token, AuthError, IdentityResolver, JwtIdentityResolver};
use teamboard_shared::realtime::FanoutHub;
use teamboard_shared::services::CoreServices;
use teamboard_shared::store::DynStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    /// Store backing the services
    pub store: DynStore,

    /// Membership registry, task lifecycle, comment ledger and the hub
    pub services: CoreServices,

    /// Turns bearer tokens into identities
    pub resolver: Arc<dyn IdentityResolver>,
}

impl AppState {
    /// Creates new application state around `store`
    pub fn new(config: Config, store: DynStore) -> Self {
        let hub = FanoutHub::new(config.realtime.channel_capacity);
        let resolver = JwtIdentityResolver::new(config.jwt.secret.clone(), config.jwt.issuer.clone());

        Self {
            services: CoreServices::new(store.clone(), hub),
            store,
            resolver: Arc::new(resolver),
            config: Arc::new(config),
        }
    }

    pub fn hub(&self) -> &FanoutHub {
        &self.services.hub
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                               # Health check (public)
/// └── /v1/
///     ├── /realtime                         # WebSocket (token in header or ?token=)
///     ├── /teams                            # GET list, POST create
///     │   └── /:team_id                     # GET, PATCH, DELETE
///     │       ├── /members                  # GET, POST
///     │       │   └── /:user_id             # DELETE
///     │       │       └── /role             # PATCH
///     │       ├── /leave                    # POST
///     │       └── /tasks                    # GET (filters), POST
///     ├── /tasks/:task_id                   # GET, PATCH, DELETE
///     │   ├── /status                       # PATCH
///     │   └── /comments                     # GET, POST
///     └── /comments/:comment_id             # PATCH, DELETE
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
/// 4. Authentication (every `/v1` route except the WebSocket, which
///    authenticates before upgrading)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let team_routes = Router::new()
        .route(
            "/",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route(
            "/:team_id",
            get(routes::teams::get_team)
                .patch(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route(
            "/:team_id/members",
            get(routes::members::list_members).post(routes::members::add_member),
        )
        .route("/:team_id/members/:user_id", delete(routes::members::remove_member))
        .route(
            "/:team_id/members/:user_id/role",
            patch(routes::members::change_role),
        )
        .route("/:team_id/leave", post(routes::members::leave_team))
        .route(
            "/:team_id/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        );

    let task_routes = Router::new()
        .route(
            "/:task_id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:task_id/status", patch(routes::tasks::change_status))
        .route(
            "/:task_id/comments",
            get(routes::comments::list_comments).post(routes::comments::add_comment),
        );

    let comment_routes = Router::new().route(
        "/:comment_id",
        patch(routes::comments::edit_comment).delete(routes::comments::delete_comment),
    );

    // Everything below requires a bearer token
    let authenticated = Router::new()
        .nest("/teams", team_routes)
        .nest("/tasks", task_routes)
        .nest("/comments", comment_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .route("/realtime", get(routes::realtime::realtime_handler))
        .merge(authenticated);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Resolves the bearer token into an [`Identity`], mirrors the profile into
/// the store so it can be referenced by memberships, tasks and comments, and
/// injects the identity into request extensions.
///
/// [`Identity`]: teamboard_shared::auth::identity::Identity
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = bearer_token(auth_header)?;
    let identity = state.resolver.resolve(token).await?;
    state.services.registry.sync_identity(&identity).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
