/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_api::{app::AppState, config::Config};
/// use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskboard_shared::storage::{CloudinaryConfig, CloudinaryStorage};
/// use taskboard_shared::store::PgStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig {
///     url: config.database.url.clone(),
///     ..Default::default()
/// })
/// .await?;
/// let store = Arc::new(PgStore::new(pool));
/// let blobs = Arc::new(CloudinaryStorage::new(CloudinaryConfig::new(
///     &config.storage.cloud_name,
///     &config.storage.api_key,
///     &config.storage.api_secret,
///     &config.storage.folder,
/// ))?);
/// let state = AppState::new(store.clone(), store, blobs, config);
/// let app = taskboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth::require_auth, security::SecurityHeadersLayer},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use taskboard_shared::{
    engine::TaskService,
    storage::BlobStorage,
    store::{TaskStore, UserStore},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Task resource engine
    pub service: TaskService,

    /// User records, for authentication and user routes
    pub users: Arc<dyn UserStore>,

    /// Blob storage used by the upload stage
    pub blobs: Arc<dyn BlobStorage>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        blobs: Arc<dyn BlobStorage>,
        config: Config,
    ) -> Self {
        Self {
            service: TaskService::new(tasks, users.clone(), blobs.clone()),
            users,
            blobs,
            config: Arc::new(config),
        }
    }

    /// Replaces the task service (e.g. to install a custom notifier)
    pub fn with_service(mut self, service: TaskService) -> Self {
        self.service = service;
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /api/
///     ├── /auth/
///     │   ├── POST /register           # public
///     │   ├── POST /login              # public
///     │   └── GET  /me                 # authenticated
///     ├── /users/                      # authenticated
///     │   ├── GET    /
///     │   ├── POST   /
///     │   ├── GET    /:id
///     │   ├── PUT    /:id
///     │   └── DELETE /:id
///     └── /tasks/                      # authenticated
///         ├── GET    /
///         ├── POST   /                 # multipart
///         ├── GET    /:id
///         ├── PUT    /:id              # multipart
///         ├── DELETE /:id
///         ├── GET    /:id/documents/:doc_id
///         └── PATCH  /:id/status
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication and body limits (per router)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let auth = || axum::middleware::from_fn_with_state(state.clone(), require_auth);

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route(
            "/me",
            get(routes::auth::me).route_layer(auth()),
        )
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let user_routes = Router::new()
        .route(
            "/",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route_layer(auth());

    let task_routes = Router::new()
        .route(
            "/",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/:id/documents/:doc_id",
            get(routes::tasks::download_document),
        )
        .route("/:id/status", patch(routes::tasks::update_status))
        .route_layer(auth())
        .layer(DefaultBodyLimit::max(state.config.upload.body_limit()));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/tasks", task_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
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
                Method::PUT,
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
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
