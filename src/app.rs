use std::sync::Arc;

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_login;
use crate::authz::{enforce, CreatorOnly, ReceiveEligible, ResourceGate};
use crate::config::{AppConfig, SessionConfig};
use crate::db::projects::{ProjectLoader, ReceiveCandidateLoader};
use crate::docs;
use crate::oauth::{IdentityProvider, OAuthClient};
use crate::routes::{health, oauth, projects, tags};
use crate::session::{SessionManager, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: SessionManager,
    pub oauth: OAuthClient,
    pub cookies: Arc<SessionConfig>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        pool: SqlitePool,
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let sessions = SessionManager::new(
            store,
            config.redis.key_prefix.clone(),
            config.session.max_age,
            config.session.store_timeout,
        );
        let oauth = OAuthClient::new(config.oauth.clone(), provider, sessions.clone(), pool.clone());

        Self {
            pool,
            sessions,
            oauth,
            cookies: Arc::new(config.session.clone()),
        }
    }
}

/// Builds the router. Every protected route runs the login gate first, then
/// its resource gate (if any), then the handler.
pub fn create_app(state: AppState, api_prefix: &str) -> Router {
    let login = from_fn_with_state(state.clone(), require_login);

    let creator_gate = ResourceGate::new("project", ProjectLoader::new(state.pool.clone()), CreatorOnly);
    let receive_gate = ResourceGate::new("project", ReceiveCandidateLoader::new(state.pool.clone()), ReceiveEligible);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let oauth_routes = Router::new()
        .route("/logout", get(oauth::logout))
        .route("/user-info", get(oauth::user_info))
        .route_layer(login.clone())
        .route("/login", get(oauth::login))
        .route("/callback", post(oauth::callback));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route("/received", get(projects::list_received))
        .route(
            "/:id",
            get(projects::get_project).merge(
                put(projects::update_project)
                    .delete(projects::delete_project)
                    .route_layer(from_fn_with_state(creator_gate, enforce::<ProjectLoader, CreatorOnly>)),
            ),
        )
        .route(
            "/:id/receive",
            post(projects::receive_project).route_layer(from_fn_with_state(
                receive_gate,
                enforce::<ReceiveCandidateLoader, ReceiveEligible>,
            )),
        )
        .route_layer(login.clone());

    let tag_routes = Router::new()
        .route("/", get(tags::list_tags))
        .route_layer(login);

    let v1 = Router::new()
        .route("/health", get(health::health))
        .nest("/oauth", oauth_routes)
        .nest("/projects", project_routes)
        .nest("/tags", tag_routes);

    let api = Router::new().nest("/v1", v1);
    let api = if api_prefix.is_empty() {
        api
    } else {
        Router::new().nest(api_prefix, api)
    };

    api.merge(docs::swagger_routes(api_prefix, &state.cookies.cookie_name))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
