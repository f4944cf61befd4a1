//!
//! RateStore HTTP server
//! ---------------------
//! Axum-based HTTP API for the store-rating service.
//!
//! Responsibilities:
//! - Session cookie handling backed by the `backend` session manager.
//! - Signup/login/logout endpoints with role-based redirect targets.
//! - Navigation endpoint exposing exactly the actions the resolved role permits.
//! - Route-guarded dashboards for users, owners and administrators.
//! - Public store catalog with ratings and average scores.
//! - First-run default admin seeding and a background session sweeper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::backend::{
    ClientSession, Credentials, MemoryBackend, NewAccount, NewStore, SessionIdentity,
    SessionManager, SessionProvider, StoreRecord,
};
use crate::error::AppError;
use crate::identity::{visible_actions, AccessState, GuardDecision, NavigationGate, Role,
    RoleResolver, RouteGuard};
use crate::validate;

const SESSION_COOKIE: &str = "ratestore_session";
const DEFAULT_ADMIN_EMAIL: &str = "admin@ratestore.local";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<MemoryBackend>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new() -> AppState {
        AppState {
            backend: Arc::new(MemoryBackend::new()),
            sessions: Arc::new(SessionManager::default()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new()
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/",
        SESSION_COOKIE, token
    ))
    .unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

/// Session provider bound to this request's cookie, if any.
fn request_session(state: &AppState, headers: &HeaderMap) -> Arc<ClientSession> {
    Arc::new(ClientSession::bound(
        state.backend.clone(),
        state.sessions.clone(),
        parse_cookie(headers, SESSION_COOKIE),
    ))
}

/// One-shot role resolution for this request.
async fn resolve_access(state: &AppState, headers: &HeaderMap) -> AccessState {
    let client = request_session(state, headers);
    RoleResolver::new(client, state.backend.clone()).resolve().await
}

/// Route guard: confirm an active session or answer a redirect. The redirect
/// replaces history (303 plus no-store) so back-navigation cannot resurface
/// the guarded page.
async fn guarded(state: &AppState, headers: &HeaderMap) -> Result<SessionIdentity, Response> {
    let guard = RouteGuard::new(request_session(state, headers) as Arc<dyn SessionProvider>);
    match guard.check().await {
        GuardDecision::Render(ident) => Ok(ident),
        GuardDecision::Redirect(path) => {
            let mut h = HeaderMap::new();
            h.insert(header::LOCATION, HeaderValue::from_static(path));
            h.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            Err((
                StatusCode::SEE_OTHER,
                h,
                Json(json!({"status": "redirect", "to": path})),
            )
                .into_response())
        }
    }
}

/// Destination-page role check layered on top of the role-blind guard.
async fn require_role(
    state: &AppState,
    headers: &HeaderMap,
    role: Role,
) -> Result<SessionIdentity, Response> {
    let ident = guarded(state, headers).await?;
    let access = resolve_access(state, headers).await;
    if access.role != role {
        return Err(AppError::forbidden(format!("{} only", role.as_str())).into_response());
    }
    Ok(ident)
}

#[derive(Debug, Deserialize)]
struct SignupPayload {
    name: String,
    email: String,
    address: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct StorePayload {
    name: String,
    address: String,
    email: Option<String>,
    owner_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RatingPayload {
    score: u8,
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    role: String,
}

#[derive(Debug, Deserialize)]
struct StoreQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct StoreSummary {
    #[serde(flatten)]
    store: StoreRecord,
    average_score: Option<f64>,
}

fn summarize(state: &AppState, stores: Vec<StoreRecord>) -> Vec<StoreSummary> {
    stores
        .into_iter()
        .map(|store| {
            let average_score = state.backend.average_score(store.id);
            StoreSummary { store, average_score }
        })
        .collect()
}

async fn signup(State(state): State<AppState>, Json(payload): Json<SignupPayload>) -> Response {
    let account = NewAccount {
        name: payload.name,
        email: payload.email,
        address: payload.address,
        password: payload.password,
    };
    if let Err(err) = validate::validate_signup(&account) {
        return err.into_response();
    }
    match state.backend.sign_up(&account) {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(json!({"status": "ok", "user_id": user_id, "redirect": "/auth/login"})),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn login(State(state): State<AppState>, Json(payload): Json<Credentials>) -> Response {
    let client = Arc::new(ClientSession::new(state.backend.clone(), state.sessions.clone()));
    let ident = match client.sign_in(&payload).await {
        Ok(ident) => ident,
        // Credential failures are the one error class shown verbatim
        Err(err) => return err.into_response(),
    };
    let resolver =
        RoleResolver::new(client.clone() as Arc<dyn SessionProvider>, state.backend.clone());
    let access = resolver.resolve().await;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, set_session_cookie(&ident.token));
    (
        StatusCode::OK,
        headers,
        Json(json!({
            "status": "ok",
            "role": access.role,
            "redirect": access.role.dashboard_path().unwrap_or("/stores"),
        })),
    )
        .into_response()
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let client = request_session(&state, &headers);
    let resolver = Arc::new(RoleResolver::new(
        client.clone() as Arc<dyn SessionProvider>,
        state.backend.clone(),
    ));
    let gate = NavigationGate::new(resolver, client as Arc<dyn SessionProvider>);
    let mut h = HeaderMap::new();
    h.insert(header::SET_COOKIE, clear_session_cookie());
    match gate.sign_out().await {
        Ok(()) => (StatusCode::OK, h, Json(json!({"status": "ok", "redirect": "/auth/login"})))
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Visible navigation actions for the request's session. Anonymous clients
/// get the sign-in/sign-up pair; everything else follows the closed
/// role-to-action mapping.
async fn nav(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let access = resolve_access(&state, &headers).await;
    Json(json!({
        "status": "ok",
        "role": access.role,
        "session_active": access.session_active,
        "actions": visible_actions(&access),
    }))
    .into_response()
}

async fn list_stores(State(state): State<AppState>, Query(query): Query<StoreQuery>) -> Response {
    let stores = state.backend.stores(query.q.as_deref());
    Json(json!({"status": "ok", "stores": summarize(&state, stores)})).into_response()
}

async fn store_detail(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let Some(store) = state.backend.store(id) else {
        return AppError::not_found("store not found").into_response();
    };
    let ratings = state.backend.ratings_for(id);
    let average_score = state.backend.average_score(id);
    Json(json!({
        "status": "ok",
        "store": store,
        "ratings": ratings,
        "average_score": average_score,
    }))
    .into_response()
}

async fn add_rating(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<RatingPayload>,
) -> Response {
    let ident = match guarded(&state, &headers).await {
        Ok(ident) => ident,
        Err(resp) => return resp,
    };
    match state.backend.add_rating(id, ident.user_id, payload.score, &payload.comment) {
        Ok(rating) => {
            // Answer with the refreshed list so the caller renders consistently
            let ratings = state.backend.ratings_for(id);
            (
                StatusCode::CREATED,
                Json(json!({"status": "ok", "rating": rating, "ratings": ratings})),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn user_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = guarded(&state, &headers).await {
        return resp;
    }
    let stores = state.backend.stores(None);
    Json(json!({"status": "ok", "stores": summarize(&state, stores)})).into_response()
}

async fn owner_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ident = match guarded(&state, &headers).await {
        Ok(ident) => ident,
        Err(resp) => return resp,
    };
    let stores = state.backend.stores_owned_by(ident.user_id);
    let body: Vec<_> = stores
        .into_iter()
        .map(|store| {
            let ratings = state.backend.ratings_for(store.id);
            let average_score = state.backend.average_score(store.id);
            json!({"store": store, "ratings": ratings, "average_score": average_score})
        })
        .collect();
    Json(json!({"status": "ok", "stores": body})).into_response()
}

async fn admin_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_role(&state, &headers, Role::Admin).await {
        return resp;
    }
    let users = state.backend.profiles();
    let stores = state.backend.stores(None);
    Json(json!({
        "status": "ok",
        "total_users": users.len(),
        "total_stores": stores.len(),
        "users": users,
        "stores": summarize(&state, stores),
    }))
    .into_response()
}

async fn admin_add_store(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<StorePayload>,
) -> Response {
    if let Err(resp) = require_role(&state, &headers, Role::Admin).await {
        return resp;
    }
    if payload.name.trim().is_empty() || payload.address.trim().is_empty() {
        return AppError::user("store name and address are required").into_response();
    }
    let new = NewStore {
        name: payload.name,
        address: payload.address,
        email: payload.email,
        owner_email: payload.owner_email,
    };
    match state.backend.create_store(&new) {
        Ok(store) => {
            (StatusCode::CREATED, Json(json!({"status": "ok", "store": store}))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn admin_set_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<RolePayload>,
) -> Response {
    if let Err(resp) = require_role(&state, &headers, Role::Admin).await {
        return resp;
    }
    match state.backend.set_role(id, &payload.role) {
        Ok(()) => Json(json!({"status": "ok"})).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Mount all routes against the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ratestore ok" }))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/nav", get(nav))
        .route("/stores", get(list_stores))
        .route("/stores/{id}", get(store_detail))
        .route("/stores/{id}/ratings", post(add_rating))
        .route("/user/dashboard", get(user_dashboard))
        .route("/owner/dashboard", get(owner_dashboard))
        .route("/admin/dashboard", get(admin_dashboard))
        .route("/admin/stores", post(admin_add_store))
        .route("/admin/users/{id}/role", post(admin_set_role))
        .with_state(state)
}

/// Start the HTTP server on the given port.
pub async fn run_with_port(http_port: u16) -> anyhow::Result<()> {
    let state = AppState::new();

    // Ensure a default admin exists on first start
    let admin_password = std::env::var("RATESTORE_ADMIN_PASSWORD")
        .unwrap_or_else(|_| "ratestore".to_string());
    if state.backend.seed_admin(DEFAULT_ADMIN_EMAIL, &admin_password)? {
        info!(email = DEFAULT_ADMIN_EMAIL, "seeded default admin account");
    }

    // Background session sweeper
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            loop {
                let removed = sessions.sweep_expired();
                if removed > 0 {
                    tracing::debug!(removed, "session_sweep");
                }
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });
    }

    let app = build_router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point using the default port.
pub async fn run() -> anyhow::Result<()> {
    let port = std::env::var("RATESTORE_HTTP_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(7878);
    run_with_port(port).await
}
