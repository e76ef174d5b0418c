pub mod engine;
pub mod gateway;
pub mod knowledge;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use postbot_config::Config;
use postbot_contracts::TurnRequest;
use tower_http::trace::TraceLayer;

use crate::engine::ChatEngine;
use crate::gateway::UpstreamGateway;
use crate::knowledge::KnowledgeBase;
use crate::session::SessionStore;

const MAX_SESSION_ID_LEN: usize = 128;

pub async fn serve(cfg: Config) -> Result<(), String> {
    let addr: SocketAddr = cfg
        .server
        .listen_addr
        .parse()
        .map_err(|e| format!("invalid listen_addr: {e}"))?;

    let app = build_app(cfg).await?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind failed: {e}"))?;
    tracing::info!(%addr, "postbot listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("serve failed: {e}"))
}

pub async fn build_app(cfg: Config) -> Result<Router, String> {
    let state = AppState::new(cfg).await?;
    Ok(Router::new()
        .route("/v1/healthz", get(healthz))
        .route("/chatbot", post(chatbot))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[derive(Clone)]
struct AppState {
    session_cookie: Arc<str>,
    engine: Arc<ChatEngine>,
}

impl AppState {
    async fn new(cfg: Config) -> Result<Self, String> {
        let knowledge = KnowledgeBase::new(&cfg.knowledge.path);
        let entries = knowledge.load().await.len();
        if entries == 0 {
            tracing::warn!(
                path = %knowledge.path().display(),
                "knowledge base is empty; free-text turns will get the default reply"
            );
        } else {
            tracing::info!(entries, path = %knowledge.path().display(), "knowledge base loaded");
        }

        let gateway = UpstreamGateway::new(&cfg.directory, &cfg.geocoder)?;
        let sessions = SessionStore::new(Duration::from_millis(cfg.session.idle_timeout_ms));
        Ok(Self {
            session_cookie: Arc::from(cfg.server.session_cookie.as_str()),
            engine: Arc::new(ChatEngine::new(knowledge, gateway, sessions)),
        })
    }
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn chatbot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(turn): Json<TurnRequest>,
) -> Response {
    let (session_id, minted) = match session_from_cookies(&headers, &state.session_cookie) {
        Some(id) => (id, false),
        None => (uuid::Uuid::new_v4().as_simple().to_string(), true),
    };

    let reply = state.engine.handle_turn(&session_id, &turn).await;
    let mut response = Json(reply).into_response();
    if minted {
        let cookie = format!(
            "{}={session_id}; Path=/; HttpOnly; SameSite=Lax",
            state.session_cookie
        );
        match HeaderValue::from_str(&cookie) {
            Ok(v) => {
                response.headers_mut().insert(SET_COOKIE, v);
            }
            Err(e) => tracing::warn!(error = %e, "could not encode session cookie"),
        }
    }
    response
}

fn session_from_cookies(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| is_usable_session_id(value))
}

fn is_usable_session_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SESSION_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
