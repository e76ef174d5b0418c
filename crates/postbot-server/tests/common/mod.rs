#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use postbot_config::{
    Config, Directory, DirectoryCache, Geocoder, Knowledge, Server, Session, DEFAULT_USER_AGENT,
};
use serde_json::{json, Value};

/// Pincode that the fake directory answers with a 503.
pub const BROKEN_PINCODE: &str = "500001";
/// Pincode that the fake directory answers with an empty array.
pub const EMPTY_PINCODE: &str = "500002";

pub struct FakeUpstream {
    pub base_url: String,
    pub directory_hits: Arc<AtomicUsize>,
    pub geocoder_hits: Arc<AtomicUsize>,
    pub user_agents: Arc<Mutex<Vec<String>>>,
}

impl FakeUpstream {
    pub fn directory_hits(&self) -> usize {
        self.directory_hits.load(Ordering::SeqCst)
    }

    pub fn geocoder_hits(&self) -> usize {
        self.geocoder_hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct FakeState {
    offices: Arc<HashMap<String, Value>>,
    postcode: Option<String>,
    directory_hits: Arc<AtomicUsize>,
    geocoder_hits: Arc<AtomicUsize>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

pub fn offices(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| {
                let branch = if i == 0 {
                    "Head Post Office"
                } else {
                    "Sub Post Office"
                };
                json!({
                    "Name": format!("Office {i}"),
                    "BranchType": branch,
                    "District": "Central Delhi",
                    "State": "Delhi",
                    "Pincode": "110001"
                })
            })
            .collect(),
    )
}

/// Directory knows `110001` (7 offices) and `110002` (no offices); every
/// other pincode is reported as not found. The geocoder answers with
/// `postcode`, or without an address when `None`.
pub async fn spawn_upstream(postcode: Option<&str>) -> FakeUpstream {
    let mut offices_by_pincode = HashMap::new();
    offices_by_pincode.insert("110001".to_string(), offices(7));
    offices_by_pincode.insert("110002".to_string(), Value::Array(vec![]));

    let state = FakeState {
        offices: Arc::new(offices_by_pincode),
        postcode: postcode.map(|v| v.to_string()),
        directory_hits: Arc::new(AtomicUsize::new(0)),
        geocoder_hits: Arc::new(AtomicUsize::new(0)),
        user_agents: Arc::new(Mutex::new(Vec::new())),
    };
    let upstream = FakeUpstream {
        base_url: String::new(),
        directory_hits: state.directory_hits.clone(),
        geocoder_hits: state.geocoder_hits.clone(),
        user_agents: state.user_agents.clone(),
    };

    let app = Router::new()
        .route("/pincode/{pincode}", get(fake_pincode))
        .route("/reverse", get(fake_reverse))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeUpstream {
        base_url: format!("http://{addr}"),
        ..upstream
    }
}

fn record_user_agent(state: &FakeState, headers: &HeaderMap) {
    if let Some(ua) = headers.get(USER_AGENT).and_then(|v| v.to_str().ok()) {
        state.user_agents.lock().unwrap().push(ua.to_string());
    }
}

async fn fake_pincode(
    State(state): State<FakeState>,
    Path(pincode): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.directory_hits.fetch_add(1, Ordering::SeqCst);
    record_user_agent(&state, &headers);

    if pincode == BROKEN_PINCODE {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "down"})));
    }
    if pincode == EMPTY_PINCODE {
        return (StatusCode::OK, Json(json!([])));
    }
    match state.offices.get(&pincode) {
        Some(list) => {
            let found = list.as_array().map(|v| v.len()).unwrap_or(0);
            (
                StatusCode::OK,
                Json(json!([{
                    "Message": format!("Number of pincode(s) found:{found}"),
                    "Status": "Success",
                    "PostOffice": list
                }])),
            )
        }
        None => (
            StatusCode::OK,
            Json(json!([{
                "Message": "No records found",
                "Status": "Error",
                "PostOffice": null
            }])),
        ),
    }
}

async fn fake_reverse(State(state): State<FakeState>, headers: HeaderMap) -> Json<Value> {
    state.geocoder_hits.fetch_add(1, Ordering::SeqCst);
    record_user_agent(&state, &headers);

    match &state.postcode {
        Some(postcode) => Json(json!({
            "display_name": "Connaught Place, New Delhi",
            "address": {"city": "New Delhi", "postcode": postcode}
        })),
        None => Json(json!({"error": "Unable to geocode"})),
    }
}

fn nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos()
}

pub fn write_knowledge(contents: &Value) -> String {
    let path = std::env::temp_dir().join(format!("postbot-knowledge-{}.json", nanos()));
    std::fs::write(&path, contents.to_string()).expect("write knowledge");
    path.to_string_lossy().to_string()
}

pub fn missing_knowledge() -> String {
    std::env::temp_dir()
        .join(format!("postbot-knowledge-missing-{}.json", nanos()))
        .to_string_lossy()
        .to_string()
}

pub fn sample_knowledge() -> Value {
    json!([
        {
            "keywords": ["hi", "hello"],
            "answer": {"randomize": true, "options": ["Hello! Welcome to India Post Assistant.", "Namaste! How can I help?"]},
            "options": [
                {"text": "Track & Trace", "value": "track"},
                {"text": "Find Post Office", "value": "find post office"},
                "Banking Services"
            ]
        },
        {
            "keywords": ["find post office"],
            "answer": "How would you like to search?",
            "options": [
                {"text": "Search by Pincode", "value": "find_by_pincode"},
                {"text": "Use my location", "value": "find_office_by_location"}
            ]
        },
        {
            "keywords": ["speed post"],
            "answer": "Speed Post delivers within 1-3 days."
        }
    ])
}

pub fn test_config(upstream_url: &str, knowledge_path: &str) -> Config {
    Config {
        server: Server {
            listen_addr: "127.0.0.1:0".to_string(),
            session_cookie: "postbot_session".to_string(),
        },
        session: Session {
            idle_timeout_ms: 60_000,
        },
        knowledge: Knowledge {
            path: knowledge_path.to_string(),
        },
        directory: Directory {
            base_url: upstream_url.to_string(),
            timeout_ms: 2_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache: DirectoryCache {
                enabled: true,
                ttl_ms: 60 * 60 * 1000,
                max_entries: 100,
            },
        },
        geocoder: Geocoder {
            base_url: upstream_url.to_string(),
            timeout_ms: 2_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        },
    }
}
