//! In-process fake Trellis backend for integration tests: an axum WebSocket
//! server speaking the real envelope protocol, slicing configured artifact
//! buffers into whatever chunk size the client requests.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TASK_ID: &str = "task-123";
pub const SESSION_ID: &str = "sess-abc";

/// Scripted behavior for one fake backend instance.
#[derive(Clone)]
pub struct Behavior {
    /// Reply to submissions with this error instead of `accepted`.
    pub reject_message: Option<String>,
    /// After accepting, fail the job with this error instead of succeeding.
    pub fail_processing: Option<String>,
    /// Progress envelopes to emit between `accepted` and the terminal reply.
    pub progress_messages: usize,
    /// Mesh bytes to serve, or an error message for every mesh chunk fetch.
    pub glb: std::result::Result<Vec<u8>, String>,
    /// Video bytes to serve, or an error message for every video chunk fetch.
    pub video: std::result::Result<Vec<u8>, String>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            reject_message: None,
            fail_processing: None,
            progress_messages: 0,
            glb: Ok(Vec::new()),
            video: Ok(Vec::new()),
        }
    }
}

#[derive(Default)]
pub struct Counters {
    pub connections: AtomicUsize,
    pub glb_requests: AtomicUsize,
    pub video_requests: AtomicUsize,
    pub last_params: Mutex<Option<Value>>,
}

impl Counters {
    pub fn chunk_requests(&self) -> usize {
        self.glb_requests.load(Ordering::SeqCst) + self.video_requests.load(Ordering::SeqCst)
    }
}

type Shared = Arc<(Behavior, Arc<Counters>)>;

/// Start the fake backend on an ephemeral port. Returns the base URL the
/// client should be pointed at (without the `/ws` suffix).
pub async fn spawn(behavior: Behavior) -> (String, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let state: Shared = Arc::new((behavior, counters.clone()));
    let app = Router::new().route("/ws", get(ws_handler)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("ws://{addr}"), counters)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Shared>) -> Response {
    state.1.connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(mut socket: WebSocket, state: Shared) {
    let (behavior, counters) = (&state.0, &state.1);
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let request: Value = serde_json::from_str(&text).unwrap();
        let replies = match request["command"].as_str().unwrap() {
            "process_single" | "process_multi" => {
                *counters.last_params.lock().unwrap() = Some(request["params"].clone());
                submission_replies(behavior)
            }
            "get_glb_chunk" => {
                counters.glb_requests.fetch_add(1, Ordering::SeqCst);
                vec![chunk_reply(&behavior.glb, &request)]
            }
            "get_video_chunk" => {
                counters.video_requests.fetch_add(1, Ordering::SeqCst);
                vec![chunk_reply(&behavior.video, &request)]
            }
            "check_status" => vec![json!({"status": "processing", "message": "in progress"})],
            other => vec![json!({"status": "error", "message": format!("unknown command {other}")})],
        };
        for reply in replies {
            if socket.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
        }
    }
}

fn submission_replies(behavior: &Behavior) -> Vec<Value> {
    if let Some(message) = &behavior.reject_message {
        return vec![json!({"status": "error", "message": message})];
    }
    let mut replies = vec![json!({"status": "accepted", "task_id": TASK_ID})];
    for step in 0..behavior.progress_messages {
        replies.push(json!({
            "status": "processing",
            "progress": step as f64 / behavior.progress_messages as f64,
            "message": format!("stage {step}"),
        }));
    }
    match &behavior.fail_processing {
        Some(message) => replies.push(json!({"status": "error", "message": message})),
        None => replies.push(json!({"status": "success", "session_id": SESSION_ID})),
    }
    replies
}

fn chunk_reply(artifact: &std::result::Result<Vec<u8>, String>, request: &Value) -> Value {
    let bytes = match artifact {
        Ok(bytes) => bytes,
        Err(message) => return json!({"status": "error", "message": message}),
    };
    let offset = request["offset"].as_u64().unwrap() as usize;
    let size = request["size"].as_u64().unwrap() as usize;
    if offset >= bytes.len() {
        return json!({"status": "complete", "message": "EOF"});
    }
    let end = (offset + size).min(bytes.len());
    json!({"status": "success", "data": BASE64.encode(&bytes[offset..end])})
}

/// Deterministic patterned buffer so reassembly bugs show up as mismatches.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
