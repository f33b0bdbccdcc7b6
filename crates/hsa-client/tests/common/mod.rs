#![allow(dead_code)]

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use hsa_client::{ControllerEvent, SearchController};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{net::TcpListener, sync::mpsc};

/// In-process stand-in for the search backend.
#[derive(Default)]
pub struct Backend {
    pub frames: Mutex<HashMap<String, Vec<String>>>,
    pub close_after_script: AtomicBool,
    pub stream_connects: AtomicUsize,
    pub active_streams: AtomicUsize,
    pub max_active_streams: AtomicUsize,
    pub start_bodies: Mutex<Vec<Value>>,
    pub results_hits: AtomicUsize,
    pub criteria_status: AtomicU16,
    pub criteria_bodies: Mutex<Vec<Value>>,
    pub job_script: Mutex<Vec<(u16, Value)>>,
    pub job_hits: AtomicUsize,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.criteria_status.store(200, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn script(&self, search_id: &str, frames: Vec<String>) {
        self.frames
            .lock()
            .unwrap()
            .insert(search_id.to_string(), frames);
    }

    async fn serve_stream(self: Arc<Self>, search_id: String, mut socket: WebSocket) {
        self.stream_connects.fetch_add(1, Ordering::SeqCst);
        let active = self.active_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_streams.fetch_max(active, Ordering::SeqCst);

        let frames = self
            .frames
            .lock()
            .unwrap()
            .get(&search_id)
            .cloned()
            .unwrap_or_default();
        for frame in frames {
            if socket.send(Message::Text(frame)).await.is_err() {
                self.active_streams.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        }
        if self.close_after_script.load(Ordering::SeqCst) {
            let _ = socket.send(Message::Close(None)).await;
        }
        loop {
            match socket.recv().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
        self.active_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

pub async fn spawn_backend(backend: Arc<Backend>) -> String {
    let app = Router::new()
        .route("/api/search/start", post(start_search))
        .route("/api/search/history", get(history))
        .route("/api/search/:id/status", get(search_status))
        .route("/api/search/:id/results", get(results))
        .route("/api/search/:id/criteria", put(update_criteria))
        .route("/api/apify/job/:id/status", get(job_status))
        .route("/ws/search/:id", get(stream))
        .with_state(backend);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// A base url nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn start_search(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    backend.start_bodies.lock().unwrap().push(body);
    Json(json!({ "searchId": "s-42", "status": "started" }))
}

async fn history() -> Json<Value> {
    Json(json!([
        {
            "id": "s-1",
            "request": "3 bed house with a yard",
            "location": "Austin, TX",
            "budget": "$550k",
            "createdAt": "2024-05-01T10:00:00Z",
            "status": "completed",
            "homesFound": 12
        },
        {
            "id": "s-2",
            "request": "condo near transit",
            "location": "Denver, CO",
            "budget": "$400k",
            "createdAt": "2024-05-02T09:30:00Z",
            "status": "in_progress",
            "homesFound": 0
        }
    ]))
}

async fn search_status(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "searchId": id, "status": "running" }))
}

async fn results(State(backend): State<Arc<Backend>>, Path(id): Path<String>) -> Json<Value> {
    backend.results_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "homes": [
            {
                "id": format!("{id}-home-1"),
                "address": "12 Oak St",
                "city": "Austin",
                "state": "TX",
                "zip": "78701",
                "price": 525000,
                "bedrooms": 3,
                "bathrooms": 2,
                "squareFeet": 1850,
                "propertyType": "house",
                "images": [],
                "listingUrl": "https://listings.example/12-oak",
                "score": 91,
                "matchPercentage": 88,
                "pros": ["big yard"],
                "cons": ["busy street"],
                "llmAnalysis": "Strong fit.",
                "source": "zillow"
            }
        ],
        "duplicatesFound": 2,
        "savedToSupabase": true,
        "totalFound": 1
    }))
}

async fn update_criteria(
    State(backend): State<Arc<Backend>>,
    Json(body): Json<Value>,
) -> Response {
    backend.criteria_bodies.lock().unwrap().push(body);
    let status = backend.criteria_status.load(Ordering::SeqCst);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "ok": status.is_success() }))).into_response()
}

async fn job_status(State(backend): State<Arc<Backend>>) -> Response {
    let hit = backend.job_hits.fetch_add(1, Ordering::SeqCst);
    let script = backend.job_script.lock().unwrap();
    let Some((status, body)) = script.get(hit.min(script.len().saturating_sub(1))).cloned()
    else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

async fn stream(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(backend): State<Arc<Backend>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| backend.serve_stream(id, socket))
}

pub fn frame(kind: &str, data: Value) -> String {
    json!({ "type": kind, "data": data }).to_string()
}

pub fn agent_frame(id: &str, status: &str) -> String {
    frame(
        "agent_update",
        json!({ "id": id, "status": status, "currentTask": format!("{id} {status}") }),
    )
}

pub fn criteria_json() -> Value {
    json!({
        "bedrooms": { "min": 2, "max": 4 },
        "bathrooms": { "min": 1, "max": 2 },
        "priceRange": { "min": 300000, "max": 550000 },
        "squareFeet": { "min": 1200, "max": 2400 },
        "propertyTypes": ["house"],
        "mustHave": ["yard"],
        "niceToHave": [],
        "dealBreakers": []
    })
}

pub fn location_json(lat: f64) -> Value {
    json!({
        "center": { "lat": lat, "lng": -97.7431 },
        "boundingBox": { "north": lat + 0.1, "south": lat - 0.1, "east": -97.6, "west": -97.9 },
        "radius": 5,
        "neighborhoods": ["Downtown"]
    })
}

/// Feeds controller events back in until `done` holds.
pub async fn pump_until(
    controller: &mut SearchController,
    events: &mut mpsc::Receiver<ControllerEvent>,
    done: impl Fn(&SearchController) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(controller) {
            let event = events.recv().await.expect("event channel closed");
            controller.handle_event(event).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Feeds every event that arrives within `window` back into the controller.
pub async fn drain_for(
    controller: &mut SearchController,
    events: &mut mpsc::Receiver<ControllerEvent>,
    window: Duration,
) {
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        controller.handle_event(event).await;
    }
}

/// Polls `check` until it holds or the deadline passes.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
