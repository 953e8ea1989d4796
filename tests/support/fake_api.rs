//! In-process fake of the managed cluster API, backed by axum.
//!
//! Serves the same two routes the real client touches (collection list and
//! single-resource replace) over an in-memory store, with injectable
//! failures per resource name and per collection.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};

use warden::cluster::{ClusterConfig, Resource, ResourceClass, ResourceList};

#[derive(Default)]
struct ClusterState {
    // Keyed by plural collection name.
    resources: Mutex<HashMap<String, Vec<Resource>>>,
    fail_updates_for: Mutex<HashSet<String>>,
    fail_lists_for: Mutex<HashSet<String>>,
    update_count: AtomicUsize,
}

/// Handle to a running fake cluster API server.
pub struct FakeCluster {
    addr: SocketAddr,
    state: Arc<ClusterState>,
}

impl FakeCluster {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state = Arc::new(ClusterState::default());

        let app = Router::new()
            .route("/apis/{group}/{version}/{plural}", get(list_collection))
            .route("/apis/{group}/{version}/{plural}/{name}", put(replace_resource))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake cluster API");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn config(&self) -> ClusterConfig {
        ClusterConfig::from_endpoint(&format!("http://{}", self.addr)).expect("endpoint")
    }

    pub fn seed(&self, class: &ResourceClass, resource: Resource) {
        self.state
            .resources
            .lock()
            .unwrap()
            .entry(class.plural.to_string())
            .or_default()
            .push(resource);
    }

    pub fn get(&self, class: &ResourceClass, name: &str) -> Option<Resource> {
        self.state
            .resources
            .lock()
            .unwrap()
            .get(class.plural)
            .and_then(|items| items.iter().find(|r| r.metadata.name == name).cloned())
    }

    pub fn update_count(&self) -> usize {
        self.state.update_count.load(Ordering::SeqCst)
    }

    /// Make every PUT for the named resource fail with a server error.
    pub fn fail_updates_for(&self, name: &str) {
        self.state
            .fail_updates_for
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    /// Make every list of the class fail with a server error.
    pub fn fail_lists_for(&self, class: &ResourceClass) {
        self.state
            .fail_lists_for
            .lock()
            .unwrap()
            .insert(class.plural.to_string());
    }
}

async fn list_collection(
    Path((_group, _version, plural)): Path<(String, String, String)>,
    State(state): State<Arc<ClusterState>>,
) -> Response {
    if state.fail_lists_for.lock().unwrap().contains(&plural) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let items = state
        .resources
        .lock()
        .unwrap()
        .get(&plural)
        .cloned()
        .unwrap_or_default();
    Json(ResourceList { items }).into_response()
}

async fn replace_resource(
    Path((_group, _version, plural, name)): Path<(String, String, String, String)>,
    State(state): State<Arc<ClusterState>>,
    Json(resource): Json<Resource>,
) -> Response {
    if state.fail_updates_for.lock().unwrap().contains(&name) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut resources = state.resources.lock().unwrap();
    let items = resources.entry(plural).or_default();
    match items.iter_mut().find(|r| r.metadata.name == name) {
        Some(existing) => *existing = resource.clone(),
        None => items.push(resource.clone()),
    }
    state.update_count.fetch_add(1, Ordering::SeqCst);

    Json(resource).into_response()
}
