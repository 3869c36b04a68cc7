//! Test utilities and fixtures for civiclink tests
//!
//! [`FakeTransport`] stands in for the HTTP client: responses are scripted
//! per method and URL fragment, every request is recorded, and a route can
//! be held open until the test releases it.

#![allow(dead_code)]

use async_trait::async_trait;
use civiclink::api::{ApiClient, ApiRequest, ApiResponse, HttpMethod, Transport};
use civiclink::data::UserRole;
use civiclink::error::{ClientError, ClientResult};
use civiclink::session::{MemoryStorage, SessionStore, STORAGE_KEY};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub const BASE_URL: &str = "http://civiclink.test/api";
pub const TOKEN: &str = "tok-123";

struct Route {
    method: HttpMethod,
    fragment: String,
    response: Result<(u16, String), String>,
    hold: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn add(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }

    /// Answer requests whose URL contains `fragment`. Later routes win.
    pub fn respond(&self, method: HttpMethod, fragment: &str, status: u16, body: impl Into<String>) {
        self.add(Route {
            method,
            fragment: fragment.to_string(),
            response: Ok((status, body.into())),
            hold: None,
        });
    }

    pub fn respond_json(&self, method: HttpMethod, fragment: &str, status: u16, body: Value) {
        self.respond(method, fragment, status, body.to_string());
    }

    /// Like [`Self::respond_json`], but the response waits until the returned
    /// sender fires (or is dropped).
    pub fn respond_held(&self, method: HttpMethod, fragment: &str, status: u16, body: Value) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.add(Route {
            method,
            fragment: fragment.to_string(),
            response: Ok((status, body.to_string())),
            hold: Some(rx),
        });
        tx
    }

    pub fn fail_network(&self, method: HttpMethod, fragment: &str, message: &str) {
        self.add(Route {
            method,
            fragment: fragment.to_string(),
            response: Err(message.to_string()),
            hold: None,
        });
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let (response, hold) = {
            let mut routes = self.routes.lock().unwrap();
            let route = routes
                .iter_mut()
                .rev()
                .find(|r| r.method == request.method && request.url.contains(&r.fragment))
                .ok_or_else(|| {
                    ClientError::Network(format!("no route for {} {}", request.method.as_str(), request.url))
                })?;
            (route.response.clone(), route.hold.take())
        };

        if let Some(hold) = hold {
            let _ = hold.await;
        }

        match response {
            Ok((status, body)) => Ok(ApiResponse::new(status, body)),
            Err(message) => Err(ClientError::Network(message)),
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn issue_json(id: &str, status: &str, priority: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Issue {}", id),
        "description": "Streetlight out on the corner",
        "status": status,
        "priority": priority,
        "createdAt": "2024-05-01T12:00:00Z",
        "latitude": 49.28,
        "longitude": -123.12
    })
}

pub fn user_json(id: &str, role: &str) -> Value {
    json!({
        "id": id,
        "name": format!("User {}", id),
        "email": format!("{}@civiclink.test", id),
        "role": role,
        "createdAt": "2024-01-15T08:30:00Z"
    })
}

pub fn identity_json(role: UserRole) -> Value {
    json!({
        "id": "u-me",
        "name": "Riley",
        "email": "riley@civiclink.test",
        "role": role.as_str()
    })
}

pub fn session_json(role: UserRole) -> Value {
    json!({ "accessToken": TOKEN, "user": identity_json(role) })
}

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub storage: Arc<MemoryStorage>,
    pub session: Arc<SessionStore>,
}

impl Harness {
    pub fn client(&self) -> ApiClient {
        self.session.client().clone()
    }
}

/// Session store over a fake transport and the given storage, not yet restored.
pub fn harness_with(storage: MemoryStorage) -> Harness {
    let transport = FakeTransport::new();
    let storage = Arc::new(storage);
    let client = ApiClient::new(BASE_URL, transport.clone());
    let session = Arc::new(SessionStore::new(client, storage.clone()));
    Harness {
        transport,
        storage,
        session,
    }
}

/// Restored session signed in with `role`, without any network traffic.
pub async fn signed_in(role: UserRole) -> Harness {
    let harness = harness_with(MemoryStorage::with_entry(STORAGE_KEY, &session_json(role).to_string()));
    harness.session.restore().await;
    harness
}

pub async fn signed_out() -> Harness {
    let harness = harness_with(MemoryStorage::new());
    harness.session.restore().await;
    harness
}
