//! Scripted HTTP transport and canned API bodies for unit tests.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;

use crate::vercel::{ApiRequest, ApiResponse, HttpTransport, Route, TransportError};

type Responder = dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync;

/// Records every request (at issue time) and answers through a closure,
/// which may sleep to force a completion order.
pub struct FakeTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new(responder: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, route: Route) -> usize {
        self.requests()
            .iter()
            .filter(|request| route_of(request) == Some(route))
            .count()
    }
}

impl HttpTransport for FakeTransport {
    fn get(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok((self.responder)(request))
    }
}

/// Route a request was issued against; alias lookups count as deployments.
pub fn route_of(request: &ApiRequest) -> Option<Route> {
    [Route::Teams, Route::Deployments, Route::Projects, Route::User]
        .into_iter()
        .find(|route| request.url.contains(route.path()))
}

pub fn json(body: &str) -> ApiResponse {
    ApiResponse {
        status: 200,
        body: body.as_bytes().to_vec(),
    }
}

pub fn status(code: u16) -> ApiResponse {
    ApiResponse {
        status: code,
        body: Vec::new(),
    }
}

pub fn user_body() -> ApiResponse {
    json(
        &json!({
            "user": {"uid": "u1", "name": "Ann", "email": "ann@example.com", "avatar": null}
        })
        .to_string(),
    )
}

pub fn teams_body(teams: &[(&str, &str)]) -> ApiResponse {
    let teams: Vec<_> = teams
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name}))
        .collect();
    json(&json!({ "teams": teams }).to_string())
}

pub fn deployments_body(ids: &[&str]) -> ApiResponse {
    let deployments: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "uid": id,
                "name": "site",
                "url": format!("{id}.vercel.app"),
                "created": 1_600_000_000_000_i64,
                "state": "READY",
                "creator": {"uid": "u1", "email": "ann@example.com", "username": "ann"}
            })
        })
        .collect();
    json(&json!({ "deployments": deployments }).to_string())
}

pub fn projects_body(names: &[&str]) -> ApiResponse {
    let projects: Vec<_> = names
        .iter()
        .map(|name| json!({"id": format!("prj_{name}"), "name": name}))
        .collect();
    json(&json!({ "projects": projects }).to_string())
}
