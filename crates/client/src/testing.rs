//! Scripted `Network` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use stash_core::{Error, RequestInfo, Response};
use url::Url;

use crate::fetch::Network;
use crate::update::Page;

pub const ORIGIN: &str = "http://localhost:3000";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Serves canned (status, body) pairs by path; unknown paths are 404.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, (u16, String)>>,
    failing: Mutex<Vec<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, path: &str, status: u16, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    /// Transport failure for one path only.
    pub fn fail(self, path: &str) -> Self {
        self.failing.lock().unwrap().push(path.to_string());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &RequestInfo) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = request.url.path().to_string();

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&path) {
            return Err(Error::Network(format!("connection refused: {path}")));
        }

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or((404, "not found".to_string()));

        Ok(Response::new(request.url.clone(), status, vec![("content-type".into(), "text/plain".into())], body))
    }
}

/// Records every prompt, hide and reload in order.
#[derive(Default)]
pub struct RecordingPage {
    events: Mutex<Vec<String>>,
}

impl RecordingPage {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Page for RecordingPage {
    fn show_update_prompt(&self, version: &str) {
        self.events.lock().unwrap().push(format!("show:{version}"));
    }

    fn hide_update_prompt(&self) {
        self.events.lock().unwrap().push("hide".into());
    }

    fn reload(&self) {
        self.events.lock().unwrap().push("reload".into());
    }
}
