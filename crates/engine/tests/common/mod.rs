//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tsync_client::{ConnectivityMonitor, Request, Response, Transport};
use tsync_core::{AppConfig, CacheDb, Error, LazyStore, StoreLocation};
use tsync_engine::{Collaborators, Engine, PageRegistry};

/// One scripted network outcome.
#[derive(Clone)]
pub enum Reply {
    Respond(Response),
    Throw(String),
}

/// Transport that answers from a per-(method, path) script.
///
/// Each route holds a queue of replies; the last reply is sticky. Unscripted
/// routes throw, as does everything while `down` is set.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<HashMap<(String, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<Request>>,
    down: AtomicBool,
}

impl MockTransport {
    pub fn reply(&self, method: &str, path: &str, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn respond(&self, method: &str, path: &str, response: Response) {
        self.reply(method, path, Reply::Respond(response));
    }

    pub fn throw(&self, method: &str, path: &str) {
        self.reply(method, path, Reply::Throw(format!("connection refused: {path}")));
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str, path: &str) -> Vec<Request> {
        self.calls()
            .into_iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.clone());
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::Transport("network down".into()));
        }

        let key = (request.method.clone(), request.url.path().to_string());
        let reply = {
            let mut script = self.script.lock().unwrap();
            match script.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Throw(reason)) => Err(Error::Transport(reason)),
            None => Err(Error::Transport(format!("unscripted {} {}", key.0, key.1))),
        }
    }
}

pub struct Harness {
    pub engine: Engine,
    pub transport: Arc<MockTransport>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub pages: Arc<PageRegistry>,
}

impl Harness {
    pub fn request(&self, path: &str) -> Request {
        Request::get(self.engine.url(path).unwrap())
    }

    pub fn go_offline(&self) {
        self.connectivity.set_online(false);
        self.transport.set_down(true);
    }

    pub fn go_online(&self) {
        self.transport.set_down(false);
        self.connectivity.set_online(true);
    }
}

/// Engine over fresh in-memory databases, not yet installed.
pub async fn harness_with(config: AppConfig, caches: CacheDb) -> Harness {
    let transport = Arc::new(MockTransport::default());
    let connectivity = Arc::new(ConnectivityMonitor::new(true));
    let pages = Arc::new(PageRegistry::new());

    let engine = Engine::new(
        config,
        caches,
        LazyStore::new(StoreLocation::Memory),
        Collaborators { transport: transport.clone(), connectivity: connectivity.clone(), clients: pages.clone() },
    )
    .unwrap();

    Harness { engine, transport, connectivity, pages }
}

pub async fn harness() -> Harness {
    harness_with(AppConfig::default(), CacheDb::open_in_memory().await.unwrap()).await
}

/// Script every precache asset with a 200 body naming its path.
pub fn script_assets(transport: &MockTransport, config: &AppConfig) {
    for path in &config.precache {
        transport.respond("GET", path, Response::new(200, format!("asset {path}")));
    }
}

/// Installed and activated engine with all assets cached.
pub async fn activated() -> Harness {
    let h = harness().await;
    script_assets(&h.transport, h.engine.config());
    h.engine.install().await.unwrap();
    h.engine.activate().await.unwrap();
    h
}
