//! Test Helper Utilities
//!
//! In-memory session transport and scripted collaborators for driving the
//! session engine without a network.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stemchat_common::config::StoragePaths;
use stemchat_server::services::{
    ArtistCredit, FileStore, JobOutcome, LookupError, SeparationRunner, SongLookup, SongMatch,
};
use stemchat_server::session::{SessionEngine, SessionSettings, SessionTransport, TransportError};
use stemchat_server::AppState;
use tokio::sync::mpsc;

/// Server half of an in-memory connection
pub struct ChannelTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl SessionTransport for ChannelTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.outgoing
            .send(text)
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Client half of an in-memory connection
pub struct Client {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl Client {
    pub fn send(&self, text: &str) -> bool {
        match &self.tx {
            Some(tx) => tx.send(text.to_string()).is_ok(),
            None => false,
        }
    }

    /// Next server message; panics after 30 s of silence
    pub async fn next(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(30), self.rx.recv())
            .await
            .expect("timed out waiting for server message")
            .expect("server hung up")
    }

    pub async fn take(&mut self, count: usize) -> Vec<String> {
        let mut messages = Vec::with_capacity(count);
        for _ in 0..count {
            messages.push(self.next().await);
        }
        messages
    }

    /// Everything the server sends until it hangs up
    pub async fn drain(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Some(message) = self.rx.recv().await {
            messages.push(message);
        }
        messages
    }

    /// Simulate a dropped connection
    pub fn disconnect(&mut self) {
        self.tx = None;
    }

    pub fn transport_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn connection() -> (ChannelTransport, Client) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));

    (
        ChannelTransport {
            incoming: server_rx,
            outgoing: server_tx,
            closed: Arc::clone(&closed),
        },
        Client {
            tx: Some(client_tx),
            rx: client_rx,
            closed,
        },
    )
}

/// How a [`StubRunner`] behaves
#[derive(Clone, Copy)]
pub enum RunnerBehavior {
    Returns(JobOutcome),
    /// Sleeps, then returns
    Delayed(Duration, JobOutcome),
    /// Never finishes
    Hangs,
}

/// Separation runner recording its calls
pub struct StubRunner {
    behavior: RunnerBehavior,
    pub calls: Mutex<Vec<String>>,
    /// Set when a running job future is dropped before finishing
    pub abandoned: Arc<AtomicBool>,
}

impl StubRunner {
    pub fn new(behavior: RunnerBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
            abandoned: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

struct AbandonGuard {
    flag: Arc<AtomicBool>,
    finished: bool,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl SeparationRunner for StubRunner {
    async fn run(&self, filename: &str) -> JobOutcome {
        self.calls.lock().unwrap().push(filename.to_string());
        let mut guard = AbandonGuard {
            flag: Arc::clone(&self.abandoned),
            finished: false,
        };

        let outcome = match self.behavior {
            RunnerBehavior::Returns(outcome) => outcome,
            RunnerBehavior::Delayed(delay, outcome) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            RunnerBehavior::Hangs => std::future::pending().await,
        };

        guard.finished = true;
        outcome
    }
}

/// How a [`StubLookup`] answers
#[derive(Clone)]
pub enum LookupBehavior {
    Songs(Vec<SongMatch>),
    Unreachable,
    Broken,
}

pub struct StubLookup {
    behavior: LookupBehavior,
    pub queries: Mutex<Vec<String>>,
}

impl StubLookup {
    pub fn new(behavior: LookupBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl SongLookup for StubLookup {
    async fn search(&self, query: &str) -> Result<Vec<SongMatch>, LookupError> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.behavior {
            LookupBehavior::Songs(songs) => Ok(songs.clone()),
            LookupBehavior::Unreachable => {
                Err(LookupError::Connectivity("connection refused".to_string()))
            }
            LookupBehavior::Broken => Err(LookupError::Other("HTTP status 500".to_string())),
        }
    }
}

pub fn song(name: &str, artists: &[&str]) -> SongMatch {
    SongMatch {
        name: name.to_string(),
        artists: artists
            .iter()
            .map(|a| ArtistCredit {
                name: a.to_string(),
            })
            .collect(),
    }
}

/// Store rooted in a fresh temp dir
pub fn test_store() -> (tempfile::TempDir, Arc<FileStore>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(StoragePaths::under(temp_dir.path())).unwrap();
    (temp_dir, Arc::new(store))
}

pub fn test_settings() -> SessionSettings {
    SessionSettings {
        pacing: Duration::from_secs(2),
        verify_uploads: true,
    }
}

pub fn test_engine(
    store: Arc<FileStore>,
    runner: Arc<StubRunner>,
    lookup: Arc<StubLookup>,
    settings: SessionSettings,
) -> SessionEngine {
    SessionEngine::new(store, runner, lookup, settings)
}

/// Router state with stub collaborators
pub fn test_app_state(store: Arc<FileStore>) -> AppState {
    AppState::new(
        store,
        StubRunner::new(RunnerBehavior::Returns(JobOutcome::Success)),
        StubLookup::new(LookupBehavior::Songs(Vec::new())),
        test_settings(),
    )
}
