//! Session engine
//!
//! Drives one [`Session`] over a [`SessionTransport`] until the session
//! closes or the client disconnects. Separation jobs and lookups run in a
//! spawned task guarded by a cancellation token while the engine keeps
//! reading the transport, so a disconnect is noticed mid-job. Cancellation is
//! best-effort: an external separation process already started keeps running
//! and may still write its outputs.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stemchat_common::config::SessionConfig;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::messages;
use super::state::{Effect, Outbound, Session, Transition};
use super::transport::{SessionTransport, TransportError};
use crate::services::{FileStore, JobOutcome, LookupError, SeparationRunner, SongLookup};

/// Engine behaviour settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Pause between "Separation Complete" and "Downloading files."
    pub pacing: Duration,
    /// Check the inbox before dispatching a job
    pub verify_uploads: bool,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            pacing: config.pacing(),
            verify_uploads: config.verify_uploads,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Runs interactive sessions against shared collaborators
#[derive(Clone)]
pub struct SessionEngine {
    store: Arc<FileStore>,
    runner: Arc<dyn SeparationRunner>,
    lookup: Arc<dyn SongLookup>,
    settings: SessionSettings,
}

impl SessionEngine {
    pub fn new(
        store: Arc<FileStore>,
        runner: Arc<dyn SeparationRunner>,
        lookup: Arc<dyn SongLookup>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            runner,
            lookup,
            settings,
        }
    }

    /// Run a session to completion and return its final state
    ///
    /// Input that arrives while a job is in flight is queued and applied,
    /// in order, once the job has been reported.
    pub async fn run<T: SessionTransport>(&self, mut transport: T) -> Session {
        let mut session = Session::new();
        let mut backlog: VecDeque<String> = VecDeque::new();

        info!(session_id = %session.id, "Session opened");

        if self.deliver(&mut transport, Session::greeting()).await.is_err() {
            session.close();
        }

        while !session.is_closed() {
            let input = match backlog.pop_front() {
                Some(input) => input,
                None => match transport.recv().await {
                    Some(input) => input,
                    None => {
                        info!(session_id = %session.id, state = ?session.state(), "Client disconnected");
                        session.close();
                        break;
                    }
                },
            };

            debug!(session_id = %session.id, input = %input, "Session input");
            let transition = session.handle_input(&input);

            if self.deliver(&mut transport, transition.outbound).await.is_err() {
                session.close();
                break;
            }

            let Some(effect) = transition.effect else {
                continue;
            };

            let finished = match self
                .execute(effect, &mut session, &mut transport, &mut backlog)
                .await
            {
                Some(finished) => finished,
                None => {
                    session.close();
                    break;
                }
            };

            if self.deliver(&mut transport, finished.outbound).await.is_err() {
                session.close();
            }
        }

        transport.close().await;

        let duration = Utc::now().signed_duration_since(session.started_at);
        info!(
            session_id = %session.id,
            duration_seconds = duration.num_seconds(),
            "Session ended"
        );

        session
    }

    /// Perform an effect; `None` means the client went away
    async fn execute<T: SessionTransport>(
        &self,
        effect: Effect,
        session: &mut Session,
        transport: &mut T,
        backlog: &mut VecDeque<String>,
    ) -> Option<Transition> {
        match effect {
            Effect::Separate { filename } => {
                if self.settings.verify_uploads && !self.store.exists(&filename).await {
                    warn!(session_id = %session.id, file = %filename, "Announced upload is not in the inbox");
                    return Some(session.reject_missing_upload(&filename));
                }

                let notice = vec![Outbound::Text(messages::WAIT_FOR_SEPARATION.to_string())];
                if self.deliver(transport, notice).await.is_err() {
                    return None;
                }

                info!(session_id = %session.id, file = %filename, "Dispatching separation job");
                let runner = Arc::clone(&self.runner);
                let job = async move { runner.run(&filename).await };

                let outcome = match supervise(session.id, job, transport, backlog).await? {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(session_id = %session.id, error = %e, "Separation task aborted");
                        JobOutcome::Failure
                    }
                };

                info!(session_id = %session.id, outcome = ?outcome, "Separation job finished");
                Some(session.finish_separation(outcome))
            }

            Effect::Lookup { query } => {
                let lookup = Arc::clone(&self.lookup);
                let search = async move { lookup.search(&query).await };

                let result = match supervise(session.id, search, transport, backlog).await? {
                    Ok(result) => result,
                    Err(e) => Err(LookupError::Other(e.to_string())),
                };

                if let Err(e) = &result {
                    warn!(session_id = %session.id, error = %e, "Song lookup failed");
                }
                Some(session.finish_lookup(&result))
            }
        }
    }

    async fn deliver<T: SessionTransport>(
        &self,
        transport: &mut T,
        outbound: Vec<Outbound>,
    ) -> Result<(), TransportError> {
        for item in outbound {
            match item {
                Outbound::Text(text) => transport.send(text).await?,
                Outbound::Pace => tokio::time::sleep(self.settings.pacing).await,
            }
        }
        Ok(())
    }
}

/// Run `work` in its own task while watching the transport
///
/// Client messages received meanwhile go to `backlog`. Returns `None` if the
/// client disconnects first, after cancelling the task. The task is also
/// cancelled if the caller stops polling.
async fn supervise<W, T>(
    session_id: Uuid,
    work: W,
    transport: &mut T,
    backlog: &mut VecDeque<String>,
) -> Option<Result<W::Output, JoinError>>
where
    W: Future + Send + 'static,
    W::Output: Send + 'static,
    T: SessionTransport,
{
    let token = CancellationToken::new();
    let task_token = token.clone();
    // Also cancels when this future is dropped mid-job
    let _cancel_on_exit = token.clone().drop_guard();

    let mut handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            output = work => Some(output),
            _ = task_token.cancelled() => None,
        }
    });

    loop {
        tokio::select! {
            joined = &mut handle => {
                return match joined {
                    Ok(output) => output.map(Ok),
                    Err(e) => Some(Err(e)),
                };
            }
            incoming = transport.recv() => match incoming {
                Some(text) => {
                    debug!(session_id = %session_id, input = %text, "Queued input received while busy");
                    backlog.push_back(text);
                }
                None => {
                    warn!(session_id = %session_id, "Client disconnected during job, cancelling");
                    token.cancel();
                    return None;
                }
            }
        }
    }
}
