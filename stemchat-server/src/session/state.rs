//! Session state machine
//!
//! One [`Session`] exists per open connection. Inputs are applied through the
//! pure [`transition`] function; long-running work (separation jobs, song
//! lookups) is returned as an [`Effect`] for the engine to execute, and its
//! result is fed back through the `finish_*` methods.
//!
//! ```text
//! Idle ──"1"──> AwaitingUpload ──"uploaded:<name>"──> Running ──outcome──┐
//!  │ ^                 └──other──────────────────────────────────────────┤
//!  │ │                                                                   v
//!  │ └────────────"yes"───────────────────────────────────────── AwaitingContinue ──other──> Closed
//!  ├──"2"──> AwaitingSongQuery ──query──> (lookup) ──────────────────────^
//!  ├──"3"────────────────────────────────────────────────────────────────^
//!  └──other──> Idle
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::messages;
use crate::services::{JobOutcome, LookupError, SongMatch};

/// Prefix of the upload-confirmation message sent after a successful upload
pub const UPLOAD_SENTINEL: &str = "uploaded:";

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Menu shown, awaiting a choice
    Idle,
    /// Audio Separation chosen, awaiting `uploaded:<name>`
    AwaitingUpload,
    /// Separation job dispatched
    Running,
    /// Finding Info chosen, awaiting free-text query
    AwaitingSongQuery,
    /// Round finished, awaiting yes/no
    AwaitingContinue,
    /// Session over; no further input is read
    Closed,
}

/// Menu choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    AudioSeparation,
    FindingInfo,
    RecommendSongs,
}

impl Operation {
    /// Parse a menu choice; only the exact strings "1", "2", "3" match
    pub fn from_choice(input: &str) -> Option<Self> {
        match input {
            "1" => Some(Operation::AudioSeparation),
            "2" => Some(Operation::FindingInfo),
            "3" => Some(Operation::RecommendSongs),
            _ => None,
        }
    }
}

/// Work the engine must perform before the round can finish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run the separation job on an inbox file
    Separate { filename: String },
    /// Query the song catalog
    Lookup { query: String },
}

/// One outbound item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Pacing pause between two status messages. Not a completion signal.
    Pace,
}

impl Outbound {
    fn text(text: impl Into<String>) -> Self {
        Outbound::Text(text.into())
    }
}

/// Result of applying one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub outbound: Vec<Outbound>,
    pub effect: Option<Effect>,
}

impl Transition {
    fn to(next: SessionState, outbound: Vec<Outbound>) -> Self {
        Self {
            next,
            outbound,
            effect: None,
        }
    }

    /// End of a round: report, then ask whether to continue
    fn round_over(mut report: Vec<Outbound>) -> Self {
        report.push(Outbound::text(messages::CONTINUE_PROMPT));
        Self::to(SessionState::AwaitingContinue, report)
    }
}

/// Extract the filename from an upload confirmation
///
/// Everything after the first `uploaded:` is the name; later occurrences are
/// part of the name.
pub fn parse_upload_confirmation(input: &str) -> Option<&str> {
    input.strip_prefix(UPLOAD_SENTINEL)
}

/// Pure transition function
pub fn transition(state: SessionState, input: &str) -> Transition {
    match state {
        SessionState::Idle => match Operation::from_choice(input) {
            Some(Operation::AudioSeparation) => Transition::to(
                SessionState::AwaitingUpload,
                vec![Outbound::text(messages::UPLOAD_PROMPT)],
            ),
            Some(Operation::FindingInfo) => Transition::to(
                SessionState::AwaitingSongQuery,
                vec![Outbound::text(messages::SONG_QUERY_PROMPT)],
            ),
            Some(Operation::RecommendSongs) => {
                Transition::round_over(vec![Outbound::text(messages::RECOMMEND_ACK)])
            }
            None => Transition::to(
                SessionState::Idle,
                vec![Outbound::text(messages::unrecognized_option(input))],
            ),
        },

        SessionState::AwaitingUpload => match parse_upload_confirmation(input) {
            Some(filename) => Transition {
                next: SessionState::Running,
                outbound: vec![Outbound::text(messages::upload_received(filename))],
                effect: Some(Effect::Separate {
                    filename: filename.to_string(),
                }),
            },
            None => Transition::round_over(vec![Outbound::text(messages::NO_FILE_UPLOADED)]),
        },

        SessionState::AwaitingSongQuery => Transition {
            next: SessionState::AwaitingSongQuery,
            outbound: Vec::new(),
            effect: Some(Effect::Lookup {
                query: input.to_string(),
            }),
        },

        SessionState::AwaitingContinue => {
            if input.eq_ignore_ascii_case("yes") {
                Transition::to(SessionState::Idle, vec![Outbound::text(messages::MENU)])
            } else {
                Transition::to(SessionState::Closed, vec![Outbound::text(messages::GOODBYE)])
            }
        }

        // Input is not consumed in these states
        SessionState::Running | SessionState::Closed => Transition::to(state, Vec::new()),
    }
}

/// Finish a separation round
pub fn resolve_separation(outcome: JobOutcome) -> Transition {
    match outcome {
        JobOutcome::Success => Transition::round_over(vec![
            Outbound::text(messages::SEPARATION_COMPLETE),
            Outbound::Pace,
            Outbound::text(messages::DOWNLOADING_FILES),
        ]),
        JobOutcome::Failure => {
            Transition::round_over(vec![Outbound::text(messages::SEPARATION_FAILED)])
        }
    }
}

/// Finish a lookup round
pub fn resolve_lookup(result: &Result<Vec<SongMatch>, LookupError>) -> Transition {
    let report = match result {
        Ok(songs) if songs.is_empty() => messages::NO_MATCHING_SONGS.to_string(),
        Ok(songs) => messages::found_songs(songs),
        Err(e) => messages::lookup_failed(e),
    };
    Transition::round_over(vec![Outbound::Text(report)])
}

/// Finish a separation round whose announced file is not in the inbox
pub fn resolve_missing_upload(filename: &str) -> Transition {
    Transition::round_over(vec![Outbound::Text(messages::file_not_found(filename))])
}

/// Per-connection session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    state: SessionState,
    pending_filename: Option<String>,
    last_operation: Option<Operation>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            pending_filename: None,
            last_operation: None,
            started_at: Utc::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Filename of the most recent upload handshake
    pub fn pending_filename(&self) -> Option<&str> {
        self.pending_filename.as_deref()
    }

    pub fn last_operation(&self) -> Option<Operation> {
        self.last_operation
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Messages sent on connect, before any input
    pub fn greeting() -> Vec<Outbound> {
        vec![
            Outbound::text(messages::WELCOME),
            Outbound::text(messages::MENU),
        ]
    }

    /// Apply one client message
    pub fn handle_input(&mut self, input: &str) -> Transition {
        if self.state == SessionState::Idle {
            if let Some(operation) = Operation::from_choice(input) {
                self.last_operation = Some(operation);
            }
        }

        let transition = transition(self.state, input);

        if let Some(Effect::Separate { filename }) = &transition.effect {
            self.pending_filename = Some(filename.clone());
        }

        self.apply(transition)
    }

    pub fn finish_separation(&mut self, outcome: JobOutcome) -> Transition {
        self.apply(resolve_separation(outcome))
    }

    pub fn finish_lookup(&mut self, result: &Result<Vec<SongMatch>, LookupError>) -> Transition {
        self.apply(resolve_lookup(result))
    }

    pub fn reject_missing_upload(&mut self, filename: &str) -> Transition {
        self.apply(resolve_missing_upload(filename))
    }

    /// Connection gone
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            tracing::debug!(session_id = %self.id, from = ?self.state, "Session closed by transport");
            self.state = SessionState::Closed;
        }
    }

    fn apply(&mut self, transition: Transition) -> Transition {
        if transition.next != self.state {
            tracing::debug!(
                session_id = %self.id,
                from = ?self.state,
                to = ?transition.next,
                "Session state transition"
            );
        }
        self.state = transition.next;
        transition
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
