//! Interactive menu sessions
//!
//! Each WebSocket connection gets one session: welcome and menu, then
//! rounds of audio separation, song lookup or the recommendation stub, each
//! followed by a yes/no continue question.

pub mod engine;
pub mod messages;
pub mod state;
pub mod transport;

pub use engine::{SessionEngine, SessionSettings};
pub use state::{Effect, Operation, Outbound, Session, SessionState, Transition};
pub use transport::{SessionTransport, TransportError, WebSocketTransport};
