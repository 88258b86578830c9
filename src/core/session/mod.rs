//! Voice session lifecycle.
//!
//! A [`SessionManager`] owns the transport, message channel and microphone of at most one live
//! session and processes every input on a single loop:
//!
//! ```text
//! SessionHandle ──Command──┐
//! transport callback ──────┼──> mpsc ──> SessionManager::handle ──> ClientUi
//! timers / summary tasks ──┘                    │
//!                                               ├──> EventNormalizer ──> TranscriptBuffer
//!                                               ├──> FunctionCallCoordinator
//!                                               └──> PersistenceRelay
//! ```
//!
//! Inputs produced for an earlier session carry its generation number and are discarded.

mod manager;
pub mod ui;

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use uuid::Uuid;

pub use manager::{SessionDeps, SessionManager};
pub use ui::{ClientUi, ControlState, StatusKind, StatusUpdate};

use crate::core::backend::RequestSlot;
use crate::core::completion::TeardownTrigger;
use crate::core::function_call::FunctionCallResult;
use crate::core::realtime::TransportEvent;
use crate::errors::{ClientError, ClientResult};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// User pressed stop
    Manual,
    /// Summary delivered and spoken
    Auto,
    /// Session start failed
    Failure,
    /// Host page or process is going away
    Unload,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Manual => write!(f, "manual"),
            StopReason::Auto => write!(f, "auto"),
            StopReason::Failure => write!(f, "failure"),
            StopReason::Unload => write!(f, "unload"),
        }
    }
}

/// User-level commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
    Unload,
}

/// Everything the session loop consumes.
#[derive(Debug)]
pub enum SessionInput {
    Command(SessionCommand),
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    /// Coalesced render window elapsed
    RenderFrame { generation: u64 },
    FunctionCallFinished {
        generation: u64,
        result: FunctionCallResult,
    },
    /// Summary teardown fallback fired
    TeardownDue {
        generation: u64,
        trigger: TeardownTrigger,
    },
}

/// Cloneable control handle for a running [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionInput>,
    request_slot: Arc<RequestSlot>,
}

impl SessionHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<SessionInput>,
        request_slot: Arc<RequestSlot>,
    ) -> Self {
        Self { tx, request_slot }
    }

    pub fn start(&self) -> ClientResult<()> {
        self.send(SessionInput::Command(SessionCommand::Start))
    }

    /// Request a manual stop. A session still connecting has its in-flight request aborted.
    pub fn stop(&self) -> ClientResult<()> {
        self.request_slot.cancel_inflight();
        self.send(SessionInput::Command(SessionCommand::Stop))
    }

    /// Tear down unconditionally and end the session loop.
    pub fn unload(&self) -> ClientResult<()> {
        self.request_slot.cancel_inflight();
        self.send(SessionInput::Command(SessionCommand::Unload))
    }

    /// Enqueue a raw input.
    pub fn send(&self, input: SessionInput) -> ClientResult<()> {
        self.tx.send(input).map_err(|_| ClientError::NotConnected)
    }

    /// Whether the session loop has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Fresh session identifier: creation time in milliseconds plus a random suffix.
pub fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
    format!("session_{millis}_{suffix}")
}
