//! Execution of model-issued function calls.
//!
//! Only `generate_conversation_summary` does real work. Its handling is split in two so the
//! session loop can admit calls in arrival order without waiting on the network:
//!
//! 1. [`FunctionCallCoordinator::begin`] runs the guards (session resolution, duplicate call id)
//!    synchronously and marks the call in progress.
//! 2. [`FunctionCallCoordinator::run`] performs the backend request and produces the
//!    [`SessionAction`]s for the session manager to apply.
//!
//! The in-progress mark is owned by a drop guard, so it is released on every exit path,
//! including an aborted task. Each admitted call carries a ticket; a stale ticket never clears
//! a newer call's mark.

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::config::{CannedMessages, ClientConfig};
use crate::core::backend::{ConversationBackend, SummaryResponse};
use crate::core::realtime::openai::{ClientEvent, ConversationItem};
use crate::core::session::ui::{
    STATUS_GENERATING_SUMMARY, STATUS_READY, STATUS_READY_AFTER_SUMMARY, StatusUpdate,
};

pub const SUMMARY_FUNCTION: &str = "generate_conversation_summary";

/// Functions acknowledged without side effects.
pub const ACKNOWLEDGED_FUNCTIONS: &[&str] = &["analyze_user_needs", "get_user_recommendations"];

/// Session id the model sends when it means "this conversation".
pub const SESSION_PLACEHOLDER: &str = "current_conversation";

// =============================================================================
// Results
// =============================================================================

/// Outcome of one function call.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionCallOutcome {
    Acknowledged,
    UnknownFunction,
    /// No session id could be resolved; no request was made
    NoSession,
    /// A request with the same call id is already running
    InProgress,
    Success(SummaryResponse),
    InsufficientData,
    Failed(String),
}

impl FunctionCallOutcome {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionCallOutcome::Acknowledged => "acknowledged",
            FunctionCallOutcome::UnknownFunction => "unknown_function",
            FunctionCallOutcome::NoSession => "no_session",
            FunctionCallOutcome::InProgress => "in_progress",
            FunctionCallOutcome::Success(_) => "success",
            FunctionCallOutcome::InsufficientData => "insufficient_data",
            FunctionCallOutcome::Failed(_) => "error",
        }
    }
}

/// Side effect requested from the session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Append a complete line to the assistant transcript
    AppendAssistantLine { line: String, persist: bool },
    SetStatus(StatusUpdate),
    /// Send on the message channel if it is open
    Send(ClientEvent),
    /// End the session once the spoken summary finishes or the fallback delay elapses
    ScheduleTeardown,
}

/// Completed function call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallResult {
    pub name: String,
    pub call_id: Option<String>,
    pub outcome: FunctionCallOutcome,
    pub actions: Vec<SessionAction>,
}

impl FunctionCallResult {
    fn immediate(
        name: &str,
        call_id: Option<&str>,
        outcome: FunctionCallOutcome,
        actions: Vec<SessionAction>,
    ) -> Self {
        Self {
            name: name.to_string(),
            call_id: call_id.map(str::to_string),
            outcome,
            actions,
        }
    }
}

/// An admitted summary request awaiting [`FunctionCallCoordinator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub session_id: String,
    pub call_id: Option<String>,
    ticket: u64,
}

/// Result of the admission phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Resolved without a network request
    Done(FunctionCallResult),
    /// Admitted; apply `actions` now and run `request`
    Accepted {
        request: SummaryRequest,
        actions: Vec<SessionAction>,
    },
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Debug, Clone)]
struct PendingFunctionCall {
    call_id: Option<String>,
    session_id: String,
    ticket: u64,
}

struct Inner {
    backend: Arc<dyn ConversationBackend>,
    assistant_prefix: String,
    messages: CannedMessages,
    pending: Mutex<Option<PendingFunctionCall>>,
    next_ticket: AtomicU64,
}

/// Cloneable handle; clones share the in-progress state.
#[derive(Clone)]
pub struct FunctionCallCoordinator {
    inner: Arc<Inner>,
}

impl FunctionCallCoordinator {
    pub fn new(
        backend: Arc<dyn ConversationBackend>,
        assistant_prefix: impl Into<String>,
        messages: CannedMessages,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                assistant_prefix: assistant_prefix.into(),
                messages,
                pending: Mutex::new(None),
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    pub fn from_config(backend: Arc<dyn ConversationBackend>, config: &ClientConfig) -> Self {
        Self::new(backend, config.assistant_prefix.clone(), config.messages.clone())
    }

    /// Admission phase: guards and in-progress marking. Never touches the network.
    pub fn begin(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        call_id: Option<&str>,
        active_session: Option<&str>,
    ) -> Dispatch {
        debug!(name = %name, call_id = ?call_id, "Function call");

        if name != SUMMARY_FUNCTION {
            let outcome = if ACKNOWLEDGED_FUNCTIONS.contains(&name) {
                info!(name = %name, "Function acknowledged");
                FunctionCallOutcome::Acknowledged
            } else {
                warn!(name = %name, "Unknown function call");
                FunctionCallOutcome::UnknownFunction
            };
            return Dispatch::Done(FunctionCallResult::immediate(
                name,
                call_id,
                outcome,
                Vec::new(),
            ));
        }

        let Some(session_id) = resolve_session_id(arguments, active_session) else {
            info!("Summary requested without a session");
            return Dispatch::Done(FunctionCallResult::immediate(
                name,
                call_id,
                FunctionCallOutcome::NoSession,
                vec![
                    self.canned_line(&self.inner.messages.need_conversation),
                    SessionAction::SetStatus(StatusUpdate::info(STATUS_READY)),
                ],
            ));
        };

        let mut pending = self.inner.pending.lock();
        if let Some(current) = pending.as_ref()
            && call_id.is_some()
            && current.call_id.as_deref() == call_id
        {
            info!(call_id = ?call_id, "Summary already in progress for this call id");
            return Dispatch::Done(FunctionCallResult::immediate(
                name,
                call_id,
                FunctionCallOutcome::InProgress,
                Vec::new(),
            ));
        }

        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        *pending = Some(PendingFunctionCall {
            call_id: call_id.map(str::to_string),
            session_id: session_id.clone(),
            ticket,
        });
        drop(pending);

        info!(session_id = %session_id, call_id = ?call_id, "Summary request admitted");
        Dispatch::Accepted {
            request: SummaryRequest {
                session_id,
                call_id: call_id.map(str::to_string),
                ticket,
            },
            actions: vec![SessionAction::SetStatus(StatusUpdate::warning(
                STATUS_GENERATING_SUMMARY,
            ))],
        }
    }

    /// Completion phase: the backend request for an admitted call.
    pub async fn run(&self, request: SummaryRequest) -> FunctionCallResult {
        let _guard = PendingGuard {
            inner: &self.inner,
            ticket: request.ticket,
        };

        let outcome = self
            .inner
            .backend
            .generate_summary(&request.session_id)
            .await;

        let (outcome, actions) = match outcome {
            Ok(response) if response.is_success() => {
                info!(session_id = %request.session_id, "Summary generated");
                let actions = self.success_actions(&request, &response);
                (FunctionCallOutcome::Success(response), actions)
            }
            Ok(response) if response.is_insufficient_data() => {
                info!(session_id = %request.session_id, "Not enough conversation to summarize");
                (
                    FunctionCallOutcome::InsufficientData,
                    vec![
                        self.canned_line(&self.inner.messages.insufficient_data),
                        SessionAction::SetStatus(StatusUpdate::success(
                            STATUS_READY_AFTER_SUMMARY,
                        )),
                    ],
                )
            }
            Ok(response) => self.failure(&request, response.failure_message()),
            Err(e) => self.failure(&request, e.to_string()),
        };

        FunctionCallResult {
            name: SUMMARY_FUNCTION.to_string(),
            call_id: request.call_id,
            outcome,
            actions,
        }
    }

    /// Admission and completion in one call.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        call_id: Option<&str>,
        active_session: Option<&str>,
    ) -> FunctionCallResult {
        match self.begin(name, arguments, call_id, active_session) {
            Dispatch::Done(result) => result,
            Dispatch::Accepted { request, actions } => {
                let mut result = self.run(request).await;
                let mut all = actions;
                all.append(&mut result.actions);
                result.actions = all;
                result
            }
        }
    }

    fn success_actions(
        &self,
        request: &SummaryRequest,
        response: &SummaryResponse,
    ) -> Vec<SessionAction> {
        let mut actions = Vec::with_capacity(5);

        if let Some(call_id) = request.call_id.as_deref() {
            let output = json!({
                "status": "success",
                "message": self.inner.messages.summary_result,
                "summary_text": response.summary_text(),
            })
            .to_string();

            actions.push(SessionAction::Send(ClientEvent::ConversationItemCreate {
                item: ConversationItem::function_call_output(call_id, output),
            }));
            actions.push(SessionAction::Send(ClientEvent::ResponseCreate));
        }

        actions.push(SessionAction::AppendAssistantLine {
            line: response.formatted_summary.clone().unwrap_or_default(),
            persist: true,
        });
        actions.push(SessionAction::SetStatus(StatusUpdate::success(
            STATUS_READY_AFTER_SUMMARY,
        )));
        actions.push(SessionAction::ScheduleTeardown);
        actions
    }

    fn failure(
        &self,
        request: &SummaryRequest,
        message: String,
    ) -> (FunctionCallOutcome, Vec<SessionAction>) {
        warn!(
            session_id = %request.session_id,
            call_id = ?request.call_id,
            error = %message,
            "Summary generation failed"
        );
        (
            FunctionCallOutcome::Failed(message),
            vec![
                SessionAction::SetStatus(StatusUpdate::success(STATUS_READY_AFTER_SUMMARY)),
                self.canned_line(&self.inner.messages.summary_failed),
            ],
        )
    }

    fn canned_line(&self, text: &str) -> SessionAction {
        SessionAction::AppendAssistantLine {
            line: format!("{}{}", self.inner.assistant_prefix, text),
            persist: false,
        }
    }

    /// Whether a summary request is running.
    pub fn is_in_progress(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// Call id of the running summary request.
    pub fn pending_call_id(&self) -> Option<String> {
        self.inner
            .pending
            .lock()
            .as_ref()
            .and_then(|p| p.call_id.clone())
    }

    /// Session the running summary request belongs to.
    pub fn pending_session_id(&self) -> Option<String> {
        self.inner
            .pending
            .lock()
            .as_ref()
            .map(|p| p.session_id.clone())
    }

    /// Forget the in-progress call; used when its session ends.
    pub fn reset(&self) {
        self.inner.pending.lock().take();
    }
}

impl std::fmt::Debug for FunctionCallCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCallCoordinator")
            .field("pending", &*self.inner.pending.lock())
            .finish()
    }
}

/// Clears the in-progress mark for one ticket on drop.
struct PendingGuard<'a> {
    inner: &'a Inner,
    ticket: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.inner.pending.lock();
        if pending.as_ref().is_some_and(|p| p.ticket == self.ticket) {
            *pending = None;
        }
    }
}

/// Argument session id unless absent or the placeholder, else the active session.
fn resolve_session_id(
    arguments: &Map<String, Value>,
    active_session: Option<&str>,
) -> Option<String> {
    arguments
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty() && *id != SESSION_PLACEHOLDER)
        .or(active_session.filter(|id| !id.is_empty()))
        .map(str::to_string)
}
