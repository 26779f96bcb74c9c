//! Session lifecycle as seen from the main thread.

use crate::protocol::{MidiPortInfo, MidiResult};
use std::collections::VecDeque;

pub const INITIALIZATION_FAILED_MESSAGE: &str = "platform dependent initialization failed";
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown internal error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    Unsupported,
    InvalidState,
}

impl SessionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionErrorKind::Unsupported => "unsupported",
            SessionErrorKind::InvalidState => "invalid-state",
        }
    }
}

impl std::fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What clients are told about a session attempt. A pure function of the result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub success: bool,
    pub error: Option<SessionErrorKind>,
    pub message: &'static str,
}

impl SessionOutcome {
    pub fn from_result(result: MidiResult) -> Self {
        match result {
            MidiResult::Ok => Self {
                success: true,
                error: None,
                message: "",
            },
            MidiResult::NotSupported => Self {
                success: false,
                error: Some(SessionErrorKind::Unsupported),
                message: "",
            },
            MidiResult::InitializationError => Self {
                success: false,
                error: Some(SessionErrorKind::InvalidState),
                message: INITIALIZATION_FAILED_MESSAGE,
            },
            MidiResult::NotInitialized | MidiResult::Unknown(_) => Self {
                success: false,
                error: Some(SessionErrorKind::InvalidState),
                message: UNKNOWN_ERROR_MESSAGE,
            },
        }
    }

    pub fn error_name(&self) -> &'static str {
        self.error.map_or("", SessionErrorKind::as_str)
    }
}

/// Returns `true` for result codes a well-behaved peer never sends.
pub(crate) fn is_internal_fault(result: MidiResult) -> bool {
    matches!(result, MidiResult::NotInitialized | MidiResult::Unknown(_))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No clients, no session.
    Idle,
    /// Waiting for the answer to the live start request.
    Starting,
    /// The peer answered; `result` holds the outcome.
    Established,
}

/// Identifies one start request.
pub(crate) type StartId = u64;

/// Fate of the live start request on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Posted to the I/O thread, not yet reported back.
    Pending,
    /// Written to an attached channel; the peer owes a reply.
    Sent,
    /// Discarded while detached, or its channel went away unanswered.
    Lost,
}

/// What the filter must do after a client joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinAction {
    /// First client: ask the peer for a session.
    Start(StartId),
    /// A start is in flight; the client waits for it.
    Wait,
    /// The outcome is already known; admit now.
    Admit(MidiResult),
}

pub(crate) struct SessionCoordinator {
    phase: Phase,
    result: MidiResult,
    inputs: Vec<MidiPortInfo>,
    outputs: Vec<MidiPortInfo>,
    /// The start whose reply admits waiting clients, while `Starting`.
    live_start: Option<(StartId, Delivery)>,
    /// Starts written to the current channel and not yet answered, oldest first.
    unanswered: VecDeque<StartId>,
    next_start: StartId,
    starts_requested: u64,
    ends_requested: u64,
}

impl SessionCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Idle,
            result: MidiResult::NotInitialized,
            inputs: Vec::new(),
            outputs: Vec::new(),
            live_start: None,
            unanswered: VecDeque::new(),
            next_start: 0,
            starts_requested: 0,
            ends_requested: 0,
        }
    }

    pub(crate) fn client_joined(&mut self) -> JoinAction {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Starting;
                JoinAction::Start(self.issue_start())
            }
            Phase::Starting => JoinAction::Wait,
            Phase::Established => JoinAction::Admit(self.result),
        }
    }

    fn issue_start(&mut self) -> StartId {
        let id = self.next_start;
        self.next_start += 1;
        self.starts_requested += 1;
        self.live_start = Some((id, Delivery::Pending));
        id
    }

    /// The last client left. The caller sends the end request.
    ///
    /// A start still in flight stays in `unanswered`; its reply is discarded.
    pub(crate) fn all_clients_left(&mut self) {
        self.phase = Phase::Idle;
        self.live_start = None;
        self.result = MidiResult::NotInitialized;
        self.inputs.clear();
        self.outputs.clear();
        self.ends_requested += 1;
    }

    /// The I/O thread reports whether start `id` reached an attached channel.
    pub(crate) fn start_delivered(&mut self, id: StartId, delivered: bool) {
        if delivered {
            self.unanswered.push_back(id);
        }
        if let Some((live, delivery)) = &mut self.live_start {
            if *live == id {
                *delivery = if delivered {
                    Delivery::Sent
                } else {
                    Delivery::Lost
                };
            }
        }
    }

    /// The channel went away. Nothing written to it will be answered.
    pub(crate) fn channel_detached(&mut self) {
        self.unanswered.clear();
        if let Some((_, delivery @ Delivery::Sent)) = &mut self.live_start {
            *delivery = Delivery::Lost;
        }
    }

    /// A channel attached. Returns a replacement start if the live one was lost.
    pub(crate) fn channel_attached(&mut self) -> Option<StartId> {
        match self.live_start {
            Some((_, Delivery::Lost)) => Some(self.issue_start()),
            _ => None,
        }
    }

    /// Record the peer's answer. Returns `true` if waiting clients should be admitted.
    ///
    /// The channel delivers replies in request order, so each answer belongs
    /// to the oldest unanswered start. Answers to abandoned or superseded
    /// starts are consumed and ignored.
    pub(crate) fn session_started(
        &mut self,
        result: MidiResult,
        inputs: Vec<MidiPortInfo>,
        outputs: Vec<MidiPortInfo>,
    ) -> bool {
        let Some(answered) = self.unanswered.pop_front() else {
            tracing::warn!(
                "Unexpected session result {:?} while {:?}; ignoring",
                result,
                self.phase
            );
            return false;
        };
        match self.live_start {
            Some((live, _)) if live == answered && self.phase == Phase::Starting => {}
            _ => {
                tracing::debug!(
                    "Ignoring session result {:?} for an abandoned start request",
                    result
                );
                return false;
            }
        }

        self.phase = Phase::Established;
        self.live_start = None;
        self.result = result;
        self.inputs = inputs;
        self.outputs = outputs;
        true
    }

    pub(crate) fn result(&self) -> MidiResult {
        self.result
    }

    pub(crate) fn inputs(&self) -> &[MidiPortInfo] {
        &self.inputs
    }

    pub(crate) fn outputs(&self) -> &[MidiPortInfo] {
        &self.outputs
    }

    pub(crate) fn starts_requested(&self) -> u64 {
        self.starts_requested
    }

    pub(crate) fn ends_requested(&self) -> u64 {
        self.ends_requested
    }
}
