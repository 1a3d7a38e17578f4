//! Run lifecycle: execution state, error taxonomy, and wire messages.
//!
//! A run is one dispatched execution of a code block's source. The block
//! mints a fresh [`RunId`] per dispatch; the reply (and any stream chunks)
//! echo it back, and matching is done by that id alone — never by arrival
//! order. The transport is treated as unordered and at-least-once.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::RunId;

/// Execution state of a code block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum RunState {
    /// Never run, or edited back to rest. Initial state.
    #[default]
    Idle,
    /// A request is in flight under the current correlation id.
    Running,
    /// Last matched reply reported success.
    #[strum(serialize = "succeeded", serialize = "success")]
    Succeeded,
    /// Last matched reply reported failure.
    #[strum(serialize = "failed", serialize = "error")]
    Failed,
}

impl RunState {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        }
    }

    /// Check if this state is terminal (Succeeded or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }

    /// Check if a request is currently in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run failed.
///
/// `Execution` means "your code failed"; `Transport` and `Timeout` mean
/// "we couldn't run your code" — the UI renders them differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum RunErrorKind {
    /// The backend executed the source and it failed.
    Execution,
    /// The request could not be dispatched (network/backend unavailable).
    Transport,
    /// The local run timer expired before a reply arrived.
    Timeout,
}

impl RunErrorKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunErrorKind::Execution => "execution",
            RunErrorKind::Transport => "transport",
            RunErrorKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed run: kind plus the message to surface inside the block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct RunError {
    /// Failure category.
    pub kind: RunErrorKind,
    /// Backend-supplied (or locally synthesized) message.
    pub message: String,
}

impl RunError {
    /// A backend-reported execution failure.
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            kind: RunErrorKind::Execution,
            message: message.into(),
        }
    }

    /// A dispatch failure — the request never reached the backend.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: RunErrorKind::Transport,
            message: message.into(),
        }
    }

    /// A local timeout after waiting `waited`.
    pub fn timeout(waited: Duration) -> Self {
        Self {
            kind: RunErrorKind::Timeout,
            message: format!("no reply after {:.1}s", waited.as_secs_f64()),
        }
    }
}

// ============================================================================
// Wire messages
// ============================================================================

/// One outbound execution request, carrying everything the backend needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Correlation id minted for this dispatch.
    pub run_id: RunId,
    /// Language tag of the block.
    pub language: String,
    /// Source text to execute.
    pub source: String,
}

/// Terminal outcome of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    /// Execution completed; `output` is the captured result.
    Success { output: String },
    /// Execution (or dispatch) failed.
    Error { error: RunError },
}

/// Terminal reply to a [`RunRequest`], matched to it by `run_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReply {
    /// Correlation id echoed from the request.
    pub run_id: RunId,
    /// What happened.
    pub outcome: RunOutcome,
}

impl RunReply {
    /// A successful reply.
    pub fn success(run_id: RunId, output: impl Into<String>) -> Self {
        Self {
            run_id,
            outcome: RunOutcome::Success {
                output: output.into(),
            },
        }
    }

    /// A failed reply.
    pub fn failure(run_id: RunId, error: RunError) -> Self {
        Self {
            run_id,
            outcome: RunOutcome::Error { error },
        }
    }
}

/// One incremental chunk of streamed output, matched by `run_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunChunk {
    /// Correlation id echoed from the request.
    pub run_id: RunId,
    /// Output fragment, appended in arrival order within one run.
    pub text: String,
}

// ============================================================================
// Tests
// ============================================================================
