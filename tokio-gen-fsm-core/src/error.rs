//! Error and warning types.

use std::time::Duration;

use crate::types::{Event, State};

/// Failure to call a resolved handler with the arguments an event carried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    /// The event carried the wrong number of arguments.
    #[error("expected {expected} argument(s), found {found}")]
    Arity { expected: usize, found: usize },
    /// An argument had a different type than the handler parameter.
    #[error("argument {index}: expected `{expected}`, found `{found}`")]
    Type {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    /// No argument at this position, or it was already consumed.
    #[error("argument {index} is missing")]
    Missing { index: usize },
    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Non-fatal dispatch failure, posted to the outcome outbox.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No handler for the pair and no generic fallback registered.
    #[error("no handler for event `{event}` in state `{state}`")]
    Resolution { state: State, event: Event },
    /// The resolved handler could not be called; the state is unchanged.
    #[error("handler `{handler}` failed for event `{event}` in state `{state}`: {source}")]
    Invocation {
        state: State,
        event: Event,
        handler: String,
        #[source]
        source: InvocationError,
    },
}

/// Handler table problem found at startup. Never blocks the start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigWarning {
    /// The name holds the delimiter more than once.
    #[error("ambiguous handler name `{name}`")]
    Ambiguous { name: String },
    /// A second handler for a pair that is already registered.
    #[error("duplicate handler `{name}` for event `{event}` in state `{state}`, keeping the first")]
    Duplicate {
        state: State,
        event: Event,
        name: String,
    },
    /// The name resolves to a handler but the operation cannot be invoked.
    #[error("handler `{name}` has no invoker")]
    NotInvocable { name: String },
}

/// Errors returned by the handle and the task of a running instance.
#[derive(Debug, thiserror::Error)]
pub enum FsmError {
    /// The instance has been stopped. Talking to it afterwards is misuse.
    #[error("protocol violation: `{operation}` called on a stopped fsm")]
    Stopped { operation: &'static str },
    /// The event inbox is at capacity.
    #[error("event inbox is full")]
    Full,
    /// The behavior's initialization rejected the start arguments.
    #[error("init failed: {0}")]
    Init(#[source] InvocationError),
    /// The event loop task panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A successfully dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub event: Event,
    pub from: State,
    pub to: State,
    /// Timeout armed by the transition.
    pub timeout: Option<Duration>,
    /// Name of the handler that ran.
    pub handler: String,
}

/// Acknowledgement posted once per processed event.
pub type Outcome = Result<Dispatched, DispatchError>;
