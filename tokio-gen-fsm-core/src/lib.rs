//! Core runtime for tokio-gen-fsm.
//!
//! Each started behavior runs as one Tokio task that owns the behavior, its
//! current state, its handler table and at most one pending state timeout.
//! Callers only talk to it through an [`FsmHandle`].

mod behavior;
mod builder;
mod error;
mod event_loop;
mod handle;
mod resolver;
mod table;
mod timer;
mod types;

pub use crate::behavior::{Behavior, HandlerFuture, Invoker, Operation, ReturnShape, Signature};
pub use crate::builder::{FsmBuilder, FsmConfig, start};
pub use crate::error::{ConfigWarning, DispatchError, Dispatched, FsmError, InvocationError, Outcome};
pub use crate::event_loop::{Request, Response};
pub use crate::handle::{FsmHandle, FsmTask};
pub use crate::resolver::{DelimiterResolver, Resolver};
pub use crate::table::{HandlerEntry, HandlerTable};
pub use crate::types::{Arg, Args, Event, IntoTransition, ShutdownMode, State, Transition};
