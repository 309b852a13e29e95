//! Caller-side handle and task of a running instance.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{ConfigWarning, FsmError, Outcome};
use crate::event_loop::{ControlMessage, EventMessage, Request, Response};
use crate::types::{Args, Event, ShutdownMode, State};

/// A handle to a running instance for event submission, synchronous
/// requests and state observation.
///
/// Handles are cheap to clone. The instance keeps running until it is
/// stopped or every handle is dropped.
#[derive(Clone)]
pub struct FsmHandle {
    pub(crate) event_tx: mpsc::Sender<EventMessage>,
    pub(crate) control_tx: mpsc::Sender<ControlMessage>,
    pub(crate) state_rx: watch::Receiver<State>,
    pub(crate) outcomes: Arc<Mutex<mpsc::Receiver<Outcome>>>,
    pub(crate) warnings: Arc<[ConfigWarning]>,
    pub(crate) handlers: Arc<[(State, Event)]>,
}

impl FsmHandle {
    /// Queues an event, waiting only for inbox capacity.
    pub async fn send_event(&self, kind: impl Into<Event>, args: Args) -> Result<(), FsmError> {
        self.event_tx
            .send(EventMessage::new(kind.into(), args))
            .await
            .map_err(|_| stopped("send_event"))
    }

    /// Queues an event without waiting.
    pub fn try_send_event(&self, kind: impl Into<Event>, args: Args) -> Result<(), FsmError> {
        self.event_tx
            .try_send(EventMessage::new(kind.into(), args))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => FsmError::Full,
                mpsc::error::TrySendError::Closed(_) => stopped("try_send_event"),
            })
    }

    /// Sends a control request and waits for the answer.
    ///
    /// The answer comes after every event queued before the request has
    /// been dispatched, which makes this the synchronization barrier of the
    /// instance.
    pub async fn send_sync_request(&self, request: Request) -> Result<Response, FsmError> {
        let (reply, response) = oneshot::channel();
        self.control_tx
            .send(ControlMessage { request, reply })
            .await
            .map_err(|_| stopped("send_sync_request"))?;
        response.await.map_err(|_| stopped("send_sync_request"))
    }

    /// Waits until every event queued so far has been dispatched.
    pub async fn wait(&self) -> Result<(), FsmError> {
        self.send_sync_request(Request::Noop).await.map(drop)
    }

    /// Stops the instance after dispatching the events already queued.
    ///
    /// Every later call on any clone of this handle fails with
    /// [`FsmError::Stopped`].
    pub async fn stop(&self) -> Result<(), FsmError> {
        self.shutdown(ShutdownMode::Graceful).await
    }

    /// Stops the instance, dropping queued events undispatched.
    pub async fn stop_immediate(&self) -> Result<(), FsmError> {
        self.shutdown(ShutdownMode::Immediate).await
    }

    async fn shutdown(&self, mode: ShutdownMode) -> Result<(), FsmError> {
        match self.send_sync_request(Request::Stop(mode)).await? {
            Response::Stopped => Ok(()),
            _ => Err(stopped("stop")),
        }
    }

    /// The last committed state. May lag behind events still in flight.
    pub fn current_state(&self) -> State {
        self.state_rx.borrow().clone()
    }

    /// The committed state after every queued event has been dispatched.
    pub async fn current_state_exact(&self) -> Result<State, FsmError> {
        match self.send_sync_request(Request::CurrentState).await? {
            Response::State(state) => Ok(state),
            _ => Err(stopped("current_state_exact")),
        }
    }

    /// Waits for the instance to reach `target`.
    pub async fn wait_for_state(&self, target: impl Into<State>) -> Result<(), FsmError> {
        let target = target.into();
        let mut rx = self.state_rx.clone();
        while *rx.borrow_and_update() != target {
            rx.changed().await.map_err(|_| stopped("wait_for_state"))?;
        }
        Ok(())
    }

    /// Waits for the next dispatch outcome. Returns `None` once the instance
    /// has stopped and every outcome has been read.
    pub async fn next_outcome(&self) -> Option<Outcome> {
        self.outcomes.lock().await.recv().await
    }

    /// Takes the next dispatch outcome if one is ready.
    ///
    /// All clones share one outbox. While another clone is parked in
    /// [`next_outcome`](Self::next_outcome) this returns `None` even if
    /// outcomes are queued; the parked reader receives them instead.
    pub fn try_next_outcome(&self) -> Option<Outcome> {
        self.outcomes.try_lock().ok()?.try_recv().ok()
    }

    /// Problems found while building the handler table.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Every registered `(State, Event)` pair, sorted.
    pub fn handlers(&self) -> &[(State, Event)] {
        &self.handlers
    }

    pub fn is_stopped(&self) -> bool {
        self.event_tx.is_closed()
    }
}

fn stopped(operation: &'static str) -> FsmError {
    tracing::error!(operation, "fsm used after stop");
    FsmError::Stopped { operation }
}

/// The background task running an instance.
///
/// Resolves to the behavior once the instance has stopped. Dropping it
/// detaches the task; it does not stop the instance.
#[must_use = "dropping the task detaches it; await it to get the behavior back"]
pub struct FsmTask<B> {
    pub(crate) handle: JoinHandle<B>,
}

impl<B> Future for FsmTask<B> {
    type Output = Result<B, FsmError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map_err(FsmError::Join)
    }
}
