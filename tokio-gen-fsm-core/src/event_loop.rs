//! The per-instance event loop.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};

use crate::behavior::Behavior;
use crate::error::{DispatchError, Dispatched, InvocationError, Outcome};
use crate::table::HandlerTable;
use crate::timer::TimeoutManager;
use crate::types::{Args, Event, ShutdownMode, State};

/// An event queued for dispatch.
#[derive(Debug)]
pub(crate) struct EventMessage {
    pub(crate) kind: Event,
    pub(crate) args: Args,
    /// Arm generation, set only on synthesized timeouts.
    pub(crate) timer: Option<u64>,
}

impl EventMessage {
    pub(crate) fn new(kind: Event, args: Args) -> Self {
        Self {
            kind,
            args,
            timer: None,
        }
    }

    pub(crate) fn timeout(generation: u64) -> Self {
        Self {
            kind: Event::TIMEOUT,
            args: Args::new(),
            timer: Some(generation),
        }
    }
}

/// Synchronous requests answered by the event loop outside the handler
/// table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Barrier: answered once every previously queued event is processed.
    Noop,
    /// Shut the instance down.
    Stop(ShutdownMode),
    /// Read the committed state through the loop itself.
    CurrentState,
    /// Any other named request. Always answered with [`Response::NotFound`].
    Custom(String),
}

/// Answers to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Noop,
    Stopped,
    State(State),
    NotFound,
}

#[derive(Debug)]
pub(crate) struct ControlMessage {
    pub(crate) request: Request,
    pub(crate) reply: oneshot::Sender<Response>,
}

/// Runs one instance. Owns the behavior, the current state and the timer.
///
/// Control requests take priority over events, but every event already
/// queued when a request is picked up is dispatched before it is answered.
/// That keeps [`Request::Noop`] a barrier for everything sent before it.
pub(crate) struct EventLoop<B: Behavior> {
    behavior: B,
    table: HandlerTable<B>,
    state: State,
    timer: TimeoutManager,
    events: mpsc::Receiver<EventMessage>,
    control: mpsc::Receiver<ControlMessage>,
    state_tx: watch::Sender<State>,
    outcomes: mpsc::Sender<Outcome>,
}

pub(crate) struct Channels {
    pub(crate) events: mpsc::Receiver<EventMessage>,
    pub(crate) timer_inbox: mpsc::WeakSender<EventMessage>,
    pub(crate) control: mpsc::Receiver<ControlMessage>,
    pub(crate) state_tx: watch::Sender<State>,
    pub(crate) outcomes: mpsc::Sender<Outcome>,
}

impl<B: Behavior> EventLoop<B> {
    pub(crate) fn new(behavior: B, table: HandlerTable<B>, state: State, channels: Channels) -> Self {
        Self {
            behavior,
            table,
            state,
            timer: TimeoutManager::new(channels.timer_inbox),
            events: channels.events,
            control: channels.control,
            state_tx: channels.state_tx,
            outcomes: channels.outcomes,
        }
    }

    /// Processes work until stopped or until every handle is dropped, then
    /// hands the behavior back.
    pub(crate) async fn run(mut self) -> B {
        tracing::debug!(state = %self.state, "fsm started");
        loop {
            tokio::select! {
                biased;
                Some(message) = self.control.recv() => {
                    if self.handle_control(message).await.is_break() {
                        break;
                    }
                }
                Some(message) = self.events.recv() => {
                    self.dispatch(message).await;
                }
                else => break,
            }
        }
        self.timer.cancel();
        tracing::debug!(state = %self.state, "fsm stopped");
        self.behavior
    }

    async fn handle_control(&mut self, message: ControlMessage) -> ControlFlow<()> {
        let ControlMessage { request, reply } = message;
        tracing::trace!(?request, "control request");

        let response = match request {
            Request::Stop(mode) => {
                self.shutdown(mode).await;
                let _ = reply.send(Response::Stopped);
                return ControlFlow::Break(());
            }
            Request::Noop => {
                self.drain().await;
                Response::Noop
            }
            Request::CurrentState => {
                self.drain().await;
                Response::State(self.state.clone())
            }
            Request::Custom(name) => {
                self.drain().await;
                tracing::debug!(request = %name, "unknown control request");
                Response::NotFound
            }
        };

        // The caller may have given up waiting.
        let _ = reply.send(response);
        ControlFlow::Continue(())
    }

    /// Dispatches the events sitting in the inbox when the request was
    /// taken. Events sent after that wait for the next turn of the loop, so a
    /// busy producer cannot hold the answer back.
    async fn drain(&mut self) {
        let pending = self.events.len();
        for _ in 0..pending {
            let Ok(message) = self.events.try_recv() else {
                break;
            };
            self.dispatch(message).await;
        }
    }

    async fn shutdown(&mut self, mode: ShutdownMode) {
        self.events.close();
        self.control.close();
        match mode {
            ShutdownMode::Graceful => {
                while let Some(message) = self.events.recv().await {
                    self.dispatch(message).await;
                }
            }
            ShutdownMode::Immediate => {
                let mut dropped = 0usize;
                while self.events.try_recv().is_ok() {
                    dropped += 1;
                }
                if dropped > 0 {
                    tracing::debug!(dropped, "discarded queued events on immediate stop");
                }
            }
        }
        self.timer.cancel();

        while let Ok(pending) = self.control.try_recv() {
            drop(pending);
        }
    }

    async fn dispatch(&mut self, message: EventMessage) {
        let EventMessage { kind, args, timer } = message;

        if let Some(generation) = timer {
            if !self.timer.is_current(generation) {
                tracing::debug!(generation, state = %self.state, "discarding stale timeout");
                return;
            }
        }
        self.timer.cancel();

        let outcome = self.invoke(kind, args).await;
        match &outcome {
            Ok(dispatched) => tracing::debug!(
                event = %dispatched.event,
                from = %dispatched.from,
                to = %dispatched.to,
                handler = %dispatched.handler,
                "dispatched event"
            ),
            Err(error) => tracing::warn!(%error, "dispatch failed"),
        }
        self.report(outcome);
    }

    async fn invoke(&mut self, event: Event, args: Args) -> Outcome {
        let Some(entry) = self.table.lookup(&self.state, &event) else {
            return Err(DispatchError::Resolution {
                state: self.state.clone(),
                event,
            });
        };
        let invoker = entry.invoker;
        let handler = entry.name.clone();

        let result = AssertUnwindSafe(invoker(&mut self.behavior, args))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(InvocationError::Panicked(panic_message(&*panic))));

        let transition = match result {
            Ok(transition) => transition,
            Err(source) => {
                return Err(DispatchError::Invocation {
                    state: self.state.clone(),
                    event,
                    handler,
                    source,
                });
            }
        };

        let (to, timeout) = transition.into_parts();
        let from = std::mem::replace(&mut self.state, to.clone());
        self.state_tx.send_replace(to.clone());
        if let Some(after) = timeout {
            self.timer.arm(after);
        }

        Ok(Dispatched {
            event,
            from,
            to,
            timeout,
            handler,
        })
    }

    /// Posts an outcome without ever waiting on the reader.
    fn report(&self, outcome: Outcome) {
        if let Err(mpsc::error::TrySendError::Full(outcome)) = self.outcomes.try_send(outcome) {
            tracing::trace!(?outcome, "outcome outbox full, dropping");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::args;
    use crate::behavior::{HandlerFuture, Operation, ReturnShape};
    use crate::resolver::DelimiterResolver;
    use crate::types::Transition;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    impl Behavior for Counter {
        fn initialize(&mut self, _: Args) -> Result<State, InvocationError> {
            Ok(State::from("Idle"))
        }

        fn operations() -> Vec<Operation<Self>> {
            Vec::new()
        }
    }

    fn idle_go<'a>(counter: &'a mut Counter, mut args: Args) -> HandlerFuture<'a> {
        Box::pin(async move {
            args.expect_len(1)?;
            let step: u32 = args.take(0)?;
            counter.hits += step;
            Ok(Transition::to("Busy").with_timeout(Duration::from_millis(50)))
        })
    }

    fn busy_timeout<'a>(_: &'a mut Counter, _: Args) -> HandlerFuture<'a> {
        Box::pin(async { Ok(Transition::to("Idle")) })
    }

    fn idle_boom<'a>(counter: &'a mut Counter, _: Args) -> HandlerFuture<'a> {
        Box::pin(async move {
            counter.hits = counter.hits.checked_sub(1).expect("boom");
            Ok(Transition::to("Idle"))
        })
    }

    fn idle_hold<'a>(_: &'a mut Counter, mut args: Args) -> HandlerFuture<'a> {
        Box::pin(async move {
            args.expect_len(2)?;
            let entered: oneshot::Sender<()> = args.take(0)?;
            let gate: oneshot::Receiver<()> = args.take(1)?;
            let _ = entered.send(());
            let _ = gate.await;
            Ok(Transition::to("Idle"))
        })
    }

    struct Harness {
        events: mpsc::Sender<EventMessage>,
        control: mpsc::Sender<ControlMessage>,
        outcomes: mpsc::Receiver<Outcome>,
        state: watch::Receiver<State>,
        task: tokio::task::JoinHandle<Counter>,
    }

    impl Harness {
        fn spawn() -> Self {
            let table = HandlerTable::build(
                vec![
                    Operation::handler("Idle_Go", ReturnShape::StateAndDuration, idle_go),
                    Operation::handler("Busy_Timeout", ReturnShape::State, busy_timeout),
                    Operation::handler("Idle_Boom", ReturnShape::State, idle_boom),
                    Operation::handler("Idle_Hold", ReturnShape::State, idle_hold),
                ],
                &DelimiterResolver::default(),
            );
            let (events_tx, events) = mpsc::channel(16);
            let (control_tx, control) = mpsc::channel(4);
            let (outcomes_tx, outcomes) = mpsc::channel(16);
            let (state_tx, state) = watch::channel(State::from("Idle"));
            let channels = Channels {
                events,
                timer_inbox: events_tx.downgrade(),
                control,
                state_tx,
                outcomes: outcomes_tx,
            };
            let event_loop = EventLoop::new(Counter::default(), table, State::from("Idle"), channels);
            Self {
                events: events_tx,
                control: control_tx,
                outcomes,
                state,
                task: tokio::spawn(event_loop.run()),
            }
        }

        async fn send(&self, kind: &'static str, args: Args) {
            self.events
                .send(EventMessage::new(Event::from(kind), args))
                .await
                .unwrap();
        }

        async fn request(&self, request: Request) -> Response {
            let (reply, rx) = oneshot::channel();
            self.control
                .send(ControlMessage { request, reply })
                .await
                .unwrap();
            rx.await.unwrap()
        }
    }

    #[tokio::test]
    async fn barrier_follows_queued_events() {
        let mut harness = Harness::spawn();
        harness.send("Go", args![2u32]).await;

        assert_eq!(harness.request(Request::Noop).await, Response::Noop);
        assert_eq!(*harness.state.borrow(), "Busy");

        let outcome = harness.outcomes.recv().await.unwrap().unwrap();
        assert_eq!(outcome.from, "Idle");
        assert_eq!(outcome.to, "Busy");
        assert_eq!(outcome.timeout, Some(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn misses_and_bad_arguments_leave_state_alone() {
        let mut harness = Harness::spawn();
        harness.send("Nope", args![]).await;
        harness.send("Go", args![]).await;
        harness.send("Go", args!["two"]).await;

        assert_eq!(
            harness.request(Request::CurrentState).await,
            Response::State(State::from("Idle"))
        );
        assert!(matches!(
            harness.outcomes.recv().await.unwrap(),
            Err(DispatchError::Resolution { .. })
        ));
        assert!(matches!(
            harness.outcomes.recv().await.unwrap(),
            Err(DispatchError::Invocation {
                source: InvocationError::Arity { expected: 1, found: 0 },
                ..
            })
        ));
        assert!(matches!(
            harness.outcomes.recv().await.unwrap(),
            Err(DispatchError::Invocation {
                source: InvocationError::Type { index: 0, .. },
                ..
            })
        ));
        assert!(harness.outcomes.try_recv().is_err());
    }

    #[tokio::test]
    async fn panicking_handler_is_reported() {
        let mut harness = Harness::spawn();
        harness.send("Boom", args![]).await;
        harness.send("Go", args![1u32]).await;
        harness.request(Request::Noop).await;

        let Err(DispatchError::Invocation { source, handler, .. }) =
            harness.outcomes.recv().await.unwrap()
        else {
            panic!("expected an invocation error");
        };
        assert_eq!(handler, "Idle_Boom");
        assert_eq!(source, InvocationError::Panicked("boom".into()));
        assert!(harness.outcomes.recv().await.unwrap().is_ok());
        assert_eq!(*harness.state.borrow(), "Busy");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reenters_through_the_inbox() {
        let mut harness = Harness::spawn();
        harness.send("Go", args![1u32]).await;
        harness.request(Request::Noop).await;
        assert_eq!(*harness.state.borrow(), "Busy");

        tokio::time::sleep(Duration::from_millis(60)).await;
        harness.request(Request::Noop).await;
        assert_eq!(*harness.state.borrow(), "Idle");

        harness.outcomes.recv().await.unwrap().unwrap();
        let timeout = harness.outcomes.recv().await.unwrap().unwrap();
        assert_eq!(timeout.event, Event::TIMEOUT);
        assert_eq!(timeout.handler, "Busy_Timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_stop_drains_and_returns_the_behavior() {
        let harness = Harness::spawn();
        harness.send("Go", args![3u32]).await;
        harness.send("Go", args![4u32]).await;

        assert_eq!(
            harness.request(Request::Stop(ShutdownMode::Graceful)).await,
            Response::Stopped
        );
        assert!(harness.events.send(EventMessage::new(Event::from("Go"), args![1u32])).await.is_err());

        let counter = harness.task.await.unwrap();
        assert_eq!(counter.hits, 3);
    }

    #[tokio::test]
    async fn immediate_stop_discards_queued_events() {
        let harness = Harness::spawn();
        let (held, entered, gate) = hold();
        harness.send("Hold", held).await;
        harness.send("Go", args![3u32]).await;
        entered.await.unwrap();

        let (reply, stopped) = oneshot::channel();
        harness
            .control
            .send(ControlMessage {
                request: Request::Stop(ShutdownMode::Immediate),
                reply,
            })
            .await
            .unwrap();
        gate.send(()).unwrap();

        assert_eq!(stopped.await.unwrap(), Response::Stopped);
        let counter = harness.task.await.unwrap();
        assert_eq!(counter.hits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timeout_in_the_inbox_is_discarded() {
        let mut harness = Harness::spawn();
        harness.send("Go", args![1u32]).await;
        harness.send("Nope", args![]).await;
        harness
            .events
            .send(EventMessage::timeout(1))
            .await
            .unwrap();
        harness.request(Request::Noop).await;

        assert_eq!(*harness.state.borrow(), "Busy");
        assert!(harness.outcomes.recv().await.unwrap().is_ok());
        assert!(matches!(
            harness.outcomes.recv().await.unwrap(),
            Err(DispatchError::Resolution { .. })
        ));
        assert!(harness.outcomes.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        harness.request(Request::Noop).await;
        assert_eq!(*harness.state.borrow(), "Busy");
        assert!(harness.outcomes.try_recv().is_err());
    }

    fn hold() -> (Args, oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered) = oneshot::channel::<()>();
        let (gate, gate_rx) = oneshot::channel::<()>();
        (args![entered_tx, gate_rx], entered, gate)
    }

    #[tokio::test]
    async fn barrier_only_waits_for_events_queued_before_it() {
        let harness = Harness::spawn();

        let (first, entered, release_first) = hold();
        harness.send("Hold", first).await;
        entered.await.unwrap();

        let (reply, answered) = oneshot::channel();
        harness
            .control
            .send(ControlMessage {
                request: Request::Noop,
                reply,
            })
            .await
            .unwrap();
        let (queued, entered, release_queued) = hold();
        harness.send("Hold", queued).await;
        release_first.send(()).unwrap();
        entered.await.unwrap();

        // Sent while the barrier is draining; it must not delay the answer.
        let (late, _late_entered, _never_released) = hold();
        harness.send("Hold", late).await;
        release_queued.send(()).unwrap();

        let response = tokio::time::timeout(Duration::from_secs(1), answered)
            .await
            .expect("barrier answered")
            .unwrap();
        assert_eq!(response, Response::Noop);
    }

    #[tokio::test]
    async fn unknown_requests_get_not_found() {
        let harness = Harness::spawn();
        assert_eq!(
            harness.request(Request::Custom("Invalid_Req".into())).await,
            Response::NotFound
        );
    }
}
