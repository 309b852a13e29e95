//! Configuration and startup.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};

use crate::behavior::Behavior;
use crate::error::FsmError;
use crate::event_loop::{Channels, EventLoop};
use crate::handle::{FsmHandle, FsmTask};
use crate::resolver::{DelimiterResolver, Resolver};
use crate::table::HandlerTable;
use crate::types::Args;

/// Channel sizes of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsmConfig {
    /// Capacity of the event inbox (default: 100).
    pub event_capacity: usize,
    /// Capacity of the control inbox (default: 16).
    pub control_capacity: usize,
    /// Capacity of the outcome outbox (default: 64). Outcomes that do not
    /// fit are dropped.
    pub outcome_capacity: usize,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            event_capacity: 100,
            control_capacity: 16,
            outcome_capacity: 64,
        }
    }
}

/// Starts instances with a non-default configuration or resolver.
pub struct FsmBuilder {
    config: FsmConfig,
    resolver: Arc<dyn Resolver>,
}

impl Default for FsmBuilder {
    fn default() -> Self {
        Self {
            config: FsmConfig::default(),
            resolver: Arc::new(DelimiterResolver::default()),
        }
    }
}

impl FsmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: FsmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn control_capacity(mut self, capacity: usize) -> Self {
        self.config.control_capacity = capacity;
        self
    }

    pub fn outcome_capacity(mut self, capacity: usize) -> Self {
        self.config.outcome_capacity = capacity;
        self
    }

    /// Replaces the default `State_Event` name resolver.
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Initializes `behavior`, builds its handler table and spawns its
    /// event loop on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, or if a capacity is zero.
    pub fn start<B: Behavior>(
        self,
        mut behavior: B,
        args: Args,
    ) -> Result<(FsmHandle, FsmTask<B>), FsmError> {
        let state = behavior.initialize(args).map_err(FsmError::Init)?;
        let table = HandlerTable::build(B::operations(), self.resolver.as_ref());
        tracing::debug!(
            %state,
            handlers = table.len(),
            warnings = table.warnings().len(),
            "starting fsm"
        );

        let (event_tx, events) = mpsc::channel(self.config.event_capacity);
        let (control_tx, control) = mpsc::channel(self.config.control_capacity);
        let (outcomes_tx, outcomes) = mpsc::channel(self.config.outcome_capacity);
        let (state_tx, state_rx) = watch::channel(state.clone());

        let handle = FsmHandle {
            control_tx,
            state_rx,
            outcomes: Arc::new(Mutex::new(outcomes)),
            warnings: table.warnings().into(),
            handlers: table.pairs().into(),
            event_tx: event_tx.clone(),
        };
        let channels = Channels {
            events,
            timer_inbox: event_tx.downgrade(),
            control,
            state_tx,
            outcomes: outcomes_tx,
        };

        let event_loop = EventLoop::new(behavior, table, state, channels);
        let task = FsmTask {
            handle: tokio::spawn(event_loop.run()),
        };
        Ok((handle, task))
    }
}

/// Starts `behavior` with the default configuration.
///
/// Shorthand for `FsmBuilder::new().start(behavior, args)`.
pub fn start<B: Behavior>(behavior: B, args: Args) -> Result<(FsmHandle, FsmTask<B>), FsmError> {
    FsmBuilder::new().start(behavior, args)
}
