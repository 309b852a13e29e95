//! The per-instance handler table.

use std::collections::HashMap;

use crate::behavior::{Invoker, Operation};
use crate::error::ConfigWarning;
use crate::resolver::Resolver;
use crate::types::{Event, State};

/// A handler bound to one event within one state.
pub struct HandlerEntry<B> {
    pub event: Event,
    pub name: String,
    pub invoker: Invoker<B>,
}

/// Immutable `State -> [(Event, handler)]` map, built once at start.
pub struct HandlerTable<B> {
    handlers: HashMap<State, Vec<HandlerEntry<B>>>,
    warnings: Vec<ConfigWarning>,
}

impl<B> HandlerTable<B> {
    /// Runs every operation through `resolver` once and keeps the handlers.
    ///
    /// Problems are collected as warnings; the first registration of a pair
    /// wins.
    pub fn build(operations: Vec<Operation<B>>, resolver: &dyn Resolver) -> Self {
        let mut handlers: HashMap<State, Vec<HandlerEntry<B>>> = HashMap::new();
        let mut warnings = Vec::new();

        for operation in operations {
            let name = operation.signature.name.to_string();
            let Some((state, event)) = resolver.resolve(&operation.signature) else {
                if operation.signature.returns.is_transition() && resolver.is_ambiguous(&name) {
                    warnings.push(ConfigWarning::Ambiguous { name });
                }
                continue;
            };
            let Some(invoker) = operation.invoker else {
                warnings.push(ConfigWarning::NotInvocable { name });
                continue;
            };

            let entries = handlers.entry(state.clone()).or_default();
            if entries.iter().any(|entry| entry.event == event) {
                warnings.push(ConfigWarning::Duplicate { state, event, name });
                continue;
            }
            tracing::debug!(handler = %name, %state, %event, "registered handler");
            entries.push(HandlerEntry {
                event,
                name,
                invoker,
            });
        }

        for warning in &warnings {
            tracing::warn!(%warning, "handler table configuration");
        }

        Self { handlers, warnings }
    }

    /// Finds the handler for `event` in `state`, falling back to the generic
    /// `(State::ANY, Event::ANY)` handler when one is registered.
    pub fn lookup(&self, state: &State, event: &Event) -> Option<&HandlerEntry<B>> {
        self.find(state, event)
            .or_else(|| self.find(&State::ANY, &Event::ANY))
    }

    fn find(&self, state: &State, event: &Event) -> Option<&HandlerEntry<B>> {
        self.handlers
            .get(state)?
            .iter()
            .find(|entry| entry.event == *event)
    }

    /// Handlers registered for `state`, in registration order.
    pub fn entries(&self, state: &State) -> &[HandlerEntry<B>] {
        self.handlers.get(state).map_or(&[], Vec::as_slice)
    }

    /// Every registered pair.
    pub fn pairs(&self) -> Vec<(State, Event)> {
        let mut pairs: Vec<_> = self
            .handlers
            .iter()
            .flat_map(|(state, entries)| {
                entries
                    .iter()
                    .map(move |entry| (state.clone(), entry.event.clone()))
            })
            .collect();
        pairs.sort();
        pairs
    }

    pub fn state_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }
}
