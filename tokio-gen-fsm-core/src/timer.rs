//! Per-instance state timeout.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event_loop::EventMessage;

struct Armed {
    generation: u64,
    task: JoinHandle<()>,
}

/// Owns at most one pending timeout for an instance.
///
/// An expired timer enqueues [`Event::TIMEOUT`] into the instance's own
/// event inbox, tagged with the generation it was armed with. The inbox is
/// held through a weak sender so a pending timer never keeps a dropped
/// instance alive.
///
/// [`Event::TIMEOUT`]: crate::Event::TIMEOUT
pub(crate) struct TimeoutManager {
    inbox: mpsc::WeakSender<EventMessage>,
    armed: Option<Armed>,
    generation: u64,
}

impl TimeoutManager {
    pub(crate) fn new(inbox: mpsc::WeakSender<EventMessage>) -> Self {
        Self {
            inbox,
            armed: None,
            generation: 0,
        }
    }

    /// Schedules a timeout event after `after`, replacing any pending one.
    pub(crate) fn arm(&mut self, after: Duration) {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let inbox = self.inbox.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let Some(inbox) = inbox.upgrade() else {
                return;
            };
            if inbox.send(EventMessage::timeout(generation)).await.is_err() {
                tracing::trace!(generation, "timeout fired after the inbox closed");
            }
        });

        tracing::debug!(generation, ?after, "armed state timeout");
        self.armed = Some(Armed { generation, task });
    }

    /// Drops the pending timeout, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
        }
    }

    /// Whether a timeout tagged `generation` belongs to the live arm.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.armed
            .as_ref()
            .is_some_and(|armed| armed.generation == generation)
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for TimeoutManager {
    fn drop(&mut self) {
        self.cancel();
    }
}
