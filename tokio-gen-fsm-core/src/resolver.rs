//! Classification of operations into `(State, Event)` handlers.

use std::borrow::Cow;

use crate::behavior::Signature;
use crate::types::{Event, State};

/// Decides which operations are transition handlers.
///
/// Implementations must be pure: the same signature always resolves the
/// same way, and a name never yields more than one `(State, Event)` pair.
pub trait Resolver: Send + Sync {
    /// Returns the pair an operation handles, or `None` if it is not a
    /// handler.
    fn resolve(&self, signature: &Signature) -> Option<(State, Event)>;

    /// Whether `name` was rejected only because it could be split in more
    /// than one way. Used to surface a configuration warning; only asked
    /// about operations with a transition return shape.
    fn is_ambiguous(&self, _name: &str) -> bool {
        false
    }
}

/// Resolves names of the form `State<delimiter>Event`.
///
/// The state part must start with an ASCII uppercase letter, both parts
/// must be non-empty and ASCII alphanumeric, and the delimiter must occur
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterResolver {
    delimiter: Cow<'static, str>,
}

impl DelimiterResolver {
    pub const DEFAULT_DELIMITER: &'static str = "_";

    /// # Panics
    ///
    /// Panics if `delimiter` is empty.
    pub fn new(delimiter: impl Into<Cow<'static, str>>) -> Self {
        let delimiter = delimiter.into();
        assert!(!delimiter.is_empty(), "handler name delimiter must not be empty");
        Self { delimiter }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    fn split<'n>(&self, name: &'n str) -> Option<(&'n str, &'n str)> {
        if name.matches(self.delimiter.as_ref()).count() != 1 {
            return None;
        }
        let (state, event) = name.split_once(self.delimiter.as_ref())?;
        let starts_upper = state.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if !starts_upper || !is_tag(state) || !is_tag(event) {
            return None;
        }
        Some((state, event))
    }
}

impl Default for DelimiterResolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELIMITER)
    }
}

fn is_tag(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric())
}

impl Resolver for DelimiterResolver {
    fn resolve(&self, signature: &Signature) -> Option<(State, Event)> {
        if !signature.returns.is_transition() {
            return None;
        }
        let (state, event) = self.split(&signature.name)?;
        Some((State::new(state.to_owned()), Event::new(event.to_owned())))
    }

    fn is_ambiguous(&self, name: &str) -> bool {
        name.starts_with(|c: char| c.is_ascii_uppercase())
            && name.matches(self.delimiter.as_ref()).count() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::ReturnShape;

    fn resolve(name: &'static str, returns: ReturnShape) -> Option<(State, Event)> {
        DelimiterResolver::default().resolve(&Signature::new(name, returns))
    }

    #[test]
    fn resolves_state_event_names() {
        for (name, state, event) in [
            ("State_Event", "State", "Event"),
            (
                "StateWithMoreWords_EventWithMoreWords",
                "StateWithMoreWords",
                "EventWithMoreWords",
            ),
            ("State_eventWithLowerCase", "State", "eventWithLowerCase"),
            ("Open_Timeout", "Open", "Timeout"),
            ("Step2_Tick", "Step2", "Tick"),
        ] {
            assert_eq!(
                resolve(name, ReturnShape::State),
                Some((State::from(state), Event::from(event))),
                "{name}"
            );
        }
    }

    #[test]
    fn rejects_other_names() {
        for name in [
            "State_Ev_ent",
            "State#Event",
            "state_Event",
            "StateEvent",
            "State_",
            "_Event",
            "State_Ev#ent",
            "init",
        ] {
            assert_eq!(resolve(name, ReturnShape::State), None, "{name}");
        }
    }

    #[test]
    fn rejects_non_transition_returns() {
        assert!(resolve("Locked_Button", ReturnShape::StateAndDuration).is_some());
        assert_eq!(resolve("Locked_Button", ReturnShape::Unit), None);
        assert_eq!(resolve("Locked_Button", ReturnShape::Other), None);
    }

    #[test]
    fn custom_delimiter() {
        let resolver = DelimiterResolver::new("__");
        let sig = Signature::new("Locked__Button", ReturnShape::State);
        assert_eq!(
            resolver.resolve(&sig),
            Some((State::from("Locked"), Event::from("Button")))
        );
        let sig = Signature::new("Locked_Button", ReturnShape::State);
        assert_eq!(resolver.resolve(&sig), None);
    }

    #[test]
    fn flags_ambiguous_names() {
        let resolver = DelimiterResolver::default();
        assert!(resolver.is_ambiguous("State_Ev_ent"));
        assert!(!resolver.is_ambiguous("State_Event"));
        assert!(!resolver.is_ambiguous("some_helper_fn"));
    }
}
