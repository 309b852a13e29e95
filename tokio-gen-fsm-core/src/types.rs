//! State and event tags, event arguments and transitions.

use std::any::{Any, type_name};
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::time::Duration;

use crate::error::InvocationError;

macro_rules! tag {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Cow<'static, str>);

        impl $name {
            /// Creates a tag from a static string, usable in `const` items.
            #[must_use]
            pub const fn from_static(tag: &'static str) -> Self {
                Self(Cow::Borrowed(tag))
            }

            /// Creates a tag from any string.
            #[must_use]
            pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
                Self(tag.into())
            }

            /// Returns the tag text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&'static str> for $name {
            fn from(tag: &'static str) -> Self {
                Self::from_static(tag)
            }
        }

        impl From<String> for $name {
            fn from(tag: String) -> Self {
                Self(Cow::Owned(tag))
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

tag! {
    /// Opaque tag naming one node of a behavior's state machine.
    ///
    /// States are compared only by equality. Handlers return them to
    /// commit a transition.
    State
}

tag! {
    /// Opaque tag naming a stimulus sent to a running instance.
    Event
}

impl State {
    /// State half of the generic fallback handler (`Any_Any`).
    pub const ANY: State = State::from_static("Any");
}

impl Event {
    /// Event synthesized when an armed state timeout expires.
    pub const TIMEOUT: Event = Event::from_static("Timeout");

    /// Event half of the generic fallback handler (`Any_Any`).
    pub const ANY: Event = Event::from_static("Any");
}

/// A single type-erased event argument.
pub struct Arg {
    value: Option<Box<dyn Any + Send>>,
    type_name: &'static str,
}

impl Arg {
    /// Wraps a value.
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the wrapped value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(_) => write!(f, "<{}>", self.type_name),
            None => write!(f, "<{} taken>", self.type_name),
        }
    }
}

/// Ordered, untyped argument list carried by an event.
///
/// Handlers pull their parameters out positionally with [`Args::take`]
/// after checking the arity with [`Args::expect_len`]. Both report an
/// [`InvocationError`] instead of panicking, so a badly shaped event never
/// reaches the handler body.
#[derive(Debug, Default)]
pub struct Args {
    values: Vec<Arg>,
}

impl Args {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value and returns the list, for chaining.
    #[must_use]
    pub fn with<T: Any + Send>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Appends a value.
    pub fn push<T: Any + Send>(&mut self, value: T) {
        self.values.push(Arg::new(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Type names of the arguments, in order.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(Arg::type_name)
    }

    /// Fails unless exactly `expected` arguments were supplied.
    pub fn expect_len(&self, expected: usize) -> Result<(), InvocationError> {
        if self.values.len() == expected {
            Ok(())
        } else {
            Err(InvocationError::Arity {
                expected,
                found: self.values.len(),
            })
        }
    }

    /// Moves the argument at `index` out as a `T`.
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T, InvocationError> {
        let arg = self.values.get_mut(index).ok_or(InvocationError::Missing { index })?;
        let value = arg.value.take().ok_or(InvocationError::Missing { index })?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => {
                let found = arg.type_name;
                arg.value = Some(value);
                Err(InvocationError::Type {
                    index,
                    expected: type_name::<T>(),
                    found,
                })
            }
        }
    }
}

impl From<Vec<Arg>> for Args {
    fn from(values: Vec<Arg>) -> Self {
        Self { values }
    }
}

impl FromIterator<Arg> for Args {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Builds an [`Args`] list from a comma-separated list of values.
///
/// ```rust
/// # use tokio_gen_fsm_core::args;
/// let args = args![100, true, String::from("SomeString")];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Args::from(vec![$($crate::Arg::new($value)),+])
    };
}

/// The state a handler moves to, and the timeout to arm on arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    state: State,
    timeout: Option<Duration>,
}

impl Transition {
    /// Creates a transition to `state` that arms no timeout.
    #[must_use]
    pub fn to(state: impl Into<State>) -> Self {
        Self {
            state: state.into(),
            timeout: None,
        }
    }

    /// Arms a timeout that fires [`Event::TIMEOUT`] after `after`.
    #[must_use]
    pub fn with_timeout(mut self, after: Duration) -> Self {
        self.timeout = Some(after);
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Splits the transition into its target state and timeout.
    #[must_use]
    pub fn into_parts(self) -> (State, Option<Duration>) {
        (self.state, self.timeout)
    }
}

/// Conversion from a handler's return value into a [`Transition`].
pub trait IntoTransition {
    fn into_transition(self) -> Transition;
}

impl IntoTransition for Transition {
    fn into_transition(self) -> Transition {
        self
    }
}

impl IntoTransition for State {
    fn into_transition(self) -> Transition {
        Transition::to(self)
    }
}

impl IntoTransition for (State, Duration) {
    fn into_transition(self) -> Transition {
        Transition::to(self.0).with_timeout(self.1)
    }
}

/// `None` arms nothing.
impl IntoTransition for (State, Option<Duration>) {
    fn into_transition(self) -> Transition {
        Transition {
            state: self.0,
            timeout: self.1,
        }
    }
}

/// Shutdown mode for a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Dispatch every event already queued before stopping.
    Graceful,
    /// Stop right away, dropping queued events undispatched.
    Immediate,
}
