//! The behavior contract and its operation descriptors.

use std::borrow::Cow;
use std::fmt;

use futures::future::BoxFuture;

use crate::error::InvocationError;
use crate::types::{Args, State, Transition};

/// Future returned by a type-erased handler invocation.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<Transition, InvocationError>>;

/// Type-erased call into one behavior method.
///
/// The invoker checks and unpacks the [`Args`] before calling the method, so
/// an [`InvocationError`] always means the method body never ran.
pub type Invoker<B> = for<'a> fn(&'a mut B, Args) -> HandlerFuture<'a>;

/// What an operation returns, as far as handler resolution cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// Returns nothing.
    Unit,
    /// Returns a `State`.
    State,
    /// Returns `(State, Duration)` or `(State, Option<Duration>)`.
    StateAndDuration,
    /// Anything else.
    Other,
}

impl ReturnShape {
    /// Whether this shape is acceptable for a transition handler.
    #[must_use]
    pub fn is_transition(self) -> bool {
        matches!(self, Self::State | Self::StateAndDuration)
    }
}

/// Name and return shape of an operation, the input to a [`Resolver`].
///
/// [`Resolver`]: crate::Resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: Cow<'static, str>,
    pub returns: ReturnShape,
}

impl Signature {
    pub fn new(name: impl Into<Cow<'static, str>>, returns: ReturnShape) -> Self {
        Self {
            name: name.into(),
            returns,
        }
    }
}

/// One operation exposed by a behavior.
pub struct Operation<B> {
    pub signature: Signature,
    pub invoker: Option<Invoker<B>>,
}

impl<B> Operation<B> {
    /// An operation that can be dispatched to.
    pub fn handler(
        name: impl Into<Cow<'static, str>>,
        returns: ReturnShape,
        invoker: Invoker<B>,
    ) -> Self {
        Self {
            signature: Signature::new(name, returns),
            invoker: Some(invoker),
        }
    }

    /// An operation listed for resolution only, with no way to call it.
    pub fn opaque(name: impl Into<Cow<'static, str>>, returns: ReturnShape) -> Self {
        Self {
            signature: Signature::new(name, returns),
            invoker: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }
}

impl<B> fmt::Debug for Operation<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("signature", &self.signature)
            .field("invocable", &self.invoker.is_some())
            .finish()
    }
}

/// A user-supplied state machine.
///
/// Usually implemented by the `#[behavior]` attribute from an `impl` block
/// holding an `init` method and `State_Event` transition methods. A manual
/// implementation lists its transitions through [`Operation::handler`].
///
/// The behavior is moved into the instance's event loop and only ever
/// touched from there, so it needs no internal synchronization.
pub trait Behavior: Send + Sized + 'static {
    /// Consumes the start arguments and returns the initial state.
    fn initialize(&mut self, args: Args) -> Result<State, InvocationError>;

    /// Every operation the behavior exposes, in declaration order.
    fn operations() -> Vec<Operation<Self>>;
}
