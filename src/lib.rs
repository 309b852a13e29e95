//! # tokio-gen-fsm
//!
//! Erlang `gen_fsm` style state machine actors for Tokio.
//!
//! A behavior is a plain struct whose transition methods are named
//! `State_Event`. Each started behavior runs in its own Tokio task that
//! owns the behavior and its current state, dispatches every incoming event
//! to the method matching `(current state, event)`, commits the returned
//! state and arms the returned timeout, if any.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tokio_gen_fsm::{State, args, behavior};
//!
//! #[derive(Default)]
//! pub struct Door {
//!     code: String,
//!     entered: String,
//! }
//!
//! #[behavior]
//! impl Door {
//!     fn init(&mut self, code: String) -> State {
//!         self.code = code;
//!         State::from("Locked")
//!     }
//!
//!     fn Locked_Button(&mut self, digit: char) -> (State, Option<Duration>) {
//!         self.entered.push(digit);
//!         if self.entered == self.code {
//!             self.entered.clear();
//!             (State::from("Open"), Some(Duration::from_secs(1)))
//!         } else {
//!             (State::from("Locked"), None)
//!         }
//!     }
//!
//!     fn Open_Timeout(&mut self) -> State {
//!         State::from("Locked")
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tokio_gen_fsm::FsmError> {
//! let (fsm, _task) = tokio_gen_fsm::start(Door::default(), args![String::from("ok")])?;
//! fsm.send_event("Button", args!['o']).await?;
//! fsm.send_event("Button", args!['k']).await?;
//! fsm.wait().await?;
//! assert_eq!(fsm.current_state(), "Open");
//! fsm.stop().await?;
//! # Ok(())
//! # }
//! ```

#[doc(inline)]
pub use tokio_gen_fsm_core::*;
#[doc(inline)]
pub use tokio_gen_fsm_macros::*;
