//! Poutine-style effect handlers
//!
//! Every call to a primitive (`sample`, `param`) becomes a [`Message`] that
//! is threaded through the stack of active handlers by [`apply_stack`].
//! Handlers can observe, rewrite or hide messages.
//!
//! # Core Concepts
//!
//! - **Messenger**: a handler with optional pre- and post-hooks
//! - **Scope**: handlers are active between [`HandlerScope::enter`] and exit;
//!   scopes nest strictly
//! - **Stop**: a handler that sets `msg.stop` hides the message from every
//!   handler entered before it
//!
//! # Handlers
//!
//! - [`TraceMessenger`]: records every site into a [`Trace`]
//! - [`ReplayMessenger`]: reuses the values of a recorded trace
//! - [`BlockMessenger`]: hides sites from outer handlers
//! - [`PlateMessenger`]: broadcasts samples along a batch dimension
//! - [`ConditionMessenger`]: observes sites from a data map

mod block;
mod condition;
mod message;
mod messenger;
mod plate;
mod replay;
mod runtime;
mod trace;

pub use block::{BlockMessenger, HideFn};
pub use condition::ConditionMessenger;
pub use message::{Message, ParamSpec, SiteFn, SiteKind};
pub use messenger::{handle, HandlerScope, Messenger};
pub use plate::PlateMessenger;
pub use replay::ReplayMessenger;
pub use runtime::{apply_stack, evaluate_site, handlers_active, stack_depth, SharedMessenger};
pub use trace::{Trace, TraceMessenger};

pub mod prelude {
    pub use super::{
        handle, BlockMessenger, ConditionMessenger, HandlerScope, Messenger, PlateMessenger,
        ReplayMessenger, SiteKind, Trace, TraceMessenger,
    };
}
