//! The handler stack and the dispatch protocol
//!
//! The stack is thread-local: each thread runs its own interpreter. It is
//! only mutated through [`HandlerScope`](super::HandlerScope), which pushes
//! on entry and pops on exit after checking that the top of the stack is
//! the handler it pushed.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use super::message::{Message, SiteFn};
use super::messenger::Messenger;
use crate::error::PplResult;
use crate::params;
use crate::primitives::with_rng;
use crate::tensor::Tensor;

/// A messenger as held by the handler stack
pub type SharedMessenger = Rc<RefCell<dyn Messenger>>;

thread_local! {
    static HANDLER_STACK: RefCell<Vec<SharedMessenger>> = const { RefCell::new(Vec::new()) };
}

/// Number of handlers currently active on this thread
pub fn stack_depth() -> usize {
    HANDLER_STACK.with(|stack| stack.borrow().len())
}

/// Whether any handler is active on this thread
pub fn handlers_active() -> bool {
    stack_depth() > 0
}

fn same_messenger(a: &SharedMessenger, b: &SharedMessenger) -> bool {
    std::ptr::eq(Rc::as_ptr(a).cast::<()>(), Rc::as_ptr(b).cast::<()>())
}

pub(crate) fn push(handler: SharedMessenger) {
    HANDLER_STACK.with(|stack| stack.borrow_mut().push(handler));
}

/// Pop `handler`, which must be the most recently pushed handler.
///
/// # Panics
///
/// Panics if the top of the stack is not `handler`: the stack is corrupted
/// and nothing that runs afterwards could be trusted.
pub(crate) fn pop(handler: &SharedMessenger) {
    HANDLER_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack.last() {
            Some(top) if same_messenger(top, handler) => {
                stack.pop();
            }
            Some(_) => panic!("handler stack corrupted: exiting handler is not on top of the stack"),
            None => panic!("handler stack corrupted: exiting a handler with an empty stack"),
        }
    });
}

/// Thread `msg` through the active handlers.
///
/// `process_message` hooks run from the innermost handler outward and stop
/// at the first handler that sets `msg.stop`. If no handler supplied a
/// value, the site's descriptor is evaluated. `postprocess_message` hooks
/// then run from the outermost *reached* handler inward: handlers skipped by
/// a stop see neither phase.
///
/// A hook may itself call `sample` or `param`. The nested dispatch skips
/// every handler whose hook is still running.
pub fn apply_stack(msg: &mut Message) -> PplResult<()> {
    let stack: Vec<SharedMessenger> = HANDLER_STACK.with(|stack| stack.borrow().clone());

    let mut reached = 0;
    for handler in stack.iter().rev() {
        reached += 1;
        let Ok(mut handler) = handler.try_borrow_mut() else {
            trace!(site = %msg.name, "skipping busy handler");
            continue;
        };
        handler.process_message(msg)?;
        if msg.stop {
            break;
        }
    }

    if msg.value.is_none() {
        msg.value = Some(evaluate_site(&msg.site_fn)?);
    }
    trace!(site = %msg.name, kind = ?msg.kind(), reached, stop = msg.stop, "dispatched");

    for handler in &stack[stack.len() - reached..] {
        if let Ok(mut handler) = handler.try_borrow_mut() {
            handler.postprocess_message(msg)?;
        }
    }
    Ok(())
}

/// Evaluate a site descriptor directly: draw from the distribution or
/// resolve the parameter
pub fn evaluate_site(site_fn: &SiteFn) -> PplResult<Tensor> {
    match site_fn {
        SiteFn::Sample(dist) => with_rng(|rng| dist.sample(rng)),
        SiteFn::Param(spec) => params::resolve_param(spec),
    }
}
