//! The handler capability and scoped installation of handlers.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use tracing::debug;

use super::message::Message;
use super::runtime::{self, SharedMessenger};
use crate::error::PplResult;

/// An effect handler.
///
/// Both hooks default to no-ops. A handler becomes active by entering a
/// [`HandlerScope`], either explicitly or through [`Messenger::run`].
pub trait Messenger: 'static {
    /// Called on the way in, innermost handler first. Setting `msg.stop`
    /// hides the message from every handler entered before this one.
    fn process_message(&mut self, _msg: &mut Message) -> PplResult<()> {
        Ok(())
    }

    /// Called after the value is resolved, outermost reached handler first
    fn postprocess_message(&mut self, _msg: &mut Message) -> PplResult<()> {
        Ok(())
    }

    /// Called when the handler is pushed onto the stack
    fn on_enter(&mut self) {}

    /// Called when the handler is popped from the stack
    fn on_exit(&mut self) {}

    /// Push this handler for the lifetime of the returned scope
    fn enter(self) -> HandlerScope<Self>
    where
        Self: Sized,
    {
        HandlerScope::enter(self)
    }

    /// Run `f` with this handler active and hand the handler back.
    ///
    /// The handler is popped even if `f` panics.
    fn run<R>(self, f: impl FnOnce() -> R) -> (Self, R)
    where
        Self: Sized,
    {
        let scope = HandlerScope::enter(self);
        let result = f();
        (scope.exit(), result)
    }
}

/// An active handler.
///
/// The handler is on the stack from [`HandlerScope::enter`] until
/// [`HandlerScope::exit`] or drop, whichever comes first; dropping covers
/// early returns and unwinding. Scopes must be exited in reverse order of
/// entry.
pub struct HandlerScope<H: Messenger> {
    handler: Option<Rc<RefCell<H>>>,
    shared: Option<SharedMessenger>,
}

impl<H: Messenger> HandlerScope<H> {
    /// Push `handler` onto this thread's handler stack
    pub fn enter(mut handler: H) -> Self {
        handler.on_enter();
        let handler = Rc::new(RefCell::new(handler));
        let shared: SharedMessenger = handler.clone();
        runtime::push(shared.clone());
        debug!(
            handler = std::any::type_name::<H>(),
            depth = runtime::stack_depth(),
            "entered handler scope"
        );
        Self {
            handler: Some(handler),
            shared: Some(shared),
        }
    }

    /// Borrow the handler while it is active
    pub fn handler(&self) -> Ref<'_, H> {
        match &self.handler {
            Some(handler) => handler.borrow(),
            None => unreachable!("handler is only taken on exit"),
        }
    }

    /// Mutably borrow the handler while it is active
    pub fn handler_mut(&self) -> RefMut<'_, H> {
        match &self.handler {
            Some(handler) => handler.borrow_mut(),
            None => unreachable!("handler is only taken on exit"),
        }
    }

    /// Pop the handler and return it.
    ///
    /// # Panics
    ///
    /// Panics if another handler entered after this one is still active.
    pub fn exit(mut self) -> H {
        self.release();
        let handler = self.handler.take();
        match handler.map(Rc::try_unwrap) {
            Some(Ok(cell)) => cell.into_inner(),
            _ => unreachable!("no reference to a handler outlives its scope"),
        }
    }

    fn release(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        runtime::pop(&shared);
        shared.borrow_mut().on_exit();
        debug!(
            handler = std::any::type_name::<H>(),
            depth = runtime::stack_depth(),
            "exited handler scope"
        );
    }
}

impl<H: Messenger> Drop for HandlerScope<H> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Run `f` with `handler` active, returning the handler and the result
pub fn handle<H: Messenger, R>(handler: H, f: impl FnOnce() -> R) -> (H, R) {
    handler.run(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poutine::runtime::stack_depth;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[derive(Default)]
    struct Counter {
        entered: usize,
        exited: usize,
    }

    impl Messenger for Counter {
        fn on_enter(&mut self) {
            self.entered += 1;
        }

        fn on_exit(&mut self) {
            self.exited += 1;
        }
    }

    #[test]
    fn test_stack_balance() {
        let before = stack_depth();
        let (counter, value) = Counter::default().run(|| {
            assert_eq!(stack_depth(), before + 1);
            42
        });
        assert_eq!(value, 42);
        assert_eq!(stack_depth(), before);
        assert_eq!(counter.entered, 1);
        assert_eq!(counter.exited, 1);
    }

    #[test]
    fn test_drop_pops_scope() {
        {
            let _scope = Counter::default().enter();
            assert_eq!(stack_depth(), 1);
        }
        assert_eq!(stack_depth(), 0);
    }

    #[test]
    fn test_scope_exits_on_panic() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            handle(Counter::default(), || panic!("model failure"))
        }));
        assert!(result.is_err());
        assert_eq!(stack_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "handler stack corrupted")]
    fn test_out_of_order_exit_is_fatal() {
        let outer = Counter::default().enter();
        let inner = Counter::default().enter();
        // exiting the outer scope while the inner one is still on top
        let _ = outer.exit();
        drop(inner);
    }

    #[test]
    fn test_handler_access_inside_scope() {
        let scope = Counter::default().enter();
        assert_eq!(scope.handler().entered, 1);
        scope.handler_mut().entered = 5;
        let counter = scope.exit();
        assert_eq!(counter.entered, 5);
    }
}
