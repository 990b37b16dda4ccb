//! Selectively hiding sites from outer handlers
//!
//! Sites hidden by a [`BlockMessenger`] are only seen by the handlers entered
//! after it, which allows effectful computations to be nested inside others
//! without leaking their sites outward.

use std::collections::HashSet;
use std::fmt;

use super::message::{Message, SiteKind};
use super::messenger::Messenger;
use crate::error::PplResult;

/// Predicate deciding whether a message is hidden
pub type HideFn = Box<dyn Fn(&Message) -> bool>;

/// Stops every message matching its predicate
pub struct BlockMessenger {
    hide_fn: HideFn,
}

impl BlockMessenger {
    /// Hide every site
    pub fn new() -> Self {
        Self::with_hide_fn(|_| true)
    }

    /// Hide the sites for which `hide_fn` returns true
    pub fn with_hide_fn(hide_fn: impl Fn(&Message) -> bool + 'static) -> Self {
        Self {
            hide_fn: Box::new(hide_fn),
        }
    }

    /// Hide all sites of the given kinds
    pub fn hide_types(kinds: &[SiteKind]) -> Self {
        let kinds: Vec<SiteKind> = kinds.to_vec();
        Self::with_hide_fn(move |msg| kinds.contains(&msg.kind()))
    }

    /// Hide exactly the named sites
    pub fn hide<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        Self::with_hide_fn(move |msg| names.contains(&msg.name))
    }

    /// Hide every site except the named ones
    pub fn expose<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        Self::with_hide_fn(move |msg| !names.contains(&msg.name))
    }
}

impl Default for BlockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BlockMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockMessenger").finish_non_exhaustive()
    }
}

impl Messenger for BlockMessenger {
    fn process_message(&mut self, msg: &mut Message) -> PplResult<()> {
        if (self.hide_fn)(msg) {
            msg.stop = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{Constraint, Normal};
    use crate::poutine::TraceMessenger;
    use crate::primitives::{param, sample};
    use crate::tensor::Tensor;

    fn model() -> PplResult<Tensor> {
        let loc = param("loc", Some(Tensor::scalar(0.0)), Constraint::Real)?;
        sample("x", Normal::new(loc, 1.0)?, None)
    }

    #[test]
    fn test_block_hides_everything_by_default() {
        let trace = TraceMessenger::new()
            .get_trace(|| BlockMessenger::new().run(model).1)
            .unwrap();
        assert!(trace.is_empty());
    }

    #[test]
    fn test_block_scoping() {
        // trace(block(trace(model), hide samples)): the inner trace sees
        // everything, the outer one only the parameter
        let outer = TraceMessenger::new().enter();
        let block = BlockMessenger::hide_types(&[SiteKind::Sample]).enter();
        let inner = TraceMessenger::new().enter();
        model().unwrap();
        let inner = inner.exit().into_trace();
        drop(block);
        let outer = outer.exit().into_trace();

        assert!(inner.contains("x"));
        assert!(inner.contains("loc"));
        assert_eq!(outer.sample_sites().count(), 0);
        assert!(outer.contains("loc"));
    }

    #[test]
    fn test_hide_and_expose_by_name() {
        let trace = TraceMessenger::new()
            .get_trace(|| BlockMessenger::hide(["x"]).run(model).1)
            .unwrap();
        assert_eq!(trace.names().collect::<Vec<_>>(), vec!["loc"]);

        let trace = TraceMessenger::new()
            .get_trace(|| BlockMessenger::expose(["x"]).run(model).1)
            .unwrap();
        assert_eq!(trace.names().collect::<Vec<_>>(), vec!["x"]);
    }
}
