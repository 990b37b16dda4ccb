//! Replaying recorded values
//!
//! Composing [`TraceMessenger`](super::TraceMessenger) with
//! [`ReplayMessenger`] replaces values while keeping each site's own
//! distribution, which is how the joint density of a guide's draws under a
//! model is computed.

use std::rc::Rc;

use super::message::Message;
use super::messenger::Messenger;
use super::trace::Trace;
use crate::error::PplResult;

/// Forces every site recorded in a reference trace to take its recorded value
#[derive(Clone, Debug)]
pub struct ReplayMessenger {
    guide_trace: Rc<Trace>,
}

impl ReplayMessenger {
    /// Replay values from `guide_trace`
    pub fn new(guide_trace: impl Into<Rc<Trace>>) -> Self {
        Self {
            guide_trace: guide_trace.into(),
        }
    }

    /// The reference trace
    pub fn guide_trace(&self) -> &Trace {
        &self.guide_trace
    }
}

impl Messenger for ReplayMessenger {
    fn process_message(&mut self, msg: &mut Message) -> PplResult<()> {
        if let Some(site) = self.guide_trace.get(&msg.name) {
            msg.value = site.value.clone();
        }
        Ok(())
    }
}
