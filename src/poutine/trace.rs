//! Recording execution traces
//!
//! A [`TraceMessenger`] records a snapshot of every message it sees after all
//! other effects have been applied, which is why it works in
//! `postprocess_message` rather than `process_message`.

use std::collections::HashMap;

use super::message::{Message, SiteKind};
use super::messenger::Messenger;
use crate::error::{PplError, PplResult};
use crate::tensor::Tensor;

/// Ordered record of the sites of one execution, keyed by site name
#[derive(Clone, Debug, Default)]
pub struct Trace {
    sites: Vec<Message>,
    index: HashMap<String, usize>,
}

impl Trace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a site; site names must be unique within a trace
    pub fn insert(&mut self, msg: Message) -> PplResult<()> {
        if self.index.contains_key(&msg.name) {
            return Err(PplError::DuplicateSite(msg.name));
        }
        self.index.insert(msg.name.clone(), self.sites.len());
        self.sites.push(msg);
        Ok(())
    }

    /// Site with the given name
    pub fn get(&self, name: &str) -> Option<&Message> {
        self.index.get(name).map(|&i| &self.sites[i])
    }

    /// Recorded value of the named site
    pub fn value(&self, name: &str) -> Option<&Tensor> {
        self.get(name).and_then(|site| site.value.as_ref())
    }

    /// Whether a site with the given name was recorded
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of recorded sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether no site was recorded
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Sites in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.sites.iter()
    }

    /// Site names in execution order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|site| site.name.as_str())
    }

    /// Sites of one kind, in execution order
    pub fn sites_of_kind(&self, kind: SiteKind) -> impl Iterator<Item = &Message> {
        self.sites.iter().filter(move |site| site.kind() == kind)
    }

    /// `sample` sites, in execution order
    pub fn sample_sites(&self) -> impl Iterator<Item = &Message> {
        self.sites_of_kind(SiteKind::Sample)
    }

    /// `param` sites, in execution order
    pub fn param_sites(&self) -> impl Iterator<Item = &Message> {
        self.sites_of_kind(SiteKind::Param)
    }

    /// Sum of `log_prob(value)` over all `sample` sites
    pub fn log_prob_sum(&self) -> PplResult<Tensor> {
        let mut total = Tensor::scalar(0.0);
        for site in self.sample_sites() {
            if let Some(lp) = site.log_prob_sum() {
                total = total.add(&lp?)?;
            }
        }
        Ok(total)
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.sites.iter()
    }
}

/// Records every site it sees into a [`Trace`]
#[derive(Debug, Default)]
pub struct TraceMessenger {
    trace: Trace,
}

impl TraceMessenger {
    /// Create a trace handler
    pub fn new() -> Self {
        Self::default()
    }

    /// The trace recorded so far
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Consume the handler, keeping its trace
    pub fn into_trace(self) -> Trace {
        self.trace
    }

    /// Run `f` under this handler and return the recorded trace
    pub fn get_trace<R>(self, f: impl FnOnce() -> PplResult<R>) -> PplResult<Trace> {
        let (handler, result) = self.run(f);
        result?;
        Ok(handler.trace)
    }
}

impl Messenger for TraceMessenger {
    fn on_enter(&mut self) {
        self.trace = Trace::new();
    }

    fn postprocess_message(&mut self, msg: &mut Message) -> PplResult<()> {
        self.trace.insert(msg.clone())
    }
}
