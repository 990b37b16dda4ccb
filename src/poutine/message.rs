//! Messages describing one effectful operation in flight.

use std::rc::Rc;

use crate::distributions::{Constraint, Distribution};
use crate::error::PplResult;
use crate::tensor::Tensor;

/// Kind of primitive site
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SiteKind {
    /// A random variable drawn by `sample`
    Sample,
    /// A learnable parameter created by `param`
    Param,
}

/// Arguments of a `param` site: the name, optional initial (constrained)
/// value and the constraint of the parameter
#[derive(Clone, Debug)]
pub struct ParamSpec {
    /// Parameter name in the param store
    pub name: String,
    /// Initial constrained value, used only on first reference
    pub init_value: Option<Tensor>,
    /// Domain of the parameter
    pub constraint: Constraint,
}

/// How a site's value is produced when no handler provides one
#[derive(Clone, Debug)]
pub enum SiteFn {
    /// Draw from a distribution
    Sample(Rc<dyn Distribution>),
    /// Look up or create a parameter
    Param(ParamSpec),
}

/// One effectful operation as seen by the handler stack
#[derive(Clone, Debug)]
pub struct Message {
    /// Site name, unique within a trace
    pub name: String,
    /// Descriptor evaluated when no value is provided
    pub site_fn: SiteFn,
    /// Resolved value; set by observation, by a handler or by dispatch
    pub value: Option<Tensor>,
    /// Whether the value was supplied as an observation
    pub is_observed: bool,
    /// Once set, no outer handler sees this message
    pub stop: bool,
}

impl Message {
    /// Message for a `sample` site; observations pre-fill the value
    pub fn sample(name: impl Into<String>, dist: Rc<dyn Distribution>, obs: Option<Tensor>) -> Self {
        Self {
            name: name.into(),
            site_fn: SiteFn::Sample(dist),
            is_observed: obs.is_some(),
            value: obs,
            stop: false,
        }
    }

    /// Message for a `param` site
    pub fn param(spec: ParamSpec) -> Self {
        Self {
            name: spec.name.clone(),
            site_fn: SiteFn::Param(spec),
            value: None,
            is_observed: false,
            stop: false,
        }
    }

    /// Kind of site this message describes
    pub fn kind(&self) -> SiteKind {
        match self.site_fn {
            SiteFn::Sample(_) => SiteKind::Sample,
            SiteFn::Param(_) => SiteKind::Param,
        }
    }

    /// Whether this is a `sample` site
    pub fn is_sample(&self) -> bool {
        self.kind() == SiteKind::Sample
    }

    /// Whether this is a `param` site
    pub fn is_param(&self) -> bool {
        self.kind() == SiteKind::Param
    }

    /// Distribution of a `sample` site
    pub fn distribution(&self) -> Option<&Rc<dyn Distribution>> {
        match &self.site_fn {
            SiteFn::Sample(dist) => Some(dist),
            SiteFn::Param(_) => None,
        }
    }

    /// Summed log-density of the value of a `sample` site.
    ///
    /// Returns `None` for `param` sites and for sites without a value.
    pub fn log_prob_sum(&self) -> Option<PplResult<Tensor>> {
        let dist = self.distribution()?;
        let value = self.value.as_ref()?;
        Some(dist.log_prob(value).map(|lp| lp.sum()))
    }
}
