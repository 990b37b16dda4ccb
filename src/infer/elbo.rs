//! The evidence lower bound

use std::rc::Rc;

use crate::error::PplResult;
use crate::poutine::{Messenger, ReplayMessenger, TraceMessenger};
use crate::tensor::Tensor;

/// A model or guide: a function of its arguments that calls primitives.
///
/// Implemented for every `Fn(&A) -> PplResult<R>`, so plain functions and
/// closures can be used directly.
pub trait Model<A: ?Sized> {
    /// Value returned by the model
    type Output;

    /// Run the model once
    fn call(&self, args: &A) -> PplResult<Self::Output>;
}

impl<A: ?Sized, R, F> Model<A> for F
where
    F: Fn(&A) -> PplResult<R>,
{
    type Output = R;

    fn call(&self, args: &A) -> PplResult<R> {
        self(args)
    }
}

/// A differentiable training objective built from a model and a guide
pub trait Loss<A: ?Sized> {
    /// Scalar loss to minimize
    fn loss<M, G>(&self, model: &M, guide: &G, args: &A) -> PplResult<Tensor>
    where
        M: Model<A>,
        G: Model<A>;
}

/// Single-sample trace estimator of the negative ELBO
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceElbo;

impl<A: ?Sized> Loss<A> for TraceElbo {
    fn loss<M, G>(&self, model: &M, guide: &G, args: &A) -> PplResult<Tensor>
    where
        M: Model<A>,
        G: Model<A>,
    {
        elbo(model, guide, args)
    }
}

/// Negative ELBO of one joint draw from the guide.
///
/// The guide is traced first; the model is then traced while replaying the
/// guide's values, so each sample site shared by both is scored under the
/// model at the value the guide drew. The result is
/// `-(log p(model sites) - log q(guide sites))`, differentiable with respect
/// to every parameter either program used.
pub fn elbo<A, M, G>(model: &M, guide: &G, args: &A) -> PplResult<Tensor>
where
    A: ?Sized,
    M: Model<A>,
    G: Model<A>,
{
    let guide_trace = Rc::new(TraceMessenger::new().get_trace(|| guide.call(args))?);
    let model_trace = TraceMessenger::new().get_trace(|| {
        ReplayMessenger::new(guide_trace.clone())
            .run(|| model.call(args))
            .1
    })?;

    let elbo = model_trace
        .log_prob_sum()?
        .sub(&guide_trace.log_prob_sum()?)?;
    Ok(elbo.neg())
}
