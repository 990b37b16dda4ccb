//! Effectful primitives
//!
//! [`sample`] and [`param`] are the only operations that talk to the handler
//! stack. With no handler active they evaluate directly, which gives the
//! same observable result as dispatching through an empty stack.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::distributions::{Constraint, Distribution};
use crate::error::PplResult;
use crate::params;
use crate::poutine::{apply_stack, handlers_active, Message, ParamSpec, PlateMessenger};
use crate::tensor::Tensor;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

/// Reseed this thread's random number generator
pub fn set_rng_seed(seed: u64) {
    RNG.with(|rng| *rng.borrow_mut() = StdRng::seed_from_u64(seed));
}

/// Run `f` with this thread's random number generator
pub fn with_rng<R>(f: impl FnOnce(&mut StdRng) -> R) -> R {
    RNG.with(|rng| f(&mut rng.borrow_mut()))
}

/// Draw a named random variable from `dist`, or observe it when `obs` is
/// given
pub fn sample(name: &str, dist: impl Distribution + 'static, obs: Option<Tensor>) -> PplResult<Tensor> {
    sample_dyn(name, Rc::new(dist), obs)
}

/// [`sample`] for an already shared distribution
pub fn sample_dyn(name: &str, dist: Rc<dyn Distribution>, obs: Option<Tensor>) -> PplResult<Tensor> {
    if !handlers_active() {
        return match obs {
            Some(value) => Ok(value),
            None => with_rng(|rng| dist.sample(rng)),
        };
    }

    let mut msg = Message::sample(name, dist, obs);
    apply_stack(&mut msg)?;
    Ok(resolved(msg))
}

/// Look up or create a learnable parameter.
///
/// The first reference to `name` must supply `init_value`, a point in the
/// constrained space. Later references return the stored value and ignore
/// both arguments.
pub fn param(name: &str, init_value: Option<Tensor>, constraint: Constraint) -> PplResult<Tensor> {
    let spec = ParamSpec {
        name: name.to_string(),
        init_value,
        constraint,
    };
    if !handlers_active() {
        return params::resolve_param(&spec);
    }

    let mut msg = Message::param(spec);
    apply_stack(&mut msg)?;
    Ok(resolved(msg))
}

/// A plate of `size` conditionally independent copies along `dim`.
///
/// ```rust,ignore
/// let (_, x) = plate("data", 100, -1)?.run(|| sample("x", Normal::new(0.0, 1.0)?, None));
/// ```
pub fn plate(name: &str, size: usize, dim: isize) -> PplResult<PlateMessenger> {
    PlateMessenger::new(name, size, dim)
}

fn resolved(msg: Message) -> Tensor {
    match msg.value {
        Some(value) => value,
        None => unreachable!("apply_stack always resolves a value"),
    }
}
