//! # minippl
//!
//! A minimal probabilistic programming core built on effect handlers.
//!
//! Models are ordinary Rust functions that call two primitives:
//! [`sample`](primitives::sample) for random variables and
//! [`param`](primitives::param) for learnable parameters. What those calls
//! do is decided by the stack of active handlers: recording a trace,
//! replaying values, hiding sites, broadcasting over a plate. Stochastic
//! variational inference is built from these pieces.
//!
//! ## Core Concepts
//!
//! - **Handlers**: scoped interpreters of primitive calls (see [`poutine`])
//! - **Parameter store**: named parameters kept in unconstrained space
//! - **SVI**: gradient steps on the negative ELBO of a model and a guide
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use minippl::prelude::*;
//!
//! fn model(data: &f64) -> PplResult<()> {
//!     let z = sample("z", Normal::new(0.0, 1.0)?, None)?;
//!     sample("y", Normal::new(z, 1.0)?, Some(Tensor::scalar(*data)))?;
//!     Ok(())
//! }
//!
//! fn guide(_: &f64) -> PplResult<()> {
//!     let loc = param("loc", Some(Tensor::scalar(0.0)), Constraint::Real)?;
//!     let scale = param("scale", Some(Tensor::scalar(1.0)), Constraint::Positive)?;
//!     sample("z", Normal::new(loc, scale)?, None)?;
//!     Ok(())
//! }
//!
//! let mut svi = Svi::new(model, guide, Adam::new(AdamConfig::new(0.05))?, TraceElbo);
//! let result = svi.fit(&2.0, &MaxSteps::new(1000))?;
//! ```

pub mod distributions;
pub mod error;
pub mod infer;
pub mod optim;
pub mod params;
pub mod poutine;
pub mod primitives;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::distributions::prelude::*;
    pub use crate::error::*;
    pub use crate::infer::prelude::*;
    pub use crate::optim::prelude::*;
    pub use crate::params::prelude::*;
    pub use crate::poutine::prelude::*;
    pub use crate::primitives::{param, plate, sample, sample_dyn, set_rng_seed};
    pub use crate::tensor::{no_grad, Tensor};
}
