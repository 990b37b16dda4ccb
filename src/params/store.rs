//! The parameter store
//!
//! Parameters are stored in unconstrained form together with their
//! constraint. Each lookup hands out the constrained value, a differentiable
//! function of the stored leaf, and records a non-owning back-reference from
//! that value to its leaf so that inference can find what to optimize.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::{debug, trace};

use super::state::{ParamRecord, ParamStoreState};
use crate::distributions::{transform_to, Constraint};
use crate::error::{PplError, PplResult};
use crate::poutine::ParamSpec;
use crate::tensor::{Tensor, TensorId, WeakTensor};

thread_local! {
    static PARAM_STORE: RefCell<ParamStore> = RefCell::new(ParamStore::new());
}

/// Run `f` with this thread's parameter store
pub fn with_param_store<R>(f: impl FnOnce(&mut ParamStore) -> R) -> R {
    PARAM_STORE.with(|store| f(&mut store.borrow_mut()))
}

/// Remove every parameter from this thread's store
pub fn clear_param_store() {
    with_param_store(ParamStore::clear);
}

/// Resolve a `param` site against this thread's store
pub fn resolve_param(spec: &ParamSpec) -> PplResult<Tensor> {
    with_param_store(|store| store.resolve(spec))
}

/// Unconstrained leaf behind a constrained value handed out by the store
pub fn unconstrained_of(constrained: &Tensor) -> Option<Tensor> {
    with_param_store(|store| store.unconstrained_of(constrained))
}

#[derive(Clone, Debug)]
struct ParamEntry {
    unconstrained: Tensor,
    constraint: Constraint,
}

/// Named parameters in unconstrained form, in insertion order
#[derive(Debug, Default)]
pub struct ParamStore {
    order: Vec<String>,
    params: HashMap<String, ParamEntry>,
    back_refs: HashMap<TensorId, (WeakTensor, WeakTensor)>,
}

impl ParamStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `spec.name`, creating it from `spec.init_value` on first use,
    /// and return its constrained value.
    ///
    /// Once a name exists, the init value and constraint of later references
    /// are ignored.
    pub fn resolve(&mut self, spec: &ParamSpec) -> PplResult<Tensor> {
        let entry = match self.params.get(&spec.name) {
            Some(entry) => {
                if spec.init_value.is_some() {
                    trace!(param = %spec.name, "param already exists, ignoring init value");
                }
                entry.clone()
            }
            None => {
                let init = spec
                    .init_value
                    .as_ref()
                    .ok_or_else(|| PplError::MissingInitValue(spec.name.clone()))?;
                self.create(&spec.name, init, spec.constraint.clone())?
            }
        };

        let constrained = transform_to(&entry.constraint).forward(&entry.unconstrained)?;
        self.record_back_ref(&constrained, &entry.unconstrained);
        Ok(constrained)
    }

    fn create(&mut self, name: &str, init: &Tensor, constraint: Constraint) -> PplResult<ParamEntry> {
        if !constraint.check(init) {
            return Err(PplError::InvalidConfiguration(format!(
                "initial value of {name} lies outside {constraint:?}"
            )));
        }
        let unconstrained = transform_to(&constraint).inv(&init.detach());
        unconstrained.requires_grad_();
        let entry = ParamEntry {
            unconstrained,
            constraint,
        };
        self.order.push(name.to_string());
        self.params.insert(name.to_string(), entry.clone());
        debug!(param = name, shape = ?init.shape(), "created param");
        Ok(entry)
    }

    fn record_back_ref(&mut self, constrained: &Tensor, unconstrained: &Tensor) {
        self.back_refs
            .retain(|_, (weak, _)| weak.upgrade().is_some());
        self.back_refs.insert(
            constrained.id(),
            (constrained.downgrade(), unconstrained.downgrade()),
        );
    }

    /// Unconstrained leaf behind a constrained value handed out by
    /// [`ParamStore::resolve`]
    pub fn unconstrained_of(&self, constrained: &Tensor) -> Option<Tensor> {
        let (weak_constrained, weak_unconstrained) = self.back_refs.get(&constrained.id())?;
        let alive = weak_constrained.upgrade()?;
        if !alive.ptr_eq(constrained) {
            return None;
        }
        weak_unconstrained.upgrade()
    }

    /// Whether a parameter with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Constrained value of an existing parameter
    pub fn get_param(&mut self, name: &str) -> PplResult<Tensor> {
        let constraint = self
            .constraint(name)
            .cloned()
            .ok_or_else(|| PplError::UnknownParameter(name.to_string()))?;
        self.resolve(&ParamSpec {
            name: name.to_string(),
            init_value: None,
            constraint,
        })
    }

    /// Stored unconstrained leaf of a parameter
    pub fn unconstrained(&self, name: &str) -> Option<&Tensor> {
        self.params.get(name).map(|entry| &entry.unconstrained)
    }

    /// Constraint of a parameter
    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.params.get(name).map(|entry| &entry.constraint)
    }

    /// Parameter names in creation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Remove every parameter
    pub fn clear(&mut self) {
        self.order.clear();
        self.params.clear();
        self.back_refs.clear();
    }

    /// Remove one parameter, returning its unconstrained leaf
    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        let entry = self.params.remove(name)?;
        self.order.retain(|n| n != name);
        Some(entry.unconstrained)
    }

    /// Snapshot of every parameter's constrained value
    pub fn get_state(&self) -> PplResult<ParamStoreState> {
        let mut state = ParamStoreState::new();
        for name in &self.order {
            let entry = &self.params[name];
            let constrained = transform_to(&entry.constraint).forward(&entry.unconstrained.detach())?;
            state.params.push(ParamRecord {
                name: name.clone(),
                shape: constrained.shape().to_vec(),
                values: constrained.to_vec(),
                constraint: entry.constraint.clone(),
            });
        }
        Ok(state)
    }

    /// Replace the store's contents with a snapshot
    pub fn set_state(&mut self, state: &ParamStoreState) -> PplResult<()> {
        let mut restored = ParamStore::new();
        for record in &state.params {
            let value = Tensor::new(record.values.clone(), record.shape.clone())?;
            restored.create(&record.name, &value, record.constraint.clone())?;
        }
        *self = restored;
        Ok(())
    }
}
