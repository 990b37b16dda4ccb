//! Conditioning sample sites on data

use std::collections::HashMap;

use super::message::Message;
use super::messenger::Messenger;
use crate::error::PplResult;
use crate::tensor::Tensor;

/// Turns the named `sample` sites into observations
#[derive(Clone, Debug, Default)]
pub struct ConditionMessenger {
    data: HashMap<String, Tensor>,
}

impl ConditionMessenger {
    /// Condition on `data`, keyed by site name
    pub fn new(data: HashMap<String, Tensor>) -> Self {
        Self { data }
    }

    /// Add one observed value
    pub fn with_observation(mut self, name: impl Into<String>, value: impl Into<Tensor>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Observed values keyed by site name
    pub fn data(&self) -> &HashMap<String, Tensor> {
        &self.data
    }
}

impl Messenger for ConditionMessenger {
    fn process_message(&mut self, msg: &mut Message) -> PplResult<()> {
        if !msg.is_sample() {
            return Ok(());
        }
        if let Some(value) = self.data.get(&msg.name) {
            msg.value = Some(value.clone());
            msg.is_observed = true;
        }
        Ok(())
    }
}
