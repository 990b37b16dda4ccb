//! Parameter store snapshots

use serde::{Deserialize, Serialize};

use crate::distributions::Constraint;

/// Current snapshot format version
pub const PARAM_STATE_VERSION: u32 = 1;

/// One saved parameter, in constrained form
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    /// Parameter name
    pub name: String,
    /// Tensor shape
    pub shape: Vec<usize>,
    /// Constrained values, row-major
    pub values: Vec<f64>,
    /// Domain of the parameter
    pub constraint: Constraint,
}

/// Versioned snapshot of a parameter store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamStoreState {
    /// Schema version for forward compatibility
    pub version: u32,
    /// Parameters in creation order
    pub params: Vec<ParamRecord>,
}

impl ParamStoreState {
    /// Create an empty snapshot at the current version
    pub fn new() -> Self {
        Self {
            version: PARAM_STATE_VERSION,
            params: Vec::new(),
        }
    }

    /// Check if the snapshot can be read by this version
    pub fn is_compatible(&self) -> bool {
        self.version <= PARAM_STATE_VERSION
    }

    /// Saved record of a parameter
    pub fn get(&self, name: &str) -> Option<&ParamRecord> {
        self.params.iter().find(|record| record.name == name)
    }
}

impl Default for ParamStoreState {
    fn default() -> Self {
        Self::new()
    }
}
