//! Learnable parameters
//!
//! The `param` primitive resolves names against a thread-local
//! [`ParamStore`]. Snapshots of the store can be taken, restored and saved
//! to disk.

mod persistence;
mod state;
mod store;

pub use persistence::{load_param_store, load_state, save_param_store, save_state, ParamFormat};
pub use state::{ParamRecord, ParamStoreState, PARAM_STATE_VERSION};
pub use store::{clear_param_store, resolve_param, unconstrained_of, with_param_store, ParamStore};

pub mod prelude {
    pub use super::{
        clear_param_store, load_param_store, save_param_store, with_param_store, ParamFormat,
        ParamStore,
    };
}
