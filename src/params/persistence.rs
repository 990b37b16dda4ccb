//! Saving and loading parameter store snapshots
//!
//! Snapshots are written either as pretty JSON or as bincode preceded by a
//! version header and magic bytes. [`load_state`] detects the format.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use super::state::{ParamStoreState, PARAM_STATE_VERSION};
use super::store::with_param_store;
use crate::error::ParamStoreError;

const MAGIC: &[u8; 4] = b"MPPS";

/// Format for snapshot serialization
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParamFormat {
    /// JSON format (human-readable, larger)
    Json,
    /// Binary format (compact, fast)
    #[default]
    Binary,
}

/// Write a snapshot to a file
pub fn save_state(
    state: &ParamStoreState,
    path: impl AsRef<Path>,
    format: ParamFormat,
) -> Result<(), ParamStoreError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    match format {
        ParamFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, state)
                .map_err(|e| ParamStoreError::Serialization(e.to_string()))?;
        }
        ParamFormat::Binary => {
            writer.write_all(&PARAM_STATE_VERSION.to_le_bytes())?;
            writer.write_all(MAGIC)?;
            bincode::serialize_into(&mut writer, state)
                .map_err(|e| ParamStoreError::Serialization(e.to_string()))?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Read a snapshot from a file
pub fn load_state(path: impl AsRef<Path>) -> Result<ParamStoreState, ParamStoreError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ParamStoreError::NotFound(path.display().to_string()));
    }

    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

    let state: ParamStoreState = if bytes.len() >= 8 && &bytes[4..8] == MAGIC {
        let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if version > PARAM_STATE_VERSION {
            return Err(ParamStoreError::VersionMismatch {
                expected: PARAM_STATE_VERSION,
                found: version,
            });
        }
        bincode::deserialize(&bytes[8..])
            .map_err(|e| ParamStoreError::Deserialization(e.to_string()))?
    } else {
        serde_json::from_slice(&bytes).map_err(|e| ParamStoreError::Deserialization(e.to_string()))?
    };

    if !state.is_compatible() {
        return Err(ParamStoreError::VersionMismatch {
            expected: PARAM_STATE_VERSION,
            found: state.version,
        });
    }
    Ok(state)
}

/// Save this thread's parameter store
pub fn save_param_store(path: impl AsRef<Path>, format: ParamFormat) -> Result<(), ParamStoreError> {
    let state = with_param_store(|store| store.get_state())?;
    save_state(&state, path.as_ref(), format)?;
    debug!(path = %path.as_ref().display(), params = state.params.len(), "saved param store");
    Ok(())
}

/// Replace this thread's parameter store with a saved one
pub fn load_param_store(path: impl AsRef<Path>) -> Result<(), ParamStoreError> {
    let state = load_state(path.as_ref())?;
    with_param_store(|store| store.set_state(&state))?;
    debug!(path = %path.as_ref().display(), params = state.params.len(), "loaded param store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::Constraint;
    use crate::params::{clear_param_store, ParamRecord};
    use crate::primitives::param;
    use crate::tensor::Tensor;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn sample_state() -> ParamStoreState {
        let mut state = ParamStoreState::new();
        state.params.push(ParamRecord {
            name: "scale".to_string(),
            shape: vec![2],
            values: vec![0.5, 2.0],
            constraint: Constraint::Positive,
        });
        state
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.json");
        save_state(&sample_state(), &path, ParamFormat::Json).unwrap();
        assert_eq!(load_state(&path).unwrap(), sample_state());
    }

    #[test]
    fn test_save_load_binary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.bin");
        save_state(&sample_state(), &path, ParamFormat::Binary).unwrap();
        assert_eq!(load_state(&path).unwrap(), sample_state());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = load_state(dir.path().join("missing.bin"));
        assert!(matches!(result, Err(ParamStoreError::NotFound(_))));
    }

    #[test]
    fn test_newer_binary_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.bin");
        let mut bytes = (PARAM_STATE_VERSION + 1).to_le_bytes().to_vec();
        bytes.extend_from_slice(MAGIC);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            load_state(&path),
            Err(ParamStoreError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_param_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");

        clear_param_store();
        param("loc", Some(Tensor::scalar(1.25)), Constraint::Real).unwrap();
        param("scale", Some(Tensor::scalar(0.3)), Constraint::Positive).unwrap();
        save_param_store(&path, ParamFormat::Binary).unwrap();

        clear_param_store();
        load_param_store(&path).unwrap();

        let scale = param("scale", None, Constraint::Positive).unwrap();
        assert_relative_eq!(scale.item().unwrap(), 0.3, epsilon = 1e-12);
        let loc = param("loc", None, Constraint::Real).unwrap();
        assert_relative_eq!(loc.item().unwrap(), 1.25, epsilon = 1e-12);
    }
}
