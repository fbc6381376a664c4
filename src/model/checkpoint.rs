//! Checkpoint reading and introspection.
//!
//! Checkpoints are flat mappings from parameter name to tensor, stored
//! either as safetensors or as a serialized `PyTorch` state dict.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use candle_core::{DType, Device, Tensor};

use crate::error::{Error, Result};

/// A named-tensor mapping as read from a checkpoint file.
pub type TensorMap = HashMap<String, Tensor>;

/// Container prefixes some training setups wrap parameter names in.
/// Stripped only when every name in the checkpoint carries the prefix.
const CONTAINER_PREFIXES: &[&str] = &["state_dict.", "model_state_dict.", "module."];

/// Read a checkpoint into a named-tensor mapping.
///
/// The format is selected by file extension: `.safetensors` for
/// safetensors files, `.pt`/`.pth` for `PyTorch` checkpoints. Tensors are
/// converted to `f32` and placed on `device`; container prefixes are
/// stripped from the names.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or has an
/// unrecognized extension.
pub fn read<P: AsRef<Path>>(path: P, device: &Device) -> Result<TensorMap> {
    let path = path.as_ref();
    let read_err = |source| Error::CheckpointRead {
        path: path.to_path_buf(),
        source,
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let tensors: Vec<(String, Tensor)> = match extension.as_str() {
        "safetensors" => candle_core::safetensors::load(path, device)
            .map_err(read_err)?
            .into_iter()
            .collect(),
        "pt" | "pth" => candle_core::pickle::read_all(path).map_err(read_err)?,
        _ => {
            return Err(Error::UnsupportedCheckpoint {
                path: path.to_path_buf(),
                extension,
            })
        }
    };

    let mut map = TensorMap::with_capacity(tensors.len());
    for (name, tensor) in tensors {
        let tensor = tensor
            .to_dtype(DType::F32)
            .and_then(|t| t.to_device(device))
            .map_err(read_err)?;
        map.insert(name, tensor);
    }

    Ok(strip_container_prefixes(map))
}

/// Symmetric difference of two parameter-name sets.
///
/// Returns the names only in `a` and the names only in `b`, each sorted.
#[must_use]
pub fn diff(a: &[String], b: &[String]) -> (Vec<String>, Vec<String>) {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let mut only_in_a: Vec<String> = set_a
        .difference(&set_b)
        .map(|s| (*s).to_string())
        .collect();
    let mut only_in_b: Vec<String> = set_b
        .difference(&set_a)
        .map(|s| (*s).to_string())
        .collect();

    only_in_a.sort_unstable();
    only_in_b.sort_unstable();

    (only_in_a, only_in_b)
}

/// Check that a checkpoint provides exactly the expected parameter names.
///
/// # Errors
///
/// Returns an error listing the missing and unexpected names when the
/// sets differ.
pub fn verify_names(map: &TensorMap, expected: &[String]) -> Result<()> {
    let actual: Vec<String> = map.keys().cloned().collect();
    let (unexpected, missing) = diff(&actual, expected);

    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }

    Err(Error::CheckpointMismatch {
        missing,
        unexpected,
    })
}

/// Strip container prefixes shared by every name in the mapping.
///
/// Runs repeatedly so a `state_dict.`-wrapped checkpoint saved from a
/// `module.`-prefixed model unwraps fully.
fn strip_container_prefixes(mut map: TensorMap) -> TensorMap {
    loop {
        let Some(prefix) = CONTAINER_PREFIXES
            .iter()
            .find(|p| !map.is_empty() && map.keys().all(|k| k.starts_with(**p)))
        else {
            return map;
        };

        map = map
            .into_iter()
            .map(|(name, tensor)| (name[prefix.len()..].to_string(), tensor))
            .collect();
    }
}
