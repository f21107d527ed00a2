//! Mapping model identifiers to ggml files on disk.

use crate::error::{Result, ScribeError};
use std::fs;
use std::path::{Path, PathBuf};

/// Short names that refer to a specific release.
const ALIASES: &[(&str, &str)] = &[("large", "large-v3"), ("turbo", "large-v3-turbo")];

/// Suffix of 8-bit quantized model files.
const INT8_SUFFIX: &str = "-q8_0";

/// Get the default directory where models are stored.
///
/// Uses `~/.local/share/mediascribe/models/` on Linux.
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("mediascribe")
        .join("models")
}

/// Expand an alias such as `large` to the concrete model name.
pub fn resolve_name(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, target)| *target)
        .unwrap_or(name)
}

/// Resolve `model` to a model file.
///
/// `model` is either a path to an existing file or a name looked up as
/// `<models_dir>/ggml-<name>.bin`. For `int8` precision a quantized
/// `ggml-<name>-q8_0.bin` is preferred when installed.
pub fn resolve_model_path(models_dir: &Path, model: &str, compute_type: &str) -> Result<PathBuf> {
    let direct = Path::new(model);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    let name = resolve_name(model);
    let mut candidates = Vec::with_capacity(2);
    if compute_type == "int8" {
        candidates.push(models_dir.join(format!("ggml-{name}{INT8_SUFFIX}.bin")));
    }
    candidates.push(models_dir.join(format!("ggml-{name}.bin")));

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| ScribeError::ModelNotFound {
            model: model.to_string(),
            searched: models_dir.display().to_string(),
        })
}

/// List installed model names by scanning `models_dir`.
///
/// Discovers every `ggml-*.bin` file and returns names with the prefix and
/// suffix stripped, sorted.
pub fn list_installed_models(models_dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(models_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            let name = name.to_str()?;
            let model = name.strip_prefix("ggml-")?.strip_suffix(".bin")?;
            if entry.path().is_file() {
                Some(model.to_string())
            } else {
                None
            }
        })
        .collect();

    names.sort();
    names
}
