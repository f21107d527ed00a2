//! Whisper model management.

pub mod resolve;

pub use resolve::{default_models_dir, list_installed_models, resolve_model_path};
