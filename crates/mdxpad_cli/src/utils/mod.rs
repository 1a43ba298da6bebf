//! CLI utility functions

use std::path::Path;

use mdxpad_ast::{Object, Value};
use mdxpad_core::MdxpadConfig;
use miette::{IntoDiagnostic, Result};
use tokio::runtime::Runtime;
use tracing::debug;

/// Builds the single-threaded runtime every command runs on.
pub fn create_tokio_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// Loads the configuration file given with `--config`, or the one found in
/// the working directory, or the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<MdxpadConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            MdxpadConfig::discover(cwd)
        }
    };

    match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            MdxpadConfig::from_file(&path).into_diagnostic()
        }
        None => Ok(MdxpadConfig::default()),
    }
}

/// Converts the configured props into the runtime object model.
pub fn props_object(config: &MdxpadConfig) -> Object {
    config
        .props
        .iter()
        .map(|(key, value)| (key.clone(), Value::from(value.clone())))
        .collect()
}
