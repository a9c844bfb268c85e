//! Handle configuration from a JSON file and environment variables.
//!
//! ## Environment Variables
//!
//! - `GBLAS_CONFIG`: path to a JSON file holding a [`HandleConfig`]
//! - `GBLAS_LAYER`: logging layer bitmask (1 trace, 2 bench, 4 profile)
//! - `GBLAS_CHECK_NUMERICS`: check-numerics bitmask (1 info, 2 warn, 4 fail)
//! - `GBLAS_DEVICE_MEMORY_SIZE`: workspace limit in bytes
//!
//! Variables override values loaded from the file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::status::{BlasError, BlasResult};
use crate::types::{AtomicsMode, CheckNumericsMode, LayerMode, PointerMode};

pub const ENV_CONFIG: &str = "GBLAS_CONFIG";
pub const ENV_LAYER: &str = "GBLAS_LAYER";
pub const ENV_CHECK_NUMERICS: &str = "GBLAS_CHECK_NUMERICS";
pub const ENV_DEVICE_MEMORY_SIZE: &str = "GBLAS_DEVICE_MEMORY_SIZE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    pub layer_mode: LayerMode,
    pub check_numerics: CheckNumericsMode,
    pub pointer_mode: PointerMode,
    pub atomics_mode: AtomicsMode,
    /// Upper bound on the workspace one call may request. Workspace held by
    /// earlier queued calls is not counted.
    pub device_memory_limit: Option<usize>,
}

impl HandleConfig {
    /// Load from `GBLAS_CONFIG` (if set) and overlay the environment.
    ///
    /// Unreadable files and malformed values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = match std::env::var(ENV_CONFIG) {
            Ok(path) => match Self::from_json_file(Path::new(&path)) {
                Ok(cfg) => {
                    log::info!("loaded handle config from {path}");
                    cfg
                }
                Err(e) => {
                    log::warn!("ignoring {ENV_CONFIG}={path}: {e}");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_json_file(path: &Path) -> BlasResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BlasError::InvalidValue(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> BlasResult<Self> {
        serde_json::from_str(content).map_err(|e| BlasError::InvalidValue(format!("handle config: {e}")))
    }

    /// Overlay values from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bits) = parse_var::<u32>(&lookup, ENV_LAYER) {
            self.layer_mode = LayerMode::from_bits(bits);
        }
        if let Some(bits) = parse_var::<u32>(&lookup, ENV_CHECK_NUMERICS) {
            self.check_numerics = CheckNumericsMode::from_bits(bits);
        }
        if let Some(bytes) = parse_var::<usize>(&lookup, ENV_DEVICE_MEMORY_SIZE) {
            self.device_memory_limit = Some(bytes);
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok().and_then(|v| v.to_string().parse().ok()),
        None => trimmed.parse().ok(),
    };
    if parsed.is_none() {
        log::warn!("ignoring malformed {key}={raw}");
    }
    parsed
}
