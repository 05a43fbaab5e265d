//! Environment-driven configuration
//!
//! # Environment Variables
//!
//! - `VECTORHAL_EXTENSION_TABLE` - path to a JSON extension table; replaces
//!   host detection
//! - `VECTORHAL_TARGET_FLAGS` - comma-separated CPU flags; restricts the
//!   catalogue to a target other than the running host
//! - `VECTORHAL_ACCEL_DEVICE` - `emulator` (default) or `hardware`
//! - `VECTORHAL_ACCEL_PROFILING` - `true`/`1`/`yes` records queue timings
//! - `VECTORHAL_ACCEL_MEMORY_LIMIT` - device-exclusive byte limit for the
//!   emulator
//!
//! When both a table path and target flags are given, the table is loaded
//! from the file and then restricted to the flags.

use crate::backends::fpga::AcceleratorConfig;
use crate::error::{BackendError, Result};
use crate::style::ExtensionTable;
use std::env;
use std::path::PathBuf;

pub const ENV_EXTENSION_TABLE: &str = "VECTORHAL_EXTENSION_TABLE";
pub const ENV_TARGET_FLAGS: &str = "VECTORHAL_TARGET_FLAGS";
pub const ENV_ACCEL_DEVICE: &str = "VECTORHAL_ACCEL_DEVICE";
pub const ENV_ACCEL_PROFILING: &str = "VECTORHAL_ACCEL_PROFILING";
pub const ENV_ACCEL_MEMORY_LIMIT: &str = "VECTORHAL_ACCEL_MEMORY_LIMIT";

/// Backend configuration for both executors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HalConfig {
    /// JSON extension table to load instead of the built-in catalogue
    pub extension_table_path: Option<PathBuf>,
    /// CPU flags of the target; `None` means detect the running host
    pub target_flags: Option<Vec<String>>,
    pub accelerator: AcceleratorConfig,
}

impl HalConfig {
    /// Read configuration from `VECTORHAL_*` variables
    ///
    /// Unset variables keep their defaults; malformed values are errors.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = non_empty_var(ENV_EXTENSION_TABLE) {
            config.extension_table_path = Some(PathBuf::from(path));
        }

        if let Some(flags) = non_empty_var(ENV_TARGET_FLAGS) {
            config.target_flags = Some(
                flags
                    .split(',')
                    .map(str::trim)
                    .filter(|flag| !flag.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }

        if let Some(device) = non_empty_var(ENV_ACCEL_DEVICE) {
            config.accelerator.device = device.parse()?;
        }

        if let Some(profiling) = non_empty_var(ENV_ACCEL_PROFILING) {
            config.accelerator.enable_profiling = parse_bool(ENV_ACCEL_PROFILING, &profiling)?;
        }

        if let Some(limit) = non_empty_var(ENV_ACCEL_MEMORY_LIMIT) {
            let bytes = limit.trim().parse::<usize>().map_err(|e| {
                BackendError::invalid_config(format!("{ENV_ACCEL_MEMORY_LIMIT}='{limit}': {e}"))
            })?;
            config.accelerator.emulator.memory_limit_bytes = Some(bytes);
        }

        tracing::debug!(config = ?config, "hal_config_loaded");
        Ok(config)
    }

    /// Build the extension table this configuration describes
    pub fn extension_table(&self) -> Result<ExtensionTable> {
        let table = match &self.extension_table_path {
            Some(path) => ExtensionTable::from_path(path)?,
            None if self.target_flags.is_some() => ExtensionTable::builtin_catalogue()?,
            None => return ExtensionTable::detect_host(),
        };
        match &self.target_flags {
            Some(flags) => table.restrict_to_flags(flags),
            None => Ok(table),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BackendError::invalid_config(format!("{key}='{other}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fpga::DeviceSelector;
    use crate::element::ElementType;
    use std::io::Write;
    use std::sync::Mutex;

    // Serialises tests that mutate process environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        ENV_EXTENSION_TABLE,
        ENV_TARGET_FLAGS,
        ENV_ACCEL_DEVICE,
        ENV_ACCEL_PROFILING,
        ENV_ACCEL_MEMORY_LIMIT,
    ];

    fn reset_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        let config = HalConfig::from_env().unwrap();
        assert_eq!(config, HalConfig::default());
        assert_eq!(config.accelerator.device, DeviceSelector::Emulator);
    }

    #[test]
    fn test_reads_every_variable() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        env::set_var(ENV_TARGET_FLAGS, "sse4.1, avx2,,");
        env::set_var(ENV_ACCEL_DEVICE, "hardware");
        env::set_var(ENV_ACCEL_PROFILING, "yes");
        env::set_var(ENV_ACCEL_MEMORY_LIMIT, "1048576");

        let config = HalConfig::from_env();
        reset_env();
        let config = config.unwrap();

        assert_eq!(
            config.target_flags,
            Some(vec!["sse4.1".to_string(), "avx2".to_string()])
        );
        assert_eq!(config.accelerator.device, DeviceSelector::Hardware);
        assert!(config.accelerator.enable_profiling);
        assert_eq!(config.accelerator.emulator.memory_limit_bytes, Some(1_048_576));
    }

    #[test]
    fn test_malformed_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        env::set_var(ENV_ACCEL_MEMORY_LIMIT, "lots");
        let result = HalConfig::from_env();
        reset_env();
        assert!(matches!(result, Err(BackendError::InvalidConfig(_))));

        env::set_var(ENV_ACCEL_PROFILING, "maybe");
        let result = HalConfig::from_env();
        reset_env();
        assert!(matches!(result, Err(BackendError::InvalidConfig(_))));
    }

    #[test]
    fn test_target_flags_restrict_catalogue() {
        let config = HalConfig {
            target_flags: Some(Vec::new()),
            ..HalConfig::default()
        };
        let table = config.extension_table().unwrap();
        assert!(table.extensions().is_empty());
        assert_eq!(table.available_parallelism(ElementType::U32), vec![1]);
    }

    #[test]
    fn test_table_from_file_then_flags() {
        let path = env::temp_dir().join(format!("vectorhal-table-{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"extensions": [
                {{"name": "narrow", "width_bits": 128, "cpu_flags": ["a"]}},
                {{"name": "wide", "width_bits": 1024, "cpu_flags": ["a", "b"]}}
            ]}}"#
        )
        .unwrap();
        drop(file);

        let mut config = HalConfig {
            extension_table_path: Some(path.clone()),
            ..HalConfig::default()
        };
        let full = config.extension_table().unwrap();
        assert_eq!(full.widest(ElementType::U8).extension().as_str(), "wide");

        config.target_flags = Some(vec!["a".to_string()]);
        let restricted = config.extension_table().unwrap();
        assert_eq!(restricted.widest(ElementType::U8).extension().as_str(), "narrow");

        std::fs::remove_file(path).unwrap();
    }
}
