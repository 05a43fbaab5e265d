//! Device selection and capability checks

use crate::error::{BackendError, Result};
use std::fmt;
use std::str::FromStr;

/// Which accelerator device to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceSelector {
    /// In-process functional emulation of the FPGA
    #[default]
    Emulator,
    /// Synthesized hardware behind a vendor runtime
    Hardware,
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Emulator => f.write_str("emulator"),
            DeviceSelector::Hardware => f.write_str("hardware"),
        }
    }
}

impl FromStr for DeviceSelector {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emulator" | "emu" => Ok(DeviceSelector::Emulator),
            "hardware" | "hw" => Ok(DeviceSelector::Hardware),
            other => Err(BackendError::invalid_config(format!(
                "unknown accelerator device '{other}' (expected 'emulator' or 'hardware')"
            ))),
        }
    }
}

/// Allocation classes a device supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Host-resident memory the device can access
    pub host_allocations: bool,
    /// Memory resident on the device
    pub device_allocations: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            host_allocations: true,
            device_allocations: true,
        }
    }
}

/// Knobs for the emulated device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmulatorOptions {
    pub capabilities: DeviceCapabilities,
    /// Cap on live device-exclusive bytes; `None` is unlimited
    pub memory_limit_bytes: Option<usize>,
}

/// Construction parameters for an accelerator executor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceleratorConfig {
    pub device: DeviceSelector,
    /// Record per-command queue timings
    pub enable_profiling: bool,
    pub emulator: EmulatorOptions,
}

impl AcceleratorConfig {
    pub fn emulator() -> Self {
        Self::default()
    }

    pub fn hardware() -> Self {
        Self {
            device: DeviceSelector::Hardware,
            ..Self::default()
        }
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.enable_profiling = enabled;
        self
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.emulator.capabilities = capabilities;
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.emulator.memory_limit_bytes = Some(bytes);
        self
    }
}

/// An opened device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub kind: DeviceSelector,
    pub capabilities: DeviceCapabilities,
    pub memory_limit_bytes: Option<usize>,
}

impl DeviceDescriptor {
    /// Both allocation classes are required
    pub fn validate(&self) -> Result<()> {
        if !self.capabilities.host_allocations {
            return Err(BackendError::MissingCapability {
                device: self.name.clone(),
                capability: "usm_host_allocations".into(),
            });
        }
        if !self.capabilities.device_allocations {
            return Err(BackendError::MissingCapability {
                device: self.name.clone(),
                capability: "usm_device_allocations".into(),
            });
        }
        Ok(())
    }
}

/// Open the device named by `config`
pub(crate) fn open(config: &AcceleratorConfig) -> Result<DeviceDescriptor> {
    match config.device {
        DeviceSelector::Emulator => Ok(DeviceDescriptor {
            name: "vectorhal FPGA emulation device".into(),
            kind: DeviceSelector::Emulator,
            capabilities: config.emulator.capabilities,
            memory_limit_bytes: config.emulator.memory_limit_bytes,
        }),
        DeviceSelector::Hardware => Err(BackendError::DeviceUnavailable(
            "no FPGA hardware runtime is linked into this build".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parsing() {
        assert_eq!("Emulator".parse::<DeviceSelector>().unwrap(), DeviceSelector::Emulator);
        assert_eq!(" hw ".parse::<DeviceSelector>().unwrap(), DeviceSelector::Hardware);
        assert!(matches!(
            "gpu".parse::<DeviceSelector>(),
            Err(BackendError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_open_emulator() {
        let descriptor = open(&AcceleratorConfig::emulator().with_memory_limit(4096)).unwrap();
        assert_eq!(descriptor.kind, DeviceSelector::Emulator);
        assert_eq!(descriptor.memory_limit_bytes, Some(4096));
        descriptor.validate().unwrap();
    }

    #[test]
    fn test_hardware_unavailable() {
        assert!(matches!(
            open(&AcceleratorConfig::hardware()),
            Err(BackendError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_capability() {
        let config = AcceleratorConfig::emulator().with_capabilities(DeviceCapabilities {
            host_allocations: true,
            device_allocations: false,
        });
        let err = open(&config).unwrap().validate().unwrap_err();
        match err {
            BackendError::MissingCapability { capability, .. } => {
                assert_eq!(capability, "usm_device_allocations")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
