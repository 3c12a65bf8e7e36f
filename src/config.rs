use std::fs;
use std::path::Path;

use crate::error::Error;
use crate::memory::DEFAULT_MEMORY_SIZE;
use crate::pit::DEFAULT_DIVISOR;

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Machine configuration, usually read from a TOML file.
/// Every field is optional in the file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub memory: MemoryConfig,
    pub cpu: CpuConfig,
    pub pic: PicConfig,
    pub pit: PitConfig,
    pub program: ProgramConfig,
    pub io: IoConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// RAM size in bytes
    pub size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig { size: DEFAULT_MEMORY_SIZE }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// stop the run loop after this many iterations
    pub max_instructions: Option<usize>,
    /// vector divide errors through INT 0
    pub divide_error_interrupt: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        CpuConfig {
            max_instructions: None,
            divide_error_interrupt: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PicConfig {
    pub master_offset: u8,
    pub slave_offset: u8,
}

impl Default for PicConfig {
    fn default() -> Self {
        PicConfig {
            master_offset: 0x08,
            slave_offset: 0x70,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitConfig {
    pub enabled: bool,
    /// clock pulses between IRQ0 edges
    pub divisor: u32,
}

impl Default for PitConfig {
    fn default() -> Self {
        PitConfig {
            enabled: true,
            divisor: DEFAULT_DIVISOR,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// load segment, also used for DS, ES and SS
    pub segment: u16,
    /// load offset and entry point
    pub offset: u16,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        ProgramConfig {
            segment: 0x085F,
            offset: 0x0100,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// reads from unclaimed ports return all ones, writes are dropped
    pub ignore_unknown_ports: bool,
}

impl MachineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// checks values the TOML types alone do not bound
    pub fn validate(&self) -> Result<(), Error> {
        if self.pit.divisor == 0 || self.pit.divisor > DEFAULT_DIVISOR {
            return Err(Error::InvalidConfig(format!(
                "pit.divisor {:#X} is outside 1..=0x10000", self.pit.divisor)));
        }
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}
