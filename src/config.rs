//! Simulator Configuration.
//!
//! The configuration is read from a TOML file with three parts: `[core]`
//! (register width, extensions and core options), `[memory]` (the flat memory
//! and its special regions) and any number of `[[csr]]` tables overriding CSR
//! definitions. Addresses and masks are written as hex strings and every
//! field has a default, so an empty file describes a usable RV32 core.

use serde::Deserialize;

use crate::common::{SimError, Xlen};
use crate::core::arch::csr::CsrOverride;
use crate::isa::IsaConfig;

const DEFAULT_XLEN: u32 = 32;
const DEFAULT_ISA: &str = "imafdc";
const DEFAULT_MEM_BASE: u64 = 0;
const DEFAULT_MEM_SIZE: u64 = 0x10_0000;
const DEFAULT_PERF_COUNTERS: usize = 4;
const DEFAULT_TRIGGERS: usize = 4;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub csr: Vec<CsrConfig>,
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn from_file(path: &str) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses and validates configuration text.
    pub fn parse(text: &str) -> Result<Self, SimError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), SimError> {
        self.core.xlen_val()?;
        for s in [&self.core.reset_pc, &self.core.nmi_pc] {
            require_hex(s)?;
        }
        for s in [&self.core.tohost, &self.core.console_io, &self.core.stop_address]
            .into_iter()
            .flatten()
        {
            require_hex(s)?;
        }
        require_hex(&self.memory.base)?;
        require_hex(&self.memory.size)?;
        for r in self.memory.regions() {
            require_hex(&r.1.base)?;
            require_hex(&r.1.size)?;
        }
        for c in &self.csr {
            c.to_override()?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_xlen")]
    pub xlen: u32,

    /// Extension letters, e.g. `"imafdc"`.
    #[serde(default = "default_isa")]
    pub isa: String,

    #[serde(default)]
    pub hart_id: u64,

    #[serde(default = "default_zero_hex")]
    pub reset_pc: String,

    #[serde(default = "default_zero_hex")]
    pub nmi_pc: String,

    /// A non-zero store to this address stops the run.
    #[serde(default)]
    pub tohost: Option<String>,

    /// Byte loads read stdin and byte stores write the console here.
    #[serde(default)]
    pub console_io: Option<String>,

    #[serde(default)]
    pub stop_address: Option<String>,

    #[serde(default)]
    pub enable_counters: bool,

    #[serde(default = "default_perf_counters")]
    pub perf_counters: usize,

    #[serde(default)]
    pub enable_triggers: bool,

    #[serde(default = "default_triggers")]
    pub triggers: usize,

    #[serde(default)]
    pub store_queue_size: usize,

    #[serde(default)]
    pub load_queue_size: usize,

    #[serde(default)]
    pub ea_compat_with_base: bool,

    #[serde(default)]
    pub amo_illegal_outside_dccm: bool,

    #[serde(default)]
    pub bitmanip: bool,

    /// Append the load address to trace lines of loads.
    #[serde(default)]
    pub trace_load: bool,

    #[serde(default)]
    pub max_instructions: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            xlen: default_xlen(),
            isa: default_isa(),
            hart_id: 0,
            reset_pc: default_zero_hex(),
            nmi_pc: default_zero_hex(),
            tohost: None,
            console_io: None,
            stop_address: None,
            enable_counters: false,
            perf_counters: default_perf_counters(),
            enable_triggers: false,
            triggers: default_triggers(),
            store_queue_size: 0,
            load_queue_size: 0,
            ea_compat_with_base: false,
            amo_illegal_outside_dccm: false,
            bitmanip: false,
            trace_load: false,
            max_instructions: None,
        }
    }
}

impl CoreConfig {
    pub fn xlen_val(&self) -> Result<Xlen, SimError> {
        Xlen::from_bits(self.xlen).ok_or_else(|| {
            SimError::InvalidConfig(format!("xlen must be 32 or 64, got {}", self.xlen))
        })
    }

    /// MISA extension bits of the `isa` letters.
    pub fn misa_extensions(&self) -> u64 {
        IsaConfig::misa_from_letters(&self.isa)
    }

    pub fn reset_pc_val(&self) -> u64 {
        parse_hex(&self.reset_pc, 0)
    }

    pub fn nmi_pc_val(&self) -> u64 {
        parse_hex(&self.nmi_pc, 0)
    }

    pub fn tohost_val(&self) -> Option<u64> {
        self.tohost.as_deref().and_then(try_parse_hex)
    }

    pub fn console_io_val(&self) -> Option<u64> {
        self.console_io.as_deref().and_then(try_parse_hex)
    }

    pub fn stop_address_val(&self) -> Option<u64> {
        self.stop_address.as_deref().and_then(try_parse_hex)
    }
}

#[derive(Debug, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_mem_base")]
    pub base: String,

    #[serde(default = "default_mem_size")]
    pub size: String,

    #[serde(default)]
    pub dccm: Vec<RegionConfig>,

    #[serde(default)]
    pub iccm: Vec<RegionConfig>,

    #[serde(default)]
    pub mapped_regs: Vec<RegionConfig>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base: default_mem_base(),
            size: default_mem_size(),
            dccm: Vec::new(),
            iccm: Vec::new(),
            mapped_regs: Vec::new(),
        }
    }
}

impl MemoryConfig {
    pub fn base_val(&self) -> u64 {
        parse_hex(&self.base, DEFAULT_MEM_BASE)
    }

    pub fn size_val(&self) -> usize {
        parse_hex(&self.size, DEFAULT_MEM_SIZE) as usize
    }

    /// All special regions tagged with their kind.
    pub fn regions(&self) -> impl Iterator<Item = (crate::soc::RegionKind, &RegionConfig)> {
        use crate::soc::RegionKind;
        let dccm = self.dccm.iter().map(|r| (RegionKind::Dccm, r));
        let iccm = self.iccm.iter().map(|r| (RegionKind::Iccm, r));
        let regs = self.mapped_regs.iter().map(|r| (RegionKind::MappedRegs, r));
        dccm.chain(iccm).chain(regs)
    }
}

#[derive(Debug, Deserialize)]
pub struct RegionConfig {
    pub base: String,
    pub size: String,
}

impl RegionConfig {
    pub fn base_val(&self) -> u64 {
        parse_hex(&self.base, 0)
    }

    pub fn size_val(&self) -> u64 {
        parse_hex(&self.size, 0)
    }
}

/// Overrides for one CSR, matched by name.
#[derive(Debug, Deserialize)]
pub struct CsrConfig {
    pub name: String,

    #[serde(default)]
    pub implemented: Option<bool>,

    #[serde(default)]
    pub reset: Option<String>,

    #[serde(default)]
    pub mask: Option<String>,

    #[serde(default)]
    pub poke_mask: Option<String>,

    #[serde(default)]
    pub debug: Option<bool>,
}

impl CsrConfig {
    pub fn to_override(&self) -> Result<CsrOverride, SimError> {
        let hex = |v: &Option<String>| -> Result<Option<u64>, SimError> {
            v.as_deref().map(require_hex).transpose()
        };
        Ok(CsrOverride {
            implemented: self.implemented,
            reset: hex(&self.reset)?,
            mask: hex(&self.mask)?,
            poke_mask: hex(&self.poke_mask)?,
            debug: self.debug,
        })
    }
}

fn try_parse_hex(s: &str) -> Option<u64> {
    let s = s.trim().replace('_', "");
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(&s);
    u64::from_str_radix(digits, 16).ok()
}

fn parse_hex(s: &str, default: u64) -> u64 {
    try_parse_hex(s).unwrap_or(default)
}

fn require_hex(s: &str) -> Result<u64, SimError> {
    try_parse_hex(s).ok_or_else(|| SimError::InvalidConfig(format!("bad hex value '{}'", s)))
}

fn default_xlen() -> u32 {
    DEFAULT_XLEN
}

fn default_isa() -> String {
    DEFAULT_ISA.to_string()
}

fn default_zero_hex() -> String {
    "0x0".to_string()
}

fn default_perf_counters() -> usize {
    DEFAULT_PERF_COUNTERS
}

fn default_triggers() -> usize {
    DEFAULT_TRIGGERS
}

fn default_mem_base() -> String {
    format!("{:#x}", DEFAULT_MEM_BASE)
}

fn default_mem_size() -> String {
    format!("{:#x}", DEFAULT_MEM_SIZE)
}
