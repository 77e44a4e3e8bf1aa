//! RISC-V Privilege Modes.
//!
//! Privilege levels of the hart (User, Supervisor, Machine) and the causes
//! recorded in DCSR when the hart enters debug mode.

/// RISC-V privilege mode levels.
///
/// The numeric values match the encoding used in the MPP/SPP fields of
/// MSTATUS and in the privilege bits of CSR numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrivilegeMode {
    /// User mode (U-mode).
    User = 0,

    /// Supervisor mode (S-mode).
    Supervisor = 1,

    /// Machine mode (M-mode). Always present; the reset mode.
    Machine = 3,
}

impl PrivilegeMode {
    /// Converts a u8 value to a privilege mode.
    ///
    /// # Arguments
    ///
    /// * `val` - The numeric privilege mode value (0, 1, or 3)
    ///
    /// # Returns
    ///
    /// The corresponding `PrivilegeMode`, defaulting to `Machine` for the
    /// reserved encoding 2.
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => PrivilegeMode::User,
            1 => PrivilegeMode::Supervisor,
            _ => PrivilegeMode::Machine,
        }
    }

    /// Returns the two-bit encoding of the mode.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns the human-readable name of the privilege mode.
    pub fn name(&self) -> &'static str {
        match self {
            PrivilegeMode::User => "User",
            PrivilegeMode::Supervisor => "Supervisor",
            PrivilegeMode::Machine => "Machine",
        }
    }
}

impl std::fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reason for entering debug mode, as recorded in DCSR bits 8:6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugModeCause {
    /// `ebreak` executed with DCSR.ebreakm set.
    Ebreak = 1,

    /// A trigger with the enter-debug action fired.
    Trigger = 2,

    /// The debugger (test bench) requested a halt.
    Debugger = 3,

    /// Single step completed with DCSR.step set.
    Step = 4,
}
