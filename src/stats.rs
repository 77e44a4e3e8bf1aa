//! Simulation statistics collection and reporting.
//!
//! Two reports are produced: a run summary (retired instructions, cycles,
//! traps and host speed) and an optional instruction-frequency profile with
//! per-operation register usage and operand-value histograms.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::Core;

/// Number of buckets of a signed value histogram.
pub const SIGNED_BUCKETS: usize = 13;

/// Number of buckets of an unsigned value histogram.
pub const UNSIGNED_BUCKETS: usize = 7;

/// Summary of one run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SimStats {
    pub instructions_retired: u64,
    pub cycles: u64,
    pub exceptions: u64,
    pub interrupts: u64,
    pub host_seconds: f64,
}

impl SimStats {
    /// Captures the counters of a core.
    pub fn from_core(core: &Core) -> Self {
        Self {
            instructions_retired: core.retired_instructions(),
            cycles: core.cycle_count(),
            exceptions: core.exception_count(),
            interrupts: core.interrupt_count(),
            host_seconds: core.elapsed().as_secs_f64(),
        }
    }

    /// Retired instructions per host second.
    pub fn instructions_per_second(&self) -> f64 {
        if self.host_seconds > 0.0 {
            self.instructions_retired as f64 / self.host_seconds
        } else {
            0.0
        }
    }

    /// Prints a formatted summary.
    pub fn print(&self) {
        let cyc = self.cycles.max(1);

        println!("\n==========================================================");
        println!("RISC-V HART SIMULATION STATISTICS");
        println!("==========================================================");
        println!("host_seconds             {:.4} s", self.host_seconds);
        println!("sim_insts                {}", self.instructions_retired);
        println!("sim_cycles               {}", self.cycles);
        println!(
            "sim_ipc                  {:.4}",
            self.instructions_retired as f64 / cyc as f64
        );
        println!("sim_ips                  {:.0}", self.instructions_per_second());
        println!("----------------------------------------------------------");
        println!("TRAPS");
        println!("  exceptions             {}", self.exceptions);
        println!("  interrupts             {}", self.interrupts);
        println!("==========================================================");
    }
}

/// Operand data of one executed instruction, as seen by the profile.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpSample {
    pub rd: Option<usize>,

    /// `(register, value before execution)`
    pub rs1: Option<(usize, u64)>,
    pub rs2: Option<(usize, u64)>,

    pub imm: Option<i64>,

    /// Source values are bucketed as unsigned.
    pub unsigned: bool,
}

/// Frequency data of one operation.
#[derive(Clone, Debug, Serialize)]
pub struct OpProfile {
    pub count: u64,
    pub rd: Vec<u64>,
    pub rs1: Vec<u64>,
    pub rs2: Vec<u64>,
    pub rs1_values: Vec<u64>,
    pub rs2_values: Vec<u64>,
    pub imm_min: Option<i64>,
    pub imm_max: Option<i64>,
    pub imm_values: Vec<u64>,
}

impl Default for OpProfile {
    fn default() -> Self {
        Self {
            count: 0,
            rd: vec![0; 32],
            rs1: vec![0; 32],
            rs2: vec![0; 32],
            rs1_values: Vec::new(),
            rs2_values: Vec::new(),
            imm_min: None,
            imm_max: None,
            imm_values: vec![0; SIGNED_BUCKETS],
        }
    }
}

impl OpProfile {
    fn record(&mut self, s: &OpSample) {
        self.count += 1;
        let buckets = if s.unsigned {
            UNSIGNED_BUCKETS
        } else {
            SIGNED_BUCKETS
        };

        if let Some(rd) = s.rd {
            self.rd[rd % 32] += 1;
        }
        if let Some((ix, value)) = s.rs1 {
            self.rs1[ix % 32] += 1;
            bump(&mut self.rs1_values, buckets, value_bucket(value, s.unsigned));
        }
        if let Some((ix, value)) = s.rs2 {
            self.rs2[ix % 32] += 1;
            bump(&mut self.rs2_values, buckets, value_bucket(value, s.unsigned));
        }
        if let Some(imm) = s.imm {
            self.imm_min = Some(self.imm_min.map_or(imm, |m| m.min(imm)));
            self.imm_max = Some(self.imm_max.map_or(imm, |m| m.max(imm)));
            self.imm_values[signed_bucket(imm)] += 1;
        }
    }
}

fn bump(hist: &mut Vec<u64>, len: usize, bucket: usize) {
    if hist.len() < len {
        hist.resize(len, 0);
    }
    hist[bucket] += 1;
}

fn value_bucket(value: u64, unsigned: bool) -> usize {
    if unsigned {
        unsigned_bucket(value)
    } else {
        signed_bucket(value as i64)
    }
}

/// Signed histogram bucket: `<= -64K, <= -1K, <= -16, < -2, -2, -1, 0, 1,
/// 2, <= 16, <= 1K, <= 64K, > 64K`.
pub fn signed_bucket(v: i64) -> usize {
    match v {
        i64::MIN..=-65536 => 0,
        -65535..=-1024 => 1,
        -1023..=-16 => 2,
        -15..=-3 => 3,
        -2 => 4,
        -1 => 5,
        0 => 6,
        1 => 7,
        2 => 8,
        3..=16 => 9,
        17..=1024 => 10,
        1025..=65536 => 11,
        _ => 12,
    }
}

/// Unsigned histogram bucket: `0, 1, 2, <= 16, <= 1K, <= 64K, > 64K`.
pub fn unsigned_bucket(v: u64) -> usize {
    match v {
        0 => 0,
        1 => 1,
        2 => 2,
        3..=16 => 3,
        17..=1024 => 4,
        1025..=65536 => 5,
        _ => 6,
    }
}

/// Instruction-frequency profile keyed by mnemonic.
#[derive(Clone, Debug, Default, Serialize)]
pub struct InstProfile {
    ops: BTreeMap<String, OpProfile>,
}

impl InstProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one executed instruction.
    pub fn record(&mut self, mnemonic: &str, sample: &OpSample) {
        if let Some(p) = self.ops.get_mut(mnemonic) {
            p.record(sample);
            return;
        }
        let mut p = OpProfile::default();
        p.record(sample);
        self.ops.insert(mnemonic.to_string(), p);
    }

    pub fn get(&self, mnemonic: &str) -> Option<&OpProfile> {
        self.ops.get(mnemonic)
    }

    pub fn total(&self) -> u64 {
        self.ops.values().map(|p| p.count).sum()
    }

    /// Renders the profile as JSON, most frequent operation first.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut ops: Vec<(&String, &OpProfile)> = self.ops.iter().collect();
        ops.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(b.0)));
        let list: Vec<serde_json::Value> = ops
            .into_iter()
            .map(|(name, p)| {
                let mut v = serde_json::to_value(p)?;
                if let Some(obj) = v.as_object_mut() {
                    obj.insert("op".to_string(), serde_json::Value::String(name.clone()));
                }
                Ok(v)
            })
            .collect::<serde_json::Result<_>>()?;
        serde_json::to_string_pretty(&list)
    }
}
