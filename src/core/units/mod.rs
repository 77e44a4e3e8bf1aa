//! Execution units.
//!
//! Stateless helpers computing instruction results from operand values.
//! The core reads operands, calls into a unit and commits the result.

/// Integer ALU, M extension and bit manipulation.
pub mod alu;

/// Soft-float single and double precision operations.
pub mod fpu;

/// Memory widths, load extension and atomic read-modify-write.
pub mod lsu;
