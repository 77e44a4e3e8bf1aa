//! Instruction Field Extraction.
//!
//! Accessors for the fixed fields of 32-bit instruction words and the
//! sign-extended immediates of each instruction format.

/// Field accessors for a raw 32-bit instruction word.
pub trait InstructionBits {
    fn opcode(&self) -> u32;
    fn rd(&self) -> usize;
    fn funct3(&self) -> u32;
    fn rs1(&self) -> usize;
    fn rs2(&self) -> usize;
    fn rs3(&self) -> usize;
    fn funct7(&self) -> u32;
    fn imm_i(&self) -> i64;
    fn imm_s(&self) -> i64;
    fn imm_b(&self) -> i64;
    fn imm_u(&self) -> i64;
    fn imm_j(&self) -> i64;
}

impl InstructionBits for u32 {
    #[inline(always)]
    fn opcode(&self) -> u32 {
        self & 0x7f
    }

    #[inline(always)]
    fn rd(&self) -> usize {
        ((self >> 7) & 0x1f) as usize
    }

    #[inline(always)]
    fn funct3(&self) -> u32 {
        (self >> 12) & 0x7
    }

    #[inline(always)]
    fn rs1(&self) -> usize {
        ((self >> 15) & 0x1f) as usize
    }

    #[inline(always)]
    fn rs2(&self) -> usize {
        ((self >> 20) & 0x1f) as usize
    }

    #[inline(always)]
    fn rs3(&self) -> usize {
        ((self >> 27) & 0x1f) as usize
    }

    #[inline(always)]
    fn funct7(&self) -> u32 {
        (self >> 25) & 0x7f
    }

    /// I-type: inst[31:20].
    #[inline(always)]
    fn imm_i(&self) -> i64 {
        ((*self as i32) >> 20) as i64
    }

    /// S-type: inst[31:25] | inst[11:7].
    #[inline(always)]
    fn imm_s(&self) -> i64 {
        let hi = ((*self as i32) >> 25) << 5;
        let lo = ((self >> 7) & 0x1f) as i32;
        (hi | lo) as i64
    }

    /// B-type: inst[31] | inst[7] | inst[30:25] | inst[11:8], times two.
    #[inline(always)]
    fn imm_b(&self) -> i64 {
        let bit12 = ((*self as i32) >> 31) << 12;
        let bit11 = (((self >> 7) & 1) << 11) as i32;
        let bits10_5 = (((self >> 25) & 0x3f) << 5) as i32;
        let bits4_1 = (((self >> 8) & 0xf) << 1) as i32;
        (bit12 | bit11 | bits10_5 | bits4_1) as i64
    }

    /// U-type: inst[31:12] << 12.
    #[inline(always)]
    fn imm_u(&self) -> i64 {
        ((*self & 0xffff_f000) as i32) as i64
    }

    /// J-type: inst[31] | inst[19:12] | inst[20] | inst[30:21], times two.
    #[inline(always)]
    fn imm_j(&self) -> i64 {
        let bit20 = ((*self as i32) >> 31) << 20;
        let bits19_12 = (*self & 0x000f_f000) as i32;
        let bit11 = (((self >> 20) & 1) << 11) as i32;
        let bits10_1 = (((self >> 21) & 0x3ff) << 1) as i32;
        (bit20 | bits19_12 | bit11 | bits10_1) as i64
    }
}
