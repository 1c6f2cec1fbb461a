//! Fixed register-block layout of the calculator peripheral.
//!
//! These values are the bit-exact contract with the hardware revision this
//! crate targets. Nothing at runtime can detect a mismatch with the real
//! device, so every change here must track the hardware register map.

/// Physical base address of the calculator register block.
pub const CALC_BASE: u64 = 0xFE00_0000;

/// Size in bytes of the mapped region covering the register block.
pub const CALC_SIZE: usize = 0x1000;

/// Page granularity the register window is laid out against.
///
/// Only the compile-time layout checks use this. Runtime alignment follows
/// the host page size reported by the kernel.
pub const PAGE_BYTES: usize = 0x1000;

/// Width in bytes of one register slot.
pub const WORD_BYTES: usize = 4;

/// Number of 32-bit slots in the register block.
pub const REGISTER_BLOCK_WORDS: usize = 6;

/// Span in bytes of the register block from the window base.
pub const REGISTER_BLOCK_BYTES: usize = REGISTER_BLOCK_WORDS * WORD_BYTES;

/// `Status` value reported once `Result` holds a valid value.
pub const STATUS_COMPLETE: u32 = 2;

/// Value written to `Start` to begin execution.
pub const START_TRIGGER: u32 = 1;

/// One 32-bit slot of the register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// First operand (word 0).
    OperandA,
    /// Second operand (word 1).
    OperandB,
    /// Operation selector (word 2).
    Opcode,
    /// Execution trigger (word 3).
    Start,
    /// Operation result, valid once `Status` reports completion (word 4).
    Result,
    /// Device progress code (word 5).
    Status,
}

impl Register {
    /// Returns the 32-bit word index of this register within the block.
    #[must_use]
    pub const fn word_offset(self) -> usize {
        match self {
            Self::OperandA => 0,
            Self::OperandB => 1,
            Self::Opcode => 2,
            Self::Start => 3,
            Self::Result => 4,
            Self::Status => 5,
        }
    }

    /// Returns the byte offset of this register from the window base.
    #[must_use]
    pub const fn byte_offset(self) -> usize {
        self.word_offset() * WORD_BYTES
    }
}

/// Register block layout in ascending word order.
pub const REGISTER_LAYOUT: [Register; REGISTER_BLOCK_WORDS] = [
    Register::OperandA,
    Register::OperandB,
    Register::Opcode,
    Register::Start,
    Register::Result,
    Register::Status,
];

const _: () = assert_register_layout();

const fn assert_register_layout() {
    let mut index = 0;
    while index < REGISTER_LAYOUT.len() {
        assert!(
            REGISTER_LAYOUT[index].word_offset() == index,
            "register layout must be contiguous and ordered"
        );
        index += 1;
    }

    assert!(
        REGISTER_BLOCK_BYTES <= CALC_SIZE,
        "register block must fit inside the mapped window"
    );
    assert!(
        CALC_SIZE % PAGE_BYTES == 0,
        "mapped window must be a whole number of pages"
    );
    assert!(
        CALC_BASE % PAGE_BYTES as u64 == 0,
        "register block base must be page aligned"
    );
}

#[cfg(test)]
mod tests {
    use super::{
        Register, CALC_BASE, CALC_SIZE, PAGE_BYTES, REGISTER_BLOCK_BYTES, REGISTER_LAYOUT,
        STATUS_COMPLETE, WORD_BYTES,
    };

    #[test]
    fn word_offsets_match_hardware_layout() {
        assert_eq!(Register::OperandA.word_offset(), 0);
        assert_eq!(Register::OperandB.word_offset(), 1);
        assert_eq!(Register::Opcode.word_offset(), 2);
        assert_eq!(Register::Start.word_offset(), 3);
        assert_eq!(Register::Result.word_offset(), 4);
        assert_eq!(Register::Status.word_offset(), 5);
    }

    #[test]
    fn byte_offsets_are_word_scaled() {
        for register in REGISTER_LAYOUT {
            assert_eq!(register.byte_offset(), register.word_offset() * WORD_BYTES);
            assert_eq!(register.byte_offset() % WORD_BYTES, 0);
        }
        assert_eq!(Register::Status.byte_offset(), 0x14);
    }

    #[test]
    fn window_constants_match_target_revision() {
        assert_eq!(CALC_BASE, 0xFE00_0000);
        assert_eq!(CALC_SIZE, PAGE_BYTES);
        assert_eq!(REGISTER_BLOCK_BYTES, 24);
        assert_eq!(STATUS_COMPLETE, 2);
    }
}
