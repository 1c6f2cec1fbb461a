use crate::regmap::Register;

/// Word-level access to the calculator register block.
///
/// The transaction protocol drives every register access through this trait.
/// Implementations must perform each call as exactly one access in program
/// order: a read may change device state and a write may never be elided,
/// merged, or reordered with respect to other calls.
pub trait RegisterBus {
    /// Reads one 32-bit register.
    fn read(&mut self, register: Register) -> u32;

    /// Writes one 32-bit register.
    fn write(&mut self, register: Register, value: u32);
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read(&mut self, register: Register) -> u32 {
        (**self).read(register)
    }

    fn write(&mut self, register: Register, value: u32) {
        (**self).write(register, value);
    }
}
