use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Arithmetic operation selected through the `Opcode` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u32)]
pub enum Opcode {
    /// `A + B`.
    Add = 0,
    /// `A - B`.
    Subtract = 1,
    /// `A * B`.
    Multiply = 2,
    /// `A / B`.
    Divide = 3,
}

/// Every opcode in register-encoding order.
pub const ALL_OPCODES: [Opcode; 4] = [
    Opcode::Add,
    Opcode::Subtract,
    Opcode::Multiply,
    Opcode::Divide,
];

/// Raised when a raw value or symbol does not name an opcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum UnknownOpcode {
    /// Register encoding outside `0..=3`.
    #[error("unknown opcode encoding {0}")]
    Encoding(u32),
    /// Operator symbol other than `+ - * /`.
    #[error("unknown operator '{0}' (use + - * /)")]
    Symbol(String),
}

impl Opcode {
    /// Returns the value written to the `Opcode` register.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Decodes a register value into an opcode.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Add),
            1 => Some(Self::Subtract),
            2 => Some(Self::Multiply),
            3 => Some(Self::Divide),
            _ => None,
        }
    }

    /// Resolves a command-line operator symbol.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownOpcode::Symbol`] for anything other than `+ - * /`.
    pub fn from_symbol(symbol: &str) -> Result<Self, UnknownOpcode> {
        match symbol {
            "+" => Ok(Self::Add),
            "-" => Ok(Self::Subtract),
            "*" => Ok(Self::Multiply),
            "/" => Ok(Self::Divide),
            other => Err(UnknownOpcode::Symbol(other.to_string())),
        }
    }

    /// Operator symbol for display.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }
}

impl TryFrom<u32> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_u32(value).ok_or(UnknownOpcode::Encoding(value))
    }
}

impl FromStr for Opcode {
    type Err = UnknownOpcode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
