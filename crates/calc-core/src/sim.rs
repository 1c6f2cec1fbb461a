//! Deterministic software model of the calculator peripheral.
//!
//! Implements [`RegisterBus`] over an in-memory register block so the
//! transaction protocol can run without hardware. A shared [`SimTrace`]
//! records every write, status read, open, map and release for inspection
//! after the handle is gone.

use std::cell::{Cell, RefCell};
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use crate::bus::RegisterBus;
use crate::device::{MapWindow, PhysicalMemory};
use crate::error::CalcError;
use crate::opcode::Opcode;
use crate::regmap::{Register, REGISTER_BLOCK_WORDS, START_TRIGGER, STATUS_COMPLETE};

/// `Status` value of a freshly reset simulated device.
pub const SIM_STATUS_IDLE: u32 = 0;

/// `Status` value while a simulated operation is in flight.
pub const SIM_STATUS_BUSY: u32 = 1;

/// Behaviour knobs for [`SimulatedCalculator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimConfig {
    /// 1-based status read on which completion is first reported. Zero
    /// behaves like one.
    pub completion_poll: u32,
    /// Ignore the trigger entirely, leaving `Status` at its idle value.
    pub hang: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            completion_poll: 1,
            hang: false,
        }
    }
}

/// Shared record of everything observed by a simulated device.
#[derive(Debug, Default)]
pub struct SimTrace {
    opens: Cell<u32>,
    maps: Cell<u32>,
    releases: Cell<u32>,
    status_reads: Cell<u64>,
    writes: RefCell<Vec<(Register, u32)>>,
}

impl SimTrace {
    /// Backing-store open attempts.
    #[must_use]
    pub fn opens(&self) -> u32 {
        self.opens.get()
    }

    /// Mapping attempts (only made after a successful open).
    #[must_use]
    pub fn maps(&self) -> u32 {
        self.maps.get()
    }

    /// Handles dropped.
    #[must_use]
    pub fn releases(&self) -> u32 {
        self.releases.get()
    }

    /// `Status` register reads.
    #[must_use]
    pub fn status_reads(&self) -> u64 {
        self.status_reads.get()
    }

    /// Register writes in the order they reached the device.
    #[must_use]
    pub fn writes(&self) -> Vec<(Register, u32)> {
        self.writes.borrow().clone()
    }

    fn bump(cell: &Cell<u32>) {
        cell.set(cell.get().saturating_add(1));
    }
}

/// Simulated peripheral with an in-memory register block.
#[derive(Debug)]
pub struct SimulatedCalculator {
    config: SimConfig,
    regs: [u32; REGISTER_BLOCK_WORDS],
    in_flight: Option<InFlight>,
    trace: Rc<SimTrace>,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    polls_left: u32,
    result: u32,
}

impl Default for SimulatedCalculator {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimulatedCalculator {
    /// Creates a reset device with its own trace.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::with_trace(config, Rc::new(SimTrace::default()))
    }

    /// Creates a reset device recording into `trace`.
    #[must_use]
    pub fn with_trace(config: SimConfig, trace: Rc<SimTrace>) -> Self {
        let mut regs = [0; REGISTER_BLOCK_WORDS];
        regs[Register::Status.word_offset()] = SIM_STATUS_IDLE;
        Self {
            config,
            regs,
            in_flight: None,
            trace,
        }
    }

    /// Shared trace handle.
    #[must_use]
    pub fn trace(&self) -> Rc<SimTrace> {
        Rc::clone(&self.trace)
    }

    /// Current raw value of `register`, without read side effects.
    #[must_use]
    pub const fn peek(&self, register: Register) -> u32 {
        self.regs[register.word_offset()]
    }

    /// Result the device produces for an operation, or `None` when it never
    /// completes (division by zero).
    #[must_use]
    pub const fn compute(opcode: Opcode, operand_a: u32, operand_b: u32) -> Option<u32> {
        match opcode {
            Opcode::Add => Some(operand_a.wrapping_add(operand_b)),
            Opcode::Subtract => Some(operand_a.wrapping_sub(operand_b)),
            Opcode::Multiply => Some(operand_a.wrapping_mul(operand_b)),
            Opcode::Divide => operand_a.checked_div(operand_b),
        }
    }

    fn trigger(&mut self) {
        if self.config.hang {
            return;
        }
        let result = Opcode::from_u32(self.peek(Register::Opcode)).and_then(|opcode| {
            Self::compute(
                opcode,
                self.peek(Register::OperandA),
                self.peek(Register::OperandB),
            )
        });
        let Some(result) = result else {
            return;
        };
        self.regs[Register::Status.word_offset()] = SIM_STATUS_BUSY;
        self.in_flight = Some(InFlight {
            polls_left: self.config.completion_poll.max(1),
            result,
        });
    }

    fn poll_status(&mut self) -> u32 {
        self.trace
            .status_reads
            .set(self.trace.status_reads.get().saturating_add(1));
        if let Some(op) = self.in_flight.as_mut() {
            op.polls_left -= 1;
            if op.polls_left == 0 {
                self.regs[Register::Result.word_offset()] = op.result;
                self.regs[Register::Status.word_offset()] = STATUS_COMPLETE;
                self.in_flight = None;
            }
        }
        self.peek(Register::Status)
    }
}

impl RegisterBus for SimulatedCalculator {
    fn read(&mut self, register: Register) -> u32 {
        match register {
            Register::Status => self.poll_status(),
            other => self.peek(other),
        }
    }

    fn write(&mut self, register: Register, value: u32) {
        self.trace.writes.borrow_mut().push((register, value));
        self.regs[register.word_offset()] = value;
        if register == Register::Start && value == START_TRIGGER {
            self.trigger();
        }
    }
}

impl Drop for SimulatedCalculator {
    fn drop(&mut self) {
        SimTrace::bump(&self.trace.releases);
    }
}

/// Failure injected by [`SimulatedMemory`] on acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimFailure {
    /// Opening the backing store fails with a privilege error.
    Open,
    /// The open succeeds but mapping fails.
    Map,
}

/// Backing store handing out [`SimulatedCalculator`] handles.
#[derive(Debug, Default)]
pub struct SimulatedMemory {
    config: SimConfig,
    failure: Option<SimFailure>,
    trace: Rc<SimTrace>,
}

impl SimulatedMemory {
    /// Backing store producing devices configured with `config`.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            failure: None,
            trace: Rc::default(),
        }
    }

    /// Makes every acquire fail at the given stage.
    #[must_use]
    pub const fn failing(mut self, failure: SimFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Trace shared with every handle this store hands out.
    #[must_use]
    pub const fn trace(&self) -> &Rc<SimTrace> {
        &self.trace
    }
}

impl PhysicalMemory for SimulatedMemory {
    type Handle = SimulatedCalculator;

    fn acquire(&self, window: MapWindow) -> Result<SimulatedCalculator, CalcError> {
        SimTrace::bump(&self.trace.opens);
        if self.failure == Some(SimFailure::Open) {
            return Err(CalcError::Access {
                path: PathBuf::from("sim://calculator"),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }

        SimTrace::bump(&self.trace.maps);
        if self.failure == Some(SimFailure::Map) || !window.covers_register_block() {
            return Err(CalcError::Mapping {
                base: window.base,
                size: window.size,
                source: io::Error::from(io::ErrorKind::InvalidInput),
            });
        }

        Ok(SimulatedCalculator::with_trace(
            self.config,
            Rc::clone(&self.trace),
        ))
    }
}
