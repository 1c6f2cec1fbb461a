//! One request/response cycle against the calculator register block.

use std::hint;
use std::sync::atomic::{fence, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::bus::RegisterBus;
use crate::opcode::Opcode;
use crate::regmap::{Register, START_TRIGGER, STATUS_COMPLETE};

/// Default busy-wait budget, in status reads.
pub const DEFAULT_POLL_ITERATIONS: u32 = 1_000_000;

/// Operands and operation for a single transaction.
///
/// Requests are consumed by [`execute`], so one cannot be issued twice.
#[derive(Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Request {
    /// Value staged in `OperandA`.
    pub operand_a: u32,
    /// Value staged in `OperandB`.
    pub operand_b: u32,
    /// Operation staged in `Opcode`.
    pub opcode: Opcode,
}

impl Request {
    /// Builds a request for `operand_a <opcode> operand_b`.
    #[must_use]
    pub const fn new(operand_a: u32, opcode: Opcode, operand_b: u32) -> Self {
        Self {
            operand_a,
            operand_b,
            opcode,
        }
    }
}

/// Bound on how long completion is awaited.
///
/// Both forms busy-wait on the calling thread. `Iterations` counts status
/// reads, so its wall-clock length depends on the host and the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PollBudget {
    /// At most this many status reads. Zero is treated as one.
    Iterations(u32),
    /// Keep reading until this much monotonic time has elapsed. At least one
    /// read is always made.
    Deadline(Duration),
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::Iterations(DEFAULT_POLL_ITERATIONS)
    }
}

impl PollBudget {
    /// Returns `true` when the configured budget is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        match self {
            Self::Iterations(count) => *count == 0,
            Self::Deadline(duration) => duration.is_zero(),
        }
    }
}

/// Raw result of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionOutcome {
    /// Device reported completion; carries the `Result` register.
    Success(u32),
    /// Budget ran out first; carries the last `Status` value read.
    Timeout(u32),
}

/// Outcome plus polling statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionReport {
    /// Transaction outcome.
    pub outcome: TransactionOutcome,
    /// Number of `Status` reads performed.
    pub polls: u64,
}

/// Runs one transaction: stage operands and opcode, trigger, poll, read back.
///
/// Operand and opcode writes are fenced before the `Start` write. Any status
/// other than [`STATUS_COMPLETE`] keeps polling until `budget` is spent. No
/// register is read after the budget runs out.
#[must_use]
pub fn execute<B: RegisterBus + ?Sized>(
    bus: &mut B,
    request: Request,
    budget: PollBudget,
) -> TransactionReport {
    let Request {
        operand_a,
        operand_b,
        opcode,
    } = request;

    bus.write(Register::OperandA, operand_a);
    bus.write(Register::OperandB, operand_b);
    bus.write(Register::Opcode, opcode.as_u32());
    fence(Ordering::SeqCst);
    bus.write(Register::Start, START_TRIGGER);

    let (last_status, polls) = match budget {
        PollBudget::Iterations(limit) => poll_iterations(bus, u64::from(limit.max(1))),
        PollBudget::Deadline(limit) => poll_deadline(bus, limit),
    };

    if last_status != STATUS_COMPLETE {
        warn!(
            "{operand_a} {opcode} {operand_b}: no completion after {polls} polls, status={last_status}"
        );
        return TransactionReport {
            outcome: TransactionOutcome::Timeout(last_status),
            polls,
        };
    }

    let result = bus.read(Register::Result);
    debug!("{operand_a} {opcode} {operand_b} = {result} after {polls} polls");
    TransactionReport {
        outcome: TransactionOutcome::Success(result),
        polls,
    }
}

fn poll_iterations<B: RegisterBus + ?Sized>(bus: &mut B, limit: u64) -> (u32, u64) {
    let mut status = bus.read(Register::Status);
    let mut polls = 1;
    while status != STATUS_COMPLETE && polls < limit {
        hint::spin_loop();
        status = bus.read(Register::Status);
        polls += 1;
    }
    (status, polls)
}

fn poll_deadline<B: RegisterBus + ?Sized>(bus: &mut B, limit: Duration) -> (u32, u64) {
    let start = Instant::now();
    let mut polls: u64 = 0;
    loop {
        let status = bus.read(Register::Status);
        polls = polls.saturating_add(1);
        if status == STATUS_COMPLETE || start.elapsed() >= limit {
            return (status, polls);
        }
        hint::spin_loop();
    }
}
