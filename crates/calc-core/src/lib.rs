//! Driver core for the memory-mapped calculator peripheral.
//!
//! A transaction maps the register block, stages two operands and an opcode,
//! triggers the device, busy-waits for completion under a bounded budget and
//! reads the result back. The mapping is released when the handle drops.

/// Fixed register-block layout and hardware constants.
pub mod regmap;
pub use regmap::{
    Register, CALC_BASE, CALC_SIZE, PAGE_BYTES, REGISTER_BLOCK_BYTES, REGISTER_BLOCK_WORDS,
    REGISTER_LAYOUT, START_TRIGGER, STATUS_COMPLETE, WORD_BYTES,
};

/// Operation selector encoding.
pub mod opcode;
pub use opcode::{Opcode, UnknownOpcode, ALL_OPCODES};

/// Error taxonomy for transactions and configuration.
pub mod error;
pub use error::{CalcError, ConfigError, ErrorKind};

/// Register access trait driven by the transaction protocol.
pub mod bus;
pub use bus::RegisterBus;

/// Physical-memory backing store and mapped device handle.
pub mod device;
pub use device::{host_page_bytes, DevMem, DeviceHandle, MapWindow, PhysicalMemory, DEV_MEM_PATH};

/// Request encoding, trigger and completion polling.
pub mod protocol;
pub use protocol::{
    execute, PollBudget, Request, TransactionOutcome, TransactionReport, DEFAULT_POLL_ITERATIONS,
};

/// Translation of raw outcomes into caller-facing results.
pub mod outcome;

/// Transaction settings.
pub mod config;
pub use config::CalcConfig;

/// Software model of the peripheral.
pub mod sim;
pub use sim::{SimConfig, SimFailure, SimTrace, SimulatedCalculator, SimulatedMemory};

/// Acquires `window` from `memory`, runs one transaction and releases the
/// handle before translating the outcome.
///
/// # Errors
///
/// Returns [`CalcError::Access`] or [`CalcError::Mapping`] when the window
/// cannot be acquired (nothing is released in that case) and
/// [`CalcError::Timeout`] when the device does not complete within `budget`.
pub fn run_transaction<M: PhysicalMemory + ?Sized>(
    memory: &M,
    window: MapWindow,
    request: Request,
    budget: PollBudget,
) -> Result<u32, CalcError> {
    let mut handle = memory.acquire(window)?;
    let report = execute(&mut handle, request, budget);
    drop(handle);
    report.outcome.into_result()
}

/// Runs one transaction against the device described by `config`.
///
/// `config` is used as given; call [`CalcConfig::validate`] first to reject
/// unusable settings before the backing store is touched.
///
/// # Errors
///
/// See [`run_transaction`].
pub fn calculate(config: &CalcConfig, request: Request) -> Result<u32, CalcError> {
    let memory = DevMem::new(config.device_path.clone());
    run_transaction(&memory, config.window, request, config.budget)
}

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
