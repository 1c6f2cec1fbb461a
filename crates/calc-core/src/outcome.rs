use crate::error::CalcError;
use crate::protocol::TransactionOutcome;

impl TransactionOutcome {
    /// Converts the raw outcome into the caller-facing result.
    ///
    /// The `Result` register value is passed through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Timeout`] with the last observed status when the
    /// device never reported completion.
    pub const fn into_result(self) -> Result<u32, CalcError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Timeout(last_status) => Err(CalcError::Timeout { last_status }),
        }
    }
}

impl From<TransactionOutcome> for Result<u32, CalcError> {
    fn from(outcome: TransactionOutcome) -> Self {
        outcome.into_result()
    }
}
