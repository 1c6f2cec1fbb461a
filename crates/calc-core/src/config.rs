use std::path::PathBuf;

use crate::device::{host_page_bytes, MapWindow, DEV_MEM_PATH};
use crate::error::ConfigError;
use crate::protocol::PollBudget;
use crate::regmap::REGISTER_BLOCK_BYTES;

/// Immutable settings for one calculator transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CalcConfig {
    /// Privileged backing store exposing physical memory.
    pub device_path: PathBuf,
    /// Physical window holding the register block.
    pub window: MapWindow,
    /// Completion polling bound.
    pub budget: PollBudget,
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEV_MEM_PATH),
            window: MapWindow::CALCULATOR,
            budget: PollBudget::default(),
        }
    }
}

impl CalcConfig {
    /// Checks the settings before any device access is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the base address is not aligned to the
    /// host page size, the window is smaller than the register block, or the
    /// budget is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let page_bytes = host_page_bytes();
        if self.window.base % page_bytes as u64 != 0 {
            return Err(ConfigError::UnalignedBase {
                base: self.window.base,
                page_bytes,
            });
        }
        if !self.window.covers_register_block() {
            return Err(ConfigError::WindowTooSmall {
                size: self.window.size,
                required: REGISTER_BLOCK_BYTES,
            });
        }
        if self.budget.is_empty() {
            return Err(ConfigError::EmptyBudget);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::CalcConfig;
    use crate::device::{host_page_bytes, MapWindow};
    use crate::error::ConfigError;
    use crate::protocol::PollBudget;
    use crate::regmap::{CALC_BASE, CALC_SIZE};

    #[test]
    fn defaults_target_dev_mem_and_calculator_window() {
        let config = CalcConfig::default();
        assert_eq!(config.device_path.to_str(), Some("/dev/mem"));
        assert_eq!(config.window.base, CALC_BASE);
        assert_eq!(config.window.size, CALC_SIZE);
        assert_eq!(config.budget, PollBudget::Iterations(1_000_000));
        assert_eq!(config.validate(), Ok(()));
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    fn base_on_any_host_page_boundary_is_accepted(#[case] pages: u64) {
        let base = pages * host_page_bytes() as u64;
        let config = CalcConfig {
            window: MapWindow { base, size: CALC_SIZE },
            ..CalcConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn base_off_the_host_page_boundary_reports_host_page_size() {
        let page_bytes = host_page_bytes();
        let base = (page_bytes / 2) as u64;
        let config = CalcConfig {
            window: MapWindow { base, size: CALC_SIZE },
            ..CalcConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnalignedBase { base, page_bytes })
        );
    }

    #[rstest]
    #[case(
        MapWindow { base: 0xFE00_0004, size: CALC_SIZE },
        PollBudget::default(),
        ConfigError::UnalignedBase { base: 0xFE00_0004, page_bytes: host_page_bytes() }
    )]
    #[case(
        MapWindow { base: CALC_BASE, size: 20 },
        PollBudget::default(),
        ConfigError::WindowTooSmall { size: 20, required: 24 }
    )]
    #[case(MapWindow::CALCULATOR, PollBudget::Iterations(0), ConfigError::EmptyBudget)]
    #[case(
        MapWindow::CALCULATOR,
        PollBudget::Deadline(Duration::ZERO),
        ConfigError::EmptyBudget
    )]
    fn invalid_settings_are_rejected(
        #[case] window: MapWindow,
        #[case] budget: PollBudget,
        #[case] expected: ConfigError,
    ) {
        let config = CalcConfig {
            window,
            budget,
            ..CalcConfig::default()
        };
        assert_eq!(config.validate(), Err(expected));
    }
}
